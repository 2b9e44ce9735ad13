use acap_deploy::protocol::VapixReply;
use acap_deploy::transport::ReqwestTransport;
use acap_deploy::{Applications, ControlAction, SystemLog, VapixClient};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 6 {
        println!(
            "Usage: {} <IP> <Username> <Password> <App> <start|stop|restart|remove>",
            args[0]
        );
        println!("Example: cargo run --example app_control -- 192.168.0.90 root pass DataQ stop");
        return Ok(());
    }

    let action = ControlAction::from_str(&args[5])?;
    let transport = ReqwestTransport::new(Some(Duration::from_secs(30)))?;
    let client =
        VapixClient::new(&args[1], Arc::new(transport)).with_credentials(&args[2], &args[3]);

    println!("Sending {} to {}...", action, args[4]);
    let response = client.control(action, &args[4]).await?;
    match VapixReply::parse(&response.body) {
        VapixReply::Ok => println!("OK"),
        VapixReply::Error(code) => println!("Device refused with code {}", code),
        VapixReply::Other(text) => println!("{} {}", response.status_line(), text),
    }

    println!("\n--- Log ---");
    let log = client.system_log(Some(&args[4])).await?;
    println!("{}", log.body.trim());

    Ok(())
}
