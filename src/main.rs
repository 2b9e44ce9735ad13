use acap_deploy::transport::ReqwestTransport;
use acap_deploy::{DeployConfig, Deployer, VapixClient};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Upload an ACAP package to an Axis device, start it and print its log.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device address
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long, env = "ACAP_DEPLOY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Application package (.eap) to upload
    #[arg(long)]
    package: Option<PathBuf>,

    /// Application name used for control and log filtering
    #[arg(long)]
    app: Option<String>,

    /// Seconds to wait between upload and start
    #[arg(long)]
    start_delay: Option<u64>,

    /// Seconds to wait between start and log fetch
    #[arg(long)]
    log_delay: Option<u64>,

    /// Give up on a request after this many seconds (default: never)
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> acap_deploy::Result<DeployConfig> {
        let mut config = match &self.config {
            Some(path) => DeployConfig::read_config(path)?,
            None => DeployConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(package) = self.package {
            config.package_path = package;
        }
        if let Some(app) = self.app {
            config.application_name = app;
        }
        if let Some(secs) = self.start_delay {
            config.start_delay_secs = secs;
        }
        if let Some(secs) = self.log_delay {
            config.log_delay_secs = secs;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Printed as well as logged, so it shows even with logging turned off.
fn report_startup_error(out: &mut impl Write, message: &str) {
    error!("{}", message);
    let _ = writeln!(out, "Error: {}", message);
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            report_startup_error(&mut io::stderr(), &e.to_string());
            return ExitCode::from(2);
        }
    };
    debug!("{:?}", config);

    let transport = match ReqwestTransport::new(config.timeout()) {
        Ok(transport) => transport,
        Err(e) => {
            report_startup_error(
                &mut io::stderr(),
                &format!("Cannot create HTTP client: {}", e),
            );
            return ExitCode::from(2);
        }
    };

    let client = VapixClient::new(config.host.clone(), Arc::new(transport))
        .with_credentials(config.username.clone(), config.password.clone());

    let status = Deployer::new(config, client).run().await;
    ExitCode::from(status.exit_code())
}
