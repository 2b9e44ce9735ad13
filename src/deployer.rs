use crate::clock::{Delay, TokioDelay};
use crate::commands::{Applications, ControlAction, SystemLog};
use crate::config::DeployConfig;
use crate::constants::{CONTROL_CODES, UPLOAD_CODES};
use crate::error::Result;
use crate::protocol::VapixReply;
use crate::transport::VapixResponse;
use crate::vapix::VapixClient;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// One device call made by the deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(PathBuf),
    Control(ControlAction, String),
    SystemLog(String),
}

/// What came back from one command: the device's reply, or the reason there
/// was none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: Option<u16>,
    pub body: String,
    pub error: Option<String>,
    pub success: bool,
}

impl CommandOutcome {
    fn from_result(command: &Command, result: Result<VapixResponse>) -> Self {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Self {
                    status: None,
                    body: String::new(),
                    error: Some(e.to_string()),
                    success: false,
                };
            }
        };

        let reply = VapixReply::parse(&response.body);
        let error = if !response.is_success() {
            Some(response.status_line())
        } else {
            match command {
                Command::Upload(_) => reply.describe(&UPLOAD_CODES),
                Command::Control(..) => reply.describe(&CONTROL_CODES),
                Command::SystemLog(_) => None,
            }
        };

        Self {
            status: Some(response.status),
            success: error.is_none(),
            body: response.body,
            error,
        }
    }

    /// The text shown for this command: the body, or the error when the body is empty.
    pub fn text(&self) -> &str {
        let body = self.body.trim();
        if !body.is_empty() {
            return body;
        }
        self.error.as_deref().map(str::trim).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    Completed,
    UploadFailed,
}

impl DeployStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployStatus::Completed => 0,
            DeployStatus::UploadFailed => 1,
        }
    }
}

pub struct Deployer<W: Write + Send = io::Stdout> {
    config: DeployConfig,
    client: VapixClient,
    delay: Box<dyn Delay>,
    out: W,
}

impl Deployer<io::Stdout> {
    pub fn new(config: DeployConfig, client: VapixClient) -> Self {
        Self {
            config,
            client,
            delay: Box::new(TokioDelay),
            out: io::stdout(),
        }
    }
}

impl<W: Write + Send> Deployer<W> {
    pub fn with_delay(mut self, delay: impl Delay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn with_output<O: Write + Send>(self, out: O) -> Deployer<O> {
        Deployer {
            config: self.config,
            client: self.client,
            delay: self.delay,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn say(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            warn!("Failed to write output: {}", e);
        }
    }

    /// Runs one command and prints what it produced. Failures are folded into
    /// the outcome.
    pub async fn run_command(&mut self, command: Command) -> CommandOutcome {
        let result = match &command {
            Command::Upload(path) => self.client.upload_package(path).await,
            Command::Control(action, package) => self.client.control(*action, package).await,
            Command::SystemLog(appname) => self.client.system_log(Some(appname)).await,
        };

        let outcome = CommandOutcome::from_result(&command, result);
        let text = outcome.text().to_string();
        self.say(&text);
        outcome
    }

    pub async fn upload(&mut self) -> CommandOutcome {
        let path = self.config.package_path.clone();
        self.run_command(Command::Upload(path)).await
    }

    pub async fn start(&mut self) -> CommandOutcome {
        let app = self.config.application_name.clone();
        self.run_command(Command::Control(ControlAction::Start, app))
            .await
    }

    pub async fn fetch_log(&mut self) -> CommandOutcome {
        let app = self.config.application_name.clone();
        self.run_command(Command::SystemLog(app)).await
    }

    /// Upload, start, then show the application's log. Only a failed upload
    /// stops the sequence.
    pub async fn run(&mut self) -> DeployStatus {
        info!(
            "Deploying {} to {} as {}",
            self.config.package_path.display(),
            self.client.host(),
            self.config.application_name
        );

        self.say("Uploading...");
        let upload = self.upload().await;
        if !upload.success {
            warn!(
                "Upload of {} failed: {}",
                self.config.package_path.display(),
                upload.error.as_deref().unwrap_or("unknown")
            );
            self.say("Upload failed");
            return DeployStatus::UploadFailed;
        }

        self.delay.sleep(self.config.start_delay()).await;

        self.say("Starting...");
        let start = self.start().await;
        if !start.success {
            warn!(
                "Start of {} reported a failure: {}",
                self.config.application_name,
                start.error.as_deref().unwrap_or("unknown")
            );
        }

        self.delay.sleep(self.config.log_delay()).await;

        self.say("Checking logs...");
        let log = self.fetch_log().await;
        if !log.success {
            warn!(
                "Log fetch failed: {}",
                log.error.as_deref().unwrap_or("unknown")
            );
        }

        DeployStatus::Completed
    }
}
