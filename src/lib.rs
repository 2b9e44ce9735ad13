pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod deployer;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod vapix;

pub use commands::*;
pub use config::DeployConfig;
pub use deployer::{CommandOutcome, DeployStatus, Deployer};
pub use error::{DeployError, Result};
pub use vapix::VapixClient;
