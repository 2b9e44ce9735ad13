pub mod applications;
pub mod system_log;

pub use applications::{Applications, ControlAction};
pub use system_log::SystemLog;
