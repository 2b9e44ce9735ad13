use phf::phf_map;

pub const UPLOAD_PATH: &str = "/axis-cgi/applications/upload.cgi";
pub const CONTROL_PATH: &str = "/axis-cgi/applications/control.cgi";
pub const SYSTEM_LOG_PATH: &str = "/axis-cgi/admin/systemlog.cgi";

/// Multipart field name `upload.cgi` expects the package under.
pub const PACKAGE_FIELD: &str = "packfil";
pub const PACKAGE_CONTENT_TYPE: &str = "application/octet-stream";

pub const DEFAULT_HOST: &str = "10.13.8.109";
pub const DEFAULT_USERNAME: &str = "nodered";
pub const DEFAULT_PASSWORD: &str = "rednode";
pub const DEFAULT_PACKAGE_PATH: &str =
    "/home/fred/development/Radar/DataQ_Radar_2_2_0_armv7hf.eap";
pub const DEFAULT_APPLICATION: &str = "DataQ";

pub const DEFAULT_START_DELAY_SECS: u64 = 3;
pub const DEFAULT_LOG_DELAY_SECS: u64 = 5;

/// Error replies of `upload.cgi` (`Error: <code>`).
pub static UPLOAD_CODES: phf::Map<u32, &'static str> = phf_map! {
    1u32 => "Invalid application package",
    2u32 => "Package verification failed",
    3u32 => "Package is too large or the device is out of space",
    5u32 => "Package is not compatible with this device",
    10u32 => "Unspecified error",
    12u32 => "Another upload is in progress",
};

/// Error replies of `control.cgi` (`Error: <code>`).
pub static CONTROL_CODES: phf::Map<u32, &'static str> = phf_map! {
    4u32 => "Application not found",
    6u32 => "Application is already running",
    7u32 => "Application is not running",
    9u32 => "Too many applications running",
    10u32 => "Internal error",
};
