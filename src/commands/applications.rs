use crate::constants::{CONTROL_PATH, PACKAGE_CONTENT_TYPE, PACKAGE_FIELD, UPLOAD_PATH};
use crate::error::Result;
use crate::transport::{FilePart, VapixRequest, VapixResponse};
use crate::vapix::VapixClient;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

/// Actions accepted by `control.cgi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Remove,
}

#[async_trait]
pub trait Applications: Send + Sync {
    /// Upload an application package (.eap) to the device
    async fn upload_package(&self, path: &Path) -> Result<VapixResponse>;

    /// Start, stop, restart or remove an installed application
    async fn control(&self, action: ControlAction, package: &str) -> Result<VapixResponse>;
}

#[async_trait]
impl Applications for VapixClient {
    async fn upload_package(&self, path: &Path) -> Result<VapixResponse> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.eap".to_string());

        debug!("Uploading {} ({} bytes) to {}", file_name, data.len(), self.host);

        let part = FilePart {
            field: PACKAGE_FIELD.to_string(),
            file_name,
            content_type: PACKAGE_CONTENT_TYPE.to_string(),
            data: Bytes::from(data),
        };

        self.execute(VapixRequest::post_file(UPLOAD_PATH, part)).await
    }

    async fn control(&self, action: ControlAction, package: &str) -> Result<VapixResponse> {
        let request = VapixRequest::get(CONTROL_PATH)
            .with_query("action", action.as_ref())
            .with_query("package", package);
        self.execute(request).await
    }
}
