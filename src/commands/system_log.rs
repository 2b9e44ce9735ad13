use crate::constants::SYSTEM_LOG_PATH;
use crate::error::Result;
use crate::transport::{VapixRequest, VapixResponse};
use crate::vapix::VapixClient;
use async_trait::async_trait;

#[async_trait]
pub trait SystemLog: Send + Sync {
    /// Fetch the device system log, optionally filtered to one application
    async fn system_log(&self, appname: Option<&str>) -> Result<VapixResponse>;
}

#[async_trait]
impl SystemLog for VapixClient {
    async fn system_log(&self, appname: Option<&str>) -> Result<VapixResponse> {
        let mut request = VapixRequest::get(SYSTEM_LOG_PATH);
        if let Some(appname) = appname {
            request = request.with_query("appname", appname);
        }
        self.execute(request).await
    }
}
