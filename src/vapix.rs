use crate::error::{DeployError, Result};
use crate::protocol::{DigestChallenge, make_cnonce};
use crate::transport::{RequestBody, Transport, VapixRequest, VapixResponse};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct VapixClient {
    pub(crate) host: String,
    pub(crate) scheme: String,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) transport: Arc<dyn Transport>,

    // Last digest challenge, reused pre-emptively
    pub(crate) challenge: Arc<Mutex<Option<DigestChallenge>>>,
    pub(crate) nonce_count: Arc<AtomicU32>,
}

impl VapixClient {
    pub fn new(host: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            host: host.into(),
            scheme: "http".to_string(),
            username: None,
            password: None,
            transport,
            challenge: Arc::new(Mutex::new(None)),
            nonce_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self, uri: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, uri)
    }

    /// Sends a request, answering a digest challenge once if the device asks for one.
    ///
    /// Without a cached challenge a file upload is first sent with an empty
    /// body, so the package only travels once the request carries credentials.
    pub async fn execute(&self, request: VapixRequest) -> Result<VapixResponse> {
        let url = self.url(&request.uri());

        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return self.transport.send(&url, &request).await;
        };

        let cached = self.challenge.lock().await.clone();
        let mut attempt = request.clone();
        let mut body_withheld = false;
        match &cached {
            Some(challenge) => {
                attempt.authorization =
                    Some(self.authorize(challenge, username, password, &request)?);
            }
            None if matches!(request.body, RequestBody::Multipart(_)) => {
                attempt.body = RequestBody::Empty;
                body_withheld = true;
            }
            None => {}
        }

        let response = self.transport.send(&url, &attempt).await?;
        if response.status != 401 {
            if body_withheld {
                debug!("{} did not ask for credentials, sending body", url);
                return self.transport.send(&url, &request).await;
            }
            return Ok(response);
        }

        let Some(challenge) = select_challenge(&response)? else {
            warn!("{} answered 401 without a digest challenge", url);
            return Ok(response);
        };

        if cached.is_some() {
            debug!(stale = challenge.stale, "Cached digest nonce rejected, retrying");
        }

        self.nonce_count.store(0, Ordering::Release);
        *self.challenge.lock().await = Some(challenge.clone());

        let mut retry = request.clone();
        retry.authorization = Some(self.authorize(&challenge, username, password, &request)?);
        self.transport.send(&url, &retry).await
    }

    fn authorize(
        &self,
        challenge: &DigestChallenge,
        username: &str,
        password: &str,
        request: &VapixRequest,
    ) -> Result<String> {
        let nc = self.nonce_count.fetch_add(1, Ordering::AcqRel) + 1;
        challenge.authorization(
            username,
            password,
            request.method.as_ref(),
            &request.uri(),
            nc,
            &make_cnonce(nc),
        )
    }
}

/// First usable digest challenge of a 401 response.
fn select_challenge(response: &VapixResponse) -> Result<Option<DigestChallenge>> {
    let mut unsupported = None;
    for value in response.header_values("www-authenticate") {
        match DigestChallenge::parse(value) {
            Ok(challenge) => return Ok(Some(challenge)),
            Err(e @ DeployError::UnsupportedAlgorithm(_)) => {
                unsupported.get_or_insert(e);
            }
            Err(e) => debug!("Skipping challenge {:?}: {}", value, e),
        }
    }
    match unsupported {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::transport::FilePart;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const CHALLENGE: &str = r#"Digest realm="AXIS_ACCC8E012345", nonce="abc123", algorithm=MD5, qop="auth""#;

    struct Scripted {
        replies: StdMutex<VecDeque<VapixResponse>>,
        seen: StdMutex<Vec<(String, Option<String>)>>,
        with_body: StdMutex<Vec<bool>>,
    }

    impl Scripted {
        fn new(replies: Vec<VapixResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies.into()),
                seen: StdMutex::new(Vec::new()),
                with_body: StdMutex::new(Vec::new()),
            })
        }

        fn with_body(&self) -> Vec<bool> {
            self.with_body.lock().unwrap().clone()
        }

        fn seen(&self) -> Vec<(String, Option<String>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, url: &str, request: &VapixRequest) -> Result<VapixResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), request.authorization.clone()));
            self.with_body
                .lock()
                .unwrap()
                .push(matches!(request.body, RequestBody::Multipart(_)));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DeployError::ConnectionError("script exhausted".to_string()))
        }
    }

    fn unauthorized(challenge: &str) -> VapixResponse {
        VapixResponse::new(401, "").with_header("WWW-Authenticate", challenge)
    }

    fn upload() -> VapixRequest {
        VapixRequest::post_file(
            "/axis-cgi/applications/upload.cgi",
            FilePart {
                field: "packfil".to_string(),
                file_name: "app.eap".to_string(),
                content_type: "application/octet-stream".to_string(),
                data: Bytes::from_static(b"EAP"),
            },
        )
    }

    #[tokio::test]
    async fn answers_digest_challenge() {
        let transport =
            Scripted::new(vec![unauthorized(CHALLENGE), VapixResponse::new(200, "OK")]);
        let client =
            VapixClient::new("10.0.0.1", transport.clone()).with_credentials("root", "pass");

        let request =
            VapixRequest::get("/axis-cgi/admin/systemlog.cgi").with_query("appname", "DataQ");
        let response = client.execute(request).await.unwrap();

        assert_eq!(response.status, 200);
        let seen = transport.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0].0,
            "http://10.0.0.1/axis-cgi/admin/systemlog.cgi?appname=DataQ"
        );
        assert!(seen[0].1.is_none());
        let auth = seen[1].1.as_deref().unwrap();
        assert!(auth.starts_with("Digest username=\"root\""));
        assert!(auth.contains("uri=\"/axis-cgi/admin/systemlog.cgi?appname=DataQ\""));
        assert!(auth.contains("nc=00000001"));
    }

    #[tokio::test]
    async fn reuses_nonce_with_next_count() {
        let transport = Scripted::new(vec![
            unauthorized(CHALLENGE),
            VapixResponse::new(200, "OK"),
            VapixResponse::new(200, "OK"),
        ]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        client.execute(VapixRequest::get("/a.cgi")).await.unwrap();
        client.execute(VapixRequest::get("/b.cgi")).await.unwrap();

        let seen = transport.seen();
        assert_eq!(seen.len(), 3);
        assert!(seen[2].1.as_deref().unwrap().contains("nc=00000002"));
    }

    #[tokio::test]
    async fn refreshes_stale_nonce() {
        let stale = r#"Digest realm="AXIS_ACCC8E012345", nonce="fresh", algorithm=MD5, qop="auth", stale=true"#;
        let transport = Scripted::new(vec![
            unauthorized(CHALLENGE),
            VapixResponse::new(200, "OK"),
            unauthorized(stale),
            VapixResponse::new(200, "OK"),
        ]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        client.execute(VapixRequest::get("/a.cgi")).await.unwrap();
        let response = client.execute(VapixRequest::get("/b.cgi")).await.unwrap();

        assert_eq!(response.status, 200);
        let seen = transport.seen();
        assert_eq!(seen.len(), 4);
        let last = seen[3].1.as_deref().unwrap();
        assert!(last.contains("nonce=\"fresh\""));
        assert!(last.contains("nc=00000001"));
    }

    #[tokio::test]
    async fn second_rejection_is_returned() {
        let transport = Scripted::new(vec![unauthorized(CHALLENGE), unauthorized(CHALLENGE)]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "wrong");

        let response = client.execute(VapixRequest::get("/a.cgi")).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.seen().len(), 2);
    }

    #[tokio::test]
    async fn picks_supported_challenge() {
        let response = VapixResponse::new(401, "")
            .with_header("WWW-Authenticate", r#"Digest realm="r", nonce="n1", algorithm=SHA-256"#)
            .with_header("WWW-Authenticate", r#"Digest realm="r", nonce="n2", algorithm=MD5"#);
        assert_eq!(select_challenge(&response).unwrap().unwrap().nonce, "n2");

        let only_sha = VapixResponse::new(401, "")
            .with_header("WWW-Authenticate", r#"Digest realm="r", nonce="n1", algorithm=SHA-256"#);
        assert!(matches!(
            select_challenge(&only_sha),
            Err(DeployError::UnsupportedAlgorithm(_))
        ));

        let basic =
            VapixResponse::new(401, "").with_header("WWW-Authenticate", r#"Basic realm="r""#);
        assert!(select_challenge(&basic).unwrap().is_none());
    }

    #[tokio::test]
    async fn without_credentials_sends_plain() {
        let transport = Scripted::new(vec![unauthorized(CHALLENGE)]);
        let client = VapixClient::new("cam", transport.clone());

        let response = client.execute(VapixRequest::get("/a.cgi")).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.seen().len(), 1);
    }

    #[tokio::test]
    async fn package_is_sent_only_with_credentials() {
        let transport = Scripted::new(vec![unauthorized(CHALLENGE), VapixResponse::new(200, "OK")]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        let response = client.execute(upload()).await.unwrap();

        assert_eq!(response.body, "OK");
        assert_eq!(transport.with_body(), vec![false, true]);
        let seen = transport.seen();
        assert!(seen[0].1.is_none());
        assert!(seen[1].1.as_deref().unwrap().contains("uri=\"/axis-cgi/applications/upload.cgi\""));
    }

    #[tokio::test]
    async fn cached_nonce_uploads_in_one_request() {
        let transport = Scripted::new(vec![
            unauthorized(CHALLENGE),
            VapixResponse::new(200, "OK"),
            VapixResponse::new(200, "OK"),
        ]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        client.execute(VapixRequest::get("/a.cgi")).await.unwrap();
        client.execute(upload()).await.unwrap();

        assert_eq!(transport.with_body(), vec![false, false, true]);
        assert!(transport.seen()[2].1.is_some());
    }

    #[tokio::test]
    async fn open_device_still_gets_the_package() {
        let transport = Scripted::new(vec![
            VapixResponse::new(200, "Error: 1"),
            VapixResponse::new(200, "OK"),
        ]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        let response = client.execute(upload()).await.unwrap();

        assert_eq!(response.body, "OK");
        assert_eq!(transport.with_body(), vec![false, true]);
        assert!(transport.seen().iter().all(|(_, auth)| auth.is_none()));
    }

    #[tokio::test]
    async fn auth_int_challenge_is_an_error() {
        let transport = Scripted::new(vec![unauthorized(
            r#"Digest realm="r", nonce="n", qop="auth-int""#,
        )]);
        let client = VapixClient::new("cam", transport.clone()).with_credentials("root", "pass");

        let err = client.execute(upload()).await.unwrap_err();

        assert!(matches!(err, DeployError::AuthenticationError(_)));
        assert_eq!(transport.seen().len(), 1);
    }

    #[tokio::test]
    async fn scheme_is_used_in_urls() {
        let transport = Scripted::new(vec![VapixResponse::new(200, "OK")]);
        let client = VapixClient::new("cam:8443", transport.clone()).with_scheme("https");

        assert_eq!(client.url("/a.cgi?x=1"), "https://cam:8443/a.cgi?x=1");
        client.execute(VapixRequest::get("/a.cgi")).await.unwrap();
        assert_eq!(transport.seen()[0].0, "https://cam:8443/a.cgi");
    }
}
