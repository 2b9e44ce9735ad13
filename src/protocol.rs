use crate::error::{DeployError, Result};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DigestAlgorithm {
    #[default]
    #[strum(serialize = "MD5")]
    Md5,
    #[strum(serialize = "MD5-sess")]
    Md5Sess,
}

/// A `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: DigestAlgorithm,
    pub qop: Vec<String>,
    pub stale: bool,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(DeployError::AuthenticationError(format!(
                "Not a digest challenge: {}",
                scheme
            )));
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = DigestAlgorithm::default();
        let mut qop = Vec::new();
        let mut stale = false;

        for (name, value) in parse_params(rest)? {
            match name.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => {
                    algorithm = DigestAlgorithm::from_str(&value)
                        .map_err(|_| DeployError::UnsupportedAlgorithm(value.clone()))?
                }
                "qop" => {
                    qop = value
                        .split(',')
                        .map(|q| q.trim().to_ascii_lowercase())
                        .filter(|q| !q.is_empty())
                        .collect()
                }
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.ok_or_else(|| {
                DeployError::AuthenticationError("Challenge without realm".to_string())
            })?,
            nonce: nonce.ok_or_else(|| {
                DeployError::AuthenticationError("Challenge without nonce".to_string())
            })?,
            opaque,
            algorithm,
            qop,
            stale,
        })
    }

    pub fn supports_auth_qop(&self) -> bool {
        self.qop.iter().any(|q| q == "auth")
    }

    /// Builds the `Authorization` header value for one request. A challenge
    /// that only offers `auth-int` cannot be answered.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> Result<String> {
        if !self.qop.is_empty() && !self.supports_auth_qop() {
            return Err(DeployError::AuthenticationError(format!(
                "Unsupported qop: {}",
                self.qop.join(",")
            )));
        }

        let mut ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        if self.algorithm == DigestAlgorithm::Md5Sess {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}",
            quote(username),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri),
            self.algorithm
        );

        if self.supports_auth_qop() {
            let nc = format!("{:08x}", nonce_count);
            let response = md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ));
            header.push_str(&format!(
                ", response=\"{}\", qop=auth, nc={}, cnonce=\"{}\"",
                response,
                nc,
                quote(cnonce)
            ));
        } else {
            let response = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2));
            header.push_str(&format!(", response=\"{}\"", response));
        }

        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        Ok(header)
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Splits `name=value, name="quoted, value"` into pairs.
fn parse_params(input: &str) -> Result<Vec<(String, String)>> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            name.push(c);
            chars.next();
        }
        let name = name.trim().to_string();

        if chars.next() != Some('=') {
            return Err(DeployError::AuthenticationError(format!(
                "Malformed challenge parameter: {}",
                name
            )));
        }
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(DeployError::AuthenticationError(format!(
                    "Unterminated quoted value for {}",
                    name
                )));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.push((name, value));
    }

    Ok(params)
}

/// Client nonce for one authorized request.
pub fn make_cnonce(nonce_count: u32) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seed = format!("{}:{}:{}", nanos, std::process::id(), nonce_count);
    md5_hex(&seed)[..16].to_string()
}

/// Plain-text reply of the application CGIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VapixReply {
    Ok,
    Error(u32),
    Other(String),
}

impl VapixReply {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        if body.eq_ignore_ascii_case("ok") {
            return VapixReply::Ok;
        }
        if let Some(code) = body
            .strip_prefix("Error:")
            .and_then(|c| c.trim().parse::<u32>().ok())
        {
            return VapixReply::Error(code);
        }
        VapixReply::Other(body.to_string())
    }

    /// Human-readable text for an error reply, looked up in one of the code tables.
    pub fn describe(&self, codes: &phf::Map<u32, &'static str>) -> Option<String> {
        match self {
            VapixReply::Error(code) => Some(format!(
                "Error {}: {}",
                code,
                codes.get(code).copied().unwrap_or("Unknown error")
            )),
            _ => None,
        }
    }
}
