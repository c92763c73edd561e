use std::borrow::Cow;
use std::time::Duration;

use crate::error::TransportError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches response bodies for the loader.
///
/// Abstracted so load cycles can be driven from canned bodies in tests.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, TransportError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Other(Cow::Owned(err.to_string())))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| TransportError::Network(Cow::Owned(err.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                code: status.as_u16(),
                description: Cow::Owned(status.canonical_reason().unwrap_or("unknown status").to_owned()),
            });
        }

        response
            .text()
            .map_err(|err| TransportError::Network(Cow::Owned(err.to_string())))
    }
}
