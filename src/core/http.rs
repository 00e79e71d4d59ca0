use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::config::InstallerConfig;

/// Shared HTTP client. Every request made by the pipeline goes through one of these,
/// so connect and read timeouts always apply.
pub fn build_http_client(config: &InstallerConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(default_headers)
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .build()
}

/// Supplies the access token for gated mirrors. Authentication itself happens elsewhere.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token, for callers that already hold one.
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
