use crate::credentials::Credentials;
use crate::dap::error::DapError;
use crate::dap::grammar::{quoted, ws, ParseResult};
use bon::Builder;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::{char, i64 as parse_i64};
use nom::combinator::map;
use nom::sequence::tuple;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use url::Url;

/// NASA Earthdata Login, where GES DISC and most NASA DAP servers redirect.
pub const DEFAULT_AUTH_HOST: &str = "urs.earthdata.nasa.gov";

/// Transport settings for [`crate::HttpAccessor`].
///
/// # Examples
///
/// ```
/// use dapview::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::builder()
///     .request_timeout(Duration::from_secs(60))
///     .build();
/// assert_eq!(config.auth_hosts, vec!["urs.earthdata.nasa.gov".to_string()]);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct HttpConfig {
    /// Hosts that receive the credentials when a redirect lands on them.
    #[builder(default = vec![DEFAULT_AUTH_HOST.to_string()])]
    pub auth_hosts: Vec<String>,
    #[builder(default = 10)]
    pub max_redirects: usize,
    #[builder(default = Duration::from_secs(30))]
    pub connect_timeout: Duration,
    #[builder(default = Duration::from_secs(300))]
    pub request_timeout: Duration,
    /// Allows basic auth over plain HTTP. Only meant for loopback servers.
    #[builder(default)]
    pub allow_insecure_auth: bool,
    #[builder(into, default = concat!("dapview/", env!("CARGO_PKG_VERSION")).to_string())]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HttpConfig {
    /// The shared client. Redirects are handled by [`DapSession`] so that
    /// credentials only go to the hosts that should see them.
    pub fn build_client(&self) -> Result<Client, DapError> {
        Client::builder()
            .redirect(Policy::none())
            .cookie_store(true)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| DapError::connection("<client>", e))
    }
}

fn server_error(i: &str) -> ParseResult<'_, (i64, String)> {
    map(
        tuple((
            ws(tag_no_case("Error")),
            ws(char('{')),
            ws(tag("code")),
            ws(char('=')),
            ws(parse_i64),
            ws(char(';')),
            ws(tag("message")),
            ws(char('=')),
            ws(quoted),
            ws(char(';')),
            ws(char('}')),
        )),
        |(_, _, _, _, code, _, _, _, message, _, _)| (code, message),
    )(i)
}

/// Extracts `code` and `message` from a DAP2 `Error { ... };` body.
pub fn parse_server_error(body: &str) -> Option<(i64, String)> {
    server_error(body).ok().map(|(_, parsed)| parsed)
}

/// Connection state for one remote dataset: the resource URL, the
/// credentials and the shared HTTP client (whose cookie store keeps the
/// login session).
pub struct DapSession {
    client: Client,
    base: Url,
    credentials: Option<Credentials>,
    config: Arc<HttpConfig>,
}

impl DapSession {
    pub fn new(
        client: Client,
        locator: &str,
        credentials: Option<Credentials>,
        config: Arc<HttpConfig>,
    ) -> Result<Self, DapError> {
        let mut base =
            Url::parse(locator).map_err(|e| DapError::InvalidUrl(locator.to_string(), e))?;
        base.set_fragment(None);
        base.set_query(None);
        Ok(Self {
            client,
            base,
            credentials,
            config,
        })
    }

    pub fn url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, suffix: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}{}", url.path(), suffix);
        url.set_path(&path);
        url.set_query(query);
        url
    }

    fn is_trusted(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        Some(host) == self.base.host_str() || self.config.auth_hosts.iter().any(|h| h == host)
    }

    fn sends_credentials_to(&self, url: &Url) -> bool {
        self.credentials.is_some() && self.is_trusted(url)
    }

    /// GET with manual redirect handling. Credentials go only to the dataset
    /// host and the configured auth hosts; a `401` from anywhere else is an
    /// authentication error.
    async fn send(&self, target: Url) -> Result<Response, DapError> {
        let mut url = target.clone();

        for _ in 0..=self.config.max_redirects {
            let authenticate = self.sends_credentials_to(&url);
            let mut request = self.client.get(url.clone());
            if let (true, Some(creds)) = (authenticate, &self.credentials) {
                if url.scheme() != "https" && !self.config.allow_insecure_auth {
                    return Err(DapError::InsecureTransport(url.to_string()));
                }
                request = request.basic_auth(creds.username(), Some(creds.password()));
            }

            debug!("GET {}", url);
            let response = request
                .send()
                .await
                .map_err(|e| DapError::connection(url.as_str(), e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| DapError::HttpStatus {
                        url: url.to_string(),
                        status,
                    })?;
                let next = url
                    .join(location)
                    .map_err(|e| DapError::InvalidUrl(location.to_string(), e))?;
                if let Some(host) = next.host_str() {
                    if self.config.auth_hosts.iter().any(|h| h == host) {
                        info!("Redirected to authentication host {}", host);
                    }
                }
                url = next;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                let reason = if self.credentials.is_none() {
                    "the server requires credentials but none were supplied".to_string()
                } else if !self.is_trusted(&url) {
                    format!(
                        "{} asked for credentials but is not a trusted host",
                        url.host_str().unwrap_or_default()
                    )
                } else {
                    "the credentials were rejected".to_string()
                };
                warn!("Authentication failed for {}: {}", url, reason);
                return Err(DapError::Authentication {
                    url: url.to_string(),
                    reason,
                });
            }

            if status == StatusCode::FORBIDDEN && authenticate {
                return Err(DapError::Authentication {
                    url: url.to_string(),
                    reason: "access is forbidden for these credentials".to_string(),
                });
            }

            if !status.is_success() {
                let url = url.to_string();
                let body = response.text().await.unwrap_or_default();
                if let Some((code, message)) = parse_server_error(&body) {
                    return Err(DapError::Server { url, code, message });
                }
                warn!("HTTP error for {}: {}", url, status);
                return Err(DapError::HttpStatus { url, status });
            }

            return Ok(response);
        }

        Err(DapError::TooManyRedirects(target.to_string()))
    }

    /// Fetches a text response such as `.dds` or `.das`.
    pub async fn fetch_text(&self, suffix: &str) -> Result<String, DapError> {
        let url = self.endpoint(suffix, None);
        let response = self.send(url.clone()).await?;
        let text = response
            .text()
            .await
            .map_err(|e| DapError::connection(url.as_str(), e))?;
        if let Some((code, message)) = parse_server_error(&text) {
            return Err(DapError::Server {
                url: url.to_string(),
                code,
                message,
            });
        }
        Ok(text)
    }

    /// Streams a binary response such as `.dods` into memory.
    pub async fn fetch_bytes(&self, suffix: &str, query: Option<&str>) -> Result<Vec<u8>, DapError> {
        let url = self.endpoint(suffix, query);
        info!("Downloading {}", url);
        let response = self.send(url.clone()).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| DapError::ResponseIo {
                url: url.to_string(),
                source: e,
            })?;

        if body.starts_with(b"Error") {
            if let Some((code, message)) = parse_server_error(&String::from_utf8_lossy(&body)) {
                return Err(DapError::Server {
                    url: url.to_string(),
                    code,
                    message,
                });
            }
        }
        info!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl Drop for DapSession {
    fn drop(&mut self) {
        debug!("Released DAP session for {}", self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(locator: &str) -> DapSession {
        let config = Arc::new(HttpConfig::default());
        let client = config.build_client().unwrap();
        DapSession::new(
            client,
            locator,
            Some(Credentials::new("u", "p")),
            config,
        )
        .unwrap()
    }

    #[test]
    fn parses_dap_error_bodies() {
        let body = "Error {\n    code = 1005;\n    message = \"Constraint expression parse error: no such variable\";\n};";
        let (code, message) = parse_server_error(body).unwrap();
        assert_eq!(code, 1005);
        assert!(message.contains("no such variable"));
        assert!(parse_server_error("Dataset { } x;").is_none());
    }

    #[test]
    fn endpoints_append_suffix_and_drop_fragments() {
        let s = session("https://gpm1.gesdisc.eosdis.nasa.gov/opendap/a/b.HDF5#frag");
        assert_eq!(
            s.endpoint(".dds", None).as_str(),
            "https://gpm1.gesdisc.eosdis.nasa.gov/opendap/a/b.HDF5.dds"
        );
        assert_eq!(
            s.endpoint(".dods", Some("v%5B0:1:0%5D")).as_str(),
            "https://gpm1.gesdisc.eosdis.nasa.gov/opendap/a/b.HDF5.dods?v%5B0:1:0%5D"
        );
    }

    #[test]
    fn credentials_go_only_to_trusted_hosts() {
        let s = session("https://data.example.org/opendap/x.nc");
        let own = Url::parse("https://data.example.org/other").unwrap();
        let urs = Url::parse("https://urs.earthdata.nasa.gov/oauth/authorize").unwrap();
        let cdn = Url::parse("https://cdn.example.com/x").unwrap();
        assert!(s.sends_credentials_to(&own));
        assert!(s.sends_credentials_to(&urs));
        assert!(!s.sends_credentials_to(&cdn));
        assert!(!s.is_trusted(&cdn));
    }

    #[test]
    fn invalid_locator_is_reported() {
        let config = Arc::new(HttpConfig::default());
        let client = config.build_client().unwrap();
        assert!(matches!(
            DapSession::new(client, "not a url", None, config),
            Err(DapError::InvalidUrl(..))
        ));
    }
}
