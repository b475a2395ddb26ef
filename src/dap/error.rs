use thiserror::Error;

#[derive(Debug, Error)]
pub enum DapError {
    #[error("Could not reach {url}")]
    Connection {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Authentication failed for {url}: {reason}")]
    Authentication { url: String, reason: String },

    #[error("Refusing to send credentials over plain HTTP to {0}")]
    InsecureTransport(String),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Server error {code} for {url}: {message}")]
    Server {
        url: String,
        code: i64,
        message: String,
    },

    #[error("Malformed {what} response: {message}")]
    Format { what: &'static str, message: String },

    #[error("Invalid dataset URL '{0}'")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("Too many redirects while fetching {0}")]
    TooManyRedirects(String),

    #[error("Unsupported DAP construct: {0}")]
    Unsupported(String),

    #[error("Failed reading response body from {url}")]
    ResponseIo {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl DapError {
    pub(crate) fn format(what: &'static str, message: impl Into<String>) -> Self {
        DapError::Format {
            what,
            message: message.into(),
        }
    }

    pub(crate) fn connection(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        DapError::Connection {
            url: url.into(),
            source: source.into(),
        }
    }
}
