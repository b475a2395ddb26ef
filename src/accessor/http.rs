use crate::accessor::{DataReader, DatasetAccessor};
use crate::credentials::Credentials;
use crate::dap::constraint::Constraint;
use crate::dap::das::{parse_das, AttributeTable};
use crate::dap::dds::parse_dds;
use crate::dap::error::DapError;
use crate::dap::session::{DapSession, HttpConfig};
use crate::dap::xdr::{decode_dods, DecodedVariable};
use crate::dataset::Dataset;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::sync::Arc;

/// DAP2 over HTTP(S). Metadata is fetched on open, array data only when a
/// slice is read.
///
/// # Examples
///
/// ```no_run
/// use dapview::{Credentials, DatasetAccessor, HttpAccessor, HttpConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let accessor = HttpAccessor::new(HttpConfig::default())?;
/// let credentials = Credentials::from_env()?;
/// let dataset = accessor
///     .open("https://example.org/opendap/granule.nc", credentials.as_ref())
///     .await?;
/// println!("{}", dataset);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpAccessor {
    client: Client,
    config: Arc<HttpConfig>,
}

impl HttpAccessor {
    pub fn new(config: HttpConfig) -> Result<Self, DapError> {
        Ok(Self {
            client: config.build_client()?,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait]
impl DatasetAccessor for HttpAccessor {
    async fn open(
        &self,
        locator: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Dataset, DapError> {
        let session = DapSession::new(
            self.client.clone(),
            locator,
            credentials.cloned(),
            self.config.clone(),
        )?;
        info!("Opening {}", session.url());

        let dds = parse_dds(&session.fetch_text(".dds").await?)?;
        let das = match session.fetch_text(".das").await {
            Ok(text) => parse_das(&text)?,
            Err(DapError::HttpStatus { status, url }) if status == StatusCode::NOT_FOUND => {
                warn!("No attribute response at {}, continuing without attributes", url);
                AttributeTable::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Dataset::from_descriptors(
            locator,
            &dds,
            &das,
            Box::new(HttpReader { session }),
        ))
    }
}

struct HttpReader {
    session: DapSession,
}

#[async_trait]
impl DataReader for HttpReader {
    async fn read(&self, constraint: &Constraint) -> Result<Vec<DecodedVariable>, DapError> {
        info!("Requesting {}", constraint);
        let body = self
            .session
            .fetch_bytes(".dods", Some(&constraint.to_query()))
            .await?;
        let (_, variables) = decode_dods(&body)?;
        Ok(variables)
    }
}
