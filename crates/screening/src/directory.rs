//! Line policy lookup
//!
//! Three implementations of [`LineDirectory`]:
//! - [`StaticLineDirectory`]: lines loaded once from a YAML file
//! - [`HttpLineDirectory`]: the account service, `GET {url}/lines/{number}`
//! - [`FallbackLineDirectory`]: primary first, secondary when the primary errors

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use callguard_config::LinesConfig;
use callguard_core::{DirectoryError, Line, LineDirectory, PhoneNumber};

#[derive(Debug, Deserialize)]
struct LinesFile {
    #[serde(default)]
    lines: Vec<Line>,
}

/// In-memory lines keyed by public number
#[derive(Debug, Default)]
pub struct StaticLineDirectory {
    lines: HashMap<PhoneNumber, Line>,
}

impl StaticLineDirectory {
    /// Build from a list; two lines sharing a public number is an error
    pub fn new(lines: Vec<Line>) -> Result<Self, DirectoryError> {
        let mut map = HashMap::with_capacity(lines.len());
        for line in lines {
            let key = line.public_number.clone();
            if map.insert(key.clone(), line).is_some() {
                return Err(DirectoryError::InvalidData(format!(
                    "duplicate line for {}",
                    key
                )));
            }
        }
        Ok(Self { lines: map })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, DirectoryError> {
        let file: LinesFile =
            serde_yaml::from_str(yaml).map_err(|e| DirectoryError::InvalidData(e.to_string()))?;
        Self::new(file.lines)
    }

    /// Load a lines file. A missing file yields an empty directory so a
    /// fresh deployment still boots (every call then ends as no_config).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Lines file not found, no lines configured");
            return Ok(Self::default());
        }
        let yaml = std::fs::read_to_string(path)?;
        let directory = Self::from_yaml_str(&yaml)?;
        tracing::info!(path = %path.display(), lines = directory.len(), "Loaded lines");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[async_trait]
impl LineDirectory for StaticLineDirectory {
    async fn resolve(&self, public_number: &PhoneNumber) -> Result<Option<Line>, DirectoryError> {
        Ok(self.lines.get(public_number).cloned())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Lookup against the account service
pub struct HttpLineDirectory {
    client: Client,
    base_url: Url,
}

impl HttpLineDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DirectoryError::InvalidData(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::InvalidData(format!(
                "{} cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn line_url(&self, number: &PhoneNumber) -> Result<Url, DirectoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::InvalidData("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["lines", number.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl LineDirectory for HttpLineDirectory {
    async fn resolve(&self, public_number: &PhoneNumber) -> Result<Option<Line>, DirectoryError> {
        let url = self.line_url(public_number)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let line: Line = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::InvalidData(e.to_string()))?;
                if &line.public_number != public_number {
                    return Err(DirectoryError::InvalidData(format!(
                        "asked for {}, got {}",
                        public_number, line.public_number
                    )));
                }
                Ok(Some(line))
            },
            status => Err(DirectoryError::Unavailable(format!(
                "account service returned HTTP {}",
                status.as_u16()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

/// Tries `primary`, falling back to `fallback` only when the primary errors.
/// A primary `Ok(None)` is authoritative.
pub struct FallbackLineDirectory {
    primary: Arc<dyn LineDirectory>,
    fallback: Arc<dyn LineDirectory>,
}

impl FallbackLineDirectory {
    pub fn new(primary: Arc<dyn LineDirectory>, fallback: Arc<dyn LineDirectory>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl LineDirectory for FallbackLineDirectory {
    async fn resolve(&self, public_number: &PhoneNumber) -> Result<Option<Line>, DirectoryError> {
        match self.primary.resolve(public_number).await {
            Ok(line) => Ok(line),
            Err(e) => {
                tracing::warn!(
                    number = %public_number,
                    primary = self.primary.kind(),
                    fallback = self.fallback.kind(),
                    error = %e,
                    "Line lookup failed, using fallback"
                );
                self.fallback.resolve(public_number).await
            },
        }
    }

    fn kind(&self) -> &'static str {
        "fallback"
    }
}

/// Directory chain selected by configuration
pub fn create_line_directory(config: &LinesConfig) -> Result<Arc<dyn LineDirectory>, DirectoryError> {
    let file: Arc<dyn LineDirectory> = Arc::new(StaticLineDirectory::load(&config.file)?);

    match config.directory_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            let http = HttpLineDirectory::new(url, Duration::from_millis(config.directory_timeout_ms))?;
            tracing::info!(url = %url, "Using account service for line lookup");
            Ok(Arc::new(FallbackLineDirectory::new(Arc::new(http), file)))
        },
        _ => Ok(file),
    }
}
