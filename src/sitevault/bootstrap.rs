//! # Cold Start
//!
//! Decides where the document comes from when the process starts:
//!
//! 1. An existing local document is used as-is. If it exists but does not
//!    parse, loading stops with empty defaults and nothing is written, so a
//!    recoverable file is never overwritten by a blind fetch.
//! 2. Otherwise the canonical copy is fetched over HTTP and persisted.
//! 3. If the fetch fails, the bundled example document is persisted.
//! 4. If that is unreadable too, empty defaults are returned.
//!
//! Only steps 2 and 3 write.

use crate::error::{Result, SiteError};
use crate::model::Document;
use crate::normalize::normalize_document;
use crate::store::{DocumentStore, LocalState};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal state of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    LoadedLocal,
    LoadedRemote,
    LoadedFallback,
    LoadedEmpty,
}

impl fmt::Display for BootstrapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BootstrapOutcome::LoadedLocal => "local",
            BootstrapOutcome::LoadedRemote => "remote",
            BootstrapOutcome::LoadedFallback => "bundled example",
            BootstrapOutcome::LoadedEmpty => "empty defaults",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct Bootstrap {
    pub outcome: BootstrapOutcome,
    pub document: Document,
}

/// Somewhere a canonical document can be fetched from.
pub trait DocumentSource {
    fn fetch(&self) -> Result<Document>;

    fn describe(&self) -> String;
}

/// Fetches the document with a plain GET. Non-200 and non-JSON responses are failures.
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self) -> Result<Document> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let resp = agent
            .get(&self.url)
            .set("User-Agent", "sitevault-bootstrap")
            .call()
            .map_err(|e| SiteError::Fetch(format!("{}: {}", self.url, e)))?;
        if resp.status() != 200 {
            return Err(SiteError::Fetch(format!(
                "{}: unexpected status {}",
                self.url,
                resp.status()
            )));
        }
        let body = resp
            .into_string()
            .map_err(|e| SiteError::Fetch(format!("failed to read body: {}", e)))?;
        serde_json::from_str(&body)
            .map_err(|e| SiteError::Fetch(format!("{}: not a document: {}", self.url, e)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[derive(Default)]
pub struct BootstrapLoader {
    remote: Option<Box<dyn DocumentSource>>,
    example_path: Option<PathBuf>,
}

impl BootstrapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, source: impl DocumentSource + 'static) -> Self {
        self.remote = Some(Box::new(source));
        self
    }

    pub fn with_example(mut self, path: impl Into<PathBuf>) -> Self {
        self.example_path = Some(path.into());
        self
    }

    pub fn run<S: DocumentStore>(&self, store: &S) -> Bootstrap {
        match store.probe() {
            LocalState::Present(document) => {
                info!("using existing local document");
                return Bootstrap {
                    outcome: BootstrapOutcome::LoadedLocal,
                    document,
                };
            }
            LocalState::Corrupt(reason) => {
                warn!(%reason, "local document exists but is unreadable; not fetching over it");
                return Bootstrap {
                    outcome: BootstrapOutcome::LoadedEmpty,
                    document: Document::default(),
                };
            }
            LocalState::Absent => debug!("no local document"),
        }

        if let Some(source) = &self.remote {
            match source.fetch() {
                Ok(mut document) => {
                    normalize_document(&mut document);
                    self.persist(store, &document);
                    info!(source = %source.describe(), "loaded canonical document");
                    return Bootstrap {
                        outcome: BootstrapOutcome::LoadedRemote,
                        document,
                    };
                }
                Err(e) => warn!(error = %e, "remote bootstrap failed"),
            }
        }

        match self.load_example() {
            Ok(mut document) => {
                normalize_document(&mut document);
                self.persist(store, &document);
                info!("loaded bundled example document");
                Bootstrap {
                    outcome: BootstrapOutcome::LoadedFallback,
                    document,
                }
            }
            Err(e) => {
                warn!(error = %e, "bundled example unavailable, starting empty");
                Bootstrap {
                    outcome: BootstrapOutcome::LoadedEmpty,
                    document: Document::default(),
                }
            }
        }
    }

    fn load_example(&self) -> Result<Document> {
        let path = self
            .example_path
            .as_ref()
            .ok_or_else(|| SiteError::NotFound("no example document configured".to_string()))?;
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| SiteError::Parse {
            path: path.clone(),
            source,
        })
    }

    fn persist<S: DocumentStore>(&self, store: &S, document: &Document) {
        if !store.write(document) {
            warn!("bootstrapped document could not be persisted for the next start");
        }
    }
}
