//! Direct dependencies read from the manifest of a repository's default branch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::api::{DepsList, ManifestSource, RepoId, Result};

mod go;
mod javascript;
mod python;
mod rust;

pub use go::GoDepsFetcher;
pub use javascript::JavascriptDepsFetcher;
pub use python::PythonDepsFetcher;
pub use rust::RustDepsFetcher;

#[async_trait]
pub trait DepsFetcher: Send + Sync {
    async fn deps(&self, source: &dyn ManifestSource, repo: &RepoId, branch: &str) -> Result<DepsList>;
}

/// Fetchers keyed by lowercase primary language.
#[derive(Clone)]
pub struct FetcherRegistry {
    fetchers: HashMap<String, Arc<dyn DepsFetcher>>,
}

impl FetcherRegistry {
    pub fn empty() -> Self {
        FetcherRegistry {
            fetchers: HashMap::new(),
        }
    }

    pub fn register(mut self, language: &str, fetcher: Arc<dyn DepsFetcher>) -> Self {
        self.fetchers.insert(language.to_lowercase(), fetcher);
        self
    }

    pub fn get(&self, language: &str) -> Option<&Arc<dyn DepsFetcher>> {
        self.fetchers.get(&language.to_lowercase())
    }

    /// Dependencies for a repository written in `language`.
    ///
    /// Never fails: unknown languages, missing manifests and fetch or parse
    /// errors all give an empty list, the latter two logged.
    pub async fn fetch(&self, source: &dyn ManifestSource, repo: &RepoId, language: &str, branch: &str) -> DepsList {
        let fetcher = match self.get(language) {
            Some(fetcher) => fetcher,
            None => {
                debug!("No dependency fetcher for {} ({})", repo, language);
                return DepsList::default();
            }
        };
        match fetcher.deps(source, repo, branch).await {
            Ok(deps) => deps,
            Err(err) => {
                warn!("Failed to read {} dependencies of {}: {}", language, repo, err);
                DepsList::default()
            }
        }
    }
}

impl Default for FetcherRegistry {
    fn default() -> Self {
        let javascript: Arc<dyn DepsFetcher> = Arc::new(JavascriptDepsFetcher);
        FetcherRegistry::empty()
            .register("go", Arc::new(GoDepsFetcher))
            .register("rust", Arc::new(RustDepsFetcher))
            .register("javascript", Arc::clone(&javascript))
            .register("typescript", javascript)
            .register("python", Arc::new(PythonDepsFetcher))
    }
}
