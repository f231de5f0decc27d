use async_trait::async_trait;

use crate::api::{DepsList, Error, ManifestSource, RepoId, Result};
use crate::deps::DepsFetcher;

/// Reads the `[dependencies]` table of the root `Cargo.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustDepsFetcher;

#[async_trait]
impl DepsFetcher for RustDepsFetcher {
    async fn deps(&self, source: &dyn ManifestSource, repo: &RepoId, branch: &str) -> Result<DepsList> {
        match source.manifest(repo, branch, "Cargo.toml").await? {
            Some(content) => parse_cargo_toml(&content),
            None => Ok(DepsList::default()),
        }
    }
}

pub fn parse_cargo_toml(content: &str) -> Result<DepsList> {
    let manifest: toml::Table = content
        .parse()
        .map_err(|err| Error::Decode(format!("Cargo.toml: {}", err)))?;
    let mut deps = DepsList::default();
    if let Some(table) = manifest.get("dependencies").and_then(toml::Value::as_table) {
        deps.direct_dependencies.extend(table.keys().cloned());
    }
    deps.ecosystem_version = manifest
        .get("package")
        .and_then(|package| package.get("rust-version"))
        .and_then(toml::Value::as_str)
        .map(str::to_string);
    Ok(deps)
}
