use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::api::{DepsList, Error, ManifestSource, RepoId, Result};
use crate::deps::DepsFetcher;

/// Reads `dependencies` and `devDependencies` of `package.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavascriptDepsFetcher;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    engines: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
impl DepsFetcher for JavascriptDepsFetcher {
    async fn deps(&self, source: &dyn ManifestSource, repo: &RepoId, branch: &str) -> Result<DepsList> {
        match source.manifest(repo, branch, "package.json").await? {
            Some(content) => parse_package_json(&content),
            None => Ok(DepsList::default()),
        }
    }
}

pub fn parse_package_json(content: &str) -> Result<DepsList> {
    let package: PackageJson =
        serde_json::from_str(content).map_err(|err| Error::Decode(format!("package.json: {}", err)))?;
    Ok(DepsList {
        ecosystem_version: package
            .engines
            .get("node")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        direct_dependencies: package
            .dependencies
            .into_keys()
            .chain(package.dev_dependencies.into_keys())
            .collect(),
    })
}
