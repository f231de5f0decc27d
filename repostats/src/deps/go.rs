use async_trait::async_trait;

use crate::api::{DepsList, ManifestSource, RepoId, Result};
use crate::deps::DepsFetcher;

/// Reads `go.mod`: the `go` directive and every require not marked `// indirect`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoDepsFetcher;

#[async_trait]
impl DepsFetcher for GoDepsFetcher {
    async fn deps(&self, source: &dyn ManifestSource, repo: &RepoId, branch: &str) -> Result<DepsList> {
        Ok(source
            .manifest(repo, branch, "go.mod")
            .await?
            .map(|content| parse_go_mod(&content))
            .unwrap_or_default())
    }
}

pub fn parse_go_mod(content: &str) -> DepsList {
    let mut deps = DepsList::default();
    let mut in_require_block = false;
    for line in content.lines() {
        let (code, comment) = match line.split_once("//") {
            Some((code, comment)) => (code.trim(), comment.trim()),
            None => (line.trim(), ""),
        };
        if in_require_block {
            if code == ")" {
                in_require_block = false;
            } else {
                add_require(&mut deps, code, comment);
            }
            continue;
        }
        let mut words = code.split_whitespace();
        match words.next() {
            Some("go") => deps.ecosystem_version = words.next().map(str::to_string),
            Some("require") => match words.next() {
                Some("(") => in_require_block = true,
                Some(_) => add_require(&mut deps, code.trim_start_matches("require"), comment),
                None => {}
            },
            _ => {}
        }
    }
    deps
}

fn add_require(deps: &mut DepsList, code: &str, comment: &str) {
    if comment.starts_with("indirect") {
        return;
    }
    if let Some(path) = code.split_whitespace().next() {
        deps.direct_dependencies.insert(path.to_string());
    }
}
