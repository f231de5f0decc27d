use async_trait::async_trait;
use regex::Regex;

use crate::api::{DepsList, Error, ManifestSource, RepoId, Result};
use crate::deps::DepsFetcher;

/// Merges `requirements.txt` with poetry's `[tool.poetry.dependencies]` in `pyproject.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonDepsFetcher;

#[async_trait]
impl DepsFetcher for PythonDepsFetcher {
    async fn deps(&self, source: &dyn ManifestSource, repo: &RepoId, branch: &str) -> Result<DepsList> {
        let mut deps = DepsList::default();
        if let Some(content) = source.manifest(repo, branch, "requirements.txt").await? {
            deps.direct_dependencies.extend(parse_requirements(&content)?);
        }
        if let Some(content) = source.manifest(repo, branch, "pyproject.toml").await? {
            let poetry = parse_pyproject(&content)?;
            deps.ecosystem_version = poetry.ecosystem_version;
            deps.direct_dependencies.extend(poetry.direct_dependencies);
        }
        Ok(deps)
    }
}

/// Package names of `requirements.txt`, skipping comments and editable installs.
pub fn parse_requirements(content: &str) -> Result<Vec<String>> {
    let name = Regex::new(r"^([a-zA-Z0-9_-]+)[^a-zA-Z0-9_-]").map_err(|err| Error::Other(err.into()))?;
    Ok(content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with("-e"))
        .filter_map(|line| name.captures(line))
        .map(|captures| captures[1].to_string())
        .collect())
}

/// Poetry dependencies; the `python` entry becomes the ecosystem version.
pub fn parse_pyproject(content: &str) -> Result<DepsList> {
    let manifest: toml::Table = content
        .parse()
        .map_err(|err| Error::Decode(format!("pyproject.toml: {}", err)))?;
    let mut deps = DepsList::default();
    let section = manifest
        .get("tool")
        .and_then(|tool| tool.get("poetry"))
        .and_then(|poetry| poetry.get("dependencies"))
        .and_then(toml::Value::as_table);
    if let Some(section) = section {
        for (name, value) in section {
            if name == "python" {
                deps.ecosystem_version = value.as_str().map(str::to_string);
            } else {
                deps.direct_dependencies.insert(name.clone());
            }
        }
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    #[test]
    fn requirement_names_need_a_version_marker() {
        let names = parse_requirements(
            "# pinned\nrequests==2.31.0\n-e git+https://github.com/x/y.git#egg=y\nnumpy>=1.26\nflask[async]~=3.0\nbare\n",
        )
        .unwrap();
        assert_eq!(names, vec!["requests", "numpy", "flask"]);
    }

    #[test]
    fn poetry_python_entry_is_the_version() {
        let deps = parse_pyproject(
            r#"
[tool.poetry.dependencies]
python = "^3.10"
httpx = "^0.25"
pydantic = { version = "^2", extras = ["email"] }
"#,
        )
        .unwrap();
        assert_eq!(deps.ecosystem_version.as_deref(), Some("^3.10"));
        assert_eq!(deps.len(), 2);
    }

    #[tokio::test]
    async fn both_manifests_are_merged() {
        let repo: RepoId = "owner/repo".parse().unwrap();
        let source = MockSource::default()
            .with_manifest("requirements.txt", "httpx==0.25.0\nrich==13.0\n")
            .with_manifest("pyproject.toml", "[tool.poetry.dependencies]\nhttpx = \"^0.25\"\n");
        let deps = PythonDepsFetcher.deps(&source, &repo, "main").await.unwrap();
        assert_eq!(
            deps.direct_dependencies.into_iter().collect::<Vec<_>>(),
            vec!["httpx".to_string(), "rich".to_string()]
        );
    }
}
