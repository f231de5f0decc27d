use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use github_client::{GITHUB_URL, GRAPHQL_URL, RAW_URL};
use repostats::api::EventKind;
use secrecy::SecretString;
use strum_macros::{Display as StrumDisplay, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Metadata, short windows, dependencies and liveness for every repository.
    Summary,
    /// Daily history since creation, fetched from both ends.
    FullHistory,
    /// Hourly stars over the last `hours`.
    Hourly,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Repositories as owner/name
    #[clap(value_name = "REPO")]
    pub repos: Vec<String>,

    /// File with one owner/name per line, `#` starts a comment
    #[clap(short, long, env)]
    pub repos_file: Option<PathBuf>,

    /// GitHub personal access token
    #[clap(short, long, env = "PAT")]
    pub api_token: Option<SecretString>,

    /// REST API URL
    #[clap(long, env, default_value = GITHUB_URL)]
    pub api_url: String,

    /// GraphQL API URL
    #[clap(long, env, default_value = GRAPHQL_URL)]
    pub graphql_url: String,

    /// Raw file content URL
    #[clap(long, env, default_value = RAW_URL)]
    pub raw_url: String,

    /// Read stars from the REST stargazers endpoint instead of GraphQL
    #[clap(long, env)]
    pub rest_stars: bool,

    #[clap(short, long, env, default_value = "summary")]
    pub mode: Mode,

    /// Events to fetch in full-history mode
    #[clap(short, long, env, default_value = "stars")]
    pub kind: EventKind,

    /// Maximal repositories collected in parallel
    #[clap(short, long, env, default_value_t = 10, parse(try_from_str=concurrency_in_range))]
    pub concurrency: usize,

    /// Short window length in days
    #[clap(short, long, env, default_value_t = 30, parse(try_from_str=window_days_in_range))]
    pub window_days: u32,

    /// Hourly window length
    #[clap(long, env, default_value_t = 24, parse(try_from_str=hours_in_range))]
    pub hours: u32,

    /// Width in days of the busiest periods reported in full-history mode
    #[clap(long, env, default_value_t = 7, parse(try_from_str=period_days_in_range))]
    pub period_days: usize,

    /// Per request timeout in seconds
    #[clap(long, env, default_value_t = 60, parse(try_from_str=timeout_in_range))]
    pub timeout_secs: u64,

    /// Directory reports are written to
    #[clap(short, long, env, default_value = ".")]
    pub output_dir: PathBuf,
}

fn concurrency_in_range(value: &str) -> clap::Result<usize, String> {
    number_in_range(value, 1, 100, "concurrency".to_string())
}

fn window_days_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 1, 365, "window_days".to_string())
}

fn hours_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 1, 24 * 30, "hours".to_string())
}

fn period_days_in_range(value: &str) -> clap::Result<usize, String> {
    number_in_range(value, 1, 365, "period_days".to_string())
}

fn timeout_in_range(value: &str) -> clap::Result<u64, String> {
    number_in_range(value, 1, 3600, "timeout_secs".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        if value < min || value > max {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["repo_stats", "kubernetes/kubernetes"]).unwrap();
        assert_eq!(args.repos, vec!["kubernetes/kubernetes"]);
        assert_eq!(args.mode, Mode::Summary);
        assert_eq!(args.kind, EventKind::Stars);
        assert_eq!(args.concurrency, 10);
        assert_eq!(args.window_days, 30);
        assert_eq!(args.graphql_url, GRAPHQL_URL);
    }

    #[test]
    fn modes_and_kinds_parse_from_kebab_case() {
        let args = Args::try_parse_from(["repo_stats", "--mode", "full-history", "--kind", "pull-requests", "a/b"]).unwrap();
        assert_eq!(args.mode, Mode::FullHistory);
        assert_eq!(args.kind, EventKind::PullRequests);
    }

    #[test]
    fn concurrency_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["repo_stats", "--concurrency", "0", "a/b"]).is_err());
        assert_eq!(
            number_in_range("101", 1, 100, "concurrency".to_string()),
            Err("concurrency is not in range 1 .. 100.".to_string())
        );
    }
}
