//! CSV and JSON report files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use repostats::api::{PartialResult, RepoStats};
use repostats::consecutive::MaxPeriod;
use repostats::timeline::{TimeBucket, Timeline};
use serde::Serialize;

pub const ANALYSIS_HEADER: [&str; 12] = [
    "repo",
    "stars",
    "new-stars-last-30d",
    "new-stars-last-14d",
    "new-stars-last-7d",
    "new-stars-last-24H",
    "stars-per-mille-30d",
    "language",
    "archived",
    "dependencies",
    "liveness",
    "status",
];

/// One analysis row per repository. Failed repositories keep their slot with
/// the error in `status`; partially collected ones keep the numbers they have.
pub fn write_analysis(path: &Path, rows: &[(String, PartialResult<RepoStats>)]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_row(&mut out, ANALYSIS_HEADER.iter().map(|field| field.to_string()))?;
    for (repo, result) in rows {
        let (stats, status) = match result {
            Ok(stats) => (Some(stats), "ok".to_string()),
            Err(partial) => (partial.value.as_ref(), format!("error: {}", partial.error)),
        };
        let fields = match stats {
            Some(stats) => vec![
                repo.clone(),
                stats.snapshot.stars.to_string(),
                stats.stars.added_last_30d.to_string(),
                stats.stars.added_last_14d.to_string(),
                stats.stars.added_last_7d.to_string(),
                stats.stars.added_last_24h.to_string(),
                format!("{:.3}", stats.stars.added_per_mille_30d),
                stats.snapshot.language.clone(),
                stats.snapshot.archived.to_string(),
                stats.deps.len().to_string(),
                format!("{:.2}", stats.liveness_score),
                status,
            ],
            None => {
                let mut fields = vec![repo.clone()];
                fields.extend(std::iter::repeat(String::new()).take(ANALYSIS_HEADER.len() - 2));
                fields.push(status);
                fields
            }
        };
        write_row(&mut out, fields)?;
    }
    out.flush()
}

/// `date,daily-count,total-count` rows, one per bucket.
pub fn write_timeline(path: &Path, timeline: &Timeline) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_row(&mut out, ["date", "daily-count", "total-count"].map(String::from))?;
    for bucket in &timeline.buckets {
        write_row(
            &mut out,
            [
                timeline.granularity.format(bucket.timestamp),
                bucket.count.to_string(),
                bucket.running_total.to_string(),
            ],
        )?;
    }
    out.flush()
}

/// How many of the collected repositories depend directly on each package.
pub fn write_dependency_usage(path: &Path, usage: &BTreeMap<String, usize>) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_row(&mut out, ["dependency", "repos"].map(String::from))?;
    for (dependency, repos) in usage {
        write_row(&mut out, [dependency.clone(), repos.to_string()])?;
    }
    out.flush()
}

pub fn write_periods(path: &Path, periods: &[(String, Vec<MaxPeriod>)]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_row(&mut out, ["repo", "start", "end", "total"].map(String::from))?;
    for (repo, periods) in periods {
        for period in periods {
            write_row(
                &mut out,
                [
                    repo.clone(),
                    period.start.format("%d-%m-%Y").to_string(),
                    period.end.format("%d-%m-%Y").to_string(),
                    period.total.to_string(),
                ],
            )?;
        }
    }
    out.flush()
}

pub fn write_peaks(path: &Path, peaks: &[(String, Vec<TimeBucket>)]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_row(&mut out, ["repo", "date", "count"].map(String::from))?;
    for (repo, days) in peaks {
        for day in days {
            write_row(
                &mut out,
                [
                    repo.clone(),
                    day.timestamp.format("%d-%m-%Y").to_string(),
                    day.count.to_string(),
                ],
            )?;
        }
    }
    out.flush()
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()
}

/// `owner/name` as a file name fragment.
pub fn file_stem(repo: &str) -> String {
    repo.replace('/', "-")
}

fn write_row<W, I>(out: &mut W, fields: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = String>,
{
    let line: Vec<String> = fields.into_iter().map(|field| escape(&field)).collect();
    writeln!(out, "{}", line.join(","))
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repostats::api::{Error, Partial};
    use repostats::timeline::Granularity;

    fn at(s: &str) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&chrono::Utc)
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a, b"), "\"a, b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn timeline_rows_use_day_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.csv");
        let mut timeline = Timeline::build(at("2024-03-01T00:00:00Z"), at("2024-03-02T00:00:00Z"), Granularity::Day);
        timeline.buckets[0].count = 2;
        timeline.accumulate_forward();
        write_timeline(&path, &timeline).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "date,daily-count,total-count\n01-03-2024,2,2\n02-03-2024,0,2\n");
    }

    #[test]
    fn failed_repositories_keep_their_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.csv");
        let rows = vec![(
            "broken".to_string(),
            Err(Partial::none(Error::InvalidRepo("broken".to_string()))),
        )];
        write_analysis(&path, &rows).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], ANALYSIS_HEADER.join(","));
        assert!(lines[1].starts_with("broken,,,,,,,,,,,\""));
        assert!(lines[1].ends_with("\"error: Repository should be provided as owner/name, got 'broken'\""));
    }
}
