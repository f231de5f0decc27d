use std::future::Future;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::api::RepoId;

/// Span sink handed to the collector instead of a process-wide tracer.
pub trait Telemetry: Send + Sync {
    fn span_started(&self, name: &'static str, repo: &RepoId);

    fn span_finished(&self, name: &'static str, repo: &RepoId, elapsed: Duration, failed: bool);
}

/// Spans reported through `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn span_started(&self, name: &'static str, repo: &RepoId) {
        debug!("{} started for {}", name, repo);
    }

    fn span_finished(&self, name: &'static str, repo: &RepoId, elapsed: Duration, failed: bool) {
        if failed {
            warn!("{} failed for {} after {} ms", name, repo, elapsed.as_millis());
        } else {
            debug!("{} finished for {} in {} ms", name, repo, elapsed.as_millis());
        }
    }
}

pub async fn traced<T, E, F>(telemetry: &dyn Telemetry, name: &'static str, repo: &RepoId, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    telemetry.span_started(name, repo);
    let started = Instant::now();
    let result = future.await;
    telemetry.span_finished(name, repo, started.elapsed(), result.is_err());
    result
}
