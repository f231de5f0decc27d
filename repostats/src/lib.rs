//! GitHub repository activity statistics
//!
//! # Overview
//!
//! Turns paginated, timestamped repository events (stargazers, default branch
//! commits, issues, pull requests, forks, releases) into dense per-day or
//! per-hour timelines with running totals.
//!
//! Full histories are fetched from both ends at once: one walker pages forward
//! from the oldest event, another backward from the newest, and a shared
//! cursor set keeps events seen by both from being counted twice. Short
//! windows (the last 30 days by default) walk backward only and stop at the
//! first event older than the window.
//!
//! On top of the timelines the crate finds the busiest consecutive periods,
//! scores repository liveness and reads direct dependencies from manifests.
//!
//! The `api` feature alone exposes the data model and the capability traits a
//! transport implements ([`api::EventSource`], [`api::MetadataSource`],
//! [`api::ManifestSource`]); the default `collector` feature adds the engine.

pub mod api;
pub mod consecutive;
pub mod liveness;
pub mod timeline;

#[cfg(feature = "collector")]
pub mod collector;
#[cfg(feature = "collector")]
pub mod deps;
#[cfg(feature = "collector")]
pub mod progress;
#[cfg(feature = "collector")]
pub mod reconciler;
#[cfg(feature = "collector")]
pub mod telemetry;
#[cfg(feature = "collector")]
pub mod walker;
#[cfg(feature = "collector")]
pub mod window;

#[cfg(all(test, feature = "collector"))]
mod mock;
