use std::time::Duration;

use crate::error::ProbeError;
use crate::metrics::Metrics;
use crate::prober::{ConnectionPolicy, Transport, probe_ttfb};
use crate::report::{Report, SearchOutcome};
use crate::search::Searcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub no_cache: bool,
    pub deadline: Duration,
}

/// Measures `target` once, reads the full body and searches it when the
/// response is a 200.
pub async fn run_once(
    transport: &Transport,
    target: &Target,
    searcher: &Searcher,
) -> Result<Report, ProbeError> {
    let policy = ConnectionPolicy::from_no_cache(target.no_cache);
    let probe = probe_ttfb(transport, &target.url, target.no_cache, target.deadline).await?;
    let measurement = probe.finish().await?;

    let search = if measurement.is_ok() {
        let body = String::from_utf8_lossy(&measurement.body);
        SearchOutcome::from(searcher.find(&body))
    } else {
        tracing::warn!(
            "{} answered {}; skipping body search",
            target.url,
            measurement.status
        );
        SearchOutcome::Skipped
    };

    Ok(Report::new(&target.url, policy, &measurement, search))
}

/// [`run_once`] with the outcome recorded in `metrics`.
pub async fn run_observed(
    transport: &Transport,
    target: &Target,
    searcher: &Searcher,
    metrics: &Metrics,
) -> Result<Report, ProbeError> {
    let policy = ConnectionPolicy::from_no_cache(target.no_cache);
    match run_once(transport, target, searcher).await {
        Ok(report) => {
            metrics.observe(&target.url, policy, report.ttfb_ms, report.total_ms);
            Ok(report)
        }
        Err(err) => {
            tracing::error!("ttfb probe {} failed: {:?}", target.url, err);
            metrics.inc_failure(&target.url, err.kind());
            Err(err)
        }
    }
}
