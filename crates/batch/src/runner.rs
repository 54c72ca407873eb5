use futures::stream::{self, StreamExt};
use permitwalk_core::Result;
use permitwalk_protocol::{TabNavigator, WalkOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::sink::RecordSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.found + self.not_found + self.failed
    }
}

/// Walk every identifier with at most `concurrency` walks in flight.
///
/// A failing identifier is written to the sink's failures and the batch
/// carries on; only sink I/O errors stop it.
pub async fn run_batch(
    navigator: Arc<TabNavigator>,
    ids: Vec<String>,
    concurrency: usize,
    sink: &mut dyn RecordSink,
) -> Result<BatchReport> {
    let concurrency = concurrency.max(1);
    info!(count = ids.len(), concurrency, "Starting batch");

    let mut results = stream::iter(ids)
        .map(|permit| {
            let navigator = navigator.clone();
            async move {
                let outcome = navigator.walk(&permit).await;
                (permit, outcome)
            }
        })
        .buffer_unordered(concurrency);

    let mut report = BatchReport::default();
    while let Some((permit, outcome)) = results.next().await {
        match outcome {
            Ok(WalkOutcome::Found(record)) => {
                sink.record(&record)?;
                report.found += 1;
            }
            Ok(WalkOutcome::NotFound) => report.not_found += 1,
            Err(e) => {
                if e.is_identifier_failure() {
                    warn!(permit = %permit, error = %e, "Identifier failed");
                } else {
                    error!(permit = %permit, error = %e, "Identifier failed unexpectedly");
                }
                sink.failure(&permit, &e)?;
                report.failed += 1;
            }
        }
    }

    info!(
        found = report.found,
        not_found = report.not_found,
        failed = report.failed,
        "Batch finished"
    );
    Ok(report)
}
