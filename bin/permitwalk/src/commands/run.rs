use permitwalk_batch::{load_identifiers, run_batch, JsonlSink};
use permitwalk_core::{Config, Paths};
use permitwalk_protocol::TabNavigator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line values that take precedence over `crawl.*` in the config.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub failures: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub limit: Option<usize>,
}

/// Fully resolved settings for one batch run.
#[derive(Debug, PartialEq, Eq)]
struct RunPlan {
    input: PathBuf,
    output: PathBuf,
    failures: PathBuf,
    concurrency: usize,
    limit: Option<usize>,
}

impl RunPlan {
    fn resolve(config: &Config, paths: &Paths, overrides: RunOverrides) -> Self {
        let crawl = &config.crawl;
        Self {
            input: overrides
                .input
                .unwrap_or_else(|| PathBuf::from(&crawl.input_file)),
            output: overrides
                .output
                .unwrap_or_else(|| paths.resolve_output(&crawl.output_file)),
            failures: overrides
                .failures
                .unwrap_or_else(|| paths.resolve_output(&crawl.failures_file)),
            concurrency: overrides.concurrency.unwrap_or(crawl.concurrency).max(1),
            limit: overrides.limit.or(crawl.limit),
        }
    }
}

pub async fn run(overrides: RunOverrides) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let plan = RunPlan::resolve(&config, &paths, overrides);

    let ids = load_identifiers(&plan.input, plan.limit)?;
    if ids.is_empty() {
        println!("No identifiers in {}", plan.input.display());
        return Ok(());
    }

    let navigator = Arc::new(TabNavigator::http(&config)?);
    let mut sink = JsonlSink::create(&plan.output, &plan.failures)?;
    info!(
        input = %plan.input.display(),
        output = %plan.output.display(),
        "Batch configured"
    );

    let report = run_batch(navigator, ids, plan.concurrency, &mut sink).await?;

    println!();
    println!("✓ {} permits processed", report.total());
    println!("  Found:     {}", report.found);
    println!("  Not found: {}", report.not_found);
    println!("  Failed:    {}", report.failed);
    println!("  Records:   {}", sink.records_path().display());
    if report.failed > 0 {
        println!("  Failures:  {}", sink.failures_path().display());
    }
    Ok(())
}
