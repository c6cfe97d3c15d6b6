//! # potts-cd: Contrastive Divergence Training of Potts Models
//!
//! ## Usage
//! ```bash
//! # Gibbs sampling from the alignment rows
//! potts-cd --msa family.psc --out family.raw
//!
//! # Tree-guided sampling, starting from existing parameters
//! potts-cd --msa family.psc --tree family.nwk --init start.raw --out family.raw
//!
//! # With profiling output
//! potts-cd --msa family.psc --out family.raw --profile
//! ```

use std::time::Instant;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use potts_cd::config::Config;
use potts_cd::pipelines::TrainingPipeline;
use potts_cd::utils::threading::build_global_pool;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber, with span timings when profiling
fn init_tracing(profile: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let span_events = if profile { FmtSpan::CLOSE } else { FmtSpan::NONE };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_span_events(span_events)
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();

    let config = Config::parse_and_validate().context("Invalid configuration")?;

    init_tracing(config.profile);
    if config.profile {
        eprintln!("=== Profiling enabled ===\n");
    }

    let n_threads = config.nthreads();
    build_global_pool(n_threads).context("Failed to configure thread pool")?;

    eprintln!("potts-cd v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", n_threads);
    eprintln!("Input: {:?}", config.msa);

    let out = config.out.clone();
    let mut pipeline = TrainingPipeline::new(config);
    pipeline
        .run()
        .with_context(|| format!("Training failed for output {:?}", out))?;

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
