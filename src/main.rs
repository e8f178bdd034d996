mod cli;
mod config;
mod error;
mod metrics;
mod prober;
mod report;
mod runner;
mod scheduler;
mod search;
mod util;

#[cfg(test)]
mod test_support;

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use cli::{Cli, Command};
use config::{ConfigLoader, LogFormat, TtfbConfig};
use metrics::Metrics;
use prober::{Transport, TransportSettings};
use runner::{Target, run_observed};
use scheduler::Scheduler;
use search::Searcher;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("ttfb version [{}]", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load config first to get log level
    let config = {
        let loader = ConfigLoader::from_cli(&cli)?;
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        loader
            .load(&cli, &mut input, &mut output)
            .with_context(|| format!("loading {}", loader.env_path().display()))?
    };
    init_tracing(&config)?;
    debug!("effective config: {}", serde_json::to_string(&config)?);

    let searcher = Searcher::new(&config.search)?;
    debug!("searching response bodies for {}", searcher.pattern());
    let metrics = Metrics::new(config.enable_latency_history)?;
    let transport = Transport::new(TransportSettings {
        proxy_from_env: !cli.no_proxy,
        ..TransportSettings::default()
    });
    let scheduler = Scheduler::new(config.interval_ms, config.repeat)?;
    let target = Target {
        url: config.url.clone(),
        no_cache: config.no_cache,
        deadline: config.timeout(),
    };

    let failures = AtomicU32::new(0);
    let (transport, target, searcher, metrics, failures) =
        (&transport, &target, &searcher, &metrics, &failures);
    let json = cli.json;
    scheduler
        .run(move |run| async move {
            info!("run {} against {}", run + 1, target.url);
            if !json {
                println!("Starting ttfb to {} ", target.url);
            }
            match run_observed(transport, target, searcher, metrics).await {
                Ok(report) if json => match report.render_json() {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("failed to encode report: {e}");
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                },
                Ok(report) => print!("{}", report.render_text()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    failures.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .await;

    if cli.metrics {
        print!("{}", metrics.render()?);
    }

    let failed = failures.load(Ordering::SeqCst);
    if failed > 0 {
        anyhow::bail!("{failed} of {} measurements failed", config.repeat);
    }
    Ok(())
}

fn init_tracing(config: &TtfbConfig) -> anyhow::Result<()> {
    let log_level = config.get_tracing_level()?;
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ttfb={}", log_level.as_str().to_lowercase()).parse()?);
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}
