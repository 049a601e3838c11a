use clap::{Parser, Subcommand};
use fanout::config::{ConfigLoader, FetchConfig};
use fanout::fanout::{BatchOutcome, FanOutEngine};
use fanout::fetcher::{HttpFetcher, build_client};
use fanout::metrics::snapshot::MetricsSnapshot;
use fanout::output;
use fanout::source::{AddressSource, HttpSource, StaticSource};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(version = "0.1.0")]
#[command(about = "Fetch a list of URLs concurrently under a global deadline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch from a config file
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Show a progress spinner (stderr)
        #[arg(short, long)]
        progress: bool,
    },
    /// Fetch every URL listed by LIST_URL, printing bodies to stdout
    Fetch {
        /// Endpoint returning one URL per line
        list_url: String,

        /// Global deadline in milliseconds
        #[arg(short, long, default_value_t = 6000)]
        deadline_ms: u64,

        /// Show a progress spinner (stderr)
        #[arg(short, long)]
        progress: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info"); }
    }
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, progress } => {
            let multi = init_logging(progress)?;

            log::info!("Loading config from {:?}", config);
            let config_data = ConfigLoader::load(&config)?;
            log::info!("Loaded batch: {}", config_data.name);

            run_batch(&config_data, multi).await?;
        }
        Commands::Fetch { list_url, deadline_ms, progress } => {
            let multi = init_logging(progress)?;

            let config_data = FetchConfig {
                name: "fetch".to_string(),
                list_url: Some(list_url),
                addresses: Vec::new(),
                deadline_ms: Some(deadline_ms),
                request_timeout_ms: None,
                user_agent: Some(format!("fanout/{}", env!("CARGO_PKG_VERSION"))),
                output: None,
                extends: None,
            };
            run_batch(&config_data, multi).await?;
        }
        Commands::Check { config } => {
            match ConfigLoader::load(&config) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Name: {}", cfg.name);
                    match &cfg.list_url {
                        Some(url) => println!("   List URL: {}", url),
                        None => println!("   Addresses: {}", cfg.addresses.len()),
                    }
                    println!("   Deadline: {}ms", cfg.deadline().as_millis());
                    println!("   Output: {:?}", cfg.output);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(progress: bool) -> anyhow::Result<Option<Arc<MultiProgress>>> {
    let logger = env_logger::Builder::from_default_env().build();

    if progress {
        let multi = Arc::new(MultiProgress::new());
        indicatif_log_bridge::LogWrapper::new((*multi).clone(), logger).try_init()?;
        Ok(Some(multi))
    } else {
        let level = logger.filter();
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(None)
    }
}

async fn run_batch(config: &FetchConfig, multi: Option<Arc<MultiProgress>>) -> anyhow::Result<()> {
    let client = build_client(config.user_agent(), config.request_timeout())?;
    let source: Box<dyn AddressSource> = match &config.list_url {
        Some(url) => Box::new(HttpSource::new(client.clone(), url)?),
        None => Box::new(StaticSource::new(config.addresses.clone())),
    };
    let fetcher = Arc::new(HttpFetcher::new(client));

    let sink_multi = match config.output {
        None | Some(fanout::config::OutputConfig::Console) => multi.clone(),
        _ => None,
    };
    let sink = output::shared(ConfigLoader::create_output(config, sink_multi)?);

    let engine = FanOutEngine::new(config.deadline(), None);

    let mut progress_task = None;
    let mut spinner = None;
    if let Some(multi) = &multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));

        let pb_clone = pb.clone();
        let metrics = WatchStream::new(engine.watch_metrics());
        spinner = Some(pb);
        progress_task = Some(tokio::spawn(metrics.for_each(move |snapshot: MetricsSnapshot| {
            pb_clone.set_message(format!(
                "Queued: {} | Active: {} | OK: {} | Failed: {} | RPS: {:.2}",
                snapshot.addresses_queued,
                snapshot.active_tasks,
                snapshot.fetches_succeeded,
                snapshot.fetches_failed,
                snapshot.requests_per_second
            ));
            futures::future::ready(())
        })));
    }

    log::info!("Starting batch with a {}ms deadline...", config.deadline().as_millis());
    let report = engine.run(source.as_ref(), fetcher, sink.clone()).await?;

    if let Some(task) = progress_task {
        task.abort();
    }
    if let Some(pb) = spinner {
        pb.finish_with_message(report.to_string());
    }

    if let Err(e) = sink.lock().await.close().await {
        log::warn!("Failed to close output: {}", e);
    }

    let final_metrics = engine.get_metrics();
    let banner = match report.outcome {
        BatchOutcome::Completed => "✅ Batch Completed:",
        BatchOutcome::TimedOut => "⏱️  Batch Timed Out:",
    };
    eprintln!("\n{}", banner);
    eprintln!("   Results: {}", report.successes);
    eprintln!("   Launched: {}", report.launched);
    eprintln!("   Failed: {}", final_metrics.fetches_failed);
    eprintln!("   Average Duration: {}ms", final_metrics.avg_response_time_ms);
    eprintln!("   Total Time: {:.1}s", report.elapsed_ms as f64 / 1000.0);

    Ok(())
}
