use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use stormwatch::config::AppConfig;
use stormwatch::core::actions;
use stormwatch::core::jobs::{CronScheduler, DATA_UPDATE_JOB, JobController, poll_cron};
use stormwatch::core::notify::Notifier;
use stormwatch::core::store::{KvStore, SqliteStore};
use stormwatch::core::sync::DataUpdater;
use stormwatch::core::sync::repost::{HttpPublisher, SummaryPublisher};
use stormwatch::logging;

fn print_help() {
    println!("Usage: stormwatch [--config <path>] [command]\n");
    println!("Commands:");
    println!("  run      Reconcile the schedule and run the updater (default)");
    println!("  start    Enable and schedule the data updater, then exit");
    println!("  stop     Cancel and disable the data updater, then exit");
    println!("  refresh  Clear the sync token and force one update cycle");
    println!("  post     Manually create a new summary post");
}

struct Wiring {
    config: AppConfig,
    store: Arc<dyn KvStore>,
    controller: JobController,
    scheduler: Arc<CronScheduler>,
    updater: Arc<DataUpdater>,
    publisher: Arc<dyn SummaryPublisher>,
}

async fn wire(config: AppConfig) -> Result<Wiring> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&config.database_path)?);
    let notifier = Arc::new(Notifier::new(store.clone(), &config));
    let publisher: Arc<dyn SummaryPublisher> = Arc::new(HttpPublisher::new(&config));
    let updater = Arc::new(DataUpdater::new(
        &config,
        store.clone(),
        notifier,
        publisher.clone(),
    ));

    let scheduler = Arc::new(CronScheduler::new().await?);
    scheduler
        .register(DATA_UPDATE_JOB.name, updater.clone())
        .await;
    let controller = JobController::new(scheduler.clone(), store.clone());

    Ok(Wiring {
        config,
        store,
        controller,
        scheduler,
        updater,
        publisher,
    })
}

async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<String> = None;
    let mut command = "run".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                command = other.to_string();
                i += 1;
            }
        }
    }

    let config = match &config_path {
        Some(path) => AppConfig::load(Path::new(path))?,
        None => AppConfig::default(),
    };

    let wiring = wire(config).await?;
    match command.as_str() {
        "run" => {
            // Reconcile the persisted enablement with this process's
            // scheduler, exactly as after a version upgrade.
            let cron = poll_cron(wiring.config.poll_frequency_minutes);
            wiring.controller.on_upgrade(&DATA_UPDATE_JOB, &cron).await?;
            wiring.scheduler.start().await?;
            info!("stormwatch is running; press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutting down");
        }
        "start" => {
            let outcome = actions::start_updater(&wiring.controller, &wiring.config).await;
            println!("{}", outcome.message);
        }
        "stop" => {
            let outcome = actions::stop_updater(&wiring.controller).await;
            println!("{}", outcome.message);
        }
        "refresh" => {
            let outcome = actions::force_refresh(&wiring.store, &wiring.updater).await;
            println!("{}", outcome.message);
        }
        "post" => {
            let outcome = actions::create_post(&wiring.store, &wiring.publisher).await;
            println!("{}", outcome.message);
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = run_main().await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
