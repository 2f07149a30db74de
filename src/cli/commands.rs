use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::args::{Cli, Commands};
use crate::cli::wizard::{Wizard, WizardInput, WizardState};
use crate::config::AppConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{Pollutant, StationDirectory};
use crate::processors::{HourlyAverages, QueryService, WindowAdvancer};
use crate::readers::{SourceFetcher, StationReader};
use crate::store::{HistoryStore, SharedStore};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::filename::default_export_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::CsvWriter;

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Init { capacity, quiet } => {
            let capacity = capacity.unwrap_or(config.window_capacity);
            let store = HistoryStore::new(capacity)?.into_shared();
            let advancer = build_advancer(&config, store, clock)?;
            watch_ctrl_c(advancer.cancel_handle());

            println!("Initializing history store...");
            println!("Window capacity: {} days", capacity);
            println!("Store directory: {}", config.store_dir.display());

            let progress =
                ProgressReporter::for_days(capacity as u64, "Fetching daily files...", quiet);
            let report = advancer.initialize(capacity, Some(&progress)).await?;
            progress.finish_with_message(&format!("Folded {} days", report.days_folded()));

            println!("\n{}", report.summary());
            if report.cancelled && report.days_folded() == 0 {
                println!("Cancelled before the first day, existing store left unchanged");
            } else if report.cancelled {
                println!("Run `advance` to complete the remaining days");
            }
        }

        Commands::Advance { quiet } => {
            let store = open_store(&config).await?;
            let advancer = build_advancer(&config, store, clock)?;
            watch_ctrl_c(advancer.cancel_handle());

            let lag = advancer
                .lag_days()
                .await
                .ok_or(ProcessingError::NotInitialized)?;
            if lag == 0 {
                println!("History store is up to date");
                return Ok(());
            }

            let progress = ProgressReporter::for_days(lag as u64, "Advancing window...", quiet);
            let report = advancer.advance_with_progress(Some(&progress)).await?;
            progress.finish_with_message(&format!("Folded {} days", report.days_folded()));

            println!("\n{}", report.summary());
        }

        Commands::Query {
            station,
            pollutant,
            days,
            json,
            export,
            refresh,
        } => {
            let store = open_store(&config).await?;
            if refresh {
                let advancer = build_advancer(&config, Arc::clone(&store), Arc::clone(&clock))?;
                let spinner = ProgressReporter::new_spinner("Refreshing history store...", json);
                let refreshed = advancer.ensure_fresh().await?;
                spinner.finish_with_message("Refresh finished");
                if let Some(report) = refreshed {
                    info!(days = report.days_folded(), "store refreshed before query");
                }
            }

            let capacity = store.read().await.capacity();
            let directory = load_directory(&config)?;
            let service = QueryService::new(store, Arc::new(directory), Arc::clone(&clock));
            let averages = service
                .hourly_averages(&station, &pollutant, days.unwrap_or(capacity))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&averages)?);
            } else {
                print_averages(&averages);
            }

            if let Some(path) = export {
                let path = path.unwrap_or_else(|| {
                    default_export_filename(&averages.station, averages.pollutant, clock.today())
                });
                let rows = CsvWriter::new().write_averages(&averages, &path)?;
                println!("Exported {} rows to {}", rows, path.display());
            }
        }

        Commands::Status => {
            let persistence = config.persistence();
            let Some(store) = persistence.load()? else {
                println!("History store not initialized (run `init`)");
                return Ok(());
            };

            let target = clock.yesterday();
            println!("=== History Store ===");
            println!("Location: {}", persistence.dir().display());
            println!("Window capacity: {} days", store.capacity());
            match store.checkpoint() {
                Some(checkpoint) => {
                    let lag = (target - checkpoint).num_days().max(0);
                    println!("Checkpoint: {}", checkpoint);
                    if lag == 0 {
                        println!("Up to date");
                    } else {
                        println!("Behind by {} day(s), run `advance`", lag);
                    }
                }
                None => println!("Checkpoint: none"),
            }
            println!("Series: {}", store.series_count());
            println!("Stations observed: {}", store.observed_stations().len());

            let halted: Vec<String> = store.halted_keys().map(|k| k.to_string()).collect();
            if !halted.is_empty() {
                println!("Halted series: {}", halted.len());
                for key in halted.iter().take(20) {
                    println!("  {}", key);
                }
            }
        }

        Commands::Stations {
            region,
            department,
            city,
        } => {
            let directory = load_directory(&config)?;
            println!("{} stations in directory", directory.len());

            match (region, department, city) {
                (Some(region), Some(department), Some(city)) => {
                    for station in directory.stations(&region, &department, &city) {
                        let pollutants: Vec<&str> =
                            station.pollutants.iter().map(Pollutant::code).collect();
                        println!("  {} [{}]", station.label(), pollutants.join(", "));
                    }
                }
                (Some(region), Some(department), None) => {
                    for city in directory.cities(&region, &department) {
                        let count = directory.stations(&region, &department, city).len();
                        println!("  {} ({} stations)", city, count);
                    }
                }
                (Some(region), None, _) => {
                    for department in directory.departments(&region) {
                        println!("  {}", department);
                    }
                }
                _ => {
                    for region in directory.regions() {
                        println!("  {} ({} departments)", region, directory.departments(region).len());
                    }
                }
            }
        }

        Commands::Wizard => {
            let store = open_store(&config).await?;
            let directory = load_directory(&config)?;
            let (capacity, observed) = {
                let guard = store.read().await;
                let observed: HashMap<_, _> = guard
                    .observed_stations()
                    .into_iter()
                    .map(|station| (station.to_string(), guard.observed_pollutants(station)))
                    .collect();
                (guard.capacity(), observed)
            };

            let selection = {
                let wizard = Wizard::new(&directory, capacity).with_observed_pollutants(observed);
                run_wizard(&wizard).await?
            };

            if let WizardState::Done(selection) = selection {
                let service = QueryService::new(store, Arc::new(directory), clock);
                let averages = service
                    .hourly_averages(&selection.station, selection.pollutant.code(), selection.n_days)
                    .await?;
                print_averages(&averages);
            }
        }
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<SharedStore> {
    let store = match config.persistence().load()? {
        Some(store) => {
            if store.capacity() != config.window_capacity {
                warn!(
                    stored = store.capacity(),
                    configured = config.window_capacity,
                    "persisted capacity differs from configuration, keeping persisted"
                );
            }
            store
        }
        None => {
            warn!(dir = %config.store_dir.display(), "no persisted history store found");
            HistoryStore::new(config.window_capacity)?
        }
    };
    Ok(store.into_shared())
}

fn build_advancer(
    config: &AppConfig,
    store: SharedStore,
    clock: Arc<dyn Clock>,
) -> Result<WindowAdvancer<SourceFetcher>> {
    Ok(WindowAdvancer::new(store, config.build_fetcher()?, clock)
        .with_persistence(config.persistence())
        .with_fetch_timeout(config.fetch_timeout()))
}

fn load_directory(config: &AppConfig) -> Result<StationDirectory> {
    StationReader::new().read_directory(&config.stations_file)
}

/// Ctrl-C stops the running tick between two days.
fn watch_ctrl_c(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current day");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

async fn run_wizard(wizard: &Wizard<'_>) -> Result<WizardState> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = WizardState::Region;

    while !state.is_finished() {
        println!("\n{}", wizard.prompt(&state));
        for (i, option) in wizard.options(&state).iter().enumerate() {
            println!("  {:>3}. {}", i + 1, option);
        }
        println!("('b' back, 'q' quit)");

        let Some(line) = lines.next_line().await? else {
            return Ok(WizardState::Quit);
        };
        let Some(input) = WizardInput::parse(&line) else {
            println!("Unrecognized input: {}", line.trim());
            continue;
        };
        match wizard.transition(&state, input) {
            Ok(next) => state = next,
            Err(e) => println!("{}", e),
        }
    }

    Ok(state)
}

fn print_averages(averages: &HourlyAverages) {
    println!(
        "\n{} {} over {} day(s) ({} hours with data)",
        averages.station,
        averages.pollutant.display_name(),
        averages.n_days,
        averages.hours_with_data
    );
    let bands = averages.bands();
    for (hour, value) in &averages.values {
        let band = bands.get(hour).map(|b| b.label()).unwrap_or_default();
        println!(
            "  {:02}h  {:>8.2} {}  {}",
            hour,
            value,
            averages.pollutant.units(),
            band
        );
    }
    if let Some((hour, value)) = averages.peak() {
        println!("Peak: {:02}h at {:.2} {}", hour, value, averages.pollutant.units());
    }
}
