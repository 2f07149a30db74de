use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "airq-processor")]
#[command(about = "Rolling-window air-quality history with hour-of-day averages")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: airq.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the history store from the days ending yesterday
    Init {
        #[arg(long, help = "Window capacity in days [default: from configuration]")]
        capacity: Option<u32>,

        #[arg(short, long, help = "Hide the progress bar")]
        quiet: bool,
    },

    /// Fold every day published since the last checkpoint
    Advance {
        #[arg(short, long, help = "Hide the progress bar")]
        quiet: bool,
    },

    /// Hour-of-day averages for one station and pollutant
    Query {
        #[arg(short, long, help = "Station code, e.g. FR04143")]
        station: String,

        #[arg(short, long, help = "Pollutant code: O3, NO2, SO2, PM2.5, PM10, CO")]
        pollutant: String,

        #[arg(short, long, help = "Days to average [default: window capacity]")]
        days: Option<u32>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,

        #[arg(
            long,
            num_args = 0..=1,
            help = "Write a CSV export [default: output/airq-{station}-{pollutant}-{YYMMDD}.csv]"
        )]
        export: Option<Option<PathBuf>>,

        #[arg(long, help = "Advance the store first when it is behind")]
        refresh: bool,
    },

    /// Show checkpoint, staleness and store contents
    Status,

    /// Browse the station directory
    Stations {
        #[arg(short, long)]
        region: Option<String>,

        #[arg(short, long, requires = "region")]
        department: Option<String>,

        #[arg(long, requires_all = ["region", "department"])]
        city: Option<String>,
    },

    /// Pick a station, pollutant and window interactively
    Wizard,
}
