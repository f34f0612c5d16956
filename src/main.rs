mod archive;
mod calendar;
mod config;
mod departures;
mod error;
mod pipeline;
mod records;
mod route_map;
mod schedule;
mod stops;
mod time_ranges;
mod trips;
mod utils;
mod weekly;

#[cfg(test)]
mod test_feed;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use pipeline::{Mode, RunOptions, RunSummary};

#[derive(Parser)]
struct Args {
    /// Local GTFS zip archive
    #[clap(long)]
    gtfs_path: PathBuf,
    #[clap(long, default_value = "config.toml")]
    config_path: PathBuf,
    #[clap(long, value_enum, default_value = "weekly")]
    mode: Mode,
    /// Service day (daily) or first day (weekly), YYYY-MM-DD. Defaults to today.
    #[clap(long)]
    date: Option<NaiveDate>,
    #[clap(long, default_value = "schedule2.txt")]
    schedule_output: PathBuf,
    #[clap(long, default_value = "routes_data.txt")]
    routes_output: PathBuf,
    #[clap(long)]
    skip_routes: bool,
    /// Also write the run summary as run_summary.json into this directory
    #[clap(long)]
    summary_dir: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = config::Config::load(&args.config_path);
    let options = RunOptions {
        gtfs_path: args.gtfs_path,
        mode: args.mode,
        date: args
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        schedule_output: args.schedule_output,
        routes_output: (!args.skip_routes).then_some(args.routes_output),
    };

    let summary = match pipeline::run(&options, &config) {
        Ok(summary) => summary,
        Err(e) => {
            announce(&RunSummary::failed(&options));
            return Err(e.into());
        }
    };
    announce(&summary);
    if let Some(summary_dir) = args.summary_dir {
        utils::write_json_file("run_summary".to_string(), &summary_dir, &summary)?;
    }
    Ok(())
}

/// Hand-off lines for the job that commits the output files.
fn announce(summary: &RunSummary) {
    println!("ACTION_OUTPUT_COMMIT_MESSAGE:{}", summary.commit_message);
    println!(
        "ACTION_OUTPUT_FILES_TO_COMMIT:{}",
        summary.files_to_commit.join(",")
    );
}
