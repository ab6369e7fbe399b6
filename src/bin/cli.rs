#![cfg(not(tarpaulin_include))]

use clinic_dashboard::dashboard::DashboardState;
use clinic_dashboard::graph::{GraphOptions, render_png};
use clinic_dashboard::loader;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Builds the dashboard for a local file and prints it as JSON
///
/// With a second argument the five charts are also written there as PNGs.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <visits.csv|visits.xlsx> [png_dir]", args[0]);
        return Ok(());
    }

    let path = Path::new(&args[1]);
    let bytes = fs::read(path)?;
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    let state = DashboardState::from_ingestion(loader::parse_file(filename, &bytes));
    println!("{}", serde_json::to_string_pretty(&state)?);

    if let Some(dir) = args.get(2) {
        fs::create_dir_all(dir)?;
        let options = GraphOptions::default();

        for (name, spec) in state.charts() {
            let out = PathBuf::from(dir).join(format!("{}.png", name));
            fs::write(&out, render_png(spec, &options)?)?;
            log::info!("Wrote {}", out.display());
        }
    }

    Ok(())
}
