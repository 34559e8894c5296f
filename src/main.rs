// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use temple_map::{
    build_map, load, write_page, Config, Dataset, MapOptions, MapOutcome, Selection, Summary,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    match args.get(1).map(String::as_str) {
        Some("summary") => {
            init_logging();
            run_summary(&config)?;
        }
        Some("export") => {
            init_logging();
            let out = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("temple_map.html"));
            run_export(&config, &out)?;
        }
        Some("tui") | None => run_ui_mode(&config)?,
        Some(other) => {
            eprintln!("❌ Unknown command: {}", other);
            eprintln!("   Usage: temple-map [tui|summary|export <out.html>]");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for reports
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Fetch failure is fatal: report it and stop before rendering anything
fn load_or_exit(config: &Config) -> Dataset {
    println!("📂 Loading temples from {}", config.data);
    match load(&config.data) {
        Ok(dataset) => {
            println!(
                "✓ Loaded {} temples ({} without coordinates)\n",
                dataset.len(),
                dataset.unmappable
            );
            dataset
        }
        Err(e) => {
            eprintln!("❌ Could not load temple data: {}", e);
            eprintln!("   Set TEMPLE_MAP_DATA to a reachable URL or a local CSV path.");
            std::process::exit(1);
        }
    }
}

fn run_summary(config: &Config) -> Result<()> {
    let dataset = load_or_exit(config);
    let summary = Summary::compute(&dataset, &Selection::All);

    println!("📊 데이터 통계");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", summary.headline());
    println!("지도 표시 가능: {} (좌표 없음 {})", summary.mappable, summary.unmappable);

    println!("\n종단별 사찰 수");
    for (affiliation, count) in &summary.by_affiliation.entries {
        println!("  {:<24} {:>6}", affiliation, count);
    }

    println!("\n시도별 사찰 수");
    for (province, count) in &summary.by_province.entries {
        println!("  {:<24} {:>6}", province, count);
    }

    Ok(())
}

fn run_export(config: &Config, out: &Path) -> Result<()> {
    let dataset = load_or_exit(config);
    let options = MapOptions {
        zoom: config.zoom,
        ..MapOptions::default()
    };

    let outcome = build_map(&dataset, &Selection::All, &options);
    let summary = Summary::compute(&dataset, &Selection::All);

    if let MapOutcome::Map(view) = &outcome {
        println!(
            "🗺️  {} markers in {} overlay groups, centered at ({:.4}, {:.4})",
            view.marker_count(),
            view.groups.len(),
            view.center.0,
            view.center.1
        );
    } else if let Some(warning) = outcome.warning() {
        println!("⚠️  {}", warning);
    }

    write_page(out, &outcome, &summary)
        .with_context(|| format!("Failed to export map page to {}", out.display()))?;
    println!("✅ Map page written to {}", out.display());

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    println!("🖥️  Loading Korean Temple Map UI...\n");

    let dataset = load_or_exit(config);

    println!("Starting UI... (Press 'q' to quit)\n");

    // Create and run app
    let mut app = ui::App::new(dataset, config.zoom);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use web UI: cargo run --bin temple-server --features server");
    std::process::exit(1);
}
