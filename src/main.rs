// Report binary for the housing indicator dataset.
//
// Option [1] loads and normalizes the CSV and prints load diagnostics.
// Option [2] applies the dashboard filters and writes the city snapshot,
// growth, correlation and housing-unit reports plus a JSON summary.
// `--batch` runs both once and exits.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use housing_insights::grouping::CityScope;
use housing_insights::loader::{self, LoadReport};
use housing_insights::process::{DashboardFilter, ZeroPolicy};
use housing_insights::types::{Metric, Record};
use housing_insights::{output, reports, util};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ZeroArg {
    Keep,
    Exclude,
}

impl From<ZeroArg> for ZeroPolicy {
    fn from(z: ZeroArg) -> Self {
        match z {
            ZeroArg::Keep => ZeroPolicy::Keep,
            ZeroArg::Exclude => ZeroPolicy::Exclude,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Housing market and short-term rental indicator reports")]
struct Cli {
    /// CSV export with one row per city and period
    #[arg(default_value = "housing_data.csv")]
    input: PathBuf,

    /// Directory the report files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Only include this city
    #[arg(long)]
    city: Option<String>,

    /// Only include this year
    #[arg(long)]
    year: Option<i32>,

    /// Only include this quarter (1-4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    quarter: Option<u8>,

    /// Comma-separated metrics for the correlation matrix
    #[arg(long)]
    fields: Option<String>,

    /// Whether zero counts as a valid value when gating correlation input
    #[arg(long, value_enum, default_value_t = ZeroArg::Keep)]
    zero_policy: ZeroArg,

    /// Load and report once, without the interactive menu
    #[arg(long)]
    batch: bool,
}

// Loaded once per run so reports can be regenerated without re-reading the file.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { data: None }));

struct AppState {
    data: Option<(Vec<Record>, LoadReport)>,
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` for `Y`, `false` for `N`; asks again otherwise.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn handle_load(cli: &Cli) -> bool {
    match loader::load_from_path(&cli.input) {
        Ok((data, load_report)) => {
            println!(
                "Processing dataset... ({} records loaded for {} cities)",
                util::format_int(load_report.records),
                util::format_int(load_report.cities)
            );
            if load_report.dropped_lines > 0 {
                println!(
                    "Note: {} of {} lines dropped due to a field-count mismatch.",
                    util::format_int(load_report.dropped_lines),
                    util::format_int(load_report.data_lines)
                );
            }
            if load_report.invalid_dates > 0 {
                println!(
                    "Note: {} records have no usable date.",
                    util::format_int(load_report.invalid_dates)
                );
            }
            if load_report.recomputed_ratios > 0 {
                println!(
                    "Info: Derived airbnb_ratio for {} records.",
                    util::format_int(load_report.recomputed_ratios)
                );
            }
            println!();
            let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
            state.data = Some((data, load_report));
            true
        }
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("Failed to load file: {}\n", e);
            false
        }
    }
}

fn log_write(what: &str, path: &Path, result: housing_insights::Result<()>) {
    match result {
        Ok(()) => info!(path = %path.display(), "wrote {}", what),
        Err(e) => error!(path = %path.display(), error = %e, "failed to write {}", what),
    }
}

fn handle_generate_reports(cli: &Cli, fields: &[Metric]) -> Result<()> {
    let data = {
        let state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
        state.data.clone()
    };
    let Some((all, load_report)) = data else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return Ok(());
    };

    let filter = DashboardFilter {
        city: cli.city.clone(),
        year: cli.year,
        quarter: cli.quarter,
    };
    let records = filter.apply(&all);
    if !filter.is_all() {
        println!(
            "Filter applied: {} of {} records selected.\n",
            util::format_int(records.len()),
            util::format_int(all.len())
        );
    }

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    println!("Generating reports...\n");

    let r1 = reports::city_snapshot_rows(&records);
    let file1 = cli.out_dir.join("city_snapshots.csv");
    log_write("city snapshots", &file1, output::write_csv(&file1, &r1));
    println!("Report 1: Latest Metrics by City\n");
    output::preview_table_rows(&r1, 5);

    let r2 = reports::growth_rows(&records);
    let file2 = cli.out_dir.join("growth.csv");
    log_write("growth", &file2, output::write_csv(&file2, &r2));
    println!("Report 2: Growth Analysis by City (first vs last period)\n");
    output::preview_table_rows(&r2, 5);

    let matrix = reports::correlation_view(&records, fields, cli.zero_policy.into());
    let file3 = cli.out_dir.join("correlations.csv");
    log_write("correlations", &file3, output::write_matrix_csv(&file3, &matrix));
    println!("Report 3: Metric Correlations (Pearson)\n");
    output::preview_matrix(&matrix);

    // The all-cities average needs every city, so only the period filters
    // narrow this input; the city goes into the scope instead.
    let period_only = DashboardFilter {
        city: None,
        ..filter
    };
    let scope = match &cli.city {
        Some(c) => CityScope::City(c.clone()),
        None => CityScope::All,
    };
    let r4 = reports::units_rows(&period_only.apply(&all), &scope);
    let file4 = cli.out_dir.join("housing_units.csv");
    log_write("housing units", &file4, output::write_csv(&file4, &r4));
    println!("Report 4: Housing Units Composition\n");
    output::preview_table_rows(&r4, 8);

    let summary = reports::generate_summary(&records, &load_report, &matrix);
    let file5 = cli.out_dir.join("summary.json");
    log_write("summary", &file5, output::write_json(&file5, &summary));
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"total_records\": {}, \"total_cities\": {}, \"periods\": \"{} .. {}\"}}\n",
        summary.total_records,
        summary.total_cities,
        summary.first_period.as_deref().unwrap_or("-"),
        summary.last_period.as_deref().unwrap_or("-")
    );
    println!("Outputs saved to {}\n", cli.out_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let fields = match &cli.fields {
        Some(s) => Metric::parse_list(s).context("invalid --fields")?,
        None => Metric::CORRELATION_DEFAULT.to_vec(),
    };

    if cli.batch {
        if !handle_load(&cli) {
            anyhow::bail!("could not load {}", cli.input.display());
        }
        return handle_generate_reports(&cli, &fields);
    }

    loop {
        println!("Housing Insights:");
        println!("[1] Load the file");
        println!("[2] Generate Reports");
        println!("[3] Exit\n");
        match read_choice().as_str() {
            "1" => {
                handle_load(&cli);
            }
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&cli, &fields) {
                    eprintln!("Report error: {:#}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" | "" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
    Ok(())
}
