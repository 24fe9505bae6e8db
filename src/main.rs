//! mistctl entry point
//!
//! Thin CLI over the workflow engine: one subcommand per bulk workflow,
//! credentials taken per run and never stored, results printed one line
//! per target with a summary at the end.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mistctl::bulk::BatchReport;
use mistctl::config::Config;
use mistctl::geocode::GeocodeClient;
use mistctl::import::ImportField;
use mistctl::mist::client::{Credential, MistClient};
use mistctl::mist::http::MistHttpClient;
use mistctl::ops::{
    parse_start_time, AutoUpgradeSettings, Operation, SiteTemplate, UpgradePlan, UpgradeStrategy,
    AP_MODELS,
};
use mistctl::resource::{self, SiteCatalog};
use mistctl::workflow::{WorkflowEngine, WorkflowSession};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Bulk operation workflows for Juniper Mist organizations
#[derive(Parser, Debug)]
#[command(name = "mistctl", version, about, long_about = None)]
struct Args {
    /// Mist region (global01 through global04)
    #[arg(short, long)]
    region: Option<String>,

    /// Organization ID
    #[arg(short, long)]
    org: Option<String>,

    /// API token; read from the environment so it never lands in shell history
    #[arg(long, env = "MIST_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Maximum in-flight requests during a bulk run (1 = sequential)
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the organization's sites
    ListSites,

    /// Delete the selected sites
    DeleteSites {
        /// Site id or exact name; repeatable
        #[arg(long = "site", required_unless_present = "all")]
        sites: Vec<String>,

        /// Act on every site in the organization
        #[arg(long, conflicts_with = "sites")]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Schedule a weekly firmware auto-upgrade window on the selected sites
    AutoUpgrade {
        /// Site id or exact name; repeatable
        #[arg(long = "site", required_unless_present = "all")]
        sites: Vec<String>,

        /// Act on every site in the organization
        #[arg(long, conflicts_with = "sites")]
        all: bool,

        /// Day of week for the upgrade window
        #[arg(long, default_value = "sun", value_parser = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"])]
        day: String,

        /// Hour of day for the upgrade window
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=23))]
        hour: u8,

        /// Pin an AP model to a firmware version; repeatable. Unpinned
        /// models are sent with an empty version.
        #[arg(long = "pin", value_name = "MODEL=VERSION")]
        pins: Vec<String>,
    },

    /// Start a phased device upgrade on the selected sites
    DeviceUpgrade {
        /// Site id or exact name; repeatable
        #[arg(long = "site", required_unless_present = "all")]
        sites: Vec<String>,

        /// Act on every site in the organization
        #[arg(long, conflicts_with = "sites")]
        all: bool,

        /// Rollout strategy
        #[arg(long, default_value = "serial", value_parser = ["big_bang", "serial", "canary", "rrm"])]
        strategy: String,

        /// Canary phase percentages
        #[arg(long, value_delimiter = ',', default_values_t = [1, 10, 50, 100])]
        canary_phases: Vec<u32>,

        /// Stop the rollout when this percentage of devices fails
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(0..=99))]
        max_failure_percentage: u8,

        /// Local start time (YYYY-MM-DDTHH:MM); empty starts now
        #[arg(long, default_value = "")]
        start_time: String,
    },

    /// Create sites in bulk from a CSV file
    ImportSites {
        /// CSV file with a header row
        #[arg(long)]
        file: PathBuf,

        /// Header holding the site name
        #[arg(long)]
        name_column: String,

        /// Header holding the street address
        #[arg(long)]
        address_column: String,

        /// Header holding the city
        #[arg(long)]
        city_column: Option<String>,

        /// Header holding the state
        #[arg(long)]
        state_column: Option<String>,

        /// Header holding the zip code
        #[arg(long)]
        zip_column: Option<String>,

        /// Header holding the external id (stored in the site notes)
        #[arg(long)]
        external_id_column: Option<String>,

        /// RF template applied to every created site
        #[arg(long)]
        rftemplate: String,
    },

    /// Export the organization's device inventory as CSV, one file per type
    Inventory {
        /// Output directory for the CSV files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Look up a free-text US address against the geocoding service
    Geocode {
        /// Address to look up
        #[arg(long)]
        address: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return None;
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("mistctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("mistctl").join("mistctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".mistctl").join("mistctl.log");
    }
    PathBuf::from("mistctl.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(all_succeeded) => {
            if all_succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut config = Config::load();
    let region = args
        .region
        .clone()
        .unwrap_or_else(|| config.effective_region());
    let org = args.org.clone().unwrap_or_else(|| config.effective_org());
    let concurrency = args
        .concurrency
        .unwrap_or_else(|| config.effective_concurrency());

    let engine = WorkflowEngine::new(MistHttpClient::new()?).with_concurrency(concurrency);

    match args.command {
        Command::ListSites => {
            let credential = credential_from(&args.token, &region, &org)?;
            let client = MistClient::new(credential)?;
            let catalog = SiteCatalog::fetch(&client).await?;

            if catalog.is_empty() {
                println!("no sites in organization {org}");
            }
            for site in catalog.sites() {
                println!("{}\t{}\t{}", site.id, site.name, site.address);
            }

            remember(&mut config, &region, &org);
            Ok(true)
        }

        Command::DeleteSites { sites, all, yes } => {
            let credential = credential_from(&args.token, &region, &org)?;
            let mut session = WorkflowSession::new(Operation::DeleteSites);

            engine.submit_credentials(&mut session, credential).await?;
            let selectors = if all { session.catalog.ids() } else { sites };
            engine.select(&mut session, &selectors)?;

            println!("About to delete {} sites:", session.selection.len());
            for target in &session.selection {
                println!("  {} ({})", target.name, target.id);
            }

            let confirmed = yes || ask_confirmation("Proceed?")?;
            engine.confirm(&mut session, confirmed)?;
            if !confirmed {
                println!("aborted, nothing deleted");
                return Ok(true);
            }

            let report = engine.execute(&mut session).await?;
            remember(&mut config, &region, &org);
            Ok(print_report(&report))
        }

        Command::AutoUpgrade {
            sites,
            all,
            day,
            hour,
            pins,
        } => {
            let credential = credential_from(&args.token, &region, &org)?;
            let pins = parse_pins(&pins)?;
            let settings = AutoUpgradeSettings::custom(&pins, &day, hour);
            let mut session = WorkflowSession::new(Operation::AutoUpgrade(settings));

            engine.submit_credentials(&mut session, credential).await?;
            let selectors = if all { session.catalog.ids() } else { sites };
            engine.select(&mut session, &selectors)?;
            let report = engine.execute(&mut session).await?;

            remember(&mut config, &region, &org);
            Ok(print_report(&report))
        }

        Command::DeviceUpgrade {
            sites,
            all,
            strategy,
            canary_phases,
            max_failure_percentage,
            start_time,
        } => {
            let credential = credential_from(&args.token, &region, &org)?;
            let plan = UpgradePlan {
                strategy: UpgradeStrategy::parse(&strategy)
                    .with_context(|| format!("unknown strategy '{strategy}'"))?,
                canary_phases,
                max_failure_percentage,
                start_time: parse_start_time(&start_time)?,
            };
            let mut session = WorkflowSession::new(Operation::DeviceUpgrade(plan));

            engine.submit_credentials(&mut session, credential).await?;
            let selectors = if all { session.catalog.ids() } else { sites };
            engine.select(&mut session, &selectors)?;
            let report = engine.execute(&mut session).await?;

            remember(&mut config, &region, &org);
            Ok(print_report(&report))
        }

        Command::ImportSites {
            file,
            name_column,
            address_column,
            city_column,
            state_column,
            zip_column,
            external_id_column,
            rftemplate,
        } => {
            let credential = credential_from(&args.token, &region, &org)?;
            let data = std::fs::read(&file)
                .with_context(|| format!("could not read {}", file.display()))?;

            let mut session =
                WorkflowSession::new(Operation::CreateSites(SiteTemplate::new(&rftemplate)));
            engine.import_file(&mut session, credential, &data)?;

            let mut assignments = vec![
                (ImportField::Name, name_column),
                (ImportField::Address, address_column),
            ];
            if let Some(header) = city_column {
                assignments.push((ImportField::City, header));
            }
            if let Some(header) = state_column {
                assignments.push((ImportField::State, header));
            }
            if let Some(header) = zip_column {
                assignments.push((ImportField::Zip, header));
            }
            if let Some(header) = external_id_column {
                assignments.push((ImportField::ExternalId, header));
            }
            engine.bind_columns(&mut session, &assignments)?;

            let report = engine.execute(&mut session).await?;
            remember(&mut config, &region, &org);
            Ok(print_report(&report))
        }

        Command::Inventory { out_dir } => {
            let credential = credential_from(&args.token, &region, &org)?;
            let client = MistClient::new(credential)?;

            let catalog = SiteCatalog::fetch(&client).await?;
            let devices = resource::fetch_inventory(&client, &catalog).await?;
            if devices.is_empty() {
                println!("no devices in organization {org}");
                return Ok(true);
            }

            let groups = resource::group_by_type(devices);
            let files = resource::export_csv(&groups, &out_dir)?;
            for path in &files {
                println!("wrote {}", path.display());
            }

            remember(&mut config, &region, &org);
            Ok(true)
        }

        Command::Geocode { address } => {
            let mut client = GeocodeClient::new()?;
            let result = client.lookup(&address).await?;

            println!("{}", result.display_name);
            println!(
                "latitude: {}  longitude: {}",
                result.latitude, result.longitude
            );
            Ok(true)
        }
    }
}

/// Build the per-run credential. The token comes from the flag or the
/// environment and exists only for this process.
fn credential_from(token: &Option<String>, region: &str, org: &str) -> Result<Credential> {
    let token = token
        .as_deref()
        .filter(|t| !t.is_empty())
        .context("no API token supplied. Use --token or MIST_API_TOKEN")?;
    if org.is_empty() {
        bail!("no organization ID supplied. Use --org or set one in the config");
    }

    Ok(Credential::new(region, org, token)?)
}

fn parse_pins(pins: &[String]) -> Result<Vec<(String, String)>> {
    pins.iter()
        .map(|pin| {
            let (model, version) = pin
                .split_once('=')
                .with_context(|| format!("pin '{pin}' is not MODEL=VERSION"))?;
            if !AP_MODELS.contains(&model) {
                bail!("unknown AP model '{model}' (known: {})", AP_MODELS.join(", "));
            }
            Ok((model.to_string(), version.to_string()))
        })
        .collect()
}

fn ask_confirmation(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Print the per-target breakdown and the summary; returns whether every
/// target succeeded.
fn print_report(report: &BatchReport) -> bool {
    for outcome in &report.outcomes {
        let marker = if outcome.success { "ok  " } else { "FAIL" };
        println!(
            "{marker} {} ({}): {}",
            outcome.target_name, outcome.target_id, outcome.message
        );
    }
    println!(
        "{} succeeded, {} failed",
        report.summary.succeeded, report.summary.failed
    );

    report.all_succeeded()
}

/// Remember the last used region and organization for the next run. Never
/// the token.
fn remember(config: &mut Config, region: &str, org: &str) {
    if let Err(err) = config.remember(region, org) {
        tracing::warn!("could not save config: {err}");
    }
}
