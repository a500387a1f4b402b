//! # GramReach — Instagram DM outreach automation
//!
//! Usage:
//!   gramreach gateway                    # HTTP control surface + scheduler
//!   gramreach run --profiles list.csv --username me --password secret --message "hi"
//!   gramreach results --export out.csv

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gramreach_campaign::{ProgressTracker, run};
use gramreach_core::config::GramReachConfig;
use gramreach_core::types::SendStatus;
use gramreach_session::InstagramSession;
use gramreach_store::{ResultLog, load_profiles_file};

#[derive(Parser)]
#[command(
    name = "gramreach",
    version,
    about = "📨 GramReach: paced Instagram DM campaigns with dedup, scheduling, and a JSON API"
)]
struct Cli {
    /// Config file path (default: ~/.gramreach/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Data directory (profile uploads and the result log)
    #[arg(long)]
    data_dir: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP control surface and the schedule worker
    Gateway {
        /// Bind host
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one campaign from the terminal
    Run(RunArgs),
    /// Show logged results
    Results {
        /// Write the raw result CSV to a file instead of printing
        #[arg(long)]
        export: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Profile list CSV (must contain a URL column)
    #[arg(long)]
    profiles: String,

    /// Instagram username
    #[arg(long)]
    username: String,

    /// Instagram password
    #[arg(long)]
    password: String,

    /// Message text sent to every profile
    #[arg(long)]
    message: Option<String>,

    /// Read the message text from a file
    #[arg(long, conflicts_with = "message")]
    message_file: Option<String>,

    /// Per-run send cap
    #[arg(long)]
    max_messages: Option<u32>,

    /// Seconds of sending before a cooldown kicks in
    #[arg(long)]
    time_interval: Option<u64>,

    /// Cooldown lower bound, minutes
    #[arg(long)]
    cooldown_min: Option<u64>,

    /// Cooldown upper bound, minutes
    #[arg(long)]
    cooldown_max: Option<u64>,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "gramreach=debug,gramreach_core=debug,gramreach_store=debug,gramreach_session=debug,\
         gramreach_campaign=debug,gramreach_scheduler=debug,gramreach_gateway=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => GramReachConfig::load_from(Path::new(&expand_path(path)))?,
        None => {
            let config = GramReachConfig::load()?;
            if !GramReachConfig::default_path().exists() {
                config.save()?;
                tracing::info!(
                    "📝 Wrote default config to {}",
                    GramReachConfig::default_path().display()
                );
            }
            config
        }
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = expand_path(dir);
    }

    match cli.command {
        Command::Gateway { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }

            println!("📨 GramReach v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "   🌐 Gateway:    http://{}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   📂 Data Dir:   {}", config.resolve_data_dir().display());
            println!(
                "   📅 Schedules:  {}",
                config.scheduler_dir().join("tasks.json").display()
            );
            println!("   🚗 WebDriver:  {}", config.webdriver.endpoint);
            println!();

            gramreach_gateway::start(config).await?;
        }
        Command::Run(args) => run_campaign(config, args).await?,
        Command::Results { export } => show_results(&config, export)?,
    }

    Ok(())
}

/// Drive one campaign in the foreground. Ctrl-C stops it after the
/// profile currently being worked.
async fn run_campaign(config: GramReachConfig, args: RunArgs) -> Result<()> {
    config.ensure_dirs()?;

    let message = match (args.message, args.message_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(expand_path(&path))?
            .trim_end()
            .to_string(),
        (None, None) => anyhow::bail!("Provide --message or --message-file"),
    };

    let mut campaign = config
        .sending
        .to_campaign(&args.username, &args.password, &message);
    if let Some(n) = args.max_messages {
        campaign.max_messages = n;
    }
    if let Some(n) = args.time_interval {
        campaign.time_interval_secs = n;
    }
    if let Some(n) = args.cooldown_min {
        campaign.cooldown_min_mins = n;
    }
    if let Some(n) = args.cooldown_max {
        campaign.cooldown_max_mins = n;
    }
    campaign.validate()?;

    let profiles = load_profiles_file(Path::new(&expand_path(&args.profiles)))?;
    let log = ResultLog::new(config.results_file());

    println!("📨 GramReach v{}", env!("CARGO_PKG_VERSION"));
    println!("   👤 Account:   {}", campaign.username);
    println!("   📋 Profiles:  {}", profiles.len());
    println!("   🔒 Limit:     {}", campaign.max_messages);
    println!("   💾 Results:   {}", log.path().display());
    println!();

    let mut session = InstagramSession::open(&config.webdriver).await?;

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrlc_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n🛑 Stopping after the current profile...");
            ctrlc_flag.store(true, Ordering::SeqCst);
        }
    });

    let (mut progress, _rx) =
        ProgressTracker::channel(profiles.len() as u32, campaign.max_messages);
    let summary = run(
        &mut session,
        &profiles,
        &campaign,
        &log,
        &cancel,
        &mut progress,
    )
    .await;

    println!();
    println!("🏁 {} message(s) sent ({:?})", summary.sent, summary.reason);
    Ok(())
}

fn show_results(config: &GramReachConfig, export: Option<String>) -> Result<()> {
    let log = ResultLog::new(config.results_file());
    let records = log.all_records();
    if records.is_empty() {
        println!("No results yet ({}).", log.path().display());
        return Ok(());
    }

    if let Some(path) = export {
        let path = expand_path(&path);
        std::fs::write(&path, log.export_csv())?;
        println!("💾 Exported {} record(s) to {path}", records.len());
        return Ok(());
    }

    let sent = records
        .iter()
        .filter(|r| r.status == SendStatus::Success)
        .count();
    println!(
        "📊 {} attempt(s): {} sent, {} failed ({})",
        records.len(),
        sent,
        records.len() - sent,
        log.path().display()
    );
    for record in &records {
        println!(
            "{}  {:<7}  {}",
            record.timestamp,
            record.status.as_str(),
            record.profile
        );
    }
    Ok(())
}
