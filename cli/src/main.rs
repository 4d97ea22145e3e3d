use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use spyglass_cli::api::HypixelAdapter;
use spyglass_cli::lexer;
use spyglass_cli::tail::LogTail;
use spyglass_core::nicks::{self, NickDatabase};
use spyglass_core::settings::{Settings, api_key_is_valid};
use spyglass_core::{Controller, OverlayService};
use spyglass_types::{OverlayUpdate, Severity};

#[derive(Parser)]
#[command(version, about = "Bedwars lobby stats overlay")]
struct Cli {
    /// Log file to follow (defaults to the standard client location)
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Replay the existing file before following new lines
    #[arg(long)]
    from_start: bool,

    /// Override the configured fetch worker count
    #[arg(long)]
    workers: Option<usize>,

    /// Render poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval: u64,
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    let mut settings: Settings =
        confy::load("spyglass", None).map_err(|err| format!("failed to load settings: {err}"))?;
    if let Some(workers) = cli.workers {
        settings.worker_count = workers.max(1);
    }
    if !api_key_is_valid(&settings.api_key) {
        warn!("API key looks invalid; stats fetches will fail until it is set");
        eprintln!("Warning: no valid API key configured. Set `api_key` in the settings file.");
    }

    let nick_database = load_nick_database(&settings);
    let provider = Arc::new(HypixelAdapter::new(&settings.api_key));
    let controller = Arc::new(
        Controller::new(settings, nick_database, provider).on_settings_change(|settings| {
            if let Err(err) = confy::store("spyglass", None, settings) {
                warn!(%err, "failed to persist settings");
            }
        }),
    );

    let logfile = cli
        .logfile
        .or_else(default_logfile)
        .ok_or("no logfile found; pass one with --logfile")?;
    println!("Following {}", logfile.display());

    let tail = LogTail::open(&logfile, cli.from_start)
        .map_err(|err| format!("failed to open {}: {err}", logfile.display()))?;

    let service = OverlayService::start(controller, lexer::parse_line, tail);

    let interval = Duration::from_millis(cli.interval.max(100));
    loop {
        thread::sleep(interval);
        render(&service.poll());
    }
}

/// Log to a daily file under the user's data dir; stderr stays clean for
/// the table. The returned guard must live for the whole process.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = dirs::data_dir().map(|dir| dir.join("spyglass").join("logs"));
    match log_dir.and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir)) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "spyglass.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Nick database: the user's known nicks form the editable default table,
/// json files next to the settings are read-only supplements.
fn load_nick_database(settings: &Settings) -> NickDatabase {
    let mut database = NickDatabase::default();
    for (nick, value) in &settings.known_nicks {
        database.insert_default(nick, &value.uuid);
    }

    let Some(dir) = dirs::config_dir().map(|dir| dir.join("spyglass").join("nick_databases"))
    else {
        return database;
    };
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return database;
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable nick database file");
                continue;
            }
        };
        match nicks::parse_table(&json) {
            Ok(table) => database.add_supplementary(table),
            Err(err) => warn!(path = %path.display(), %err, "skipping invalid nick database file"),
        }
    }

    database
}

fn default_logfile() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".minecraft/logs/latest.log"));
        candidates.push(home.join("Library/Application Support/minecraft/logs/latest.log"));
    }
    if let Some(config) = dirs::config_dir() {
        candidates.push(config.join(".minecraft/logs/latest.log"));
    }
    candidates.into_iter().find(|path| path.exists())
}

fn render(update: &OverlayUpdate) {
    let Some(rows) = &update.rows else {
        return;
    };

    println!();
    for cell in &update.info_cells {
        let prefix = match cell.severity {
            Severity::Error => "!!",
            Severity::Warning => "!",
            Severity::Info => "-",
        };
        println!("{prefix} {}", cell.text);
    }

    let title = if update.in_queue { "queue" } else { "lobby" };
    println!(
        "--- {title} --- {:<16} {:>7} {:>7} {:>7} {:>6}",
        "", "STARS", "FKDR", "WLR", "WS"
    );
    for row in rows {
        let marker = if row.is_party {
            '*'
        } else if row.stats_hidden {
            '?'
        } else {
            ' '
        };
        println!(
            "{marker} {:<20} {:>7} {:>7} {:>7} {:>6}",
            row.username, row.stars, row.fkdr, row.wlr, row.winstreak
        );
    }
}
