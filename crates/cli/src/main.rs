use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use route_adoption::{
    AuditSink, AuditSinks, EngineConfig, FileAuditSink, LogAuditSink, LogReplayFallback,
    RecoverRequest, RecoveryOutcome, RouteEngine, UiScrapeFallback,
};
use route_codec::{decode_key, display_or_key, AliasTable};
use route_protocol::{EvidenceOrigin, LastGoodRoute, RouteSequence, Slot};
use route_scanner::{ByteWindow, CandidateScanner, FileWindow, RouteCandidate, ScanConfig};
use route_store::{
    stored_sequence, unix_now_ms, ConfidenceStore, JsonFileConfidenceStore, StoreSnapshot,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

type Engine = RouteEngine<JsonFileConfidenceStore, AuditSinks>;

#[derive(Parser)]
#[command(name = "route-recover")]
#[command(about = "Recover multi-waypoint routes from memory dumps and decide which one to trust", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a dump and print the best scored candidates
    Scan(ScanArgs),

    /// Recover one slot's route, adopt it and update the store
    Recover(RecoverArgs),

    /// Run `recover` on every tick until interrupted
    Watch(WatchArgs),

    /// Manually set a slot's route (stored as full confidence, source "manual")
    Set(SetArgs),

    /// Print every persisted route
    Show(ShowArgs),

    /// Print the JSON schema of the store file
    Schema,
}

#[derive(Args)]
struct ScanArgs {
    /// Memory dump to scan
    #[arg(long)]
    dump: PathBuf,

    /// Trusted trailing waypoints, e.g. 9,21
    #[arg(long, value_parser = parse_waypoints, default_value = "")]
    tail: Waypoints,

    /// Anchor byte offset (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_offset)]
    anchor: Option<usize>,

    /// Bytes scanned on each side of the anchor; 0 scans the whole dump
    #[arg(long, default_value_t = 64)]
    radius: usize,

    /// Also try length-header and sub-stride phase encodings
    #[arg(long)]
    stride_phases: bool,

    /// Skip zero elements instead of ending a candidate on them
    #[arg(long)]
    no_zero_term: bool,

    /// Number of candidates to print
    #[arg(long, default_value_t = 3)]
    top: usize,
}

#[derive(Args)]
struct RecoverArgs {
    /// Memory dump to scan
    #[arg(long)]
    dump: PathBuf,

    /// Slot to recover
    #[arg(long)]
    slot: Slot,

    /// Trusted trailing waypoints, e.g. 9,21
    #[arg(long, value_parser = parse_waypoints, default_value = "")]
    tail: Waypoints,

    /// Anchor byte offset (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_offset)]
    anchor: Option<usize>,

    /// The dump region is a structured field, not a heuristic scan target
    #[arg(long)]
    structured: bool,

    /// Display name of the slot, used by the UI-scrape fallback
    #[arg(long)]
    name: Option<String>,

    /// Scraped UI text, one `<name>: <route>` per line
    #[arg(long)]
    ui_lines: Option<PathBuf>,

    /// Diagnostic log with `S<slot> route bytes = ...` records
    #[arg(long)]
    log: Option<PathBuf>,

    /// Append audit lines to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Confidence store file
    #[arg(long)]
    store: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Map-scoped alias index (JSON)
    #[arg(long)]
    aliases: Option<PathBuf>,

    /// Generic waypoint names (JSON `{ "<id>": "<name>" }`)
    #[arg(long)]
    names: Option<PathBuf>,
}

#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    recover: RecoverArgs,

    /// Seconds between ticks
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// Stop after this many ticks (runs until Ctrl-C when absent)
    #[arg(long)]
    ticks: Option<u64>,
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    slot: Slot,

    /// Route as waypoint ids, e.g. "3,7,12,9,21" or a route key
    #[arg(long)]
    route: String,

    /// Confidence store file
    #[arg(long)]
    store: PathBuf,
}

#[derive(Args)]
struct ShowArgs {
    /// Confidence store file
    #[arg(long)]
    store: PathBuf,

    /// Engine configuration (TOML); only the `[display]` section applies
    #[arg(long)]
    config: Option<PathBuf>,

    /// Map-scoped alias index (JSON)
    #[arg(long)]
    aliases: Option<PathBuf>,

    /// Generic waypoint names (JSON `{ "<id>": "<name>" }`)
    #[arg(long)]
    names: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
struct Waypoints(Vec<u8>);

#[derive(Serialize)]
struct ScanOutput {
    dump: PathBuf,
    dump_len: usize,
    tail: Vec<u8>,
    anchor: Option<usize>,
    candidates: Vec<RouteCandidate>,
}

#[derive(Serialize)]
struct ShowEntry {
    slot: Slot,
    sequence: RouteSequence,
    display: String,
    #[serde(flatten)]
    entry: LastGoodRoute,
}

#[derive(Serialize)]
struct ShowOutput {
    store: PathBuf,
    routes: Vec<ShowEntry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let pretty = cli.pretty;
    match cli.command {
        Commands::Scan(args) => run_scan(&args, pretty)?,
        Commands::Recover(args) => run_recover(&args, pretty)?,
        Commands::Watch(args) => run_watch(&args, pretty).await?,
        Commands::Set(args) => run_set(&args, pretty)?,
        Commands::Show(args) => run_show(&args, pretty)?,
        Commands::Schema => print_json(&schemars::schema_for!(StoreSnapshot), true)?,
    }

    Ok(())
}

fn run_scan(args: &ScanArgs, pretty: bool) -> Result<()> {
    let window = FileWindow::open(&args.dump)
        .with_context(|| format!("Failed to open dump {}", args.dump.display()))?;
    let config = ScanConfig {
        window_radius: args.radius,
        zero_terminated: !args.no_zero_term,
        phase_scan_enabled: args.stride_phases,
        top_n: args.top,
        ..ScanConfig::default()
    };
    let candidates = CandidateScanner::new(&config).rank(&window, &args.tail.0, args.anchor);
    log::info!(
        "Scanned {} ({} bytes): {} candidates",
        args.dump.display(),
        window.len(),
        candidates.len()
    );

    print_json(
        &ScanOutput {
            dump: args.dump.clone(),
            dump_len: window.len(),
            tail: args.tail.0.clone(),
            anchor: args.anchor,
            candidates,
        },
        pretty,
    )
}

fn run_recover(args: &RecoverArgs, pretty: bool) -> Result<()> {
    let mut engine = build_engine(args)?;
    let outcome = recover_once(&mut engine, args)?;
    print_json(&outcome, pretty)
}

async fn run_watch(args: &WatchArgs, pretty: bool) -> Result<()> {
    let mut engine = build_engine(&args.recover)?;
    let mut interval = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    let mut done = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Watch interrupted after {done} ticks");
                break;
            }
        }

        if let Err(err) = engine.store_mut().reload() {
            log::warn!("Store reload failed, keeping previous view: {err}");
        }
        match recover_once(&mut engine, &args.recover) {
            Ok(outcome) => print_json(&outcome, pretty)?,
            Err(err) => log::warn!("Tick skipped: {err:#}"),
        }

        done += 1;
        if args.ticks.is_some_and(|limit| done >= limit) {
            break;
        }
    }
    Ok(())
}

fn run_set(args: &SetArgs, pretty: bool) -> Result<()> {
    let sequence = decode_key(&args.route);
    let store = open_store(&args.store)?;
    let mut engine = RouteEngine::new(store, &EngineConfig::default());
    let entry = engine
        .set_manual(args.slot, &sequence, unix_now_ms())
        .with_context(|| format!("Failed to set route for slot {}", args.slot))?;
    print_json(&entry, pretty)
}

fn run_show(args: &ShowArgs, pretty: bool) -> Result<()> {
    let store = open_store(&args.store)?;
    let aliases = load_aliases(args.aliases.as_deref(), args.names.as_deref())?;
    let display = load_config(args.config.as_deref())?.display;
    let routes = store
        .entries()
        .into_iter()
        .map(|(slot, entry)| {
            let sequence = stored_sequence(&entry);
            ShowEntry {
                slot,
                display: display_or_key(&sequence, &aliases, &display),
                sequence,
                entry,
            }
        })
        .collect();
    print_json(
        &ShowOutput {
            store: args.store.clone(),
            routes,
        },
        pretty,
    )
}

fn build_engine(args: &RecoverArgs) -> Result<Engine> {
    let config = load_config(args.config.as_deref())?;

    let mut sinks: Vec<Box<dyn AuditSink + Send>> = vec![Box::new(LogAuditSink)];
    if let Some(path) = &args.audit_log {
        let sink = FileAuditSink::open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        sinks.push(Box::new(sink));
    }

    let mut engine = RouteEngine::new(open_store(&args.store)?, &config)
        .with_aliases(load_aliases(args.aliases.as_deref(), args.names.as_deref())?)
        .with_audit(AuditSinks(sinks));

    if let Some(path) = &args.ui_lines {
        engine = engine.with_fallback(UiScrapeFallback::from_path(path));
    }
    if let Some(path) = &args.log {
        engine = engine.with_fallback(LogReplayFallback::from_path(path));
    }
    Ok(engine)
}

fn recover_once(engine: &mut Engine, args: &RecoverArgs) -> Result<RecoveryOutcome> {
    let window = FileWindow::open(&args.dump)
        .with_context(|| format!("Failed to open dump {}", args.dump.display()))?;
    let request = RecoverRequest {
        tail: args.tail.0.clone(),
        anchor: args.anchor,
        origin: if args.structured {
            EvidenceOrigin::Structured
        } else {
            EvidenceOrigin::Scan
        },
        name: args.name.clone(),
    };
    Ok(engine.recover(args.slot, &window, &request, unix_now_ms()))
}

fn open_store(path: &Path) -> Result<JsonFileConfidenceStore> {
    JsonFileConfidenceStore::open(path)
        .with_context(|| format!("Failed to open route store {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_aliases(index: Option<&Path>, names: Option<&Path>) -> Result<AliasTable> {
    let mut table = index.map(AliasTable::load_index_or_default).unwrap_or_default();
    if let Some(path) = names {
        table
            .merge_names_file(path)
            .with_context(|| format!("Failed to load route names {}", path.display()))?;
    }
    Ok(table)
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn parse_waypoints(raw: &str) -> Result<Waypoints> {
    let mut out = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let value: u8 = token
            .parse()
            .with_context(|| format!("'{token}' is not a waypoint id (1-255)"))?;
        if value == 0 {
            bail!("waypoint id 0 is reserved");
        }
        out.push(value);
    }
    Ok(Waypoints(out))
}

fn parse_offset(raw: &str) -> Result<usize> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.with_context(|| format!("'{raw}' is not a byte offset"))
}
