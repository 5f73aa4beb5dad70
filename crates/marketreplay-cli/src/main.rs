//! marketreplay: command-line runner for the deterministic replay core.
//!
//! Wires the columnar reader, the Replay Engine, and the Strategy Runtime
//! together the way a collaborator-exposed driver would, and emits a single
//! machine-readable JSON object on exit.

use clap::Parser;
use serde::Deserialize;
use serde_json::json;

use marketreplay_core::canonical::Canonical;
use marketreplay_core::config::{EngineConfig, ErrorPolicy as CoreErrorPolicy, OrderingMode as CoreOrderingMode};
use marketreplay_core::error::CoreError;
use marketreplay_core::hash::hash_canonical;
use marketreplay_core::id::RunId;
use marketreplay_core::manifest::{merge, parse_and_validate, DatasetManifest, RunManifest};
use marketreplay_core::ordering::decode_cursor;
use marketreplay_exec::archive::{RunArchiveWriter, RunStats};
use marketreplay_exec::error::ExecError;
use marketreplay_exec::replay::{ReaderFactory, ReplayEngine, ReplayParams};
use marketreplay_exec::runtime::{DispatchOutcome, Runtime, Strategy};
use marketreplay_io::error::IoError;
use marketreplay_io::reader::{ColumnarReader, CsvReader};
use marketreplay_io::storage::Storage;

/// The ordering columns this binary's reader adapter is hard-wired to. A
/// future multi-schema runner would thread this through `--stream` instead.
const ACTIVE_ORDERING_COLUMNS: &[&str] = &["ts_event", "seq"];

#[derive(Parser, Debug)]
#[command(name = "marketreplay")]
#[command(about = "Deterministic market-data replay and strategy-execution runner", long_about = None)]
struct Cli {
    /// Columnar source file(s). Named `--parquet` for parity with the
    /// collaborator-exposed surface; this build's adapter reads CSV.
    #[arg(long, required = true, value_delimiter = ',')]
    parquet: Vec<String>,

    /// Dataset manifest file(s). More than one is merged, enforcing
    /// agreement on schema_version/stream_type/ordering_columns.
    #[arg(long, required = true, value_delimiter = ',')]
    meta: Vec<String>,

    /// Built-in strategy name. See `build_strategy` for the registry.
    #[arg(long)]
    strategy: String,

    /// Expected stream_type; mismatches the merged manifest's value fail
    /// fast before any reader is opened.
    #[arg(long)]
    stream: Option<String>,

    /// Raw JSON object overlaying `EngineConfig` fields read from the
    /// environment. Individual flags below take priority over this.
    #[arg(long)]
    config: Option<String>,

    /// Folded into the deterministic run_id alongside the dataset identity
    /// and strategy name.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Resume token from a prior run's last_cursor. Exclusive: replay
    /// starts at the first event strictly after this cursor.
    #[arg(long)]
    start_cursor: Option<String>,

    #[arg(long, value_enum)]
    error_policy: Option<CliErrorPolicy>,

    #[arg(long, value_enum)]
    ordering_mode: Option<CliOrderingMode>,

    #[arg(long, default_value = "./replay_checkpoints")]
    checkpoint_dir: String,

    #[arg(long)]
    checkpoint_interval: Option<u64>,

    #[arg(long, default_value = "./replay_output")]
    output_dir: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum CliErrorPolicy {
    FailFast,
    SkipAndLog,
    Quarantine,
}

impl From<CliErrorPolicy> for CoreErrorPolicy {
    fn from(v: CliErrorPolicy) -> Self {
        match v {
            CliErrorPolicy::FailFast => CoreErrorPolicy::FailFast,
            CliErrorPolicy::SkipAndLog => CoreErrorPolicy::SkipAndLog,
            CliErrorPolicy::Quarantine => CoreErrorPolicy::Quarantine,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum CliOrderingMode {
    Strict,
    Warn,
}

impl From<CliOrderingMode> for CoreOrderingMode {
    fn from(v: CliOrderingMode) -> Self {
        match v {
            CliOrderingMode::Strict => CoreOrderingMode::Strict,
            CliOrderingMode::Warn => CoreOrderingMode::Warn,
        }
    }
}

/// Mirrors `EngineConfig`'s fields as all-optional, for `--config <json>`.
/// Fields left absent keep whatever `EngineConfig::from_env()` produced.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct ConfigOverlay {
    yield_every: Option<u64>,
    backpressure_high: Option<usize>,
    backpressure_low: Option<usize>,
    max_queue_capacity: Option<usize>,
    archive_enabled: Option<bool>,
    checkpoint_interval: Option<u64>,
    max_errors: Option<u64>,
    error_policy: Option<CoreErrorPolicy>,
    ordering_mode: Option<CoreOrderingMode>,
    storage_endpoint: Option<String>,
    storage_key: Option<String>,
    storage_secret: Option<String>,
    storage_region: Option<String>,
    storage_bucket: Option<String>,
}

impl ConfigOverlay {
    fn apply(self, cfg: &mut EngineConfig) {
        if let Some(v) = self.yield_every {
            cfg.yield_every = v;
        }
        if let Some(v) = self.backpressure_high {
            cfg.backpressure_high = v;
        }
        if let Some(v) = self.backpressure_low {
            cfg.backpressure_low = v;
        }
        if let Some(v) = self.max_queue_capacity {
            cfg.max_queue_capacity = v;
        }
        if let Some(v) = self.archive_enabled {
            cfg.archive_enabled = v;
        }
        if let Some(v) = self.checkpoint_interval {
            cfg.checkpoint_interval = v;
        }
        if let Some(v) = self.max_errors {
            cfg.max_errors = v;
        }
        if let Some(v) = self.error_policy {
            cfg.error_policy = v;
        }
        if let Some(v) = self.ordering_mode {
            cfg.ordering_mode = v;
        }
        if self.storage_endpoint.is_some() {
            cfg.storage_endpoint = self.storage_endpoint;
        }
        if self.storage_key.is_some() {
            cfg.storage_key = self.storage_key;
        }
        if self.storage_secret.is_some() {
            cfg.storage_secret = self.storage_secret;
        }
        if self.storage_region.is_some() {
            cfg.storage_region = self.storage_region;
        }
        if self.storage_bucket.is_some() {
            cfg.storage_bucket = self.storage_bucket;
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl CliError {
    fn error_code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "ConfigError",
            CliError::Core(e) => core_error_code(e),
            CliError::Io(e) => io_error_code(e),
            CliError::Exec(e) => exec_error_code(e),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "error_code": self.error_code(),
            "message": self.to_string(),
            "context": {},
        })
    }
}

fn core_error_code(e: &CoreError) -> &'static str {
    match e {
        CoreError::Serialization(_) => "SerializationError",
        CoreError::OrderingViolationDuplicate { .. } => "OrderingViolationDuplicate",
        CoreError::OrderingViolationOutOfOrder { .. } => "OrderingViolationOutOfOrder",
        CoreError::ManifestInvalid(_) => "ManifestInvalid",
        CoreError::ManifestParseError(_) => "ManifestParseError",
        CoreError::ManifestLoadError(_) => "ManifestLoadError",
        CoreError::MultiManifestInconsistent(_) => "MultiManifestInconsistent",
        CoreError::SchemaUnsupported(_) => "SchemaUnsupported",
        CoreError::RowCountMismatch { .. } => "RowCountMismatch",
        CoreError::OrderingColumnsInvalid(_) => "OrderingColumnsInvalid",
        CoreError::Config(_) => "ConfigError",
    }
}

fn io_error_code(e: &IoError) -> &'static str {
    match e {
        IoError::Config(_) => "ConfigError",
        IoError::CredentialError(_) => "CredentialError",
        IoError::Io { .. } => "IoError",
        IoError::Schema { .. } => "SchemaError",
        IoError::Corruption { .. } => "CorruptionError",
        IoError::CompressionCorruption { .. } => "CompressionCorruptionError",
        IoError::Storage(_) => "IoError",
        IoError::Core(inner) => core_error_code(inner),
    }
}

fn exec_error_code(e: &ExecError) -> &'static str {
    match e {
        ExecError::Lifecycle(_) => "LifecycleError",
        ExecError::ErrorLimitExceeded { .. } => "ErrorLimitExceeded",
        ExecError::Restore(_) => "RestoreError",
        ExecError::Archive(_) => "ArchiveError",
        ExecError::Serialization(_) => "SerializationError",
        ExecError::QueueOverflow { .. } => "LifecycleError",
        ExecError::Core(inner) => core_error_code(inner),
        ExecError::Io(inner) => io_error_code(inner),
    }
}

/// Built-in strategy registry. Production strategies are a collaborator
/// concern delivered as a `Strategy` implementation linked into a custom
/// binary; this runner ships the one bundled default so the end-to-end path
/// is exercisable on its own.
fn build_strategy(name: &str) -> Result<Box<dyn Strategy>, CliError> {
    match name {
        "noop" => Ok(Box::new(NoopStrategy::default())),
        other => Err(CliError::Config(format!(
            "unknown strategy '{other}'; built-in strategies: noop"
        ))),
    }
}

/// Records `event_count` in the state container and places no orders.
#[derive(Default)]
struct NoopStrategy {
    events_seen: u64,
}

impl Strategy for NoopStrategy {
    fn init(&mut self, _ctx: &mut marketreplay_exec::runtime::RuntimeContext) -> Result<(), String> {
        Ok(())
    }

    fn on_event(
        &mut self,
        ctx: &mut marketreplay_exec::runtime::RuntimeContext,
        _event: &marketreplay_core::event::Event,
    ) -> Result<(), String> {
        self.events_seen += 1;
        ctx.state.increment("event_count", 1.0);
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut marketreplay_exec::runtime::RuntimeContext) -> Result<(), String> {
        Ok(())
    }
}

struct CsvReaderFactory {
    storage: Box<dyn Storage>,
    sources: Vec<String>,
}

impl ReaderFactory for CsvReaderFactory {
    fn open(&self) -> marketreplay_exec::error::Result<Box<dyn ColumnarReader>> {
        let reader = CsvReader::open(self.storage.as_ref(), &self.sources)?;
        Ok(Box::new(reader))
    }
}

/// Wraps a `Storage` so every path lands under `base`, for the archive
/// writer's own-relative-key layout on top of a plain filesystem adapter.
struct RootedStorage {
    inner: Box<dyn Storage>,
    base: String,
}

impl Storage for RootedStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> marketreplay_io::Result<()> {
        self.inner.write(&format!("{}/{path}", self.base), bytes)
    }
    fn read_range(&self, path: &str, offset: u64, len: usize) -> marketreplay_io::Result<Vec<u8>> {
        self.inner.read_range(&format!("{}/{path}", self.base), offset, len)
    }
    fn delete(&self, path: &str) -> marketreplay_io::Result<()> {
        self.inner.delete(&format!("{}/{path}", self.base))
    }
    fn list(&self, prefix: &str) -> marketreplay_io::Result<Vec<String>> {
        self.inner.list(&format!("{}/{prefix}", self.base))
    }
    fn size(&self, path: &str) -> marketreplay_io::Result<u64> {
        self.inner.size(&format!("{}/{path}", self.base))
    }
    fn etag(&self, path: &str) -> marketreplay_io::Result<Option<String>> {
        self.inner.etag(&format!("{}/{path}", self.base))
    }
}

fn load_manifest(storage: &dyn Storage, paths: &[String]) -> Result<DatasetManifest, CliError> {
    let mut manifests = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = storage.read_all(path)?;
        manifests.push(parse_and_validate(&bytes, ACTIVE_ORDERING_COLUMNS)?);
    }
    Ok(merge(&manifests)?)
}

fn build_config(cli: &Cli) -> Result<EngineConfig, CliError> {
    let mut cfg = EngineConfig::from_env();
    if let Some(raw) = &cli.config {
        let overlay: ConfigOverlay = serde_json::from_str(raw)
            .map_err(|e| CliError::Config(format!("invalid --config JSON: {e}")))?;
        overlay.apply(&mut cfg);
    }
    if let Some(policy) = cli.error_policy {
        cfg.error_policy = policy.into();
    }
    if let Some(mode) = cli.ordering_mode {
        cfg.ordering_mode = mode.into();
    }
    if let Some(interval) = cli.checkpoint_interval {
        cfg.checkpoint_interval = interval;
    }
    Ok(cfg)
}

fn compute_run_id(dataset_identity: &str, strategy: &str, seed: u64) -> RunId {
    let value = Canonical::obj([
        ("dataset", Canonical::Str(dataset_identity.to_string())),
        ("strategy_config", Canonical::Str(strategy.to_string())),
        ("seed", Canonical::BigInt(seed as u128)),
    ]);
    RunId::from_hash(&hash_canonical(&value))
}

fn run(cli: &Cli) -> Result<RunManifest, CliError> {
    let storage: Box<dyn Storage> = Box::new(marketreplay_io::storage::FsStorage::new());

    let manifest = load_manifest(storage.as_ref(), &cli.meta)?;
    if let Some(expected) = &cli.stream {
        if &manifest.stream_type != expected {
            return Err(CliError::Config(format!(
                "--stream {expected} does not match manifest stream_type {}",
                manifest.stream_type
            )));
        }
    }

    let config = build_config(cli)?;
    let run_id = compute_run_id(manifest.manifest_id.as_str(), &cli.strategy, cli.seed);

    let factory = CsvReaderFactory {
        storage: Box::new(marketreplay_io::storage::FsStorage::new()),
        sources: cli.parquet.clone(),
    };
    let engine = ReplayEngine::new(Box::new(factory), manifest.rows);

    let cursor = cli
        .start_cursor
        .as_deref()
        .map(decode_cursor)
        .transpose()?;
    let mut pass = engine.row_factory(ReplayParams {
        batch_size: 1_000,
        cursor,
        start_ts: None,
        end_ts: None,
    })?;

    let strategy = build_strategy(&cli.strategy)?;
    let mut runtime = Runtime::new(
        run_id.to_string(),
        manifest.manifest_id.as_str().to_string(),
        cli.strategy.clone(),
        cli.seed,
        config.clone(),
        strategy,
        0,
    );
    runtime.initialize(0)?;
    runtime.start(0)?;

    let mut now: u64 = 0;
    while let Some(event) = pass.next_event()? {
        now += 1;
        match runtime.dispatch_event(event)? {
            DispatchOutcome::Continue => {}
            DispatchOutcome::AwaitingResume => break,
        }
        runtime.maybe_checkpoint(storage.as_ref(), &cli.checkpoint_dir, now)?;
    }
    let replay_result = pass.result();
    pass.close()?;

    let manifest_out = runtime.finalize(
        now,
        Some((storage.as_ref(), cli.checkpoint_dir.as_str())),
        Some(replay_result),
    )?;

    if config.archive_enabled {
        write_archive(&cli.output_dir, &manifest_out)?;
    }

    Ok(manifest_out)
}

fn write_archive(output_dir: &str, manifest: &RunManifest) -> Result<(), CliError> {
    let rooted = RootedStorage {
        inner: Box::new(marketreplay_io::storage::FsStorage::new()),
        base: output_dir.to_string(),
    };
    let writer = RunArchiveWriter::new(&rooted, manifest.replay.replay_run_id.clone());
    let stats = RunStats {
        emitted_event_count: manifest.replay.emitted_event_count,
        decision_count: manifest.output.decision_count,
        duration_ms: manifest.ended_at.saturating_sub(manifest.started_at),
    };
    let manifest_subset = serde_json::to_value(manifest).map_err(|e| CliError::Config(e.to_string()))?;
    writer
        .write(&manifest_subset, &[], &stats)
        .map_err(CliError::Exec)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(manifest) => {
            println!("{}", serde_json::to_string(&manifest).unwrap());
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("{}", serde_json::to_string(&err.to_json()).unwrap());
            std::process::exit(1);
        }
    }
}
