//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "dailyoffice";
const ENV_PREFIX: &str = "DAILYOFFICE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORE_ROOT: &str = "data";
const DEFAULT_ARTIFACT_PREFIX: &str = "prayers";
const DEFAULT_CACHE_TTL_DAYS: u32 = 30;
const DEFAULT_GENERATOR_ENDPOINT: &str = "http://127.0.0.1:8080/prayer";
const DEFAULT_GENERATOR_COMMAND: &str = "dailyoffice-render";
const DEFAULT_SYNC_DEADLINE_SECS: u64 = 25;
const DEFAULT_ASYNC_TIMEOUT_SECS: u64 = 900;
const DEFAULT_JOB_RETENTION_DAYS: u32 = 30;
const RESERVED_PREFIXES: [&str; 2] = ["jobs", "results"];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub generator: GeneratorSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Filesystem,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub root: PathBuf,
    /// Object prefix under which artifacts live; never `jobs` or `results`.
    pub artifact_prefix: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_days: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    Http,
    Command,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub backend: GeneratorBackend,
    pub endpoint: String,
    pub command: PathBuf,
    pub sync_deadline: Duration,
    pub async_timeout: Duration,
    /// Zone used to resolve "today" when a request omits its date.
    pub timezone: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherKind {
    Task,
    Process,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub launcher: LauncherKind,
    pub retention_days: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_command_overrides(cli.command.as_ref());

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    cache: RawCacheSettings,
    generator: RawGeneratorSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_command_overrides(&mut self, command: Option<&Command>) {
        match command {
            Some(Command::Serve(args)) => self.apply_serve_overrides(&args.overrides),
            Some(Command::Generate(args)) => {
                self.apply_store_override(&args.store);
                self.apply_generator_overrides(&args.generator);
            }
            Some(Command::Status(args)) => self.apply_store_override(&args.store),
            Some(Command::RunJob(args)) => {
                self.apply_store_override(&args.store);
                self.apply_generator_overrides(&args.generator);
            }
            Some(Command::PruneJobs(args)) => {
                self.apply_store_override(&args.store);
                if let Some(days) = args.retention_days {
                    self.jobs.retention_days = Some(days);
                }
            }
            Some(Command::Invalidate(args)) => self.apply_store_override(&args.store),
            None => self.apply_serve_overrides(&ServeOverrides::default()),
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(launcher) = overrides.jobs_launcher.as_ref() {
            self.jobs.launcher = Some(launcher.clone());
        }

        self.apply_store_override(&overrides.store);
        self.apply_generator_overrides(&overrides.generator);
    }

    fn apply_store_override(&mut self, overrides: &StoreOverride) {
        if let Some(root) = overrides.store_root.as_ref() {
            self.store.root = Some(root.clone());
        }
    }

    fn apply_generator_overrides(&mut self, overrides: &GeneratorOverrides) {
        if let Some(endpoint) = overrides.generator_endpoint.as_ref() {
            self.generator.endpoint = Some(endpoint.clone());
        }
        if let Some(command) = overrides.generator_command.as_ref() {
            self.generator.command = Some(command.clone());
        }
        if let Some(seconds) = overrides.sync_deadline_seconds {
            self.generator.sync_deadline_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            cache,
            generator,
            jobs,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let store = build_store_settings(store)?;
        let cache = build_cache_settings(cache)?;
        let generator = build_generator_settings(generator)?;
        let jobs = build_jobs_settings(jobs)?;

        // A child process cannot see another process's memory.
        if store.backend == StoreBackend::Memory && jobs.launcher == LauncherKind::Process {
            return Err(LoadError::invalid(
                "jobs.launcher",
                "the process launcher requires the filesystem store backend",
            ));
        }

        Ok(Self {
            server,
            logging,
            store,
            cache,
            generator,
            jobs,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend.as_deref().map(str::trim) {
        None | Some("filesystem") => StoreBackend::Filesystem,
        Some("memory") => StoreBackend::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "store.backend",
                format!("unknown backend `{other}` (expected filesystem|memory)"),
            ));
        }
    };

    let root = store
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("store.root", "path must not be empty"));
    }

    let artifact_prefix = store
        .artifact_prefix
        .as_deref()
        .unwrap_or(DEFAULT_ARTIFACT_PREFIX)
        .trim_matches('/')
        .to_string();
    if artifact_prefix.is_empty() {
        return Err(LoadError::invalid(
            "store.artifact_prefix",
            "prefix must not be empty",
        ));
    }
    let first_segment = artifact_prefix.split('/').next().unwrap_or_default();
    if RESERVED_PREFIXES.contains(&first_segment) {
        return Err(LoadError::invalid(
            "store.artifact_prefix",
            format!("`{first_segment}` is reserved for job records and results"),
        ));
    }

    Ok(StoreSettings {
        backend,
        root,
        artifact_prefix,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_days = cache.ttl_days.unwrap_or(DEFAULT_CACHE_TTL_DAYS);
    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl_days: non_zero_u32(ttl_days.into(), "cache.ttl_days")?,
    })
}

fn build_generator_settings(
    generator: RawGeneratorSettings,
) -> Result<GeneratorSettings, LoadError> {
    let backend = match generator.backend.as_deref().map(str::trim) {
        None | Some("http") => GeneratorBackend::Http,
        Some("command") => GeneratorBackend::Command,
        Some(other) => {
            return Err(LoadError::invalid(
                "generator.backend",
                format!("unknown backend `{other}` (expected http|command)"),
            ));
        }
    };

    let endpoint = generator
        .endpoint
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_GENERATOR_ENDPOINT.to_string());
    if backend == GeneratorBackend::Http && endpoint.is_empty() {
        return Err(LoadError::invalid(
            "generator.endpoint",
            "the http backend requires an endpoint",
        ));
    }

    let command = generator
        .command
        .unwrap_or_else(|| PathBuf::from(DEFAULT_GENERATOR_COMMAND));
    if command.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "generator.command",
            "path must not be empty",
        ));
    }

    let sync_secs = generator
        .sync_deadline_seconds
        .unwrap_or(DEFAULT_SYNC_DEADLINE_SECS);
    if sync_secs == 0 {
        return Err(LoadError::invalid(
            "generator.sync_deadline_seconds",
            "must be greater than zero",
        ));
    }

    let async_secs = generator
        .async_timeout_seconds
        .unwrap_or(DEFAULT_ASYNC_TIMEOUT_SECS);
    if async_secs < sync_secs {
        return Err(LoadError::invalid(
            "generator.async_timeout_seconds",
            "must not be shorter than the sync deadline",
        ));
    }

    let timezone = match generator.timezone {
        Some(name) => Tz::from_str(name.trim()).map_err(|err| {
            LoadError::invalid("generator.timezone", format!("failed to parse: {err}"))
        })?,
        None => Tz::UTC,
    };

    Ok(GeneratorSettings {
        backend,
        endpoint,
        command,
        sync_deadline: Duration::from_secs(sync_secs),
        async_timeout: Duration::from_secs(async_secs),
        timezone,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let launcher = match jobs.launcher.as_deref().map(str::trim) {
        None | Some("task") => LauncherKind::Task,
        Some("process") => LauncherKind::Process,
        Some(other) => {
            return Err(LoadError::invalid(
                "jobs.launcher",
                format!("unknown launcher `{other}` (expected task|process)"),
            ));
        }
    };

    let retention_days = jobs.retention_days.unwrap_or(DEFAULT_JOB_RETENTION_DAYS);

    Ok(JobsSettings {
        launcher,
        retention_days: non_zero_u32(retention_days.into(), "jobs.retention_days")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    root: Option<PathBuf>,
    artifact_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGeneratorSettings {
    backend: Option<String>,
    endpoint: Option<String>,
    command: Option<PathBuf>,
    sync_deadline_seconds: Option<u64>,
    async_timeout_seconds: Option<u64>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    launcher: Option<String>,
    retention_days: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
