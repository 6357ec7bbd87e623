use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the dailyoffice binary.
#[derive(Debug, Parser)]
#[command(
    name = "dailyoffice",
    version,
    about = "Cache-fronted Daily Office prayer generation service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "DAILYOFFICE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Dispatch one request and write the artifact, or report the job it started.
    Generate(Box<GenerateArgs>),
    /// Report the state of an asynchronous job.
    Status(StatusArgs),
    /// Complete a pending job in this process.
    #[command(name = "run-job")]
    RunJob(RunJobArgs),
    /// Delete finished jobs older than the retention window.
    #[command(name = "prune-jobs")]
    PruneJobs(PruneJobsArgs),
    /// Delete every cached artifact under a key prefix.
    Invalidate(InvalidateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverride {
    /// Override the blob store root directory.
    #[arg(long = "store-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub store_root: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GeneratorOverrides {
    /// Override the upstream renderer endpoint.
    #[arg(long = "generator-endpoint", value_name = "URL")]
    pub generator_endpoint: Option<String>,

    /// Override the local renderer executable.
    #[arg(long = "generator-command", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub generator_command: Option<PathBuf>,

    /// Override the synchronous generation deadline.
    #[arg(long = "generator-sync-deadline-seconds", value_name = "SECONDS")]
    pub sync_deadline_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverride,

    #[command(flatten)]
    pub generator: GeneratorOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the artifact cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override how accepted jobs are started (task|process).
    #[arg(long = "jobs-launcher", value_name = "KIND")]
    pub jobs_launcher: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    #[command(flatten)]
    pub generator: GeneratorOverrides,

    /// Office to generate (morning|evening|midday|compline).
    #[arg(long = "kind", value_name = "KIND")]
    pub kind: Option<String>,

    /// Single day to generate (YYYY-MM-DD); defaults to today.
    #[arg(long = "date", value_name = "DATE", conflicts_with_all = ["year", "month", "monthly"])]
    pub date: Option<String>,

    /// Generate a whole month.
    #[arg(long = "monthly", action = clap::ArgAction::SetTrue)]
    pub monthly: bool,

    /// Year of the month to generate.
    #[arg(long = "year", value_name = "YEAR")]
    pub year: Option<String>,

    /// Month (1-12) to generate.
    #[arg(long = "month", value_name = "MONTH")]
    pub month: Option<String>,

    /// Page layout (letter|remarkable).
    #[arg(long = "variant", value_name = "VARIANT")]
    pub variant: Option<String>,

    /// Psalter cycle length in days (30|60).
    #[arg(long = "cycle", value_name = "DAYS")]
    pub cycle: Option<String>,

    /// Skip the cache lookup and regenerate.
    #[arg(long = "bypass", action = clap::ArgAction::SetTrue)]
    pub bypass: bool,

    /// Where to write the artifact; `-` writes to stdout.
    #[arg(long = "output", short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// For month-long requests, wait up to this many seconds for the job to finish.
    #[arg(long = "wait-seconds", value_name = "SECONDS")]
    pub wait_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    /// Job identifier returned by `generate` or `/generate`.
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    /// Write the artifact of a completed job to this file.
    #[arg(long = "output", short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RunJobArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    #[command(flatten)]
    pub generator: GeneratorOverrides,

    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PruneJobsArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    /// Override the retention window in days.
    #[arg(long = "retention-days", value_name = "DAYS")]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    #[command(flatten)]
    pub store: StoreOverride,

    /// Key prefix such as `monthly/morning/2025/12`.
    #[arg(value_name = "PREFIX")]
    pub prefix: String,
}
