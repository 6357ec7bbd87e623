use std::{
    future::IntoFuture,
    io::Write as _,
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};

use dailyoffice::{
    application::{
        clock::Clock,
        dispatcher::{Dispatcher, GenerateOutcome},
        error::AppError,
        generator::Generator,
        invoker::GeneratorInvoker,
        jobs::{JobLauncher, JobRunner, TaskLauncher, prune_jobs, wait_for_job_completion},
        poller::{JobStatusView, StatusPoller},
        repos::{BlobStore, JobsRepo},
    },
    cache::{ArtifactCache, CacheConfig, KeyPrefix},
    config::{self, GeneratorBackend, LauncherKind, StoreBackend},
    domain::{descriptor::GenerateParams, entities::Artifact, types::JobStatus},
    infra::{
        blob::{FilesystemBlobStore, MemoryBlobStore},
        error::InfraError,
        generator::{CommandGenerator, HttpGenerator},
        http::{self, HttpState},
        jobs::BlobJobRegistry,
        launcher::ProcessLauncher,
        telemetry,
    },
    util::timezone::SystemClock,
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "dailyoffice::main";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings, cli_args.config_file).await,
        config::Command::Generate(args) => {
            run_generate(settings, cli_args.config_file, *args).await
        }
        config::Command::Status(args) => run_status(settings, args).await,
        config::Command::RunJob(args) => run_job(settings, args).await,
        config::Command::PruneJobs(_) => run_prune_jobs(settings).await,
        config::Command::Invalidate(args) => run_invalidate(settings, args).await,
    }
}

/// Ports shared by every command.
struct Services {
    cache: ArtifactCache,
    jobs: Arc<dyn JobsRepo>,
}

impl Services {
    fn build(settings: &config::Settings) -> Result<Self, AppError> {
        let store = build_store(settings)?;
        let cache = ArtifactCache::new(Arc::clone(&store), CacheConfig::from(settings));
        let jobs: Arc<dyn JobsRepo> = Arc::new(BlobJobRegistry::new(store));
        Ok(Self { cache, jobs })
    }

    fn invoker(&self, settings: &config::Settings) -> Result<GeneratorInvoker, AppError> {
        Ok(GeneratorInvoker::new(
            build_generator(settings)?,
            settings.generator.sync_deadline,
            settings.generator.async_timeout,
        ))
    }

    fn runner(&self, settings: &config::Settings) -> Result<Arc<JobRunner>, AppError> {
        Ok(Arc::new(JobRunner::new(
            Arc::clone(&self.jobs),
            self.cache.clone(),
            self.invoker(settings)?,
        )))
    }

    fn dispatcher(
        &self,
        settings: &config::Settings,
        config_file: Option<PathBuf>,
    ) -> Result<Dispatcher, AppError> {
        let launcher: Arc<dyn JobLauncher> = match settings.jobs.launcher {
            LauncherKind::Task => Arc::new(TaskLauncher::new(self.runner(settings)?)),
            LauncherKind::Process => Arc::new(
                ProcessLauncher::current_exe(config_file, settings.store.root.clone()).map_err(
                    |err| {
                        AppError::from(InfraError::configuration(format!(
                            "cannot resolve job worker binary: {err}"
                        )))
                    },
                )?,
            ),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.generator.timezone));

        Ok(Dispatcher::new(
            self.cache.clone(),
            Arc::clone(&self.jobs),
            self.invoker(settings)?,
            launcher,
            clock,
        ))
    }
}

fn build_store(settings: &config::Settings) -> Result<Arc<dyn BlobStore>, AppError> {
    match settings.store.backend {
        StoreBackend::Filesystem => {
            let store = FilesystemBlobStore::new(settings.store.root.clone())
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                target = SOURCE,
                op = "build_store",
                backend = "filesystem",
                root = %store.root().display(),
                "Blob store ready"
            );
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!(
                target = SOURCE,
                op = "build_store",
                backend = "memory",
                "Blob store ready"
            );
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}

fn build_generator(settings: &config::Settings) -> Result<Arc<dyn Generator>, AppError> {
    match settings.generator.backend {
        GeneratorBackend::Http => {
            let generator = HttpGenerator::new(
                &settings.generator.endpoint,
                settings.generator.async_timeout,
            )?;
            Ok(Arc::new(generator))
        }
        GeneratorBackend::Command => Ok(Arc::new(CommandGenerator::new(
            settings.generator.command.clone(),
        ))),
    }
}

async fn run_serve(
    settings: config::Settings,
    config_file: Option<PathBuf>,
) -> Result<(), AppError> {
    let services = Services::build(&settings)?;
    let state = HttpState {
        dispatcher: Arc::new(services.dispatcher(&settings, config_file)?),
        poller: Arc::new(StatusPoller::new(
            Arc::clone(&services.jobs),
            services.cache.clone(),
        )),
        max_age_secs: services.cache.config().max_age_secs(),
    };

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = SOURCE,
        op = "serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, http::build_router(state).into_make_service())
        .with_graceful_shutdown({
            let shutdown = Arc::clone(&shutdown);
            async move { shutdown.notified().await }
        });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        _ = tokio::signal::ctrl_c() => {
            info!(target = SOURCE, op = "serve", "Shutdown requested; draining connections");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = SOURCE,
                op = "serve",
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_generate(
    settings: config::Settings,
    config_file: Option<PathBuf>,
    args: config::GenerateArgs,
) -> Result<(), AppError> {
    let services = Services::build(&settings)?;
    let dispatcher = services.dispatcher(&settings, config_file)?;

    let params = GenerateParams {
        kind: args.kind,
        date: args.date,
        year: args.year,
        month: args.month,
        variant: args.variant,
        cycle: args.cycle,
        bypass: args.bypass.then(|| "true".to_string()),
        monthly: args.monthly.then(|| "true".to_string()),
        ..GenerateParams::default()
    };

    match dispatcher.handle(&params).await? {
        GenerateOutcome::Artifact {
            artifact,
            cache,
            descriptor,
        } => {
            let target = args
                .output
                .unwrap_or_else(|| PathBuf::from(descriptor.download_filename()));
            write_artifact(&target, &artifact).await?;
            eprintln!("{} ({})", target.display(), cache.as_header());
            Ok(())
        }
        GenerateOutcome::Accepted { job_id, descriptor } => {
            // A detached task dies with this process, so the task launcher always waits.
            let wait = args.wait_seconds.map(Duration::from_secs).or_else(|| {
                (settings.jobs.launcher == LauncherKind::Task)
                    .then_some(settings.generator.async_timeout)
            });
            let Some(wait) = wait else {
                println!("{job_id}");
                return Ok(());
            };

            let job = wait_for_job_completion(services.jobs.as_ref(), &job_id, wait).await?;
            if job.status == JobStatus::Failed {
                return Err(AppError::unexpected(format!(
                    "job `{job_id}` failed: {}",
                    job.error.unwrap_or_default()
                )));
            }
            let target = args
                .output
                .unwrap_or_else(|| PathBuf::from(descriptor.download_filename()));
            export_job_result(&services, &job_id, &target).await
        }
    }
}

async fn run_status(settings: config::Settings, args: config::StatusArgs) -> Result<(), AppError> {
    let services = Services::build(&settings)?;
    let poller = StatusPoller::new(Arc::clone(&services.jobs), services.cache.clone());

    match poller.status(&args.job_id).await? {
        JobStatusView::NotFound => Err(AppError::not_found(format!("job `{}`", args.job_id))),
        JobStatusView::Pending { job } => {
            println!("{} pending since {}", job.id, job.created_at);
            Ok(())
        }
        JobStatusView::Failed { job, error } => {
            println!("{} failed: {error}", job.id);
            Ok(())
        }
        JobStatusView::Completed { job, artifact } => {
            println!("{} completed ({} bytes)", job.id, artifact.len());
            if let Some(target) = args.output.as_deref() {
                write_artifact(target, &artifact).await?;
            }
            Ok(())
        }
    }
}

async fn run_job(settings: config::Settings, args: config::RunJobArgs) -> Result<(), AppError> {
    let services = Services::build(&settings)?;
    let runner = services.runner(&settings)?;
    let job = runner.complete(&args.job_id).await?;
    info!(
        target = SOURCE,
        op = "run_job",
        job_id = %job.id,
        status = %job.status,
        "Job finished"
    );
    Ok(())
}

async fn run_prune_jobs(settings: config::Settings) -> Result<(), AppError> {
    let services = Services::build(&settings)?;
    let retention = time::Duration::days(i64::from(settings.jobs.retention_days.get()));
    let report = prune_jobs(
        services.jobs.as_ref(),
        &services.cache,
        retention,
        OffsetDateTime::now_utc(),
    )
    .await?;
    println!(
        "examined {} jobs, removed {}, failed {}",
        report.examined, report.removed, report.failed
    );
    Ok(())
}

async fn run_invalidate(
    settings: config::Settings,
    args: config::InvalidateArgs,
) -> Result<(), AppError> {
    let prefix = KeyPrefix::parse(&args.prefix)?;
    let services = Services::build(&settings)?;
    let removed = services.cache.invalidate_prefix(&prefix).await?;
    println!("removed {removed} cached artifacts under `{prefix}`");
    Ok(())
}

async fn export_job_result(
    services: &Services,
    job_id: &str,
    target: &Path,
) -> Result<(), AppError> {
    let poller = StatusPoller::new(Arc::clone(&services.jobs), services.cache.clone());
    match poller.status(job_id).await? {
        JobStatusView::Completed { artifact, .. } => {
            write_artifact(target, &artifact).await?;
            eprintln!("{} (job {job_id})", target.display());
            Ok(())
        }
        other => Err(AppError::unexpected(format!(
            "job `{job_id}` is not completed: {other:?}"
        ))),
    }
}

async fn write_artifact(target: &Path, artifact: &Artifact) -> Result<(), AppError> {
    if target == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(&artifact.bytes)
            .and_then(|()| stdout.flush())
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        return Ok(());
    }
    tokio::fs::write(target, &artifact.bytes)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}
