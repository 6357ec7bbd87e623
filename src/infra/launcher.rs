//! Starts job completion in a child `dailyoffice run-job` process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::application::jobs::{JobLauncher, LaunchError};

/// Re-executes the current binary as `run-job <id>`.
///
/// The child shares the filesystem store with the parent, so it is handed the
/// resolved store root and the same configuration file. The parent never
/// waits on the child; the job record is the only channel between them.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_file: Option<PathBuf>,
    store_root: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, config_file: Option<PathBuf>, store_root: PathBuf) -> Self {
        Self {
            program,
            config_file,
            store_root,
        }
    }

    /// Launcher for the binary that is currently running.
    pub fn current_exe(
        config_file: Option<PathBuf>,
        store_root: PathBuf,
    ) -> Result<Self, LaunchError> {
        Ok(Self::new(std::env::current_exe()?, config_file, store_root))
    }

    fn command(&self, job_id: &str) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = self.config_file.as_ref() {
            command.arg("--config-file").arg(path);
        }
        command
            .arg("run-job")
            .arg("--store-root")
            .arg(&self.store_root)
            .arg(job_id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        command
    }
}

#[async_trait]
impl JobLauncher for ProcessLauncher {
    async fn launch(&self, job_id: &str) -> Result<(), LaunchError> {
        let child = self.command(job_id).spawn()?;
        info!(
            target = "infra::launcher",
            op = "process_launcher",
            job_id,
            pid = child.id().unwrap_or_default(),
            "Spawned job worker"
        );
        // Dropping the handle detaches the child; it keeps running on its own.
        drop(child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_config_and_store_root_to_the_worker() {
        let launcher = ProcessLauncher::new(
            PathBuf::from("/usr/bin/dailyoffice"),
            Some(PathBuf::from("/etc/dailyoffice.toml")),
            PathBuf::from("/var/lib/dailyoffice"),
        );
        let command = launcher.command("0123456789abcdef0123456789abcdef");
        let std_command = command.as_std();
        let args: Vec<_> = std_command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        assert_eq!(std_command.get_program(), "/usr/bin/dailyoffice");
        assert_eq!(
            args,
            vec![
                "--config-file",
                "/etc/dailyoffice.toml",
                "run-job",
                "--store-root",
                "/var/lib/dailyoffice",
                "0123456789abcdef0123456789abcdef",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let launcher = ProcessLauncher::new(
            PathBuf::from("/nonexistent/dailyoffice"),
            None,
            PathBuf::from("data"),
        );
        let err = launcher
            .launch("0123456789abcdef0123456789abcdef")
            .await
            .expect_err("spawn must fail");
        assert!(matches!(err, LaunchError::Spawn(_)));
    }
}
