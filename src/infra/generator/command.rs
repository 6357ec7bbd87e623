use std::{io::ErrorKind, path::PathBuf, process::Stdio, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, process::Command};
use tracing::{info, warn};

use crate::application::generator::{GeneratedDocument, Generator, GeneratorError};
use crate::domain::descriptor::{RequestDescriptor, Scope, format_iso_date};
use crate::domain::entities::PDF_CONTENT_TYPE;
use crate::domain::types::PageVariant;

const STDERR_LIMIT: usize = 2048;

/// Spawns a local renderer executable and reads the PDF it writes.
///
/// Invocation: `{program} --type KIND (--date YYYY-MM-DD | --year Y --month M)
/// [--remarkable] [--psalm-cycle N] --output FILE`.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
    program: PathBuf,
}

impl CommandGenerator {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn arguments(descriptor: &RequestDescriptor) -> Vec<String> {
        let mut args = vec!["--type".to_string(), descriptor.kind.as_str().to_string()];
        match descriptor.scope {
            Scope::SingleDay { date } => {
                args.push("--date".into());
                args.push(format_iso_date(date));
            }
            Scope::MonthRange { year, month } => {
                args.push("--year".into());
                args.push(year.to_string());
                args.push("--month".into());
                args.push(month.to_string());
            }
        }
        if descriptor.variant == PageVariant::Remarkable {
            args.push("--remarkable".into());
        }
        if let Some(cycle) = descriptor.cycle {
            args.push("--psalm-cycle".into());
            args.push(cycle.days().to_string());
        }
        args
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<GeneratedDocument, GeneratorError> {
        let started_at = Instant::now();
        let workdir = tempfile::tempdir()
            .map_err(|err| GeneratorError::failed(format!("failed to create work dir: {err}")))?;
        let output_path = workdir.path().join("output.pdf");

        let output = Command::new(&self.program)
            .args(Self::arguments(descriptor))
            .arg("--output")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "infra::generator::command",
                    op = "command::generate",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn",
                    error = %err,
                    "Failed to spawn renderer"
                );
                if err.kind() == ErrorKind::NotFound {
                    GeneratorError::unavailable(format!(
                        "renderer `{}` not found",
                        self.program.display()
                    ))
                } else {
                    GeneratorError::failed(format!("failed to spawn renderer: {err}"))
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            stderr.truncate(STDERR_LIMIT);
            warn!(
                target = "infra::generator::command",
                op = "command::generate",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code,
                error_code = "renderer_exit",
                stderr = %stderr,
                "Renderer exited with failure"
            );
            return Err(GeneratorError::failed(format!(
                "renderer exited with {exit_code}: {}",
                stderr.trim()
            )));
        }

        let bytes = match fs::read(&output_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(GeneratorError::EmptyOutput);
            }
            Err(err) => {
                return Err(GeneratorError::failed(format!(
                    "failed to read renderer output: {err}"
                )));
            }
        };
        if bytes.is_empty() {
            return Err(GeneratorError::EmptyOutput);
        }

        info!(
            target = "infra::generator::command",
            op = "command::generate",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            pdf_bytes = bytes.len(),
            "Renderer produced document"
        );

        Ok(GeneratedDocument {
            bytes: Bytes::from(bytes),
            content_type: PDF_CONTENT_TYPE.to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};

    use tempfile::TempDir;
    use time::Month;
    use time::macros::date;

    use super::*;
    use crate::domain::types::{PrayerKind, PsalmCycle};

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-renderer");
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[tokio::test]
    async fn passes_descriptor_as_arguments_and_reads_output() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = write_script(
            dir.path(),
            &format!(
                r#"set -eu
echo "$@" > "{args}"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output) shift; out="$1" ;;
  esac
  shift
done
printf '%%PDF-fake' > "$out"
"#,
                args = args_path.display()
            ),
        );

        let descriptor = RequestDescriptor::monthly(PrayerKind::Evening, 2025, Month::December)
            .with_variant(PageVariant::Remarkable)
            .with_cycle(Some(PsalmCycle::Thirty));
        let document = CommandGenerator::new(script)
            .generate(&descriptor)
            .await
            .expect("document");

        assert_eq!(document.bytes.as_ref(), b"%PDF-fake");
        let args = fs::read_to_string(&args_path).expect("args");
        assert!(
            args.starts_with(
                "--type evening --year 2025 --month 12 --remarkable --psalm-cycle 30 --output "
            ),
            "unexpected args: {args}"
        );
    }

    #[test]
    fn daily_arguments_carry_the_date() {
        let args = CommandGenerator::arguments(&RequestDescriptor::daily(
            PrayerKind::Morning,
            date!(2025 - 11 - 08),
        ));
        assert_eq!(args, vec!["--type", "morning", "--date", "2025-11-08"]);
    }

    #[tokio::test]
    async fn surfaces_renderer_failures() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "echo 'lualatex exploded' >&2\nexit 3\n");

        let err = CommandGenerator::new(script)
            .generate(&RequestDescriptor::daily(
                PrayerKind::Morning,
                date!(2025 - 11 - 08),
            ))
            .await
            .expect_err("failure");
        match err {
            GeneratorError::Failed(message) => {
                assert!(message.contains("lualatex exploded"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_output_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "exit 0\n");

        let err = CommandGenerator::new(script)
            .generate(&RequestDescriptor::daily(
                PrayerKind::Morning,
                date!(2025 - 11 - 08),
            ))
            .await
            .expect_err("empty");
        assert!(matches!(err, GeneratorError::EmptyOutput));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let err = CommandGenerator::new(PathBuf::from("/nonexistent/renderer"))
            .generate(&RequestDescriptor::daily(
                PrayerKind::Morning,
                date!(2025 - 11 - 08),
            ))
            .await
            .expect_err("missing");
        assert!(matches!(err, GeneratorError::Unavailable(_)));
    }
}
