//! Office documents → PDF via a headless office suite.
//!
//! The converter is driven as
//! `<program> --headless --convert-to pdf --outdir <dir> <input>`.
//!
//! ## Output presence decides success
//!
//! Converter backends disagree about exit codes: some exit 0 after failing
//! to load a document, others exit non-zero after writing a perfectly good
//! PDF. After the process ends (or is killed) we look for
//! `<dir>/<input stem>.pdf` and trust only that. The exit status is logged.
//!
//! ## Resource bounds
//!
//! A converter process is heavyweight (hundreds of MB, seconds of start-up).
//! A semaphore caps how many run at once and each run is bounded by a
//! timeout. On Unix the converter gets its own process group, which is
//! killed as a whole once the run ends, times out or the request future is
//! dropped; elsewhere only the direct child is killed (`kill_on_drop`).

use crate::config::ServiceConfig;
use crate::error::ConversionError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Time allowed for the start-up `--version` probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Headless office converter with bounded concurrency.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    program: String,
    timeout: Duration,
    isolate_profile: bool,
    slots: Arc<Semaphore>,
}

impl OfficeConverter {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            program: config.office_program.clone(),
            timeout: config.office_timeout(),
            isolate_profile: config.isolate_office_profile,
            slots: Arc::new(Semaphore::new(config.max_concurrent_conversions)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Convert `input` into `out_dir`, returning the produced PDF's path.
    ///
    /// `out_dir` must be private to the caller: with profile isolation on,
    /// the converter's user profile is created inside it.
    pub async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let expected = expected_output(input, out_dir);

        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|e| ConversionError::Internal(format!("Converter slots closed: {e}")))?;

        let mut cmd = Command::new(&self.program);
        if self.isolate_profile {
            cmd.arg(profile_arg(&out_dir.join("profile")));
        }
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        own_process_group(&mut cmd);

        debug!("Running {} on {}", self.program, input.display());
        let child = cmd.spawn().map_err(|source| ConversionError::OfficeSpawn {
            program: self.program.clone(),
            source,
        })?;
        // Dropped on every exit from here on, including cancellation.
        #[cfg(unix)]
        let _group = child
            .id()
            .and_then(|id| libc::pid_t::try_from(id).ok())
            .map(ProcessGroup);

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                return Err(ConversionError::OfficeTimeout {
                    path: input.to_path_buf(),
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(ConversionError::Internal(format!(
                    "Waiting for {} failed: {e}",
                    self.program
                )))
            }
            Ok(Ok(output)) => output,
        };

        debug!(
            "{} exited with {}; stdout: {}; stderr: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim()
        );

        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            if !output.status.success() {
                info!(
                    "{} reported {} but produced {}",
                    self.program,
                    output.status,
                    expected.display()
                );
            }
            Ok(expected)
        } else {
            Err(ConversionError::OfficeNoOutput {
                expected,
                status: output.status.to_string(),
            })
        }
    }
}

/// Start the converter as the leader of a new process group.
///
/// Office launchers fork the real worker (`oosplash`, `soffice.bin`);
/// killing only the direct child leaves those running.
#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    // SAFETY: `setpgid` is async-signal-safe and touches no parent memory.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == 0 {
                Ok(())
            } else {
                Err(std::io::Error::last_os_error())
            }
        });
    }
}

/// Kills a converter's whole process group when dropped.
#[cfg(unix)]
struct ProcessGroup(libc::pid_t);

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        // SAFETY: plain syscall; ESRCH (group already gone) is ignored.
        let rc = unsafe { libc::killpg(self.0, libc::SIGKILL) };
        if rc == 0 {
            debug!("Killed converter process group {}", self.0);
        }
    }
}

/// Where the converter writes the PDF for `input`: `<out_dir>/<stem>.pdf`.
pub fn expected_output(input: &Path, out_dir: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".pdf");
    out_dir.join(name)
}

/// `-env:UserInstallation=file:///…` pointing at `profile_dir`.
fn profile_arg(profile_dir: &Path) -> String {
    let path = profile_dir.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("-env:UserInstallation=file://{path}")
    } else {
        format!("-env:UserInstallation=file:///{path}")
    }
}

/// Ask the converter for its version. `None` if it cannot be run.
pub async fn probe(program: &str) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.arg("--version").stdin(Stdio::null()).kill_on_drop(true);

    match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            Some(version)
        }
        Ok(Err(e)) => {
            warn!("Office converter '{}' is not available: {}", program, e);
            None
        }
        Err(_) => {
            warn!(
                "Office converter '{}' did not answer --version within {}s",
                program,
                PROBE_TIMEOUT.as_secs()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_output_uses_input_stem() {
        let out = expected_output(Path::new("/w/req-1/Q3 notes.v2.docx"), Path::new("/w/req-1"));
        assert_eq!(out, PathBuf::from("/w/req-1/Q3 notes.v2.pdf"));
    }

    #[test]
    fn profile_arg_is_file_url() {
        assert_eq!(
            profile_arg(Path::new("/srv/uploads/req-x/profile")),
            "-env:UserInstallation=file:///srv/uploads/req-x/profile"
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let config = ServiceConfig::builder()
            .office_program("definitely-not-an-office-suite-4b1e")
            .build()
            .unwrap();
        let office = OfficeConverter::new(&config);
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("a.docx");
        std::fs::write(&input, b"x").unwrap();

        let err = office.convert(&input, tmp.path()).await.unwrap_err();
        assert!(
            matches!(err, ConversionError::OfficeSpawn { .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn probe_missing_program() {
        assert!(probe("definitely-not-an-office-suite-4b1e").await.is_none());
    }
}
