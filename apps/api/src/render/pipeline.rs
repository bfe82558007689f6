//! LaTeX compilation pipeline.
//!
//! Each job gets its own `TempDir` under `work_root`. The source is written
//! there, the compiler runs with that directory as its cwd and output
//! directory, and the directory is removed when the job resolves, whatever the
//! outcome. On success the PDF is first moved out into `artifact_dir` as a
//! [`CompiledArtifact`], which deletes the file when dropped.
//!
//! # Offloading
//! The compiler is a child process awaited through `tokio::process`, so the
//! calling task suspends without holding a runtime worker. A job that exceeds
//! `timeout` has its child killed and reaped before the working directory is
//! removed, and fails with [`CompileError::Timeout`].

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tempfile::TempPath;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{error, info, warn};
use uuid::Uuid;

const SOURCE_FILE: &str = "resume.tex";
const ARTIFACT_FILE: &str = "resume.pdf";
const LOG_FILE: &str = "resume.log";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not prepare compilation workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("LaTeX compiler `{0}` is not installed")]
    CompilerNotFound(String),

    #[error("could not run LaTeX compiler: {0}")]
    Spawn(#[source] io::Error),

    /// `diagnostics` is for server logs only and stays out of the message.
    #[error("LaTeX compilation failed ({}); see server logs for details", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        diagnostics: Diagnostics,
    },

    #[error("LaTeX compiler reported success but produced no PDF")]
    MissingArtifact { diagnostics: Diagnostics },

    #[error("LaTeX compilation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("could not hand off compiled PDF: {0}")]
    Artifact(#[source] io::Error),
}

/// Compiler output captured from a failed job.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub stderr: String,
    /// Content of `resume.log`, if the compiler wrote one.
    pub log: Option<String>,
}

impl Diagnostics {
    async fn collect(dir: &Path, stderr: &[u8]) -> Self {
        Self {
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
            log: read_log(&dir.join(LOG_FILE)).await,
        }
    }

    fn log_or_placeholder(&self) -> &str {
        self.log.as_deref().unwrap_or("<no log produced>")
    }
}

/// A compiled PDF owned by the caller. The file is deleted when this is dropped.
#[derive(Debug)]
pub struct CompiledArtifact {
    path: TempPath,
}

impl CompiledArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the PDF into memory and deletes the file.
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        if let Err(e) = self.path.close() {
            warn!(error = %e, "Failed to delete delivered PDF");
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct CompilationPipeline {
    compiler: PathBuf,
    work_root: PathBuf,
    artifact_dir: PathBuf,
    timeout: Duration,
}

impl CompilationPipeline {
    /// Working directories and finished artifacts both live under `work_root`
    /// unless [`with_artifact_dir`](Self::with_artifact_dir) says otherwise.
    pub fn new(
        compiler: impl Into<PathBuf>,
        work_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        let work_root = work_root.into();
        Self {
            compiler: compiler.into(),
            artifact_dir: work_root.clone(),
            work_root,
            timeout,
        }
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Compiles `source` into a PDF.
    ///
    /// Whatever happens, the job's working directory is gone by the time this
    /// returns; only the returned artifact (success case) remains on disk.
    pub async fn compile(&self, source: &str) -> Result<CompiledArtifact, CompileError> {
        let job_id = Uuid::new_v4();
        let started_at = Instant::now();

        let workdir = tempfile::Builder::new()
            .prefix("latex-job-")
            .tempdir_in(&self.work_root)
            .map_err(CompileError::Workspace)?;

        let result = self.run_job(job_id, workdir.path(), source).await;

        // Drop would remove it too; closing explicitly surfaces removal errors.
        let workdir_path = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!(
                %job_id,
                path = %workdir_path.display(),
                error = %e,
                "Failed to remove compilation workspace"
            );
        }

        match &result {
            Ok(artifact) => info!(
                %job_id,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                artifact = %artifact.path().display(),
                "LaTeX compilation succeeded"
            ),
            Err(e) => error!(
                %job_id,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %e,
                "LaTeX compilation failed"
            ),
        }

        result
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        dir: &Path,
        source: &str,
    ) -> Result<CompiledArtifact, CompileError> {
        let source_path = dir.join(SOURCE_FILE);
        tokio::fs::write(&source_path, source)
            .await
            .map_err(CompileError::Workspace)?;

        let mut child = Command::new(&self.compiler)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-no-shell-escape")
            .arg("-output-directory")
            .arg(dir)
            .arg(&source_path)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    CompileError::CompilerNotFound(self.compiler.display().to_string())
                } else {
                    CompileError::Spawn(e)
                }
            })?;

        // Both pipes are drained while waiting so a chatty compiler never
        // blocks on a full pipe.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let waited = tokio::time::timeout(self.timeout, async {
            let (status, _, stderr) =
                tokio::try_join!(child.wait(), drain(stdout), drain(stderr))?;
            Ok::<_, io::Error>((status, stderr))
        })
        .await;

        let (status, stderr) = match waited {
            Ok(result) => result.map_err(CompileError::Spawn)?,
            Err(_) => {
                // Reap the child so nothing is still writing into `dir` when it is removed.
                if let Err(e) = child.kill().await {
                    warn!(%job_id, error = %e, "Failed to kill timed-out LaTeX compiler");
                }
                return Err(CompileError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            let diagnostics = Diagnostics::collect(dir, &stderr).await;
            error!(
                %job_id,
                exit_code = status.code().unwrap_or(-1),
                stderr = %diagnostics.stderr,
                log = diagnostics.log_or_placeholder(),
                "LaTeX compiler exited with failure"
            );
            return Err(CompileError::Failed {
                exit_code: status.code(),
                diagnostics,
            });
        }

        let produced = dir.join(ARTIFACT_FILE);
        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            let diagnostics = Diagnostics::collect(dir, &stderr).await;
            error!(
                %job_id,
                log = diagnostics.log_or_placeholder(),
                "LaTeX compiler exited cleanly without a PDF"
            );
            return Err(CompileError::MissingArtifact { diagnostics });
        }

        self.hand_off(&produced).await
    }

    /// Moves the produced PDF out of the job directory into `artifact_dir`.
    async fn hand_off(&self, produced: &Path) -> Result<CompiledArtifact, CompileError> {
        let target = tempfile::Builder::new()
            .prefix("resume-")
            .suffix(".pdf")
            .tempfile_in(&self.artifact_dir)
            .map_err(CompileError::Artifact)?
            .into_temp_path();

        if tokio::fs::rename(produced, &target).await.is_err() {
            // Different filesystem, or rename over an existing file unsupported.
            tokio::fs::copy(produced, &target)
                .await
                .map_err(CompileError::Artifact)?;
        }

        Ok(CompiledArtifact { path: target })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn read_log(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).trim().to_string()),
        Err(_) => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Mimics pdflatex: writes log, aux and a "PDF" that embeds the source.
    const SUCCEEDING: &str = r#"#!/bin/sh
out=""
src=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output-directory) shift; out="$1" ;;
    -*) ;;
    *) src="$1" ;;
  esac
  shift
done
echo "This is a fake TeX" > "$out/resume.log"
echo "aux" > "$out/resume.aux"
printf '%%PDF-1.4 ' > "$out/resume.pdf"
cat "$src" >> "$out/resume.pdf"
"#;

    const FAILING: &str = r#"#!/bin/sh
while [ "$#" -gt 1 ]; do shift; done
dir=$(dirname "$1")
echo "! Undefined control sequence." > "$dir/resume.log"
printf '%%PDF-partial' > "$dir/resume.pdf"
echo "boom" >&2
exit 1
"#;

    const NO_PDF: &str = r#"#!/bin/sh
while [ "$#" -gt 1 ]; do shift; done
dir=$(dirname "$1")
echo "No pages of output." > "$dir/resume.log"
exit 0
"#;

    const HANGING: &str = "#!/bin/sh\nexec sleep 30\n";

    /// Keeps writing into the working directory until killed.
    const SCRIBBLING: &str = r#"#!/bin/sh
while [ "$#" -gt 1 ]; do shift; done
dir=$(dirname "$1")
i=0
while true; do
  i=$((i + 1))
  echo "line $i" >> "$dir/resume.log"
  : > "$dir/resume-$i.aux"
done
"#;

    /// Floods stdout well past a pipe buffer before producing a PDF.
    const CHATTY: &str = r#"#!/bin/sh
while [ "$#" -gt 1 ]; do shift; done
dir=$(dirname "$1")
i=0
while [ "$i" -lt 20000 ]; do
  echo "Overfull hbox (badness 10000) in paragraph at lines $i--$i"
  i=$((i + 1))
done
printf '%%PDF-1.4' > "$dir/resume.pdf"
"#;

    struct Fixture {
        _root: TempDir,
        work_root: PathBuf,
        artifact_dir: PathBuf,
        pipeline: CompilationPipeline,
    }

    fn fixture(script: Option<&str>, timeout: Duration) -> Fixture {
        let root = TempDir::new().expect("temp dir");
        let work_root = root.path().join("work");
        let artifact_dir = root.path().join("artifacts");
        fs::create_dir_all(&work_root).expect("work dir");
        fs::create_dir_all(&artifact_dir).expect("artifact dir");

        let compiler = root.path().join("fake-pdflatex");
        if let Some(script) = script {
            fs::write(&compiler, script).expect("write script");
            let mut perms = fs::metadata(&compiler).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&compiler, perms).expect("set perms");
        }

        let pipeline = CompilationPipeline::new(compiler, &work_root, timeout)
            .with_artifact_dir(&artifact_dir);
        Fixture {
            _root: root,
            work_root,
            artifact_dir,
            pipeline,
        }
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).expect("read dir").count()
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_success_leaves_only_artifact() {
        let fx = fixture(Some(SUCCEEDING), TIMEOUT);

        let artifact = fx
            .pipeline
            .compile(r"\begin{document}hi\end{document}")
            .await
            .unwrap();

        assert_eq!(entries(&fx.work_root), 0);
        assert_eq!(entries(&fx.artifact_dir), 1);
        assert!(artifact.path().starts_with(&fx.artifact_dir));

        let bytes = artifact.into_bytes().await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4 "));
        assert!(text.contains(r"\begin{document}hi\end{document}"));
        assert_eq!(entries(&fx.artifact_dir), 0);
    }

    #[tokio::test]
    async fn test_dropping_artifact_deletes_file() {
        let fx = fixture(Some(SUCCEEDING), TIMEOUT);
        let artifact = fx.pipeline.compile("x").await.unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_cleans_up_and_returns_no_artifact() {
        let fx = fixture(Some(FAILING), TIMEOUT);

        let err = fx.pipeline.compile("x").await.unwrap_err();

        let CompileError::Failed {
            exit_code,
            diagnostics,
        } = &err
        else {
            panic!("expected Failed, got {err:?}");
        };
        assert_eq!(*exit_code, Some(1));
        assert_eq!(diagnostics.stderr, "boom");
        assert_eq!(diagnostics.log.as_deref(), Some("! Undefined control sequence."));
        // The caller-facing message is only the summary.
        assert!(!err.to_string().contains("Undefined control sequence"));
        assert!(!err.to_string().contains("boom"));
        assert_eq!(entries(&fx.work_root), 0);
        assert_eq!(entries(&fx.artifact_dir), 0);
    }

    #[tokio::test]
    async fn test_missing_pdf_is_failure() {
        let fx = fixture(Some(NO_PDF), TIMEOUT);

        let err = fx.pipeline.compile("x").await.unwrap_err();

        match err {
            CompileError::MissingArtifact { diagnostics } => {
                assert_eq!(diagnostics.log.as_deref(), Some("No pages of output."));
            }
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
        assert_eq!(entries(&fx.work_root), 0);
        assert_eq!(entries(&fx.artifact_dir), 0);
    }

    #[tokio::test]
    async fn test_missing_compiler_still_cleans_up() {
        let fx = fixture(None, TIMEOUT);

        let err = fx.pipeline.compile("x").await.unwrap_err();

        assert!(matches!(err, CompileError::CompilerNotFound(_)));
        assert_eq!(entries(&fx.work_root), 0);
    }

    #[tokio::test]
    async fn test_hung_compiler_times_out() {
        let fx = fixture(Some(HANGING), Duration::from_millis(200));

        let started = Instant::now();
        let err = fx.pipeline.compile("x").await.unwrap_err();

        assert!(matches!(err, CompileError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(entries(&fx.work_root), 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_compiler_still_writing() {
        let fx = fixture(Some(SCRIBBLING), Duration::from_millis(200));

        let err = fx.pipeline.compile("x").await.unwrap_err();

        assert!(matches!(err, CompileError::Timeout { .. }));
        assert_eq!(entries(&fx.work_root), 0);
        // Nothing reappears once the job has returned.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(entries(&fx.work_root), 0);
    }

    #[tokio::test]
    async fn test_large_compiler_output_does_not_stall() {
        let fx = fixture(Some(CHATTY), TIMEOUT);

        let artifact = fx.pipeline.compile("x").await.unwrap();

        assert_eq!(artifact.into_bytes().await.unwrap(), b"%PDF-1.4");
        assert_eq!(entries(&fx.work_root), 0);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_do_not_collide() {
        let fx = fixture(Some(SUCCEEDING), TIMEOUT);

        let (a, b) = tokio::join!(fx.pipeline.compile("first"), fx.pipeline.compile("second"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.path(), b.path());
        let a = String::from_utf8(a.into_bytes().await.unwrap()).unwrap();
        let b = String::from_utf8(b.into_bytes().await.unwrap()).unwrap();
        assert!(a.ends_with("first"));
        assert!(b.ends_with("second"));
        assert_eq!(entries(&fx.work_root), 0);
    }
}
