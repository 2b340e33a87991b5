//! Notebook execution service.

use crate::notebook::{Cell, Notebook, NotebookError, Output};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("could not launch `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
    #[error("execution timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("cell {cell} raised {ename}: {evalue}")]
    Cell {
        cell: usize,
        ename: String,
        evalue: String,
    },
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An executed notebook plus the first failure, if any cell raised.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub notebook: Notebook,
    pub error: Option<ExecutionError>,
}

/// Runs every code cell of a notebook in a fresh kernel.
pub trait Executor {
    /// Execute `nb` with `workdir` as the kernel's working directory.
    ///
    /// `Err` means nothing ran. A raising cell is not an `Err`: the outcome
    /// carries the notebook with every output produced and the failure.
    fn execute(&self, nb: &Notebook, workdir: &Path) -> Result<ExecutionOutcome, ExecutionError>;
}

/// First error output of an executed notebook.
pub fn first_error(nb: &Notebook) -> Option<ExecutionError> {
    nb.cells.iter().enumerate().find_map(|(i, cell)| match cell {
        Cell::Code(code) => code.outputs.iter().find_map(|out| match out {
            Output::Error { ename, evalue, .. } => Some(ExecutionError::Cell {
                cell: i,
                ename: ename.clone(),
                evalue: evalue.clone(),
            }),
            _ => None,
        }),
        _ => None,
    })
}

/// Executes notebooks through `jupyter nbconvert --execute`.
///
/// The notebook is written to a hidden scratch file next to the source so
/// that relative paths inside it resolve as they would for the author.
///
/// Runs with `--allow-errors`: a raising cell is recorded as an error output
/// and the remaining cells still run, so the document shows every output
/// after the failure too rather than stopping at the first error.
///
/// `cell_timeout` bounds each cell. A cell that exceeds it is interrupted and
/// recorded as an error output like any other raising cell. The optional run
/// limit bounds the whole nbconvert process; hitting it kills the process and
/// yields [`ExecutionError::Timeout`] with no executed notebook.
pub struct JupyterExecutor {
    command: String,
    cell_timeout: Duration,
    run_limit: Option<Duration>,
}

impl JupyterExecutor {
    pub fn new(command: impl Into<String>, cell_timeout: Duration) -> Self {
        Self {
            command: command.into(),
            cell_timeout,
            run_limit: None,
        }
    }

    /// Kill the whole run after `limit`.
    pub fn with_run_limit(mut self, limit: Duration) -> Self {
        self.run_limit = Some(limit);
        self
    }
}

impl Executor for JupyterExecutor {
    fn execute(&self, nb: &Notebook, workdir: &Path) -> Result<ExecutionOutcome, ExecutionError> {
        let scratch = tempfile::Builder::new()
            .prefix(".nb-gallery-")
            .suffix(".ipynb")
            .tempfile_in(workdir)?;
        nb.write(scratch.path())?;
        let out_dir = tempfile::TempDir::new()?;

        debug!(command = %self.command, workdir = %workdir.display(), "starting kernel");
        let mut child = Command::new(&self.command)
            .args(["nbconvert", "--to", "notebook", "--execute", "--allow-errors"])
            .arg(format!(
                "--ExecutePreprocessor.timeout={}",
                self.cell_timeout.as_secs().max(1)
            ))
            .arg("--ExecutePreprocessor.interrupt_on_timeout=True")
            .arg("--output-dir")
            .arg(out_dir.path())
            .arg("--output")
            .arg("executed")
            .arg(scratch.path())
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecutionError::Launch {
                command: self.command.clone(),
                source,
            })?;

        // Drain stderr on a thread so a chatty kernel cannot fill the pipe
        let stderr = child.stderr.take();
        let drain = std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut text);
            }
            text
        });

        let deadline = self.run_limit.map(|limit| (Instant::now() + limit, limit));
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some((at, limit)) = deadline
                && Instant::now() >= at
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionError::Timeout {
                    seconds: limit.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        let stderr = drain.join().unwrap_or_default();

        if !status.success() {
            return Err(ExecutionError::Failed {
                command: self.command.clone(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        let notebook = Notebook::read(&out_dir.path().join("executed.ipynb"))?;
        let error = first_error(&notebook);
        Ok(ExecutionOutcome { notebook, error })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::notebook::CodeCell;
    use std::cell::RefCell;

    /// Executor that fills outputs from a script instead of running a kernel.
    ///
    /// Each code cell gets the outputs returned by `respond(source)`; a cell
    /// whose source contains `raise` gets an error output instead.
    pub struct ScriptedExecutor<F: Fn(&str) -> Vec<Output>> {
        pub respond: F,
        pub calls: RefCell<Vec<std::path::PathBuf>>,
    }

    impl<F: Fn(&str) -> Vec<Output>> ScriptedExecutor<F> {
        pub fn new(respond: F) -> Self {
            Self {
                respond,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl<F: Fn(&str) -> Vec<Output>> Executor for ScriptedExecutor<F> {
        fn execute(
            &self,
            nb: &Notebook,
            workdir: &Path,
        ) -> Result<ExecutionOutcome, ExecutionError> {
            self.calls.borrow_mut().push(workdir.to_path_buf());
            let mut executed = nb.clone();
            let mut count = 0;
            for cell in &mut executed.cells {
                if let Cell::Code(code) = cell {
                    count += 1;
                    code.execution_count = Some(count);
                    code.outputs = if code.source.contains("raise") {
                        vec![Output::Error {
                            ename: "ValueError".into(),
                            evalue: "boom".into(),
                            traceback: vec!["\u{1b}[0;31mValueError\u{1b}[0m: boom".into()],
                            metadata: Default::default(),
                        }]
                    } else {
                        (self.respond)(&code.source)
                    };
                }
            }
            let error = first_error(&executed);
            Ok(ExecutionOutcome {
                notebook: executed,
                error,
            })
        }
    }

    #[test]
    fn first_error_reports_cell_index() {
        let mut nb = Notebook::new(vec![Cell::markdown("# t"), Cell::code("1/0")]);
        if let Cell::Code(CodeCell { outputs, .. }) = &mut nb.cells[1] {
            outputs.push(Output::Error {
                ename: "ZeroDivisionError".into(),
                evalue: "division by zero".into(),
                traceback: vec![],
                metadata: Default::default(),
            });
        }
        let err = first_error(&nb).unwrap();
        assert!(matches!(err, ExecutionError::Cell { cell: 1, .. }));
        assert!(err.to_string().contains("ZeroDivisionError"));
    }

    #[test]
    fn first_error_none_for_clean_notebook() {
        assert!(first_error(&Notebook::new(vec![Cell::code("x = 1")])).is_none());
    }

    #[test]
    fn scripted_executor_marks_raising_cells() {
        let exec = ScriptedExecutor::new(|_| Vec::new());
        let nb = Notebook::new(vec![Cell::code("ok()"), Cell::code("raise ValueError")]);
        let outcome = exec.execute(&nb, Path::new("/src")).unwrap();
        assert!(matches!(outcome.error, Some(ExecutionError::Cell { cell: 1, .. })));
        assert_eq!(exec.calls.borrow().as_slice(), [std::path::PathBuf::from("/src")]);
    }

    #[test]
    fn missing_launcher_is_launch_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let exec = JupyterExecutor::new("/nonexistent/jupyter-launcher", Duration::from_secs(5));
        let result = exec.execute(&Notebook::new(vec![]), tmp.path());
        assert!(matches!(result, Err(ExecutionError::Launch { .. })));
    }

    #[cfg(unix)]
    fn fake_launcher(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-jupyter");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn launcher_output_is_read_back() {
        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        // Copies the input notebook (last argument) to <output-dir>/executed.ipynb
        let launcher = fake_launcher(
            bin.path(),
            r#"while [ $# -gt 1 ]; do
  case "$1" in --output-dir) shift; out="$1";; esac
  shift
done
cp "$1" "$out/executed.ipynb""#,
        );

        let exec = JupyterExecutor::new(launcher.to_string_lossy(), Duration::from_secs(10));
        let nb = Notebook::new(vec![Cell::code("print(1)")]);
        let outcome = exec.execute(&nb, work.path()).unwrap();

        assert_eq!(outcome.notebook.cells, nb.cells);
        assert!(outcome.error.is_none());
        // Scratch notebook is cleaned up
        let leftovers: Vec<_> = std::fs::read_dir(work.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn launcher_failure_is_reported() {
        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        let launcher = fake_launcher(bin.path(), "echo kernel died >&2\nexit 3");

        let exec = JupyterExecutor::new(launcher.to_string_lossy(), Duration::from_secs(10));
        let err = exec
            .execute(&Notebook::new(vec![]), work.path())
            .unwrap_err();
        match err {
            ExecutionError::Failed { stderr, .. } => assert_eq!(stderr, "kernel died"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_launcher_times_out() {
        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        let launcher = fake_launcher(bin.path(), "exec sleep 10");

        let exec = JupyterExecutor::new(launcher.to_string_lossy(), Duration::from_secs(10))
            .with_run_limit(Duration::from_millis(200));
        let result = exec.execute(&Notebook::new(vec![]), work.path());
        assert!(matches!(result, Err(ExecutionError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn cell_timeout_does_not_bound_the_whole_run() {
        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        let launcher = fake_launcher(
            bin.path(),
            r#"sleep 1
while [ $# -gt 1 ]; do
  case "$1" in --output-dir) shift; out="$1";; esac
  shift
done
cp "$1" "$out/executed.ipynb""#,
        );

        let exec = JupyterExecutor::new(launcher.to_string_lossy(), Duration::from_millis(200));
        let outcome = exec.execute(&Notebook::new(vec![Cell::code("x = 1")]), work.path());
        assert!(outcome.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_cells_are_interrupted_not_fatal() {
        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        let args = bin.path().join("args.txt");
        let launcher = fake_launcher(
            bin.path(),
            &format!(
                r#"echo "$@" > '{}'
while [ $# -gt 1 ]; do
  case "$1" in --output-dir) shift; out="$1";; esac
  shift
done
cp "$1" "$out/executed.ipynb""#,
                args.display()
            ),
        );

        let exec = JupyterExecutor::new(launcher.to_string_lossy(), Duration::from_secs(30));
        exec.execute(&Notebook::new(vec![]), work.path()).unwrap();

        let recorded = std::fs::read_to_string(&args).unwrap();
        assert!(recorded.contains("--allow-errors"));
        assert!(recorded.contains("--ExecutePreprocessor.timeout=30"));
        assert!(recorded.contains("--ExecutePreprocessor.interrupt_on_timeout=True"));
    }
}
