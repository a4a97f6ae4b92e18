//! ExifTool command wrapper utilities

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use thiserror::Error;
use tracing::debug;

use crate::attachment::Attachment;

/// Flags shared by every extraction: JSON output, long `{desc, val, num}` form.
///
/// `-l` also suppresses duplicate tags since `-a` is never passed.
const JSON_LONG_ARGS: [&str; 2] = ["-j", "-l"];

#[derive(Debug, Error)]
pub enum ExiftoolError {
    #[error("ExifTool not found: {0}")]
    NotInstalled(String),

    #[error("ExifTool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything able to turn an attachment into raw `exiftool -j -l` JSON
pub trait MetadataExtractor: Send + Sync {
    fn is_available(&self) -> bool;

    fn extract(&self, file: &mut Attachment) -> Result<Vec<u8>, ExiftoolError>;
}

pub struct ExiftoolCommand {
    program: PathBuf,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
}

impl ExiftoolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    /// Feed `bytes` on standard input (`-` as the file argument)
    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.args.push("-".to_string());
        self.stdin = Some(bytes);
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(self) -> Result<Output, ExiftoolError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match self.stdin {
            None => command
                .stdin(Stdio::null())
                .output()
                .map_err(|e| spawn_error(&self.program, e))?,
            Some(bytes) => {
                let mut child = command
                    .stdin(Stdio::piped())
                    .spawn()
                    .map_err(|e| spawn_error(&self.program, e))?;

                // Write from a separate thread so a full stdout pipe cannot deadlock us
                let mut pipe = child.stdin.take().ok_or_else(|| {
                    ExiftoolError::ExecutionFailed("stdin not captured".to_string())
                })?;
                let writer = thread::spawn(move || pipe.write_all(&bytes));

                let output = child.wait_with_output()?;
                match writer.join() {
                    Ok(Ok(())) => {}
                    // exiftool may stop reading once it has seen enough of the file
                    Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        return Err(ExiftoolError::ExecutionFailed(
                            "stdin writer panicked".to_string(),
                        ))
                    }
                }
                output
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExiftoolError::ExecutionFailed(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        Ok(output)
    }
}

/// A missing binary only shows up when spawning it
fn spawn_error(program: &Path, e: std::io::Error) -> ExiftoolError {
    if e.kind() == ErrorKind::NotFound {
        ExiftoolError::NotInstalled(program.display().to_string())
    } else {
        ExiftoolError::ExecutionFailed(e.to_string())
    }
}

/// Subprocess-backed extractor
#[derive(Debug, Clone)]
pub struct Exiftool {
    program: PathBuf,
}

impl Exiftool {
    /// Use `exiftool` from `PATH`
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Exiftool {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor for Exiftool {
    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-ver")
            .stdin(Stdio::null())
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn extract(&self, file: &mut Attachment) -> Result<Vec<u8>, ExiftoolError> {
        let command = ExiftoolCommand::new(&self.program).args(&JSON_LONG_ARGS);
        let command = match file.path() {
            Some(path) => {
                debug!("Passing {} to exiftool", path.display());
                command.input(path)
            }
            None => {
                debug!("Piping uncommitted upload {} to exiftool", file.file_name());
                command.stdin(file.read_all()?)
            }
        };

        Ok(command.execute()?.stdout)
    }
}
