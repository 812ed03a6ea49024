//! External command execution.
//!
//! Every encoder, merger and script runner in this crate is an external
//! program. This module finds them on `PATH`, runs them with output
//! discarded, and splits long argument lists so one logical invocation can be
//! issued as several calls below the platform's command-length ceiling.
//!
//! All functions here block; the pipeline calls them from
//! `tokio::task::spawn_blocking`.

use crate::error::BindError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Find `program` on `PATH`, honouring `PATHEXT` on Windows.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let extensions: Vec<OsString> = if cfg!(windows) {
        std::env::var_os("PATHEXT")
            .map(|exts| {
                exts.to_string_lossy()
                    .split(';')
                    .map(OsString::from)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        vec![OsString::new()]
    };

    std::env::split_paths(&path).find_map(|dir| {
        extensions.iter().find_map(|ext| {
            let mut name = OsString::from(program);
            name.push(ext);
            let candidate = dir.join(name);
            is_executable(&candidate).then_some(candidate)
        })
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Fail with [`BindError::MissingDependency`] for the first tool not on `PATH`.
pub fn require<'a>(tools: impl IntoIterator<Item = &'a str>) -> Result<(), BindError> {
    for tool in tools {
        if find_executable(tool).is_none() {
            return Err(BindError::MissingDependency {
                tool: tool.to_string(),
            });
        }
    }
    Ok(())
}

/// Split a user option string into arguments.
///
/// Whitespace separates arguments; a single- or double-quoted run is kept
/// together with its quotes removed. An unmatched quote is literal.
pub fn split_options(options: &str) -> Vec<String> {
    let chars: Vec<char> = options.chars().collect();
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        match quote {
            Some(q) if c == q => {
                args.push(std::mem::take(&mut current));
                quote = None;
            }
            Some(_) => current.push(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None if (c == '"' || c == '\'') && current.is_empty() && chars[i + 1..].contains(&c) => {
                quote = Some(c);
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args.retain(|a| !a.is_empty());
    args
}

/// Split `items` into consecutive chunks whose command lines stay under `limit`.
///
/// `fixed_len` is the length of everything except the item arguments
/// (program, options, output). Each item costs its length plus a separator
/// and quotes. Order is preserved and every chunk holds at least one item,
/// even when a single item alone exceeds the limit.
pub fn split_batches<T: AsRef<Path>>(fixed_len: usize, items: &[T], limit: usize) -> Vec<Vec<&T>> {
    let mut chunks: Vec<Vec<&T>> = Vec::new();
    let mut current: Vec<&T> = Vec::new();
    let mut len = fixed_len;

    for item in items {
        let cost = item.as_ref().as_os_str().len() + 3;
        if !current.is_empty() && len + cost >= limit {
            chunks.push(std::mem::take(&mut current));
            len = fixed_len;
        }
        len += cost;
        current.push(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// A single external program invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Append the arguments of a user option string.
    pub fn options(self, options: &str) -> Self {
        self.args(split_options(options))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Length of the command line as a shell would see it, items quoted.
    pub fn command_len(&self) -> usize {
        self.program.len() + self.args.iter().map(|a| a.len() + 3).sum::<usize>()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn describe(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run to completion with output discarded; non-zero exit is an error.
    pub fn run(&self) -> Result<(), BindError> {
        debug!("exec: {}", self.describe());
        let status = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| self.failed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(self.failed(format!("exited with {status}")))
        }
    }

    /// Run to completion and return standard output.
    pub fn capture(&self) -> Result<String, BindError> {
        debug!("exec: {}", self.describe());
        let output = self
            .command()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| self.failed(e.to_string()))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(self.failed(format!("exited with {}", output.status)))
        }
    }

    fn failed(&self, detail: String) -> BindError {
        BindError::ToolFailed {
            tool: self.program.clone(),
            detail,
        }
    }
}

/// Fail with [`BindError::EncodeFailure`] when `output` is absent after an encode.
pub fn ensure_output(tool: &str, output: &Path) -> Result<(), BindError> {
    if output.is_file() {
        Ok(())
    } else {
        Err(BindError::EncodeFailure {
            tool: tool.to_string(),
            output: output.to_path_buf(),
            detail: "no encode errors, but the output does not exist".into(),
        })
    }
}
