//! Access to the radare2 analysis engine
//!
//! [`AnalysisEngine`] is the seam the decompiler adapters talk through.
//! [`R2Engine`] runs each command in a fresh `radare2 -q` process against
//! the configured binary.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DecompilerConfig;

/// Something that executes radare2 commands and returns their output
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Run `command` and return its standard output
    async fn cmd(&self, command: &str) -> Result<String>;
}

/// radare2 driven as a child process
#[derive(Debug, Clone)]
pub struct R2Engine {
    r2_path: PathBuf,
    binary: PathBuf,
    analyze: bool,
    extra_args: Vec<String>,
}

impl R2Engine {
    /// Create an engine for `binary` using the decompiler settings
    ///
    /// # Errors
    /// Returns an error if no radare2 executable can be found
    pub fn new(binary: impl AsRef<Path>, config: &DecompilerConfig) -> Result<Self> {
        let r2_path = match &config.r2_path {
            Some(path) => PathBuf::from(path),
            None => find_radare2()?,
        };

        Ok(Self {
            r2_path,
            binary: binary.as_ref().to_path_buf(),
            analyze: config.analyze,
            extra_args: config.extra_args.clone(),
        })
    }

    /// Arguments passed to radare2 for `command`
    fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-e".to_string(),
            "scr.color=0".to_string(),
            "-e".to_string(),
            "scr.interactive=false".to_string(),
        ];
        if self.analyze {
            args.push("-A".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("-c".to_string());
        args.push(command.to_string());
        args.push(self.binary.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl AnalysisEngine for R2Engine {
    async fn cmd(&self, command: &str) -> Result<String> {
        debug!("r2 {}: {}", self.binary.display(), command);

        let output = Command::new(&self.r2_path)
            .args(self.args(command))
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.r2_path.display()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!(
                "radare2 exited with {} running `{}`: {}",
                output.status,
                command,
                stderr.trim()
            );
        }
        if !stderr.trim().is_empty() {
            warn!("radare2 stderr: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Locate radare2 on `PATH`, trying the long name first
fn find_radare2() -> Result<PathBuf> {
    which::which("radare2")
        .or_else(|_| which::which("r2"))
        .context("radare2 not found on PATH; set decompiler.r2_path in the config")
}
