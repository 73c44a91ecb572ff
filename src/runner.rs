//! Hands a serialized patch set to the external patcher.

use crate::error::{self, Result};
use log::{error, info};
use serde::Serialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::{self, JoinHandle};
use tempfile::NamedTempFile;

pub const DEFAULT_TOOL: &str = "patcherex";
pub const DEFAULT_BACKEND: &str = "reassembler_backend";

#[derive(Serialize, Debug)]
struct PatcherConfig<'a> {
    techniques: Techniques<'a>,
    backend: Backend<'a>,
}

#[derive(Serialize, Debug)]
struct Techniques<'a> {
    manualpatcher: ManualPatcher<'a>,
}

#[derive(Serialize, Debug)]
struct ManualPatcher<'a> {
    options: ManualPatcherOptions<'a>,
}

#[derive(Serialize, Debug)]
struct ManualPatcherOptions<'a> {
    patch_file: &'a Path,
}

#[derive(Serialize, Debug)]
struct Backend<'a> {
    name: &'a str,
    options: Option<BTreeMap<String, String>>,
}

/// How to invoke the patcher.
#[derive(Clone, Debug, PartialEq)]
pub struct PatcherRunner {
    pub tool: PathBuf,
    pub backend: String,
}

impl Default for PatcherRunner {
    fn default() -> Self {
        PatcherRunner {
            tool: PathBuf::from(DEFAULT_TOOL),
            backend: DEFAULT_BACKEND.to_string(),
        }
    }
}

impl PatcherRunner {
    pub fn with_tool<P: Into<PathBuf>>(mut self, tool: P) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_backend<S: Into<String>>(mut self, backend: S) -> Self {
        self.backend = backend.into();
        self
    }

    /// Patcher configuration pointing the manual patcher at `patch_file`.
    pub fn config(&self, patch_file: &Path) -> Result<String> {
        let config = PatcherConfig {
            techniques: Techniques {
                manualpatcher: ManualPatcher {
                    options: ManualPatcherOptions { patch_file },
                },
            },
            backend: Backend {
                name: &self.backend,
                options: None,
            },
        };
        serde_yaml::to_string(&config).context(error::PatcherConfig)
    }

    /// Writes `snapshot` and a config referencing it to temporary files, then
    /// runs `<tool> -c <config> single <input> <output>` on a worker thread.
    ///
    /// `on_complete` is called on that worker once the process has exited,
    /// with `ExternalToolFailure` for a non-zero status. Nothing waits for the
    /// run; the returned handle may simply be dropped.
    pub fn launch<F>(
        &self,
        snapshot: Vec<u8>,
        input: &Path,
        output: &Path,
        on_complete: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let mut patch_file = NamedTempFile::new().context(error::TempFile)?;
        patch_file.write_all(&snapshot).context(error::TempFile)?;
        patch_file.flush().context(error::TempFile)?;

        let config = self.config(patch_file.path())?;
        let mut config_file = NamedTempFile::new().context(error::TempFile)?;
        config_file
            .write_all(config.as_bytes())
            .context(error::TempFile)?;
        config_file.flush().context(error::TempFile)?;

        let tool = self.tool.clone();
        let mut command = Command::new(&tool);
        command
            .arg("-c")
            .arg(config_file.path())
            .arg("single")
            .arg(input)
            .arg(output);

        info!("Calling {} on {}", tool.display(), input.display());
        let handle = thread::spawn(move || {
            let result = run(command, &tool);
            // the patcher reads both files, keep them until it is done
            drop(config_file);
            drop(patch_file);

            match &result {
                Ok(()) => info!("{} completed successfully", tool.display()),
                Err(e) => error!("{}", e),
            }
            on_complete(result);
        });

        Ok(handle)
    }
}

fn run(mut command: Command, tool: &Path) -> Result<()> {
    let status = command
        .status()
        .context(error::SpawnPatcher { tool })?;
    if status.success() {
        Ok(())
    } else {
        error::ExternalToolFailure { status }.fail()
    }
}
