use snafu::Snafu;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unknown patch type {:?}", patch_type))]
    UnknownPatchType { patch_type: String },

    #[snafu(display("Patch index {} out of range (have {} patches)", index, count))]
    IndexOutOfRange { index: usize, count: usize },

    #[snafu(display("Malformed patch set: {}", source))]
    MalformedSerialization { source: serde_json::Error },

    #[snafu(display("Invalid data for patch {:?}: {}", name, reason))]
    InvalidPatchData { name: String, reason: String },

    #[snafu(display("Unable to read {}: {}", path.display(), source))]
    ReadPatchSet { path: PathBuf, source: io::Error },

    #[snafu(display("Unable to write {}: {}", path.display(), source))]
    WritePatchSet { path: PathBuf, source: io::Error },

    #[snafu(display("Unable to read patch data from {}: {}", path.display(), source))]
    ReadPatchData { path: PathBuf, source: io::Error },

    #[snafu(display("Patch data is not valid JSON: {}", source))]
    PatchDataJson { source: serde_json::Error },

    #[snafu(display("Unable to render patcher config: {}", source))]
    PatcherConfig { source: serde_yaml::Error },

    #[snafu(display("Unable to create temporary file: {}", source))]
    TempFile { source: io::Error },

    #[snafu(display("Unable to start {}: {}", tool.display(), source))]
    SpawnPatcher { tool: PathBuf, source: io::Error },

    #[snafu(display("Patcher failed ({})", status))]
    ExternalToolFailure { status: ExitStatus },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
