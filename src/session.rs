use crate::error::{self, Result};
use crate::kind::DisplayRow;
use crate::patch::{PatchRecord, PatchUpdate};
use crate::registry::PatchTypeRegistry;
use crate::runner::PatcherRunner;
use crate::store::PatchRecordStore;
use log::info;
use serde_json::Value;
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Everything one patch list window needs: the store, the patcher settings
/// and the executable being patched.
///
/// Dropping the session tears the store down through [`PatchRecordStore::clear_all`].
#[derive(Debug)]
pub struct PatchSession {
    store: PatchRecordStore,
    runner: PatcherRunner,
    input: PathBuf,
}

impl PatchSession {
    pub fn new<P: Into<PathBuf>>(registry: Arc<PatchTypeRegistry>, input: P) -> Self {
        PatchSession {
            store: PatchRecordStore::new(registry),
            runner: PatcherRunner::default(),
            input: input.into(),
        }
    }

    pub fn with_runner(mut self, runner: PatcherRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn store(&self) -> &PatchRecordStore {
        &self.store
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn len(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn row(&self, index: usize) -> Result<DisplayRow> {
        let record = self.store.get(index)?;
        let kind = self.store.registry().get(&record.patch_type)?;
        Ok(kind.format_for_display(record))
    }

    pub fn rows(&self) -> Result<Vec<DisplayRow>> {
        (0..self.store.count()).map(|i| self.row(i)).collect()
    }

    /// Validates the entry with its kind before adding it.
    pub fn insert(&mut self, patch_type: &str, address: u64, name: &str, data: Value) -> Result<usize> {
        let kind = self.store.registry().get(patch_type)?;
        kind.validate(&PatchRecord::new(patch_type, address, name, data.clone()))?;
        self.store.add(patch_type, address, name, data)
    }

    /// Validates the merged entry with its kind before applying `update`.
    pub fn edit(&mut self, index: usize, update: PatchUpdate) -> Result<()> {
        let merged = self.store.get(index)?.merged(&update);
        self.store.registry().get(&merged.patch_type)?.validate(&merged)?;
        self.store.update(index, update)
    }

    pub fn remove(&mut self, index: usize) -> Result<usize> {
        self.store.delete(index)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.store.serialize()?;
        fs::write(path, bytes).context(error::WritePatchSet { path })?;
        info!("Saved {} patches to {}", self.store.count(), path.display());
        Ok(())
    }

    /// Appends the patches stored at `path`. On any error the session is left
    /// as it was.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let bytes = fs::read(path).context(error::ReadPatchSet { path })?;
        let added = self.store.deserialize(&bytes)?;
        info!("Loaded {} patches from {}", added.len(), path.display());
        Ok(added.len())
    }

    /// Starts the patcher on the current patch set; later edits do not
    /// affect a run already started.
    pub fn run_patcher<P, F>(&self, output: P, on_complete: F) -> Result<JoinHandle<()>>
    where
        P: AsRef<Path>,
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let snapshot = self.store.serialize()?;
        self.runner
            .launch(snapshot, &self.input, output.as_ref(), on_complete)
    }

    pub fn close(mut self) {
        self.store.clear_all();
    }
}

impl Drop for PatchSession {
    fn drop(&mut self) {
        self.store.clear_all();
    }
}
