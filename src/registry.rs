use crate::error::{self, Result};
use crate::kind::{AddRoDataPatch, InsertCodePatch, PatchKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Maps patch type identifiers to their [`PatchKind`].
///
/// Built once up front and shared read-only afterwards, so stores only ever
/// see an `Arc<PatchTypeRegistry>`.
#[derive(Clone, Default)]
pub struct PatchTypeRegistry {
    kinds: BTreeMap<String, Arc<dyn PatchKind>>,
}

impl PatchTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the insert-code and read-only-data kinds.
    pub fn with_builtin() -> Self {
        Self::new()
            .with_kind(Arc::new(InsertCodePatch))
            .with_kind(Arc::new(AddRoDataPatch))
    }

    /// Adds `kind` under its own id. A later kind with the same id replaces
    /// the earlier one.
    pub fn with_kind(mut self, kind: Arc<dyn PatchKind>) -> Self {
        self.kinds.insert(kind.id().to_string(), kind);
        self
    }

    pub fn get(&self, patch_type: &str) -> Result<&Arc<dyn PatchKind>> {
        match self.kinds.get(patch_type) {
            Some(kind) => Ok(kind),
            None => error::UnknownPatchType { patch_type }.fail(),
        }
    }

    pub fn contains(&self, patch_type: &str) -> bool {
        self.kinds.contains_key(patch_type)
    }

    /// `(id, descriptor)` pairs, ordered by id.
    pub fn descriptors(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.kinds
            .iter()
            .map(|(id, kind)| (id.as_str(), kind.descriptor()))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl fmt::Debug for PatchTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds.keys()).finish()
    }
}
