use crate::error::{self, Result};
use crate::kind::PatchKind;
use crate::patch::{PatchRecord, PatchUpdate};
use crate::registry::PatchTypeRegistry;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;
use snafu::ResultExt;
use std::sync::Arc;

lazy_static! {
    static ref NUMERIC_SUFFIX: Regex = Regex::new(r"_([0-9]+)\z").unwrap();
}

/// Picks a name based on `candidate` that no record in `records` uses,
/// ignoring the record at `exclude`.
///
/// On every collision a trailing `_<n>` is bumped to `_<n + 1>`, or `_1` is
/// appended when there is none.
pub fn resolve_name(records: &[PatchRecord], candidate: &str, exclude: Option<usize>) -> String {
    let mut name = candidate.to_string();
    while records
        .iter()
        .enumerate()
        .any(|(i, record)| Some(i) != exclude && record.name == name)
    {
        let suffix = NUMERIC_SUFFIX.captures(&name).and_then(|caps| {
            let start = caps.get(0)?.start();
            let next = caps[1].parse::<u64>().ok()?.checked_add(1)?;
            Some((start, next))
        });
        name = match suffix {
            Some((start, next)) => format!("{}_{}", &name[..start], next),
            None => format!("{}_1", name),
        };
    }
    name
}

/// Ordered list of uniquely named patches.
///
/// Every mutation goes through the [`PatchKind`] registered for the record's
/// type so the kind sees each record being created, edited and removed.
/// Access is single threaded; callers hand out `&mut` one at a time.
#[derive(Debug)]
pub struct PatchRecordStore {
    registry: Arc<PatchTypeRegistry>,
    records: Vec<PatchRecord>,
}

impl PatchRecordStore {
    pub fn new(registry: Arc<PatchTypeRegistry>) -> Self {
        PatchRecordStore {
            registry,
            records: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PatchTypeRegistry> {
        &self.registry
    }

    pub fn records(&self) -> &[PatchRecord] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a patch and returns its index. The stored name may differ from
    /// `name` if it was already taken.
    pub fn add<T, N>(&mut self, patch_type: T, address: u64, name: N, data: Value) -> Result<usize>
    where
        T: Into<String>,
        N: AsRef<str>,
    {
        let patch_type = patch_type.into();
        let kind = Arc::clone(self.registry.get(&patch_type)?);

        let name = resolve_name(&self.records, name.as_ref(), None);
        self.records
            .push(PatchRecord::new(patch_type, address, name, data));

        let index = self.records.len() - 1;
        let record = &self.records[index];
        debug!("added {} patch {} at index {}", record.patch_type, record.name, index);
        kind.on_created(record);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Result<&PatchRecord> {
        match self.records.get(index) {
            Some(record) => Ok(record),
            None => error::IndexOutOfRange {
                index,
                count: self.records.len(),
            }
            .fail(),
        }
    }

    /// Merges `update` into the record at `index`. A new name is resolved
    /// against every other record, so a record may keep its own name.
    pub fn update(&mut self, index: usize, mut update: PatchUpdate) -> Result<()> {
        let kind = self.kind_at(index)?;

        if let Some(name) = update.name.take() {
            update.name = Some(resolve_name(&self.records, &name, Some(index)));
        }

        kind.on_pre_update(&self.records[index]);
        self.records[index].apply(update);

        let record = &self.records[index];
        debug!("updated patch {} at index {}", record.name, index);
        kind.on_post_update(record);
        Ok(())
    }

    /// Removes the record at `index` and returns `index`, which now points at
    /// the following record if there is one.
    pub fn delete(&mut self, index: usize) -> Result<usize> {
        let kind = self.kind_at(index)?;
        kind.on_pre_delete(&self.records[index]);

        let record = self.records.remove(index);
        debug!("deleted patch {} at index {}", record.name, index);
        Ok(index)
    }

    /// Deletes front to back so each kind sees every removal.
    pub fn clear_all(&mut self) {
        while !self.records.is_empty() {
            if let Err(e) = self.delete(0) {
                // only reachable if a record's type vanished from the registry
                log::error!("dropping patch {}: {}", self.records[0].name, e);
                self.records.remove(0);
            }
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.records).context(error::MalformedSerialization)
    }

    /// Adds every record of a serialized patch set, in order, as if each had
    /// been added by hand. Nothing is added unless the whole payload parses
    /// and every patch type is known.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<Vec<usize>> {
        let parsed: Vec<PatchRecord> =
            serde_json::from_slice(bytes).context(error::MalformedSerialization)?;

        for record in &parsed {
            self.registry.get(&record.patch_type)?;
        }

        parsed
            .into_iter()
            .map(|record| self.add(record.patch_type, record.address, record.name, record.data))
            .collect()
    }

    fn kind_at(&self, index: usize) -> Result<Arc<dyn PatchKind>> {
        let record = self.get(index)?;
        self.registry.get(&record.patch_type).map(Arc::clone)
    }
}
