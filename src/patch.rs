use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named patch definition held by a [`PatchRecordStore`](crate::PatchRecordStore).
///
/// `data` is kept as raw JSON so that whatever payload a patch kind accepts
/// survives a save/load cycle untouched.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct PatchRecord {
    pub patch_type: String,
    pub address: u64,
    pub name: String,
    pub data: Value,
}

impl PatchRecord {
    pub fn new<T, N>(patch_type: T, address: u64, name: N, data: Value) -> Self
    where
        T: Into<String>,
        N: Into<String>,
    {
        PatchRecord {
            patch_type: patch_type.into(),
            address,
            name: name.into(),
            data,
        }
    }

    /// Copy of this record with `update` merged over it.
    pub fn merged(&self, update: &PatchUpdate) -> PatchRecord {
        let mut merged = self.clone();
        merged.apply(update.clone());
        merged
    }

    pub(crate) fn apply(&mut self, update: PatchUpdate) {
        if let Some(address) = update.address {
            self.address = address;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(data) = update.data {
            self.data = data;
        }
    }
}

/// Partial set of fields for an edit. `patch_type` is not editable.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PatchUpdate {
    pub address: Option<u64>,
    pub name: Option<String>,
    pub data: Option<Value>,
}

impl PatchUpdate {
    pub fn address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.name.is_none() && self.data.is_none()
    }
}
