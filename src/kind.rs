//! Patch kinds: the per-type behaviour a [`PatchTypeRegistry`](crate::PatchTypeRegistry)
//! hands out to the store.

use crate::error::{self, Result};
use crate::patch::PatchRecord;
use log::debug;
use serde_json::Value;

/// One row of the patch list as shown to the user.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DisplayRow {
    pub kind: String,
    pub address: String,
    pub name: String,
    pub data: String,
}

/// Behaviour attached to a patch type identifier.
///
/// Hooks receive the full record and only have side effects. The store calls
/// them in this order:
///
/// * `on_created` after a record is appended, with its resolved name
/// * `on_pre_update` with the old state, then `on_post_update` with the new one
/// * `on_pre_delete` right before the record is removed
pub trait PatchKind: Send + Sync {
    /// Identifier stored in `PatchRecord::patch_type`.
    fn id(&self) -> &str;

    /// Short human readable label.
    fn descriptor(&self) -> &str;

    /// Checks the payload before it is handed to the store.
    fn validate(&self, _record: &PatchRecord) -> Result<()> {
        Ok(())
    }

    fn on_created(&self, _record: &PatchRecord) {}

    fn on_pre_update(&self, _record: &PatchRecord) {}

    fn on_post_update(&self, _record: &PatchRecord) {}

    fn on_pre_delete(&self, _record: &PatchRecord) {}

    fn format_for_display(&self, record: &PatchRecord) -> DisplayRow {
        DisplayRow {
            kind: self.descriptor().to_string(),
            address: format!("{:#x}", record.address),
            name: record.name.clone(),
            data: match &record.data {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// Assembly inserted at `address`. `data` is the source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsertCodePatch;

impl InsertCodePatch {
    pub const ID: &'static str = "InsertCodePatch";
}

impl PatchKind for InsertCodePatch {
    fn id(&self) -> &str {
        Self::ID
    }

    fn descriptor(&self) -> &str {
        "Insert Assembly"
    }

    fn validate(&self, record: &PatchRecord) -> Result<()> {
        match record.data.as_str() {
            Some(code) if !code.trim().is_empty() => Ok(()),
            Some(_) => error::InvalidPatchData {
                name: record.name.as_str(),
                reason: "assembly is empty",
            }
            .fail(),
            None => error::InvalidPatchData {
                name: record.name.as_str(),
                reason: "assembly must be a string",
            }
            .fail(),
        }
    }

    fn on_created(&self, record: &PatchRecord) {
        debug!("code patch {} placed at {:#x}", record.name, record.address);
    }

    fn on_pre_update(&self, record: &PatchRecord) {
        debug!("code patch {} leaving {:#x}", record.name, record.address);
    }

    fn on_post_update(&self, record: &PatchRecord) {
        debug!("code patch {} placed at {:#x}", record.name, record.address);
    }

    fn on_pre_delete(&self, record: &PatchRecord) {
        debug!("code patch {} dropped from {:#x}", record.name, record.address);
    }

    fn format_for_display(&self, record: &PatchRecord) -> DisplayRow {
        let code = record.data.as_str().unwrap_or_default();
        let mut lines = code.lines().map(str::trim).filter(|line| !line.is_empty());
        let first = lines.next().unwrap_or_default();
        let data = if lines.next().is_some() {
            format!("{} ...", first)
        } else {
            first.to_string()
        };

        DisplayRow {
            kind: self.descriptor().to_string(),
            address: format!("{:#x}", record.address),
            name: record.name.clone(),
            data,
        }
    }
}

/// Read only data. `data` is either a string literal or an array of bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddRoDataPatch;

impl AddRoDataPatch {
    pub const ID: &'static str = "AddRODataPatch";

    /// Payload bytes of a record that passed `validate`.
    pub fn bytes(record: &PatchRecord) -> Option<Vec<u8>> {
        match &record.data {
            Value::String(text) => Some(text.as_bytes().to_vec()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().filter(|b| *b <= 0xff).map(|b| b as u8))
                .collect(),
            _ => None,
        }
    }
}

impl PatchKind for AddRoDataPatch {
    fn id(&self) -> &str {
        Self::ID
    }

    fn descriptor(&self) -> &str {
        "Insert Read Only Data"
    }

    fn validate(&self, record: &PatchRecord) -> Result<()> {
        match Self::bytes(record) {
            Some(bytes) if !bytes.is_empty() => Ok(()),
            Some(_) => error::InvalidPatchData {
                name: record.name.as_str(),
                reason: "data is empty",
            }
            .fail(),
            None => error::InvalidPatchData {
                name: record.name.as_str(),
                reason: "data must be a string or an array of bytes",
            }
            .fail(),
        }
    }

    fn on_created(&self, record: &PatchRecord) {
        debug!("data patch {} added", record.name);
    }

    fn on_pre_delete(&self, record: &PatchRecord) {
        debug!("data patch {} removed", record.name);
    }

    fn format_for_display(&self, record: &PatchRecord) -> DisplayRow {
        let data = match &record.data {
            Value::String(text) => text.escape_debug().to_string(),
            _ => Self::bytes(record)
                .map(|bytes| {
                    bytes
                        .iter()
                        .map(|b| format!("{:02x}", b))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_else(|| record.data.to_string()),
        };

        DisplayRow {
            kind: self.descriptor().to_string(),
            address: format!("{:#x}", record.address),
            name: record.name.clone(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_row_shows_first_line() {
        let record = PatchRecord::new(
            InsertCodePatch::ID,
            0x4000,
            "hook",
            json!("\n  push eax\n  pop eax\n"),
        );
        let row = InsertCodePatch.format_for_display(&record);

        assert_eq!(row.kind, "Insert Assembly");
        assert_eq!(row.address, "0x4000");
        assert_eq!(row.data, "push eax ...");
    }

    #[test]
    fn code_must_be_text() {
        let record = PatchRecord::new(InsertCodePatch::ID, 0, "hook", json!([1, 2]));
        assert!(InsertCodePatch.validate(&record).is_err());

        let record = PatchRecord::new(InsertCodePatch::ID, 0, "hook", json!("   "));
        assert!(InsertCodePatch.validate(&record).is_err());
    }

    #[test]
    fn rodata_accepts_literals_and_bytes() {
        let text = PatchRecord::new(AddRoDataPatch::ID, 0, "msg", json!("hi\n"));
        let bytes = PatchRecord::new(AddRoDataPatch::ID, 0, "raw", json!([0xde, 0xad]));
        let bad = PatchRecord::new(AddRoDataPatch::ID, 0, "bad", json!([256]));

        assert!(AddRoDataPatch.validate(&text).is_ok());
        assert!(AddRoDataPatch.validate(&bytes).is_ok());
        assert!(AddRoDataPatch.validate(&bad).is_err());

        assert_eq!(AddRoDataPatch.format_for_display(&text).data, "hi\\n");
        assert_eq!(AddRoDataPatch.format_for_display(&bytes).data, "de ad");
    }
}
