//! Named, typed binary patches kept in an ordered list, saved as JSON and
//! handed to an external patcher.
//!
//! ```
//! use patchset::{PatchRecordStore, PatchTypeRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut store = PatchRecordStore::new(Arc::new(PatchTypeRegistry::with_builtin()));
//! store.add("InsertCodePatch", 0x4000, "patch", json!("nop")).unwrap();
//! let i = store.add("InsertCodePatch", 0x4010, "patch", json!("ret")).unwrap();
//! assert_eq!(store.get(i).unwrap().name, "patch_1");
//! ```

pub mod error;
pub mod kind;
pub mod patch;
pub mod registry;
pub mod runner;
pub mod session;
pub mod store;

pub use error::{Error, Result};
pub use kind::{AddRoDataPatch, DisplayRow, InsertCodePatch, PatchKind};
pub use patch::{PatchRecord, PatchUpdate};
pub use registry::PatchTypeRegistry;
pub use runner::PatcherRunner;
pub use session::PatchSession;
pub use store::{resolve_name, PatchRecordStore};
