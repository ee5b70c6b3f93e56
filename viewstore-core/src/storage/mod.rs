//! View-scoped index storage
//!
//! A [`MemoryDb`] hands out [`View`]s; typed indexes ([`ListIndex`],
//! [`MapIndex`]) are opened by name over a view. Modifications of an index are
//! counted per (view, address) by the [`ModificationTracker`], which lets open
//! iterators detect interference from aliases.

pub mod address;
pub mod database;
pub mod errors;
pub mod indices;
pub mod tracker;
pub mod value;
pub mod view;

pub use address::{IndexAddress, IndexType};
pub use database::MemoryDb;
pub use errors::{StorageError, StorageResult};
pub use indices::{Cursor, ListIndex, ListIter, MapIndex, MapIter};
pub use tracker::ModificationTracker;
pub use value::{StorageKey, StorageValue};
pub use view::{Checkpoint, View, ViewId, ViewKind};
