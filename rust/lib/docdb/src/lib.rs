//! Document database used by the StudyHub client.
//!
//! Collections of JSON documents addressed by `(collection, id)`, with
//! field-equality queries, ordering, server-assigned timestamps and a change
//! feed. `LiveQuery` turns the change feed into a standing query that pushes
//! the full result set every time it changes.
//!
//! Two embedded implementations ship with the crate:
//! - `RedbDocs`: persistent, backed by a redb file.
//! - `MemoryDocs`: in-process, for tests and throwaway sessions.

pub mod changes;
pub mod document;
pub mod error;
pub mod live;
pub mod memory;
pub mod query;
pub mod redb;
pub mod traits;

mod engine;

pub use changes::{ChangeEvent, ChangeKind};
pub use document::{new_id, server_timestamp, Document};
pub use error::DocError;
pub use live::{LiveQuery, Snapshot};
pub use memory::MemoryDocs;
pub use query::{Direction, Query};
pub use redb::RedbDocs;
pub use traits::DocumentStore;
