pub mod error;
pub mod file;
pub mod key;
pub mod memory;
pub mod traits;

pub use error::BlobError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{BlobMeta, BlobStore, TransferProgress};
