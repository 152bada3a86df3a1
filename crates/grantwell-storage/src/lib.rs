pub mod memory;
pub mod postgres;
pub mod shared;
pub mod traits;

pub use memory::{InMemoryCacheStore, InMemoryDirectory};
pub use postgres::{PostgresCacheStore, PostgresDirectory};
pub use shared::MokaSharedCache;
pub use traits::{DirectoryStore, PermissionCacheStore, SharedCacheStore, StorageError};
