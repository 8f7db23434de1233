//! Adapters for the two cart backends
pub mod local;
pub mod remote;

pub use local::{FileStore, LocalStore, LocalStoreError, MemoryStore};
pub use remote::{HttpRemoteCart, RemoteCart, RemoteCartRow, RemoteError};
