//! # Adapters
//!
//! Concrete implementations of the storage, vault and queue traits.
//!
//! - [`InMemoryStore`]: integration configs and audit rows held in memory
//! - [`FileBackedStore`]: the same state persisted as a JSON snapshot
//! - [`InMemoryCredentialVault`]: process-local provider credentials
//! - [`InMemoryEventQueue`]: process-local hand-off queue
//! - [`FileBackedEventQueue`]: the same queue persisted as a JSON snapshot

pub mod file_queue;
pub mod file_store;
pub mod memory_queue;
pub mod memory_store;
pub mod memory_vault;

pub use file_queue::FileBackedEventQueue;
pub use file_store::FileBackedStore;
pub use memory_queue::{DeadLetteredEvent, InMemoryEventQueue};
pub use memory_store::InMemoryStore;
pub use memory_vault::InMemoryCredentialVault;
