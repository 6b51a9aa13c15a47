//! Secret storage for model credentials
//!
//! - `SecretStore` trait for implementing custom stores
//! - `EnvSecretStore` reads the process environment
//! - `MemorySecretStore` keeps secrets in memory (tests)

mod traits;
mod env_store;
mod memory_store;

pub use traits::{SecretStore, SecretStoreError, SecretStoreResult};
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
