//! Key-value configuration storage used for job definitions, settings and player records.
pub mod store;
pub mod toml_file;

#[cfg(test)]
pub use store::MemoryStore;
pub use store::{KeyValueStore, StoreError};
pub use toml_file::TomlFileStore;
