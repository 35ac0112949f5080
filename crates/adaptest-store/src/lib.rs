//! adaptest-store — session persistence and configuration.
//!
//! Provides the durable `JsonDirSessionStore`, re-exports the in-memory
//! store from core, and loads `adaptest.toml`.

pub mod config;
pub mod json_dir;

pub use adaptest_core::store::{MemorySessionStore, SessionStore};
pub use config::{create_store, load_config, load_config_from, AdaptestConfig, StoreConfig};
pub use json_dir::JsonDirSessionStore;
