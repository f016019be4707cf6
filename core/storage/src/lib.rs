//! Mirror storage for passvault.
//!
//! This module provides a trait-based interface for the places a vault
//! file is replicated to, plus a provider registry for resolving them by
//! name. Every "cloud" provider here is a local directory standing in for
//! the real service, so a network-backed provider can be dropped in later
//! without changing the replication engine.
//!
//! # Design Principles
//! - Provider isolation: no provider-specific logic in the vault or sync crates
//! - Async operations: all I/O goes through tokio
//! - Flat namespace: a mirror holds files by name, not a tree

pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{Metadata, StorageProvider};
pub use registry::{create_default_registry, ProviderFactory, ProviderRegistry, MIRROR_PROVIDERS};
