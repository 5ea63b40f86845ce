//! Core library for consistent-hash routing over cache server nodes.
//!
//! This crate provides the building blocks of the routing layer:
//! - Key hash algorithms (native and MD5 based Ketama)
//! - Ring construction strategy and virtual node placement
//! - The Ketama ring and its migration overlay
//! - Node locators (array-modulus, live Ketama, read-only snapshots)
//! - An injectable monitoring registry
//!
//! Replica groups live in the `replication` crate; membership event plumbing
//! lives in `membership`.

pub mod config;
pub mod configuration;
pub mod error;
pub mod hash;
pub mod locator;
pub mod node;
pub mod registry;
pub mod ring;
pub mod vnode;

pub use config::LocatorConfig;
pub use configuration::{DefaultKetamaConfiguration, KetamaConfiguration};
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use locator::{ArrayModNodeLocator, KetamaNodeLocator, KetamaSnapshot, LocatorBuilder, NodeLocator};
pub use node::{Node, ReplicaAddress, SimpleNode};
pub use registry::{LocatorRegistry, LocatorStats, RegistryHandle};
pub use ring::{KetamaRing, MigrationType};
pub use vnode::RingMember;
