// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plug dependency graph for Plexus.
//!
//! This crate provides the evaluation core shared by every Plexus client:
//! - Typed plugs holding values or input connections
//! - Nodes declaring `affects`, `hash` and `compute`
//! - Dirty propagation with change notifications
//! - Fingerprint-keyed hash and value caches
//! - Lazy, thread-safe evaluation under an explicit context
//!
//! ## Architecture
//!
//! The [`Graph`] is an arena owning all nodes and plugs. Evaluation takes a
//! shared reference and a [`Context`], so many threads can read the same
//! graph while edits are serialized through a [`SharedGraph`] write lock.
//! Identical plug and context evaluations collapse to one computation per
//! fingerprint through the [`Engine`]'s value cache.

pub mod cache;
pub mod compute;
pub mod config;
pub mod context;
pub mod dirty;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod history;
pub mod node;
pub mod nodes;
pub mod plug;
pub mod plug_algo;
pub mod value;

pub use cache::{CachePolicy, Engine, EngineStats, ValueCache, ValueHandle};
pub use compute::ComputeContext;
pub use config::{EngineConfig, HashValidation};
pub use context::Context;
pub use dirty::AffectsContext;
pub use error::{GraphError, Result};
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use graph::{Graph, GraphEvent, SharedGraph, SubscriptionId};
pub use history::{Action, History, HistoryStats};
pub use node::{Node, NodeBehaviour, NodeCategory, NodeId, NodeRegistry, NodeType};
pub use plug::{Direction, Plug, PlugDescriptor, PlugFlags, PlugId, PlugState};
pub use value::{CompoundData, PlugType, PlugValue};
