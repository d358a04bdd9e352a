// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation for Plexus.
//!
//! This crate drives plug values from keyed curves:
//! - Curves with constant, linear, bezier and smooth interpolation
//! - An `Animation` compute node evaluating curves at the context frame
//! - Undoable key editing through the graph history

pub mod curve;
pub mod node;

pub use curve::{Curve, Interpolation, Key, KEY_TOLERANCE};
pub use node::{
    add_curve, animate, can_animate, curve, is_animated, register, remove_key, set_key, set_value_or_insert_key,
    AnimationNode, ANIMATION_TYPE,
};
