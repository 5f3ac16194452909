//! Desired-state model
//!
//! `core` holds the kind-independent graph machinery; the remaining modules
//! define one spec/status pair per AWS resource kind.

pub mod core;
pub mod ec2;
pub mod elbv2;
pub mod globalaccelerator;
pub mod shield;
pub mod wafv2;

pub use self::core::{
    ModelResource, Resource, ResourceKey, ResourceSpec, ResourceState, Stack, StackError,
    StackId, StringToken, TokenError,
};

use std::collections::BTreeMap;

/// Tags carried on a resource spec
pub type Tags = BTreeMap<String, String>;
