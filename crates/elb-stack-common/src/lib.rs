//! elb-stack-common - Shared types and constants
//!
//! This crate holds the pieces shared by every elb-stack component that do
//! not need an AWS SDK dependency.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values (retry timing, cache TTLs, pinned regions)
//! - [`resource_kind`]: Resource kinds, their type names and synthesis order
//! - [`tags`]: AWS tag schema used to track stack ownership

pub mod defaults;
pub mod resource_kind;
pub mod tags;

pub use resource_kind::ResourceKind;
