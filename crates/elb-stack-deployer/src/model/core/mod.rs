//! Resource graph primitives
//!
//! A [`Stack`] owns typed resources; resources expose their outputs as
//! [`StringToken`]s so that other resources can reference values that only
//! exist once the referenced resource has been synthesized.

mod error;
mod resource;
mod stack;
mod token;

pub use error::{StackError, TokenError};
pub use resource::{ModelResource, Resource, ResourceKey, ResourceSpec, ResourceState};
pub use stack::{Stack, StackId};
pub use token::{ResourceFieldToken, StringToken};
