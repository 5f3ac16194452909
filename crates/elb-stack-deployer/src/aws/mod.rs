//! AWS capability layer
//!
//! One trait per service exposing only the operations the managers need,
//! each with an SDK-backed client. Everything above this layer works on the
//! normalized info/input types defined here, never on SDK types.

pub mod acm;
pub mod context;
pub mod ec2;
pub mod elbv2;
pub mod error;
pub mod globalaccelerator;
pub mod resourcegroupstagging;
pub mod route53;
pub mod shield;
pub mod sts;
pub mod wafregional;
pub mod wafv2;

pub use context::{AwsContext, CloudApi};
pub use error::CloudError;
