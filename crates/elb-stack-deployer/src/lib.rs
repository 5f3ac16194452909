//! elb-stack-deployer - Reconciles stacks of load-balancing resources against AWS
//!
//! A [`model::Stack`] describes the desired resources of one owner. The
//! [`deploy::StackDeployer`] discovers what AWS holds for that stack through
//! ownership tags, then creates, updates and deletes until both agree.

pub mod aws;
pub mod cache;
pub mod config;
pub mod deploy;
pub mod dns;
pub mod marshal;
pub mod model;
pub mod scan;
pub mod tagging;
pub mod tracking;
pub mod wait;

#[cfg(test)]
mod testing;
