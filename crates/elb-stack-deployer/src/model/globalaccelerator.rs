//! Global Accelerator accelerators

use super::Tags;
use super::core::{ModelResource, ResourceSpec, StringToken};
use elb_stack_common::resource_kind::TYPE_ACCELERATOR;
use serde::Serialize;
use std::sync::Arc;

/// Desired accelerator.
///
/// `ip_addresses` (BYOIP) can only be chosen at creation time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorSpec {
    pub name: String,
    pub ip_address_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceleratorStatus {
    #[serde(rename = "acceleratorARN")]
    pub accelerator_arn: String,
    #[serde(rename = "dnsName")]
    pub dns_name: String,
}

impl ResourceSpec for AcceleratorSpec {
    const TYPE: &'static str = TYPE_ACCELERATOR;
    type Status = AcceleratorStatus;
}

pub type Accelerator = ModelResource<AcceleratorSpec>;

impl Accelerator {
    /// Token for the accelerator ARN
    pub fn arn(self: &Arc<Self>) -> StringToken {
        self.field_token("acceleratorARN", |status| status.accelerator_arn.clone())
    }
}
