//! Shield Advanced protections

use super::core::{ModelResource, ResourceSpec, StringToken};
use elb_stack_common::resource_kind::TYPE_SHIELD_PROTECTION;
use serde::Serialize;

/// Desired protection state of one load balancer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionSpec {
    pub enabled: bool,
    #[serde(rename = "resourceARN")]
    pub resource_arn: StringToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionStatus {
    #[serde(rename = "protectionID", skip_serializing_if = "Option::is_none")]
    pub protection_id: Option<String>,
}

impl ResourceSpec for ProtectionSpec {
    const TYPE: &'static str = TYPE_SHIELD_PROTECTION;
    type Status = ProtectionStatus;

    fn tokens(&self) -> Vec<&StringToken> {
        vec![&self.resource_arn]
    }
}

pub type Protection = ModelResource<ProtectionSpec>;
