//! Normalized ELBv2 snapshots and request inputs

use crate::model::Tags;
use crate::model::elbv2::{FixedResponseActionConfig, HealthCheckConfig, RedirectActionConfig};

/// Subnet mapping with every token resolved
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubnetMappingInput {
    pub subnet_id: String,
    pub allocation_id: Option<String>,
}

/// Observed load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerInfo {
    pub arn: String,
    pub name: String,
    pub lb_type: String,
    pub scheme: String,
    pub ip_address_type: String,
    pub vpc_id: Option<String>,
    pub dns_name: String,
    pub canonical_hosted_zone_id: String,
    pub subnet_mappings: Vec<SubnetMappingInput>,
    pub security_groups: Vec<String>,
    /// Filled in by the tagging manager
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLoadBalancerInput {
    pub name: String,
    pub lb_type: String,
    pub scheme: String,
    pub ip_address_type: String,
    pub subnet_mappings: Vec<SubnetMappingInput>,
    pub security_groups: Vec<String>,
    pub tags: Tags,
}

/// Observed target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupInfo {
    pub arn: String,
    pub name: String,
    pub target_type: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub ip_address_type: Option<String>,
    pub vpc_id: Option<String>,
    pub health_check: HealthCheckConfig,
    /// Filled in by the tagging manager
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTargetGroupInput {
    pub name: String,
    pub target_type: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub ip_address_type: Option<String>,
    pub vpc_id: String,
    pub health_check: HealthCheckConfig,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedTargetGroup {
    pub target_group_arn: String,
    pub weight: Option<i32>,
}

/// Listener action with every token resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub action_type: String,
    pub target_groups: Vec<WeightedTargetGroup>,
    pub fixed_response: Option<FixedResponseActionConfig>,
    pub redirect: Option<RedirectActionConfig>,
}

impl ResolvedAction {
    /// Compare against an observed action.
    ///
    /// AWS fills in a weight of 1 for forward targets, so an unset desired
    /// weight matches any observed weight.
    pub fn matches(&self, observed: &ResolvedAction) -> bool {
        self.action_type == observed.action_type
            && self.fixed_response == observed.fixed_response
            && self.redirect == observed.redirect
            && self.target_groups.len() == observed.target_groups.len()
            && self
                .target_groups
                .iter()
                .zip(&observed.target_groups)
                .all(|(desired, observed)| {
                    desired.target_group_arn == observed.target_group_arn
                        && desired.weight.is_none_or(|weight| Some(weight) == observed.weight)
                })
    }
}

/// Observed listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub arn: String,
    pub load_balancer_arn: String,
    pub port: i32,
    pub protocol: String,
    pub default_actions: Vec<ResolvedAction>,
    pub certificates: Vec<String>,
    pub ssl_policy: Option<String>,
    pub alpn_policy: Vec<String>,
}

/// Listener settings used for both create and modify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInput {
    pub port: i32,
    pub protocol: String,
    pub default_actions: Vec<ResolvedAction>,
    pub certificates: Vec<String>,
    pub ssl_policy: Option<String>,
    pub alpn_policy: Vec<String>,
    pub tags: Tags,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(arn: &str, weight: Option<i32>) -> ResolvedAction {
        ResolvedAction {
            action_type: "forward".to_string(),
            target_groups: vec![WeightedTargetGroup {
                target_group_arn: arn.to_string(),
                weight,
            }],
            fixed_response: None,
            redirect: None,
        }
    }

    #[test]
    fn test_unset_weight_matches_default() {
        assert!(forward("tg-1", None).matches(&forward("tg-1", Some(1))));
        assert!(!forward("tg-1", Some(2)).matches(&forward("tg-1", Some(1))));
        assert!(!forward("tg-1", None).matches(&forward("tg-2", Some(1))));
    }
}
