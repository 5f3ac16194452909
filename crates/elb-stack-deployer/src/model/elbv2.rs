//! Elastic Load Balancing v2 resource kinds

use super::Tags;
use super::core::{ModelResource, ResourceSpec, StringToken};
use elb_stack_common::resource_kind::{TYPE_LISTENER, TYPE_LOAD_BALANCER, TYPE_TARGET_GROUP};
use serde::Serialize;
use std::sync::Arc;

/// A key/value attribute of a load balancer or target group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Instance,
    Ip,
    Lambda,
    Alb,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Instance => "instance",
            TargetType::Ip => "ip",
            TargetType::Lambda => "lambda",
            TargetType::Alb => "alb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IpAddressType {
    Ipv4,
    Dualstack,
    Ipv6,
}

impl IpAddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAddressType::Ipv4 => "ipv4",
            IpAddressType::Dualstack => "dualstack",
            IpAddressType::Ipv6 => "ipv6",
        }
    }
}

/// Health check settings; unset fields keep the AWS defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold_count: Option<i32>,
}

/// Desired target group
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupSpec {
    pub name: String,
    pub target_type: TargetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address_type: Option<IpAddressType>,
    pub health_check_config: HealthCheckConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_group_attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroupStatus {
    #[serde(rename = "targetGroupARN")]
    pub target_group_arn: String,
}

impl ResourceSpec for TargetGroupSpec {
    const TYPE: &'static str = TYPE_TARGET_GROUP;
    type Status = TargetGroupStatus;
}

pub type TargetGroup = ModelResource<TargetGroupSpec>;

impl TargetGroup {
    /// Token for the target group ARN
    pub fn arn(self: &Arc<Self>) -> StringToken {
        self.field_token("targetGroupARN", |status| status.target_group_arn.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerType {
    Application,
    Network,
}

impl LoadBalancerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Application => "application",
            LoadBalancerType::Network => "network",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerScheme {
    Internal,
    InternetFacing,
}

impl LoadBalancerScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerScheme::Internal => "internal",
            LoadBalancerScheme::InternetFacing => "internet-facing",
        }
    }
}

/// Subnet a load balancer lives in, optionally pinned to an Elastic IP
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetMapping {
    #[serde(rename = "subnetID")]
    pub subnet_id: String,
    #[serde(rename = "allocationID", skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<StringToken>,
}

/// Desired load balancer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub lb_type: LoadBalancerType,
    pub scheme: LoadBalancerScheme,
    pub ip_address_type: IpAddressType,
    pub subnet_mappings: Vec<SubnetMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<StringToken>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerStatus {
    #[serde(rename = "loadBalancerARN")]
    pub load_balancer_arn: String,
    #[serde(rename = "dnsName")]
    pub dns_name: String,
    #[serde(rename = "canonicalHostedZoneID")]
    pub canonical_hosted_zone_id: String,
}

impl ResourceSpec for LoadBalancerSpec {
    const TYPE: &'static str = TYPE_LOAD_BALANCER;
    type Status = LoadBalancerStatus;

    fn tokens(&self) -> Vec<&StringToken> {
        self.security_groups
            .iter()
            .chain(
                self.subnet_mappings
                    .iter()
                    .filter_map(|mapping| mapping.allocation_id.as_ref()),
            )
            .collect()
    }
}

pub type LoadBalancer = ModelResource<LoadBalancerSpec>;

impl LoadBalancer {
    /// Token for the load balancer ARN
    pub fn arn(self: &Arc<Self>) -> StringToken {
        self.field_token("loadBalancerARN", |status| status.load_balancer_arn.clone())
    }

    /// Token for the DNS name
    pub fn dns_name(self: &Arc<Self>) -> StringToken {
        self.field_token("dnsName", |status| status.dns_name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Forward,
    FixedResponse,
    Redirect,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Forward => "forward",
            ActionType::FixedResponse => "fixed-response",
            ActionType::Redirect => "redirect",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupTuple {
    #[serde(rename = "targetGroupARN")]
    pub target_group_arn: StringToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardActionConfig {
    pub target_groups: Vec<TargetGroupTuple>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedResponseActionConfig {
    pub status_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectActionConfig {
    pub status_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Listener default action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_config: Option<ForwardActionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_response_config: Option<FixedResponseActionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_config: Option<RedirectActionConfig>,
}

impl Action {
    /// Forward everything to one target group
    pub fn forward(target_group_arn: StringToken) -> Self {
        Self {
            action_type: ActionType::Forward,
            forward_config: Some(ForwardActionConfig {
                target_groups: vec![TargetGroupTuple {
                    target_group_arn,
                    weight: None,
                }],
            }),
            fixed_response_config: None,
            redirect_config: None,
        }
    }

    /// Answer with a fixed status code
    pub fn fixed_response(status_code: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::FixedResponse,
            forward_config: None,
            fixed_response_config: Some(FixedResponseActionConfig {
                status_code: status_code.into(),
                content_type: None,
                message_body: None,
            }),
            redirect_config: None,
        }
    }

    fn tokens(&self) -> impl Iterator<Item = &StringToken> {
        self.forward_config
            .iter()
            .flat_map(|config| config.target_groups.iter())
            .map(|tuple| &tuple.target_group_arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    #[serde(rename = "certificateARN")]
    pub certificate_arn: String,
}

/// Desired listener.
///
/// Listeners are matched to AWS by port within their load balancer rather
/// than by tag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSpec {
    #[serde(rename = "loadBalancerARN")]
    pub load_balancer_arn: StringToken,
    pub port: i32,
    pub protocol: String,
    pub default_actions: Vec<Action>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(rename = "alpnPolicy", skip_serializing_if = "Vec::is_empty")]
    pub alpn_policy: Vec<String>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerStatus {
    #[serde(rename = "listenerARN")]
    pub listener_arn: String,
}

impl ResourceSpec for ListenerSpec {
    const TYPE: &'static str = TYPE_LISTENER;
    type Status = ListenerStatus;

    fn tokens(&self) -> Vec<&StringToken> {
        std::iter::once(&self.load_balancer_arn)
            .chain(self.default_actions.iter().flat_map(Action::tokens))
            .collect()
    }
}

pub type Listener = ModelResource<ListenerSpec>;

impl Listener {
    /// Token for the listener ARN
    pub fn arn(self: &Arc<Self>) -> StringToken {
        self.field_token("listenerARN", |status| status.listener_arn.clone())
    }
}
