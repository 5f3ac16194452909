//! EC2 resource kinds: security groups, Elastic IPs and endpoint services

use super::Tags;
use super::core::{ModelResource, ResourceSpec, StringToken};
use elb_stack_common::resource_kind::{
    TYPE_ELASTIC_IP, TYPE_SECURITY_GROUP, TYPE_VPC_ENDPOINT_SERVICE,
    TYPE_VPC_ENDPOINT_SERVICE_PERMISSIONS,
};
use serde::Serialize;
use std::sync::Arc;

/// An IPv4 source range
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRange {
    #[serde(rename = "cidrIP")]
    pub cidr_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An IPv6 source range
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ipv6Range {
    #[serde(rename = "cidrIPv6")]
    pub cidr_ipv6: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A security group source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdGroupPair {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One ingress rule.
///
/// Rules are compared after [`IpPermission::flatten`], so a rule listing two
/// CIDRs equals two rules listing one CIDR each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpPermission {
    pub ip_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<IpRange>,
    #[serde(rename = "ipv6Ranges", skip_serializing_if = "Vec::is_empty")]
    pub ipv6_ranges: Vec<Ipv6Range>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_id_group_pairs: Vec<UserIdGroupPair>,
}

impl IpPermission {
    /// TCP rule for one port from one IPv4 CIDR
    pub fn tcp_from_cidr(port: i32, cidr: impl Into<String>) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: Some(port),
            to_port: Some(port),
            ip_ranges: vec![IpRange {
                cidr_ip: cidr.into(),
                description: None,
            }],
            ipv6_ranges: Vec::new(),
            user_id_group_pairs: Vec::new(),
        }
    }

    fn with_sources(&self) -> Self {
        Self {
            ip_protocol: self.ip_protocol.clone(),
            from_port: self.from_port,
            to_port: self.to_port,
            ip_ranges: Vec::new(),
            ipv6_ranges: Vec::new(),
            user_id_group_pairs: Vec::new(),
        }
    }

    /// Split into rules that each carry exactly one source
    pub fn flatten(&self) -> Vec<IpPermission> {
        let mut rules = Vec::new();
        for range in &self.ip_ranges {
            let mut rule = self.with_sources();
            rule.ip_ranges.push(range.clone());
            rules.push(rule);
        }
        for range in &self.ipv6_ranges {
            let mut rule = self.with_sources();
            rule.ipv6_ranges.push(range.clone());
            rules.push(rule);
        }
        for pair in &self.user_id_group_pairs {
            let mut rule = self.with_sources();
            rule.user_id_group_pairs.push(pair.clone());
            rules.push(rule);
        }
        rules
    }
}

/// Desired security group
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    pub group_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<IpPermission>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupStatus {
    #[serde(rename = "groupID")]
    pub group_id: String,
}

impl ResourceSpec for SecurityGroupSpec {
    const TYPE: &'static str = TYPE_SECURITY_GROUP;
    type Status = SecurityGroupStatus;
}

pub type SecurityGroup = ModelResource<SecurityGroupSpec>;

impl SecurityGroup {
    /// Token for the group ID
    pub fn group_id(self: &Arc<Self>) -> StringToken {
        self.field_token("groupID", |status| status.group_id.clone())
    }
}

/// Desired Elastic IP
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticIpSpec {
    #[serde(rename = "publicIPv4Pool", skip_serializing_if = "Option::is_none")]
    pub public_ipv4_pool: Option<String>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElasticIpStatus {
    #[serde(rename = "allocationID")]
    pub allocation_id: String,
    #[serde(rename = "publicIP")]
    pub public_ip: String,
}

impl ResourceSpec for ElasticIpSpec {
    const TYPE: &'static str = TYPE_ELASTIC_IP;
    type Status = ElasticIpStatus;
}

pub type ElasticIp = ModelResource<ElasticIpSpec>;

impl ElasticIp {
    /// Token for the allocation ID
    pub fn allocation_id(self: &Arc<Self>) -> StringToken {
        self.field_token("allocationID", |status| status.allocation_id.clone())
    }

    /// Token for the public address
    pub fn public_ip(self: &Arc<Self>) -> StringToken {
        self.field_token("publicIP", |status| status.public_ip.clone())
    }
}

/// Desired VPC endpoint service fronting network load balancers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcEndpointServiceSpec {
    pub acceptance_required: bool,
    pub network_load_balancer_arns: Vec<StringToken>,
    #[serde(rename = "privateDNSName", skip_serializing_if = "Option::is_none")]
    pub private_dns_name: Option<String>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcEndpointServiceStatus {
    #[serde(rename = "serviceID")]
    pub service_id: String,
}

impl ResourceSpec for VpcEndpointServiceSpec {
    const TYPE: &'static str = TYPE_VPC_ENDPOINT_SERVICE;
    type Status = VpcEndpointServiceStatus;

    fn tokens(&self) -> Vec<&StringToken> {
        self.network_load_balancer_arns.iter().collect()
    }
}

pub type VpcEndpointService = ModelResource<VpcEndpointServiceSpec>;

impl VpcEndpointService {
    /// Token for the endpoint service ID
    pub fn service_id(self: &Arc<Self>) -> StringToken {
        self.field_token("serviceID", |status| status.service_id.clone())
    }
}

/// Principals allowed to connect to an endpoint service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcEndpointServicePermissionsSpec {
    pub allowed_principals: Vec<String>,
    #[serde(rename = "serviceId")]
    pub service_id: StringToken,
}

impl ResourceSpec for VpcEndpointServicePermissionsSpec {
    const TYPE: &'static str = TYPE_VPC_ENDPOINT_SERVICE_PERMISSIONS;
    type Status = ();

    fn tokens(&self) -> Vec<&StringToken> {
        vec![&self.service_id]
    }
}

pub type VpcEndpointServicePermissions = ModelResource<VpcEndpointServicePermissionsSpec>;
