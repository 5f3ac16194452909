//! Normalized EC2 resource snapshots and request inputs

use crate::model::Tags;
use crate::model::ec2::IpPermission;

/// An EC2 describe filter (`tag:<key>`, `tag-key`, `vpc-id`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Ec2Filter {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Observed security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    /// Ingress rules, one source per rule
    pub ingress: Vec<IpPermission>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSecurityGroupInput {
    pub group_name: String,
    pub description: String,
    pub vpc_id: String,
    pub tags: Tags,
}

/// Observed Elastic IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub allocation_id: String,
    pub public_ip: String,
    pub public_ipv4_pool: Option<String>,
    pub association_id: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocateAddressInput {
    pub public_ipv4_pool: Option<String>,
    pub tags: Tags,
}

/// Observed VPC endpoint service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointServiceInfo {
    pub service_id: String,
    pub acceptance_required: bool,
    pub network_load_balancer_arns: Vec<String>,
    pub private_dns_name: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEndpointServiceInput {
    pub acceptance_required: bool,
    pub network_load_balancer_arns: Vec<String>,
    pub private_dns_name: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyEndpointServiceInput {
    pub service_id: String,
    pub acceptance_required: Option<bool>,
    pub add_network_load_balancer_arns: Vec<String>,
    pub remove_network_load_balancer_arns: Vec<String>,
    pub private_dns_name: Option<String>,
    pub remove_private_dns_name: bool,
}

impl ModifyEndpointServiceInput {
    /// Whether the modification changes anything
    pub fn is_noop(&self) -> bool {
        self.acceptance_required.is_none()
            && self.add_network_load_balancer_arns.is_empty()
            && self.remove_network_load_balancer_arns.is_empty()
            && self.private_dns_name.is_none()
            && !self.remove_private_dns_name
    }
}
