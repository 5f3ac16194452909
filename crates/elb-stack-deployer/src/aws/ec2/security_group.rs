//! Security group calls

use super::tags::{filters_to_sdk, tag_specification, tags_from_sdk};
use super::{CreateSecurityGroupInput, Ec2Client, Ec2Filter, SecurityGroupInfo};
use crate::aws::error::CloudError;
use crate::model::ec2::{IpPermission, IpRange, Ipv6Range, UserIdGroupPair};
use aws_sdk_ec2::types::{self as sdk, ResourceType};
use tracing::debug;

/// Flatten an SDK permission into one-source rules
fn permission_from_sdk(permission: &sdk::IpPermission) -> Vec<IpPermission> {
    let rule = IpPermission {
        ip_protocol: permission.ip_protocol().unwrap_or("-1").to_string(),
        from_port: permission.from_port(),
        to_port: permission.to_port(),
        ip_ranges: permission
            .ip_ranges()
            .iter()
            .filter_map(|range| {
                Some(IpRange {
                    cidr_ip: range.cidr_ip()?.to_string(),
                    description: range.description().map(str::to_string),
                })
            })
            .collect(),
        ipv6_ranges: permission
            .ipv6_ranges()
            .iter()
            .filter_map(|range| {
                Some(Ipv6Range {
                    cidr_ipv6: range.cidr_ipv6()?.to_string(),
                    description: range.description().map(str::to_string),
                })
            })
            .collect(),
        user_id_group_pairs: permission
            .user_id_group_pairs()
            .iter()
            .filter_map(|pair| {
                Some(UserIdGroupPair {
                    group_id: pair.group_id()?.to_string(),
                    description: pair.description().map(str::to_string),
                })
            })
            .collect(),
    };
    rule.flatten()
}

fn permission_to_sdk(rule: &IpPermission) -> sdk::IpPermission {
    sdk::IpPermission::builder()
        .ip_protocol(&rule.ip_protocol)
        .set_from_port(rule.from_port)
        .set_to_port(rule.to_port)
        .set_ip_ranges(Some(
            rule.ip_ranges
                .iter()
                .map(|range| {
                    sdk::IpRange::builder()
                        .cidr_ip(&range.cidr_ip)
                        .set_description(range.description.clone())
                        .build()
                })
                .collect(),
        ))
        .set_ipv6_ranges(Some(
            rule.ipv6_ranges
                .iter()
                .map(|range| {
                    sdk::Ipv6Range::builder()
                        .cidr_ipv6(&range.cidr_ipv6)
                        .set_description(range.description.clone())
                        .build()
                })
                .collect(),
        ))
        .set_user_id_group_pairs(Some(
            rule.user_id_group_pairs
                .iter()
                .map(|pair| {
                    sdk::UserIdGroupPair::builder()
                        .group_id(&pair.group_id)
                        .set_description(pair.description.clone())
                        .build()
                })
                .collect(),
        ))
        .build()
}

impl Ec2Client {
    pub async fn describe_security_groups(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<SecurityGroupInfo>, CloudError> {
        let filters = filters_to_sdk(filters);
        let mut groups = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .describe_security_groups()
                .set_filters(filters.clone())
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeSecurityGroups", e))?;

            for group in response.security_groups() {
                let Some(group_id) = group.group_id() else {
                    continue;
                };
                groups.push(SecurityGroupInfo {
                    group_id: group_id.to_string(),
                    group_name: group.group_name().unwrap_or_default().to_string(),
                    description: group.description().unwrap_or_default().to_string(),
                    vpc_id: group.vpc_id().map(str::to_string),
                    ingress: group
                        .ip_permissions()
                        .iter()
                        .flat_map(permission_from_sdk)
                        .collect(),
                    tags: tags_from_sdk(group.tags()),
                });
            }

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        debug!(count = groups.len(), "Described security groups");
        Ok(groups)
    }

    pub async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> Result<String, CloudError> {
        let response = self
            .client
            .create_security_group()
            .group_name(&input.group_name)
            .description(&input.description)
            .vpc_id(&input.vpc_id)
            .tag_specifications(tag_specification(ResourceType::SecurityGroup, &input.tags))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("CreateSecurityGroup", e))?;

        response
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| CloudError::missing_field("CreateSecurityGroup", "GroupId"))
    }

    pub async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        self.client
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteSecurityGroup", e))?;
        Ok(())
    }

    pub async fn authorize_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        self.client
            .authorize_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(rules.iter().map(permission_to_sdk).collect()))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }

    pub async fn revoke_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        self.client
            .revoke_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(rules.iter().map(permission_to_sdk).collect()))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("RevokeSecurityGroupIngress", e))?;
        Ok(())
    }
}
