//! Load balancer calls

use super::tags::optional_tags;
use super::{CreateLoadBalancerInput, Elbv2Client, LoadBalancerInfo, SubnetMappingInput};
use crate::aws::error::CloudError;
use crate::model::Tags;
use crate::model::elbv2::Attribute;
use aws_sdk_elasticloadbalancingv2::types::{
    IpAddressType, LoadBalancer, LoadBalancerAttribute, LoadBalancerSchemeEnum,
    LoadBalancerTypeEnum, SubnetMapping,
};

fn load_balancer_from_sdk(lb: &LoadBalancer) -> Option<LoadBalancerInfo> {
    Some(LoadBalancerInfo {
        arn: lb.load_balancer_arn()?.to_string(),
        name: lb.load_balancer_name().unwrap_or_default().to_string(),
        lb_type: lb.r#type().map(|t| t.as_str().to_string()).unwrap_or_default(),
        scheme: lb.scheme().map(|s| s.as_str().to_string()).unwrap_or_default(),
        ip_address_type: lb
            .ip_address_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        vpc_id: lb.vpc_id().map(str::to_string),
        dns_name: lb.dns_name().unwrap_or_default().to_string(),
        canonical_hosted_zone_id: lb.canonical_hosted_zone_id().unwrap_or_default().to_string(),
        subnet_mappings: lb
            .availability_zones()
            .iter()
            .filter_map(|zone| {
                Some(SubnetMappingInput {
                    subnet_id: zone.subnet_id()?.to_string(),
                    allocation_id: zone
                        .load_balancer_addresses()
                        .iter()
                        .find_map(|address| address.allocation_id())
                        .map(str::to_string),
                })
            })
            .collect(),
        security_groups: lb.security_groups().to_vec(),
        tags: Tags::new(),
    })
}

fn subnet_mappings_to_sdk(mappings: Vec<SubnetMappingInput>) -> Vec<SubnetMapping> {
    mappings
        .into_iter()
        .map(|mapping| {
            SubnetMapping::builder()
                .subnet_id(mapping.subnet_id)
                .set_allocation_id(mapping.allocation_id)
                .build()
        })
        .collect()
}

impl Elbv2Client {
    pub async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancerInfo>, CloudError> {
        let mut load_balancers = Vec::new();
        let mut marker = None;
        loop {
            let response = self
                .client
                .describe_load_balancers()
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeLoadBalancers", e))?;

            load_balancers.extend(
                response
                    .load_balancers()
                    .iter()
                    .filter_map(load_balancer_from_sdk),
            );

            marker = response.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }
        Ok(load_balancers)
    }

    pub async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> Result<LoadBalancerInfo, CloudError> {
        const OPERATION: &str = "CreateLoadBalancer";
        let response = self
            .client
            .create_load_balancer()
            .name(&input.name)
            .r#type(LoadBalancerTypeEnum::from(input.lb_type.as_str()))
            .scheme(LoadBalancerSchemeEnum::from(input.scheme.as_str()))
            .ip_address_type(IpAddressType::from(input.ip_address_type.as_str()))
            .set_subnet_mappings(Some(subnet_mappings_to_sdk(input.subnet_mappings)))
            .set_security_groups(
                (!input.security_groups.is_empty()).then_some(input.security_groups),
            )
            .set_tags(optional_tags(OPERATION, &input.tags)?)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        let mut info = response
            .load_balancers()
            .first()
            .and_then(load_balancer_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "LoadBalancers"))?;
        info.tags = input.tags;
        Ok(info)
    }

    pub async fn set_security_groups(
        &self,
        load_balancer_arn: &str,
        security_groups: Vec<String>,
    ) -> Result<(), CloudError> {
        self.client
            .set_security_groups()
            .load_balancer_arn(load_balancer_arn)
            .set_security_groups(Some(security_groups))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("SetSecurityGroups", e))?;
        Ok(())
    }

    pub async fn set_subnets(
        &self,
        load_balancer_arn: &str,
        subnet_mappings: Vec<SubnetMappingInput>,
    ) -> Result<(), CloudError> {
        self.client
            .set_subnets()
            .load_balancer_arn(load_balancer_arn)
            .set_subnet_mappings(Some(subnet_mappings_to_sdk(subnet_mappings)))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("SetSubnets", e))?;
        Ok(())
    }

    pub async fn set_ip_address_type(
        &self,
        load_balancer_arn: &str,
        ip_address_type: &str,
    ) -> Result<(), CloudError> {
        self.client
            .set_ip_address_type()
            .load_balancer_arn(load_balancer_arn)
            .ip_address_type(IpAddressType::from(ip_address_type))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("SetIpAddressType", e))?;
        Ok(())
    }

    pub async fn describe_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        let response = self
            .client
            .describe_load_balancer_attributes()
            .load_balancer_arn(load_balancer_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeLoadBalancerAttributes", e))?;

        Ok(response
            .attributes()
            .iter()
            .filter_map(|attribute| {
                Some(Attribute::new(
                    attribute.key()?,
                    attribute.value().unwrap_or_default(),
                ))
            })
            .collect())
    }

    pub async fn modify_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        let attributes = attributes
            .into_iter()
            .map(|attribute| {
                LoadBalancerAttribute::builder()
                    .key(attribute.key)
                    .value(attribute.value)
                    .build()
            })
            .collect();
        self.client
            .modify_load_balancer_attributes()
            .load_balancer_arn(load_balancer_arn)
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ModifyLoadBalancerAttributes", e))?;
        Ok(())
    }

    pub async fn delete_load_balancer(&self, load_balancer_arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_load_balancer()
            .load_balancer_arn(load_balancer_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteLoadBalancer", e))?;
        Ok(())
    }
}
