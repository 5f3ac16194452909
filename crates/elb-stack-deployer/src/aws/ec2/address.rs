//! Elastic IP calls

use super::tags::{filters_to_sdk, tag_specification, tags_from_sdk};
use super::{AddressInfo, AllocateAddressInput, Ec2Client, Ec2Filter};
use crate::aws::error::CloudError;
use aws_sdk_ec2::types::{DomainType, ResourceType};

impl Ec2Client {
    pub async fn describe_addresses(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<AddressInfo>, CloudError> {
        let response = self
            .client
            .describe_addresses()
            .set_filters(filters_to_sdk(filters))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeAddresses", e))?;

        Ok(response
            .addresses()
            .iter()
            .filter_map(|address| {
                Some(AddressInfo {
                    allocation_id: address.allocation_id()?.to_string(),
                    public_ip: address.public_ip().unwrap_or_default().to_string(),
                    public_ipv4_pool: address.public_ipv4_pool().map(str::to_string),
                    association_id: address.association_id().map(str::to_string),
                    tags: tags_from_sdk(address.tags()),
                })
            })
            .collect())
    }

    pub async fn allocate_address(
        &self,
        input: AllocateAddressInput,
    ) -> Result<AddressInfo, CloudError> {
        let response = self
            .client
            .allocate_address()
            .domain(DomainType::Vpc)
            .set_public_ipv4_pool(input.public_ipv4_pool.clone())
            .tag_specifications(tag_specification(ResourceType::ElasticIp, &input.tags))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("AllocateAddress", e))?;

        let allocation_id = response
            .allocation_id()
            .ok_or_else(|| CloudError::missing_field("AllocateAddress", "AllocationId"))?;
        Ok(AddressInfo {
            allocation_id: allocation_id.to_string(),
            public_ip: response.public_ip().unwrap_or_default().to_string(),
            public_ipv4_pool: response
                .public_ipv4_pool()
                .map(str::to_string)
                .or(input.public_ipv4_pool),
            association_id: None,
            tags: input.tags,
        })
    }

    pub async fn release_address(&self, allocation_id: &str) -> Result<(), CloudError> {
        self.client
            .release_address()
            .allocation_id(allocation_id)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ReleaseAddress", e))?;
        Ok(())
    }
}
