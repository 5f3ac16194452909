//! EC2 capability: security groups, Elastic IPs, endpoint services and tags

mod address;
mod endpoint_service;
mod security_group;
mod tags;
mod types;

pub use types::{
    AddressInfo, AllocateAddressInput, CreateEndpointServiceInput, CreateSecurityGroupInput,
    Ec2Filter, EndpointServiceInfo, ModifyEndpointServiceInput, SecurityGroupInfo,
};

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use crate::model::Tags;
use crate::model::ec2::IpPermission;
use async_trait::async_trait;
use aws_sdk_ec2::Client;

/// EC2 operations used by the managers.
///
/// Implemented by [`Ec2Client`] against the real API and by in-memory
/// doubles in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Describe security groups matching all `filters`
    async fn describe_security_groups(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<SecurityGroupInfo>, CloudError>;

    /// Create a security group, returning its ID
    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> Result<String, CloudError>;

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError>;

    async fn authorize_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError>;

    async fn revoke_ingress(&self, group_id: &str, rules: Vec<IpPermission>)
    -> Result<(), CloudError>;

    /// Current tags of one resource
    async fn describe_tags(&self, resource_id: &str) -> Result<Tags, CloudError>;

    async fn create_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError>;

    async fn delete_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError>;

    async fn describe_addresses(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<AddressInfo>, CloudError>;

    async fn allocate_address(&self, input: AllocateAddressInput)
    -> Result<AddressInfo, CloudError>;

    async fn release_address(&self, allocation_id: &str) -> Result<(), CloudError>;

    async fn describe_endpoint_services(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<EndpointServiceInfo>, CloudError>;

    async fn create_endpoint_service(
        &self,
        input: CreateEndpointServiceInput,
    ) -> Result<EndpointServiceInfo, CloudError>;

    async fn modify_endpoint_service(
        &self,
        input: ModifyEndpointServiceInput,
    ) -> Result<(), CloudError>;

    async fn delete_endpoint_service(&self, service_id: &str) -> Result<(), CloudError>;

    /// Principals currently allowed to connect to the service
    async fn describe_endpoint_service_permissions(
        &self,
        service_id: &str,
    ) -> Result<Vec<String>, CloudError>;

    async fn modify_endpoint_service_permissions(
        &self,
        service_id: &str,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> Result<(), CloudError>;
}

/// SDK-backed EC2 client
pub struct Ec2Client {
    pub(crate) client: Client,
}

impl Ec2Client {
    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

#[async_trait]
impl Ec2Api for Ec2Client {
    async fn describe_security_groups(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<SecurityGroupInfo>, CloudError> {
        Ec2Client::describe_security_groups(self, filters).await
    }

    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> Result<String, CloudError> {
        Ec2Client::create_security_group(self, input).await
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        Ec2Client::delete_security_group(self, group_id).await
    }

    async fn authorize_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        Ec2Client::authorize_ingress(self, group_id, rules).await
    }

    async fn revoke_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        Ec2Client::revoke_ingress(self, group_id, rules).await
    }

    async fn describe_tags(&self, resource_id: &str) -> Result<Tags, CloudError> {
        Ec2Client::describe_tags(self, resource_id).await
    }

    async fn create_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError> {
        Ec2Client::create_tags(self, resource_id, tags).await
    }

    async fn delete_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError> {
        Ec2Client::delete_tags(self, resource_id, keys).await
    }

    async fn describe_addresses(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<AddressInfo>, CloudError> {
        Ec2Client::describe_addresses(self, filters).await
    }

    async fn allocate_address(
        &self,
        input: AllocateAddressInput,
    ) -> Result<AddressInfo, CloudError> {
        Ec2Client::allocate_address(self, input).await
    }

    async fn release_address(&self, allocation_id: &str) -> Result<(), CloudError> {
        Ec2Client::release_address(self, allocation_id).await
    }

    async fn describe_endpoint_services(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<EndpointServiceInfo>, CloudError> {
        Ec2Client::describe_endpoint_services(self, filters).await
    }

    async fn create_endpoint_service(
        &self,
        input: CreateEndpointServiceInput,
    ) -> Result<EndpointServiceInfo, CloudError> {
        Ec2Client::create_endpoint_service(self, input).await
    }

    async fn modify_endpoint_service(
        &self,
        input: ModifyEndpointServiceInput,
    ) -> Result<(), CloudError> {
        Ec2Client::modify_endpoint_service(self, input).await
    }

    async fn delete_endpoint_service(&self, service_id: &str) -> Result<(), CloudError> {
        Ec2Client::delete_endpoint_service(self, service_id).await
    }

    async fn describe_endpoint_service_permissions(
        &self,
        service_id: &str,
    ) -> Result<Vec<String>, CloudError> {
        Ec2Client::describe_endpoint_service_permissions(self, service_id).await
    }

    async fn modify_endpoint_service_permissions(
        &self,
        service_id: &str,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> Result<(), CloudError> {
        Ec2Client::modify_endpoint_service_permissions(self, service_id, add, remove).await
    }
}
