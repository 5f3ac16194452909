//! ELBv2 capability: load balancers, target groups, listeners and tags

mod listener;
mod load_balancer;
mod tags;
mod target_group;
mod types;

pub use types::{
    CreateLoadBalancerInput, CreateTargetGroupInput, ListenerInfo, ListenerInput,
    LoadBalancerInfo, ResolvedAction, SubnetMappingInput, TargetGroupInfo, WeightedTargetGroup,
};

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use crate::model::Tags;
use crate::model::elbv2::{Attribute, HealthCheckConfig};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::Client;
use std::collections::BTreeMap;

/// ELBv2 operations used by the managers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Elbv2Api: Send + Sync {
    /// Every load balancer in the region, without tags
    async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancerInfo>, CloudError>;

    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> Result<LoadBalancerInfo, CloudError>;

    async fn set_security_groups(
        &self,
        load_balancer_arn: &str,
        security_groups: Vec<String>,
    ) -> Result<(), CloudError>;

    async fn set_subnets(
        &self,
        load_balancer_arn: &str,
        subnet_mappings: Vec<SubnetMappingInput>,
    ) -> Result<(), CloudError>;

    async fn set_ip_address_type(
        &self,
        load_balancer_arn: &str,
        ip_address_type: &str,
    ) -> Result<(), CloudError>;

    async fn describe_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError>;

    async fn modify_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError>;

    async fn delete_load_balancer(&self, load_balancer_arn: &str) -> Result<(), CloudError>;

    /// Every target group in the region, without tags
    async fn describe_target_groups(&self) -> Result<Vec<TargetGroupInfo>, CloudError>;

    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> Result<TargetGroupInfo, CloudError>;

    async fn modify_target_group(
        &self,
        target_group_arn: &str,
        health_check: HealthCheckConfig,
    ) -> Result<(), CloudError>;

    async fn describe_target_group_attributes(
        &self,
        target_group_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError>;

    async fn modify_target_group_attributes(
        &self,
        target_group_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError>;

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<(), CloudError>;

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<ListenerInfo>, CloudError>;

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        input: ListenerInput,
    ) -> Result<ListenerInfo, CloudError>;

    async fn modify_listener(
        &self,
        listener_arn: &str,
        input: ListenerInput,
    ) -> Result<(), CloudError>;

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError>;

    /// Tags of up to 20 resources, keyed by ARN
    async fn describe_tags(&self, arns: Vec<String>)
    -> Result<BTreeMap<String, Tags>, CloudError>;

    async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError>;

    async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError>;
}

/// SDK-backed ELBv2 client
pub struct Elbv2Client {
    pub(crate) client: Client,
}

impl Elbv2Client {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.elbv2_client(),
        }
    }
}

#[async_trait]
impl Elbv2Api for Elbv2Client {
    async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancerInfo>, CloudError> {
        Elbv2Client::describe_load_balancers(self).await
    }

    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> Result<LoadBalancerInfo, CloudError> {
        Elbv2Client::create_load_balancer(self, input).await
    }

    async fn set_security_groups(
        &self,
        load_balancer_arn: &str,
        security_groups: Vec<String>,
    ) -> Result<(), CloudError> {
        Elbv2Client::set_security_groups(self, load_balancer_arn, security_groups).await
    }

    async fn set_subnets(
        &self,
        load_balancer_arn: &str,
        subnet_mappings: Vec<SubnetMappingInput>,
    ) -> Result<(), CloudError> {
        Elbv2Client::set_subnets(self, load_balancer_arn, subnet_mappings).await
    }

    async fn set_ip_address_type(
        &self,
        load_balancer_arn: &str,
        ip_address_type: &str,
    ) -> Result<(), CloudError> {
        Elbv2Client::set_ip_address_type(self, load_balancer_arn, ip_address_type).await
    }

    async fn describe_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        Elbv2Client::describe_load_balancer_attributes(self, load_balancer_arn).await
    }

    async fn modify_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        Elbv2Client::modify_load_balancer_attributes(self, load_balancer_arn, attributes).await
    }

    async fn delete_load_balancer(&self, load_balancer_arn: &str) -> Result<(), CloudError> {
        Elbv2Client::delete_load_balancer(self, load_balancer_arn).await
    }

    async fn describe_target_groups(&self) -> Result<Vec<TargetGroupInfo>, CloudError> {
        Elbv2Client::describe_target_groups(self).await
    }

    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> Result<TargetGroupInfo, CloudError> {
        Elbv2Client::create_target_group(self, input).await
    }

    async fn modify_target_group(
        &self,
        target_group_arn: &str,
        health_check: HealthCheckConfig,
    ) -> Result<(), CloudError> {
        Elbv2Client::modify_target_group(self, target_group_arn, health_check).await
    }

    async fn describe_target_group_attributes(
        &self,
        target_group_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        Elbv2Client::describe_target_group_attributes(self, target_group_arn).await
    }

    async fn modify_target_group_attributes(
        &self,
        target_group_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        Elbv2Client::modify_target_group_attributes(self, target_group_arn, attributes).await
    }

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<(), CloudError> {
        Elbv2Client::delete_target_group(self, target_group_arn).await
    }

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<ListenerInfo>, CloudError> {
        Elbv2Client::describe_listeners(self, load_balancer_arn).await
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        input: ListenerInput,
    ) -> Result<ListenerInfo, CloudError> {
        Elbv2Client::create_listener(self, load_balancer_arn, input).await
    }

    async fn modify_listener(
        &self,
        listener_arn: &str,
        input: ListenerInput,
    ) -> Result<(), CloudError> {
        Elbv2Client::modify_listener(self, listener_arn, input).await
    }

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError> {
        Elbv2Client::delete_listener(self, listener_arn).await
    }

    async fn describe_tags(
        &self,
        arns: Vec<String>,
    ) -> Result<BTreeMap<String, Tags>, CloudError> {
        Elbv2Client::describe_tags(self, arns).await
    }

    async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        Elbv2Client::add_tags(self, arn, tags).await
    }

    async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        Elbv2Client::remove_tags(self, arn, keys).await
    }
}
