//! Shared AWS configuration context
//!
//! `AwsContext` loads the SDK configuration once and builds every service
//! client from it. `CloudApi` bundles the capability traits the managers
//! consume and is handed explicitly to the deployer.

use super::acm::{AcmApi, AcmClient};
use super::ec2::{Ec2Api, Ec2Client};
use super::elbv2::{Elbv2Api, Elbv2Client};
use super::globalaccelerator::{GlobalAcceleratorApi, GlobalAcceleratorClient};
use super::resourcegroupstagging::{ResourceGroupsTaggingApi, ResourceGroupsTaggingClient};
use super::route53::{Route53Api, Route53Client};
use super::shield::{ShieldApi, ShieldClient};
use super::sts::{StsApi, StsClient};
use super::wafregional::{WafRegionalApi, WafRegionalClient};
use super::wafv2::{Wafv2Api, Wafv2Client};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use elb_stack_common::defaults::{GLOBAL_ACCELERATOR_REGION, SHIELD_REGION};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Endpoint override keys accepted in the configuration file
pub const SERVICE_EC2: &str = "ec2";
pub const SERVICE_ELBV2: &str = "elasticloadbalancing";
pub const SERVICE_SHIELD: &str = "shield";
pub const SERVICE_WAFV2: &str = "wafv2";
pub const SERVICE_GLOBAL_ACCELERATOR: &str = "globalaccelerator";
pub const SERVICE_ACM: &str = "acm";
pub const SERVICE_WAF_REGIONAL: &str = "waf-regional";
pub const SERVICE_ROUTE53: &str = "route53";
pub const SERVICE_RESOURCE_GROUPS_TAGGING: &str = "tagging";
pub const SERVICE_STS: &str = "sts";

/// Shared AWS configuration context for creating service clients.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
    endpoints: BTreeMap<String, String>,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    ///
    /// `endpoints` maps a service key (see the `SERVICE_*` constants) to a
    /// custom endpoint URL, e.g. a VPC endpoint or a local test double.
    pub async fn new(region: &str, endpoints: BTreeMap<String, String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
            endpoints,
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        let mut builder = aws_sdk_ec2::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_EC2) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_ec2::Client::from_conf(builder.build())
    }

    pub fn elbv2_client(&self) -> aws_sdk_elasticloadbalancingv2::Client {
        let mut builder = aws_sdk_elasticloadbalancingv2::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_ELBV2) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_elasticloadbalancingv2::Client::from_conf(builder.build())
    }

    pub fn wafv2_client(&self) -> aws_sdk_wafv2::Client {
        let mut builder = aws_sdk_wafv2::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_WAFV2) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_wafv2::Client::from_conf(builder.build())
    }

    pub fn acm_client(&self) -> aws_sdk_acm::Client {
        let mut builder = aws_sdk_acm::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_ACM) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_acm::Client::from_conf(builder.build())
    }

    pub fn waf_regional_client(&self) -> aws_sdk_wafregional::Client {
        let mut builder = aws_sdk_wafregional::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_WAF_REGIONAL) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_wafregional::Client::from_conf(builder.build())
    }

    pub fn route53_client(&self) -> aws_sdk_route53::Client {
        let mut builder = aws_sdk_route53::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_ROUTE53) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_route53::Client::from_conf(builder.build())
    }

    pub fn resource_groups_tagging_client(&self) -> aws_sdk_resourcegroupstagging::Client {
        let mut builder = aws_sdk_resourcegroupstagging::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_RESOURCE_GROUPS_TAGGING) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_resourcegroupstagging::Client::from_conf(builder.build())
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        let mut builder = aws_sdk_sts::config::Builder::from(self.sdk_config());
        if let Some(url) = self.endpoint(SERVICE_STS) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }

    /// Shield is always addressed in us-east-1
    pub fn shield_client(&self) -> aws_sdk_shield::Client {
        let mut builder = aws_sdk_shield::config::Builder::from(self.sdk_config())
            .region(Region::new(SHIELD_REGION));
        if let Some(url) = self.endpoint(SERVICE_SHIELD) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_shield::Client::from_conf(builder.build())
    }

    /// Global Accelerator is always addressed in us-west-2
    pub fn global_accelerator_client(&self) -> aws_sdk_globalaccelerator::Client {
        let mut builder = aws_sdk_globalaccelerator::config::Builder::from(self.sdk_config())
            .region(Region::new(GLOBAL_ACCELERATOR_REGION));
        if let Some(url) = self.endpoint(SERVICE_GLOBAL_ACCELERATOR) {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_globalaccelerator::Client::from_conf(builder.build())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// The AWS capabilities consumed by the managers.
///
/// Each getter takes the name of the operation about to be issued. The
/// default clients ignore it; it exists so that a provider can route
/// individual operations to dedicated clients.
#[derive(Clone)]
pub struct CloudApi {
    ec2: Arc<dyn Ec2Api>,
    elbv2: Arc<dyn Elbv2Api>,
    acm: Arc<dyn AcmApi>,
    shield: Arc<dyn ShieldApi>,
    wafv2: Arc<dyn Wafv2Api>,
    waf_regional: Arc<dyn WafRegionalApi>,
    route53: Arc<dyn Route53Api>,
    resource_groups_tagging: Arc<dyn ResourceGroupsTaggingApi>,
    global_accelerator: Arc<dyn GlobalAcceleratorApi>,
    sts: Arc<dyn StsApi>,
}

impl CloudApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ec2: Arc<dyn Ec2Api>,
        elbv2: Arc<dyn Elbv2Api>,
        acm: Arc<dyn AcmApi>,
        shield: Arc<dyn ShieldApi>,
        wafv2: Arc<dyn Wafv2Api>,
        waf_regional: Arc<dyn WafRegionalApi>,
        route53: Arc<dyn Route53Api>,
        resource_groups_tagging: Arc<dyn ResourceGroupsTaggingApi>,
        global_accelerator: Arc<dyn GlobalAcceleratorApi>,
        sts: Arc<dyn StsApi>,
    ) -> Self {
        Self {
            ec2,
            elbv2,
            acm,
            shield,
            wafv2,
            waf_regional,
            route53,
            resource_groups_tagging,
            global_accelerator,
            sts,
        }
    }

    /// SDK-backed clients built from a loaded context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self::new(
            Arc::new(Ec2Client::from_context(ctx)),
            Arc::new(Elbv2Client::from_context(ctx)),
            Arc::new(AcmClient::from_context(ctx)),
            Arc::new(ShieldClient::from_context(ctx)),
            Arc::new(Wafv2Client::from_context(ctx)),
            Arc::new(WafRegionalClient::from_context(ctx)),
            Arc::new(Route53Client::from_context(ctx)),
            Arc::new(ResourceGroupsTaggingClient::from_context(ctx)),
            Arc::new(GlobalAcceleratorClient::from_context(ctx)),
            Arc::new(StsClient::from_context(ctx)),
        )
    }

    pub fn ec2(&self, _operation: &str) -> &dyn Ec2Api {
        self.ec2.as_ref()
    }

    pub fn elbv2(&self, _operation: &str) -> &dyn Elbv2Api {
        self.elbv2.as_ref()
    }

    pub fn acm(&self, _operation: &str) -> &dyn AcmApi {
        self.acm.as_ref()
    }

    pub fn shield(&self, _operation: &str) -> &dyn ShieldApi {
        self.shield.as_ref()
    }

    pub fn wafv2(&self, _operation: &str) -> &dyn Wafv2Api {
        self.wafv2.as_ref()
    }

    pub fn waf_regional(&self, _operation: &str) -> &dyn WafRegionalApi {
        self.waf_regional.as_ref()
    }

    pub fn route53(&self, _operation: &str) -> &dyn Route53Api {
        self.route53.as_ref()
    }

    pub fn resource_groups_tagging(&self, _operation: &str) -> &dyn ResourceGroupsTaggingApi {
        self.resource_groups_tagging.as_ref()
    }

    pub fn global_accelerator(&self, _operation: &str) -> &dyn GlobalAcceleratorApi {
        self.global_accelerator.as_ref()
    }

    pub fn sts(&self, _operation: &str) -> &dyn StsApi {
        self.sts.as_ref()
    }
}

impl std::fmt::Debug for CloudApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudApi").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_pinned_regions() {
        let ctx = AwsContext::new("eu-west-1", BTreeMap::new()).await;
        assert_eq!(ctx.region(), "eu-west-1");
        let shield = ctx.shield_client();
        assert_eq!(
            shield.config().region().map(|r| r.as_ref()),
            Some(SHIELD_REGION)
        );
        let ga = ctx.global_accelerator_client();
        assert_eq!(
            ga.config().region().map(|r| r.as_ref()),
            Some(GLOBAL_ACCELERATOR_REGION)
        );
    }
}
