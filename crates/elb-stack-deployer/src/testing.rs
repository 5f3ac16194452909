//! Test fixtures: a generic resource kind, a baseline configuration and an
//! in-memory AWS double.
//!
//! [`FakeCloud`] keeps just enough state to behave like AWS towards the
//! managers: tags are stored and filterable, deletes fail while something
//! still references the target, and every call is recorded. Failures can be
//! injected per operation by error code.

use crate::aws::CloudApi;
use crate::aws::acm::MockAcmApi;
use crate::aws::error::{
    CODE_ACCELERATOR_NOT_DISABLED, CODE_DEPENDENCY_VIOLATION, CODE_GROUP_DUPLICATE,
    CODE_IP_ADDRESS_IN_USE, CODE_RESOURCE_IN_USE, CloudError,
};
use crate::aws::ec2::{
    AddressInfo, AllocateAddressInput, CreateEndpointServiceInput, CreateSecurityGroupInput,
    Ec2Api, Ec2Filter, EndpointServiceInfo, MockEc2Api, ModifyEndpointServiceInput,
    SecurityGroupInfo,
};
use crate::aws::elbv2::{
    CreateLoadBalancerInput, CreateTargetGroupInput, Elbv2Api, ListenerInfo, ListenerInput,
    LoadBalancerInfo, MockElbv2Api, SubnetMappingInput, TargetGroupInfo,
};
use crate::aws::globalaccelerator::{
    AcceleratorInfo, CreateAcceleratorInput, GlobalAcceleratorApi, MockGlobalAcceleratorApi,
    UpdateAcceleratorInput,
};
use crate::aws::resourcegroupstagging::{
    MockResourceGroupsTaggingApi, RESOURCE_TYPE_LOAD_BALANCER, RESOURCE_TYPE_TARGET_GROUP,
    ResourceGroupsTaggingApi,
};
use crate::aws::route53::{HostedZoneInfo, MockRoute53Api, Route53Api};
use crate::aws::shield::{MockShieldApi, ProtectionInfo, ShieldApi};
use crate::aws::sts::{CallerIdentity, MockStsApi, StsApi};
use crate::aws::wafregional::MockWafRegionalApi;
use crate::aws::wafv2::{MockWafv2Api, Wafv2Api};
use crate::config::{DeployerConfig, FeatureFlags, RetryConfig};
use crate::deploy::DeployContext;
use crate::model::ec2::IpPermission;
use crate::model::elbv2::{Attribute, HealthCheckConfig};
use crate::model::{ModelResource, ResourceSpec, StringToken, Tags};
use crate::tracking::{TagFilter, tags_match};
use async_trait::async_trait;
use elb_stack_common::defaults::{default_legacy_tag_prefix, default_tag_prefix};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Resource kind with a single list of tokens
#[derive(Debug, Clone, Serialize)]
pub struct FakeSpec {
    #[serde(rename = "fieldA")]
    pub field_a: Vec<StringToken>,
}

impl FakeSpec {
    pub fn literal(value: &str) -> Self {
        Self {
            field_a: vec![StringToken::literal(value)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FakeStatus {
    #[serde(rename = "fieldB")]
    pub field_b: String,
}

impl ResourceSpec for FakeSpec {
    const TYPE: &'static str = "typeX";
    type Status = FakeStatus;

    fn tokens(&self) -> Vec<&StringToken> {
        self.field_a.iter().collect()
    }
}

pub type FakeResource = ModelResource<FakeSpec>;

impl FakeResource {
    pub fn field_b(self: &Arc<Self>) -> StringToken {
        self.field_token("fieldB", |status| status.field_b.clone())
    }
}

pub const TEST_VPC_ID: &str = "vpc-test";

pub fn test_config() -> DeployerConfig {
    DeployerConfig {
        cluster_name: "test-cluster".to_string(),
        region: "us-west-2".to_string(),
        vpc_id: TEST_VPC_ID.to_string(),
        tag_prefix: default_tag_prefix(),
        legacy_tag_prefix: default_legacy_tag_prefix(),
        default_tags: BTreeMap::new(),
        external_managed_tags: Vec::new(),
        endpoints: BTreeMap::new(),
        retry: RetryConfig::default(),
        features: FeatureFlags::default(),
    }
}

/// One mock per capability; a call without a matching expectation panics
#[derive(Default)]
pub struct MockServices {
    pub ec2: MockEc2Api,
    pub elbv2: MockElbv2Api,
    pub acm: MockAcmApi,
    pub shield: MockShieldApi,
    pub wafv2: MockWafv2Api,
    pub waf_regional: MockWafRegionalApi,
    pub route53: MockRoute53Api,
    pub resource_groups_tagging: MockResourceGroupsTaggingApi,
    pub global_accelerator: MockGlobalAcceleratorApi,
    pub sts: MockStsApi,
}

impl MockServices {
    pub fn cloud_api(self) -> CloudApi {
        CloudApi::new(
            Arc::new(self.ec2),
            Arc::new(self.elbv2),
            Arc::new(self.acm),
            Arc::new(self.shield),
            Arc::new(self.wafv2),
            Arc::new(self.waf_regional),
            Arc::new(self.route53),
            Arc::new(self.resource_groups_tagging),
            Arc::new(self.global_accelerator),
            Arc::new(self.sts),
        )
    }
}

/// Context whose only working service is the given Shield mock
pub fn context_with_shield(shield: MockShieldApi) -> DeployContext {
    let cloud = MockServices {
        shield,
        ..Default::default()
    }
    .cloud_api();
    DeployContext::new(&test_config(), cloud)
}

pub const TEST_ACCOUNT_ID: &str = "123456789012";

const ACCOUNT_ARN_PREFIX: &str = "arn:aws:elasticloadbalancing:us-west-2:123456789012";
const STATUS_DEPLOYED: &str = "DEPLOYED";
const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";

#[derive(Default)]
struct FakeState {
    counter: u32,
    calls: Vec<String>,
    failures: HashMap<String, (String, u32)>,
    security_groups: BTreeMap<String, SecurityGroupInfo>,
    addresses: BTreeMap<String, AddressInfo>,
    endpoint_services: BTreeMap<String, EndpointServiceInfo>,
    endpoint_permissions: BTreeMap<String, BTreeSet<String>>,
    load_balancers: BTreeMap<String, LoadBalancerInfo>,
    target_groups: BTreeMap<String, TargetGroupInfo>,
    listeners: BTreeMap<String, ListenerInfo>,
    elbv2_attributes: BTreeMap<String, Vec<Attribute>>,
    elbv2_tags: BTreeMap<String, Tags>,
    subscribed: bool,
    protections: BTreeMap<String, ProtectionInfo>,
    web_acls: BTreeMap<String, String>,
    accelerators: BTreeMap<String, AcceleratorInfo>,
    accelerator_listeners: BTreeMap<String, Vec<String>>,
    endpoint_groups: BTreeMap<String, Vec<String>>,
    hosted_zones: Vec<HostedZoneInfo>,
}

impl FakeState {
    fn next_id(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    fn ec2_tags_mut(&mut self, resource_id: &str) -> Option<&mut Tags> {
        if let Some(sg) = self.security_groups.get_mut(resource_id) {
            return Some(&mut sg.tags);
        }
        if let Some(address) = self.addresses.get_mut(resource_id) {
            return Some(&mut address.tags);
        }
        self.endpoint_services
            .get_mut(resource_id)
            .map(|service| &mut service.tags)
    }

    fn load_balancer_mut(
        &mut self,
        operation: &str,
        arn: &str,
    ) -> Result<&mut LoadBalancerInfo, CloudError> {
        self.load_balancers
            .get_mut(arn)
            .ok_or_else(|| CloudError::with_code(operation, "LoadBalancerNotFound"))
    }

    fn accelerator_mut(
        &mut self,
        operation: &str,
        arn: &str,
    ) -> Result<&mut AcceleratorInfo, CloudError> {
        self.accelerators
            .get_mut(arn)
            .ok_or_else(|| CloudError::with_code(operation, "AcceleratorNotFoundException"))
    }

    fn listener_info(
        &self,
        operation: &str,
        arn: String,
        load_balancer_arn: &str,
        input: ListenerInput,
    ) -> Result<ListenerInfo, CloudError> {
        let mut default_actions = input.default_actions;
        for action in &mut default_actions {
            for target in &mut action.target_groups {
                if !self.target_groups.contains_key(&target.target_group_arn) {
                    return Err(CloudError::with_code(operation, "TargetGroupNotFound"));
                }
                target.weight.get_or_insert(1);
            }
        }
        Ok(ListenerInfo {
            arn,
            load_balancer_arn: load_balancer_arn.to_string(),
            port: input.port,
            protocol: input.protocol,
            default_actions,
            certificates: input.certificates,
            ssl_policy: input.ssl_policy,
            alpn_policy: input.alpn_policy,
        })
    }
}

/// Every filter must match; any value of a filter may match
fn filters_match(filters: &[Ec2Filter], tags: &Tags, attributes: &[(&str, Option<&str>)]) -> bool {
    filters.iter().all(|filter| {
        if filter.name == "tag-key" {
            return filter.values.iter().any(|key| tags.contains_key(key));
        }
        if let Some(key) = filter.name.strip_prefix("tag:") {
            return tags
                .get(key)
                .is_some_and(|value| filter.values.contains(value));
        }
        attributes
            .iter()
            .find(|(name, _)| *name == filter.name)
            .and_then(|(_, value)| *value)
            .is_some_and(|value| filter.values.iter().any(|v| v == value))
    })
}

fn merge_attributes(current: &mut Vec<Attribute>, changes: Vec<Attribute>) {
    for change in changes {
        match current.iter_mut().find(|a| a.key == change.key) {
            Some(existing) => existing.value = change.value,
            None => current.push(change),
        }
    }
}

fn merge_health_check(current: &mut HealthCheckConfig, change: HealthCheckConfig) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if change.$field.is_some() { current.$field = change.$field; })*
        };
    }
    take!(
        port,
        protocol,
        path,
        matcher,
        interval_seconds,
        timeout_seconds,
        healthy_threshold_count,
        unhealthy_threshold_count
    );
}

fn is_mutating(operation: &str) -> bool {
    !["Describe", "List", "Get"]
        .iter()
        .any(|prefix| operation.starts_with(prefix))
}

/// In-memory stand-in for every AWS service the deployer talks to
pub struct FakeCloud {
    state: Mutex<FakeState>,
    vpc_id: String,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            vpc_id: TEST_VPC_ID.to_string(),
        })
    }

    /// ACM and WAF Regional are left to expectation-free mocks
    pub fn cloud_api(self: &Arc<Self>) -> CloudApi {
        CloudApi::new(
            self.clone(),
            self.clone(),
            Arc::new(MockAcmApi::new()),
            self.clone(),
            self.clone(),
            Arc::new(MockWafRegionalApi::new()),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Record a call and apply any injected failure
    fn call(&self, operation: &str) -> Result<MutexGuard<'_, FakeState>, CloudError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        let injected = match state.failures.get_mut(operation) {
            Some((code, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Some(code.clone())
            }
            _ => None,
        };
        match injected {
            Some(code) => Err(CloudError::with_code(operation, &code)),
            None => Ok(state),
        }
    }

    /// Fail the next `times` calls of `operation` with `code`
    pub fn fail(&self, operation: &str, code: &str, times: u32) {
        self.lock()
            .failures
            .insert(operation.to_string(), (code.to_string(), times));
    }

    pub fn fail_always(&self, operation: &str, code: &str) {
        self.fail(operation, code, u32::MAX);
    }

    pub fn set_subscribed(&self, subscribed: bool) {
        self.lock().subscribed = subscribed;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Calls other than describe/list/get
    pub fn mutating_calls(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| is_mutating(c))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Create a security group outside of any stack
    pub fn insert_security_group(&self, group_name: &str, tags: Tags) -> String {
        let mut state = self.lock();
        let group_id = format!("sg-{:04}", state.next_id());
        state.security_groups.insert(
            group_id.clone(),
            SecurityGroupInfo {
                group_id: group_id.clone(),
                group_name: group_name.to_string(),
                description: "created by hand".to_string(),
                vpc_id: Some(self.vpc_id.clone()),
                ingress: Vec::new(),
                tags,
            },
        );
        group_id
    }

    pub fn insert_hosted_zone(&self, name: &str, private_zone: bool) -> String {
        let mut state = self.lock();
        let id = format!("Z{:04}", state.next_id());
        state.hosted_zones.push(HostedZoneInfo {
            id: id.clone(),
            name: name.to_string(),
            private_zone,
        });
        id
    }

    /// Attach a listener with one endpoint group to an accelerator
    pub fn insert_accelerator_listener(&self, accelerator_arn: &str) {
        let mut state = self.lock();
        let id = state.next_id();
        let listener_arn = format!("{accelerator_arn}/listener/{id:04}");
        state
            .endpoint_groups
            .insert(listener_arn.clone(), vec![format!("{listener_arn}/endpoint-group/{id:04}")]);
        state
            .accelerator_listeners
            .entry(accelerator_arn.to_string())
            .or_default()
            .push(listener_arn);
    }

    pub fn security_groups(&self) -> Vec<SecurityGroupInfo> {
        self.lock().security_groups.values().cloned().collect()
    }

    pub fn addresses(&self) -> Vec<AddressInfo> {
        self.lock().addresses.values().cloned().collect()
    }

    pub fn endpoint_services(&self) -> Vec<EndpointServiceInfo> {
        self.lock().endpoint_services.values().cloned().collect()
    }

    pub fn endpoint_permissions(&self, service_id: &str) -> BTreeSet<String> {
        self.lock()
            .endpoint_permissions
            .get(service_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancerInfo> {
        self.lock().load_balancers.values().cloned().collect()
    }

    pub fn target_groups(&self) -> Vec<TargetGroupInfo> {
        self.lock().target_groups.values().cloned().collect()
    }

    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.lock().listeners.values().cloned().collect()
    }

    pub fn accelerators(&self) -> Vec<AcceleratorInfo> {
        self.lock().accelerators.values().cloned().collect()
    }

    pub fn accelerator_listener_count(&self) -> usize {
        self.lock().accelerator_listeners.values().map(Vec::len).sum()
    }

    pub fn protection_for(&self, resource_arn: &str) -> Option<ProtectionInfo> {
        self.lock().protections.get(resource_arn).cloned()
    }

    pub fn web_acl_for(&self, resource_arn: &str) -> Option<String> {
        self.lock().web_acls.get(resource_arn).cloned()
    }
}

#[async_trait]
impl Ec2Api for FakeCloud {
    async fn describe_security_groups(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<SecurityGroupInfo>, CloudError> {
        let state = self.call("DescribeSecurityGroups")?;
        Ok(state
            .security_groups
            .values()
            .filter(|sg| {
                filters_match(
                    &filters,
                    &sg.tags,
                    &[
                        ("vpc-id", sg.vpc_id.as_deref()),
                        ("group-name", Some(sg.group_name.as_str())),
                    ],
                )
            })
            .cloned()
            .collect())
    }

    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> Result<String, CloudError> {
        const OP: &str = "CreateSecurityGroup";
        let mut state = self.call(OP)?;
        if state.security_groups.values().any(|sg| {
            sg.group_name == input.group_name && sg.vpc_id.as_deref() == Some(input.vpc_id.as_str())
        }) {
            return Err(CloudError::with_code(OP, CODE_GROUP_DUPLICATE));
        }
        let group_id = format!("sg-{:04}", state.next_id());
        state.security_groups.insert(
            group_id.clone(),
            SecurityGroupInfo {
                group_id: group_id.clone(),
                group_name: input.group_name,
                description: input.description,
                vpc_id: Some(input.vpc_id),
                ingress: Vec::new(),
                tags: input.tags,
            },
        );
        Ok(group_id)
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteSecurityGroup";
        let mut state = self.call(OP)?;
        if !state.security_groups.contains_key(group_id) {
            return Err(CloudError::with_code(OP, "InvalidGroup.NotFound"));
        }
        if state
            .load_balancers
            .values()
            .any(|lb| lb.security_groups.iter().any(|sg| sg == group_id))
        {
            return Err(CloudError::with_code(OP, CODE_DEPENDENCY_VIOLATION));
        }
        state.security_groups.remove(group_id);
        Ok(())
    }

    async fn authorize_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        const OP: &str = "AuthorizeSecurityGroupIngress";
        let mut state = self.call(OP)?;
        let sg = state
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| CloudError::with_code(OP, "InvalidGroup.NotFound"))?;
        if rules.iter().any(|rule| sg.ingress.contains(rule)) {
            return Err(CloudError::with_code(OP, "InvalidPermission.Duplicate"));
        }
        sg.ingress.extend(rules);
        Ok(())
    }

    async fn revoke_ingress(
        &self,
        group_id: &str,
        rules: Vec<IpPermission>,
    ) -> Result<(), CloudError> {
        const OP: &str = "RevokeSecurityGroupIngress";
        let mut state = self.call(OP)?;
        let sg = state
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| CloudError::with_code(OP, "InvalidGroup.NotFound"))?;
        sg.ingress.retain(|rule| !rules.contains(rule));
        Ok(())
    }

    async fn describe_tags(&self, resource_id: &str) -> Result<Tags, CloudError> {
        let mut state = self.call("DescribeTags")?;
        Ok(state.ec2_tags_mut(resource_id).cloned().unwrap_or_default())
    }

    async fn create_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError> {
        const OP: &str = "CreateTags";
        let mut state = self.call(OP)?;
        let current = state
            .ec2_tags_mut(resource_id)
            .ok_or_else(|| CloudError::with_code(OP, "InvalidID"))?;
        current.extend(tags);
        Ok(())
    }

    async fn delete_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError> {
        const OP: &str = "DeleteTags";
        let mut state = self.call(OP)?;
        let current = state
            .ec2_tags_mut(resource_id)
            .ok_or_else(|| CloudError::with_code(OP, "InvalidID"))?;
        current.retain(|key, _| !keys.contains(key));
        Ok(())
    }

    async fn describe_addresses(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<AddressInfo>, CloudError> {
        let state = self.call("DescribeAddresses")?;
        Ok(state
            .addresses
            .values()
            .filter(|address| filters_match(&filters, &address.tags, &[]))
            .cloned()
            .collect())
    }

    async fn allocate_address(
        &self,
        input: AllocateAddressInput,
    ) -> Result<AddressInfo, CloudError> {
        let mut state = self.call("AllocateAddress")?;
        let id = state.next_id();
        let address = AddressInfo {
            allocation_id: format!("eipalloc-{id:04}"),
            public_ip: format!("198.51.100.{}", id % 250),
            public_ipv4_pool: input.public_ipv4_pool,
            association_id: None,
            tags: input.tags,
        };
        state
            .addresses
            .insert(address.allocation_id.clone(), address.clone());
        Ok(address)
    }

    async fn release_address(&self, allocation_id: &str) -> Result<(), CloudError> {
        const OP: &str = "ReleaseAddress";
        let mut state = self.call(OP)?;
        if !state.addresses.contains_key(allocation_id) {
            return Err(CloudError::with_code(OP, "InvalidAllocationID.NotFound"));
        }
        let in_use = state.load_balancers.values().any(|lb| {
            lb.subnet_mappings
                .iter()
                .any(|m| m.allocation_id.as_deref() == Some(allocation_id))
        });
        if in_use {
            return Err(CloudError::with_code(OP, CODE_IP_ADDRESS_IN_USE));
        }
        state.addresses.remove(allocation_id);
        Ok(())
    }

    async fn describe_endpoint_services(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<EndpointServiceInfo>, CloudError> {
        let state = self.call("DescribeVpcEndpointServiceConfigurations")?;
        Ok(state
            .endpoint_services
            .values()
            .filter(|service| filters_match(&filters, &service.tags, &[]))
            .cloned()
            .collect())
    }

    async fn create_endpoint_service(
        &self,
        input: CreateEndpointServiceInput,
    ) -> Result<EndpointServiceInfo, CloudError> {
        const OP: &str = "CreateVpcEndpointServiceConfiguration";
        let mut state = self.call(OP)?;
        if let Some(arn) = input
            .network_load_balancer_arns
            .iter()
            .find(|arn| !state.load_balancers.contains_key(*arn))
        {
            return Err(CloudError::new(OP, Some("InvalidParameter"), format!("{arn} not found")));
        }
        let service = EndpointServiceInfo {
            service_id: format!("vpce-svc-{:04}", state.next_id()),
            acceptance_required: input.acceptance_required,
            network_load_balancer_arns: input.network_load_balancer_arns,
            private_dns_name: input.private_dns_name,
            tags: input.tags,
        };
        state
            .endpoint_services
            .insert(service.service_id.clone(), service.clone());
        Ok(service)
    }

    async fn modify_endpoint_service(
        &self,
        input: ModifyEndpointServiceInput,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyVpcEndpointServiceConfiguration";
        let mut state = self.call(OP)?;
        let service = state
            .endpoint_services
            .get_mut(&input.service_id)
            .ok_or_else(|| CloudError::with_code(OP, "InvalidVpcEndpointServiceId.NotFound"))?;
        if let Some(acceptance_required) = input.acceptance_required {
            service.acceptance_required = acceptance_required;
        }
        service
            .network_load_balancer_arns
            .retain(|arn| !input.remove_network_load_balancer_arns.contains(arn));
        service
            .network_load_balancer_arns
            .extend(input.add_network_load_balancer_arns);
        if input.remove_private_dns_name {
            service.private_dns_name = None;
        }
        if input.private_dns_name.is_some() {
            service.private_dns_name = input.private_dns_name;
        }
        Ok(())
    }

    async fn delete_endpoint_service(&self, service_id: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteVpcEndpointServiceConfigurations";
        let mut state = self.call(OP)?;
        if state.endpoint_services.remove(service_id).is_none() {
            return Err(CloudError::with_code(OP, "InvalidVpcEndpointServiceId.NotFound"));
        }
        state.endpoint_permissions.remove(service_id);
        Ok(())
    }

    async fn describe_endpoint_service_permissions(
        &self,
        service_id: &str,
    ) -> Result<Vec<String>, CloudError> {
        const OP: &str = "DescribeVpcEndpointServicePermissions";
        let state = self.call(OP)?;
        if !state.endpoint_services.contains_key(service_id) {
            return Err(CloudError::with_code(OP, "InvalidVpcEndpointServiceId.NotFound"));
        }
        Ok(state
            .endpoint_permissions
            .get(service_id)
            .map(|principals| principals.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn modify_endpoint_service_permissions(
        &self,
        service_id: &str,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyVpcEndpointServicePermissions";
        let mut state = self.call(OP)?;
        if !state.endpoint_services.contains_key(service_id) {
            return Err(CloudError::with_code(OP, "InvalidVpcEndpointServiceId.NotFound"));
        }
        let principals = state
            .endpoint_permissions
            .entry(service_id.to_string())
            .or_default();
        principals.retain(|principal| !remove.contains(principal));
        principals.extend(add);
        Ok(())
    }
}

#[async_trait]
impl Elbv2Api for FakeCloud {
    async fn describe_load_balancers(&self) -> Result<Vec<LoadBalancerInfo>, CloudError> {
        let state = self.call("DescribeLoadBalancers")?;
        Ok(state.load_balancers.values().cloned().collect())
    }

    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> Result<LoadBalancerInfo, CloudError> {
        const OP: &str = "CreateLoadBalancer";
        let mut state = self.call(OP)?;
        if state.load_balancers.values().any(|lb| lb.name == input.name) {
            return Err(CloudError::with_code(OP, "DuplicateLoadBalancerName"));
        }
        let id = state.next_id();
        let kind = if input.lb_type == "network" { "net" } else { "app" };
        let lb = LoadBalancerInfo {
            arn: format!("{ACCOUNT_ARN_PREFIX}:loadbalancer/{kind}/{}/{id:04}", input.name),
            dns_name: format!("{}-{id:04}.us-west-2.elb.amazonaws.com", input.name),
            name: input.name,
            lb_type: input.lb_type,
            scheme: input.scheme,
            ip_address_type: input.ip_address_type,
            vpc_id: Some(self.vpc_id.clone()),
            canonical_hosted_zone_id: "Z1H1FL5HABSF5".to_string(),
            subnet_mappings: input.subnet_mappings,
            security_groups: input.security_groups,
            tags: Tags::new(),
        };
        state.elbv2_tags.insert(lb.arn.clone(), input.tags);
        state.load_balancers.insert(lb.arn.clone(), lb.clone());
        Ok(lb)
    }

    async fn set_security_groups(
        &self,
        load_balancer_arn: &str,
        security_groups: Vec<String>,
    ) -> Result<(), CloudError> {
        const OP: &str = "SetSecurityGroups";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?.security_groups = security_groups;
        Ok(())
    }

    async fn set_subnets(
        &self,
        load_balancer_arn: &str,
        subnet_mappings: Vec<SubnetMappingInput>,
    ) -> Result<(), CloudError> {
        const OP: &str = "SetSubnets";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?.subnet_mappings = subnet_mappings;
        Ok(())
    }

    async fn set_ip_address_type(
        &self,
        load_balancer_arn: &str,
        ip_address_type: &str,
    ) -> Result<(), CloudError> {
        const OP: &str = "SetIpAddressType";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?.ip_address_type =
            ip_address_type.to_string();
        Ok(())
    }

    async fn describe_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        const OP: &str = "DescribeLoadBalancerAttributes";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?;
        Ok(state
            .elbv2_attributes
            .get(load_balancer_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn modify_load_balancer_attributes(
        &self,
        load_balancer_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyLoadBalancerAttributes";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?;
        merge_attributes(
            state
                .elbv2_attributes
                .entry(load_balancer_arn.to_string())
                .or_default(),
            attributes,
        );
        Ok(())
    }

    async fn delete_load_balancer(&self, load_balancer_arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteLoadBalancer";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?;
        if state.endpoint_services.values().any(|service| {
            service
                .network_load_balancer_arns
                .iter()
                .any(|arn| arn == load_balancer_arn)
        }) {
            return Err(CloudError::with_code(OP, CODE_RESOURCE_IN_USE));
        }
        state.load_balancers.remove(load_balancer_arn);
        state.elbv2_attributes.remove(load_balancer_arn);
        state.elbv2_tags.remove(load_balancer_arn);
        state.web_acls.remove(load_balancer_arn);
        let listeners: Vec<String> = state
            .listeners
            .values()
            .filter(|listener| listener.load_balancer_arn == load_balancer_arn)
            .map(|listener| listener.arn.clone())
            .collect();
        for arn in listeners {
            state.listeners.remove(&arn);
            state.elbv2_tags.remove(&arn);
        }
        Ok(())
    }

    async fn describe_target_groups(&self) -> Result<Vec<TargetGroupInfo>, CloudError> {
        let state = self.call("DescribeTargetGroups")?;
        Ok(state.target_groups.values().cloned().collect())
    }

    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> Result<TargetGroupInfo, CloudError> {
        const OP: &str = "CreateTargetGroup";
        let mut state = self.call(OP)?;
        if state.target_groups.values().any(|tg| tg.name == input.name) {
            return Err(CloudError::with_code(OP, "DuplicateTargetGroupName"));
        }
        let id = state.next_id();
        let tg = TargetGroupInfo {
            arn: format!("{ACCOUNT_ARN_PREFIX}:targetgroup/{}/{id:04}", input.name),
            name: input.name,
            target_type: input.target_type,
            port: input.port,
            protocol: input.protocol,
            protocol_version: input.protocol_version,
            ip_address_type: input.ip_address_type,
            vpc_id: Some(input.vpc_id),
            health_check: input.health_check,
            tags: Tags::new(),
        };
        state.elbv2_tags.insert(tg.arn.clone(), input.tags);
        state.target_groups.insert(tg.arn.clone(), tg.clone());
        Ok(tg)
    }

    async fn modify_target_group(
        &self,
        target_group_arn: &str,
        health_check: HealthCheckConfig,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyTargetGroup";
        let mut state = self.call(OP)?;
        let tg = state
            .target_groups
            .get_mut(target_group_arn)
            .ok_or_else(|| CloudError::with_code(OP, "TargetGroupNotFound"))?;
        merge_health_check(&mut tg.health_check, health_check);
        Ok(())
    }

    async fn describe_target_group_attributes(
        &self,
        target_group_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        const OP: &str = "DescribeTargetGroupAttributes";
        let state = self.call(OP)?;
        if !state.target_groups.contains_key(target_group_arn) {
            return Err(CloudError::with_code(OP, "TargetGroupNotFound"));
        }
        Ok(state
            .elbv2_attributes
            .get(target_group_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn modify_target_group_attributes(
        &self,
        target_group_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyTargetGroupAttributes";
        let mut state = self.call(OP)?;
        if !state.target_groups.contains_key(target_group_arn) {
            return Err(CloudError::with_code(OP, "TargetGroupNotFound"));
        }
        merge_attributes(
            state
                .elbv2_attributes
                .entry(target_group_arn.to_string())
                .or_default(),
            attributes,
        );
        Ok(())
    }

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteTargetGroup";
        let mut state = self.call(OP)?;
        if !state.target_groups.contains_key(target_group_arn) {
            return Err(CloudError::with_code(OP, "TargetGroupNotFound"));
        }
        let referenced = state.listeners.values().any(|listener| {
            listener
                .default_actions
                .iter()
                .flat_map(|action| &action.target_groups)
                .any(|target| target.target_group_arn == target_group_arn)
        });
        if referenced {
            return Err(CloudError::with_code(OP, CODE_RESOURCE_IN_USE));
        }
        state.target_groups.remove(target_group_arn);
        state.elbv2_attributes.remove(target_group_arn);
        state.elbv2_tags.remove(target_group_arn);
        Ok(())
    }

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<ListenerInfo>, CloudError> {
        const OP: &str = "DescribeListeners";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?;
        Ok(state
            .listeners
            .values()
            .filter(|listener| listener.load_balancer_arn == load_balancer_arn)
            .cloned()
            .collect())
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        input: ListenerInput,
    ) -> Result<ListenerInfo, CloudError> {
        const OP: &str = "CreateListener";
        let mut state = self.call(OP)?;
        state.load_balancer_mut(OP, load_balancer_arn)?;
        if state
            .listeners
            .values()
            .any(|l| l.load_balancer_arn == load_balancer_arn && l.port == input.port)
        {
            return Err(CloudError::with_code(OP, "DuplicateListener"));
        }
        let id = state.next_id();
        let arn = format!(
            "{}/{id:04}",
            load_balancer_arn.replacen(":loadbalancer/", ":listener/", 1)
        );
        let tags = input.tags.clone();
        let listener = state.listener_info(OP, arn, load_balancer_arn, input)?;
        state.elbv2_tags.insert(listener.arn.clone(), tags);
        state.listeners.insert(listener.arn.clone(), listener.clone());
        Ok(listener)
    }

    async fn modify_listener(
        &self,
        listener_arn: &str,
        input: ListenerInput,
    ) -> Result<(), CloudError> {
        const OP: &str = "ModifyListener";
        let mut state = self.call(OP)?;
        let load_balancer_arn = state
            .listeners
            .get(listener_arn)
            .map(|listener| listener.load_balancer_arn.clone())
            .ok_or_else(|| CloudError::with_code(OP, "ListenerNotFound"))?;
        let listener = state.listener_info(OP, listener_arn.to_string(), &load_balancer_arn, input)?;
        state.listeners.insert(listener_arn.to_string(), listener);
        Ok(())
    }

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteListener";
        let mut state = self.call(OP)?;
        if state.listeners.remove(listener_arn).is_none() {
            return Err(CloudError::with_code(OP, "ListenerNotFound"));
        }
        state.elbv2_tags.remove(listener_arn);
        Ok(())
    }

    async fn describe_tags(&self, arns: Vec<String>) -> Result<BTreeMap<String, Tags>, CloudError> {
        let state = self.call("DescribeTags")?;
        Ok(arns
            .into_iter()
            .filter_map(|arn| state.elbv2_tags.get(&arn).cloned().map(|tags| (arn, tags)))
            .collect())
    }

    async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        let mut state = self.call("AddTags")?;
        state.elbv2_tags.entry(arn.to_string()).or_default().extend(tags);
        Ok(())
    }

    async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        let mut state = self.call("RemoveTags")?;
        if let Some(tags) = state.elbv2_tags.get_mut(arn) {
            tags.retain(|key, _| !keys.contains(key));
        }
        Ok(())
    }
}

#[async_trait]
impl ShieldApi for FakeCloud {
    async fn subscription_active(&self) -> Result<bool, CloudError> {
        Ok(self.call("GetSubscriptionState")?.subscribed)
    }

    async fn describe_protection(
        &self,
        resource_arn: &str,
    ) -> Result<Option<ProtectionInfo>, CloudError> {
        let state = self.call("DescribeProtection")?;
        Ok(state.protections.get(resource_arn).cloned())
    }

    async fn create_protection(&self, name: &str, resource_arn: &str) -> Result<String, CloudError> {
        const OP: &str = "CreateProtection";
        let mut state = self.call(OP)?;
        if state.protections.contains_key(resource_arn) {
            return Err(CloudError::with_code(OP, "ResourceAlreadyExistsException"));
        }
        let id = format!("protection-{:04}", state.next_id());
        state.protections.insert(
            resource_arn.to_string(),
            ProtectionInfo {
                id: id.clone(),
                name: name.to_string(),
                resource_arn: resource_arn.to_string(),
            },
        );
        Ok(id)
    }

    async fn delete_protection(&self, protection_id: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteProtection";
        let mut state = self.call(OP)?;
        let before = state.protections.len();
        state.protections.retain(|_, p| p.id != protection_id);
        if state.protections.len() == before {
            return Err(CloudError::with_code(OP, "ResourceNotFoundException"));
        }
        Ok(())
    }
}

#[async_trait]
impl Wafv2Api for FakeCloud {
    async fn get_web_acl_for_resource(
        &self,
        resource_arn: &str,
    ) -> Result<Option<String>, CloudError> {
        let state = self.call("GetWebACLForResource")?;
        Ok(state.web_acls.get(resource_arn).cloned())
    }

    async fn associate_web_acl(&self, web_acl_arn: &str, resource_arn: &str) -> Result<(), CloudError> {
        let mut state = self.call("AssociateWebACL")?;
        state
            .web_acls
            .insert(resource_arn.to_string(), web_acl_arn.to_string());
        Ok(())
    }

    async fn disassociate_web_acl(&self, resource_arn: &str) -> Result<(), CloudError> {
        let mut state = self.call("DisassociateWebACL")?;
        state.web_acls.remove(resource_arn);
        Ok(())
    }
}

#[async_trait]
impl GlobalAcceleratorApi for FakeCloud {
    async fn list_accelerators(&self) -> Result<Vec<AcceleratorInfo>, CloudError> {
        let state = self.call("ListAccelerators")?;
        Ok(state
            .accelerators
            .values()
            .map(|accelerator| AcceleratorInfo {
                tags: Tags::new(),
                ..accelerator.clone()
            })
            .collect())
    }

    /// A pending change completes once it has been observed
    async fn describe_accelerator(&self, arn: &str) -> Result<AcceleratorInfo, CloudError> {
        const OP: &str = "DescribeAccelerator";
        let mut state = self.call(OP)?;
        let accelerator = state.accelerator_mut(OP, arn)?;
        let observed = accelerator.clone();
        accelerator.status = STATUS_DEPLOYED.to_string();
        Ok(observed)
    }

    async fn create_accelerator(
        &self,
        input: CreateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError> {
        let mut state = self.call("CreateAccelerator")?;
        let id = state.next_id();
        let ip_addresses = if input.ip_addresses.is_empty() {
            vec![format!("192.0.2.{}", id % 250), format!("192.0.2.{}", id % 250 + 1)]
        } else {
            input.ip_addresses
        };
        let accelerator = AcceleratorInfo {
            arn: format!("arn:aws:globalaccelerator::123456789012:accelerator/{id:04}"),
            name: input.name,
            ip_address_type: input.ip_address_type,
            ip_addresses,
            enabled: input.enabled,
            status: STATUS_DEPLOYED.to_string(),
            dns_name: format!("a{id:04}.awsglobalaccelerator.com"),
            tags: input.tags,
        };
        state
            .accelerators
            .insert(accelerator.arn.clone(), accelerator.clone());
        Ok(accelerator)
    }

    async fn update_accelerator(
        &self,
        input: UpdateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError> {
        const OP: &str = "UpdateAccelerator";
        let mut state = self.call(OP)?;
        let accelerator = state.accelerator_mut(OP, &input.accelerator_arn)?;
        accelerator.name = input.name;
        accelerator.ip_address_type = input.ip_address_type;
        accelerator.enabled = input.enabled;
        accelerator.status = STATUS_IN_PROGRESS.to_string();
        Ok(accelerator.clone())
    }

    async fn delete_accelerator(&self, arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteAccelerator";
        let mut state = self.call(OP)?;
        let accelerator = state.accelerator_mut(OP, arn)?;
        if accelerator.enabled || accelerator.status == STATUS_IN_PROGRESS {
            return Err(CloudError::with_code(OP, CODE_ACCELERATOR_NOT_DISABLED));
        }
        if state
            .accelerator_listeners
            .get(arn)
            .is_some_and(|listeners| !listeners.is_empty())
        {
            return Err(CloudError::with_code(OP, "AssociatedListenerFoundException"));
        }
        state.accelerators.remove(arn);
        Ok(())
    }

    async fn list_listeners(&self, accelerator_arn: &str) -> Result<Vec<String>, CloudError> {
        const OP: &str = "ListListeners";
        let mut state = self.call(OP)?;
        state.accelerator_mut(OP, accelerator_arn)?;
        Ok(state
            .accelerator_listeners
            .get(accelerator_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteListener";
        let mut state = self.call(OP)?;
        if state
            .endpoint_groups
            .get(listener_arn)
            .is_some_and(|groups| !groups.is_empty())
        {
            return Err(CloudError::with_code(OP, "AssociatedEndpointGroupFoundException"));
        }
        let mut found = false;
        for listeners in state.accelerator_listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|arn| arn != listener_arn);
            found |= listeners.len() != before;
        }
        if !found {
            return Err(CloudError::with_code(OP, "ListenerNotFoundException"));
        }
        Ok(())
    }

    async fn list_endpoint_groups(&self, listener_arn: &str) -> Result<Vec<String>, CloudError> {
        let state = self.call("ListEndpointGroups")?;
        Ok(state
            .endpoint_groups
            .get(listener_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_endpoint_group(&self, endpoint_group_arn: &str) -> Result<(), CloudError> {
        const OP: &str = "DeleteEndpointGroup";
        let mut state = self.call(OP)?;
        let mut found = false;
        for groups in state.endpoint_groups.values_mut() {
            let before = groups.len();
            groups.retain(|arn| arn != endpoint_group_arn);
            found |= groups.len() != before;
        }
        if !found {
            return Err(CloudError::with_code(OP, "EndpointGroupNotFoundException"));
        }
        Ok(())
    }

    async fn list_tags_for_resource(&self, arn: &str) -> Result<Tags, CloudError> {
        const OP: &str = "ListTagsForResource";
        let mut state = self.call(OP)?;
        Ok(state.accelerator_mut(OP, arn)?.tags.clone())
    }

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        const OP: &str = "TagResource";
        let mut state = self.call(OP)?;
        state.accelerator_mut(OP, arn)?.tags.extend(tags);
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        const OP: &str = "UntagResource";
        let mut state = self.call(OP)?;
        state
            .accelerator_mut(OP, arn)?
            .tags
            .retain(|key, _| !keys.contains(key));
        Ok(())
    }
}

#[async_trait]
impl Route53Api for FakeCloud {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZoneInfo>, CloudError> {
        let state = self.call("ListHostedZones")?;
        Ok(state.hosted_zones.clone())
    }
}

#[async_trait]
impl ResourceGroupsTaggingApi for FakeCloud {
    async fn get_resources(
        &self,
        resource_types: Vec<String>,
        filter: TagFilter,
    ) -> Result<BTreeMap<String, Tags>, CloudError> {
        let state = self.call("GetResources")?;
        let resource_type = |arn: &String| {
            if state.load_balancers.contains_key(arn) {
                Some(RESOURCE_TYPE_LOAD_BALANCER)
            } else if state.target_groups.contains_key(arn) {
                Some(RESOURCE_TYPE_TARGET_GROUP)
            } else {
                None
            }
        };
        Ok(state
            .elbv2_tags
            .iter()
            .filter(|&(arn, tags)| {
                resource_type(arn).is_some_and(|kind| resource_types.iter().any(|t| t == kind))
                    && tags_match(tags, &filter)
            })
            .map(|(arn, tags)| (arn.clone(), tags.clone()))
            .collect())
    }
}

#[async_trait]
impl StsApi for FakeCloud {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, CloudError> {
        let _state = self.call("GetCallerIdentity")?;
        Ok(CallerIdentity {
            account: TEST_ACCOUNT_ID.to_string(),
            arn: format!("arn:aws:iam::{TEST_ACCOUNT_ID}:user/deployer"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_require_every_filter() {
        let tags = Tags::from([("team".to_string(), "edge".to_string())]);
        let vpc = [("vpc-id", Some("vpc-1"))];
        assert!(filters_match(
            &[
                Ec2Filter::new("tag:team", vec!["edge".to_string(), "core".to_string()]),
                Ec2Filter::new("vpc-id", vec!["vpc-1".to_string()]),
            ],
            &tags,
            &vpc
        ));
        assert!(filters_match(&[Ec2Filter::new("tag-key", vec!["team".to_string()])], &tags, &vpc));
        assert!(!filters_match(
            &[
                Ec2Filter::new("tag:team", vec!["edge".to_string()]),
                Ec2Filter::new("vpc-id", vec!["vpc-2".to_string()]),
            ],
            &tags,
            &vpc
        ));
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let fake = FakeCloud::new();
        fake.fail("ReleaseAddress", CODE_IP_ADDRESS_IN_USE, 1);
        let first = Ec2Api::release_address(fake.as_ref(), "eipalloc-1").await;
        let second = Ec2Api::release_address(fake.as_ref(), "eipalloc-1").await;
        assert_eq!(first.unwrap_err().code(), Some(CODE_IP_ADDRESS_IN_USE));
        assert!(second.unwrap_err().is_not_found());
        assert_eq!(fake.call_count("ReleaseAddress"), 2);
    }
}
