//! Whole-stack deployments against the in-memory cloud

use super::StackDeployer;
use crate::aws::error::CODE_DEPENDENCY_VIOLATION;
use crate::model::ec2::{
    ElasticIpSpec, IpPermission, SecurityGroupSpec, VpcEndpointServicePermissionsSpec,
    VpcEndpointServiceSpec,
};
use crate::model::elbv2::{
    Action, Attribute, Certificate, HealthCheckConfig, IpAddressType, ListenerSpec,
    LoadBalancerScheme, LoadBalancerSpec, LoadBalancerType, SubnetMapping, TargetGroupSpec,
    TargetType,
};
use crate::model::globalaccelerator::AcceleratorSpec;
use crate::model::shield::ProtectionSpec;
use crate::model::wafv2::WebAclAssociationSpec;
use crate::model::{Resource, Stack, StackId, StringToken, Tags};
use crate::testing::{FakeCloud, test_config};
use crate::wait::WaitError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SG_NAME: &str = "k8s-ns-web-1a2b3c";
const WEB_ACL_ARN: &str = "arn:aws:wafv2:us-west-2:123456789012:regional/webacl/edge/1";

fn stack_id() -> StackId {
    StackId::new("ns", "web")
}

fn security_group_stack() -> Stack {
    let mut stack = Stack::new(stack_id());
    add_security_group(&mut stack);
    stack
}

fn add_security_group(stack: &mut Stack) -> StringToken {
    stack
        .add(
            "ManagedLBSecurityGroup",
            SecurityGroupSpec {
                group_name: SG_NAME.to_string(),
                description: "[k8s] Managed SecurityGroup for LoadBalancer".to_string(),
                ingress: vec![IpPermission::tcp_from_cidr(443, "0.0.0.0/0")],
                tags: Tags::new(),
            },
        )
        .unwrap()
        .group_id()
}

/// Internet-facing ALB with every optional kind attached
fn web_stack(listener_port: i32) -> Stack {
    let mut stack = Stack::new(stack_id());
    let sg = add_security_group(&mut stack);
    let tg = stack
        .add(
            "ns/web-svc:443",
            TargetGroupSpec {
                name: "k8s-ns-websvc-9f8e7d".to_string(),
                target_type: TargetType::Ip,
                port: Some(443),
                protocol: Some("HTTPS".to_string()),
                protocol_version: Some("HTTP1".to_string()),
                ip_address_type: Some(IpAddressType::Ipv4),
                health_check_config: HealthCheckConfig {
                    path: Some("/healthz".to_string()),
                    matcher: Some("200".to_string()),
                    ..HealthCheckConfig::default()
                },
                target_group_attributes: vec![Attribute::new(
                    "deregistration_delay.timeout_seconds",
                    "30",
                )],
                tags: Tags::new(),
            },
        )
        .unwrap();
    let lb = stack
        .add(
            "LoadBalancer",
            LoadBalancerSpec {
                name: "k8s-ns-web-4d5e6f".to_string(),
                lb_type: LoadBalancerType::Application,
                scheme: LoadBalancerScheme::InternetFacing,
                ip_address_type: IpAddressType::Ipv4,
                subnet_mappings: ["subnet-a", "subnet-b"]
                    .into_iter()
                    .map(|subnet_id| SubnetMapping {
                        subnet_id: subnet_id.to_string(),
                        allocation_id: None,
                    })
                    .collect(),
                security_groups: vec![sg],
                load_balancer_attributes: vec![Attribute::new(
                    "idle_timeout.timeout_seconds",
                    "120",
                )],
                tags: Tags::from([("team".to_string(), "edge".to_string())]),
            },
        )
        .unwrap();
    stack
        .add(
            listener_port.to_string(),
            ListenerSpec {
                load_balancer_arn: lb.arn(),
                port: listener_port,
                protocol: "HTTPS".to_string(),
                default_actions: vec![Action::forward(tg.arn())],
                certificates: vec![Certificate {
                    certificate_arn: "arn:aws:acm:us-west-2:123456789012:certificate/abc"
                        .to_string(),
                }],
                ssl_policy: Some("ELBSecurityPolicy-TLS13-1-2-2021-06".to_string()),
                alpn_policy: Vec::new(),
                tags: Tags::new(),
            },
        )
        .unwrap();
    stack
        .add(
            "LoadBalancer",
            WebAclAssociationSpec {
                web_acl_arn: Some(WEB_ACL_ARN.to_string()),
                resource_arn: lb.arn(),
            },
        )
        .unwrap();
    stack
        .add(
            "LoadBalancer",
            ProtectionSpec {
                enabled: true,
                resource_arn: lb.arn(),
            },
        )
        .unwrap();
    stack
        .add(
            "GlobalAccelerator",
            AcceleratorSpec {
                name: "k8s-ns-web".to_string(),
                ip_address_type: "IPV4".to_string(),
                ip_addresses: Vec::new(),
                enabled: true,
                tags: Tags::new(),
            },
        )
        .unwrap();
    stack
}

fn endpoint_service_stack() -> Stack {
    endpoint_service_stack_with_dns(None)
}

/// Internet-facing NLB on an Elastic IP, fronted by an endpoint service
fn endpoint_service_stack_with_dns(private_dns_name: Option<&str>) -> Stack {
    let mut stack = Stack::new(stack_id());
    let eip = stack.add("EIP-subnet-a", ElasticIpSpec::default()).unwrap();
    let lb = stack
        .add(
            "LoadBalancer",
            LoadBalancerSpec {
                name: "k8s-ns-web-7a8b9c".to_string(),
                lb_type: LoadBalancerType::Network,
                scheme: LoadBalancerScheme::InternetFacing,
                ip_address_type: IpAddressType::Ipv4,
                subnet_mappings: vec![SubnetMapping {
                    subnet_id: "subnet-a".to_string(),
                    allocation_id: Some(eip.allocation_id()),
                }],
                security_groups: Vec::new(),
                load_balancer_attributes: Vec::new(),
                tags: Tags::new(),
            },
        )
        .unwrap();
    let service = stack
        .add(
            "EndpointService",
            VpcEndpointServiceSpec {
                acceptance_required: true,
                network_load_balancer_arns: vec![lb.arn()],
                private_dns_name: private_dns_name.map(str::to_string),
                tags: Tags::new(),
            },
        )
        .unwrap();
    stack
        .add(
            "EndpointServicePermissions",
            VpcEndpointServicePermissionsSpec {
                allowed_principals: vec!["arn:aws:iam::111122223333:root".to_string()],
                service_id: service.service_id(),
            },
        )
        .unwrap();
    stack
}

fn deployer(fake: &Arc<FakeCloud>) -> StackDeployer {
    StackDeployer::new(&test_config(), fake.cloud_api())
}

fn position(calls: &[String], operation: &str) -> usize {
    calls
        .iter()
        .position(|call| call == operation)
        .unwrap_or_else(|| panic!("{operation} was never called: {calls:?}"))
}

fn wait_error(err: &anyhow::Error) -> Option<&WaitError> {
    err.chain().find_map(|cause| cause.downcast_ref::<WaitError>())
}

#[tokio::test]
async fn test_deploy_fulfills_every_resource() {
    let fake = FakeCloud::new();
    fake.set_subscribed(true);
    let stack = web_stack(443);

    deployer(&fake)
        .deploy(&stack, &CancellationToken::new())
        .await
        .unwrap();

    assert!(stack.resources().all(|r| r.is_fulfilled()));
    let lb = &fake.load_balancers()[0];
    assert_eq!(lb.security_groups, [fake.security_groups()[0].group_id.clone()]);
    assert_eq!(fake.listeners()[0].port, 443);
    assert_eq!(fake.web_acl_for(&lb.arn).as_deref(), Some(WEB_ACL_ARN));
    assert!(fake.protection_for(&lb.arn).is_some());
    assert_eq!(fake.accelerators().len(), 1);
}

#[tokio::test]
async fn test_redeploy_of_converged_stack_mutates_nothing() {
    let fake = FakeCloud::new();
    fake.set_subscribed(true);
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();

    deployer.deploy(&web_stack(443), &cancel).await.unwrap();
    assert!(!fake.mutating_calls().is_empty());
    fake.clear_calls();

    deployer.deploy(&web_stack(443), &cancel).await.unwrap();
    assert_eq!(fake.mutating_calls(), Vec::<String>::new());
}

#[tokio::test]
async fn test_redeploy_of_converged_endpoint_service_mutates_nothing() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();

    deployer
        .deploy(&endpoint_service_stack(), &cancel)
        .await
        .unwrap();
    fake.clear_calls();

    deployer
        .deploy(&endpoint_service_stack(), &cancel)
        .await
        .unwrap();
    assert_eq!(fake.mutating_calls(), Vec::<String>::new());
    assert_eq!(fake.endpoint_services().len(), 1);
    assert_eq!(fake.addresses().len(), 1);
}

#[tokio::test]
async fn test_listener_port_change_replaces_listener() {
    let fake = FakeCloud::new();
    fake.set_subscribed(true);
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();

    deployer.deploy(&web_stack(443), &cancel).await.unwrap();
    fake.clear_calls();
    deployer.deploy(&web_stack(8443), &cancel).await.unwrap();

    let calls = fake.mutating_calls();
    assert!(position(&calls, "DeleteListener") < position(&calls, "CreateListener"));
    let listeners = fake.listeners();
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].port, 8443);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_deletes_every_stack_resource() {
    let fake = FakeCloud::new();
    fake.set_subscribed(true);
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();
    deployer.deploy(&web_stack(443), &cancel).await.unwrap();
    let accelerator_arn = fake.accelerators()[0].arn.clone();
    fake.insert_accelerator_listener(&accelerator_arn);

    deployer.cleanup(&stack_id(), &cancel).await.unwrap();

    assert!(fake.security_groups().is_empty());
    assert!(fake.target_groups().is_empty());
    assert!(fake.load_balancers().is_empty());
    assert!(fake.listeners().is_empty());
    assert!(fake.accelerators().is_empty());
    assert_eq!(fake.accelerator_listener_count(), 0);

    let calls = fake.mutating_calls();
    assert!(position(&calls, "DeleteLoadBalancer") < position(&calls, "DeleteTargetGroup"));
    assert!(position(&calls, "DeleteLoadBalancer") < position(&calls, "DeleteSecurityGroup"));
    assert!(position(&calls, "UpdateAccelerator") < position(&calls, "DeleteEndpointGroup"));
    assert!(position(&calls, "DeleteEndpointGroup") < position(&calls, "DeleteAccelerator"));
}

#[tokio::test]
async fn test_cleanup_leaves_other_stacks_alone() {
    let fake = FakeCloud::new();
    let cancel = CancellationToken::new();
    let deployer = deployer(&fake);
    deployer
        .deploy(&security_group_stack(), &cancel)
        .await
        .unwrap();

    deployer
        .cleanup(&StackId::new("ns", "other"), &cancel)
        .await
        .unwrap();

    assert_eq!(fake.security_groups().len(), 1);
}

#[tokio::test]
async fn test_endpoint_service_wraps_its_load_balancer() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();

    deployer
        .deploy(&endpoint_service_stack(), &cancel)
        .await
        .unwrap();

    let calls = fake.mutating_calls();
    assert!(
        position(&calls, "CreateLoadBalancer")
            < position(&calls, "CreateVpcEndpointServiceConfiguration")
    );
    let service = &fake.endpoint_services()[0];
    assert_eq!(
        service.network_load_balancer_arns,
        [fake.load_balancers()[0].arn.clone()]
    );
    assert_eq!(
        fake.endpoint_permissions(&service.service_id)
            .into_iter()
            .collect::<Vec<_>>(),
        ["arn:aws:iam::111122223333:root"]
    );
    assert_eq!(
        fake.load_balancers()[0].subnet_mappings[0].allocation_id,
        Some(fake.addresses()[0].allocation_id.clone())
    );

    fake.clear_calls();
    deployer.cleanup(&stack_id(), &cancel).await.unwrap();

    let calls = fake.mutating_calls();
    assert!(
        position(&calls, "DeleteVpcEndpointServiceConfigurations")
            < position(&calls, "DeleteLoadBalancer")
    );
    assert!(position(&calls, "DeleteLoadBalancer") < position(&calls, "ReleaseAddress"));
    assert!(fake.endpoint_services().is_empty());
    assert!(fake.addresses().is_empty());
}

#[tokio::test]
async fn test_private_dns_names_share_one_zone_listing() {
    let fake = FakeCloud::new();
    fake.insert_hosted_zone("example.com.", false);
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();

    deployer
        .deploy(&endpoint_service_stack_with_dns(Some("svc.example.com")), &cancel)
        .await
        .unwrap();
    deployer
        .deploy(&endpoint_service_stack_with_dns(Some("api.example.com")), &cancel)
        .await
        .unwrap();

    assert_eq!(
        fake.endpoint_services()[0].private_dns_name.as_deref(),
        Some("api.example.com")
    );
    assert_eq!(fake.call_count("ModifyVpcEndpointServiceConfiguration"), 1);
    assert_eq!(fake.call_count("ListHostedZones"), 1);
}

#[tokio::test]
async fn test_existing_security_group_is_adopted_by_name() {
    let fake = FakeCloud::new();
    let existing = fake.insert_security_group(SG_NAME, Tags::new());
    let deployer = deployer(&fake);
    let stack = security_group_stack();

    deployer
        .deploy(&stack, &CancellationToken::new())
        .await
        .unwrap();

    let groups = fake.security_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id, existing);
    assert_eq!(
        deployer.context().tracking.resource_id_of(&groups[0].tags),
        Some("ManagedLBSecurityGroup")
    );
    assert_eq!(groups[0].ingress, [IpPermission::tcp_from_cidr(443, "0.0.0.0/0")]);
}

#[tokio::test]
async fn test_security_group_of_another_stack_is_not_adopted() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let tracking = &deployer.context().tracking;
    let owner_tags = Tags::from([
        (tracking.cluster_tag_key(), "test-cluster".to_string()),
        (tracking.stack_tag_key(), "other/app".to_string()),
        (tracking.resource_id_tag_key(), "ManagedLBSecurityGroup".to_string()),
    ]);
    let existing = fake.insert_security_group(SG_NAME, owner_tags.clone());

    let err = deployer
        .deploy(&security_group_stack(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        format!("{err:#}").contains("is owned by stack other/app"),
        "unexpected error: {err:#}"
    );
    let groups = fake.security_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id, existing);
    assert_eq!(groups[0].tags, owner_tags);
    assert_eq!(fake.call_count("CreateTags"), 0);
    assert_eq!(fake.call_count("AuthorizeSecurityGroupIngress"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_delete_is_retried_until_it_succeeds() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();
    deployer
        .deploy(&security_group_stack(), &cancel)
        .await
        .unwrap();
    fake.fail("DeleteSecurityGroup", CODE_DEPENDENCY_VIOLATION, 3);

    deployer.cleanup(&stack_id(), &cancel).await.unwrap();

    assert_eq!(fake.call_count("DeleteSecurityGroup"), 4);
    assert!(fake.security_groups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_delete_times_out() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();
    deployer
        .deploy(&security_group_stack(), &cancel)
        .await
        .unwrap();
    fake.fail_always("DeleteSecurityGroup", CODE_DEPENDENCY_VIOLATION);

    let err = deployer.cleanup(&stack_id(), &cancel).await.unwrap_err();

    assert!(matches!(wait_error(&err), Some(WaitError::Timeout { .. })));
    assert!(fake.call_count("DeleteSecurityGroup") > 1);
    assert_eq!(fake.security_groups().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_retries() {
    let fake = FakeCloud::new();
    let deployer = deployer(&fake);
    let cancel = CancellationToken::new();
    deployer
        .deploy(&security_group_stack(), &cancel)
        .await
        .unwrap();
    fake.fail_always("DeleteSecurityGroup", CODE_DEPENDENCY_VIOLATION);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });
    let err = deployer.cleanup(&stack_id(), &cancel).await.unwrap_err();

    assert!(matches!(wait_error(&err), Some(WaitError::Cancelled { .. })));
    assert!(fake.call_count("DeleteSecurityGroup") < 10);
}

#[tokio::test]
async fn test_protection_without_subscription_fails_deploy() {
    let fake = FakeCloud::new();
    let err = deployer(&fake)
        .deploy(&web_stack(443), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("subscription is not active"));
    assert!(fake.call_count("CreateProtection") == 0);
}
