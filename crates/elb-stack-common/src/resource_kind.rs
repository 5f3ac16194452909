//! Resource kinds and synthesis ordering
//!
//! Each kind maps to the CloudFormation-style type name used as the bucket
//! key inside a stack. The synthesis order is the forward order in which the
//! deployer runs synthesizers; post-synthesis runs it in reverse.

use std::fmt;

/// Type name of security groups
pub const TYPE_SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
/// Type name of Elastic IPs
pub const TYPE_ELASTIC_IP: &str = "AWS::EC2::EIP";
/// Type name of VPC endpoint services
pub const TYPE_VPC_ENDPOINT_SERVICE: &str = "AWS::EC2::VPCEndpointService";
/// Type name of VPC endpoint service permissions
pub const TYPE_VPC_ENDPOINT_SERVICE_PERMISSIONS: &str = "AWS::EC2::VPCEndpointServicePermissions";
/// Type name of target groups
pub const TYPE_TARGET_GROUP: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";
/// Type name of load balancers
pub const TYPE_LOAD_BALANCER: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
/// Type name of listeners
pub const TYPE_LISTENER: &str = "AWS::ElasticLoadBalancingV2::Listener";
/// Type name of web ACL associations
pub const TYPE_WEB_ACL_ASSOCIATION: &str = "AWS::WAFv2::WebACLAssociation";
/// Type name of Shield protections
pub const TYPE_SHIELD_PROTECTION: &str = "AWS::Shield::Protection";
/// Type name of Global Accelerator accelerators
pub const TYPE_ACCELERATOR: &str = "AWS::GlobalAccelerator::Accelerator";

/// Kinds of AWS resources managed by elb-stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Security group (deleted after load balancers release it)
    SecurityGroup,
    /// Elastic IP (deleted after network load balancers release it)
    ElasticIp,
    /// Target group (deleted after listeners stop forwarding to it)
    TargetGroup,
    /// VPC endpoint service (deleted before, created after, its load balancer)
    VpcEndpointService,
    /// Allowed principals of a VPC endpoint service
    VpcEndpointServicePermissions,
    /// Application or network load balancer
    LoadBalancer,
    /// Listener of a load balancer
    Listener,
    /// WAFv2 web ACL attached to a load balancer
    WebAclAssociation,
    /// Shield Advanced protection of a load balancer
    ShieldProtection,
    /// Global Accelerator accelerator
    Accelerator,
}

impl ResourceKind {
    /// All kinds, in synthesis order
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::SecurityGroup,
        ResourceKind::ElasticIp,
        ResourceKind::TargetGroup,
        ResourceKind::VpcEndpointService,
        ResourceKind::VpcEndpointServicePermissions,
        ResourceKind::LoadBalancer,
        ResourceKind::Listener,
        ResourceKind::WebAclAssociation,
        ResourceKind::ShieldProtection,
        ResourceKind::Accelerator,
    ];

    /// Type name used as the stack bucket key
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::SecurityGroup => TYPE_SECURITY_GROUP,
            ResourceKind::ElasticIp => TYPE_ELASTIC_IP,
            ResourceKind::TargetGroup => TYPE_TARGET_GROUP,
            ResourceKind::VpcEndpointService => TYPE_VPC_ENDPOINT_SERVICE,
            ResourceKind::VpcEndpointServicePermissions => TYPE_VPC_ENDPOINT_SERVICE_PERMISSIONS,
            ResourceKind::LoadBalancer => TYPE_LOAD_BALANCER,
            ResourceKind::Listener => TYPE_LISTENER,
            ResourceKind::WebAclAssociation => TYPE_WEB_ACL_ASSOCIATION,
            ResourceKind::ShieldProtection => TYPE_SHIELD_PROTECTION,
            ResourceKind::Accelerator => TYPE_ACCELERATOR,
        }
    }

    /// Look a kind up by its type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Position in the forward synthesis order (lower runs first)
    ///
    /// - 0: Security groups (load balancers reference them)
    /// - 1: Elastic IPs (network load balancers reference them)
    /// - 2: Target groups (listeners forward to them)
    /// - 3: VPC endpoint services, so that their deletion precedes the
    ///   load balancer's; creation happens in post-synthesis
    /// - 4: Load balancers
    /// - 5: Listeners (need the load balancer ARN)
    /// - 6: WAF associations, Shield protections (need the load balancer ARN)
    /// - 7: Accelerators
    pub fn synthesis_order(self) -> u8 {
        match self {
            ResourceKind::SecurityGroup => 0,
            ResourceKind::ElasticIp => 1,
            ResourceKind::TargetGroup => 2,
            ResourceKind::VpcEndpointService => 3,
            ResourceKind::VpcEndpointServicePermissions => 3,
            ResourceKind::LoadBalancer => 4,
            ResourceKind::Listener => 5,
            ResourceKind::WebAclAssociation => 6,
            ResourceKind::ShieldProtection => 6,
            ResourceKind::Accelerator => 7,
        }
    }

    /// Short lowercase name for logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::ElasticIp => "elastic-ip",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::VpcEndpointService => "vpc-endpoint-service",
            ResourceKind::VpcEndpointServicePermissions => "vpc-endpoint-service-permissions",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::WebAclAssociation => "web-acl-association",
            ResourceKind::ShieldProtection => "shield-protection",
            ResourceKind::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
