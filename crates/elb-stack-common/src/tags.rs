//! AWS resource tag schema for elb-stack
//!
//! Every AWS resource created for a stack carries ownership tags so that it
//! can be rediscovered after a restart. Nothing else persists which AWS
//! resources belong to which stack.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `<prefix>/cluster` | Name of the owning cluster |
//! | `<prefix>/stack` | Stack ID (`namespace/name`) |
//! | `<prefix>/resource` | ID of the resource inside its stack |
//!
//! Resources created by an older naming scheme carry the same keys under
//! the legacy prefix, plus the `kubernetes.io/*` keys below.

/// Current tag prefix
pub const DEFAULT_TAG_PREFIX: &str = "elbv2.k8s.aws";

/// Tag prefix of the predecessor naming scheme
pub const DEFAULT_LEGACY_TAG_PREFIX: &str = "ingress.k8s.aws";

/// Suffix for the cluster ownership tag
pub const TAG_SUFFIX_CLUSTER: &str = "cluster";

/// Suffix for the stack ownership tag
pub const TAG_SUFFIX_STACK: &str = "stack";

/// Suffix for the per-resource ID tag
pub const TAG_SUFFIX_RESOURCE: &str = "resource";

/// Legacy cluster tag is `kubernetes.io/cluster/<cluster-name>`
pub const LEGACY_CLUSTER_TAG_PREFIX: &str = "kubernetes.io/cluster/";

/// Value of the legacy cluster tag
pub const LEGACY_CLUSTER_TAG_VALUE: &str = "owned";

/// Legacy tag carrying the owner's namespace
pub const LEGACY_NAMESPACE_TAG: &str = "kubernetes.io/namespace";

/// Legacy tag carrying the owning ingress name
pub const LEGACY_INGRESS_NAME_TAG: &str = "kubernetes.io/ingress-name";

/// Legacy tag carrying the owning service name
pub const LEGACY_SERVICE_NAME_TAG: &str = "kubernetes.io/service-name";

/// Join a prefix and a suffix into a tag key
pub fn tag_key(prefix: &str, suffix: &str) -> String {
    format!("{prefix}/{suffix}")
}

/// Legacy cluster tag key for a cluster name
pub fn legacy_cluster_tag_key(cluster_name: &str) -> String {
    format!("{LEGACY_CLUSTER_TAG_PREFIX}{cluster_name}")
}
