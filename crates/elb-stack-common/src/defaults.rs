//! Default configuration values
//!
//! These constants keep retry, caching and region pinning consistent between
//! the deployer library and the CLI.

/// Poll interval for deletes blocked by a dependent resource (seconds)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 2;

/// Upper bound on how long a blocked delete keeps polling (seconds)
pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 120;

/// Shield Advanced is a global service served from us-east-1
pub const SHIELD_REGION: &str = "us-east-1";

/// Global Accelerator's control plane only lives in us-west-2
pub const GLOBAL_ACCELERATOR_REGION: &str = "us-west-2";

/// How long a Shield subscription lookup is trusted (2 hours)
pub const SHIELD_SUBSCRIPTION_CACHE_TTL_SECS: u64 = 2 * 60 * 60;

/// How long a Shield protection lookup by resource ARN is trusted (10 minutes)
pub const SHIELD_PROTECTION_CACHE_TTL_SECS: u64 = 10 * 60;

/// How long the Route53 hosted zone list is trusted (5 minutes)
pub const ROUTE53_HOSTED_ZONE_CACHE_TTL_SECS: u64 = 5 * 60;

/// ELBv2 DescribeTags accepts at most 20 ARNs per call
pub const ELBV2_DESCRIBE_TAGS_CHUNK_SIZE: usize = 20;

/// Name given to Shield protections created by elb-stack
pub const SHIELD_PROTECTION_NAME: &str = "managed by elb-stack";

// Serde default functions for struct field defaults

/// Returns the default retry interval
pub fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

/// Returns the default retry timeout
pub fn default_retry_timeout_secs() -> u64 {
    DEFAULT_RETRY_TIMEOUT_SECS
}

/// Returns the default tag prefix
pub fn default_tag_prefix() -> String {
    crate::tags::DEFAULT_TAG_PREFIX.to_string()
}

/// Returns the default legacy tag prefix
pub fn default_legacy_tag_prefix() -> String {
    crate::tags::DEFAULT_LEGACY_TAG_PREFIX.to_string()
}

/// Serde helper for feature flags that default to on
pub fn enabled() -> bool {
    true
}
