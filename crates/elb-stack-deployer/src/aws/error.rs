//! AWS error classification
//!
//! Every capability trait returns [`CloudError`], which keeps the AWS error
//! code extracted through `ProvideErrorMetadata`. Retry and cleanup logic
//! match on the code tables below instead of on error strings.

use aws_sdk_ec2::error::ProvideErrorMetadata;
use std::fmt;
use thiserror::Error;

/// A failed AWS API call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct CloudError {
    /// API operation name, e.g. `DeleteSecurityGroup`
    pub operation: String,
    /// AWS error code, when the service returned one
    pub code: Option<String>,
    pub message: String,
}

impl CloudError {
    pub fn new(operation: impl Into<String>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Error carrying only a code, used by test doubles
    pub fn with_code(operation: impl Into<String>, code: &str) -> Self {
        Self::new(operation, Some(code), code)
    }

    /// Convert an SDK error, keeping its code
    pub fn from_sdk<E>(operation: &str, err: E) -> Self
    where
        E: ProvideErrorMetadata + fmt::Display,
    {
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        Self::new(operation, err.code(), message)
    }

    /// Error for a response that lacks a field the caller relies on
    pub fn missing_field(operation: &str, field: &str) -> Self {
        Self::new(operation, None, format!("response has no {field}"))
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn has_code(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|code| codes.contains(&code))
    }

    /// The resource is already gone
    pub fn is_not_found(&self) -> bool {
        self.has_code(NOT_FOUND_CODES)
    }

    /// The resource cannot be deleted yet because something still uses it
    pub fn is_transient_on_delete(&self) -> bool {
        self.has_code(TRANSIENT_DELETE_CODES)
    }

    /// A resource with the same name already exists
    pub fn is_duplicate(&self) -> bool {
        self.has_code(DUPLICATE_CODES)
    }

}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) if *code != self.message => {
                write!(f, "{} failed: {code}: {}", self.operation, self.message)
            }
            _ => write!(f, "{} failed: {}", self.operation, self.message),
        }
    }
}

/// Known AWS error codes for "not found" conditions
pub const NOT_FOUND_CODES: &[&str] = &[
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "InvalidAllocationID.NotFound",
    "InvalidVpcEndpointServiceId.NotFound",
    "InvalidVpcEndpointService.NotFound",
    "LoadBalancerNotFound",
    "TargetGroupNotFound",
    "ListenerNotFound",
    "ResourceNotFoundException",
    "WAFNonexistentItemException",
    "AcceleratorNotFoundException",
    "ListenerNotFoundException",
    "EndpointGroupNotFoundException",
];

/// Codes returned while a dependent resource still holds on to the target
pub const TRANSIENT_DELETE_CODES: &[&str] = &[
    CODE_DEPENDENCY_VIOLATION,
    CODE_IP_ADDRESS_IN_USE,
    CODE_ACCELERATOR_NOT_DISABLED,
    CODE_RESOURCE_IN_USE,
];

/// Codes returned when creating a resource whose name is taken
pub const DUPLICATE_CODES: &[&str] = &[CODE_GROUP_DUPLICATE];

/// Security group still attached to a network interface
pub const CODE_DEPENDENCY_VIOLATION: &str = "DependencyViolation";
/// Elastic IP still associated
pub const CODE_IP_ADDRESS_IN_USE: &str = "InvalidIPAddress.InUse";
/// Accelerator still enabled or deploying
pub const CODE_ACCELERATOR_NOT_DISABLED: &str = "AcceleratorNotDisabledException";
/// Target group still referenced by a listener
pub const CODE_RESOURCE_IN_USE: &str = "ResourceInUse";
/// Security group name already used in the VPC
pub const CODE_GROUP_DUPLICATE: &str = "InvalidGroup.Duplicate";

/// Find the [`CloudError`] inside an error chain
pub fn find_cloud_error(error: &anyhow::Error) -> Option<&CloudError> {
    error.chain().find_map(|cause| cause.downcast_ref::<CloudError>())
}

/// Whether an error chain carries one of `codes`
pub fn has_code(error: &anyhow::Error, codes: &[&str]) -> bool {
    find_cloud_error(error).is_some_and(|err| err.has_code(codes))
}

/// Map "not found" to `Ok(None)`
pub fn ignore_not_found<T>(result: Result<T, CloudError>) -> Result<Option<T>, CloudError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
