//! Resources and their lifecycle state

use super::error::TokenError;
use super::stack::StackId;
use super::token::StringToken;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Identity of a resource inside its stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: &'static str,
    pub id: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Object-safe view of a resource, used for heterogeneous storage in a stack.
pub trait Resource: Any + Send + Sync + fmt::Debug {
    /// ID of the resource, unique within its stack and type
    fn id(&self) -> &str;

    /// Type name, e.g. `AWS::EC2::SecurityGroup`
    fn resource_type(&self) -> &'static str;

    /// Stack the resource belongs to
    fn stack_id(&self) -> &StackId;

    /// Whether a status has been recorded for this resource
    fn is_fulfilled(&self) -> bool;

    /// Resources referenced by tokens inside this resource's spec
    fn dependencies(&self) -> Vec<ResourceKey>;

    /// Spec rendered as JSON, with unresolved tokens rendered as `$ref`s
    fn spec_json(&self) -> serde_json::Result<serde_json::Value>;

    /// Status rendered as JSON, `None` while the resource is absent
    fn status_json(&self) -> serde_json::Result<Option<serde_json::Value>>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Convenience accessor for the `(type, id)` pair
    fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type(),
            id: self.id().to_string(),
        }
    }
}

/// Desired state of one resource kind.
///
/// The type name doubles as the bucket key inside a [`Stack`](super::Stack),
/// which is how `list_resources` finds every resource of a kind.
pub trait ResourceSpec: Serialize + fmt::Debug + Send + Sync + 'static {
    /// Type name, e.g. `AWS::EC2::SecurityGroup`
    const TYPE: &'static str;

    /// Observed outputs recorded once the resource exists in AWS
    type Status: Serialize + Clone + fmt::Debug + Send + Sync + 'static;

    /// Tokens embedded in the spec; these define the graph edges
    fn tokens(&self) -> Vec<&StringToken> {
        Vec::new()
    }
}

/// Lifecycle of a resource within one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState<T> {
    /// Not created or adopted yet; tokens referencing it cannot resolve
    Absent,
    /// Created, updated or adopted; outputs are known
    Live(T),
}

impl<T> ResourceState<T> {
    /// Status if the resource is live
    pub fn live(&self) -> Option<&T> {
        match self {
            ResourceState::Absent => None,
            ResourceState::Live(status) => Some(status),
        }
    }
}

/// A typed resource: immutable spec plus mutable lifecycle state.
pub struct ModelResource<S: ResourceSpec> {
    stack_id: StackId,
    id: String,
    spec: S,
    state: RwLock<ResourceState<S::Status>>,
}

impl<S: ResourceSpec> ModelResource<S> {
    /// Create an absent resource
    pub fn new(stack_id: StackId, id: impl Into<String>, spec: S) -> Self {
        Self {
            stack_id,
            id: id.into(),
            spec,
            state: RwLock::new(ResourceState::Absent),
        }
    }

    /// Desired state
    pub fn spec(&self) -> &S {
        &self.spec
    }

    /// Record the observed outputs after a successful create/update/adopt
    pub fn set_status(&self, status: S::Status) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = ResourceState::Live(status);
    }

    /// Snapshot of the lifecycle state
    pub fn state(&self) -> ResourceState<S::Status> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the status, if live
    pub fn status(&self) -> Option<S::Status> {
        self.read_status(|status| status.clone())
    }

    /// Read from the status without cloning it
    pub fn read_status<R>(&self, read: impl FnOnce(&S::Status) -> R) -> Option<R> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.live().map(read)
    }

    /// Token referencing one field of this resource's status
    pub fn field_token(self: &Arc<Self>, field: &str, read: fn(&S::Status) -> String) -> StringToken {
        let resource: Arc<dyn Resource> = self.clone();
        StringToken::resource_field(resource, field, move |resource: &dyn Resource, field: &str| {
            let typed = resource.as_any().downcast_ref::<Self>().ok_or_else(|| {
                TokenError::UnknownField {
                    resource_type: resource.resource_type().to_string(),
                    resource_id: resource.id().to_string(),
                    field: field.to_string(),
                }
            })?;
            typed
                .read_status(read)
                .ok_or_else(|| TokenError::NotFulfilled {
                    resource_type: S::TYPE.to_string(),
                    resource_id: typed.id.clone(),
                    field: field.to_string(),
                })
        })
    }
}

impl<S: ResourceSpec> fmt::Debug for ModelResource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelResource")
            .field("type", &S::TYPE)
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("state", &self.state())
            .finish()
    }
}

impl<S: ResourceSpec> Resource for ModelResource<S> {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource_type(&self) -> &'static str {
        S::TYPE
    }

    fn stack_id(&self) -> &StackId {
        &self.stack_id
    }

    fn is_fulfilled(&self) -> bool {
        self.read_status(|_| ()).is_some()
    }

    fn dependencies(&self) -> Vec<ResourceKey> {
        self.spec
            .tokens()
            .into_iter()
            .filter_map(StringToken::dependency)
            .collect()
    }

    fn spec_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.spec)
    }

    fn status_json(&self) -> serde_json::Result<Option<serde_json::Value>> {
        self.read_status(|status| serde_json::to_value(status))
            .transpose()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
