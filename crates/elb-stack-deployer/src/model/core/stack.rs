//! Stacks: the unit of reconciliation

use super::error::StackError;
use super::resource::{ModelResource, Resource, ResourceKey, ResourceSpec};
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies a stack; one per owning Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId {
    pub namespace: String,
    pub name: String,
}

impl StackId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for StackId {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s.split_once('/').unwrap_or(("", s));
        if name.is_empty() || name.contains('/') {
            return Err(StackError::InvalidStackId(s.to_string()));
        }
        Ok(StackId::new(namespace, name))
    }
}

/// Desired state for one reconciliation: resources grouped by type.
///
/// A stack is built fresh for every reconciliation and dropped afterwards;
/// which AWS resources belong to it is recorded only in AWS tags.
pub struct Stack {
    id: StackId,
    resources: IndexMap<&'static str, IndexMap<String, Arc<dyn Resource>>>,
}

impl Stack {
    /// Create an empty stack
    pub fn new(id: StackId) -> Self {
        Self {
            id,
            resources: IndexMap::new(),
        }
    }

    /// Stack ID
    pub fn id(&self) -> &StackId {
        &self.id
    }

    /// Register a resource under its type bucket.
    ///
    /// Fails if a resource with the same type and ID is already present.
    pub fn add_resource(&mut self, resource: Arc<dyn Resource>) -> Result<(), StackError> {
        let bucket = self.resources.entry(resource.resource_type()).or_default();
        match bucket.entry(resource.id().to_string()) {
            Entry::Occupied(_) => Err(StackError::DuplicateResource {
                stack_id: self.id.to_string(),
                resource_type: resource.resource_type().to_string(),
                resource_id: resource.id().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(resource);
                Ok(())
            }
        }
    }

    /// Build a resource from its spec and register it
    pub fn add<S: ResourceSpec>(
        &mut self,
        id: impl Into<String>,
        spec: S,
    ) -> Result<Arc<ModelResource<S>>, StackError> {
        let resource = Arc::new(ModelResource::new(self.id.clone(), id, spec));
        self.add_resource(resource.clone())?;
        Ok(resource)
    }

    /// All resources of one kind, in insertion order
    pub fn list_resources<S: ResourceSpec>(&self) -> Vec<Arc<ModelResource<S>>> {
        self.resources
            .get(S::TYPE)
            .into_iter()
            .flat_map(|bucket| bucket.values())
            .filter_map(|resource| {
                Arc::clone(resource)
                    .into_any()
                    .downcast::<ModelResource<S>>()
                    .ok()
            })
            .collect()
    }

    /// Look up one resource by type and ID
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&Arc<dyn Resource>> {
        self.resources.get(resource_type)?.get(id)
    }

    /// Every resource, grouped by type in insertion order
    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn Resource>> + '_ {
        self.resources.values().flat_map(|bucket| bucket.values())
    }

    /// Number of resources across all types
    pub fn len(&self) -> usize {
        self.resources.values().map(IndexMap::len).sum()
    }

    /// Whether the stack holds no resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every resource after the resources its tokens reference.
    ///
    /// Ties are broken by insertion order, so the traversal is deterministic.
    pub fn topological_traversal<E, F>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&Arc<dyn Resource>) -> Result<(), E>,
    {
        let mut visited = HashSet::new();
        for resource in self.resources() {
            self.visit(resource, &mut visited, &mut visitor)?;
        }
        Ok(())
    }

    fn visit<E, F>(
        &self,
        resource: &Arc<dyn Resource>,
        visited: &mut HashSet<ResourceKey>,
        visitor: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(&Arc<dyn Resource>) -> Result<(), E>,
    {
        if !visited.insert(resource.key()) {
            return Ok(());
        }
        for dependency in resource.dependencies() {
            if let Some(dependency) = self.get(dependency.resource_type, &dependency.id) {
                self.visit(dependency, visited, visitor)?;
            }
        }
        visitor(resource)
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("id", &self.id)
            .field("resources", &self.resources().map(|r| r.key()).collect::<Vec<_>>())
            .finish()
    }
}
