//! Deferred values
//!
//! A token is either a literal or a reference to one status field of another
//! resource. References resolve against whatever status the referenced
//! resource holds at the time of the call; nothing is cached.

use super::error::TokenError;
use super::resource::{Resource, ResourceKey};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// Resolver invoked with the referenced resource and the field path
pub type TokenResolver = dyn Fn(&dyn Resource, &str) -> Result<String, TokenError> + Send + Sync;

/// A string value that may only become known during synthesis
#[derive(Clone)]
pub enum StringToken {
    /// Known up front
    Literal(String),
    /// Bound to a `(resource, field)` pair
    ResourceField(ResourceFieldToken),
}

/// Reference to one status field of a resource
#[derive(Clone)]
pub struct ResourceFieldToken {
    resource: Arc<dyn Resource>,
    field: String,
    resolver: Arc<TokenResolver>,
}

impl ResourceFieldToken {
    /// Referenced resource
    pub fn resource(&self) -> &Arc<dyn Resource> {
        &self.resource
    }

    /// Referenced status field
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Resolve against the referenced resource's current status
    pub fn resolve(&self) -> Result<String, TokenError> {
        (self.resolver)(self.resource.as_ref(), &self.field)
    }

    /// JSON pointer used when the value is not known yet
    pub fn reference(&self) -> String {
        format!(
            "#/resources/{}/{}/status/{}",
            self.resource.resource_type(),
            self.resource.id(),
            self.field
        )
    }
}

impl StringToken {
    /// Token with an already known value
    pub fn literal(value: impl Into<String>) -> Self {
        StringToken::Literal(value.into())
    }

    /// Token bound to a resource field, resolved through `resolver`
    pub fn resource_field<F>(resource: Arc<dyn Resource>, field: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&dyn Resource, &str) -> Result<String, TokenError> + Send + Sync + 'static,
    {
        StringToken::ResourceField(ResourceFieldToken {
            resource,
            field: field.into(),
            resolver: Arc::new(resolver),
        })
    }

    /// Resolve the token to its value
    pub fn resolve(&self) -> Result<String, TokenError> {
        match self {
            StringToken::Literal(value) => Ok(value.clone()),
            StringToken::ResourceField(token) => token.resolve(),
        }
    }

    /// Resource this token depends on, if any
    pub fn dependency(&self) -> Option<ResourceKey> {
        match self {
            StringToken::Literal(_) => None,
            StringToken::ResourceField(token) => Some(token.resource.key()),
        }
    }

    /// Resolve a list of tokens, failing on the first unresolvable one
    pub fn resolve_all(tokens: &[StringToken]) -> Result<Vec<String>, TokenError> {
        tokens.iter().map(StringToken::resolve).collect()
    }
}

impl fmt::Debug for StringToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringToken::Literal(value) => write!(f, "{value:?}"),
            StringToken::ResourceField(token) => write!(f, "$ref({})", token.reference()),
        }
    }
}

impl From<&str> for StringToken {
    fn from(value: &str) -> Self {
        StringToken::literal(value)
    }
}

impl From<String> for StringToken {
    fn from(value: String) -> Self {
        StringToken::Literal(value)
    }
}

impl Serialize for StringToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StringToken::Literal(value) => serializer.serialize_str(value),
            StringToken::ResourceField(token) => match token.resolve() {
                Ok(value) => serializer.serialize_str(&value),
                Err(_) => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry("$ref", &token.reference())?;
                    map.end()
                }
            },
        }
    }
}
