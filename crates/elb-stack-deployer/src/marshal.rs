//! JSON rendering of a stack for diagnostics and golden tests
//!
//! ```json
//! {"id": "<namespace>/<name>", "resources": {"<type>": {"<id>": {"spec": {..}, "status": {..}}}}}
//! ```
//!
//! Types and resources appear in topological order. Tokens render as their
//! value when resolvable and as `{"$ref": ...}` otherwise.

use crate::model::Stack;
use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Render the stack as a JSON value
pub fn marshal_value(stack: &Stack) -> Result<Value> {
    let mut resources: Map<String, Value> = Map::new();
    stack.topological_traversal(|resource| -> Result<()> {
        let mut entry = Map::new();
        let spec = resource
            .spec_json()
            .with_context(|| format!("Failed to serialize spec of {}", resource.key()))?;
        entry.insert("spec".to_string(), spec);
        let status = resource
            .status_json()
            .with_context(|| format!("Failed to serialize status of {}", resource.key()))?;
        if let Some(status) = status.filter(|status| !status.is_null()) {
            entry.insert("status".to_string(), status);
        }

        let bucket = resources
            .entry(resource.resource_type())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(bucket) = bucket {
            bucket.insert(resource.id().to_string(), Value::Object(entry));
        }
        Ok(())
    })?;

    let mut root = Map::new();
    root.insert("id".to_string(), Value::String(stack.id().to_string()));
    root.insert("resources".to_string(), Value::Object(resources));
    Ok(Value::Object(root))
}

/// Render the stack as compact JSON
pub fn marshal(stack: &Stack) -> Result<String> {
    let value = marshal_value(stack)?;
    serde_json::to_string(&value).context("Failed to encode stack JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StackId;
    use crate::testing::{FakeSpec, FakeStatus};

    fn two_resource_stack() -> (Stack, std::sync::Arc<crate::testing::FakeResource>) {
        let mut stack = Stack::new(StackId::new("namespace", "name"));
        let res_a = stack.add("resA", FakeSpec::literal("valueA")).unwrap();
        stack
            .add(
                "resB",
                FakeSpec {
                    field_a: vec![res_a.field_b()],
                },
            )
            .unwrap();
        (stack, res_a)
    }

    #[test]
    fn test_marshal_unresolved_reference() {
        let (stack, _) = two_resource_stack();
        assert_eq!(
            marshal(&stack).unwrap(),
            r##"{"id":"namespace/name","resources":{"typeX":{"resA":{"spec":{"fieldA":["valueA"]}},"resB":{"spec":{"fieldA":[{"$ref":"#/resources/typeX/resA/status/fieldB"}]}}}}}"##
        );
    }

    #[test]
    fn test_marshal_resolved_reference_and_status() {
        let (stack, res_a) = two_resource_stack();
        res_a.set_status(FakeStatus {
            field_b: "valueB".to_string(),
        });
        assert_eq!(
            marshal_value(&stack).unwrap(),
            serde_json::json!({
                "id": "namespace/name",
                "resources": {
                    "typeX": {
                        "resA": {"spec": {"fieldA": ["valueA"]}, "status": {"fieldB": "valueB"}},
                        "resB": {"spec": {"fieldA": ["valueB"]}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_marshal_empty_stack() {
        let stack = Stack::new(StackId::new("", "standalone"));
        assert_eq!(
            marshal(&stack).unwrap(),
            r#"{"id":"standalone","resources":{}}"#
        );
    }
}
