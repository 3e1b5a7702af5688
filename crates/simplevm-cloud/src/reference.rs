//! Output references between resources
//!
//! A resource's configuration may embed a reference to another resource's
//! output (its provider ID, name, location, ...). References are encoded as
//! JSON objects so they survive inside an arbitrary `serde_json::Value`:
//!
//! ```json
//! { "$ref": "azure-native:network:Subnet:demo-vnet01-subnet01", "$attr": "id" }
//! ```
//!
//! Every reference is also an implicit dependency edge in the resource graph.

use crate::error::{CloudError, Result};
use crate::state::ResourceState;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

const REF_KEY: &str = "$ref";
const ATTR_KEY: &str = "$attr";

/// Reference to an output attribute of another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    /// Key of the referenced resource (`type:id`)
    pub resource: String,

    /// Attribute name; `id` is the provider-assigned ID
    pub attribute: String,
}

impl OutputRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// Encode the reference as a JSON placeholder
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(REF_KEY.to_string(), Value::String(self.resource.clone()));
        map.insert(ATTR_KEY.to_string(), Value::String(self.attribute.clone()));
        Value::Object(map)
    }

    /// Decode a JSON placeholder
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 2 {
            return None;
        }
        let resource = map.get(REF_KEY)?.as_str()?;
        let attribute = map.get(ATTR_KEY)?.as_str()?;
        Some(Self::new(resource, attribute))
    }

    /// Look up the referenced value in a resource state
    pub fn lookup(&self, state: &ResourceState) -> Option<Value> {
        if self.attribute == "id" {
            return Some(Value::String(state.id.clone()));
        }
        state.attributes.get(&self.attribute).cloned()
    }
}

impl Serialize for OutputRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<OutputRef> for Value {
    fn from(reference: OutputRef) -> Self {
        reference.to_value()
    }
}

/// Collect every reference contained in a configuration value
pub fn collect_refs(value: &Value) -> Vec<OutputRef> {
    let mut refs = Vec::new();
    collect_into(value, &mut refs);
    refs
}

fn collect_into(value: &Value, refs: &mut Vec<OutputRef>) {
    if let Some(reference) = OutputRef::from_value(value) {
        if !refs.contains(&reference) {
            refs.push(reference);
        }
        return;
    }

    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_into(v, refs)),
        Value::Object(map) => map.values().for_each(|v| collect_into(v, refs)),
        _ => {}
    }
}

/// Replace every reference with the referenced output value
pub fn resolve_refs(value: &Value, outputs: &HashMap<String, ResourceState>) -> Result<Value> {
    if let Some(reference) = OutputRef::from_value(value) {
        return outputs
            .get(&reference.resource)
            .and_then(|state| reference.lookup(state))
            .ok_or(CloudError::UnresolvedReference {
                resource: reference.resource,
                attribute: reference.attribute,
            });
    }

    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_refs(v, outputs))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| resolve_refs(v, outputs).map(|resolved| (k.clone(), resolved)))
            .collect::<Result<Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs() -> HashMap<String, ResourceState> {
        let mut outputs = HashMap::new();
        outputs.insert(
            "group:rg".to_string(),
            ResourceState::new("/subscriptions/s/resourceGroups/rg", "group")
                .with_attribute("name", json!("rg"))
                .with_attribute("location", json!("westeurope")),
        );
        outputs
    }

    #[test]
    fn test_collect_nested_refs() {
        let config = json!({
            "resourceGroup": OutputRef::new("group:rg", "name").to_value(),
            "body": {
                "location": OutputRef::new("group:rg", "location").to_value(),
                "ids": [OutputRef::new("nic:a", "id").to_value()],
            }
        });

        let refs = collect_refs(&config);
        assert_eq!(refs.len(), 3);
        assert!(refs.contains(&OutputRef::new("nic:a", "id")));
    }

    #[test]
    fn test_resolve_refs() {
        let config = json!({
            "resourceGroup": OutputRef::new("group:rg", "name").to_value(),
            "parentId": OutputRef::new("group:rg", "id").to_value(),
            "literal": 22,
        });

        let resolved = resolve_refs(&config, &outputs()).unwrap();
        assert_eq!(resolved["resourceGroup"], json!("rg"));
        assert_eq!(resolved["parentId"], json!("/subscriptions/s/resourceGroups/rg"));
        assert_eq!(resolved["literal"], json!(22));
    }

    #[test]
    fn test_resolve_unknown_attribute() {
        let config = json!({ "x": OutputRef::new("group:rg", "ipAddress").to_value() });
        let result = resolve_refs(&config, &outputs());
        assert!(matches!(
            result,
            Err(CloudError::UnresolvedReference { ref attribute, .. }) if attribute == "ipAddress"
        ));
    }

    #[test]
    fn test_object_with_extra_keys_is_not_a_ref() {
        let value = json!({ "$ref": "a:b", "$attr": "id", "other": 1 });
        assert!(OutputRef::from_value(&value).is_none());
    }
}
