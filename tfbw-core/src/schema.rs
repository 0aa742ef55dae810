//! Schema definitions for the provider block, resources and data sources.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Placeholder shown instead of sensitive values in human-facing output.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: BTreeMap<&'static str, Attribute>,
}

impl Schema {
    pub fn new(description: &'static str) -> Self {
        Self {
            description,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    /// Replace every sensitive string in `value` with [`SENSITIVE_PLACEHOLDER`].
    ///
    /// `value` is expected to be an object shaped by this schema; anything
    /// that does not match the schema is left untouched.
    pub fn redact(&self, value: &mut Value) {
        redact_object(&self.attributes, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Copy the prior state value into the plan when the planned value is unknown.
    UseStateForUnknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AttributeKind {
    String,
    ListNested {
        attributes: BTreeMap<&'static str, Attribute>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub description: &'static str,
    #[serde(flatten)]
    pub kind: AttributeKind,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    pub fn string(description: &'static str) -> Self {
        Self::with_kind(description, AttributeKind::String)
    }

    pub fn list_nested(
        description: &'static str,
        attributes: impl IntoIterator<Item = (&'static str, Attribute)>,
    ) -> Self {
        Self::with_kind(
            description,
            AttributeKind::ListNested {
                attributes: attributes.into_iter().collect(),
            },
        )
    }

    fn with_kind(description: &'static str, kind: AttributeKind) -> Self {
        Self {
            description,
            kind,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            plan_modifiers: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }
}

fn redact_object(attributes: &BTreeMap<&'static str, Attribute>, value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    for (name, attr) in attributes {
        let Some(field) = map.get_mut(*name) else {
            continue;
        };
        match &attr.kind {
            AttributeKind::String => {
                if attr.sensitive && field.is_string() {
                    *field = Value::String(SENSITIVE_PLACEHOLDER.to_string());
                }
            }
            AttributeKind::ListNested { attributes } => {
                if let Value::Array(items) = field {
                    for item in items {
                        redact_object(attributes, item);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secrets_schema() -> Schema {
        Schema::new("test").attribute("id", Attribute::string("id").computed()).attribute(
            "secrets",
            Attribute::list_nested(
                "secrets",
                [
                    ("key", Attribute::string("key").required()),
                    ("value", Attribute::string("value").required().sensitive()),
                ],
            )
            .required(),
        )
    }

    #[test]
    fn redact_replaces_nested_sensitive_strings() {
        let mut value = json!({
            "id": "x",
            "secrets": [
                {"key": "DB_PASS", "value": "hunter2"},
                {"key": "EMPTY", "value": null}
            ]
        });
        secrets_schema().redact(&mut value);
        assert_eq!(value["secrets"][0]["key"], "DB_PASS");
        assert_eq!(value["secrets"][0]["value"], SENSITIVE_PLACEHOLDER);
        assert!(value["secrets"][1]["value"].is_null());
        assert_eq!(value["id"], "x");
    }

    #[test]
    fn serializes_kind_and_flags() {
        let value = serde_json::to_value(secrets_schema()).unwrap();
        let secrets = &value["attributes"]["secrets"];
        assert_eq!(secrets["type"], "list_nested");
        assert_eq!(secrets["required"], true);
        assert_eq!(secrets["attributes"]["value"]["sensitive"], true);
        assert!(value["attributes"]["id"].get("plan_modifiers").is_none());
    }

    #[test]
    fn use_state_for_unknown_is_recorded() {
        let attr = Attribute::string("id").computed().use_state_for_unknown();
        assert_eq!(attr.plan_modifiers, vec![PlanModifier::UseStateForUnknown]);
    }
}
