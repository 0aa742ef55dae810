//! Schemas and diagnostics in their tfplugin6 wire shape.

use std::collections::BTreeMap;

use tfbw_core::diag::PathStep;
use tfbw_core::schema::AttributeKind;
use tfbw_core::{Attribute, AttributePath, Diagnostic, Diagnostics, Schema, Severity};

use crate::error::CodecError;
use crate::proto;
use crate::proto::schema::object::NestingMode;

/// cty type of a string attribute, JSON encoded.
const STRING_TYPE: &[u8] = b"\"string\"";

pub fn schema(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: 0,
        block: Some(proto::schema::Block {
            version: 0,
            attributes: attributes(&schema.attributes),
            description: schema.description.to_string(),
            description_kind: proto::StringKind::Plain as i32,
            deprecated: false,
        }),
    }
}

fn attributes(attributes: &BTreeMap<&'static str, Attribute>) -> Vec<proto::schema::Attribute> {
    attributes
        .iter()
        .map(|(name, attr)| attribute(name, attr))
        .collect()
}

fn attribute(name: &str, attr: &Attribute) -> proto::schema::Attribute {
    let (r#type, nested_type) = match &attr.kind {
        AttributeKind::String => (STRING_TYPE.to_vec(), None),
        AttributeKind::ListNested { attributes: nested } => (
            Vec::new(),
            Some(proto::schema::Object {
                attributes: attributes(nested),
                nesting: NestingMode::List as i32,
            }),
        ),
    };
    proto::schema::Attribute {
        name: name.to_string(),
        r#type,
        nested_type,
        description: attr.description.to_string(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: false,
    }
}

pub fn diagnostics(diags: &Diagnostics) -> Vec<proto::Diagnostic> {
    diags.iter().map(diagnostic).collect()
}

fn diagnostic(diag: &Diagnostic) -> proto::Diagnostic {
    let severity = match diag.severity {
        Severity::Error => proto::diagnostic::Severity::Error,
        Severity::Warning => proto::diagnostic::Severity::Warning,
    };
    proto::Diagnostic {
        severity: severity as i32,
        summary: diag.summary.clone(),
        detail: diag.detail.clone(),
        attribute: diag.attribute.as_ref().map(attribute_path),
    }
}

pub fn attribute_path(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    let steps = path
        .steps()
        .iter()
        .map(|step| proto::attribute_path::Step {
            selector: Some(match step {
                PathStep::Attribute(name) => Selector::AttributeName(name.clone()),
                PathStep::ElementIndex(index) => Selector::ElementKeyInt(*index as i64),
            }),
        })
        .collect();
    proto::AttributePath { steps }
}

/// A single error diagnostic for a value that could not be converted.
pub fn codec_error(what: &str, err: &CodecError) -> Vec<proto::Diagnostic> {
    diagnostics(&Diagnostics::error(
        "Value Conversion Error",
        format!("An unexpected error was encountered converting the {what}: {err}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::attribute_path::step::Selector;

    fn secret_schema() -> Schema {
        Schema::new("Secret Resource")
            .attribute("id", Attribute::string("id").computed())
            .attribute(
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
    fn string_attributes_carry_cty_type() {
        let converted = schema(&secret_schema());
        let block = converted.block.unwrap();
        assert_eq!(block.description, "Secret Resource");
        let id = block.attributes.iter().find(|a| a.name == "id").unwrap();
        assert_eq!(id.r#type, b"\"string\"");
        assert!(id.computed);
        assert!(!id.required);
        assert!(id.nested_type.is_none());
    }

    #[test]
    fn list_nested_becomes_nested_type() {
        let block = schema(&secret_schema()).block.unwrap();
        let secrets = block.attributes.iter().find(|a| a.name == "secrets").unwrap();
        assert!(secrets.r#type.is_empty());
        assert!(secrets.required);
        let nested = secrets.nested_type.as_ref().unwrap();
        assert_eq!(nested.nesting, NestingMode::List as i32);
        let names: Vec<_> = nested.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["key", "value"]);
        assert!(nested.attributes[1].sensitive);
    }

    #[test]
    fn diagnostics_keep_severity_and_path() {
        let mut diags = Diagnostics::attribute_error(
            AttributePath::root("secrets").index(1).attribute("secret_id"),
            "Unable to read secret",
            "gone",
        );
        diags.add_error("plain", "");
        let converted = diagnostics(&diags);
        assert_eq!(converted.len(), 2);
        assert_eq!(
            converted[0].severity,
            proto::diagnostic::Severity::Error as i32
        );
        assert_eq!(converted[0].summary, "Unable to read secret");
        let steps: Vec<_> = converted[0]
            .attribute
            .as_ref()
            .unwrap()
            .steps
            .iter()
            .map(|s| s.selector.clone().unwrap())
            .collect();
        assert_eq!(
            steps,
            [
                Selector::AttributeName("secrets".into()),
                Selector::ElementKeyInt(1),
                Selector::AttributeName("secret_id".into()),
            ]
        );
        assert!(converted[1].attribute.is_none());
    }
}
