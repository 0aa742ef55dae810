//! Planned state for `PlanResourceChange`.
//!
//! Terraform's proposed new state already merges configuration over prior
//! state.  When that differs from the prior state, every computed attribute
//! the configuration leaves null becomes unknown, unless it carries
//! [`PlanModifier::UseStateForUnknown`] and has a prior value.  Nested list
//! items are paired with prior items by index.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use tfbw_core::schema::{AttributeKind, PlanModifier};
use tfbw_core::value::UNKNOWN_VALUE;
use tfbw_core::{Attribute, DynamicValue, Schema};

pub fn planned_state(
    schema: &Schema,
    prior: &DynamicValue,
    proposed: &DynamicValue,
    config: &DynamicValue,
) -> DynamicValue {
    if proposed.is_null() {
        return DynamicValue::null();
    }
    if !prior.is_null() && proposed == prior {
        return proposed.clone();
    }
    DynamicValue::from_json(plan_object(
        &schema.attributes,
        proposed.as_json(),
        prior.as_json(),
        config.as_json(),
    ))
}

fn plan_object(
    attributes: &BTreeMap<&'static str, Attribute>,
    proposed: &Json,
    prior: &Json,
    config: &Json,
) -> Json {
    let Json::Object(fields) = proposed else {
        return proposed.clone();
    };
    let mut planned = Map::with_capacity(attributes.len());
    for (name, attr) in attributes {
        let proposed = fields.get(*name).unwrap_or(&Json::Null);
        let prior = prior.get(*name).unwrap_or(&Json::Null);
        let config = config.get(*name).unwrap_or(&Json::Null);
        planned.insert(name.to_string(), plan_attribute(attr, proposed, prior, config));
    }
    Json::Object(planned)
}

fn plan_attribute(attr: &Attribute, proposed: &Json, prior: &Json, config: &Json) -> Json {
    if attr.computed && config.is_null() {
        let keep_prior = attr
            .plan_modifiers
            .contains(&PlanModifier::UseStateForUnknown)
            && !prior.is_null()
            && prior.as_str() != Some(UNKNOWN_VALUE);
        return if keep_prior {
            prior.clone()
        } else {
            Json::String(UNKNOWN_VALUE.to_string())
        };
    }
    match (&attr.kind, proposed) {
        (AttributeKind::ListNested { attributes }, Json::Array(items)) => Json::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    plan_object(
                        attributes,
                        item,
                        prior.get(index).unwrap_or(&Json::Null),
                        config.get(index).unwrap_or(&Json::Null),
                    )
                })
                .collect(),
        ),
        _ => proposed.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("test")
            .attribute(
                "id",
                Attribute::string("id").computed().use_state_for_unknown(),
            )
            .attribute(
                "projects",
                Attribute::list_nested(
                    "projects",
                    [
                        ("name", Attribute::string("name").required()),
                        (
                            "project_id",
                            Attribute::string("project_id")
                                .computed()
                                .use_state_for_unknown(),
                        ),
                        (
                            "organization_id",
                            Attribute::string("organization_id").optional().computed(),
                        ),
                    ],
                )
                .required(),
            )
    }

    fn value(v: Json) -> DynamicValue {
        DynamicValue::from_json(v)
    }

    fn prior() -> DynamicValue {
        value(json!({
            "id": "tracking",
            "projects": [
                {"name": "web", "project_id": "p-1", "organization_id": "org"}
            ]
        }))
    }

    #[test]
    fn create_marks_computed_attributes_unknown() {
        let config = value(json!({
            "id": null,
            "projects": [{"name": "web", "project_id": null, "organization_id": null}]
        }));
        let planned = planned_state(&schema(), &DynamicValue::null(), &config, &config);
        assert_eq!(
            planned.as_json(),
            &json!({
                "id": UNKNOWN_VALUE,
                "projects": [{
                    "name": "web",
                    "project_id": UNKNOWN_VALUE,
                    "organization_id": UNKNOWN_VALUE
                }]
            })
        );
    }

    #[test]
    fn unchanged_resource_plans_prior_state() {
        let config = value(json!({
            "id": null,
            "projects": [{"name": "web", "project_id": null, "organization_id": null}]
        }));
        let planned = planned_state(&schema(), &prior(), &prior(), &config);
        assert_eq!(planned, prior());
    }

    #[test]
    fn update_keeps_state_for_unknown_by_index() {
        let config = value(json!({
            "id": null,
            "projects": [
                {"name": "web-renamed", "project_id": null, "organization_id": null},
                {"name": "api", "project_id": null, "organization_id": null}
            ]
        }));
        let proposed = value(json!({
            "id": "tracking",
            "projects": [
                {"name": "web-renamed", "project_id": "p-1", "organization_id": "org"},
                {"name": "api", "project_id": null, "organization_id": null}
            ]
        }));
        let planned = planned_state(&schema(), &prior(), &proposed, &config);
        assert_eq!(
            planned.as_json(),
            &json!({
                "id": "tracking",
                "projects": [
                    {
                        "name": "web-renamed",
                        "project_id": "p-1",
                        "organization_id": UNKNOWN_VALUE
                    },
                    {
                        "name": "api",
                        "project_id": UNKNOWN_VALUE,
                        "organization_id": UNKNOWN_VALUE
                    }
                ]
            })
        );
    }

    #[test]
    fn configured_optional_computed_value_is_kept() {
        let config = value(json!({
            "id": null,
            "projects": [{"name": "web", "project_id": null, "organization_id": "org-2"}]
        }));
        let planned = planned_state(&schema(), &prior(), &config, &config);
        assert_eq!(planned.as_json()["projects"][0]["organization_id"], "org-2");
        assert_eq!(planned.as_json()["projects"][0]["project_id"], "p-1");
    }

    #[test]
    fn destroy_plans_null() {
        let planned = planned_state(
            &schema(),
            &prior(),
            &DynamicValue::null(),
            &DynamicValue::null(),
        );
        assert!(planned.is_null());
    }
}
