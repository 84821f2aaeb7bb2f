//! Schema-driven planning.
//!
//! Every resource plans the same way: diff the proposed top-level attributes
//! against prior state, carry computed values forward, and flag replacement
//! when a force-new attribute changes.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};
use crate::validation::integral_numbers;

struct Field {
    computed: bool,
    force_new: bool,
    default: Option<Value>,
}

fn fields(schema: &Schema) -> Vec<(&str, Field)> {
    let attributes = schema.block.attributes.iter().map(|(name, attr)| {
        (
            name.as_str(),
            Field {
                computed: attr.presence.is_computed(),
                force_new: attr.force_new,
                default: attr.default.clone(),
            },
        )
    });
    let blocks = schema.block.blocks.iter().map(|(name, nested)| {
        (
            name.as_str(),
            Field {
                computed: nested.computed,
                force_new: false,
                default: None,
            },
        )
    });
    let mut all: Vec<_> = attributes.chain(blocks).collect();
    all.sort_by(|a, b| a.0.cmp(b.0));
    all
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Plan a resource change.
///
/// * `prior == None` plans a create.
/// * `proposed == null` plans a destroy.
/// * Otherwise plans an in-place update or a replacement.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let fields = fields(schema);
    let proposed = integral_numbers(proposed);

    let prior = match prior {
        Some(p) if !p.is_null() => p,
        _ => return plan_create(&fields, proposed),
    };

    if proposed.is_null() {
        let changes = fields
            .iter()
            .filter_map(|(name, _)| {
                non_null(prior.get(*name))
                    .map(|v| AttributeChange::between(*name, Some(v.clone()), None))
            })
            .collect();
        return PlanResult::new(Value::Null, changes, false);
    }

    let mut planned = into_object(proposed);
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, field) in &fields {
        if non_null(planned.get(*name)).is_none() {
            let carried = if field.computed {
                non_null(prior.get(*name)).cloned()
            } else {
                field.default.clone()
            };
            if let Some(value) = carried {
                planned.insert(name.to_string(), value);
            }
        }

        let before = non_null(prior.get(*name));
        let after = non_null(planned.get(*name));
        if before != after {
            requires_replace |= field.force_new;
            changes.push(AttributeChange::between(*name, before.cloned(), after.cloned()));
        }
    }

    PlanResult::new(Value::Object(planned), changes, requires_replace)
}

fn plan_create(fields: &[(&str, Field)], proposed: Value) -> PlanResult {
    let mut planned = into_object(proposed);
    let mut changes = Vec::new();

    for (name, field) in fields {
        if non_null(planned.get(*name)).is_none() {
            if let Some(default) = &field.default {
                planned.insert(name.to_string(), default.clone());
            }
        }
        if let Some(value) = non_null(planned.get(*name)) {
            changes.push(AttributeChange::between(*name, None, Some(value.clone())));
        }
    }

    PlanResult::new(Value::Object(planned), changes, false)
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute("show_search", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("generation", Attribute::computed_int64())
            .with_attribute("cache_size", Attribute::optional_int64())
            .with_block(
                "forward_zones",
                NestedBlock::list(Block::new().with_attribute("name", Attribute::required_string()))
                    .computed(),
            )
    }

    #[test]
    fn test_plan_create() {
        let proposed = json!({"name": "/Common/wt1", "description": null});
        let plan = plan_resource(&schema(), None, proposed);

        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "show_search"]);
        assert_eq!(plan.planned_state["show_search"], json!(false));
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_update_keeps_computed_values() {
        let prior = json!({
            "id": "/Common/r1",
            "name": "/Common/r1",
            "description": "from device",
            "show_search": false,
            "generation": 12,
            "forward_zones": [{"name": "example.com"}]
        });
        let proposed = json!({"name": "/Common/r1", "description": null});

        let plan = plan_resource(&schema(), Some(&prior), proposed);
        assert!(plan.changes.is_empty(), "unexpected changes: {:?}", plan.changes);
        assert_eq!(plan.planned_state["id"], "/Common/r1");
        assert_eq!(plan.planned_state["description"], "from device");
        assert_eq!(plan.planned_state["forward_zones"][0]["name"], "example.com");
    }

    #[test]
    fn test_plan_update_in_place() {
        let prior = json!({"id": "wt1", "name": "wt1", "show_search": false});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"name": "wt1", "show_search": true}),
        );

        assert_eq!(
            plan.changes,
            vec![AttributeChange::between("show_search", Some(json!(false)), Some(json!(true)))]
        );
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_float_integer_matches_prior() {
        let prior = json!({"id": "r1", "name": "r1", "show_search": false, "cache_size": 1048576});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"name": "r1", "cache_size": 1048576.0}),
        );

        assert!(plan.changes.is_empty(), "unexpected changes: {:?}", plan.changes);
        assert_eq!(plan.planned_state["cache_size"], json!(1048576));
    }

    #[test]
    fn test_plan_force_new_requires_replace() {
        let prior = json!({"id": "wt1", "name": "wt1", "show_search": false});
        let plan = plan_resource(&schema(), Some(&prior), json!({"name": "wt2"}));

        assert!(plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "name");
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "wt1", "name": "wt1", "description": null});
        let plan = plan_resource(&schema(), Some(&prior), Value::Null);

        assert!(plan.planned_state.is_null());
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["id", "name"]);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_null_prior_is_create() {
        let plan = plan_resource(&schema(), Some(&Value::Null), json!({"name": "wt1"}));
        assert!(plan.changes.iter().all(|c| c.before.is_none()));
    }
}
