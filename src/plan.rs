//! Schema-driven plan computation.
//!
//! Planning runs in three steps over the JSON documents the host sends:
//!
//! 1. Fill defaults for attributes the configuration leaves out.
//! 2. Compare the configurable parts against prior state. With no difference
//!    the prior state is the plan.
//! 3. Otherwise mark computed values unknown, keeping prior values for
//!    attributes flagged `use_state_for_unknown`, and list what changed.

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult, UNKNOWN_VALUE};

/// Compute the plan for a resource.
///
/// `prior` is `None` when the resource is being created. A null `proposed`
/// value plans the resource's destruction.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    if proposed.is_null() {
        let changes = prior
            .map(|p| vec![AttributeChange::new("", Some(p.clone()), None)])
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = proposed;
    apply_defaults(&schema.block, &mut planned);

    let Some(prior) = prior.filter(|p| !p.is_null()) else {
        mark_computed(&schema.block, &mut planned, None);
        let changes = top_level_names(&schema.block)
            .filter_map(|name| {
                planned
                    .get(name)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::new(name, None, Some(v.clone())))
            })
            .collect();
        return PlanResult::with_changes(planned, changes, false);
    };

    if !block_differs(&schema.block, &planned, prior) {
        return PlanResult::no_change(prior.clone());
    }

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        if attribute_differs(attr, field(&planned, name), field(prior, name)) {
            requires_replace |= attr.force_new;
            changes.push(change(name, prior, &planned));
        }
    }
    for (name, nested) in &schema.block.blocks {
        if nested_differs(nested, field(&planned, name), field(prior, name)) {
            requires_replace |= nested.force_new;
            changes.push(change(name, prior, &planned));
        }
    }
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    mark_computed(&schema.block, &mut planned, Some(prior));
    PlanResult::with_changes(planned, changes, requires_replace)
}

/// Fill in schema defaults for null or missing attributes, recursively.
pub fn apply_defaults(block: &Block, value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };
    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            let current = obj.entry(name.clone()).or_insert(Value::Null);
            if current.is_null() {
                *current = default.clone();
            }
        }
    }
    for (name, nested) in &block.blocks {
        if let Some(child) = obj.get_mut(name) {
            for_each_block_value(nested, child, |b, v| apply_defaults(b, v));
        }
    }
}

fn for_each_block_value(nested: &NestedBlock, value: &mut Value, mut f: impl FnMut(&Block, &mut Value)) {
    match nested.nesting_mode {
        BlockNestingMode::Single => {
            if value.is_object() {
                f(&nested.block, value);
            }
        },
        BlockNestingMode::List => {
            if let Value::Array(items) = value {
                for item in items {
                    f(&nested.block, item);
                }
            }
        },
    }
}

fn mark_computed(block: &Block, value: &mut Value, prior: Option<&Value>) {
    let Value::Object(obj) = value else {
        return;
    };
    for (name, attr) in &block.attributes {
        if !attr.flags.computed {
            continue;
        }
        let current = obj.entry(name.clone()).or_insert(Value::Null);
        if !current.is_null() && !attr.flags.is_computed_only() {
            continue;
        }
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        *current = match prior_value {
            Some(v) if attr.use_state_for_unknown => v.clone(),
            _ => Value::String(UNKNOWN_VALUE.to_string()),
        };
    }
    for (name, nested) in &block.blocks {
        let prior_child = prior.and_then(|p| p.get(name));
        let Some(child) = obj.get_mut(name) else {
            continue;
        };
        match nested.nesting_mode {
            BlockNestingMode::Single => mark_computed(&nested.block, child, prior_child),
            BlockNestingMode::List => {
                let prior_items = prior_child.and_then(Value::as_array);
                if let Value::Array(items) = child {
                    for (i, item) in items.iter_mut().enumerate() {
                        let prior_item = prior_items.and_then(|p| p.get(i));
                        mark_computed(&nested.block, item, prior_item);
                    }
                }
            },
        }
    }
}

fn block_differs(block: &Block, planned: &Value, prior: &Value) -> bool {
    block.attributes.iter().any(|(name, attr)| {
        !attr.flags.is_computed_only() && attribute_differs(attr, field(planned, name), field(prior, name))
    }) || block
        .blocks
        .iter()
        .any(|(name, nested)| nested_differs(nested, field(planned, name), field(prior, name)))
}

fn attribute_differs(attr: &Attribute, planned: &Value, prior: &Value) -> bool {
    // An optional+computed attribute left out of configuration keeps whatever the provider set.
    if attr.flags.computed && planned.is_null() {
        return false;
    }
    !values_equal(&attr.attr_type, planned, prior)
}

fn nested_differs(nested: &NestedBlock, planned: &Value, prior: &Value) -> bool {
    match (planned, prior) {
        (Value::Null, Value::Null) => false,
        (Value::Array(a), Value::Null) | (Value::Null, Value::Array(a)) => !a.is_empty(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() != b.len()
                || a.iter()
                    .zip(b)
                    .any(|(x, y)| block_differs(&nested.block, x, y))
        },
        (Value::Object(_), Value::Object(_)) => block_differs(&nested.block, planned, prior),
        _ => true,
    }
}

/// Compare two attribute values, ignoring element order for sets and
/// integer/float representation for numbers.
pub fn values_equal(attr_type: &AttributeType, a: &Value, b: &Value) -> bool {
    match (attr_type, a, b) {
        (_, Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (AttributeType::Set(_), Value::Array(x), Value::Array(y)) => {
            let mut x: Vec<String> = x.iter().map(Value::to_string).collect();
            let mut y: Vec<String> = y.iter().map(Value::to_string).collect();
            x.sort();
            y.sort();
            x == y
        },
        _ => a == b,
    }
}

fn top_level_names(block: &Block) -> impl Iterator<Item = &String> {
    let mut names: Vec<&String> = block.attributes.keys().chain(block.blocks.keys()).collect();
    names.sort();
    names.into_iter()
}

fn field<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&Value::Null)
}

fn change(name: &str, prior: &Value, planned: &Value) -> AttributeChange {
    let non_null = |v: &Value| Some(v.clone()).filter(|v| !v.is_null());
    AttributeChange::new(name, non_null(field(prior, name)), non_null(field(planned, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::id())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("group_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "enabled",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_attribute(
                "user_ids",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional()),
            )
            .with_attribute("team_id", Attribute::computed_int64())
            .with_block(
                "retentions",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("id", Attribute::id())
                        .with_attribute("name", Attribute::optional_computed_string()),
                ),
            )
    }

    #[test]
    fn test_create_marks_computed_unknown() {
        let result = plan_resource(
            &schema(),
            None,
            json!({"name": "a", "group_id": "1", "retentions": [{"name": "x"}]}),
        );

        assert_eq!(result.planned_state["id"], UNKNOWN_VALUE);
        assert_eq!(result.planned_state["team_id"], UNKNOWN_VALUE);
        assert_eq!(result.planned_state["enabled"], true);
        assert_eq!(result.planned_state["retentions"][0]["id"], UNKNOWN_VALUE);
        assert_eq!(result.planned_state["retentions"][0]["name"], "x");
        assert!(!result.requires_replace);
        assert!(result.changes.iter().any(|c| c.path == "name"));
    }

    #[test]
    fn test_no_change_returns_prior() {
        let prior = json!({
            "id": "42",
            "name": "a",
            "group_id": "1",
            "enabled": true,
            "user_ids": ["u2", "u1"],
            "team_id": 7,
            "retentions": [{"id": "r1", "name": "Default"}],
        });
        let proposed = json!({
            "name": "a",
            "group_id": "1",
            "user_ids": ["u1", "u2"],
            "retentions": [{"name": null}],
        });

        let result = plan_resource(&schema(), Some(&prior), proposed);
        assert_eq!(result.planned_state, prior);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_update_keeps_state_for_unknown() {
        let prior = json!({
            "id": "42",
            "name": "a",
            "group_id": "1",
            "enabled": true,
            "team_id": 7,
            "retentions": [],
        });
        let result = plan_resource(&schema(), Some(&prior), json!({"name": "b", "group_id": "1"}));

        assert_eq!(result.planned_state["id"], "42");
        assert_eq!(result.planned_state["team_id"], UNKNOWN_VALUE);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "name");
        assert_eq!(result.changes[0].before, Some(json!("a")));
        assert_eq!(result.changes[0].after, Some(json!("b")));
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_force_new_requires_replace() {
        let prior = json!({"id": "1", "name": "a", "group_id": "1", "enabled": true});
        let result = plan_resource(&schema(), Some(&prior), json!({"name": "a", "group_id": "2"}));
        assert!(result.requires_replace);
    }

    #[test]
    fn test_destroy_plan() {
        let prior = json!({"id": "1"});
        let result = plan_resource(&schema(), Some(&prior), Value::Null);
        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn test_values_equal() {
        let set = AttributeType::set(AttributeType::String);
        assert!(values_equal(&set, &json!(["a", "b"]), &json!(["b", "a"])));
        assert!(!values_equal(&AttributeType::list(AttributeType::String), &json!(["a", "b"]), &json!(["b", "a"])));
        assert!(values_equal(&AttributeType::Float64, &json!(2), &json!(2.0)));
    }
}
