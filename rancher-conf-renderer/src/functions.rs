//! Template function library registered on every render.
//!
//! | Name             | Kind     | Usage                                              |
//! |------------------|----------|----------------------------------------------------|
//! | `label`          | filter   | `{{ c \| label(key="tier", default="web") }}`      |
//! | `where_label`    | filter   | `{{ containers \| where_label(key="lb") }}`        |
//! | `group_by_label` | filter   | `{{ containers \| group_by_label(key="tier") }}`   |
//! | `dig`            | filter   | `{{ s.metadata \| dig(path="lb.port", default=80) }}` |
//! | `service`        | function | `{% set s = service(name="web.app") %}`            |
//! | `host`           | function | `{% set h = host(uuid=c.host.uuid) %}`             |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tera::{Tera, Value};

use crate::context::TemplateContext;
use crate::error::RenderError;

/// Register every filter and function on `tera`, binding lookups to `ctx`.
pub fn register(tera: &mut Tera, ctx: &TemplateContext) -> Result<(), RenderError> {
    tera.register_filter("label", label);
    tera.register_filter("where_label", where_label);
    tera.register_filter("group_by_label", group_by_label);
    tera.register_filter("dig", dig);

    let services = Arc::new(to_value_map(ctx.services_by_key())?);
    tera.register_function("service", lookup_fn("service", "name", services));

    let hosts = Arc::new(to_value_map(ctx.hosts_by_uuid())?);
    tera.register_function("host", lookup_fn("host", "uuid", hosts));
    Ok(())
}

fn to_value_map<T: serde::Serialize>(
    items: BTreeMap<String, T>,
) -> Result<BTreeMap<String, Value>, RenderError> {
    items
        .into_iter()
        .map(|(k, v)| -> Result<(String, Value), RenderError> {
            Ok((k, serde_json::to_value(v)?))
        })
        .collect()
}

fn lookup_fn(
    name: &'static str,
    arg: &'static str,
    table: Arc<BTreeMap<String, Value>>,
) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let key = string_arg(name, args, arg)?;
        Ok(table.get(&key).cloned().unwrap_or(Value::Null))
    }
}

fn string_arg(owner: &str, args: &HashMap<String, Value>, arg: &str) -> tera::Result<String> {
    match args.get(arg) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(tera::Error::msg(format!(
            "`{owner}` expects `{arg}` to be a string, got {other}"
        ))),
        None => Err(tera::Error::msg(format!(
            "`{owner}` requires a `{arg}` argument"
        ))),
    }
}

fn label_of<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get("labels").and_then(|labels| labels.get(key))
}

fn label(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let key = string_arg("label", args, "key")?;
    let default = args
        .get("default")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));
    Ok(label_of(value, &key).cloned().unwrap_or(default))
}

fn where_label(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let key = string_arg("where_label", args, "key")?;
    let wanted = args.get("value");
    let Value::Array(items) = value else {
        return Err(tera::Error::msg("`where_label` expects an array"));
    };
    let kept = items
        .iter()
        .filter(|item| match (label_of(item, &key), wanted) {
            (Some(found), Some(wanted)) => found == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .cloned()
        .collect();
    Ok(Value::Array(kept))
}

fn group_by_label(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let key = string_arg("group_by_label", args, "key")?;
    let Value::Array(items) = value else {
        return Err(tera::Error::msg("`group_by_label` expects an array"));
    };
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in items {
        if let Some(Value::String(group)) = label_of(item, &key) {
            groups.entry(group.clone()).or_default().push(item.clone());
        }
    }
    Ok(Value::Object(
        groups
            .into_iter()
            .map(|(k, v)| (k, Value::Array(v)))
            .collect(),
    ))
}

fn dig(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = string_arg("dig", args, "path")?;
    let found = path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    });
    match (found, args.get("default")) {
        (Some(v), _) => Ok(v.clone()),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(tera::Error::msg(format!("`dig`: no value at path '{path}'"))),
    }
}
