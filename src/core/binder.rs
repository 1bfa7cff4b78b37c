//! SW-004: Parameter binding — resolve values into template expressions.
//!
//! Literals pass through. References are looked up in the computed attribute
//! table of the current emission run; the emitter fills that table as it
//! visits nodes in dependency order.

use super::error::{Result, StackError};
use super::types::{ResourceKind, Value};
use indexmap::IndexMap;
use serde_json::{json, Value as Json};

/// Computed attributes registered so far in one emission run.
#[derive(Debug, Clone, Default)]
pub struct ComputedAttributes {
    table: IndexMap<String, IndexMap<String, Json>>,
}

impl ComputedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the placeholder expression for `(id, attribute)`.
    pub fn register(&mut self, id: &str, attribute: &str, expression: Json) {
        self.table
            .entry(id.to_string())
            .or_default()
            .insert(attribute.to_string(), expression);
    }

    /// Register placeholders for every attribute `kind` publishes.
    pub fn register_kind(&mut self, id: &str, kind: ResourceKind) {
        for attribute in kind.computed_attributes() {
            self.register(id, attribute, placeholder(id, attribute));
        }
    }

    pub fn get(&self, id: &str, attribute: &str) -> Option<&Json> {
        self.table.get(id).and_then(|attrs| attrs.get(attribute))
    }

    pub fn contains_resource(&self, id: &str) -> bool {
        self.table.contains_key(id)
    }

    /// Number of registered `(id, attribute)` pairs.
    pub fn len(&self) -> usize {
        self.table.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Placeholder the deployment tool substitutes once `id` exists.
pub fn placeholder(id: &str, attribute: &str) -> Json {
    if attribute == "Id" {
        json!({ "Ref": id })
    } else {
        json!({ "Fn::GetAtt": [id, attribute] })
    }
}

/// Resolve `value` for the resource or output named `from`.
pub fn resolve(value: &Value, attrs: &ComputedAttributes, from: &str) -> Result<Json> {
    match value {
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Number(n) => Ok(Json::from(*n)),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Reference(r) => attrs.get(&r.target, &r.attribute).cloned().ok_or_else(|| {
            StackError::UnresolvedAttribute {
                from: from.to_string(),
                target: r.target.clone(),
                attribute: r.attribute.clone(),
            }
        }),
        Value::Pseudo(p) => Ok(json!({ "Ref": p.name() })),
        Value::List(items) => items
            .iter()
            .map(|item| resolve(item, attrs, from))
            .collect::<Result<Vec<_>>>()
            .map(Json::Array),
        Value::Map(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (key, v) in entries {
                map.insert(key.clone(), resolve(v, attrs, from)?);
            }
            Ok(Json::Object(map))
        }
        Value::Join(parts) => resolve_join(parts, attrs, from),
    }
}

/// Adjacent literal parts are merged; a join of literals only folds into a
/// plain string.
fn resolve_join(parts: &[Value], attrs: &ComputedAttributes, from: &str) -> Result<Json> {
    let mut resolved: Vec<Json> = Vec::with_capacity(parts.len());
    for part in parts {
        let next = resolve(part, attrs, from)?;
        let next = match next {
            Json::Number(n) => Json::String(n.to_string()),
            Json::Bool(b) => Json::String(b.to_string()),
            other => other,
        };
        if let (Some(Json::String(prev)), Json::String(s)) = (resolved.last_mut(), &next) {
            prev.push_str(s);
            continue;
        }
        resolved.push(next);
    }

    match resolved.len() {
        0 => Ok(Json::String(String::new())),
        1 if resolved[0].is_string() => Ok(resolved.remove(0)),
        _ => Ok(json!({ "Fn::Join": ["", resolved] })),
    }
}

/// Resolve every property of a node, preserving property order.
pub fn resolve_properties(
    properties: &IndexMap<String, Value>,
    attrs: &ComputedAttributes,
    from: &str,
) -> Result<serde_json::Map<String, Json>> {
    let mut out = serde_json::Map::with_capacity(properties.len());
    for (key, value) in properties {
        out.insert(key.clone(), resolve(value, attrs, from)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs_with_db() -> ComputedAttributes {
        let mut attrs = ComputedAttributes::new();
        attrs.register_kind("Db", ResourceKind::Datastore);
        attrs
    }

    #[test]
    fn test_sw004_literals_pass_through() {
        let attrs = ComputedAttributes::new();
        assert_eq!(resolve(&Value::from("x"), &attrs, "N").unwrap(), json!("x"));
        assert_eq!(resolve(&Value::from(5432u32), &attrs, "N").unwrap(), json!(5432));
        assert_eq!(resolve(&Value::from(true), &attrs, "N").unwrap(), json!(true));
    }

    #[test]
    fn test_sw004_reference_id_is_ref() {
        let attrs = attrs_with_db();
        let v = resolve(&Value::reference("Db", "Id"), &attrs, "App").unwrap();
        assert_eq!(v, json!({ "Ref": "Db" }));
    }

    #[test]
    fn test_sw004_reference_attribute_is_getatt() {
        let attrs = attrs_with_db();
        let v = resolve(&Value::reference("Db", "Endpoint.Port"), &attrs, "App").unwrap();
        assert_eq!(v, json!({ "Fn::GetAtt": ["Db", "Endpoint.Port"] }));
    }

    #[test]
    fn test_sw004_unresolved_before_emission() {
        let attrs = ComputedAttributes::new();
        let err = resolve(&Value::reference("Db", "Id"), &attrs, "App").unwrap_err();
        match err {
            StackError::UnresolvedAttribute { from, target, attribute } => {
                assert_eq!(from, "App");
                assert_eq!(target, "Db");
                assert_eq!(attribute, "Id");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_sw004_nested_map_keeps_order() {
        let attrs = attrs_with_db();
        let v = Value::map([
            ("Zeta", Value::from(1i64)),
            ("Alpha", Value::list([Value::reference("Db", "SecretArn")])),
        ]);
        let resolved = resolve(&v, &attrs, "App").unwrap();
        let rendered = serde_json::to_string(&resolved).unwrap();
        assert_eq!(
            rendered,
            r#"{"Zeta":1,"Alpha":[{"Fn::GetAtt":["Db","SecretArn"]}]}"#
        );
    }

    #[test]
    fn test_sw004_join_folds_literals() {
        let attrs = ComputedAttributes::new();
        let v = Value::join([Value::from("a"), Value::from(1i64), Value::from("b")]);
        assert_eq!(resolve(&v, &attrs, "N").unwrap(), json!("a1b"));
        assert_eq!(resolve(&Value::Join(vec![]), &attrs, "N").unwrap(), json!(""));
    }

    #[test]
    fn test_sw004_join_with_reference() {
        let attrs = attrs_with_db();
        let v = Value::join([
            Value::from("jdbc:postgresql://"),
            Value::reference("Db", "Endpoint.Address"),
            Value::from(":"),
            Value::reference("Db", "Endpoint.Port"),
            Value::from("/bitbucket"),
        ]);
        let resolved = resolve(&v, &attrs, "App").unwrap();
        assert_eq!(
            resolved,
            json!({ "Fn::Join": ["", [
                "jdbc:postgresql://",
                { "Fn::GetAtt": ["Db", "Endpoint.Address"] },
                ":",
                { "Fn::GetAtt": ["Db", "Endpoint.Port"] },
                "/bitbucket"
            ]] })
        );
    }

    #[test]
    fn test_sw004_pseudo_parameter_is_ref() {
        use crate::core::types::PseudoParameter;
        let attrs = ComputedAttributes::new();
        let v = Value::from(PseudoParameter::Region);
        assert_eq!(resolve(&v, &attrs, "N").unwrap(), json!({ "Ref": "AWS::Region" }));
        assert!(v.references().is_empty());
        let uri = Value::join([
            Value::from(PseudoParameter::AccountId),
            Value::from(".dkr.ecr."),
            Value::from(PseudoParameter::Region),
        ]);
        assert_eq!(
            resolve(&uri, &attrs, "N").unwrap(),
            json!({ "Fn::Join": ["", [
                { "Ref": "AWS::AccountId" },
                ".dkr.ecr.",
                { "Ref": "AWS::Region" }
            ]] })
        );
    }

    #[test]
    fn test_sw004_register_kind_counts() {
        let attrs = attrs_with_db();
        assert!(attrs.contains_resource("Db"));
        assert_eq!(attrs.len(), ResourceKind::Datastore.computed_attributes().len());
    }
}
