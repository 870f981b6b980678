use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use stayflow_core::state::GuestIdentity;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap())
}

/// Layered lookup context for template rendering.
///
/// Layer precedence for bare keys: derived outputs over collected answers
/// over guest identity. Namespaced paths (`derived.*`, `collected.*`,
/// `guest.*`) address a layer directly.
pub struct TemplateContext {
    root: Value,
}

impl TemplateContext {
    pub fn new(
        collected: &HashMap<String, String>,
        derived: &HashMap<String, Value>,
        guest: &GuestIdentity,
    ) -> Self {
        let mut guest_map = Map::new();
        guest_map.insert("guest_id".into(), Value::String(guest.guest_id.clone()));
        if let Some(name) = &guest.name {
            guest_map.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(phone) = &guest.phone {
            guest_map.insert("phone".into(), Value::String(phone.clone()));
        }

        let collected_map: Map<String, Value> = collected
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let derived_map: Map<String, Value> =
            derived.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        // Bare keys, lowest-precedence layer inserted first
        let mut root = Map::new();
        for (k, v) in &guest_map {
            root.insert(k.clone(), v.clone());
        }
        for (k, v) in &collected_map {
            root.insert(k.clone(), v.clone());
        }
        for (k, v) in &derived_map {
            root.insert(k.clone(), v.clone());
        }

        root.insert("guest".into(), Value::Object(guest_map));
        root.insert("collected".into(), Value::Object(collected_map));
        root.insert("derived".into(), Value::Object(derived_map));

        Self {
            root: Value::Object(root),
        }
    }

    /// Dotted-path lookup. No expression evaluation, only path traversal.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Replace every `{{dotted.path}}` placeholder in `template`. Missing paths
/// render as the empty string; rendering never fails.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures| {
            ctx.lookup(&caps[1]).map(display_value).unwrap_or_default()
        })
        .into_owned()
}

/// Resolve each parameter value as a template.
pub fn resolve_params(
    params: &HashMap<String, String>,
    ctx: &TemplateContext,
) -> HashMap<String, String> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), render(v, ctx)))
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(
        collected: &[(&str, &str)],
        derived: &[(&str, Value)],
        guest: GuestIdentity,
    ) -> TemplateContext {
        let collected = collected
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let derived = derived
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        TemplateContext::new(&collected, &derived, &guest)
    }

    #[test]
    fn test_namespaced_lookup() {
        let ctx = ctx(
            &[("name", "Aiman")],
            &[],
            GuestIdentity::new("g-1").with_name("Registered Name"),
        );
        assert_eq!(render("Hi {{collected.name}}", &ctx), "Hi Aiman");
        assert_eq!(render("Hi {{guest.name}}", &ctx), "Hi Registered Name");
    }

    #[test]
    fn test_bare_key_precedence() {
        let ctx = ctx(
            &[("room", "204")],
            &[("room", json!("1103"))],
            GuestIdentity::new("g-1"),
        );
        // derived outputs win over collected answers
        assert_eq!(render("Room {{room}}", &ctx), "Room 1103");
        assert_eq!(render("Room {{collected.room}}", &ctx), "Room 204");
    }

    #[test]
    fn test_missing_path_renders_empty() {
        let ctx = ctx(&[], &[], GuestIdentity::new("g-1"));
        assert_eq!(render("[{{no.such.path}}]", &ctx), "[]");
    }

    #[test]
    fn test_nested_derived_path() {
        let ctx = ctx(
            &[],
            &[("booking", json!({"id": "B-1042", "nights": 3}))],
            GuestIdentity::new("g-1"),
        );
        assert_eq!(
            render("Ref {{booking.id}}, {{booking.nights}} nights", &ctx),
            "Ref B-1042, 3 nights"
        );
        assert_eq!(render("Ref {{derived.booking.id}}", &ctx), "Ref B-1042");
    }

    #[test]
    fn test_whitespace_and_multiple_placeholders() {
        let ctx = ctx(&[("a", "1"), ("b", "2")], &[], GuestIdentity::new("g-1"));
        assert_eq!(render("{{ a }}+{{b}}={{ missing }}3", &ctx), "1+2=3");
    }

    #[test]
    fn test_resolve_params() {
        let ctx = ctx(&[("name", "Aiman")], &[], GuestIdentity::new("g-1"));
        let mut params = HashMap::new();
        params.insert("guest_name".to_string(), "{{collected.name}}".to_string());
        params.insert("fixed".to_string(), "literal".to_string());

        let resolved = resolve_params(&params, &ctx);
        assert_eq!(resolved.get("guest_name").unwrap(), "Aiman");
        assert_eq!(resolved.get("fixed").unwrap(), "literal");
    }
}
