use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of what the host reports about its environment (theme, display
/// mode, locale, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostContext(Map<String, Value>);

impl HostContext {
    /// Builds a context from a JSON object; anything else yields an empty one.
    pub fn from_value(value: &Value) -> Self {
        Self(value.as_object().cloned().unwrap_or_default())
    }

    /// Applies a partial update, overwriting keys present in `patch`.
    pub fn merge(&mut self, patch: &Value) {
        merge_shallow(&mut self.0, patch);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn theme(&self) -> Option<&str> {
        self.get_str("theme")
    }

    pub fn display_mode(&self) -> Option<&str> {
        self.get_str("displayMode")
    }

    pub fn locale(&self) -> Option<&str> {
        self.get_str("locale")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Copies every top-level member of `patch` into `target`. Non-object
/// patches are ignored.
pub fn merge_shallow(target: &mut Map<String, Value>, patch: &Value) {
    if let Some(patch) = patch.as_object() {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_last_write_wins_per_key() {
        let mut context = HostContext::default();
        context.merge(&json!({ "a": 1 }));
        context.merge(&json!({ "b": 2 }));
        assert_eq!(context.to_value(), json!({ "a": 1, "b": 2 }));

        context.merge(&json!({ "a": 3 }));
        assert_eq!(context.to_value(), json!({ "a": 3, "b": 2 }));

        context.merge(&json!("not an object"));
        assert_eq!(context.to_value(), json!({ "a": 3, "b": 2 }));
    }

    #[test]
    fn typed_readers() {
        let context = HostContext::from_value(&json!({
            "theme": "dark",
            "displayMode": "inline",
            "locale": 7
        }));
        assert_eq!(context.theme(), Some("dark"));
        assert_eq!(context.display_mode(), Some("inline"));
        assert_eq!(context.locale(), None);
        assert!(HostContext::from_value(&json!([1, 2])).as_map().is_empty());
    }
}
