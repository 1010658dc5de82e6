use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A reference to an attribute, either a plain (legacy) name or a `/`-delimited
/// path into nested attribute values, using `~1`/`~0` escapes the way JSON
/// Pointer does. Historical producers sometimes emit a top-level attribute
/// literally named with slashes; those are only reachable via the plain form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeRef {
    Literal(String),
    Path(Vec<String>),
}

impl AttributeRef {
    pub fn new(raw: &str) -> AttributeRef {
        if let Some(rest) = raw.strip_prefix('/') {
            let segments = rest
                .split('/')
                .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
                .collect();
            AttributeRef::Path(segments)
        } else {
            AttributeRef::Literal(raw.to_string())
        }
    }

    pub fn as_raw(&self) -> String {
        match self {
            AttributeRef::Literal(s) => s.clone(),
            AttributeRef::Path(segs) => {
                let escaped: Vec<String> = segs
                    .iter()
                    .map(|s| s.replace('~', "~0").replace('/', "~1"))
                    .collect();
                format!("/{}", escaped.join("/"))
            }
        }
    }
}

impl Serialize for AttributeRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_raw())
    }
}

impl<'de> Deserialize<'de> for AttributeRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(AttributeRef::new(&raw))
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_raw())
    }
}

pub const DEFAULT_KIND: &str = "user";

/// A single-kind evaluation context. Contexts with an empty key are invalid;
/// callers must check [`Context::is_valid`] (the evaluator does this itself
/// and returns `USER_NOT_SPECIFIED` for an invalid context).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub anonymous: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_attributes: Vec<AttributeRef>,
    /// Deprecated: historical "secondary" bucketing key, preserved for
    /// deserialization of old payloads. New producers should not set this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

impl Context {
    pub fn new(key: impl Into<String>) -> Context {
        Context {
            kind: DEFAULT_KIND.to_string(),
            key: key.into(),
            name: None,
            anonymous: false,
            attributes: BTreeMap::new(),
            private_attributes: Vec::new(),
            secondary: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Context {
        self.kind = kind.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Context {
        self.name = Some(name.into());
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Context {
        self.anonymous = anonymous;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Context {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Context {
        self.secondary = Some(secondary.into());
        self
    }

    /// A context is valid iff its key is non-empty and its kind is a
    /// non-empty identifier other than the reserved `"multi"`.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && !self.kind.is_empty() && self.kind != "multi"
    }

    /// Resolves a builtin or custom attribute. Returns `None` for a missing
    /// attribute (clause evaluation treats that as "no match", not an error).
    pub fn get(&self, attr: &AttributeRef) -> Option<Value> {
        match attr {
            AttributeRef::Literal(name) => self.get_named(name),
            AttributeRef::Path(segments) => {
                if segments.is_empty() {
                    return None;
                }
                let mut current = self.get_named(&segments[0])?;
                for seg in &segments[1..] {
                    current = index_value(&current, seg)?;
                }
                Some(current)
            }
        }
    }

    fn get_named(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(Value::from_str(self.key.clone())),
            "kind" => Some(Value::from_str(self.kind.clone())),
            "name" => self.name.clone().map(Value::from_str),
            "anonymous" => Some(Value::from_bool(self.anonymous)),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// The value used for bucketing when no explicit `bucket_by` attribute
    /// resolves: the context key, with the deprecated secondary key appended.
    pub fn bucketing_key_default(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("{}.{}", self.key, secondary),
            None => self.key.clone(),
        }
    }
}

fn index_value(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}

/// A set of contexts keyed by distinct kinds. A single-kind `Context` is
/// represented as a multi-context with exactly one entry during evaluation;
/// evaluator/clause code looks up a context by `context_kind` through this.
#[derive(Clone, Debug, Default)]
pub struct MultiContext {
    by_kind: BTreeMap<String, Context>,
}

impl MultiContext {
    pub fn single(context: Context) -> MultiContext {
        let mut by_kind = BTreeMap::new();
        by_kind.insert(context.kind.clone(), context);
        MultiContext { by_kind }
    }

    pub fn from_contexts(contexts: Vec<Context>) -> MultiContext {
        let mut by_kind = BTreeMap::new();
        for c in contexts {
            by_kind.insert(c.kind.clone(), c);
        }
        MultiContext { by_kind }
    }

    pub fn get(&self, kind: &str) -> Option<&Context> {
        self.by_kind.get(kind)
    }

    /// The default context for single-kind lookups (clauses/targets without
    /// an explicit `context_kind` apply to the `"user"` context, falling
    /// back to the sole context when there is exactly one).
    pub fn default_context(&self) -> Option<&Context> {
        self.by_kind
            .get(DEFAULT_KIND)
            .or_else(|| (self.by_kind.len() == 1).then(|| self.by_kind.values().next()).flatten())
    }

    pub fn is_valid(&self) -> bool {
        !self.by_kind.is_empty() && self.by_kind.values().all(Context::is_valid)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.by_kind.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.by_kind.values()
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl From<Context> for MultiContext {
    fn from(context: Context) -> Self {
        MultiContext::single(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_invalid() {
        let ctx = Context::new("");
        assert!(!ctx.is_valid());
    }

    #[test]
    fn builtin_attributes_resolve() {
        let ctx = Context::new("user-1").with_name("Alice").with_anonymous(true);
        assert_eq!(ctx.get(&AttributeRef::new("key")), Some(Value::from_str("user-1")));
        assert_eq!(ctx.get(&AttributeRef::new("name")), Some(Value::from_str("Alice")));
        assert_eq!(ctx.get(&AttributeRef::new("anonymous")), Some(Value::from_bool(true)));
    }

    #[test]
    fn missing_attribute_is_none() {
        let ctx = Context::new("user-1");
        assert_eq!(ctx.get(&AttributeRef::new("missing")), None);
    }

    #[test]
    fn path_attribute_indexes_nested_object() {
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), Value::from_str("NYC"));
        let ctx = Context::new("user-1").with_attribute("address", Value::Object(address));
        assert_eq!(
            ctx.get(&AttributeRef::new("/address/city")),
            Some(Value::from_str("NYC"))
        );
    }

    #[test]
    fn multi_context_default_falls_back_to_sole_kind() {
        let ctx = Context::new("device-1").with_kind("device");
        let multi = MultiContext::single(ctx);
        assert!(multi.default_context().is_some());
        assert_eq!(multi.default_context().unwrap().kind, "device");
    }
}
