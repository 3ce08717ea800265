use crate::document::Document;
use crate::error::Result;
use crate::property::Func;
use crate::registry::Model;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub type VirtualGetter = Func<dyn Fn(&Document) -> Value + Send + Sync>;
pub type VirtualSetter = Func<dyn Fn(&mut Document, Value) + Send + Sync>;
pub type PreHook = Func<dyn Fn(&mut Document) -> Result<()> + Send + Sync>;
pub type PostHook = Func<dyn Fn(&Document) + Send + Sync>;
pub type Method = Func<dyn Fn(&mut Document, &[Value]) -> Result<Value> + Send + Sync>;
pub type Static = Func<dyn Fn(&Model, &[Value]) -> Result<Value> + Send + Sync>;

/// A computed, non-persisted property.
#[derive(Debug, Clone, Default)]
pub struct Virtual {
    pub get: Option<VirtualGetter>,
    pub set: Option<VirtualSetter>,
}

impl Virtual {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Virtual {
            get: Some(Func::new(Arc::new(f))),
            set: None,
        }
    }

    pub fn with_setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Document, Value) + Send + Sync + 'static,
    {
        self.set = Some(Func::new(Arc::new(f)));
        self
    }

    fn is_empty(&self) -> bool {
        self.get.is_none() && self.set.is_none()
    }
}

/// Hooks bound to one lifecycle trigger.
#[derive(Debug, Clone, Default)]
pub struct Middleware {
    pub pre: Option<PreHook>,
    pub post: Option<PostHook>,
}

impl Middleware {
    pub(crate) fn is_empty(&self) -> bool {
        self.pre.is_none() && self.post.is_none()
    }
}

/// Lifecycle points at which middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    Validate,
    Save,
    Remove,
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "validate" => Ok(Trigger::Validate),
            "save" => Ok(Trigger::Save),
            "remove" => Ok(Trigger::Remove),
            other => Err(format!("unknown lifecycle trigger `{other}`")),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Validate => f.write_str("validate"),
            Trigger::Save => f.write_str("save"),
            Trigger::Remove => f.write_str("remove"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexOrder {
    #[default]
    Ascending,
    Descending,
}

/// A (possibly compound) index over top-level paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSpec {
    pub fields: Vec<(String, IndexOrder)>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    /// Ascending index over `paths`.
    pub fn on<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexSpec {
            fields: paths
                .into_iter()
                .map(|p| (p.into(), IndexOrder::Ascending))
                .collect(),
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(path, _)| path.as_str())
    }

    pub fn label(&self) -> String {
        self.paths().collect::<Vec<_>>().join(", ")
    }
}

/// Cross-field configuration supplied at registration.
///
/// Methods and statics accumulate per key: defining a key twice keeps the
/// later definition and leaves the other keys alone.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    pub index: Vec<IndexSpec>,
    pub virtuals: BTreeMap<String, Virtual>,
    pub middleware: BTreeMap<String, Middleware>,
    pub methods: BTreeMap<String, Method>,
    pub statics: BTreeMap<String, Static>,
    /// Discard values for undeclared paths. Defaults to true.
    pub strict: Option<bool>,
    /// Collection name; defaults to the pluralized, lowercase model name.
    pub collection: Option<String>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.index.push(spec);
        self
    }

    pub fn virtual_field(mut self, name: impl Into<String>, virtual_: Virtual) -> Self {
        self.virtuals.insert(name.into(), virtual_);
        self
    }

    pub fn virtual_get<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        self.virtual_field(name, Virtual::getter(f))
    }

    /// Bind a before-hook to `trigger` (`validate`, `save`, or `remove`).
    pub fn pre<F>(mut self, trigger: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Document) -> Result<()> + Send + Sync + 'static,
    {
        self.middleware.entry(trigger.into()).or_default().pre = Some(Func::new(Arc::new(f)));
        self
    }

    /// Bind an after-hook to `trigger`.
    pub fn post<F>(mut self, trigger: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document) + Send + Sync + 'static,
    {
        self.middleware.entry(trigger.into()).or_default().post = Some(Func::new(Arc::new(f)));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Document, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Func::new(Arc::new(f)));
        self
    }

    pub fn static_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Model, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.statics.insert(name.into(), Func::new(Arc::new(f)));
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Fold `other` into this bundle, key by key.
    pub fn merge(mut self, other: SchemaOptions) -> Self {
        self.index.extend(other.index);
        self.virtuals.extend(other.virtuals);
        for (trigger, hooks) in other.middleware {
            let entry = self.middleware.entry(trigger).or_default();
            if hooks.pre.is_some() {
                entry.pre = hooks.pre;
            }
            if hooks.post.is_some() {
                entry.post = hooks.post;
            }
        }
        self.methods.extend(other.methods);
        self.statics.extend(other.statics);
        if other.strict.is_some() {
            self.strict = other.strict;
        }
        if other.collection.is_some() {
            self.collection = other.collection;
        }
        self
    }

    /// Drop virtual entries with no accessor; they bind nothing.
    pub(crate) fn bound_virtuals(&self) -> BTreeMap<String, Virtual> {
        self.virtuals
            .iter()
            .filter(|(name, v)| {
                if v.is_empty() {
                    log::debug!("Ignoring virtual '{name}': no getter or setter");
                    false
                } else {
                    true
                }
            })
            .map(|(name, v)| (name.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_parse() {
        assert_eq!("save".parse::<Trigger>(), Ok(Trigger::Save));
        assert_eq!("validate".parse::<Trigger>(), Ok(Trigger::Validate));
        assert!("init".parse::<Trigger>().is_err());
        assert_eq!(Trigger::Remove.to_string(), "remove");
    }

    #[test]
    fn test_methods_merge_per_key() {
        let base = SchemaOptions::new()
            .method("a", |_, _| Ok(Value::from(1)))
            .method("b", |_, _| Ok(Value::from(2)));
        let merged = base.merge(
            SchemaOptions::new()
                .method("b", |_, _| Ok(Value::from(3)))
                .static_fn("s", |_, _| Ok(Value::Null)),
        );
        assert_eq!(merged.methods.len(), 2);
        assert_eq!(merged.statics.len(), 1);
    }

    #[test]
    fn test_pre_and_post_share_an_entry() {
        let options = SchemaOptions::new()
            .pre("save", |_| Ok(()))
            .post("save", |_| {});
        let hooks = &options.middleware["save"];
        assert!(hooks.pre.is_some());
        assert!(hooks.post.is_some());
    }

    #[test]
    fn test_empty_virtuals_are_not_bound() {
        let options = SchemaOptions::new()
            .virtual_field("nothing", Virtual::default())
            .virtual_get("label", |_| Value::from("x"));
        let bound = options.bound_virtuals();
        assert_eq!(bound.len(), 1);
        assert!(bound.contains_key("label"));
    }

    #[test]
    fn test_index_spec() {
        let spec = IndexSpec::on(["email", "nickname"]).unique(true);
        assert_eq!(spec.label(), "email, nickname");
        assert!(spec.unique);
        assert!(!spec.sparse);
    }
}
