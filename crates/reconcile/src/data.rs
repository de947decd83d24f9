//! Working set handed to operation callbacks

use crate::convert;
use crate::diff::{AttributeChange, Diff};
use crate::error::{ConvertError, ValidationError};
use crate::schema::{Schema, check_value};
use crate::state::State;
use crate::value::{Attributes, Value};
use std::collections::BTreeMap;

/// Resource data visible to a callback during one invocation
///
/// Reads resolve in this order: values the callback wrote, then the
/// configuration (with defaults), then the prior durable state. Whatever the
/// callback leaves here when it returns is what the orchestrator considers
/// for persistence, whether or not the callback failed.
#[derive(Debug)]
pub struct ResourceData<'a> {
    schema: &'a Schema,
    id: String,
    prior: Attributes,
    config: Option<Attributes>,
    diff: Diff,
    /// `None` marks an attribute the callback cleared
    written: BTreeMap<String, Option<Value>>,
}

impl<'a> ResourceData<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        prior: &State,
        config: Option<&Attributes>,
        diff: Diff,
    ) -> Self {
        Self {
            schema,
            id: prior.id.clone(),
            prior: prior.attributes.clone(),
            config: config.map(|c| schema.apply_defaults(c)),
            diff,
            written: BTreeMap::new(),
        }
    }

    /// Data for Read and Delete, which only see durable state
    pub(crate) fn from_state(schema: &'a Schema, prior: &State) -> Self {
        Self::new(schema, prior, None, Diff::empty())
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Upstream identifier; empty while the resource does not exist
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record the upstream identifier
    ///
    /// Create must set this as soon as the upstream object exists, before
    /// any further call that might fail.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Signal that the resource no longer exists upstream
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    pub fn has_change(&self, path: &str) -> bool {
        self.diff.has_change(path)
    }

    pub fn change(&self, path: &str) -> Option<&AttributeChange> {
        self.diff.change(path)
    }

    /// Durable attributes from before this invocation
    pub fn prior(&self) -> &Attributes {
        &self.prior
    }

    /// Desired configuration with defaults applied
    pub fn config(&self) -> Option<&Attributes> {
        self.config.as_ref()
    }

    /// Current value of a top-level attribute
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(written) = self.written.get(name) {
            return written.as_ref();
        }
        self.desired(name)
    }

    /// Current value at a dotted path
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let name = path.split('.').next().unwrap_or(path);
        let value = self.get(name)?;
        Attributes::new().with(name, value.clone()).get_path(path)
    }

    /// Current string value of a top-level attribute
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Write an attribute value, checked against the schema
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        let attr = self
            .schema
            .get(name)
            .ok_or_else(|| ValidationError::new(name, "unsupported attribute"))?;
        let value = attr.ty.normalize(&value.into());

        let mut errors = Vec::new();
        check_value(name, &attr.ty, &value, &mut errors);
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        if attr.optional
            && attr.computed
            && let Some(configured) = self.config.as_ref().and_then(|c| c.get(name))
            && *configured != value
        {
            // Upstream has the final say; the next diff reports the drift
            log::debug!("{name}: callback wrote {value}, overriding configured {configured}");
        }

        self.written.insert(name.to_string(), Some(value));
        Ok(())
    }

    /// Clear an attribute, e.g. because upstream no longer reports it
    pub fn unset(&mut self, name: &str) {
        self.written.insert(name.to_string(), None);
    }

    /// Write every attribute found in a native upstream object
    ///
    /// This is the usual tail of a Read: fetch the upstream object, then
    /// project it onto the schema.
    pub fn set_from_native(&mut self, native: &serde_json::Value) -> Result<(), ConvertError> {
        let flattened = convert::flatten(native, self.schema)?;
        for (name, value) in flattened {
            self.written.insert(name, Some(value));
        }
        Ok(())
    }

    /// Native object for the current attributes, e.g. a request body
    pub fn to_native(&self) -> serde_json::Value {
        convert::expand(&self.merged(), self.schema)
    }

    /// All current attribute values
    ///
    /// Starts from prior state, applies the configuration (dropping
    /// configurable attributes the caller removed), then what the callback
    /// wrote.
    pub fn merged(&self) -> Attributes {
        let mut merged = Attributes::new();
        for (name, _) in self.schema.iter() {
            if let Some(value) = self.desired(name) {
                merged.insert(name.clone(), value.clone());
            }
        }
        for (name, written) in &self.written {
            match written {
                Some(value) => {
                    merged.insert(name.clone(), value.clone());
                }
                None => {
                    merged.remove(name);
                }
            }
        }
        merged
    }

    /// Value from configuration or prior state, ignoring callback writes
    fn desired(&self, name: &str) -> Option<&Value> {
        let Some(config) = &self.config else {
            return self.prior.get(name);
        };
        let Some(attr) = self.schema.get(name) else {
            return self.prior.get(name);
        };
        if attr.is_computed_only() {
            return self.prior.get(name);
        }
        match config.get(name) {
            Some(value) => Some(value),
            None if attr.computed => self.prior.get(name),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff;
    use crate::schema::{Attribute, Type};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .attribute("address", Attribute::required(Type::String))
            .attribute("size", Attribute::optional(Type::String).default("small"))
            .attribute("tags", Attribute::optional(Type::Map))
            .attribute("zone", Attribute::optional(Type::String).with_computed())
            .attribute("public_ip", Attribute::computed(Type::String))
            .attribute("ports", Attribute::optional(Type::set(Type::Int)))
    }

    fn prior() -> State {
        State::new(
            "i-1",
            Attributes::new()
                .with("address", "10.0.0.1")
                .with("size", "small")
                .with("tags", Value::map([("env", "prod")]))
                .with("zone", "eu-1")
                .with("public_ip", "203.0.113.7"),
        )
    }

    #[test]
    fn test_resolution_order() {
        let schema = schema();
        let config = Attributes::new().with("address", "10.0.0.2");
        let prior = prior();
        let diff = diff::compute(&schema, Some(&config), &prior);
        let mut data = ResourceData::new(&schema, &prior, Some(&config), diff);

        // config wins over prior
        assert_eq!(data.get_str("address"), Some("10.0.0.2"));
        // default from schema
        assert_eq!(data.get_str("size"), Some("small"));
        // optional+computed omitted from config keeps prior
        assert_eq!(data.get_str("zone"), Some("eu-1"));
        // computed keeps prior until written
        assert_eq!(data.get_str("public_ip"), Some("203.0.113.7"));
        // optional attribute dropped from config is gone
        assert_eq!(data.get("tags"), None);

        data.set("public_ip", "198.51.100.1").unwrap();
        assert_eq!(data.get_str("public_ip"), Some("198.51.100.1"));
        assert!(data.has_change("address"));
        assert!(!data.has_change("size"));
    }

    #[test]
    fn test_set_checks_schema() {
        let schema = schema();
        let mut data = ResourceData::from_state(&schema, &prior());
        assert!(data.set("nope", "x").is_err());
        let err = data.set("address", 5_i64).unwrap_err();
        assert_eq!(err.path, "address");
    }

    #[test]
    fn test_set_canonicalizes_sets() {
        let schema = schema();
        let mut data = ResourceData::from_state(&schema, &prior());
        data.set("ports", Value::Set(vec![Value::Int(443), Value::Int(80)]))
            .unwrap();
        assert_eq!(
            data.get("ports"),
            Some(&Value::Set(vec![Value::Int(443), Value::Int(80)]))
        );
        assert_eq!(
            data.merged().get("ports").unwrap().canonical_key(),
            Value::set(vec![Value::Int(80), Value::Int(443)]).canonical_key()
        );
    }

    #[test]
    fn test_set_widens_ints_under_float() {
        let schema = Schema::new().attribute("weight", Attribute::optional(Type::Float));
        let mut data = ResourceData::from_state(&schema, &State::absent());
        data.set("weight", 3_i64).unwrap();
        assert!(matches!(data.get("weight"), Some(Value::Float(w)) if *w == 3.0));
    }

    #[test]
    fn test_callback_write_wins_over_configured_computed() {
        let schema = schema();
        let config = Attributes::new().with("address", "10.0.0.1").with("zone", "us-2");
        let prior = prior();
        let diff = diff::compute(&schema, Some(&config), &prior);
        let mut data = ResourceData::new(&schema, &prior, Some(&config), diff);

        assert_eq!(data.get_str("zone"), Some("us-2"));
        data.set("zone", "us-2b").unwrap();
        assert_eq!(data.get_str("zone"), Some("us-2b"));
        assert_eq!(data.merged().get("zone"), Some(&Value::from("us-2b")));
    }

    #[test]
    fn test_unset_removes_from_merged() {
        let schema = schema();
        let mut data = ResourceData::from_state(&schema, &prior());
        data.unset("tags");
        assert_eq!(data.get("tags"), None);
        assert!(!data.merged().contains_key("tags"));
        assert!(data.merged().contains_key("address"));
    }

    #[test]
    fn test_native_helpers() {
        let schema = schema();
        let mut data = ResourceData::from_state(&schema, &prior());
        data.set_from_native(&json!({"address": "10.9.9.9", "public_ip": "192.0.2.1", "extra": 1}))
            .unwrap();
        assert_eq!(data.get_str("address"), Some("10.9.9.9"));
        assert_eq!(data.get_str("public_ip"), Some("192.0.2.1"));

        let native = data.to_native();
        assert_eq!(native["address"], "10.9.9.9");
        assert_eq!(native["tags"]["env"], "prod");
        assert!(native.get("extra").is_none());
    }

    #[test]
    fn test_get_path() {
        let schema = schema();
        let data = ResourceData::from_state(&schema, &prior());
        assert_eq!(data.get_path("tags.env"), Some(Value::from("prod")));
        assert_eq!(data.get_path("tags.team"), None);
    }

    #[test]
    fn test_id_lifecycle() {
        let schema = schema();
        let mut data = ResourceData::new(&schema, &State::absent(), None, Diff::empty());
        assert_eq!(data.id(), "");
        data.set_id("i-9");
        assert_eq!(data.id(), "i-9");
        data.clear_id();
        assert!(data.id().is_empty());
    }
}
