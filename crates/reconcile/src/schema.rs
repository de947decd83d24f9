//! Declarative description of a resource's attributes
//!
//! A [`Schema`] maps attribute names to [`Attribute`] definitions. Nested
//! blocks carry their own schema, so every leaf is reachable by exactly one
//! dotted path. Blocks are always addressed as collections: a block with
//! `max_items = 1` is still a zero-or-one element list, which keeps paths
//! uniform (`network.0.address`) at every depth.
//!
//! # Example
//!
//! ```
//! use reconcile::schema::{Attribute, Schema, Type};
//!
//! let schema = Schema::new()
//!     .attribute("name", Attribute::required(Type::String).force_new())
//!     .attribute("size", Attribute::optional(Type::Int).default(1_i64))
//!     .attribute("address", Attribute::computed(Type::String));
//!
//! assert!(schema.check().is_ok());
//! ```

use crate::error::{SchemaError, ValidationError};
use crate::value::{Attributes, Value, join_path};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Type of an attribute
#[derive(Debug, Clone)]
pub enum Type {
    Bool,
    Int,
    Float,
    String,
    /// Ordered collection of primitives or maps
    List(Box<Type>),
    /// Unordered collection of primitives or maps
    Set(Box<Type>),
    /// String-keyed mapping of strings; only valid as a leaf
    Map,
    /// Nested record(s) with their own schema
    Block {
        schema: Box<Schema>,
        mode: NestingMode,
    },
}

/// How repeated nested blocks are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    List,
    Set,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Self::Set(Box::new(element))
    }

    /// Ordered nested blocks
    pub fn list_block(schema: Schema) -> Self {
        Self::Block {
            schema: Box::new(schema),
            mode: NestingMode::List,
        }
    }

    /// Unordered nested blocks
    pub fn set_block(schema: Schema) -> Self {
        Self::Block {
            schema: Box::new(schema),
            mode: NestingMode::Set,
        }
    }

    fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Block { .. })
    }

    /// Bring a value into the form this type stores
    ///
    /// Ints widen under float types, sets are re-canonicalized after their
    /// elements change, and block elements get their defaults. Values that do
    /// not match the type are returned unchanged for validation to report.
    pub fn normalize(&self, value: &Value) -> Value {
        match (self, value) {
            (Self::Float, Value::Int(i)) => Value::Float(*i as f64),
            (Self::List(elem), Value::List(items)) => {
                Value::list(items.iter().map(|item| elem.normalize(item)))
            }
            (Self::Set(elem), Value::Set(items)) => Value::set(items.iter().map(|item| elem.normalize(item))),
            (Self::Block { schema, mode }, Value::List(items) | Value::Set(items)) => {
                let filled = items.iter().map(|item| match item {
                    Value::Block(block) => Value::Block(schema.apply_defaults(block)),
                    other => other.clone(),
                });
                match mode {
                    NestingMode::List => Value::list(filled),
                    NestingMode::Set => Value::set(filled),
                }
            }
            _ => value.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::List(elem) => write!(f, "list of {elem}"),
            Self::Set(elem) => write!(f, "set of {elem}"),
            Self::Map => f.write_str("map"),
            Self::Block {
                mode: NestingMode::List,
                ..
            } => f.write_str("list of blocks"),
            Self::Block {
                mode: NestingMode::Set,
                ..
            } => f.write_str("set of blocks"),
        }
    }
}

/// Value rule checked during validation
#[derive(Debug, Clone)]
pub enum Rule {
    /// String must be one of the listed values
    OneOf(Vec<String>),
    /// Number must fall within the inclusive bounds
    Range { min: Option<i64>, max: Option<i64> },
    /// String must match the pattern
    Pattern(Regex),
    /// String, collection or map must not be empty
    NotEmpty,
}

impl Rule {
    pub fn one_of<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn range(min: i64, max: i64) -> Self {
        Self::Range {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Compile a pattern rule
    pub fn pattern(pattern: &str) -> Result<Self, SchemaError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| SchemaError::new("", format!("invalid pattern {pattern:?}: {e}")))
    }

    /// Check a value against the rule, returning the reason on failure
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::OneOf(allowed), Value::String(s)) => {
                if allowed.iter().any(|a| a == s) {
                    Ok(())
                } else {
                    Err(format!("expected one of [{}], got {s:?}", allowed.join(", ")))
                }
            }
            (Self::Range { min, max }, v) if v.as_float().is_some() => {
                let n = v.as_float().unwrap_or_default();
                if let Some(min) = min
                    && n < *min as f64
                {
                    return Err(format!("must be at least {min}, got {v}"));
                }
                if let Some(max) = max
                    && n > *max as f64
                {
                    return Err(format!("must be at most {max}, got {v}"));
                }
                Ok(())
            }
            (Self::Pattern(re), Value::String(s)) => {
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{s:?} does not match {}", re.as_str()))
                }
            }
            (Self::NotEmpty, v) => {
                let empty = match v {
                    Value::String(s) => s.is_empty(),
                    Value::List(items) | Value::Set(items) => items.is_empty(),
                    Value::Map(entries) => entries.is_empty(),
                    _ => false,
                };
                if empty {
                    Err("must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            (rule, v) => Err(format!("rule {rule:?} cannot apply to a {}", v.type_name())),
        }
    }
}

/// Definition of a single attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    pub ty: Type,
    /// Caller must supply a value
    pub required: bool,
    /// Caller may supply a value
    pub optional: bool,
    /// Callbacks may write a value
    pub computed: bool,
    /// Any change forces a replacement
    pub force_new: bool,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Value used when the caller omits an optional attribute
    pub default: Option<Value>,
    /// Attributes that may not be set together with this one
    pub conflicts_with: Vec<String>,
    pub rules: Vec<Rule>,
    pub description: Option<String>,
}

impl Attribute {
    fn with_flags(ty: Type, required: bool, optional: bool, computed: bool) -> Self {
        Self {
            ty,
            required,
            optional,
            computed,
            force_new: false,
            min_items: None,
            max_items: None,
            default: None,
            conflicts_with: Vec::new(),
            rules: Vec::new(),
            description: None,
        }
    }

    /// Attribute the caller must supply
    pub fn required(ty: Type) -> Self {
        Self::with_flags(ty, true, false, false)
    }

    /// Attribute the caller may supply
    pub fn optional(ty: Type) -> Self {
        Self::with_flags(ty, false, true, false)
    }

    /// Attribute only ever written by callbacks
    pub fn computed(ty: Type) -> Self {
        Self::with_flags(ty, false, false, true)
    }

    /// Let callbacks populate the value when the caller leaves it out
    pub fn with_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Written only by callbacks, never by the caller
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Attribute definitions of a resource (or of a nested block)
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Version of the persisted attribute layout
    pub version: u64,
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add an attribute definition
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Resolve the definition addressed by a dotted path
    ///
    /// Collection element segments (list indexes, set hashes, map keys)
    /// resolve to the collection's own definition.
    pub fn attribute_at(&self, path: &str) -> Option<&Attribute> {
        let mut segments = path.split('.');
        let mut current = self.attributes.get(segments.next()?)?;
        while let Some(_element) = segments.next() {
            match &current.ty {
                Type::Block { schema, .. } => match segments.next() {
                    Some(field) => current = schema.attributes.get(field)?,
                    None => return Some(current),
                },
                Type::List(_) | Type::Set(_) | Type::Map => {
                    return segments.next().is_none().then_some(current);
                }
                _ => return None,
            }
        }
        Some(current)
    }

    /// Default value for the attribute at `path`
    pub fn defaults_for(&self, path: &str) -> Option<Value> {
        self.attribute_at(path).and_then(|attr| attr.default.clone())
    }

    /// Fill in defaults for omitted attributes, recursing into blocks
    ///
    /// Supplied values are normalized to their attribute type along the way.
    pub fn apply_defaults(&self, config: &Attributes) -> Attributes {
        let mut out = config.clone();
        for (name, attr) in &self.attributes {
            match config.get(name) {
                None => {
                    if let Some(default) = &attr.default {
                        out.insert(name.clone(), attr.ty.normalize(default));
                    }
                }
                Some(value) => {
                    out.insert(name.clone(), attr.ty.normalize(value));
                }
            }
        }
        out
    }

    /// Check the schema definition for internal consistency
    pub fn check(&self) -> Result<(), SchemaError> {
        self.check_at("")
    }

    fn check_at(&self, prefix: &str) -> Result<(), SchemaError> {
        for (name, attr) in &self.attributes {
            let path = join_path(prefix, name);

            if attr.required && (attr.optional || attr.computed) {
                return Err(SchemaError::new(
                    path,
                    "required attributes cannot be optional or computed",
                ));
            }
            if !attr.required && !attr.optional && !attr.computed {
                return Err(SchemaError::new(
                    path,
                    "one of required, optional or computed must be set",
                ));
            }
            if attr.default.is_some() && (attr.required || attr.computed) {
                return Err(SchemaError::new(
                    path,
                    "only optional, non-computed attributes can have a default",
                ));
            }
            if let Some(default) = &attr.default {
                let mut errors = Vec::new();
                check_value(&path, &attr.ty, default, &mut errors);
                if let Some(e) = errors.into_iter().next() {
                    return Err(SchemaError::new(path, format!("invalid default: {}", e.reason)));
                }
            }
            if (attr.min_items.is_some() || attr.max_items.is_some()) && !attr.ty.is_collection() {
                return Err(SchemaError::new(
                    path,
                    "min_items/max_items only apply to collections",
                ));
            }
            if let (Some(min), Some(max)) = (attr.min_items, attr.max_items)
                && min > max
            {
                return Err(SchemaError::new(path, "min_items exceeds max_items"));
            }
            for other in &attr.conflicts_with {
                if !self.attributes.contains_key(other) {
                    return Err(SchemaError::new(
                        path,
                        format!("conflicts_with references unknown attribute {other:?}"),
                    ));
                }
            }
            match &attr.ty {
                Type::List(elem) | Type::Set(elem) => {
                    if matches!(
                        elem.as_ref(),
                        Type::List(_) | Type::Set(_) | Type::Block { .. }
                    ) {
                        return Err(SchemaError::new(
                            path,
                            "collection elements must be primitives or maps; use a block for nesting",
                        ));
                    }
                }
                Type::Block { schema, .. } => schema.check_at(&path)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate a configuration, returning the first violation
    pub fn validate(&self, config: &Attributes) -> Result<(), ValidationError> {
        match self.validate_all(config).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate a configuration, returning every violation
    pub fn validate_all(&self, config: &Attributes) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.validate_into("", config, &mut errors);
        errors
    }

    fn validate_into(&self, prefix: &str, config: &Attributes, errors: &mut Vec<ValidationError>) {
        for name in config.keys() {
            if !self.attributes.contains_key(name) {
                errors.push(ValidationError::new(
                    join_path(prefix, name),
                    "unsupported attribute",
                ));
            }
        }

        for (name, attr) in &self.attributes {
            let path = join_path(prefix, name);
            let Some(value) = config.get(name) else {
                if attr.required {
                    errors.push(ValidationError::new(path, "required attribute is missing"));
                }
                continue;
            };

            if attr.is_computed_only() {
                errors.push(ValidationError::new(
                    path,
                    "computed attribute cannot be set in configuration",
                ));
                continue;
            }

            for other in &attr.conflicts_with {
                if config.contains_key(other) {
                    errors.push(ValidationError::new(
                        path.clone(),
                        format!("conflicts with {other:?}"),
                    ));
                }
            }

            let before = errors.len();
            check_value(&path, &attr.ty, value, errors);
            if errors.len() > before {
                continue;
            }

            if let Some(count) = value.as_items().map(<[Value]>::len) {
                if let Some(min) = attr.min_items
                    && count < min
                {
                    errors.push(ValidationError::new(
                        path.clone(),
                        format!("requires at least {min} items, got {count}"),
                    ));
                }
                if let Some(max) = attr.max_items
                    && count > max
                {
                    errors.push(ValidationError::new(
                        path.clone(),
                        format!("allows at most {max} items, got {count}"),
                    ));
                }
            }

            for rule in &attr.rules {
                if let Err(reason) = rule.check(value) {
                    errors.push(ValidationError::new(path.clone(), reason));
                }
            }
        }
    }
}

/// Check that `value` conforms to `ty`, recursing into collections and blocks
pub(crate) fn check_value(path: &str, ty: &Type, value: &Value, errors: &mut Vec<ValidationError>) {
    match (ty, value) {
        (Type::Bool, Value::Bool(_))
        | (Type::Int, Value::Int(_))
        | (Type::Float, Value::Float(_) | Value::Int(_))
        | (Type::String, Value::String(_))
        | (Type::Map, Value::Map(_)) => {}
        (Type::List(elem), Value::List(items)) => {
            for (index, item) in items.iter().enumerate() {
                check_value(&join_path(path, &index.to_string()), elem, item, errors);
            }
        }
        (Type::Set(elem), Value::Set(items)) => {
            for item in items {
                check_value(&join_path(path, &item.set_hash()), elem, item, errors);
            }
        }
        (
            Type::Block {
                schema,
                mode: NestingMode::List,
            },
            Value::List(items),
        ) => {
            for (index, item) in items.iter().enumerate() {
                check_block(&join_path(path, &index.to_string()), schema, item, errors);
            }
        }
        (
            Type::Block {
                schema,
                mode: NestingMode::Set,
            },
            Value::Set(items),
        ) => {
            for item in items {
                check_block(&join_path(path, &item.set_hash()), schema, item, errors);
            }
        }
        (ty, value) => errors.push(ValidationError::new(
            path,
            format!("expected {ty}, got {}", value.type_name()),
        )),
    }
}

fn check_block(path: &str, schema: &Schema, value: &Value, errors: &mut Vec<ValidationError>) {
    match value {
        Value::Block(attrs) => schema.validate_into(path, attrs, errors),
        other => errors.push(ValidationError::new(
            path,
            format!("expected block, got {}", other.type_name()),
        )),
    }
}
