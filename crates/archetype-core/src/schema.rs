//! Declared type shapes.
//!
//! Every graph node is built from a [`Shape`]; the node kind is fixed at
//! construction and never re-inferred from the runtime value.
//!
//! Shapes serialize as `{"kind": "list", "of": {"kind": "scalar", "of": "string"}}`
//! so schemas can be shipped alongside asset files.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::path::ObjectPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "lowercase")]
pub enum Shape {
    Scalar(ScalarKind),
    /// Inline value type; always present.
    Struct(String),
    /// Nullable reference to an instance of the named type.
    Object(String),
    List(Box<Shape>),
    /// String-keyed dictionary.
    Map(Box<Shape>),
}

impl Shape {
    pub fn string() -> Self {
        Shape::Scalar(ScalarKind::String)
    }

    pub fn list_of(item: Shape) -> Self {
        Shape::List(Box::new(item))
    }

    pub fn map_of(item: Shape) -> Self {
        Shape::Map(Box::new(item))
    }

    pub fn describe(&self) -> String {
        match self {
            Shape::Scalar(ScalarKind::String) => "string".to_string(),
            Shape::Scalar(ScalarKind::Int) => "integer".to_string(),
            Shape::Scalar(ScalarKind::Float) => "number".to_string(),
            Shape::Scalar(ScalarKind::Bool) => "boolean".to_string(),
            Shape::Struct(t) => format!("struct {t}"),
            Shape::Object(t) => format!("object {t} or null"),
            Shape::List(item) => format!("list of {}", item.describe()),
            Shape::Map(item) => format!("map of {}", item.describe()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDef {
    pub name: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new() }
    }

    pub fn member(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.members.push(MemberDef { name: name.into(), shape });
        self
    }

    pub fn find(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    types: IndexMap<String, TypeDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, def: TypeDef) -> Self {
        self.register(def);
        self
    }

    pub fn register(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Result<&TypeDef> {
        self.types.get(name).ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Default value of a shape: empty strings, zeroes, empty containers,
    /// null references and structs filled with member defaults.
    pub fn default_value(&self, shape: &Shape) -> Result<Value> {
        Ok(match shape {
            Shape::Scalar(ScalarKind::String) => Value::String(String::new()),
            Shape::Scalar(ScalarKind::Int) => Value::from(0i64),
            Shape::Scalar(ScalarKind::Float) => Value::from(0.0f64),
            Shape::Scalar(ScalarKind::Bool) => Value::Bool(false),
            Shape::Struct(t) => self.default_instance(t)?,
            Shape::Object(t) => {
                self.get(t)?;
                Value::Null
            }
            Shape::List(_) => Value::Array(Vec::new()),
            Shape::Map(_) => Value::Object(Map::new()),
        })
    }

    pub fn default_instance(&self, type_name: &str) -> Result<Value> {
        let def = self.get(type_name)?;
        let mut map = Map::new();
        for m in &def.members {
            map.insert(m.name.clone(), self.default_value(&m.shape)?);
        }
        Ok(Value::Object(map))
    }

    /// Checks `value` against `shape` without building anything.
    pub fn check(&self, shape: &Shape, value: &Value, path: &ObjectPath) -> Result<()> {
        let mismatch = || Error::TypeMismatch { path: path.clone(), expected: shape.describe() };
        match (shape, value) {
            (Shape::Scalar(kind), v) => {
                normalize_scalar(*kind, v).ok_or_else(mismatch)?;
            }
            (Shape::Object(_), Value::Null) => {}
            (Shape::Struct(t) | Shape::Object(t), Value::Object(fields)) => {
                let def = self.get(t)?;
                for (name, field) in fields {
                    let member = def.find(name).ok_or_else(|| Error::UnknownMember {
                        type_name: t.clone(),
                        member: name.clone(),
                    })?;
                    self.check(&member.shape, field, &path.member(name.as_str()))?;
                }
            }
            (Shape::List(item), Value::Array(items)) => {
                for v in items {
                    self.check(item, v, path)?;
                }
            }
            (Shape::Map(item), Value::Object(entries)) => {
                for v in entries.values() {
                    self.check(item, v, path)?;
                }
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

impl FromIterator<TypeDef> for Schema {
    fn from_iter<I: IntoIterator<Item = TypeDef>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for def in iter {
            schema.register(def);
        }
        schema
    }
}

/// Canonical stored form of a scalar, or `None` when it does not fit.
///
/// Strings are nullable; floats are always stored as `f64` numbers so that
/// `1` and `1.0` compare equal after a round trip.
pub fn normalize_scalar(kind: ScalarKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (ScalarKind::String, Value::String(_) | Value::Null) => Some(value.clone()),
        (ScalarKind::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            n.as_i64().map(Value::from)
        }
        (ScalarKind::Float, Value::Number(n)) => {
            n.as_f64().and_then(Number::from_f64).map(Value::Number)
        }
        (ScalarKind::Bool, Value::Bool(_)) => Some(value.clone()),
        _ => None,
    }
}
