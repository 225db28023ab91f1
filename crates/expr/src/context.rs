//! Parameter contexts and field resolution.
//!
//! A [`Params`] map is supplied per evaluation and never mutated by it.
//! [`ResolutionMode`] decides what happens when a path does not lead
//! anywhere:
//!
//! | Situation | `Map` | `Struct` |
//! |-----------|-------|----------|
//! | key missing | absent (`Null`) | `UnknownField` |
//! | segment on a non-object | absent (`Null`) | `NotAnObject` |
//! | key holds `Null` | `Null` | `Null` |

use std::collections::HashMap;

use serde::Serialize;
use strata_core::Value;

use crate::error::{ExprError, ExprResult};
use crate::token::FieldPath;

static ABSENT: Value = Value::Null;

/// How field references are resolved against a [`Params`] context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Generic map: anything that does not resolve is absent
    #[default]
    Map,
    /// Structured object: every segment must name an existing field
    Struct,
}

/// Named parameters visible to a condition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Builder form of [`Params::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Top-level parameter by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of top-level parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a context from any serializable struct or map
    ///
    /// Field names become parameter names; nested structs become objects.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::InvalidContext` if `value` fails to serialize or
    /// does not serialize to an object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> ExprResult<Self> {
        let json = serde_json::to_value(value).map_err(|e| ExprError::InvalidContext {
            reason: e.to_string(),
        })?;
        match Value::from(json) {
            Value::Object(values) => Ok(Self { values }),
            other => Err(ExprError::InvalidContext {
                reason: format!("expected an object, got {}", other.type_name()),
            }),
        }
    }

    /// Resolve a field path under `mode`
    ///
    /// # Errors
    ///
    /// Only in `ResolutionMode::Struct`: `UnknownField` for a missing
    /// segment, `NotAnObject` for a segment on a non-object.
    pub fn resolve(&self, path: &FieldPath, mode: ResolutionMode) -> ExprResult<&Value> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next().and_then(|first| self.values.get(first)) {
            Some(value) => value,
            None => return absent_or(mode, || unknown(path)),
        };

        for segment in segments {
            current = match current {
                Value::Object(fields) => match fields.get(segment) {
                    Some(value) => value,
                    None => return absent_or(mode, || unknown(path)),
                },
                other => {
                    let found = other.type_name();
                    return absent_or(mode, || ExprError::NotAnObject {
                        path: path.to_string(),
                        found,
                    });
                }
            };
        }
        Ok(current)
    }
}

fn unknown(path: &FieldPath) -> ExprError {
    ExprError::UnknownField {
        path: path.to_string(),
    }
}

fn absent_or(mode: ResolutionMode, error: impl FnOnce() -> ExprError) -> ExprResult<&'static Value> {
    match mode {
        ResolutionMode::Map => Ok(&ABSENT),
        ResolutionMode::Struct => Err(error()),
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
