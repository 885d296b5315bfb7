//! Typed, named parameter slots and ordered parameter sets.
//!
//! Every process owns one input set and one output set. Parameters are
//! declared once at construction, written by the caller (or by orchestration
//! connections) before execution, and locked while the owner runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::{Value, ValueType};

/// Lifecycle phase of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPhase {
    /// Declared, not yet used by a running process
    #[default]
    Init,

    /// Has been locked for execution at least once
    Runtime,
}

/// Parameter-level errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("Parameter '{name}' expects type {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        actual: &'static str,
    },

    #[error("Parameter '{name}' is locked and cannot be modified")]
    Locked { name: String },

    #[error("Required parameter '{name}' is not set")]
    MissingRequiredValue { name: String },

    #[error("Parameter '{name}' not found")]
    UnknownParameter { name: String },
}

/// A typed value slot
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    declared_type: ValueType,
    required: bool,
    description: String,
    value: Option<Value>,
    locked: bool,
    phase: ParameterPhase,
}

impl Parameter {
    /// Declare a required parameter
    pub fn new(name: impl Into<String>, declared_type: ValueType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            required: true,
            description: String::new(),
            value: None,
            locked: false,
            phase: ParameterPhase::Init,
        }
    }

    /// Mark the parameter as optional (null is a valid value)
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Initial value. Not type-checked, the declaration is trusted.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &ValueType {
        &self.declared_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn phase(&self) -> ParameterPhase {
        self.phase
    }

    /// Write a value (or clear it with `None`).
    ///
    /// Fails if the parameter is locked, or if the value does not satisfy the
    /// declared type. A rejected write leaves the stored value untouched.
    pub fn set_value(&mut self, value: Option<Value>) -> Result<(), ParameterError> {
        if self.locked {
            return Err(ParameterError::Locked {
                name: self.name.clone(),
            });
        }
        self.assign(value)
    }

    pub fn set(&mut self, value: impl Into<Value>) -> Result<(), ParameterError> {
        self.set_value(Some(value.into()))
    }

    pub fn clear(&mut self) -> Result<(), ParameterError> {
        self.set_value(None)
    }

    /// Type-checked write that ignores the lock.
    ///
    /// Used by connection resolution, which must be able to feed inputs of
    /// processes regardless of their lock state.
    pub(crate) fn assign(&mut self, value: Option<Value>) -> Result<(), ParameterError> {
        match value {
            None if !self.required => {
                self.value = None;
                Ok(())
            }
            None => Err(ParameterError::TypeMismatch {
                name: self.name.clone(),
                expected: self.declared_type.clone(),
                actual: "null",
            }),
            Some(value) if self.declared_type.accepts(&value) => {
                self.value = Some(value);
                Ok(())
            }
            Some(value) => Err(ParameterError::TypeMismatch {
                name: self.name.clone(),
                expected: self.declared_type.clone(),
                actual: value.type_name(),
            }),
        }
    }

    /// Check that a required parameter has a value
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.required && self.value.is_none() {
            return Err(ParameterError::MissingRequiredValue {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn lock(&mut self) {
        self.locked = true;
        self.phase = ParameterPhase::Runtime;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            name: self.name.clone(),
            declared_type: self.declared_type.to_string(),
            value: self.value.clone(),
            required: self.required,
            description: self.description.clone(),
            phase: self.phase,
            locked: self.locked,
        }
    }
}

/// Serializable view of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub name: String,

    #[serde(rename = "type")]
    pub declared_type: String,

    pub value: Option<Value>,

    pub required: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub phase: ParameterPhase,

    pub locked: bool,
}

/// Ordered, name-keyed collection of parameters
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. A parameter with the same name is replaced in place.
    pub fn add(&mut self, parameter: Parameter) -> &mut Self {
        if let Some(existing) = self
            .parameters
            .iter_mut()
            .find(|p| p.name == parameter.name)
        {
            *existing = parameter;
        } else {
            self.parameters.push(parameter);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Caller write by name (lock and type checked)
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ParameterError> {
        self.lookup_mut(name)?.set(value)
    }

    pub fn clear(&mut self, name: &str) -> Result<(), ParameterError> {
        self.lookup_mut(name)?.clear()
    }

    /// The current value of `name`; unset counts as missing
    pub fn value(&self, name: &str) -> Result<&Value, ParameterError> {
        self.lookup(name)?
            .value()
            .ok_or_else(|| ParameterError::MissingRequiredValue {
                name: name.to_string(),
            })
    }

    pub fn bool(&self, name: &str) -> Result<bool, ParameterError> {
        let value = self.value(name)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(name, ValueType::Bool, value))
    }

    pub fn int(&self, name: &str) -> Result<i64, ParameterError> {
        let value = self.value(name)?;
        value
            .as_int()
            .ok_or_else(|| mismatch(name, ValueType::Int, value))
    }

    /// Numeric value as float; ints are widened
    pub fn float(&self, name: &str) -> Result<f64, ParameterError> {
        let value = self.value(name)?;
        value
            .as_float()
            .ok_or_else(|| mismatch(name, ValueType::Float, value))
    }

    pub fn str(&self, name: &str) -> Result<&str, ParameterError> {
        let value = self.value(name)?;
        value
            .as_str()
            .ok_or_else(|| mismatch(name, ValueType::Str, value))
    }

    pub fn list(&self, name: &str) -> Result<&[Value], ParameterError> {
        let value = self.value(name)?;
        value
            .as_list()
            .ok_or_else(|| mismatch(name, ValueType::list(), value))
    }

    pub fn map(&self, name: &str) -> Result<&BTreeMap<String, Value>, ParameterError> {
        let value = self.value(name)?;
        value
            .as_map()
            .ok_or_else(|| mismatch(name, ValueType::map(), value))
    }

    /// Validate every member, surfacing the first failure
    pub fn validate_all(&self) -> Result<(), ParameterError> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    pub fn lock_all(&mut self) {
        self.parameters.iter_mut().for_each(Parameter::lock);
    }

    pub fn unlock_all(&mut self) {
        self.parameters.iter_mut().for_each(Parameter::unlock);
    }

    pub fn snapshot(&self) -> Vec<ParameterSnapshot> {
        self.parameters.iter().map(Parameter::snapshot).collect()
    }

    fn lookup(&self, name: &str) -> Result<&Parameter, ParameterError> {
        self.get(name)
            .ok_or_else(|| ParameterError::UnknownParameter {
                name: name.to_string(),
            })
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Parameter, ParameterError> {
        self.get_mut(name)
            .ok_or_else(|| ParameterError::UnknownParameter {
                name: name.to_string(),
            })
    }
}

fn mismatch(name: &str, expected: ValueType, actual: &Value) -> ParameterError {
    ParameterError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_is_rejected_and_value_kept() {
        let mut param = Parameter::new("user_id", ValueType::Int);
        param.set(123).unwrap();

        let err = param.set("abc").unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { actual: "str", .. }));
        assert_eq!(param.value(), Some(&Value::Int(123)));
    }

    #[test]
    fn test_null_handling_depends_on_required() {
        let mut required = Parameter::new("a", ValueType::Int);
        assert!(matches!(
            required.clear(),
            Err(ParameterError::TypeMismatch { actual: "null", .. })
        ));

        let mut optional = Parameter::new("b", ValueType::Int).optional();
        optional.set(1).unwrap();
        optional.clear().unwrap();
        assert!(!optional.is_set());
    }

    #[test]
    fn test_validate() {
        let required = Parameter::new("a", ValueType::Str);
        assert_eq!(
            required.validate(),
            Err(ParameterError::MissingRequiredValue {
                name: "a".to_string()
            })
        );

        let optional = Parameter::new("b", ValueType::Str).optional();
        assert!(optional.validate().is_ok());
    }

    #[test]
    fn test_lock_blocks_writes_and_advances_phase() {
        let mut param = Parameter::new("a", ValueType::Int);
        assert_eq!(param.phase(), ParameterPhase::Init);

        param.lock();
        assert_eq!(param.phase(), ParameterPhase::Runtime);
        assert!(matches!(param.set(1), Err(ParameterError::Locked { .. })));
        assert!(!param.is_set());

        param.unlock();
        param.set(1).unwrap();
        assert_eq!(param.phase(), ParameterPhase::Runtime);
    }

    #[test]
    fn test_assign_ignores_lock_but_not_type() {
        let mut param = Parameter::new("a", ValueType::Int);
        param.lock();

        param.assign(Some(Value::Int(5))).unwrap();
        assert_eq!(param.value(), Some(&Value::Int(5)));
        assert!(param.assign(Some(Value::from("x"))).is_err());
    }

    #[test]
    fn test_set_preserves_order_and_replaces_in_place() {
        let mut set = ParameterSet::new();
        set.add(Parameter::new("b", ValueType::Int))
            .add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Str).optional());

        assert_eq!(set.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.get("b").unwrap().declared_type(), &ValueType::Str);
    }

    #[test]
    fn test_set_level_operations() {
        let mut set = ParameterSet::new();
        set.add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Float).optional());

        assert!(matches!(
            set.validate_all(),
            Err(ParameterError::MissingRequiredValue { .. })
        ));
        assert!(matches!(
            set.set("missing", 1),
            Err(ParameterError::UnknownParameter { .. })
        ));

        set.set("a", 2).unwrap();
        set.validate_all().unwrap();
        assert_eq!(set.int("a").unwrap(), 2);
        assert_eq!(set.float("a").unwrap(), 2.0);
        assert!(set.str("a").is_err());

        set.lock_all();
        assert!(set.iter().all(Parameter::is_locked));
        set.unlock_all();
        assert!(set.iter().all(|p| !p.is_locked()));
    }

    #[test]
    fn test_snapshot_serialization() {
        let mut param = Parameter::new("data", ValueType::list_of(ValueType::Int))
            .with_description("Loaded data");
        param.set(vec![1, 2]).unwrap();

        let json = serde_json::to_value(param.snapshot()).unwrap();
        assert_eq!(json["type"], "list[int]");
        assert_eq!(json["value"], serde_json::json!([1, 2]));
        assert_eq!(json["phase"], "init");
    }
}
