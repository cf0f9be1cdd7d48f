//! Typed key → value configuration store polled by every operator.
//!
//! Each operator pulls the keys it recognizes in `poll_for_parameters`;
//! missing keys fall back to documented defaults and are logged as such,
//! while a present key of the wrong type is a fatal configuration error.

use std::collections::HashMap;

use crate::error::ConfigError;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Size(usize),
    Real(f64),
    Str(String),
    RealVec(Vec<f64>),
    IntVec(Vec<i64>),
    StrVec(Vec<String>),
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Int(_) => "int",
            ParameterValue::Size(_) => "size",
            ParameterValue::Real(_) => "real",
            ParameterValue::Str(_) => "string",
            ParameterValue::RealVec(_) => "real list",
            ParameterValue::IntVec(_) => "int list",
            ParameterValue::StrVec(_) => "string list",
        }
    }
}

/// The parameter database: a flat map of dotted keys to typed values.
///
/// Getters return `Ok(None)` when a key is absent so the caller can apply
/// its default, and `Err` when the key is present with the wrong type.
#[derive(Debug, Clone, Default)]
pub struct ParameterDatabase {
    entries: HashMap<String, ParameterValue>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $fn_name(&self, key: &str) -> Result<Option<$ty>, ConfigError> {
            match self.entries.get(key) {
                None => Ok(None),
                Some(ParameterValue::$variant(v)) => Ok(Some(v.clone())),
                Some(other) => {
                    log::error!("parameter `{key}` holds a {}", other.type_name());
                    Err(ConfigError::WrongParameterType {
                        key: key.to_string(),
                        expected: $expected,
                    })
                }
            }
        }
    };
}

impl ParameterDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&mut self, key: impl Into<String>, value: ParameterValue) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.set(key, ParameterValue::Bool(value))
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.set(key, ParameterValue::Int(value))
    }

    pub fn set_size(&mut self, key: impl Into<String>, value: usize) -> &mut Self {
        self.set(key, ParameterValue::Size(value))
    }

    pub fn set_real(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.set(key, ParameterValue::Real(value))
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(key, ParameterValue::Str(value.into()))
    }

    pub fn set_real_vec(&mut self, key: impl Into<String>, value: Vec<f64>) -> &mut Self {
        self.set(key, ParameterValue::RealVec(value))
    }

    pub fn set_int_vec(&mut self, key: impl Into<String>, value: Vec<i64>) -> &mut Self {
        self.set(key, ParameterValue::IntVec(value))
    }

    pub fn set_str_vec(&mut self, key: impl Into<String>, value: Vec<String>) -> &mut Self {
        self.set(key, ParameterValue::StrVec(value))
    }

    typed_getter!(get_bool, Bool, bool, "bool");
    typed_getter!(get_real, Real, f64, "real");
    typed_getter!(get_str, Str, String, "string");
    typed_getter!(get_real_vec, RealVec, Vec<f64>, "real list");
    typed_getter!(get_int_vec, IntVec, Vec<i64>, "int list");
    typed_getter!(get_str_vec, StrVec, Vec<String>, "string list");

    /// Fetches an integer value.  `Size` entries widen losslessly.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ParameterValue::Int(v)) => Ok(Some(*v)),
            Some(ParameterValue::Size(v)) => Ok(Some(*v as i64)),
            Some(other) => {
                log::error!("parameter `{key}` holds a {}", other.type_name());
                Err(ConfigError::WrongParameterType {
                    key: key.to_string(),
                    expected: "int",
                })
            }
        }
    }

    /// Fetches a size value.  Non-negative `Int` entries are accepted.
    pub fn get_size(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ParameterValue::Size(v)) => Ok(Some(*v)),
            Some(ParameterValue::Int(v)) if *v >= 0 => Ok(Some(*v as usize)),
            Some(other) => {
                log::error!("parameter `{key}` holds a {}", other.type_name());
                Err(ConfigError::WrongParameterType {
                    key: key.to_string(),
                    expected: "size",
                })
            }
        }
    }
}

/// Logs whether a parameter was polled or its default used; shared by the
/// operators' `poll_for_parameters` implementations.
pub(crate) fn log_poll<T: std::fmt::Debug>(operator: &str, key: &str, value: &Option<T>) {
    match value {
        Some(v) => log::info!("{operator}: polled {key} = {v:?}"),
        None => log::info!("{operator}: {key} not in parameter database, default used"),
    }
}
