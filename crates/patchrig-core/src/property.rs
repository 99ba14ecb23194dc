//! Typed named properties for device global settings
//!
//! Global settings arrive as a bulk dump and are exposed as a set of
//! typed named values rather than a patch: there is no byte-level
//! catalog for them, only the decoded properties themselves.

use crate::error::Error;
use std::collections::HashMap;
use std::fmt;

/// A typed settings value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    /// Index into a fixed option list (e.g. "MIDI clock mode")
    Choice { index: usize, options: Vec<String> },
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Text(_) => "text",
            PropertyValue::Choice { .. } => "choice",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => write!(f, "{}", v),
            PropertyValue::Choice { index, options } => match options.get(*index) {
                Some(option) => write!(f, "{}", option),
                None => write!(f, "({})", index),
            },
        }
    }
}

/// One named setting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// Insertion-ordered set of named settings
#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    entries: Vec<Property>,
    by_name: HashMap<String, usize>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded properties; a repeated name keeps the first entry
    pub fn from_properties(properties: Vec<Property>) -> Self {
        let mut set = Self::new();
        for property in properties {
            set.insert(property);
        }
        set
    }

    fn insert(&mut self, property: Property) {
        if self.by_name.contains_key(&property.name) {
            log::warn!(
                "PropertySet: Duplicate property '{}' ignored",
                property.name
            );
            return;
        }
        self.by_name
            .insert(property.name.clone(), self.entries.len());
        self.entries.push(property);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Property names in dump order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Result<&PropertyValue, Error> {
        self.by_name
            .get(name)
            .map(|&idx| &self.entries[idx].value)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    /// Replace a property's value, keeping its kind
    ///
    /// Integers 0/1 coerce to bools, and an integer assigned to a
    /// choice selects by index; anything else must match the stored
    /// kind.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), Error> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        let current = &mut self.entries[idx].value;

        let updated = match (&*current, value) {
            (PropertyValue::Bool(_), PropertyValue::Bool(v)) => PropertyValue::Bool(v),
            (PropertyValue::Bool(_), PropertyValue::Int(v)) if v == 0 || v == 1 => {
                PropertyValue::Bool(v == 1)
            }
            (PropertyValue::Int(_), PropertyValue::Int(v)) => PropertyValue::Int(v),
            (PropertyValue::Text(_), PropertyValue::Text(v)) => PropertyValue::Text(v),
            (PropertyValue::Choice { options, .. }, PropertyValue::Int(v)) => {
                let index = usize::try_from(v).ok().filter(|&i| i < options.len());
                match index {
                    Some(index) => PropertyValue::Choice {
                        index,
                        options: options.clone(),
                    },
                    None => {
                        return Err(Error::UnsupportedCapability(format!(
                            "choice index {} out of range for '{}' ({} options)",
                            v,
                            name,
                            options.len()
                        )))
                    }
                }
            }
            (current, value) => {
                return Err(Error::UnsupportedCapability(format!(
                    "cannot assign {} value to {} property '{}'",
                    value.kind_name(),
                    current.kind_name(),
                    name
                )))
            }
        };

        *current = updated;
        Ok(())
    }
}
