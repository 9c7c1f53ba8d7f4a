//! URL parameters.
//!
//! Values are classified once, when they enter a `Parameters` map, so the
//! template expanders never inspect runtime types.

use serde_json::Value;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Treated as absent everywhere.
    Null,
    Scalar(String),
    /// Elements are `Scalar` or `Null`; nulls are skipped during expansion.
    List(Vec<Param>),
    /// Pairs keep their insertion order; null values are skipped.
    Map(Vec<(String, Param)>),
}

impl Param {
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Param::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Elements of a nested container collapse to scalars.
    fn element(value: Value) -> Param {
        match value {
            Value::Null => Param::Null,
            Value::String(s) => Param::Scalar(s),
            Value::Bool(b) => Param::Scalar(b.to_string()),
            Value::Number(n) => Param::Scalar(n.to_string()),
            nested => Param::Scalar(nested.to_string()),
        }
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Param::List(items.into_iter().map(Param::element).collect()),
            Value::Object(map) => Param::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Param::element(value)))
                    .collect(),
            ),
            scalar => Param::element(scalar),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Scalar(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Scalar(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Param::Scalar(value.clone())
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Scalar(value.to_string())
    }
}

macro_rules! param_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Scalar(value.to_string())
                }
            }
        )*
    };
}

param_from_int!(i32, i64, u16, u32, u64, usize);

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(values: Vec<T>) -> Self {
        Param::List(values.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, Param)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let index = self.0.iter().position(|(key, _)| key == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Explicit values win; keys only present in `defaults` follow in their
    /// own order.
    pub fn merged_with_defaults(&self, defaults: &Parameters) -> Parameters {
        let mut merged = self.clone();
        for (name, value) in &defaults.0 {
            if merged.get(name).is_none() {
                merged.0.push((name.clone(), value.clone()));
            }
        }
        merged
    }
}

impl<K: Into<String>, V: Into<Param>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl serde::Serialize for Parameters {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, &param_to_value(value))?;
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for Parameters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

fn param_to_value(param: &Param) -> Value {
    match param {
        Param::Null => Value::Null,
        Param::Scalar(s) => Value::String(s.clone()),
        Param::List(items) => Value::Array(items.iter().map(param_to_value).collect()),
        Param::Map(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(key, value)| (key.clone(), param_to_value(value)))
                .collect(),
        ),
    }
}
