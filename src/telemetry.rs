// Pull-based telemetry properties
//
// Each type lists its properties once, in display order. An external adapter polls the
// getters and forwards dashboard edits to the setters; nothing is pushed from here.

use serde::Serialize;

/// A polled property value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

/// One named property with a getter and an optional setter
pub struct Property<T: ?Sized> {
    pub key: &'static str,
    pub get: fn(&T) -> Value,
    pub set: Option<fn(&mut T, f64)>,
}

impl<T: ?Sized> Property<T> {
    pub fn read(key: &'static str, get: fn(&T) -> Value) -> Self {
        Self {
            key,
            get,
            set: None,
        }
    }

    pub fn read_write(key: &'static str, get: fn(&T) -> Value, set: fn(&mut T, f64)) -> Self {
        Self {
            key,
            get,
            set: Some(set),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

/// Types that expose a flat, ordered property list
pub trait Telemetry {
    fn properties() -> Vec<Property<Self>>;
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TelemetryError {
    #[error("Unknown telemetry property {0:?}")]
    UnknownKey(String),

    #[error("Telemetry property {0:?} is read-only")]
    ReadOnly(String),
}

/// Read every property of `source`, in order
pub fn snapshot<T: Telemetry + ?Sized>(source: &T) -> Vec<(&'static str, Value)> {
    T::properties()
        .into_iter()
        .map(|p| (p.key, (p.get)(source)))
        .collect()
}

/// Write `value` through the setter registered under `key`
pub fn apply<T: Telemetry + ?Sized>(
    target: &mut T,
    key: &str,
    value: f64,
) -> Result<(), TelemetryError> {
    let property = T::properties()
        .into_iter()
        .find(|p| p.key == key)
        .ok_or_else(|| TelemetryError::UnknownKey(key.to_string()))?;

    let set = property
        .set
        .ok_or_else(|| TelemetryError::ReadOnly(key.to_string()))?;
    set(target, value);
    Ok(())
}

/// Render a snapshot as a JSON object keyed by property name
pub fn to_json<T: Telemetry + ?Sized>(source: &T) -> serde_json::Value {
    let map = snapshot(source)
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}
