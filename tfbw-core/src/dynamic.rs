//! Config, plan and state objects exchanged with the framework.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diag::Diagnostics;
use crate::value::TfString;

/// An object-typed value (config, plan, prior state or new state).
///
/// Held as JSON; typed models are decoded with [`DynamicValue::get`] and
/// written back with [`DynamicValue::set`].
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicValue(Value);

impl DynamicValue {
    pub fn null() -> Self {
        Self(Value::Null)
    }

    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    /// Encode a typed model, reporting a conversion failure as a diagnostic.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, Diagnostics> {
        let mut value = Self::null();
        let diags = value.set(model);
        if diags.has_error() {
            return Err(diags);
        }
        Ok(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Decode into a typed model.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T, Diagnostics> {
        serde_json::from_value(self.0.clone()).map_err(|e| {
            Diagnostics::error(
                "Value Conversion Error",
                format!("An unexpected error was encountered trying to convert the value: {e}"),
            )
        })
    }

    /// Replace the whole value with the encoding of `model`.
    pub fn set<T: Serialize>(&mut self, model: &T) -> Diagnostics {
        match serde_json::to_value(model) {
            Ok(v) => {
                self.0 = v;
                Diagnostics::new()
            }
            Err(e) => Diagnostics::error(
                "Value Conversion Error",
                format!("An unexpected error was encountered trying to encode the value: {e}"),
            ),
        }
    }

    /// Set a single top-level string attribute, turning a null value into an
    /// object first.
    pub fn set_attribute(&mut self, name: &str, value: TfString) -> Diagnostics {
        if self.0.is_null() {
            self.0 = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = &mut self.0 else {
            return Diagnostics::error(
                "Value Conversion Error",
                format!("cannot set attribute '{name}' on a non-object value"),
            );
        };
        // Encoding a string value cannot fail.
        let encoded = serde_json::to_value(&value).unwrap_or(Value::Null);
        map.insert(name.to_string(), encoded);
        Diagnostics::new()
    }
}

/// Values may carry secrets; only the top-level attribute names are shown.
impl std::fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Object(map) => f
                .debug_tuple("DynamicValue")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
            Value::Null => f.write_str("DynamicValue(null)"),
            _ => f.write_str("DynamicValue([redacted])"),
        }
    }
}
