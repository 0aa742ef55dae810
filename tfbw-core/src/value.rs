//! Attribute values as seen by the plugin framework.
//!
//! Every attribute this provider exposes is a string, and every string can be
//! in one of three states: absent from configuration (`Null`), not yet known
//! at plan time (`Unknown`), or a concrete value (`Known`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// JSON stand-in for "value not yet known".
///
/// The plugin server maps it to and from msgpack's unknown-value extension.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TfString {
    #[default]
    Null,
    Unknown,
    Known(String),
}

impl TfString {
    pub fn known(value: impl Into<String>) -> Self {
        Self::Known(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The concrete value, or `""` when null or unknown.
    pub fn value_str(&self) -> &str {
        match self {
            Self::Known(v) => v,
            Self::Null | Self::Unknown => "",
        }
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }

    /// The concrete value if it is known and not empty.
    pub fn non_empty(&self) -> Option<&str> {
        self.as_known().filter(|v| !v.is_empty())
    }

    /// `Known(value)` unless `value` is empty and `prior` was null, in which
    /// case null is preserved so an unset optional attribute stays unset.
    pub fn known_or_null(value: &str, prior: &TfString) -> Self {
        if value.is_empty() && prior.is_null() {
            Self::Null
        } else {
            Self::known(value)
        }
    }
}

impl From<String> for TfString {
    fn from(value: String) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for TfString {
    fn from(value: &str) -> Self {
        Self::Known(value.to_string())
    }
}

impl From<Option<String>> for TfString {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

impl Serialize for TfString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN_VALUE),
            Self::Known(v) => serializer.serialize_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for TfString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Self::Null,
            Some(v) if v == UNKNOWN_VALUE => Self::Unknown,
            Some(v) => Self::Known(v),
        })
    }
}

/// Deserialize a JSON `null` as `T::default()`.
///
/// Nested list attributes arrive as `null` when unset; use with
/// `#[serde(default, deserialize_with = "null_as_default")]`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Model {
        #[serde(default)]
        name: TfString,
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<String>,
    }

    #[test]
    fn missing_and_null_decode_as_null() {
        let m: Model = serde_json::from_str("{}").unwrap();
        assert!(m.name.is_null());
        let m: Model = serde_json::from_str(r#"{"name": null, "items": null}"#).unwrap();
        assert!(m.name.is_null());
        assert!(m.items.is_empty());
    }

    #[test]
    fn unknown_sentinel_decodes_as_unknown() {
        let json = format!(r#"{{"name": "{UNKNOWN_VALUE}"}}"#);
        let m: Model = serde_json::from_str(&json).unwrap();
        assert!(m.name.is_unknown());
        assert_eq!(m.name.value_str(), "");
    }

    #[test]
    fn empty_string_is_known() {
        let m: Model = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert_eq!(m.name, TfString::known(""));
        assert_eq!(m.name.non_empty(), None);
    }

    #[test]
    fn serializes_each_state() {
        assert_eq!(serde_json::to_value(TfString::Null).unwrap(), serde_json::Value::Null);
        assert_eq!(
            serde_json::to_value(TfString::Unknown).unwrap(),
            serde_json::json!(UNKNOWN_VALUE)
        );
        assert_eq!(
            serde_json::to_value(TfString::known("x")).unwrap(),
            serde_json::json!("x")
        );
    }

    #[test]
    fn known_or_null_keeps_unset_optional_unset() {
        assert_eq!(TfString::known_or_null("", &TfString::Null), TfString::Null);
        assert_eq!(
            TfString::known_or_null("", &TfString::known("")),
            TfString::known("")
        );
        assert_eq!(
            TfString::known_or_null("n", &TfString::Null),
            TfString::known("n")
        );
    }
}
