//! Conversion between `tfplugin6.DynamicValue` and [`tfbw_core::DynamicValue`].
//!
//! Terraform sends values as msgpack (or, rarely, JSON).  Unknown values are a
//! msgpack extension; on the JSON side they become
//! [`tfbw_core::value::UNKNOWN_VALUE`] so the typed models decode them as
//! [`tfbw_core::TfString::Unknown`].  Encoding is schema-driven: every
//! attribute of the schema is written, null ones as msgpack nil.

use std::collections::BTreeMap;

use rmpv::Value as Msgpack;
use serde_json::{Map, Number, Value as Json};
use tfbw_core::schema::AttributeKind;
use tfbw_core::value::UNKNOWN_VALUE;
use tfbw_core::{Attribute, DynamicValue, Schema};

use crate::error::CodecError;
use crate::proto;

/// cty's encoding of an unknown value: fixext1, type 0, one zero byte.
const UNKNOWN_EXT_TYPE: i8 = 0;

fn unknown() -> Msgpack {
    Msgpack::Ext(UNKNOWN_EXT_TYPE, vec![0])
}

/// Decode a request value.  An absent value or one with neither encoding
/// set is null.
pub fn decode(value: Option<&proto::DynamicValue>) -> Result<DynamicValue, CodecError> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };
    if !value.msgpack.is_empty() {
        let mut bytes = value.msgpack.as_slice();
        let decoded =
            rmpv::decode::read_value(&mut bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        return Ok(DynamicValue::from_json(to_json(decoded)?));
    }
    if !value.json.is_empty() {
        return Ok(DynamicValue::from_json(serde_json::from_slice(&value.json)?));
    }
    Ok(DynamicValue::null())
}

/// Encode `value` as an object of `schema`'s type.
pub fn encode(schema: &Schema, value: &DynamicValue) -> Result<proto::DynamicValue, CodecError> {
    let packed = encode_object(&schema.attributes, value.as_json()).map_err(CodecError::Encode)?;
    let mut msgpack = Vec::new();
    rmpv::encode::write_value(&mut msgpack, &packed)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack,
        json: Vec::new(),
    })
}

fn to_json(value: Msgpack) -> Result<Json, CodecError> {
    Ok(match value {
        Msgpack::Nil => Json::Null,
        Msgpack::Boolean(b) => Json::Bool(b),
        Msgpack::Integer(i) => {
            if let Some(n) = i.as_i64() {
                Json::Number(n.into())
            } else if let Some(n) = i.as_u64() {
                Json::Number(n.into())
            } else {
                return Err(CodecError::Decode(format!("integer out of range: {i}")));
            }
        }
        Msgpack::F32(f) => float(f64::from(f))?,
        Msgpack::F64(f) => float(f)?,
        Msgpack::String(s) => match s.into_str() {
            Some(s) => Json::String(s),
            None => return Err(CodecError::Decode("string is not valid UTF-8".into())),
        },
        Msgpack::Array(items) => {
            Json::Array(items.into_iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Msgpack::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let Msgpack::String(key) = key else {
                    return Err(CodecError::Decode(format!("non-string object key: {key}")));
                };
                let Some(key) = key.into_str() else {
                    return Err(CodecError::Decode("object key is not valid UTF-8".into()));
                };
                map.insert(key, to_json(value)?);
            }
            Json::Object(map)
        }
        // Refined unknowns use other extension types; all of them are unknown here.
        Msgpack::Ext(_, _) => Json::String(UNKNOWN_VALUE.to_string()),
        Msgpack::Binary(_) => return Err(CodecError::Decode("unexpected binary value".into())),
    })
}

fn float(f: f64) -> Result<Json, CodecError> {
    Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| CodecError::Decode(format!("non-finite number: {f}")))
}

fn is_unknown(value: &Json) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

fn encode_object(
    attributes: &BTreeMap<&'static str, Attribute>,
    value: &Json,
) -> Result<Msgpack, String> {
    let fields = match value {
        Json::Null => return Ok(Msgpack::Nil),
        v if is_unknown(v) => return Ok(unknown()),
        Json::Object(fields) => fields,
        other => return Err(format!("expected an object, found {other}")),
    };
    let mut entries = Vec::with_capacity(attributes.len());
    for (name, attribute) in attributes {
        let field = fields.get(*name).unwrap_or(&Json::Null);
        let packed = encode_attribute(attribute, field).map_err(|e| format!("{name}: {e}"))?;
        entries.push((Msgpack::from(*name), packed));
    }
    Ok(Msgpack::Map(entries))
}

fn encode_attribute(attribute: &Attribute, value: &Json) -> Result<Msgpack, String> {
    if value.is_null() {
        return Ok(Msgpack::Nil);
    }
    if is_unknown(value) {
        return Ok(unknown());
    }
    match (&attribute.kind, value) {
        (AttributeKind::String, Json::String(s)) => Ok(Msgpack::from(s.as_str())),
        (AttributeKind::ListNested { attributes }, Json::Array(items)) => items
            .iter()
            .map(|item| encode_object(attributes, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Msgpack::Array),
        (AttributeKind::String, other) => Err(format!("expected a string, found {other}")),
        (AttributeKind::ListNested { .. }, other) => Err(format!("expected a list, found {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("test").attribute("id", Attribute::string("id").computed()).attribute(
            "projects",
            Attribute::list_nested(
                "projects",
                [
                    ("name", Attribute::string("name").required()),
                    ("project_id", Attribute::string("project_id").computed()),
                ],
            )
            .required(),
        )
    }

    fn packed(value: &Msgpack) -> proto::DynamicValue {
        let mut msgpack = Vec::new();
        rmpv::encode::write_value(&mut msgpack, value).unwrap();
        proto::DynamicValue {
            msgpack,
            json: Vec::new(),
        }
    }

    fn unpack(value: &proto::DynamicValue) -> Msgpack {
        rmpv::decode::read_value(&mut value.msgpack.as_slice()).unwrap()
    }

    #[test]
    fn absent_and_empty_values_are_null() {
        assert!(decode(None).unwrap().is_null());
        assert!(decode(Some(&proto::DynamicValue::default())).unwrap().is_null());
    }

    #[test]
    fn decodes_objects_and_unknown_extension() {
        let wire = Msgpack::Map(vec![
            (Msgpack::from("id"), Msgpack::Ext(0, vec![0])),
            (
                Msgpack::from("projects"),
                Msgpack::Array(vec![Msgpack::Map(vec![
                    (Msgpack::from("name"), Msgpack::from("web")),
                    (Msgpack::from("project_id"), Msgpack::Nil),
                ])]),
            ),
        ]);
        let value = decode(Some(&packed(&wire))).unwrap();
        assert_eq!(
            value.as_json(),
            &json!({"id": UNKNOWN_VALUE, "projects": [{"name": "web", "project_id": null}]})
        );
    }

    #[test]
    fn refined_unknown_extension_is_unknown() {
        let value = decode(Some(&packed(&Msgpack::Ext(12, vec![0x80])))).unwrap();
        assert_eq!(value.as_json(), &json!(UNKNOWN_VALUE));
    }

    #[test]
    fn falls_back_to_json_encoding() {
        let wire = proto::DynamicValue {
            msgpack: Vec::new(),
            json: br#"{"id":"abc"}"#.to_vec(),
        };
        assert_eq!(decode(Some(&wire)).unwrap().as_json(), &json!({"id": "abc"}));
    }

    #[test]
    fn rejects_binary_values() {
        let err = decode(Some(&packed(&Msgpack::Binary(vec![1, 2])))).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn encode_writes_every_attribute_and_unknown_marker() {
        let value = DynamicValue::from_json(json!({
            "id": UNKNOWN_VALUE,
            "projects": [{"name": "web"}]
        }));
        let wire = encode(&schema(), &value).unwrap();
        assert_eq!(
            unpack(&wire),
            Msgpack::Map(vec![
                (Msgpack::from("id"), Msgpack::Ext(0, vec![0])),
                (
                    Msgpack::from("projects"),
                    Msgpack::Array(vec![Msgpack::Map(vec![
                        (Msgpack::from("name"), Msgpack::from("web")),
                        (Msgpack::from("project_id"), Msgpack::Nil),
                    ])]),
                ),
            ])
        );
    }

    #[test]
    fn unknown_is_the_cty_byte_sequence() {
        let value = DynamicValue::from_json(json!({"id": UNKNOWN_VALUE, "projects": null}));
        let wire = encode(&schema(), &value).unwrap();
        let id_at = wire
            .msgpack
            .windows(3)
            .position(|w| w == b"\xa2id")
            .unwrap();
        assert_eq!(&wire.msgpack[id_at + 3..id_at + 6], &[0xd4, 0x00, 0x00]);
    }

    #[test]
    fn null_value_encodes_as_nil() {
        let wire = encode(&schema(), &DynamicValue::null()).unwrap();
        assert_eq!(wire.msgpack, vec![0xc0]);
    }

    #[test]
    fn encode_reports_type_mismatch_with_attribute_name() {
        let value = DynamicValue::from_json(json!({"id": 7}));
        let err = encode(&schema(), &value).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot encode value: id: expected a string, found 7"
        );
    }

    #[test]
    fn decode_then_encode_is_stable() {
        let value = DynamicValue::from_json(json!({
            "id": "tracking",
            "projects": [{"name": "web", "project_id": "p-1"}]
        }));
        let wire = encode(&schema(), &value).unwrap();
        assert_eq!(decode(Some(&wire)).unwrap(), value);
    }
}
