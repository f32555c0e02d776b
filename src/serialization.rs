/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Wire encoding for messages that cross a transport.
//!
//! Messages are serialized to JSON. Every capability leaf is replaced by the
//! address the sending domain exported it under, and turned back into a
//! local capability (usually a proxy) by the receiving domain. The
//! `CapabilityCodec` trait is that seam; `Domain` implements it.
//!
//! JSON has no NaN or infinity, so those floats travel as the strings
//! `"NaN"`, `"inf"` and `"-inf"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::Result;
use crate::Message;

/// Converts capabilities to addresses and back while a message is encoded
/// or decoded.
pub trait CapabilityCodec {
    fn marshal(&self, capability: &Capability) -> String;
    fn unmarshal(&self, address: &str) -> Capability;
}

/// Message tree as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "wire_float")] f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<WireValue>),
    Map(BTreeMap<String, WireValue>),
    Capability(String),
}

/// One transport delivery, as produced by a proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Full address of the target (domain base + token)
    pub to: String,
    /// Base address of the sending domain
    pub from: String,
    pub message: WireValue,
}

mod wire_float {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Special(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Special(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float '{}'", other))),
            },
        }
    }
}

pub fn encode_value(message: &Message, codec: &dyn CapabilityCodec) -> WireValue {
    match message {
        Message::Null => WireValue::Null,
        Message::Bool(b) => WireValue::Bool(*b),
        Message::Int(i) => WireValue::Int(*i),
        Message::Float(f) => WireValue::Float(*f),
        Message::Text(s) => WireValue::Text(s.clone()),
        Message::Bytes(b) => WireValue::Bytes(b.clone()),
        Message::List(items) => {
            WireValue::List(items.iter().map(|m| encode_value(m, codec)).collect())
        }
        Message::Map(entries) => WireValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v, codec)))
                .collect(),
        ),
        Message::Capability(cap) => WireValue::Capability(codec.marshal(cap)),
    }
}

pub fn decode_value(value: WireValue, codec: &dyn CapabilityCodec) -> Message {
    match value {
        WireValue::Null => Message::Null,
        WireValue::Bool(b) => Message::Bool(b),
        WireValue::Int(i) => Message::Int(i),
        WireValue::Float(f) => Message::Float(f),
        WireValue::Text(s) => Message::Text(s),
        WireValue::Bytes(b) => Message::Bytes(b),
        WireValue::List(items) => {
            Message::List(items.into_iter().map(|v| decode_value(v, codec)).collect())
        }
        WireValue::Map(entries) => Message::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, decode_value(v, codec)))
                .collect(),
        ),
        WireValue::Capability(address) => Message::Capability(codec.unmarshal(&address)),
    }
}

pub fn to_bytes(envelope: &WireEnvelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<WireEnvelope> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Names capabilities `cap-<id>` and hands back the same capability for
    /// a known name, or a fresh ignore capability otherwise.
    #[derive(Default)]
    struct TableCodec {
        known: Mutex<HashMap<String, Capability>>,
    }

    impl CapabilityCodec for TableCodec {
        fn marshal(&self, capability: &Capability) -> String {
            let name = format!("cap-{}", capability.id().as_u64());
            self.known.lock().insert(name.clone(), capability.clone());
            name
        }

        fn unmarshal(&self, address: &str) -> Capability {
            self.known
                .lock()
                .get(address)
                .cloned()
                .unwrap_or_else(Capability::ignore)
        }
    }

    #[test]
    fn test_capabilities_become_addresses() {
        let codec = TableCodec::default();
        let customer = Capability::ignore();
        let msg = Message::map([
            ("customer", Message::from(&customer)),
            ("items", Message::list([Message::from(1), Message::from(&customer)])),
        ]);

        let wire = encode_value(&msg, &codec);
        let expected_name = format!("cap-{}", customer.id().as_u64());
        match &wire {
            WireValue::Map(entries) => {
                assert_eq!(entries["customer"], WireValue::Capability(expected_name.clone()));
            }
            other => panic!("expected map, got {:?}", other),
        }

        let decoded = decode_value(wire, &codec);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_envelope_json_shape() {
        let codec = TableCodec::default();
        let envelope = WireEnvelope {
            to: "mem://b:2/tok".to_string(),
            from: "mem://a:1".to_string(),
            message: encode_value(&Message::map([("first", true)]), &codec),
        };

        let bytes = to_bytes(&envelope).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["to"], "mem://b:2/tok");
        assert_eq!(json["message"]["type"], "map");
        assert_eq!(json["message"]["value"]["first"]["type"], "bool");
        assert_eq!(json["message"]["value"]["first"]["value"], true);

        assert_eq!(from_bytes(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_null_and_scalars_decode() {
        let codec = TableCodec::default();
        let bytes = br#"{"to":"mem://b:2/t","from":"mem://a:1","message":{"type":"list","value":[{"type":"null"},{"type":"int","value":-1336},{"type":"text","value":"x"}]}}"#;
        let envelope = from_bytes(bytes).unwrap();
        let msg = decode_value(envelope.message, &codec);
        assert_eq!(
            msg,
            Message::list([Message::Null, Message::Int(-1336), Message::from("x")])
        );
    }

    #[test]
    fn test_non_finite_floats_survive_the_wire() {
        let codec = TableCodec::default();
        let msg = Message::list([
            Message::Float(f64::INFINITY),
            Message::Float(f64::NEG_INFINITY),
            Message::Float(f64::NAN),
            Message::Float(1.5),
        ]);
        let envelope = WireEnvelope {
            to: "mem://b:2/tok".to_string(),
            from: "mem://a:1".to_string(),
            message: encode_value(&msg, &codec),
        };

        let bytes = to_bytes(&envelope).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"]["value"][0]["value"], "inf");
        assert_eq!(json["message"]["value"][2]["value"], "NaN");
        assert_eq!(json["message"]["value"][3]["value"], 1.5);

        let decoded = decode_value(from_bytes(&bytes).unwrap().message, &codec);
        let floats: Vec<f64> = decoded
            .as_list()
            .unwrap()
            .iter()
            .map(|m| m.as_float().unwrap())
            .collect();
        assert_eq!(floats[0], f64::INFINITY);
        assert_eq!(floats[1], f64::NEG_INFINITY);
        assert!(floats[2].is_nan());
        assert_eq!(floats[3], 1.5);

        let bad = br#"{"to":"t","from":"f","message":{"type":"float","value":"huge"}}"#;
        assert!(from_bytes(bad).is_err());
    }

    #[test]
    fn test_malformed_bytes_rejected() {
        assert!(from_bytes(b"{\"to\": 3}").is_err());
        assert!(from_bytes(b"\xff\xfe").is_err());
    }
}
