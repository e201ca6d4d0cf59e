//! Turning coordinator bytes into [`Decoded`] values and back.
//!
//! Protobuf cannot tell "this field was never sent" apart from "this
//! field was sent with its zero value" for scalars, yet callers need to
//! know when the coordinator left something out. [`decode`] resolves
//! that the same way every time:
//!
//! 1. Decode the bytes once.
//! 2. Render the message twice: a *sparse* rendering with only the fields
//!    present on the wire, and a *filled* rendering where every absent
//!    field takes its schema default (empty list, `Null` sub-message, or
//!    the scalar default).
//! 3. Walk the filled rendering using the sparse one as the presence
//!    oracle. An absent leaf whose default is "falsy" (`0`, `false`,
//!    `""`, `"0"`, empty bytes) becomes [`Decoded::Null`].
//!
//! Empty lists are never turned into `Null`: a repeated field with no
//! elements is a legitimate, meaningful value.
//!
//! Because the schemas give scalars no presence bit, a scalar the peer
//! explicitly sent as `0` is indistinguishable from one it omitted, and
//! both come out as `Null`. That is a property of the wire format, not
//! something this module can recover.

use std::collections::BTreeMap;

use prost::Message;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, ReflectMessage, Value,
};

use crate::{Decoded, EMsg, ProtocolError, schema};

/// Decodes `bytes` against `schema` and normalizes defaults.
///
/// # Errors
/// Returns [`ProtocolError::Decode`] if the bytes are not a valid
/// encoding of the schema.
pub fn decode(schema: &MessageDescriptor, bytes: &[u8]) -> Result<Decoded, ProtocolError> {
    let message = DynamicMessage::decode(schema.clone(), bytes)?;
    let sparse = render_message(&message, Defaults::Omit);
    let filled = render_message(&message, Defaults::Apply);
    Ok(merge_defaults(Some(&sparse), filled))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Defaults {
    Omit,
    Apply,
}

fn render_message(message: &DynamicMessage, defaults: Defaults) -> Decoded {
    let mut fields = BTreeMap::new();
    for field in message.descriptor().fields() {
        if message.has_field(&field) {
            let value = render_value(&message.get_field(&field), defaults);
            fields.insert(field.name().to_string(), value);
        } else if defaults == Defaults::Apply {
            fields.insert(field.name().to_string(), default_for(&field));
        }
    }
    Decoded::Object(fields)
}

fn render_value(value: &Value, defaults: Defaults) -> Decoded {
    match value {
        Value::Bool(b) => Decoded::Bool(*b),
        Value::I32(n) => Decoded::Int(i64::from(*n)),
        Value::U32(n) => Decoded::Int(i64::from(*n)),
        Value::I64(n) => Decoded::String(n.to_string()),
        Value::U64(n) => Decoded::String(n.to_string()),
        Value::F32(f) => Decoded::Float(f64::from(*f)),
        Value::F64(f) => Decoded::Float(*f),
        Value::String(s) => Decoded::String(s.clone()),
        Value::Bytes(b) => Decoded::Bytes(b.to_vec()),
        Value::EnumNumber(n) => Decoded::Int(i64::from(*n)),
        Value::Message(m) => render_message(m, defaults),
        Value::List(items) => {
            Decoded::List(items.iter().map(|v| render_value(v, defaults)).collect())
        }
        Value::Map(entries) => Decoded::Object(
            entries
                .iter()
                .map(|(k, v)| (map_key(k), render_value(v, defaults)))
                .collect(),
        ),
    }
}

fn map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

fn default_for(field: &FieldDescriptor) -> Decoded {
    if field.is_list() {
        return Decoded::List(Vec::new());
    }
    if field.is_map() {
        return Decoded::Object(BTreeMap::new());
    }
    match field.kind() {
        Kind::Message(_) => Decoded::Null,
        _ => render_value(&Value::default_value_for_field(field), Defaults::Apply),
    }
}

/// Merges a filled rendering with its sparse twin.
///
/// `present` is the sparse value at the same position as `value`, or
/// `None` if the sparse rendering has nothing there.
fn merge_defaults(present: Option<&Decoded>, value: Decoded) -> Decoded {
    match value {
        Decoded::List(items) => Decoded::List(
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| merge_defaults(present.and_then(|p| p.index(idx)), item))
                .collect(),
        ),
        Decoded::Object(fields) => Decoded::Object(
            fields
                .into_iter()
                .map(|(name, field)| {
                    let seen = present.and_then(|p| p.get(&name));
                    let merged = match field {
                        nested @ (Decoded::List(_) | Decoded::Object(_)) => {
                            merge_defaults(seen, nested)
                        }
                        leaf if seen.is_none() && is_replaceable_default(&leaf) => Decoded::Null,
                        leaf => leaf,
                    };
                    (name, merged)
                })
                .collect(),
        ),
        leaf => leaf,
    }
}

/// Whether an absent leaf should read as "no value".
fn is_replaceable_default(value: &Decoded) -> bool {
    match value {
        Decoded::Null => true,
        Decoded::Bool(b) => !b,
        Decoded::Int(n) => *n == 0,
        Decoded::Float(f) => *f == 0.0 || f.is_nan(),
        // "0" is how an unset 64-bit integer renders.
        Decoded::String(s) => s.is_empty() || s == "0",
        Decoded::Bytes(b) => b.is_empty(),
        Decoded::List(_) | Decoded::Object(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serializes a message of `schema` from `(field name, value)` pairs.
///
/// # Errors
/// Returns [`ProtocolError::InvalidField`] for unknown field names and
/// type mismatches.
pub fn encode<'a, I>(schema: &MessageDescriptor, fields: I) -> Result<Vec<u8>, ProtocolError>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    fields
        .into_iter()
        .try_fold(MessageBuilder::from_descriptor(schema.clone()), |builder, (name, value)| {
            builder.set(name, value)
        })
        .map(|builder| builder.encode())
}

/// Builds an outbound protobuf body field by field.
///
/// ```rust
/// use underlords_protocol::{EMsg, FieldValue, MessageBuilder};
///
/// let body = MessageBuilder::for_msg(EMsg::GetProfile)
///     .and_then(|b| b.set("account_id", FieldValue::U32(22202)))
///     .map(|b| b.encode())
///     .unwrap();
/// assert_eq!(body, vec![0x08, 0xBA, 0xAD, 0x01]);
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: DynamicMessage,
}

impl MessageBuilder {
    /// Starts an empty message of the named schema.
    pub fn new(schema_name: &str) -> Result<Self, ProtocolError> {
        Ok(Self::from_descriptor(schema::message(schema_name)?))
    }

    /// Starts an empty message with the schema the table assigns to `msg`.
    pub fn for_msg(msg: EMsg) -> Result<Self, ProtocolError> {
        let name = msg
            .schema()
            .ok_or_else(|| ProtocolError::UnknownSchema(msg.name().to_string()))?;
        Self::new(name)
    }

    pub fn from_descriptor(descriptor: MessageDescriptor) -> Self {
        Self {
            message: DynamicMessage::new(descriptor),
        }
    }

    /// Sets one field.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidField`] if the schema has no such
    /// field or the value has the wrong type.
    pub fn set(mut self, field: &str, value: Value) -> Result<Self, ProtocolError> {
        self.message
            .try_set_field_by_name(field, value)
            .map_err(|e| ProtocolError::InvalidField {
                schema: self.message.descriptor().full_name().to_string(),
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self)
    }

    /// The message built so far.
    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    /// Serializes the message to protobuf bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.message.encode_to_vec()
    }
}
