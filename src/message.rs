/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Message values for the actor runtime.
//!
//! A message is an immutable value tree. Capabilities can sit anywhere in
//! the tree, which is how actors hand each other authority (a `customer` to
//! reply to, a subject to forward to). Domains rewrite those leaves into
//! addresses when a message crosses the wire.

use std::collections::BTreeMap;

use crate::capability::Capability;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Message {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Message>),
    Map(BTreeMap<String, Message>),
    Capability(Capability),
}

impl Message {
    /// Build a map message from key/value pairs.
    ///
    /// # Example
    /// ```
    /// use ocap_actors::Message;
    ///
    /// let msg = Message::map([("first", Message::from(true)), ("count", Message::from(3))]);
    /// assert_eq!(msg.get("count").and_then(Message::as_int), Some(3));
    /// ```
    pub fn map<K, V, I>(entries: I) -> Message
    where
        K: Into<String>,
        V: Into<Message>,
        I: IntoIterator<Item = (K, V)>,
    {
        Message::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn list<V, I>(items: I) -> Message
    where
        V: Into<Message>,
        I: IntoIterator<Item = V>,
    {
        Message::List(items.into_iter().map(Into::into).collect())
    }

    /// Return a copy with `key` set. Non-map messages become a single-entry map.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Message>) -> Message {
        let mut entries = match self {
            Message::Map(entries) => entries.clone(),
            _ => BTreeMap::new(),
        };
        entries.insert(key.into(), value.into());
        Message::Map(entries)
    }

    /// Look up a field of a map message.
    pub fn get(&self, key: &str) -> Option<&Message> {
        match self {
            Message::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Message::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Message::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Message::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Message::Float(f) => Some(*f),
            Message::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Message::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Message]> {
        match self {
            Message::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Message>> {
        match self {
            Message::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_capability(&self) -> Option<&Capability> {
        match self {
            Message::Capability(cap) => Some(cap),
            _ => None,
        }
    }
}

impl From<()> for Message {
    fn from(_: ()) -> Self {
        Message::Null
    }
}

impl From<bool> for Message {
    fn from(b: bool) -> Self {
        Message::Bool(b)
    }
}

impl From<i32> for Message {
    fn from(i: i32) -> Self {
        Message::Int(i as i64)
    }
}

impl From<i64> for Message {
    fn from(i: i64) -> Self {
        Message::Int(i)
    }
}

impl From<u16> for Message {
    fn from(i: u16) -> Self {
        Message::Int(i as i64)
    }
}

impl From<u32> for Message {
    fn from(i: u32) -> Self {
        Message::Int(i as i64)
    }
}

impl From<f64> for Message {
    fn from(f: f64) -> Self {
        Message::Float(f)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Message::Bytes(bytes)
    }
}

impl From<Vec<Message>> for Message {
    fn from(items: Vec<Message>) -> Self {
        Message::List(items)
    }
}

impl From<Capability> for Message {
    fn from(cap: Capability) -> Self {
        Message::Capability(cap)
    }
}

impl From<&Capability> for Message {
    fn from(cap: &Capability) -> Self {
        Message::Capability(cap.clone())
    }
}
