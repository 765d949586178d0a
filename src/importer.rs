/// Type definitions for the ChatGPT data export (`conversations.json`).
///
/// The export is a JSON array of conversations. Each conversation stores its
/// messages as a tree keyed by node id:
///
/// ```json
/// {
///   "title": "T1",
///   "create_time": 1700000000.0,
///   "root": "a",
///   "mapping": {
///     "a": { "message": null, "children": ["b"] },
///     "b": {
///       "message": { "author": { "role": "user" }, "content": { "parts": ["Hi"] } },
///       "children": []
///     }
///   }
/// }
/// ```
///
/// Only the fields needed to rebuild the chat are modelled; everything else in
/// the export is ignored by serde.
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One exported chat session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    /// Declared traversal start. Newer exports omit it.
    #[serde(default)]
    pub root: Option<String>,
    /// Node entries in document order.
    #[serde(default, deserialize_with = "deserialize_mapping")]
    pub mapping: Vec<(String, Node)>,
}

impl Conversation {
    /// Identifier used in diagnostics, whichever of the two id fields is set.
    pub fn display_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.conversation_id.as_deref())
            .unwrap_or("-")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_time.and_then(epoch_to_utc)
    }
}

// ---------------------------------------------------------------------------
// Node / Message
// ---------------------------------------------------------------------------

/// One entry of a conversation graph: at most one message plus child ids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub create_time: Option<f64>,
}

impl Message {
    pub fn role(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.role.as_deref())
    }

    /// Concatenation of the text parts, in order. Non-text parts contribute nothing.
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text(s) => Some(s.as_str()),
                        Part::Other(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_time.and_then(epoch_to_utc)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content fragment. Strings are text; anything else (image pointers, tool
/// payloads, ...) is kept opaque.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text(String),
    Other(IgnoredAny),
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Reads the `mapping` object into a list that keeps the key order of the JSON
/// text, so "first node" is stable across runs. `null` reads as empty.
fn deserialize_mapping<'de, D>(deserializer: D) -> Result<Vec<(String, Node)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MappingVisitor;

    impl<'de> Visitor<'de> for MappingVisitor {
        type Value = Vec<(String, Node)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of node id to node")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, node)) = map.next_entry::<String, Node>()? {
                entries.push((id, node));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(MappingVisitor)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse a `conversations.json` file.
pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>> {
    let file =
        File::open(path).wrap_err_with(|| format!("Failed to open: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to parse: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_keeps_document_order() {
        let json = r#"{
            "title": "order",
            "mapping": {
                "z": { "message": null, "children": [] },
                "a": { "message": null, "children": [] },
                "m": { "children": [] }
            }
        }"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = conv.mapping.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn missing_and_null_fields_default() {
        let conv: Conversation =
            serde_json::from_str(r#"{ "title": null, "mapping": null }"#).unwrap();
        assert!(conv.title.is_none());
        assert!(conv.mapping.is_empty());
        assert!(conv.root.is_none());
        assert_eq!(conv.display_id(), "-");
    }

    #[test]
    fn text_joins_only_string_parts() {
        let json = r#"{
            "author": { "role": "assistant" },
            "content": {
                "content_type": "multimodal_text",
                "parts": ["Hello ", { "asset_pointer": "file-service://x" }, 42, "world"]
            }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role(), Some("assistant"));
        assert_eq!(msg.text(), "Hello world");
    }

    #[test]
    fn content_without_parts_is_empty_text() {
        let json = r#"{ "author": { "role": "user" }, "content": { "content_type": "code", "text": "x" } }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn epoch_times_convert() {
        let conv: Conversation =
            serde_json::from_str(r#"{ "create_time": 1700000000.5, "mapping": {} }"#).unwrap();
        let ts = conv.created_at().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }
}
