use crate::importer::{Conversation, Message, Node};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Me,
    Cg,
}

impl Speaker {
    fn from_role(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Self::Me),
            "assistant" => Some(Self::Cg),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Me => "Me",
            Self::Cg => "CG",
        }
    }

    /// CSS class of the bubble.
    pub fn class(self) -> &'static str {
        match self {
            Self::Me => "user",
            Self::Cg => "assistant",
        }
    }
}

/// One message, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLine {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error("root node {0:?} is not in the mapping")]
    MissingRoot(String),
    #[error("node {parent:?} lists child {child:?} which is not in the mapping")]
    DanglingChild { parent: String, child: String },
}

struct ArenaNode<'a> {
    message: Option<&'a Message>,
    children: Vec<usize>,
}

/// Dense, index-addressed view of a conversation's keyed mapping.
/// Child ids are resolved once, so a dangling id surfaces before traversal.
struct NodeArena<'a> {
    nodes: Vec<ArenaNode<'a>>,
    index: HashMap<&'a str, usize>,
}

impl<'a> NodeArena<'a> {
    fn build(conversation: &'a Conversation) -> Result<Self, TraversalError> {
        let mut index: HashMap<&'a str, usize> = HashMap::with_capacity(conversation.mapping.len());
        let mut slots: Vec<usize> = Vec::with_capacity(conversation.mapping.len());
        for (id, _) in &conversation.mapping {
            // A repeated key keeps its first position; the later value wins, as in a JSON object.
            let next = index.len();
            let slot = *index.entry(id.as_str()).or_insert(next);
            slots.push(slot);
        }

        let mut sources: Vec<Option<(&'a str, &'a Node)>> = vec![None; index.len()];
        for ((id, node), slot) in conversation.mapping.iter().zip(&slots) {
            sources[*slot] = Some((id.as_str(), node));
        }

        let mut nodes = Vec::with_capacity(sources.len());
        for (id, node) in sources.into_iter().flatten() {
            let children = node
                .children
                .iter()
                .map(|child| {
                    index
                        .get(child.as_str())
                        .copied()
                        .ok_or_else(|| TraversalError::DanglingChild {
                            parent: id.to_string(),
                            child: child.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            nodes.push(ArenaNode {
                message: node.message.as_ref(),
                children,
            });
        }

        Ok(Self { nodes, index })
    }

    fn start(&self, root: Option<&str>) -> Result<Option<usize>, TraversalError> {
        if self.nodes.is_empty() {
            return Ok(None);
        }
        match root {
            Some(id) => self
                .index
                .get(id)
                .copied()
                .map(Some)
                .ok_or_else(|| TraversalError::MissingRoot(id.to_string())),
            None => Ok(Some(0)),
        }
    }
}

/// Flatten a conversation tree into speaker lines, breadth-first from the root
/// (or the first mapping entry when no root is declared).
///
/// Messages from roles other than `user`/`assistant` produce no line, but their
/// children are still visited. A node reachable twice is only visited once.
pub fn linearize(conversation: &Conversation) -> Result<Vec<RenderedLine>, TraversalError> {
    let arena = NodeArena::build(conversation)?;
    let Some(start) = arena.start(conversation.root.as_deref())? else {
        return Ok(Vec::new());
    };

    let mut lines = Vec::new();
    let mut seen = vec![false; arena.nodes.len()];
    let mut queue = VecDeque::from([start]);
    seen[start] = true;

    while let Some(idx) = queue.pop_front() {
        let node = &arena.nodes[idx];

        if let Some(msg) = node.message
            && let Some(speaker) = msg.role().and_then(Speaker::from_role)
        {
            lines.push(RenderedLine {
                speaker,
                text: msg.text(),
                timestamp: msg.created_at(),
            });
        }

        for &child in &node.children {
            if !seen[child] {
                seen[child] = true;
                queue.push_back(child);
            }
        }
    }

    log::debug!(
        "linearized {:?}: {} nodes, {} lines",
        conversation.display_id(),
        arena.nodes.len(),
        lines.len()
    );
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(json: &str) -> Conversation {
        serde_json::from_str(json).unwrap()
    }

    fn texts(lines: &[RenderedLine]) -> Vec<(&str, &str)> {
        lines
            .iter()
            .map(|l| (l.speaker.label(), l.text.as_str()))
            .collect()
    }

    #[test]
    fn single_user_message_under_placeholder_root() {
        let c = conv(
            r#"{"title":"T1","root":"a","mapping":{
                "a":{"message":null,"children":["b"]},
                "b":{"message":{"author":{"role":"user"},"content":{"parts":["Hi"]}},"children":[]}}}"#,
        );
        assert_eq!(texts(&linearize(&c).unwrap()), [("Me", "Hi")]);
    }

    #[test]
    fn breadth_first_order() {
        // r -> (u1 -> a2), (a1 -> u2)
        let c = conv(
            r#"{"root":"r","mapping":{
                "a2":{"message":{"author":{"role":"assistant"},"content":{"parts":["a2"]}},"children":[]},
                "u2":{"message":{"author":{"role":"user"},"content":{"parts":["u2"]}},"children":[]},
                "r":{"children":["u1","a1"]},
                "u1":{"message":{"author":{"role":"user"},"content":{"parts":["u1"]}},"children":["a2"]},
                "a1":{"message":{"author":{"role":"assistant"},"content":{"parts":["a1"]}},"children":["u2"]}}}"#,
        );
        assert_eq!(
            texts(&linearize(&c).unwrap()),
            [("Me", "u1"), ("CG", "a1"), ("CG", "a2"), ("Me", "u2")]
        );
    }

    #[test]
    fn other_roles_are_skipped_but_children_visited() {
        let c = conv(
            r#"{"root":"s","mapping":{
                "s":{"message":{"author":{"role":"system"},"content":{"parts":["sys"]}},"children":["t"]},
                "t":{"message":{"author":{"role":"tool"},"content":{"parts":["tool"]}},"children":["n"]},
                "n":{"message":{"content":{"parts":["no author"]}},"children":["u"]},
                "u":{"message":{"author":{"role":"user"},"content":{"parts":["deep"]}},"children":[]}}}"#,
        );
        assert_eq!(texts(&linearize(&c).unwrap()), [("Me", "deep")]);
    }

    #[test]
    fn first_entry_is_root_when_undeclared() {
        let c = conv(
            r#"{"mapping":{
                "x":{"message":{"author":{"role":"assistant"},"content":{"parts":["first"]}},"children":["y"]},
                "y":{"message":{"author":{"role":"user"},"content":{"parts":["second"]}},"children":[]}}}"#,
        );
        assert_eq!(
            texts(&linearize(&c).unwrap()),
            [("CG", "first"), ("Me", "second")]
        );
    }

    #[test]
    fn empty_mapping_yields_nothing() {
        assert!(linearize(&conv(r#"{"mapping":{}}"#)).unwrap().is_empty());
        assert!(linearize(&conv(r#"{"root":"a","mapping":{}}"#)).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let c = conv(r#"{"root":"nope","mapping":{"a":{"children":[]}}}"#);
        assert_eq!(
            linearize(&c).unwrap_err(),
            TraversalError::MissingRoot("nope".into())
        );
    }

    #[test]
    fn dangling_child_is_an_error() {
        let c = conv(r#"{"root":"a","mapping":{"a":{"children":["ghost"]}}}"#);
        assert_eq!(
            linearize(&c).unwrap_err(),
            TraversalError::DanglingChild {
                parent: "a".into(),
                child: "ghost".into()
            }
        );
    }

    #[test]
    fn cycles_terminate() {
        let c = conv(
            r#"{"root":"a","mapping":{
                "a":{"message":{"author":{"role":"user"},"content":{"parts":["a"]}},"children":["b"]},
                "b":{"message":{"author":{"role":"assistant"},"content":{"parts":["b"]}},"children":["a","b"]}}}"#,
        );
        assert_eq!(texts(&linearize(&c).unwrap()), [("Me", "a"), ("CG", "b")]);
    }

    #[test]
    fn non_text_parts_contribute_nothing() {
        let c = conv(
            r#"{"root":"a","mapping":{
                "a":{"message":{"author":{"role":"user"},"content":{"parts":["x",{"k":1},null,"y"]}},"children":[]}}}"#,
        );
        assert_eq!(texts(&linearize(&c).unwrap()), [("Me", "xy")]);
    }
}
