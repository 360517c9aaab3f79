//! Stable Item References
//!
//! An [`ItemRef`] describes one page item to external callers, separating
//! three kinds of information:
//!
//! - **locator** — where the item sits right now (layer path + positional
//!   index path). Always computable, volatile across document edits.
//! - **identity** — a marker string persisted in the item's note. Survives
//!   reordering; present only when an id has been assigned.
//! - **tags** — user-controlled `@mcp:key=value` annotations parsed from the
//!   item's name and note.
//!
//! Two marker syntaxes are read for compatibility: the legacy `mcp-id:<token>`
//! form and the namespaced `@mcp:id=<token>` tag. Writes emit only the
//! namespaced form and strip legacy tokens.

use std::collections::BTreeMap;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::document::{Document, ItemId};
use super::payload::IdPolicy;

lazy_static! {
    /// `@mcp:key=value` tokens, terminated by whitespace or the next `@`.
    static ref TAG_RE: Regex = Regex::new(r"@mcp:([A-Za-z0-9_.-]+)=([^\s@]*)").unwrap();
    /// Legacy identity marker.
    static ref LEGACY_ID_RE: Regex = Regex::new(r"mcp-id:([^\s@]+)").unwrap();
}

/// Volatile position of an item: outermost-to-owning layer path plus the
/// positional index at each container level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLocator {
    pub layer_path: String,
    pub index_path: Vec<usize>,
}

/// Where an identity marker was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    Note,
    None,
}

/// Persistent identity of an item, if one has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdentity {
    pub item_id: Option<String>,
    pub id_source: IdSource,
}

/// Structured description of one item for external reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub locator: ItemLocator,
    pub identity: ItemIdentity,
    pub tags: BTreeMap<String, String>,
    pub item_type: String,
    pub item_name: String,
}

impl ItemRef {
    /// Build the full reference for an item in its current position.
    pub fn describe(doc: &Document, id: ItemId) -> Self {
        let item = doc.item(id);
        let item_id = read_item_id(&item.note);
        let id_source = if item_id.is_some() {
            IdSource::Note
        } else {
            IdSource::None
        };
        ItemRef {
            locator: ItemLocator {
                layer_path: doc.layer_path(id),
                index_path: doc.index_path(id),
            },
            identity: ItemIdentity { item_id, id_source },
            tags: parse_item_tags(&item.name, &item.note),
            item_type: item.kind.typename().to_string(),
            item_name: item.name.clone(),
        }
    }
}

/// Parse `@mcp:key=value` tags from a single text. Later occurrences of a
/// key override earlier ones; parsing is order-independent per key and
/// idempotent on repeated application.
pub fn parse_tags(text: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for cap in TAG_RE.captures_iter(text) {
        tags.insert(cap[1].to_string(), cap[2].to_string());
    }
    tags
}

/// Tags from name and note combined; note tokens override name tokens.
pub fn parse_item_tags(name: &str, note: &str) -> BTreeMap<String, String> {
    let mut tags = parse_tags(name);
    for (key, value) in parse_tags(note) {
        tags.insert(key, value);
    }
    tags
}

/// Render a tag map back into token form, keys sorted.
pub fn emit_tags(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(k, v)| format!("@mcp:{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read the identity marker from a note. The namespaced `@mcp:id=` tag wins
/// over the legacy `mcp-id:` token when both are present.
pub fn read_item_id(note: &str) -> Option<String> {
    if let Some(id) = parse_tags(note).remove("id") {
        if !id.is_empty() {
            return Some(id);
        }
    }
    LEGACY_ID_RE
        .captures(note)
        .map(|cap| cap[1].to_string())
}

/// Generate a fresh id token: `mcp_<ms-timestamp>_<4-digit-random>`.
pub fn generate_item_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let suffix = u16::from_be_bytes([bytes[0], bytes[1]]) % 10_000;
    format!("mcp_{}_{:04}", millis, suffix)
}

/// Rewrite a note so it carries exactly one identity marker, in the
/// namespaced form, prepended; legacy tokens and any prior id tag are
/// stripped. Applying the same id twice yields the same note.
pub fn rewrite_note_with_id(note: &str, id: &str) -> String {
    let stripped = LEGACY_ID_RE.replace_all(note, "");
    let stripped = TAG_RE.replace_all(&stripped, |cap: &regex::Captures| {
        if &cap[1] == "id" {
            String::new()
        } else {
            cap[0].to_string()
        }
    });
    let rest = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if rest.is_empty() {
        format!("@mcp:id={}", id)
    } else {
        format!("@mcp:id={} {}", id, rest)
    }
}

/// Outcome of one id-assignment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAssignment {
    /// Index path is not stable enough for callers; report the id itself.
    pub item_name: String,
    pub id: Option<String>,
    pub assigned: bool,
    pub conflict: bool,
}

/// Assign ids to `items` under the given policy. Locked items cannot be
/// written; those degrade to `{assigned: false}` without aborting the pass.
pub fn assign_ids(doc: &mut Document, items: &[ItemId], policy: IdPolicy) -> Vec<IdAssignment> {
    let mut outcomes = Vec::with_capacity(items.len());
    for &id in items {
        let existing = read_item_id(&doc.item(id).note);
        let item_name = doc.item(id).name.clone();
        let outcome = match policy {
            IdPolicy::None => IdAssignment {
                item_name,
                id: existing,
                assigned: false,
                conflict: false,
            },
            IdPolicy::Preserve => IdAssignment {
                item_name,
                id: existing,
                assigned: false,
                conflict: false,
            },
            IdPolicy::OptIn => {
                if let Some(existing) = existing {
                    IdAssignment {
                        item_name,
                        id: Some(existing),
                        assigned: false,
                        conflict: false,
                    }
                } else {
                    write_new_id(doc, id, item_name, false)
                }
            }
            IdPolicy::Always => {
                let conflict = existing.is_some();
                write_new_id(doc, id, item_name, conflict)
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

fn write_new_id(doc: &mut Document, id: ItemId, item_name: String, conflict: bool) -> IdAssignment {
    if doc.item(id).locked {
        return IdAssignment {
            item_name,
            id: None,
            assigned: false,
            conflict,
        };
    }
    let new_id = generate_item_id();
    let note = rewrite_note_with_id(&doc.item(id).note, &new_id);
    doc.item_mut(id).note = note;
    IdAssignment {
        item_name,
        id: Some(new_id),
        assigned: true,
        conflict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artbridge::executor::document::ItemKind;

    #[test]
    fn test_parse_tags_basic() {
        let tags = parse_tags("logo @mcp:role=hero @mcp:slot=2");
        assert_eq!(tags.get("role").map(String::as_str), Some("hero"));
        assert_eq!(tags.get("slot").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_tags_terminated_by_at() {
        let tags = parse_tags("@mcp:a=1@mcp:b=2");
        assert_eq!(tags.get("a").map(String::as_str), Some("1"));
        assert_eq!(tags.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_note_tags_override_name_tags() {
        let tags = parse_item_tags("@mcp:role=hero", "@mcp:role=backdrop");
        assert_eq!(tags.get("role").map(String::as_str), Some("backdrop"));
    }

    #[test]
    fn test_tag_round_trip() {
        let original = parse_tags("@mcp:b=2 @mcp:a=1");
        let reparsed = parse_tags(&emit_tags(&original));
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_read_legacy_and_namespaced_ids() {
        assert_eq!(
            read_item_id("mcp-id:mcp_1_0001 some note"),
            Some("mcp_1_0001".to_string())
        );
        assert_eq!(
            read_item_id("@mcp:id=mcp_2_0002"),
            Some("mcp_2_0002".to_string())
        );
        // Namespaced wins when both are present.
        assert_eq!(
            read_item_id("mcp-id:old @mcp:id=new"),
            Some("new".to_string())
        );
        assert_eq!(read_item_id("plain note"), None);
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_item_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "mcp");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_rewrite_note_is_idempotent() {
        let once = rewrite_note_with_id("mcp-id:old customer note", "mcp_9_1234");
        let twice = rewrite_note_with_id(&once, "mcp_9_1234");
        assert_eq!(once, twice);
        assert_eq!(once, "@mcp:id=mcp_9_1234 customer note");
    }

    #[test]
    fn test_rewrite_strips_prior_markers_of_both_forms() {
        let note = rewrite_note_with_id("@mcp:id=a mcp-id:b @mcp:role=hero", "c");
        assert_eq!(read_item_id(&note), Some("c".to_string()));
        assert!(!note.contains("mcp-id:"));
        assert_eq!(
            parse_tags(&note).get("role").map(String::as_str),
            Some("hero")
        );
    }

    fn doc_with_items(notes: &[&str]) -> (Document, Vec<ItemId>) {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let ids: Vec<ItemId> = notes
            .iter()
            .enumerate()
            .map(|(i, note)| {
                let id = doc.add_item(
                    layer,
                    ItemKind::Path,
                    format!("item_{}", i),
                    [0.0, 1.0, 1.0, 0.0],
                );
                doc.item_mut(id).note = note.to_string();
                id
            })
            .collect();
        (doc, ids)
    }

    #[test]
    fn test_assign_always_flags_conflicts() {
        let (mut doc, ids) = doc_with_items(&["mcp-id:test_id_001", "mcp-id:test_id_001"]);
        let outcomes = assign_ids(&mut doc, &ids, IdPolicy::Always);
        assert!(outcomes.iter().all(|o| o.assigned && o.conflict));
        let a = read_item_id(&doc.item(ids[0]).note).unwrap();
        let b = read_item_id(&doc.item(ids[1]).note).unwrap();
        assert_ne!(a, "test_id_001");
        assert_ne!(b, "test_id_001");
    }

    #[test]
    fn test_assign_preserve_never_writes() {
        let (mut doc, ids) = doc_with_items(&["mcp-id:test_id_001", ""]);
        let outcomes = assign_ids(&mut doc, &ids, IdPolicy::Preserve);
        assert_eq!(outcomes[0].id, Some("test_id_001".to_string()));
        assert!(!outcomes[0].assigned);
        assert_eq!(outcomes[1].id, None);
        assert_eq!(doc.item(ids[0]).note, "mcp-id:test_id_001");
    }

    #[test]
    fn test_assign_opt_in_only_fills_gaps() {
        let (mut doc, ids) = doc_with_items(&["@mcp:id=keep_me", ""]);
        let outcomes = assign_ids(&mut doc, &ids, IdPolicy::OptIn);
        assert_eq!(outcomes[0].id, Some("keep_me".to_string()));
        assert!(!outcomes[0].assigned);
        assert!(outcomes[1].assigned);
        assert!(read_item_id(&doc.item(ids[1]).note).is_some());
    }

    #[test]
    fn test_assign_locked_item_degrades() {
        let (mut doc, ids) = doc_with_items(&[""]);
        doc.item_mut(ids[0]).locked = true;
        let outcomes = assign_ids(&mut doc, &ids, IdPolicy::Always);
        assert!(!outcomes[0].assigned);
        assert!(doc.item(ids[0]).note.is_empty());
    }

    #[test]
    fn test_describe_computes_locator_and_identity() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("Artwork");
        let group = doc.add_group(layer, "g", false);
        let leaf = doc.add_child(group, ItemKind::Text, "caption", [0.0, 1.0, 1.0, 0.0]);
        doc.item_mut(leaf).note = "@mcp:id=mcp_5_0005 @mcp:role=caption".to_string();

        let item_ref = ItemRef::describe(&doc, leaf);
        assert_eq!(item_ref.locator.layer_path, "Artwork");
        assert_eq!(item_ref.locator.index_path, vec![0, 0]);
        assert_eq!(item_ref.identity.item_id, Some("mcp_5_0005".to_string()));
        assert_eq!(item_ref.identity.id_source, IdSource::Note);
        assert_eq!(item_ref.item_type, "TextFrame");
        assert_eq!(
            item_ref.tags.get("role").map(String::as_str),
            Some("caption")
        );
    }
}
