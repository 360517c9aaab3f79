//! Target Resolution
//!
//! Resolves a [`Target`] into the candidate item sequence for a task.
//! Resolution is purely structural and read-only: layers are walked in
//! document order, groups are descended only when the target asks for it,
//! and compound targets concatenate their sub-resolutions in declaration
//! order before applying their local exclusion. The global exclusion and
//! ordering are *not* applied here; the executor does that exactly once
//! after collection.

use regex::Regex;

use super::document::{Document, ItemId, LayerId};
use super::ordering::apply_exclusion;
use super::payload::Target;
use super::report::{ErrorCode, Stage, TaskError};

/// Compile a `*`/`?` wildcard into an anchored regex.
///
/// `*` matches any run of characters, `?` exactly one; everything else is
/// literal.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex, TaskError> {
    let mut translated = String::with_capacity(pattern.len() + 4);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|e| {
        TaskError::new(
            ErrorCode::R001,
            Stage::Collect,
            format!("invalid name pattern '{}': {}", pattern, e),
        )
    })
}

fn collect_layer_items(doc: &Document, layer: LayerId, recursive: bool, out: &mut Vec<ItemId>) {
    for &item in &doc.layer(layer).items {
        push_item(doc, item, recursive, out);
    }
}

fn push_item(doc: &Document, id: ItemId, recursive: bool, out: &mut Vec<ItemId>) {
    out.push(id);
    if recursive {
        for &child in &doc.item(id).children {
            push_item(doc, child, recursive, out);
        }
    }
}

/// Resolve a target into candidate items. This is the standard collector
/// the executor installs when the caller does not supply one.
pub fn collect_items(doc: &Document, target: &Target) -> Result<Vec<ItemId>, TaskError> {
    match target {
        Target::Selection => Ok(doc.selection.clone()),
        Target::All { recursive } => {
            let mut out = Vec::new();
            for layer in 0..doc.layers().len() {
                collect_layer_items(doc, layer, *recursive, &mut out);
            }
            Ok(out)
        }
        Target::Layer { layer, recursive } => {
            let layer_id = doc.layer_by_name(layer).ok_or_else(|| {
                TaskError::new(
                    ErrorCode::R001,
                    Stage::Collect,
                    format!("layer '{}' not found", layer),
                )
            })?;
            let mut out = Vec::new();
            collect_layer_items(doc, layer_id, *recursive, &mut out);
            Ok(out)
        }
        Target::Query {
            layer,
            item_type,
            pattern,
            recursive,
        } => {
            let name_re = match pattern {
                Some(p) => Some(wildcard_to_regex(p)?),
                None => None,
            };
            let mut candidates = Vec::new();
            for layer_id in 0..doc.layers().len() {
                if let Some(wanted) = layer {
                    if &doc.layer(layer_id).name != wanted {
                        continue;
                    }
                }
                collect_layer_items(doc, layer_id, *recursive, &mut candidates);
            }
            Ok(candidates
                .into_iter()
                .filter(|&id| {
                    let item = doc.item(id);
                    if let Some(wanted) = item_type {
                        if item.kind.typename() != wanted {
                            return false;
                        }
                    }
                    if let Some(re) = &name_re {
                        if !re.is_match(&item.name) {
                            return false;
                        }
                    }
                    true
                })
                .collect())
        }
        Target::Compound { any_of, exclude } => {
            let mut out = Vec::new();
            for sub in any_of {
                out.extend(collect_items(doc, sub)?);
            }
            if let Some(filter) = exclude {
                out = apply_exclusion(doc, out, filter);
            }
            Ok(out)
        }
    }
}
