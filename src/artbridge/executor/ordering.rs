//! Collection Ordering and Exclusion
//!
//! Applied by the executor exactly once, after target resolution: first the
//! global exclusion filter, then the `orderBy` sort. Every mode is a stable
//! sort over the input sequence, so ties keep host stacking order and two
//! runs over the same document produce the same sequence.

use super::document::{Document, ItemId};
use super::geometry::{bounds_area, visible_bounds};
use super::payload::{ExcludeFilter, OrderBy};

/// Row/column bucket size in points for the `reading` and `column` modes.
const ORDER_BUCKET: f64 = 10.0;

fn bucket(value: f64) -> i64 {
    (value / ORDER_BUCKET).round() as i64
}

/// Drop items matching any enabled exclusion predicate. `clipped` means
/// "has an ancestor group whose clipped flag is set", not "is the mask".
pub fn apply_exclusion(doc: &Document, items: Vec<ItemId>, filter: &ExcludeFilter) -> Vec<ItemId> {
    if !filter.is_active() {
        return items;
    }
    items
        .into_iter()
        .filter(|&id| {
            let item = doc.item(id);
            let excluded = (filter.locked && item.locked)
                || (filter.hidden && item.hidden)
                || (filter.guides && item.guides)
                || (filter.clipped && doc.has_clipped_ancestor(id));
            !excluded
        })
        .collect()
}

/// Stable sort of `items` per the ordering mode. The input sequence is host
/// stacking order, so `zOrder` is the identity.
pub fn order_items(
    doc: &Document,
    mut items: Vec<ItemId>,
    order_by: OrderBy,
    use_mask_bounds: bool,
) -> Vec<ItemId> {
    match order_by {
        OrderBy::ZOrder => items,
        OrderBy::ZOrderReverse => {
            items.reverse();
            items
        }
        OrderBy::Name => {
            items.sort_by(|&a, &b| doc.item(a).name.cmp(&doc.item(b).name));
            items
        }
        OrderBy::Reading => sort_by_key2(doc, items, use_mask_bounds, |vb| {
            (-bucket(vb[1]) as f64, vb[0])
        }),
        OrderBy::Column => sort_by_key2(doc, items, use_mask_bounds, |vb| {
            (bucket(vb[0]) as f64, -vb[1])
        }),
        OrderBy::PositionX => sort_by_key2(doc, items, use_mask_bounds, |vb| (vb[0], 0.0)),
        OrderBy::PositionY => sort_by_key2(doc, items, use_mask_bounds, |vb| (-vb[1], 0.0)),
        OrderBy::Area => sort_by_key2(doc, items, use_mask_bounds, |vb| (bounds_area(vb), 0.0)),
    }
}

fn sort_by_key2<F>(
    doc: &Document,
    items: Vec<ItemId>,
    use_mask_bounds: bool,
    key: F,
) -> Vec<ItemId>
where
    F: Fn([f64; 4]) -> (f64, f64),
{
    let mut keyed: Vec<(ItemId, (f64, f64))> = items
        .into_iter()
        .map(|id| (id, key(visible_bounds(doc, id, use_mask_bounds))))
        .collect();
    keyed.sort_by(|a, b| {
        a.1 .0
            .partial_cmp(&b.1 .0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1 .1.partial_cmp(&b.1 .1).unwrap_or(std::cmp::Ordering::Equal))
    });
    keyed.into_iter().map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artbridge::executor::document::ItemKind;

    fn sample_doc() -> (Document, Vec<ItemId>) {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let big = doc.add_item(layer, ItemKind::Path, "big", [0.0, 100.0, 50.0, 0.0]);
        let mid = doc.add_item(layer, ItemKind::Path, "mid", [60.0, 90.0, 90.0, 60.0]);
        let tiny = doc.add_item(layer, ItemKind::Path, "", [100.0, 95.0, 105.0, 90.0]);
        (doc, vec![big, mid, tiny])
    }

    #[test]
    fn test_z_order_is_identity_and_reverse_reverses() {
        let (doc, items) = sample_doc();
        assert_eq!(
            order_items(&doc, items.clone(), OrderBy::ZOrder, true),
            items
        );
        let mut reversed = items.clone();
        reversed.reverse();
        assert_eq!(
            order_items(&doc, items, OrderBy::ZOrderReverse, true),
            reversed
        );
    }

    #[test]
    fn test_name_sort_puts_empty_names_first() {
        let (doc, items) = sample_doc();
        let ordered = order_items(&doc, items.clone(), OrderBy::Name, true);
        assert_eq!(doc.item(ordered[0]).name, "");
        assert_eq!(doc.item(ordered[1]).name, "big");
        assert_eq!(doc.item(ordered[2]).name, "mid");
    }

    #[test]
    fn test_area_ascending() {
        let (doc, items) = sample_doc();
        let ordered = order_items(&doc, items, OrderBy::Area, true);
        let names: Vec<&str> = ordered.iter().map(|&i| doc.item(i).name.as_str()).collect();
        assert_eq!(names, vec!["", "mid", "big"]);
    }

    #[test]
    fn test_position_y_is_visual_top_first() {
        let (doc, items) = sample_doc();
        let ordered = order_items(&doc, items, OrderBy::PositionY, true);
        let names: Vec<&str> = ordered.iter().map(|&i| doc.item(i).name.as_str()).collect();
        assert_eq!(names, vec!["big", "", "mid"]);
    }

    #[test]
    fn test_reading_buckets_rows_before_left() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        // Same 10-unit row despite a 3-point top difference.
        let right = doc.add_item(layer, ItemKind::Path, "right", [50.0, 101.0, 60.0, 91.0]);
        let left = doc.add_item(layer, ItemKind::Path, "left", [0.0, 98.0, 10.0, 88.0]);
        let below = doc.add_item(layer, ItemKind::Path, "below", [0.0, 60.0, 10.0, 50.0]);
        let ordered = order_items(&doc, vec![below, right, left], OrderBy::Reading, true);
        let names: Vec<&str> = ordered.iter().map(|&i| doc.item(i).name.as_str()).collect();
        assert_eq!(names, vec!["left", "right", "below"]);
    }

    #[test]
    fn test_exclusion_predicates_or_together() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let plain = doc.add_item(layer, ItemKind::Path, "plain", [0.0, 1.0, 1.0, 0.0]);
        let locked = doc.add_item(layer, ItemKind::Path, "locked", [0.0, 1.0, 1.0, 0.0]);
        doc.item_mut(locked).locked = true;
        let hidden = doc.add_item(layer, ItemKind::Path, "hidden", [0.0, 1.0, 1.0, 0.0]);
        doc.item_mut(hidden).hidden = true;

        let filter = ExcludeFilter {
            locked: true,
            hidden: true,
            ..Default::default()
        };
        let kept = apply_exclusion(&doc, vec![plain, locked, hidden], &filter);
        assert_eq!(kept, vec![plain]);
    }

    #[test]
    fn test_exclusion_clipped_targets_descendants_not_container() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let clip = doc.add_group(layer, "clip", true);
        let mask = doc.add_child(clip, ItemKind::Path, "mask", [0.0, 1.0, 1.0, 0.0]);
        let filter = ExcludeFilter {
            clipped: true,
            ..Default::default()
        };
        let kept = apply_exclusion(&doc, vec![clip, mask], &filter);
        assert_eq!(kept, vec![clip]);
    }
}
