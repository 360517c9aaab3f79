//! Geometry Helpers
//!
//! Bounds math shared by collection, layout, and reporting. The one policy
//! decision lives here: what "visible bounds" means for a clipping group.
//! The host's native `visibleBounds` reports the masked *content* extent;
//! the mask-bounds policy reports the mask path's geometric bounds instead,
//! which is what layout wants. Callers choose via
//! `use_mask_bounds_for_clipped_groups`.

use super::document::{union_bounds, Bounds, Document, ItemId};

/// Points per millimetre. The exact factor used on the wire; do not round.
pub const POINTS_PER_MM: f64 = 2.83464567;

/// Convert millimetres to points.
pub fn mm_to_points(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

/// Convert points to millimetres.
pub fn points_to_mm(points: f64) -> f64 {
    points / POINTS_PER_MM
}

/// Width of a bounds rectangle.
pub fn bounds_width(b: Bounds) -> f64 {
    b[2] - b[0]
}

/// Height of a bounds rectangle (Y up: top minus bottom).
pub fn bounds_height(b: Bounds) -> f64 {
    b[1] - b[3]
}

pub fn bounds_area(b: Bounds) -> f64 {
    bounds_width(b) * bounds_height(b)
}

/// Visible bounds of an item.
///
/// - Leaves: geometric bounds grown by half the stroke weight per side.
/// - Clipping groups under the mask-bounds policy: the mask path's
///   geometric bounds (the mask is the first child).
/// - Other groups (and clipping groups under the content policy): union of
///   the children's visible bounds.
pub fn visible_bounds(doc: &Document, id: ItemId, use_mask_bounds_for_clipped_groups: bool) -> Bounds {
    let item = doc.item(id);
    if item.children.is_empty() {
        return expand_by_stroke(item.bounds, item.stroke_width);
    }
    if item.is_clipping_group() && use_mask_bounds_for_clipped_groups {
        if let Some(&mask) = item.children.first() {
            return doc.geometric_bounds(mask);
        }
    }
    let mut acc: Option<Bounds> = None;
    for &child in &item.children {
        let b = visible_bounds(doc, child, use_mask_bounds_for_clipped_groups);
        acc = Some(match acc {
            None => b,
            Some(a) => union_bounds(a, b),
        });
    }
    acc.unwrap_or(item.bounds)
}

fn expand_by_stroke(b: Bounds, stroke_width: f64) -> Bounds {
    if stroke_width <= 0.0 {
        return b;
    }
    let half = stroke_width / 2.0;
    [b[0] - half, b[1] + half, b[2] + half, b[3] - half]
}
