//! Layout: Grid Presets and Slot Fitting
//!
//! Everything here works in visible-bounds space, not anchor positions, so
//! stroked paths and clipped groups land where they appear to land. Slot
//! rectangles come back in host coordinates (Y up, `top > bottom`).
//!
//! `fit_to_slot` is idempotent: the anchor correction is derived from the
//! item's *post-scale* visible bounds, so applying the same fit twice moves
//! nothing the second time.

use super::document::{Bounds, Document, ItemId};
use super::geometry::{bounds_height, bounds_width, visible_bounds};

/// A named grid: `cols` across, `rows` down, with an outer margin and an
/// inter-slot gutter, both in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPreset {
    pub name: &'static str,
    pub cols: usize,
    pub rows: usize,
    pub margin: f64,
    pub gutter: f64,
}

/// The built-in presets, named `<cols>x<rows>`.
pub static PRESETS: [GridPreset; 7] = [
    GridPreset { name: "2x2", cols: 2, rows: 2, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "3x1", cols: 3, rows: 1, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "1x3", cols: 1, rows: 3, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "2x3", cols: 2, rows: 3, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "3x2", cols: 3, rows: 2, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "1x2", cols: 1, rows: 2, margin: 24.0, gutter: 12.0 },
    GridPreset { name: "2x1", cols: 2, rows: 1, margin: 24.0, gutter: 12.0 },
];

/// Look up a preset by its `<cols>x<rows>` name.
pub fn preset_by_name(name: &str) -> Option<&'static GridPreset> {
    PRESETS.iter().find(|p| p.name == name)
}

/// Absolute slot rectangles for a preset on an artboard, row-major from the
/// top-left slot.
pub fn compute_slot_geometry(preset: &GridPreset, artboard: Bounds) -> Vec<Bounds> {
    let inner_left = artboard[0] + preset.margin;
    let inner_top = artboard[1] - preset.margin;
    let inner_right = artboard[2] - preset.margin;
    let inner_bottom = artboard[3] + preset.margin;

    let cols = preset.cols.max(1);
    let rows = preset.rows.max(1);
    let slot_w = (inner_right - inner_left - preset.gutter * (cols - 1) as f64) / cols as f64;
    let slot_h = (inner_top - inner_bottom - preset.gutter * (rows - 1) as f64) / rows as f64;

    let mut slots = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            let left = inner_left + col as f64 * (slot_w + preset.gutter);
            let top = inner_top - row as f64 * (slot_h + preset.gutter);
            slots.push([left, top, left + slot_w, top - slot_h]);
        }
    }
    slots
}

/// How an item is scaled into a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Scale so the item fits entirely inside the slot.
    Contain,
    /// Scale so the item covers the slot entirely.
    Cover,
}

/// Scale and center an item into a slot rectangle.
///
/// The scale factor comes from the current visible bounds; the centering
/// translation comes from the visible bounds measured *after* scaling, so a
/// second application finds a factor of 1 and a zero translation.
pub fn fit_to_slot(
    doc: &mut Document,
    item: ItemId,
    slot: Bounds,
    mode: FitMode,
    use_mask_bounds: bool,
) {
    let vb = visible_bounds(doc, item, use_mask_bounds);
    let (vw, vh) = (bounds_width(vb), bounds_height(vb));
    if vw <= 0.0 || vh <= 0.0 {
        return;
    }
    let (sw, sh) = (bounds_width(slot), bounds_height(slot));
    let scale = match mode {
        FitMode::Contain => (sw / vw).min(sh / vh),
        FitMode::Cover => (sw / vw).max(sh / vh),
    };
    doc.scale_item(item, scale, (vb[0], vb[1]));

    let after = visible_bounds(doc, item, use_mask_bounds);
    let dx = slot[0] + (sw - bounds_width(after)) / 2.0 - after[0];
    let dy = slot[1] - (sh - bounds_height(after)) / 2.0 - after[1];
    doc.translate_item(item, dx, dy);
}

/// Place items in a row-then-column grid: visible top-left corners advance
/// by visible-bounds widths plus `gap_x`; a new row starts every `columns`
/// items, stepping down by the tallest item in the finished row plus
/// `gap_y`.
pub fn arrange_grid(
    doc: &mut Document,
    items: &[ItemId],
    columns: usize,
    gap_x: f64,
    gap_y: f64,
    start: (f64, f64),
    use_mask_bounds: bool,
) {
    let columns = columns.max(1);
    let mut x = start.0;
    let mut y = start.1;
    let mut row_height: f64 = 0.0;

    for (index, &item) in items.iter().enumerate() {
        if index > 0 && index % columns == 0 {
            x = start.0;
            y -= row_height + gap_y;
            row_height = 0.0;
        }
        let vb = visible_bounds(doc, item, use_mask_bounds);
        doc.translate_item(item, x - vb[0], y - vb[1]);
        x += bounds_width(vb) + gap_x;
        row_height = row_height.max(bounds_height(vb));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artbridge::executor::document::ItemKind;

    #[test]
    fn test_preset_lookup() {
        assert_eq!(preset_by_name("2x3").unwrap().rows, 3);
        assert!(preset_by_name("4x4").is_none());
    }

    #[test]
    fn test_slot_geometry_2x2() {
        let preset = GridPreset {
            name: "2x2",
            cols: 2,
            rows: 2,
            margin: 10.0,
            gutter: 10.0,
        };
        let slots = compute_slot_geometry(&preset, [0.0, 230.0, 230.0, 0.0]);
        assert_eq!(slots.len(), 4);
        // Inner area 210x210, slots 100x100.
        assert_eq!(slots[0], [10.0, 220.0, 110.0, 120.0]);
        assert_eq!(slots[1], [120.0, 220.0, 220.0, 120.0]);
        assert_eq!(slots[2], [10.0, 110.0, 110.0, 10.0]);
        // Y up: every slot has top > bottom.
        assert!(slots.iter().all(|s| s[1] > s[3]));
    }

    #[test]
    fn test_fit_contain_centers_in_slot() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        // 2:1 landscape into a 100x100 slot: scaled to 100x50, centered.
        let id = doc.add_item(layer, ItemKind::Path, "r", [0.0, 50.0, 100.0, 0.0]);
        fit_to_slot(&mut doc, id, [200.0, 300.0, 300.0, 200.0], FitMode::Contain, true);
        let vb = visible_bounds(&doc, id, true);
        assert!((vb[0] - 200.0).abs() < 1e-9);
        assert!((vb[2] - 300.0).abs() < 1e-9);
        assert!((vb[1] - 275.0).abs() < 1e-9);
        assert!((vb[3] - 225.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_idempotent_even_with_stroke() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let id = doc.add_item(layer, ItemKind::Path, "r", [0.0, 80.0, 40.0, 0.0]);
        doc.item_mut(id).stroke_width = 6.0;
        let slot = [10.0, 110.0, 110.0, 10.0];

        fit_to_slot(&mut doc, id, slot, FitMode::Contain, true);
        let first = visible_bounds(&doc, id, true);
        fit_to_slot(&mut doc, id, slot, FitMode::Contain, true);
        let second = visible_bounds(&doc, id, true);

        for side in 0..4 {
            assert!(
                (first[side] - second[side]).abs() < 1e-9,
                "side {} drifted: {} -> {}",
                side,
                first[side],
                second[side]
            );
        }
    }

    #[test]
    fn test_fit_uses_mask_bounds_for_clipping_group() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let clip = doc.add_group(layer, "clip", true);
        doc.add_child(clip, ItemKind::Path, "mask", [0.0, 50.0, 50.0, 0.0]);
        doc.add_child(clip, ItemKind::Path, "photo", [-100.0, 200.0, 300.0, -100.0]);

        fit_to_slot(&mut doc, clip, [0.0, 100.0, 100.0, 0.0], FitMode::Contain, true);
        let vb = visible_bounds(&doc, clip, true);
        assert!((vb[0] - 0.0).abs() < 1e-9);
        assert!((vb[1] - 100.0).abs() < 1e-9);
        assert!((vb[2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_arrange_grid_gap_spacing() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let items: Vec<_> = (0..3)
            .map(|i| {
                doc.add_item(
                    layer,
                    ItemKind::Path,
                    format!("r{}", i),
                    [0.0, 60.0 + i as f64, 100.0, 0.0],
                )
            })
            .collect();

        arrange_grid(&mut doc, &items, 3, 8.5, 8.5, (40.0, 200.0), true);

        let lefts: Vec<f64> = items
            .iter()
            .map(|&id| visible_bounds(&doc, id, true)[0])
            .collect();
        assert_eq!(lefts, vec![40.0, 148.5, 257.0]);

        // Gaps are exact and neighbors do not overlap.
        for pair in items.windows(2) {
            let a = visible_bounds(&doc, pair[0], true);
            let b = visible_bounds(&doc, pair[1], true);
            assert!((b[0] - a[2] - 8.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_arrange_grid_wraps_rows() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let items: Vec<_> = (0..4)
            .map(|i| {
                doc.add_item(
                    layer,
                    ItemKind::Path,
                    format!("r{}", i),
                    [0.0, 50.0, 50.0, 0.0],
                )
            })
            .collect();

        arrange_grid(&mut doc, &items, 2, 10.0, 10.0, (0.0, 200.0), true);

        let third = visible_bounds(&doc, items[2], true);
        assert!((third[0] - 0.0).abs() < 1e-9);
        assert!((third[1] - 140.0).abs() < 1e-9);
    }
}
