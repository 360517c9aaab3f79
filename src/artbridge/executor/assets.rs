//! Placed/Raster Asset Analysis
//!
//! Answers the layout-facing questions about an imported asset: how wide is
//! it relative to its height, and which way does it face. Ratios within 5%
//! of 1.0 count as square so near-square crops don't flip between
//! orientations run to run.

use serde::{Deserialize, Serialize};

use super::document::{Document, ItemId, ItemKind};
use super::geometry::{bounds_height, bounds_width, visible_bounds};

/// Dead zone half-width around an aspect ratio of 1.0.
const SQUARE_TOLERANCE: f64 = 0.05;

/// Which way an asset faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

/// Shape summary of one placed or rasterized asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub width: f64,
    pub height: f64,
    /// Width over height.
    pub aspect_ratio: f64,
    pub orientation: Orientation,
}

/// Classify a width/height ratio with the square dead zone.
pub fn classify_ratio(aspect_ratio: f64) -> Orientation {
    if (aspect_ratio - 1.0).abs() <= SQUARE_TOLERANCE {
        Orientation::Square
    } else if aspect_ratio > 1.0 {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// Analyze a placed or raster item. Other kinds are not assets and return
/// `None`, as does anything with a degenerate height.
pub fn analyze_item(doc: &Document, id: ItemId, use_mask_bounds: bool) -> Option<AssetInfo> {
    let item = doc.item(id);
    if !matches!(item.kind, ItemKind::Placed | ItemKind::Raster) {
        return None;
    }
    let vb = visible_bounds(doc, id, use_mask_bounds);
    let width = bounds_width(vb);
    let height = bounds_height(vb);
    if height <= 0.0 || width <= 0.0 {
        return None;
    }
    let aspect_ratio = width / height;
    Some(AssetInfo {
        width,
        height,
        aspect_ratio,
        orientation: classify_ratio(aspect_ratio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_classification_dead_zone() {
        assert_eq!(classify_ratio(1.0), Orientation::Square);
        assert_eq!(classify_ratio(1.05), Orientation::Square);
        assert_eq!(classify_ratio(0.95), Orientation::Square);
        assert_eq!(classify_ratio(1.06), Orientation::Landscape);
        assert_eq!(classify_ratio(0.94), Orientation::Portrait);
    }

    #[test]
    fn test_analyze_placed_item() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let id = doc.add_item(layer, ItemKind::Placed, "photo", [0.0, 100.0, 160.0, 0.0]);
        let info = analyze_item(&doc, id, true).unwrap();
        assert_eq!(info.width, 160.0);
        assert_eq!(info.height, 100.0);
        assert_eq!(info.orientation, Orientation::Landscape);
    }

    #[test]
    fn test_analyze_rejects_non_assets() {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        let path = doc.add_item(layer, ItemKind::Path, "p", [0.0, 10.0, 10.0, 0.0]);
        assert!(analyze_item(&doc, path, true).is_none());
    }
}
