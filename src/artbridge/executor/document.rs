//! Host Document Model
//!
//! An in-process mirror of the Illustrator DOM that the task pipeline runs
//! against: an [`Application`] holding at most one active [`Document`], layers
//! holding page items, and groups (possibly clipping groups) holding nested
//! items. Coordinates follow the host convention: bounds are
//! `[left, top, right, bottom]` with Y increasing upward, so `top > bottom`.
//!
//! Items live in a flat arena on the document and reference each other by
//! [`ItemId`]. Parent links are typed ([`Parent`]): every chain terminates at
//! a layer, never at a host-defined sentinel, so walks up the tree cannot
//! run off the end.
//!
//! # Example
//!
//! ```rust
//! use artbridge::executor::document::{Document, ItemKind};
//!
//! let mut doc = Document::new("poster");
//! let layer = doc.add_layer("Artwork");
//! let rect = doc.add_item(layer, ItemKind::Path, "hero", [0.0, 100.0, 80.0, 0.0]);
//! assert_eq!(doc.item(rect).name, "hero");
//! ```

/// Rectangle in host coordinates: `[left, top, right, bottom]`, Y up.
pub type Bounds = [f64; 4];

/// Index of an item in the document's arena.
pub type ItemId = usize;

/// Index of a layer in the document's layer list.
pub type LayerId = usize;

/// What kind of page item an [`Item`] is. The `typename` strings mirror the
/// host DOM class names so reports read like the host's own.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Path,
    Group { clipped: bool },
    Text,
    Placed,
    Raster,
    Symbol,
}

impl ItemKind {
    /// Host DOM class name for this kind.
    pub fn typename(&self) -> &'static str {
        match self {
            ItemKind::Path => "PathItem",
            ItemKind::Group { .. } => "GroupItem",
            ItemKind::Text => "TextFrame",
            ItemKind::Placed => "PlacedItem",
            ItemKind::Raster => "RasterItem",
            ItemKind::Symbol => "SymbolItem",
        }
    }
}

/// Typed parent link. Chains of `Group` links always bottom out at a
/// `Layer` link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parent {
    Layer(LayerId),
    Group(ItemId),
}

/// One page item: a path, group, text frame, or placed/raster asset.
#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    pub name: String,
    pub note: String,
    /// Geometric bounds for leaf items. Group bounds are derived from
    /// children via [`Document::geometric_bounds`].
    pub bounds: Bounds,
    /// Stroke weight in points; zero for unstroked geometry.
    pub stroke_width: f64,
    pub locked: bool,
    pub hidden: bool,
    /// Item is a guide object.
    pub guides: bool,
    pub parent: Parent,
    /// Child items, front to back. Empty for leaves.
    pub children: Vec<ItemId>,
}

impl Item {
    /// Whether this item is a clipping group.
    pub fn is_clipping_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group { clipped: true })
    }
}

/// One document layer. Layers may nest; `parent == None` means top level.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub locked: bool,
    pub visible: bool,
    pub parent: Option<LayerId>,
    /// Direct page items of this layer, front to back.
    pub items: Vec<ItemId>,
}

/// A single open document: layers, an item arena, the current selection,
/// and artboard rectangles.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    layers: Vec<Layer>,
    items: Vec<Item>,
    /// Currently selected items, in selection order.
    pub selection: Vec<ItemId>,
    /// Artboard rectangles, `[left, top, right, bottom]`.
    pub artboards: Vec<Bounds>,
}

impl Document {
    /// Create an empty document with a default letter-ish artboard.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            items: Vec::new(),
            selection: Vec::new(),
            artboards: vec![[0.0, 792.0, 612.0, 0.0]],
        }
    }

    /// Append a top-level layer and return its id.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        self.layers.push(Layer {
            name: name.into(),
            locked: false,
            visible: true,
            parent: None,
            items: Vec::new(),
        });
        self.layers.len() - 1
    }

    /// Append a sublayer under `parent` and return its id.
    pub fn add_sublayer(&mut self, parent: LayerId, name: impl Into<String>) -> LayerId {
        self.layers.push(Layer {
            name: name.into(),
            locked: false,
            visible: true,
            parent: Some(parent),
            items: Vec::new(),
        });
        self.layers.len() - 1
    }

    /// Append a leaf item to a layer and return its id.
    pub fn add_item(
        &mut self,
        layer: LayerId,
        kind: ItemKind,
        name: impl Into<String>,
        bounds: Bounds,
    ) -> ItemId {
        let id = self.items.len();
        self.items.push(Item {
            kind,
            name: name.into(),
            note: String::new(),
            bounds,
            stroke_width: 0.0,
            locked: false,
            hidden: false,
            guides: false,
            parent: Parent::Layer(layer),
            children: Vec::new(),
        });
        self.layers[layer].items.push(id);
        id
    }

    /// Append an empty group to a layer and return its id.
    pub fn add_group(&mut self, layer: LayerId, name: impl Into<String>, clipped: bool) -> ItemId {
        let id = self.items.len();
        self.items.push(Item {
            kind: ItemKind::Group { clipped },
            name: name.into(),
            note: String::new(),
            bounds: [0.0, 0.0, 0.0, 0.0],
            stroke_width: 0.0,
            locked: false,
            hidden: false,
            guides: false,
            parent: Parent::Layer(layer),
            children: Vec::new(),
        });
        self.layers[layer].items.push(id);
        id
    }

    /// Append a leaf item inside a group and return its id. For clipping
    /// groups the first child added is the mask.
    pub fn add_child(
        &mut self,
        group: ItemId,
        kind: ItemKind,
        name: impl Into<String>,
        bounds: Bounds,
    ) -> ItemId {
        let id = self.items.len();
        self.items.push(Item {
            kind,
            name: name.into(),
            note: String::new(),
            bounds,
            stroke_width: 0.0,
            locked: false,
            hidden: false,
            guides: false,
            parent: Parent::Group(group),
            children: Vec::new(),
        });
        self.items[group].children.push(id);
        id
    }

    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id]
    }

    pub fn item_mut(&mut self, id: ItemId) -> &mut Item {
        &mut self.items[id]
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.layers[id]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Find a layer by exact name.
    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// The layer that ultimately owns an item, walking group parents.
    pub fn owning_layer(&self, id: ItemId) -> LayerId {
        let mut current = id;
        loop {
            match self.items[current].parent {
                Parent::Layer(layer) => return layer,
                Parent::Group(group) => current = group,
            }
        }
    }

    /// `/`-joined layer path from the outermost layer down to the owning
    /// layer, e.g. `"Artwork/Labels"`.
    pub fn layer_path(&self, id: ItemId) -> String {
        let mut names = Vec::new();
        let mut layer = Some(self.owning_layer(id));
        while let Some(l) = layer {
            names.push(self.layers[l].name.clone());
            layer = self.layers[l].parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Positional index path from the owning layer down to the item, each
    /// step found by linear scan of the parent's collection.
    pub fn index_path(&self, id: ItemId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        loop {
            match self.items[current].parent {
                Parent::Layer(layer) => {
                    let idx = self.layers[layer]
                        .items
                        .iter()
                        .position(|&i| i == current)
                        .unwrap_or(0);
                    path.push(idx);
                    break;
                }
                Parent::Group(group) => {
                    let idx = self.items[group]
                        .children
                        .iter()
                        .position(|&i| i == current)
                        .unwrap_or(0);
                    path.push(idx);
                    current = group;
                }
            }
        }
        path.reverse();
        path
    }

    /// Whether any ancestor group of the item has its clipped flag set.
    /// The mask item itself counts as clipped only through its container.
    pub fn has_clipped_ancestor(&self, id: ItemId) -> bool {
        let mut current = id;
        loop {
            match self.items[current].parent {
                Parent::Layer(_) => return false,
                Parent::Group(group) => {
                    if self.items[group].is_clipping_group() {
                        return true;
                    }
                    current = group;
                }
            }
        }
    }

    /// Geometric bounds of an item. For groups this is the union of all
    /// children, clipping or not (the host reports content extent here).
    pub fn geometric_bounds(&self, id: ItemId) -> Bounds {
        let item = &self.items[id];
        if item.children.is_empty() {
            return item.bounds;
        }
        let mut acc: Option<Bounds> = None;
        for &child in &item.children {
            let b = self.geometric_bounds(child);
            acc = Some(match acc {
                None => b,
                Some(a) => union_bounds(a, b),
            });
        }
        acc.unwrap_or(item.bounds)
    }

    /// Translate an item (and, for groups, every descendant) by `(dx, dy)`.
    pub fn translate_item(&mut self, id: ItemId, dx: f64, dy: f64) {
        let children = self.items[id].children.clone();
        if children.is_empty() {
            let b = &mut self.items[id].bounds;
            b[0] += dx;
            b[1] += dy;
            b[2] += dx;
            b[3] += dy;
        } else {
            for child in children {
                self.translate_item(child, dx, dy);
            }
        }
    }

    /// Uniformly scale an item (and descendants) about a fixed origin point.
    /// Stroke weights scale with the geometry, as with
    /// scale-strokes-and-effects in the host.
    pub fn scale_item(&mut self, id: ItemId, factor: f64, origin: (f64, f64)) {
        let children = self.items[id].children.clone();
        if children.is_empty() {
            self.items[id].stroke_width *= factor;
            let b = &mut self.items[id].bounds;
            b[0] = origin.0 + (b[0] - origin.0) * factor;
            b[1] = origin.1 + (b[1] - origin.1) * factor;
            b[2] = origin.0 + (b[2] - origin.0) * factor;
            b[3] = origin.1 + (b[3] - origin.1) * factor;
        } else {
            for child in children {
                self.scale_item(child, factor, origin);
            }
        }
    }
}

/// Smallest rectangle containing both inputs (Y up).
pub fn union_bounds(a: Bounds, b: Bounds) -> Bounds {
    [
        a[0].min(b[0]),
        a[1].max(b[1]),
        a[2].max(b[2]),
        a[3].min(b[3]),
    ]
}

/// The scripting host's application object: at most one active document.
#[derive(Debug, Clone, Default)]
pub struct Application {
    document: Option<Document>,
}

impl Application {
    /// An application with no document open.
    pub fn new() -> Self {
        Self { document: None }
    }

    /// An application with `doc` open and active.
    pub fn with_document(doc: Document) -> Self {
        Self {
            document: Some(doc),
        }
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn active_document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    /// Open a document, replacing any prior one.
    pub fn open(&mut self, doc: Document) {
        self.document = Some(doc);
    }

    pub fn close(&mut self) {
        self.document = None;
    }
}
