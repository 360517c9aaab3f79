//! Built-in Panel Script Libraries
//!
//! The ExtendScript fragments the tool surface requests through the
//! resolver. Each fragment declares the symbols it defines and the
//! libraries it needs; the resolver handles ordering and collision checks.
//!
//! These are the panel-side twins of the executor's support modules: the
//! same bounds policy, the same mm conversion factor, the same grid
//! presets. Keep the constants in lockstep with the Rust side.

use lazy_static::lazy_static;

use crate::artbridge::resolver::{LibraryManifest, ScriptLibrary};

const JSON2_SRC: &str = r#"
// Minimal JSON shim for ExtendScript hosts without a native JSON object.
if (typeof JSON === 'undefined') {
    JSON = {
        stringify: function (value) { return _abSerialize(value); },
        parse: function (text) { return eval('(' + text + ')'); }
    };
}
function _abSerialize(v) {
    if (v === null || v === undefined) return 'null';
    if (typeof v === 'number' || typeof v === 'boolean') return String(v);
    if (typeof v === 'string') return '"' + v.replace(/\\/g, '\\\\').replace(/"/g, '\\"').replace(/\n/g, '\\n') + '"';
    if (v instanceof Array) {
        var parts = [];
        for (var i = 0; i < v.length; i++) parts.push(_abSerialize(v[i]));
        return '[' + parts.join(',') + ']';
    }
    var keys = [];
    for (var k in v) if (v.hasOwnProperty(k)) keys.push('"' + k + '":' + _abSerialize(v[k]));
    return '{' + keys.join(',') + '}';
}
"#;

const CORE_SRC: &str = r#"
// Result envelope helpers shared by every generated script.
function abEnvelope(success, result, error, line) {
    var envelope = { success: success };
    if (result !== undefined) envelope.result = result;
    if (error !== undefined) envelope.error = String(error);
    if (line !== undefined) envelope.line = line;
    return JSON.stringify(envelope);
}
function abSafeRun(body) {
    try {
        return abEnvelope(true, body());
    } catch (e) {
        return abEnvelope(false, undefined, e.message, e.line);
    }
}
"#;

const GEOMETRY_SRC: &str = r#"
var AB_POINTS_PER_MM = 2.83464567;
function mmToPoints(mm) { return mm * AB_POINTS_PER_MM; }
function pointsToMm(pt) { return pt / AB_POINTS_PER_MM; }
// Visible bounds with the mask policy: clipping groups report the clipping
// path's geometric bounds, not the masked content's.
function getVisibleBounds(item) {
    if (item.typename === 'GroupItem' && item.clipped) {
        for (var i = 0; i < item.pageItems.length; i++) {
            if (item.pageItems[i].clipping) return item.pageItems[i].geometricBounds;
        }
        return item.pageItems.length ? item.pageItems[0].geometricBounds : item.geometricBounds;
    }
    return item.visibleBounds;
}
"#;

const SELECTION_SRC: &str = r#"
var AB_SPATIAL_TOLERANCE = 5;
function orderSelection(items, mode) {
    var keyed = [];
    for (var i = 0; i < items.length; i++) {
        var b = getVisibleBounds(items[i]);
        keyed.push({ item: items[i], row: Math.round(b[1] / AB_SPATIAL_TOLERANCE), col: Math.round(b[0] / AB_SPATIAL_TOLERANCE), left: b[0], top: b[1], seq: i });
    }
    keyed.sort(function (a, b) {
        if (mode === 'column-major') {
            return (a.col - b.col) || (b.top - a.top) || (a.seq - b.seq);
        }
        return (b.row - a.row) || (a.left - b.left) || (a.seq - b.seq);
    });
    var out = [];
    for (var j = 0; j < keyed.length; j++) out.push(keyed[j].item);
    return out;
}
"#;

const LAYOUT_SRC: &str = r#"
// Row-then-column placement by visible-bounds deltas, so stroked paths and
// clipped groups land at their apparent position.
function arrangeGrid(items, columns, gapX, gapY, startX, startY) {
    var x = startX, y = startY, rowHeight = 0;
    for (var i = 0; i < items.length; i++) {
        if (i > 0 && i % columns === 0) {
            x = startX;
            y -= rowHeight + gapY;
            rowHeight = 0;
        }
        var b = getVisibleBounds(items[i]);
        items[i].translate(x - b[0], y - b[1]);
        x += (b[2] - b[0]) + gapX;
        if (b[1] - b[3] > rowHeight) rowHeight = b[1] - b[3];
    }
}
"#;

const PRESETS_SRC: &str = r#"
var GRID_PRESETS = {
    '2x2': { cols: 2, rows: 2, margin: 24, gutter: 12 },
    '3x1': { cols: 3, rows: 1, margin: 24, gutter: 12 },
    '1x3': { cols: 1, rows: 3, margin: 24, gutter: 12 },
    '2x3': { cols: 2, rows: 3, margin: 24, gutter: 12 },
    '3x2': { cols: 3, rows: 2, margin: 24, gutter: 12 },
    '1x2': { cols: 1, rows: 2, margin: 24, gutter: 12 },
    '2x1': { cols: 2, rows: 1, margin: 24, gutter: 12 }
};
function computeSlotGeometry(preset, board) {
    var left = board[0] + preset.margin, top = board[1] - preset.margin;
    var right = board[2] - preset.margin, bottom = board[3] + preset.margin;
    var w = (right - left - preset.gutter * (preset.cols - 1)) / preset.cols;
    var h = (top - bottom - preset.gutter * (preset.rows - 1)) / preset.rows;
    var slots = [];
    for (var r = 0; r < preset.rows; r++) {
        for (var c = 0; c < preset.cols; c++) {
            var sl = left + c * (w + preset.gutter);
            var st = top - r * (h + preset.gutter);
            slots.push([sl, st, sl + w, st - h]);
        }
    }
    return slots;
}
function fitToSlot(item, slot, mode) {
    var b = getVisibleBounds(item);
    var vw = b[2] - b[0], vh = b[1] - b[3];
    if (vw <= 0 || vh <= 0) return;
    var sw = slot[2] - slot[0], sh = slot[1] - slot[3];
    var s = (mode === 'cover') ? Math.max(sw / vw, sh / vh) : Math.min(sw / vw, sh / vh);
    item.resize(s * 100, s * 100, true, true, true, true, s * 100);
    // Anchor from the post-scale visible bounds keeps this idempotent.
    var a = getVisibleBounds(item);
    item.translate(slot[0] + (sw - (a[2] - a[0])) / 2 - a[0], slot[1] - (sh - (a[1] - a[3])) / 2 - a[1]);
}
"#;

const TASKS_SRC: &str = r#"
// Task dispatch and the in-session history ring (last 50 reports).
var AB_TASKS = {};
var AB_TASK_HISTORY = [];
function registerTask(name, fn) { AB_TASKS[name] = fn; }
function runTask(payload) {
    return abSafeRun(function () {
        var fn = AB_TASKS[payload.task];
        if (!fn) throw new Error('unknown task: ' + payload.task);
        var report = fn(payload);
        AB_TASK_HISTORY.push({ task: payload.task, report: report });
        if (AB_TASK_HISTORY.length > 50) AB_TASK_HISTORY.shift();
        return report;
    });
}
"#;

const ASSETS_SRC: &str = r#"
function analyzePlacedItem(item) {
    var b = getVisibleBounds(item);
    var w = b[2] - b[0], h = b[1] - b[3];
    if (w <= 0 || h <= 0) return null;
    var ratio = w / h;
    var orientation = 'square';
    if (ratio > 1.05) orientation = 'landscape';
    else if (ratio < 0.95) orientation = 'portrait';
    return { width: w, height: h, aspectRatio: ratio, orientation: orientation };
}
"#;

/// The fragment manifest shipped with the bridge.
pub fn builtin_manifest() -> LibraryManifest {
    let mut manifest = LibraryManifest::new();
    manifest.register(ScriptLibrary::new("json2", JSON2_SRC, &[], &["JSON", "_abSerialize"]));
    manifest.register(ScriptLibrary::new(
        "core",
        CORE_SRC,
        &["json2"],
        &["abEnvelope", "abSafeRun"],
    ));
    manifest.register(ScriptLibrary::new(
        "geometry",
        GEOMETRY_SRC,
        &["core"],
        &["AB_POINTS_PER_MM", "mmToPoints", "pointsToMm", "getVisibleBounds"],
    ));
    manifest.register(ScriptLibrary::new(
        "selection",
        SELECTION_SRC,
        &["geometry"],
        &["AB_SPATIAL_TOLERANCE", "orderSelection"],
    ));
    manifest.register(ScriptLibrary::new(
        "layout",
        LAYOUT_SRC,
        &["geometry"],
        &["arrangeGrid"],
    ));
    manifest.register(ScriptLibrary::new(
        "presets",
        PRESETS_SRC,
        &["geometry", "layout"],
        &["GRID_PRESETS", "computeSlotGeometry", "fitToSlot"],
    ));
    manifest.register(ScriptLibrary::new(
        "assets",
        ASSETS_SRC,
        &["geometry"],
        &["analyzePlacedItem"],
    ));
    manifest.register(ScriptLibrary::new(
        "tasks",
        TASKS_SRC,
        &["core"],
        &["AB_TASKS", "AB_TASK_HISTORY", "registerTask", "runTask"],
    ));
    manifest
}

lazy_static! {
    /// Library names a tool may request, sorted.
    pub static ref KNOWN_LIBRARIES: Vec<String> = builtin_manifest()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
}
