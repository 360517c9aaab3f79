//! Resolver laws over the built-in manifest and synthetic manifests.

use std::sync::Arc;

use artbridge::libraries::{builtin_manifest, KNOWN_LIBRARIES};
use artbridge::resolver::{LibraryManifest, LibraryResolver, ResolverError, ScriptLibrary};

#[test]
fn builtin_closure_has_disjoint_exports() {
    // The resolver refuses to build on any overlap, so resolving the full
    // set proves pairwise disjointness of every reachable library.
    let resolver = LibraryResolver::new(builtin_manifest());
    let all: Vec<&str> = KNOWN_LIBRARIES.iter().map(String::as_str).collect();
    resolver.resolve(&all, "1;").unwrap();
}

#[test]
fn each_library_included_exactly_once_across_overlapping_requests() {
    let resolver = LibraryResolver::new(builtin_manifest());
    // presets and selection both depend on geometry (and transitively core).
    let script = resolver
        .resolve(&["presets", "selection", "geometry"], "done();")
        .unwrap();
    assert_eq!(script.matches("// --- library: geometry ---").count(), 1);
    assert_eq!(script.matches("// --- library: core ---").count(), 1);
    assert_eq!(script.matches("var AB_POINTS_PER_MM").count(), 1);
}

#[test]
fn dependencies_precede_dependents_in_concatenation() {
    let resolver = LibraryResolver::new(builtin_manifest());
    let script = resolver.resolve(&["presets"], "x();").unwrap();
    let order: Vec<usize> = ["json2", "core", "geometry", "layout", "presets"]
        .iter()
        .map(|name| script.find(&format!("// --- library: {} ---", name)).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
    assert!(script.trim_end().ends_with("x();"));
}

#[test]
fn deep_cycle_is_reported_not_looped() {
    let mut manifest = LibraryManifest::new();
    manifest.register(ScriptLibrary::new("a", "", &["b"], &["A"]));
    manifest.register(ScriptLibrary::new("b", "", &["c"], &["B"]));
    manifest.register(ScriptLibrary::new("c", "", &["a"], &["C"]));
    let resolver = LibraryResolver::new(manifest);
    match resolver.resolve(&["a"], "").unwrap_err() {
        ResolverError::DependencyCycle { from, to } => {
            assert_eq!((from.as_str(), to.as_str()), ("c", "a"));
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn collision_in_transitive_closure_is_refused() {
    let mut manifest = builtin_manifest();
    // A user library that shadows a geometry export.
    manifest.register(ScriptLibrary::new(
        "user_geometry",
        "function getVisibleBounds(i) { return i.geometricBounds; }",
        &[],
        &["getVisibleBounds"],
    ));
    let resolver = LibraryResolver::new(manifest);
    match resolver.resolve(&["presets", "user_geometry"], "").unwrap_err() {
        ResolverError::ExportCollision { symbol, .. } => {
            assert_eq!(symbol, "getVisibleBounds");
        }
        other => panic!("expected collision, got {:?}", other),
    }
}

#[test]
fn concurrent_resolutions_share_the_cache() {
    let resolver = Arc::new(LibraryResolver::new(builtin_manifest()));
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let resolver = resolver.clone();
            std::thread::spawn(move || {
                let body = format!("call_{}();", i);
                resolver.resolve(&["presets", "assets"], &body).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // One request set, one cache entry, regardless of bodies and threads.
    assert_eq!(resolver.cache_len(), 1);
}
