//! Script Library Resolver
//!
//! Panel scripts are assembled from a manifest of interdependent fragments:
//! a tool requests the libraries it needs, and the resolver prepends the
//! transitive closure — each library exactly once, dependencies before
//! dependents — to the tool's script body.
//!
//! Two failure modes are refused outright rather than papered over:
//!
//! - **Cycles**: a dependency loop fails fast naming the offending edge.
//! - **Export collisions**: two selected libraries declaring the same
//!   symbol fail naming both libraries and the symbol, because the second
//!   definition would silently shadow the first inside the host.
//!
//! Resolved concatenations are cached per sorted request set; the resolver
//! is safe to share across concurrent tool calls.
//!
//! # Example
//!
//! ```rust
//! use artbridge::resolver::LibraryResolver;
//!
//! let resolver = LibraryResolver::builtin();
//! let script = resolver
//!     .resolve(&["presets"], "computeSlotGeometry(GRID_PRESETS['2x2'], board);")
//!     .unwrap();
//! assert!(script.contains("function computeSlotGeometry"));
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::artbridge::libraries::builtin_manifest;

/// One script fragment: source text plus its declared dependencies and the
/// symbols it defines.
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    pub name: String,
    pub source: String,
    pub dependencies: Vec<String>,
    pub exports: Vec<String>,
}

impl ScriptLibrary {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        dependencies: &[&str],
        exports: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            exports: exports.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Name → library mapping the resolver draws from.
#[derive(Debug, Clone, Default)]
pub struct LibraryManifest {
    libraries: HashMap<String, ScriptLibrary>,
}

impl LibraryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a library.
    pub fn register(&mut self, library: ScriptLibrary) {
        self.libraries.insert(library.name.clone(), library);
    }

    /// Register a library whose source is loaded from a file on disk.
    pub fn register_file(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        dependencies: &[&str],
        exports: &[&str],
    ) -> std::io::Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.register(ScriptLibrary::new(name, source, dependencies, exports));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ScriptLibrary> {
        self.libraries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Registered library names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.libraries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Errors from resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverError {
    /// A requested or depended-on library is not in the manifest.
    UnknownLibrary(String),
    /// `from` depends (transitively) back on `to`.
    DependencyCycle { from: String, to: String },
    /// Two selected libraries declare the same symbol.
    ExportCollision {
        symbol: String,
        first: String,
        second: String,
    },
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::UnknownLibrary(name) => write!(f, "unknown library: {}", name),
            ResolverError::DependencyCycle { from, to } => {
                write!(f, "dependency cycle between '{}' and '{}'", from, to)
            }
            ResolverError::ExportCollision {
                symbol,
                first,
                second,
            } => write!(
                f,
                "libraries '{}' and '{}' both export '{}'",
                first, second, symbol
            ),
        }
    }
}

impl Error for ResolverError {}

/// Composes panel scripts from the manifest, caching each request set's
/// concatenation.
pub struct LibraryResolver {
    manifest: LibraryManifest,
    cache: Mutex<HashMap<Vec<String>, Arc<String>>>,
}

impl LibraryResolver {
    pub fn new(manifest: LibraryManifest) -> Self {
        Self {
            manifest,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A resolver over the built-in fragment manifest.
    pub fn builtin() -> Self {
        Self::new(builtin_manifest())
    }

    pub fn manifest(&self) -> &LibraryManifest {
        &self.manifest
    }

    /// Cached concatenations currently held.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("resolver cache poisoned").len()
    }

    /// Produce `libraries ++ body`: the transitive closure of the requested
    /// libraries in dependency order, each exactly once, followed by the
    /// user body.
    pub fn resolve(&self, libraries: &[&str], body: &str) -> Result<String, ResolverError> {
        if libraries.is_empty() {
            return Ok(body.to_string());
        }
        let prelude = self.resolve_prelude(libraries)?;
        Ok(format!("{}\n{}", prelude, body))
    }

    fn resolve_prelude(&self, libraries: &[&str]) -> Result<Arc<String>, ResolverError> {
        let mut key: Vec<String> = libraries.iter().map(|l| l.to_string()).collect();
        key.sort_unstable();
        key.dedup();

        if let Some(cached) = self.cache.lock().expect("resolver cache poisoned").get(&key) {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("library cache hit for {:?}", key);
            }
            return Ok(cached.clone());
        }

        let order = self.expand(&key)?;
        self.check_collisions(&order)?;

        let mut prelude = String::new();
        for name in &order {
            let library = self.manifest.get(name).expect("expanded name in manifest");
            prelude.push_str(&format!("// --- library: {} ---\n", library.name));
            prelude.push_str(library.source.trim_end());
            prelude.push('\n');
        }
        let prelude = Arc::new(prelude);
        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .insert(key, prelude.clone());
        Ok(prelude)
    }

    /// Depth-first topological expansion with cycle detection.
    fn expand(&self, requested: &[String]) -> Result<Vec<String>, ResolverError> {
        let mut order = Vec::new();
        let mut done: HashSet<String> = HashSet::new();
        let mut visiting: Vec<String> = Vec::new();
        for name in requested {
            self.visit(name, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), ResolverError> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(ResolverError::DependencyCycle {
                from: visiting.last().cloned().unwrap_or_default(),
                to: name.to_string(),
            });
        }
        let library = self
            .manifest
            .get(name)
            .ok_or_else(|| ResolverError::UnknownLibrary(name.to_string()))?;
        visiting.push(name.to_string());
        for dependency in &library.dependencies {
            self.visit(dependency, visiting, done, order)?;
        }
        visiting.pop();
        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    fn check_collisions(&self, order: &[String]) -> Result<(), ResolverError> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for name in order {
            let library = self.manifest.get(name).expect("expanded name in manifest");
            for symbol in &library.exports {
                if let Some(first) = owners.insert(symbol.as_str(), library.name.as_str()) {
                    return Err(ResolverError::ExportCollision {
                        symbol: symbol.clone(),
                        first: first.to_string(),
                        second: library.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
