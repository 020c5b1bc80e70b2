//! Route manifest compiler.
//!
//! Turns a `src/routes` tree into an ordered, serializable route table:
//!
//! - `[param]` dynamic, `[...rest]` spread, `[[optional]]` optional segment
//! - `[id([0-9]+)]` regex-qualified parameter
//! - `$layout.zen` / `$error.zen` shared layout and error boundary
//! - entries starting with `_` or `.` are ignored
//!
//! Page routes are navigable on the client. Endpoint routes are recorded only
//! so the router can refuse to intercept them.

pub mod parts;
pub mod pattern;
mod walk;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ComponentId, Diagnostic, DiagnosticLevel, ManifestError};

/// Component used when the routes root has no `$layout` file.
pub const DEFAULT_LAYOUT: &str = "$default/layout";
/// Component used when the routes root has no `$error` file.
pub const DEFAULT_ERROR: &str = "$default/error";

/// Location of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "assets/router-manifest.json";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Directory walked by [`compile_dir`].
    pub routes_dir: PathBuf,
    /// Extensions of view components (pages, layouts, error boundaries).
    pub page_extensions: Vec<String>,
    /// Extensions of server-only endpoints.
    pub endpoint_extensions: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            routes_dir: PathBuf::from("src/routes"),
            page_extensions: vec![".zen".into()],
            endpoint_extensions: vec![".js".into(), ".ts".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub spread: bool,
    pub optional: bool,
}

/// A navigable route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRoute {
    /// Anchored regex source. One capture group per entry in `params`.
    pub pattern: String,
    pub params: Vec<ParamSpec>,
    /// Layout chain root first, the page itself last.
    pub nodes: Vec<ComponentId>,
    /// Error boundary owned by each layout in `nodes`; the page entry is
    /// always `None`.
    pub errors: Vec<Option<ComponentId>>,
    pub file: String,
}

/// A server-only route the client must not intercept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRoute {
    pub pattern: String,
    pub params: Vec<ParamSpec>,
    pub file: String,
}

/// The serializable route table (`router-manifest.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestData {
    pub layout: ComponentId,
    pub error: ComponentId,
    pub components: Vec<ComponentId>,
    /// In match order.
    pub pages: Vec<PageRoute>,
    pub endpoints: Vec<EndpointRoute>,
}

impl ManifestData {
    /// Write the manifest to `<out_dir>/assets/router-manifest.json`.
    pub fn write_to(&self, out_dir: &Path) -> Result<PathBuf, ManifestError> {
        let manifest_path = out_dir.join(MANIFEST_FILE);
        if let Some(parent) = manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&manifest_path, json)?;
        Ok(manifest_path)
    }

    pub fn read_from(path: &Path) -> Result<Self, ManifestError> {
        let source = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&source)?)
    }
}

/// Compiled manifest plus the non-fatal diagnostics collected on the way.
#[derive(Debug, Clone)]
pub struct CompiledManifest {
    pub data: ManifestData,
    pub diagnostics: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compile the route tree rooted at `config.routes_dir`.
pub fn compile_dir(config: &ManifestConfig) -> Result<CompiledManifest, ManifestError> {
    let mut files = Vec::new();
    collect_files(&config.routes_dir, "", &mut files)?;
    compile_files(files, config)
}

/// Compile an in-memory list of paths relative to the routes directory.
pub fn compile_files<I, S>(files: I, config: &ManifestConfig) -> Result<CompiledManifest, ManifestError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let compiled = walk::build(files.into_iter().map(Into::into), config)?;

    for diagnostic in &compiled.diagnostics {
        if diagnostic.level != DiagnosticLevel::Info {
            warn!(context = ?diagnostic.context, "{}", diagnostic.message);
        }
    }
    info!(
        pages = compiled.data.pages.len(),
        endpoints = compiled.data.endpoints.len(),
        components = compiled.data.components.len(),
        "route manifest compiled"
    );

    Ok(compiled)
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), ManifestError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), &rel, out)?;
        } else if file_type.is_file() {
            out.push(rel);
        }
    }
    Ok(())
}
