//! Route tree walker.
//!
//! Builds a directory tree from relative file paths, then walks it depth
//! first. Siblings are ordered with [`compare_items`] before descending, so
//! the flattened output is already in match order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use arcstr::ArcStr;
use tracing::debug;

use super::parts::{get_parts, Part};
use super::pattern::{compare_items, get_pattern, Item};
use super::{
    CompiledManifest, EndpointRoute, ManifestConfig, ManifestData, PageRoute, ParamSpec,
    DEFAULT_ERROR, DEFAULT_LAYOUT,
};
use crate::{ComponentId, Diagnostic, DiagnosticLevel, ManifestError};

const LAYOUT: &str = "$layout";
const ERROR: &str = "$error";

#[derive(Debug, Default)]
struct Dir {
    dirs: BTreeMap<String, Dir>,
    files: BTreeSet<String>,
}

impl Dir {
    fn insert(&mut self, path: &str) {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file) = segments.pop() else {
            return;
        };
        let mut dir = self;
        for segment in segments {
            dir = dir.dirs.entry(segment.to_string()).or_default();
        }
        dir.files.insert(file.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Page,
    Endpoint,
}

/// One layout level of the current branch with its error boundary.
#[derive(Debug, Clone)]
struct Level {
    layout: ComponentId,
    error: Option<ComponentId>,
}

enum Entry<'a> {
    Dir(&'a Dir, String),
    File(FileKind, String),
}

struct Walker<'a> {
    config: &'a ManifestConfig,
    components: Vec<ComponentId>,
    pages: Vec<PageRoute>,
    endpoints: Vec<EndpointRoute>,
    page_patterns: HashMap<String, String>,
    endpoint_patterns: HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

/// Compile a set of paths relative to the routes directory.
pub(crate) fn build(
    files: impl IntoIterator<Item = String>,
    config: &ManifestConfig,
) -> Result<CompiledManifest, ManifestError> {
    let mut root = Dir::default();
    for file in files {
        root.insert(&file.replace('\\', "/"));
    }

    let mut walker = Walker {
        config,
        components: Vec::new(),
        pages: Vec::new(),
        endpoints: Vec::new(),
        page_patterns: HashMap::new(),
        endpoint_patterns: HashMap::new(),
        diagnostics: Vec::new(),
    };

    let root_layout = find_special(&root, LAYOUT, config)
        .map(|f| ArcStr::from(f.as_str()))
        .unwrap_or_else(|| ArcStr::from(DEFAULT_LAYOUT));
    let root_error = find_special(&root, ERROR, config)
        .map(|f| ArcStr::from(f.as_str()))
        .unwrap_or_else(|| ArcStr::from(DEFAULT_ERROR));
    walker.components.push(root_layout.clone());
    walker.components.push(root_error.clone());

    let levels = vec![Level {
        layout: root_layout.clone(),
        error: Some(root_error.clone()),
    }];
    walker.walk_items(&root, "", &[], &levels, false)?;

    let data = ManifestData {
        layout: root_layout,
        error: root_error,
        components: walker.components,
        pages: walker.pages,
        endpoints: walker.endpoints,
    };

    Ok(CompiledManifest {
        data,
        diagnostics: walker.diagnostics,
    })
}

fn find_special(dir: &Dir, stem: &str, config: &ManifestConfig) -> Option<String> {
    dir.files.iter().find_map(|name| {
        let (file_stem, kind) = classify(name, config)?;
        (kind == FileKind::Page && file_stem == stem).then(|| name.clone())
    })
}

/// Split `name` into stem and kind using the longest configured extension.
fn classify<'n>(name: &'n str, config: &ManifestConfig) -> Option<(&'n str, FileKind)> {
    let page = config
        .page_extensions
        .iter()
        .map(|ext| (ext, FileKind::Page));
    let endpoint = config
        .endpoint_extensions
        .iter()
        .map(|ext| (ext, FileKind::Endpoint));

    page.chain(endpoint)
        .filter(|(ext, _)| name.len() > ext.len() && name.ends_with(ext.as_str()))
        .max_by_key(|(ext, _)| ext.len())
        .map(|(ext, kind)| (&name[..name.len() - ext.len()], kind))
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

impl Walker<'_> {
    fn warn(&mut self, message: String, file: &str) {
        self.diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warning,
            message,
            context: Some(file.to_string()),
        });
    }

    fn walk_items(
        &mut self,
        dir: &Dir,
        prefix: &str,
        segments: &[Vec<Part>],
        levels: &[Level],
        under_spread: bool,
    ) -> Result<(), ManifestError> {
        let mut items: Vec<(Item, Entry<'_>)> = Vec::new();

        for (name, sub) in &dir.dirs {
            let file = join(prefix, name);
            if is_ignored(name) {
                continue;
            }
            if name.starts_with('$') {
                self.warn(format!("Ignoring reserved directory name `{name}`"), &file);
                continue;
            }
            let parts = get_parts(name, &file)?;
            let spread = under_spread || parts.iter().any(|p| p.spread);
            items.push((
                Item {
                    basename: name.clone(),
                    parts,
                    is_dir: true,
                    is_index: false,
                    under_spread: spread,
                },
                Entry::Dir(sub, file),
            ));
        }

        for name in &dir.files {
            let file = join(prefix, name);
            if is_ignored(name) {
                continue;
            }
            let Some((stem, kind)) = classify(name, self.config) else {
                self.warn(format!("Ignoring `{name}`: not a page or endpoint"), &file);
                continue;
            };
            if stem.starts_with('$') {
                if kind == FileKind::Page && (stem == LAYOUT || stem == ERROR) {
                    continue;
                }
                self.warn(format!("Ignoring reserved file name `{name}`"), &file);
                continue;
            }

            let is_index = stem == "index";
            let parts = if is_index {
                Vec::new()
            } else {
                get_parts(stem, &file)?
            };
            let spread = under_spread || parts.iter().any(|p| p.spread);
            items.push((
                Item {
                    basename: stem.to_string(),
                    parts,
                    is_dir: false,
                    is_index,
                    under_spread: spread,
                },
                Entry::File(kind, file),
            ));
        }

        items.sort_by(|(a, _), (b, _)| compare_items(a, b));

        for (item, entry) in items {
            let mut route_segments = segments.to_vec();
            if !item.is_index {
                route_segments.push(item.parts.clone());
            }

            match entry {
                Entry::Dir(sub, file) => {
                    let child_levels = self.enter_dir(sub, &file, levels);
                    self.walk_items(sub, &file, &route_segments, &child_levels, item.under_spread)?;
                }
                Entry::File(FileKind::Page, file) => {
                    self.add_page(&route_segments, levels, file)?;
                }
                Entry::File(FileKind::Endpoint, file) => {
                    self.add_endpoint(&route_segments, file)?;
                }
            }
        }

        Ok(())
    }

    /// Extend the layout stack with the directory's own `$layout`/`$error`.
    fn enter_dir(&mut self, dir: &Dir, prefix: &str, levels: &[Level]) -> Vec<Level> {
        let mut levels = levels.to_vec();
        let layout = find_special(dir, LAYOUT, self.config).map(|f| ArcStr::from(join(prefix, &f)));
        let error = find_special(dir, ERROR, self.config).map(|f| ArcStr::from(join(prefix, &f)));

        for component in layout.iter().chain(error.iter()) {
            self.components.push(component.clone());
        }

        match (layout, error) {
            (Some(layout), error) => levels.push(Level { layout, error }),
            (None, Some(error)) => {
                if let Some(last) = levels.last_mut() {
                    last.error = Some(error);
                }
            }
            (None, None) => {}
        }
        levels
    }

    fn add_page(
        &mut self,
        segments: &[Vec<Part>],
        levels: &[Level],
        file: String,
    ) -> Result<(), ManifestError> {
        let pattern = get_pattern(segments, true);
        if let Some(existing) = self.page_patterns.insert(pattern.clone(), file.clone()) {
            return Err(ManifestError::Clash {
                a: existing,
                b: file,
                pattern,
            });
        }

        let page = ArcStr::from(file.as_str());
        self.components.push(page.clone());

        let mut nodes: Vec<ComponentId> = levels.iter().map(|l| l.layout.clone()).collect();
        nodes.push(page);
        let mut errors: Vec<Option<ComponentId>> = levels.iter().map(|l| l.error.clone()).collect();
        errors.push(None);

        debug!(%file, %pattern, depth = nodes.len(), "page route");
        self.pages.push(PageRoute {
            pattern,
            params: param_specs(segments),
            nodes,
            errors,
            file,
        });
        Ok(())
    }

    fn add_endpoint(&mut self, segments: &[Vec<Part>], file: String) -> Result<(), ManifestError> {
        let pattern = get_pattern(segments, false);
        if let Some(existing) = self.endpoint_patterns.insert(pattern.clone(), file.clone()) {
            return Err(ManifestError::Clash {
                a: existing,
                b: file,
                pattern,
            });
        }

        debug!(%file, %pattern, "endpoint route");
        self.endpoints.push(EndpointRoute {
            pattern,
            params: param_specs(segments),
            file,
        });
        Ok(())
    }
}

fn param_specs(segments: &[Vec<Part>]) -> Vec<ParamSpec> {
    segments
        .iter()
        .flatten()
        .filter(|p| p.dynamic)
        .map(|p| ParamSpec {
            name: p.content.clone(),
            spread: p.spread,
            optional: p.optional,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(files: &[&str]) -> Result<CompiledManifest, ManifestError> {
        build(files.iter().map(|f| f.to_string()), &ManifestConfig::default())
    }

    fn page_files(manifest: &CompiledManifest) -> Vec<&str> {
        manifest.data.pages.iter().map(|p| p.file.as_str()).collect()
    }

    #[test]
    fn static_sibling_sorts_before_dynamic() {
        let manifest = compile(&["blog/[slug].zen", "blog/archive.zen"]).unwrap();
        assert_eq!(page_files(&manifest), vec!["blog/archive.zen", "blog/[slug].zen"]);
    }

    #[test]
    fn index_maps_to_directory_path() {
        let manifest = compile(&["index.zen", "about.zen"]).unwrap();
        assert_eq!(page_files(&manifest), vec!["about.zen", "index.zen"]);
        assert_eq!(manifest.data.pages[1].pattern, r"^\/$");
    }

    #[test]
    fn ignored_and_reserved_files() {
        let manifest = compile(&[
            "_private.zen",
            ".hidden/index.zen",
            "$weird.zen",
            "notes.md",
            "about.zen",
        ])
        .unwrap();
        assert_eq!(page_files(&manifest), vec!["about.zen"]);
        assert_eq!(manifest.diagnostics.len(), 2);
    }

    #[test]
    fn layouts_and_error_boundaries() {
        let manifest = compile(&[
            "$layout.zen",
            "blog/$layout.zen",
            "blog/$error.zen",
            "blog/[slug].zen",
            "about.zen",
        ])
        .unwrap();

        let about = manifest.data.pages.iter().find(|p| p.file == "about.zen").unwrap();
        assert_eq!(about.nodes, vec![ArcStr::from("$layout.zen"), ArcStr::from("about.zen")]);
        assert_eq!(about.errors[0].as_deref(), Some(DEFAULT_ERROR));

        let slug = manifest
            .data
            .pages
            .iter()
            .find(|p| p.file == "blog/[slug].zen")
            .unwrap();
        assert_eq!(slug.nodes.len(), 3);
        assert_eq!(slug.nodes[1].as_str(), "blog/$layout.zen");
        assert_eq!(slug.errors[1].as_deref(), Some("blog/$error.zen"));
        assert_eq!(slug.errors[2], None);
    }

    #[test]
    fn error_without_layout_attaches_to_parent_level() {
        let manifest = compile(&["shop/$error.zen", "shop/cart.zen"]).unwrap();
        let cart = &manifest.data.pages[0];
        assert_eq!(cart.nodes[0].as_str(), DEFAULT_LAYOUT);
        assert_eq!(cart.errors[0].as_deref(), Some("shop/$error.zen"));
    }

    #[test]
    fn clash_names_both_files() {
        let err = compile(&["foo.zen", "foo/index.zen"]).unwrap_err();
        match err {
            ManifestError::Clash { a, b, .. } => {
                let mut names = vec![a, b];
                names.sort();
                assert_eq!(names, vec!["foo.zen", "foo/index.zen"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn endpoints_are_collected_separately() {
        let manifest = compile(&["api/[id].json.ts", "api/index.zen"]).unwrap();
        assert_eq!(manifest.data.endpoints.len(), 1);
        assert_eq!(manifest.data.endpoints[0].pattern, r"^\/api\/([^/]+?)\.json$");
        assert_eq!(manifest.data.pages.len(), 1);
    }

    #[test]
    fn spread_index_sorts_after_sibling_pages() {
        let manifest = compile(&["[...path]/index.zen", "[...path]/edit.zen"]).unwrap();
        assert_eq!(
            page_files(&manifest),
            vec!["[...path]/edit.zen", "[...path]/index.zen"]
        );
    }
}
