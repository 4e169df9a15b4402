//! Default module resolution
//!
//! Relative ids resolve against the importer's directory and always end in
//! `.js`. Bare ids are external when configured so, otherwise they are
//! looked up in the nearest `node_modules/` directory containing them.

use async_trait::async_trait;
use glob::Pattern;
use tracing::{debug, warn};

use super::{ResolvedId, Resolver};
use crate::path::{dirname, is_absolute, resolve_path};
use crate::{Error, Result};

/// `package.json` fields consulted for a package's entry, in order.
pub const DEFAULT_MAIN_FIELDS: [&str; 2] = ["jsnext:main", "module"];

#[derive(Debug, Clone)]
pub struct DefaultResolver {
    cwd: String,
    external: Vec<String>,
    patterns: Vec<Pattern>,
    main_fields: Vec<String>,
}

impl DefaultResolver {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            external: Vec::new(),
            patterns: Vec::new(),
            main_fields: DEFAULT_MAIN_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Ids kept out of the bundle. Entries with glob metacharacters are
    /// matched as patterns against the whole id.
    pub fn with_external(mut self, external: &[String]) -> Self {
        for entry in external {
            if entry.contains(['*', '?', '[']) {
                match Pattern::new(entry) {
                    Ok(pattern) => self.patterns.push(pattern),
                    Err(err) => warn!("Ignoring invalid external pattern {}: {}", entry, err),
                }
            } else {
                self.external.push(entry.clone());
            }
        }
        self
    }

    pub fn with_main_fields(mut self, main_fields: &[String]) -> Self {
        if !main_fields.is_empty() {
            self.main_fields = main_fields.to_vec();
        }
        self
    }

    pub fn is_external(&self, id: &str) -> bool {
        let (package, _) = split_package(id);
        self.external.iter().any(|e| e == id || e == package) || self.patterns.iter().any(|p| p.matches(id))
    }

    async fn resolve_package(&self, importee: &str, importer: &str) -> Result<String> {
        let (package, subpath) = split_package(importee);
        let mut dir = dirname(importer);
        loop {
            let root = resolve_path(&dir, &format!("node_modules/{package}"));
            let is_dir = tokio::fs::metadata(&root).await.is_ok_and(|m| m.is_dir());
            if is_dir {
                debug!("Found package {} at {}", package, root);
                if let Some(subpath) = subpath {
                    return Ok(with_js_extension(&resolve_path(&root, subpath)));
                }
                return self.package_main(&root, package, importer).await;
            }

            let parent = dirname(&dir);
            if parent == dir {
                break;
            }
            dir = parent;
        }
        Err(Error::Package(format!(
            "Could not find package {package} (required by {importer})"
        )))
    }

    async fn package_main(&self, root: &str, package: &str, importer: &str) -> Result<String> {
        let manifest_path = format!("{root}/package.json");
        let manifest: serde_json::Value = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|_| Error::Package(format!("Missing or malformed package.json: {manifest_path}")))?,
            Err(_) => {
                return Err(Error::Package(format!(
                    "Missing or malformed package.json: {manifest_path}"
                )));
            }
        };

        self.main_fields
            .iter()
            .find_map(|field| manifest.get(field).and_then(|value| value.as_str()))
            .map(|main| with_js_extension(&resolve_path(root, main)))
            .ok_or_else(|| {
                Error::Package(format!(
                    "Package {package} (imported by {importer}) does not have a {} field in package.json",
                    self.main_fields.join(" or ")
                ))
            })
    }
}

#[async_trait]
impl Resolver for DefaultResolver {
    async fn resolve(&self, importee: &str, importer: Option<&str>) -> Result<Option<ResolvedId>> {
        if is_absolute(importee) {
            return Ok(Some(ResolvedId::Module(importee.to_string())));
        }
        let Some(importer) = importer else {
            return Ok(Some(ResolvedId::Module(with_js_extension(&resolve_path(
                &self.cwd, importee,
            )))));
        };
        if importee.starts_with('.') {
            let resolved = resolve_path(&dirname(importer), importee);
            return Ok(Some(ResolvedId::Module(with_js_extension(
                resolved.trim_end_matches('/'),
            ))));
        }
        if self.is_external(importee) {
            return Ok(Some(ResolvedId::External(importee.to_string())));
        }
        self.resolve_package(importee, importer)
            .await
            .map(|id| Some(ResolvedId::Module(id)))
    }
}

/// `@scope/pkg/sub/path` as (`@scope/pkg`, `sub/path`)
fn split_package(id: &str) -> (&str, Option<&str>) {
    let segments = if id.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for (found, (index, _)) in id.match_indices('/').enumerate() {
        if found + 1 == segments {
            end = index;
            break;
        }
    }
    if end == 0 {
        return (id, None);
    }
    let subpath = &id[end + 1..];
    (&id[..end], (!subpath.is_empty()).then_some(subpath))
}

fn with_js_extension(path: &str) -> String {
    format!("{}.js", path.strip_suffix(".js").unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::to_id;

    #[test]
    fn test_split_package() {
        assert_eq!(split_package("lodash"), ("lodash", None));
        assert_eq!(split_package("lodash/fp/map"), ("lodash", Some("fp/map")));
        assert_eq!(split_package("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(split_package("@scope/pkg/sub"), ("@scope/pkg", Some("sub")));
    }

    #[tokio::test]
    async fn test_relative_and_entry_ids() {
        let resolver = DefaultResolver::new("/project");
        assert_eq!(
            resolver.resolve("src/main", None).await.unwrap(),
            Some(ResolvedId::Module("/project/src/main.js".into()))
        );
        assert_eq!(
            resolver.resolve("../util.js", Some("/project/src/main.js")).await.unwrap(),
            Some(ResolvedId::Module("/project/util.js".into()))
        );
        assert_eq!(
            resolver.resolve("/abs/mod.js", Some("/project/src/main.js")).await.unwrap(),
            Some(ResolvedId::Module("/abs/mod.js".into()))
        );
    }

    #[tokio::test]
    async fn test_external_ids_and_patterns() {
        let resolver = DefaultResolver::new("/project").with_external(&["lodash".to_string(), "@internal/*".to_string()]);
        assert_eq!(
            resolver.resolve("lodash/fp", Some("/project/main.js")).await.unwrap(),
            Some(ResolvedId::External("lodash/fp".into()))
        );
        assert!(resolver.is_external("@internal/ui"));
        assert!(!resolver.is_external("react"));
    }

    #[tokio::test]
    async fn test_node_modules_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("node_modules/@acme/widgets");
        std::fs::create_dir_all(package.join("src")).unwrap();
        std::fs::write(package.join("package.json"), r#"{ "module": "src/index.js" }"#).unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();

        let importer = to_id(&dir.path().join("app/main.js"));
        let resolver = DefaultResolver::new(to_id(dir.path()));
        let resolved = resolver.resolve("@acme/widgets", Some(&importer)).await.unwrap();
        assert_eq!(resolved, Some(ResolvedId::Module(to_id(&package.join("src/index.js")))));

        let sub = resolver.resolve("@acme/widgets/extra", Some(&importer)).await.unwrap();
        assert_eq!(sub, Some(ResolvedId::Module(to_id(&package.join("extra.js")))));

        let err = resolver.resolve("missing-pkg", Some(&importer)).await.unwrap_err();
        assert!(err.to_string().contains("Could not find package missing-pkg"));

        let strict = DefaultResolver::new(to_id(dir.path())).with_main_fields(&["main".to_string()]);
        let err = strict.resolve("@acme/widgets", Some(&importer)).await.unwrap_err();
        assert!(err.to_string().contains("does not have a main field"));
    }
}
