// src/diff.rs

//! Source/destination catalog comparison
//!
//! Assets are matched by path, case-insensitively, ignoring component
//! identity. Individually uploaded formats get a component carrying only the
//! missing assets. Bundled formats are re-uploaded whole, because a partial
//! bundle cannot be published.

use crate::registry::Component;
use std::collections::HashSet;

/// Components (or parts of components) present in `source` but missing from
/// `destination`.
///
/// Components with no missing assets never appear in the result, and the
/// source order is preserved.
pub fn diff_catalogs(source: &[Component], destination: &[Component]) -> Vec<Component> {
    let present: HashSet<String> = destination
        .iter()
        .flat_map(|component| component.assets.iter())
        .map(|asset| asset.path.to_lowercase())
        .collect();

    source
        .iter()
        .filter_map(|component| {
            let missing: Vec<_> = component
                .assets
                .iter()
                .filter(|asset| !present.contains(&asset.path.to_lowercase()))
                .cloned()
                .collect();

            if missing.is_empty() {
                return None;
            }

            let bundled = component
                .component_format()
                .is_some_and(|format| format.is_bundled());
            if bundled {
                Some(component.clone())
            } else {
                Some(Component {
                    assets: missing,
                    ..component.clone()
                })
            }
        })
        .collect()
}

/// Total number of assets across components
pub fn asset_count(components: &[Component]) -> usize {
    components.iter().map(|c| c.assets.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Asset;

    fn comp(format: &str, name: &str, paths: &[&str]) -> Component {
        Component {
            id: String::new(),
            repository: "repo".to_string(),
            format: format.to_string(),
            group: None,
            name: name.to_string(),
            version: "1.0".to_string(),
            assets: paths
                .iter()
                .map(|p| Asset {
                    download_url: String::new(),
                    path: p.to_string(),
                    id: String::new(),
                    repository: "repo".to_string(),
                    format: format.to_string(),
                    content_type: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_identical_catalogs_produce_empty_diff() {
        let src = vec![comp("npm", "a", &["a/-/a-1.0.tgz"]), comp("npm", "b", &["b/-/b-1.0.tgz"])];
        assert!(diff_catalogs(&src, &src.clone()).is_empty());
    }

    #[test]
    fn test_empty_destination_returns_everything() {
        let src = vec![comp("pypi", "a", &["a/1.0/a-1.0.tar.gz", "a/1.0/a-1.0-py3-none-any.whl"])];
        let diff = diff_catalogs(&src, &[]);
        assert_eq!(diff, src);
    }

    #[test]
    fn test_path_match_is_case_insensitive() {
        let src = vec![comp("nuget", "Foo", &["Foo/1.0.0"])];
        let dst = vec![comp("nuget", "foo", &["foo/1.0.0"])];
        assert!(diff_catalogs(&src, &dst).is_empty());
    }

    #[test]
    fn test_identity_ignored_only_paths_matter() {
        let src = vec![comp("npm", "a", &["shared/path.tgz"])];
        let dst = vec![comp("npm", "other", &["shared/path.tgz"])];
        assert!(diff_catalogs(&src, &dst).is_empty());
    }

    #[test]
    fn test_individual_format_keeps_only_missing_assets() {
        let src = vec![comp("pypi", "a", &["a/1.0/a.whl", "a/1.0/a.tar.gz"])];
        let dst = vec![comp("pypi", "a", &["a/1.0/a.whl"])];
        let diff = diff_catalogs(&src, &dst);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].assets.len(), 1);
        assert_eq!(diff[0].assets[0].path, "a/1.0/a.tar.gz");
    }

    #[test]
    fn test_bundled_format_resent_whole() {
        let src = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.jar", "g/lib/1.0/lib-1.0.pom"])];
        let dst = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.pom"])];
        let diff = diff_catalogs(&src, &dst);
        assert_eq!(diff, src);
    }

    #[test]
    fn test_bundled_with_pom_only_at_destination_is_not_dropped() {
        let src = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.jar"])];
        let dst = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.pom"])];
        let diff = diff_catalogs(&src, &dst);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].assets.len(), 1);
    }

    #[test]
    fn test_bundled_with_pom_only_at_source_is_sent() {
        let src = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.pom"])];
        let dst = vec![comp("maven2", "lib", &["g/lib/1.0/lib-1.0.jar"])];
        let diff = diff_catalogs(&src, &dst);
        assert_eq!(diff, src);
    }

    #[test]
    fn test_diff_is_directional() {
        let a = vec![comp("npm", "a", &["a/-/a-1.0.tgz", "a/-/a-2.0.tgz"])];
        let b = vec![comp("npm", "a", &["a/-/a-1.0.tgz"])];
        assert_eq!(asset_count(&diff_catalogs(&a, &b)), 1);
        assert!(diff_catalogs(&b, &a).is_empty());
    }

    #[test]
    fn test_no_empty_components_and_order_preserved() {
        let src = vec![
            comp("npm", "c", &["c.tgz"]),
            comp("npm", "a", &["a.tgz"]),
            comp("npm", "b", &["b.tgz"]),
        ];
        let dst = vec![comp("npm", "a", &["a.tgz"])];
        let diff = diff_catalogs(&src, &dst);
        let names: Vec<_> = diff.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert!(diff.iter().all(|c| !c.assets.is_empty()));
        assert_eq!(asset_count(&diff), 2);
    }
}
