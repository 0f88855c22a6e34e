use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};

/// Expands `src` patterns into file paths relative to `root`.
///
/// Patterns apply in order: a glob adds the files it matches (sorted), a
/// `!pattern` removes earlier matches and a plain path is kept as written so
/// that missing files are still reported. Duplicates keep their first
/// position.
pub fn expand_sources(root: &Path, patterns: &[String]) -> anyhow::Result<Vec<String>> {
    let mut listing: Option<Vec<String>> = None;
    let mut sources: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            let matcher = glob_matcher(root, negated)?;
            sources.retain(|source| {
                let excluded = matcher.matched(source, false).is_whitelist();
                if excluded {
                    seen.remove(source);
                }
                !excluded
            });
            continue;
        }

        if !is_glob(pattern) {
            let literal = pattern.trim_start_matches("./").to_owned();
            if seen.insert(literal.clone()) {
                sources.push(literal);
            }
            continue;
        }

        if listing.is_none() {
            listing = Some(list_files(root)?);
        }
        let matcher = glob_matcher(root, pattern)?;
        let mut matched = 0;
        for file in listing.iter().flatten() {
            if matcher.matched(file, false).is_whitelist() {
                matched += 1;
                if seen.insert(file.clone()) {
                    sources.push(file.clone());
                }
            }
        }
        if matched == 0 {
            tracing::warn!("pattern {pattern:?} matched no files under {root:?}");
        }
    }

    Ok(sources)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn glob_matcher(root: &Path, pattern: &str) -> anyhow::Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    builder
        .add(pattern)
        .with_context(|| format!("invalid glob {pattern:?}"))?;
    Ok(builder.build()?)
}

/// All regular files below `root`, as sorted `/`-separated relative paths.
fn list_files(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).standard_filters(false).build();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {root:?}"))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{:?} is outside {root:?}", entry.path()))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(parts.join("/"));
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        dir
    }

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_globs_match_sorted_files() {
        let dir = tree(&["css/b.css", "css/a.css", "css/sub/c.css", "js/app.js"]);
        let sources = expand_sources(dir.path(), &patterns(&["css/**/*.css"])).unwrap();
        assert_eq!(sources, ["css/a.css", "css/b.css", "css/sub/c.css"]);
    }

    #[test]
    fn test_negated_patterns_exclude_earlier_matches() {
        let dir = tree(&["css/a.css", "css/vendor/x.css", "css/vendor/y.css"]);
        let sources =
            expand_sources(dir.path(), &patterns(&["css/**/*.css", "!css/vendor/**"])).unwrap();
        assert_eq!(sources, ["css/a.css"]);
    }

    #[test]
    fn test_literal_paths_are_kept_even_when_missing() {
        let dir = tree(&["a.js"]);
        let sources = expand_sources(dir.path(), &patterns(&["./missing.js", "a.js"])).unwrap();
        assert_eq!(sources, ["missing.js", "a.js"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let dir = tree(&["js/a.js", "js/b.js"]);
        let sources = expand_sources(dir.path(), &patterns(&["js/b.js", "js/*.js"])).unwrap();
        assert_eq!(sources, ["js/b.js", "js/a.js"]);
    }
}
