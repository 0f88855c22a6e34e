use std::path::{Path, PathBuf};

use anyhow::Context;
use filehash_core::Options;
use serde::Deserialize;

/// Contents of a `filehash.toml` task file.
///
/// `[options]` holds task-wide defaults; every `[target.NAME]` is one file
/// group whose own `options` table overrides the task defaults key by key.
#[derive(Debug, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub options: toml::Table,
    /// Kept in declaration order.
    #[serde(default)]
    pub target: toml::Table,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    pub cwd: Option<String>,
    pub dest: Option<String>,
    #[serde(default, alias = "files")]
    pub src: Vec<String>,
    #[serde(default)]
    pub options: toml::Table,
}

impl TaskConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        toml::from_str(&content).with_context(|| format!("could not parse config file {path:?}"))
    }

    /// Targets in declaration order, or the named ones in the given order.
    pub fn targets(&self, names: &[String]) -> anyhow::Result<Vec<(String, TargetConfig)>> {
        let selected: Vec<&String> = if names.is_empty() {
            self.target.keys().collect()
        } else {
            names.iter().collect()
        };
        selected
            .into_iter()
            .map(|name| {
                let value = self
                    .target
                    .get(name)
                    .with_context(|| format!("target {name:?} not found in config"))?;
                let target = value
                    .clone()
                    .try_into::<TargetConfig>()
                    .with_context(|| format!("invalid target {name:?}"))?;
                Ok((name.clone(), target))
            })
            .collect()
    }

    /// Task options with `target` overrides applied.
    pub fn options_for(&self, target: &TargetConfig) -> anyhow::Result<Options> {
        let mut merged = self.options.clone();
        for (key, value) in &target.options {
            merged.insert(key.clone(), value.clone());
        }
        toml::Value::Table(merged)
            .try_into::<Options>()
            .context("invalid options")
    }
}

/// Directory relative config paths resolve against.
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filehash_core::TemplateSetting;

    const CONFIG: &str = r#"
[options]
algorithm = "sha1"
hashlen = 8

[target.js]
cwd = "static"
src = ["js/*.js"]

[target.css]
cwd = "static"
dest = "dist"
src = ["css/**/*.css", "!css/vendor/**"]

[target.css.options]
hashlen = 12
output = "{{= dest}}/css.json"
"#;

    #[test]
    fn test_targets_keep_declaration_order() {
        let config: TaskConfig = toml::from_str(CONFIG).unwrap();
        let names: Vec<String> = config
            .targets(&[])
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["js", "css"]);
    }

    #[test]
    fn test_named_targets() {
        let config: TaskConfig = toml::from_str(CONFIG).unwrap();
        let targets = config.targets(&["css".to_owned()]).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].1.dest.as_deref(), Some("dist"));
        assert_eq!(targets[0].1.src, ["css/**/*.css", "!css/vendor/**"]);

        assert!(config.targets(&["images".to_owned()]).is_err());
    }

    #[test]
    fn test_target_options_override_task_options() {
        let config: TaskConfig = toml::from_str(CONFIG).unwrap();
        let targets = config.targets(&[]).unwrap();

        let js = config.options_for(&targets[0].1).unwrap();
        assert_eq!(js.algorithm, "sha1");
        assert_eq!(js.hashlen, 8);

        let css = config.options_for(&targets[1].1).unwrap();
        assert_eq!(css.algorithm, "sha1");
        assert_eq!(css.hashlen, 12);
        assert_eq!(css.mapping, TemplateSetting::template("{{= dest}}/css.json"));
        assert!(css.keep);
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new("filehash.toml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("site/filehash.toml")), PathBuf::from("site"));
    }
}
