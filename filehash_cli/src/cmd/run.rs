use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use filehash_core::{FileGroup, GroupProcessor};
use filehash_store_local::LocalStore;
use tracing::info;

use crate::config::{TaskConfig, base_dir};
use crate::sources::expand_sources;

pub async fn run_targets(config_file: &Path, names: &[String]) -> Result<()> {
    let config = TaskConfig::load(config_file)?;
    let targets = config.targets(names)?;
    if targets.is_empty() {
        bail!("no targets configured in {config_file:?}");
    }

    let base = base_dir(config_file);
    let store = Arc::new(LocalStore::new(&base));
    let mut failed = 0;

    for (name, target) in targets {
        let options = config
            .options_for(&target)
            .with_context(|| format!("target {name:?}"))?;
        let processor = GroupProcessor::new(store.clone(), &options)
            .with_context(|| format!("invalid options for target {name:?}"))?;

        let root = base.join(target.cwd.as_deref().unwrap_or("."));
        let sources = expand_sources(&root, &target.src)
            .with_context(|| format!("failed to expand sources of target {name:?}"))?;
        let group = FileGroup {
            cwd: target.cwd,
            dest: target.dest,
            sources,
        };

        info!("running target {name} ({} sources)", group.sources.len());
        let report = processor
            .process(&group)
            .await
            .with_context(|| format!("target {name:?} failed"))?;
        if let Some(path) = &report.mapping_path {
            info!(
                "target {name}: {} files hashed, {} mapping entries in {path}",
                report.records.len(),
                report.mapping.len()
            );
        }
        failed += report.failures.len();
    }

    if failed > 0 {
        bail!("{failed} files could not be processed");
    }
    Ok(())
}
