use anyhow::Context;

use crate::derive::{PathPlan, normalize};
use crate::store::AssetStore;

/// Copies a fingerprinted file to its planned target.
///
/// Nothing happens without a target or when the target is the source
/// itself. The original is deleted after copying unless `keep` is set.
pub async fn materialize(
    store: &dyn AssetStore,
    plan: &PathPlan,
    dest: &str,
    keep: bool,
) -> anyhow::Result<()> {
    let Some(target) = plan.target.as_deref() else {
        return Ok(());
    };
    if normalize(target) == normalize(&plan.resolved) {
        tracing::debug!("{target:?} is already in place");
        return Ok(());
    }
    if escapes_dest(target, dest) {
        tracing::warn!("renamed target {target:?} is not in dest directory {dest:?}");
    }

    store
        .copy(&plan.resolved, target)
        .await
        .with_context(|| format!("failed to copy {:?} to {target:?}", plan.resolved))?;
    tracing::info!("{:?} => {target:?}", plan.resolved);

    if !keep {
        tracing::debug!("deleting source {:?}", plan.resolved);
        store
            .delete(&plan.resolved)
            .await
            .with_context(|| format!("failed to delete {:?}", plan.resolved))?;
    }
    Ok(())
}

fn escapes_dest(target: &str, dest: &str) -> bool {
    let dest = normalize(dest);
    if dest == "." {
        target.starts_with("..")
    } else {
        !target.contains(&dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_dest() {
        assert!(!escapes_dest("dist/a.1.css", "dist"));
        assert!(!escapes_dest("dist/a.1.css", "./dist/"));
        assert!(escapes_dest("a.1.css", "dist"));
        assert!(!escapes_dest("a.1.css", "."));
        assert!(escapes_dest("../a.1.css", "."));
    }
}
