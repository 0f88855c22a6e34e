use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::derive::{PathDeriver, PlanTemplates, normalize};
use crate::fingerprint::Fingerprinter;
use crate::mapping::{Aggregator, FileFailure, FileRecord, Mapping};
use crate::materialize::materialize;
use crate::options::{Options, OptionsError, Settings};
use crate::store::AssetStore;
use crate::template::Renderer;

/// A set of source files sharing a base directory and a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    pub cwd: Option<String>,
    pub dest: Option<String>,
    /// Paths relative to `cwd`, in processing order.
    #[serde(alias = "src")]
    pub sources: Vec<String>,
}

impl FileGroup {
    pub fn new(sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cwd: None,
            dest: None,
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }
}

/// Outcome of processing one [`FileGroup`].
#[derive(Debug, Default)]
pub struct GroupReport {
    /// Fingerprinted files, sorted by source path.
    pub records: Vec<FileRecord>,
    /// Sources dropped because they do not exist.
    pub missing: Vec<String>,
    pub failures: Vec<FileFailure>,
    /// Entries computed by this run, before merging with an existing file.
    pub mapping: Mapping,
    /// Where the mapping was written, if anywhere.
    pub mapping_path: Option<String>,
}

impl GroupReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives file groups through fingerprint, derive, materialize and record.
#[derive(Debug, Clone)]
pub struct GroupProcessor {
    store: Arc<dyn AssetStore>,
    settings: Settings,
    fingerprinter: Fingerprinter,
}

impl GroupProcessor {
    pub fn new(store: Arc<dyn AssetStore>, options: &Options) -> Result<Self, OptionsError> {
        Self::with_renderer(store, options, &Renderer::default())
    }

    /// Like [`GroupProcessor::new`] but compiles templates with `renderer`.
    pub fn with_renderer(
        store: Arc<dyn AssetStore>,
        options: &Options,
        renderer: &Renderer,
    ) -> Result<Self, OptionsError> {
        let settings = options.compile(renderer)?;
        let fingerprinter = Fingerprinter::new(settings.mode.clone());
        Ok(Self {
            store,
            settings,
            fingerprinter,
        })
    }

    pub async fn process(&self, group: &FileGroup) -> anyhow::Result<GroupReport> {
        let deriver = PathDeriver::new(group.cwd.clone(), group.dest.clone());
        let mut report = GroupReport::default();

        let sources = self.filter_sources(&deriver, group, &mut report).await?;
        if sources.is_empty() {
            tracing::info!("no source files");
            return Ok(report);
        }

        if let Some(dest) = deriver.dest()
            && self.store.exists(dest).await?
            && !self.store.is_dir(dest).await?
        {
            tracing::warn!("destination {dest:?} must be a directory");
        }

        let templates = PlanTemplates {
            rename: self.settings.rename.as_ref(),
            key: self.settings.mapping_key.as_ref(),
            value: self.settings.mapping_value.as_ref(),
        };
        let mut aggregator = Aggregator::new(sources.len(), self.settings.mapping.is_some());

        let deriver_ref = &deriver;
        let templates_ref = &templates;
        let mut outcomes = futures::stream::iter(sources)
            .map(|source| async move {
                self.process_file(deriver_ref, templates_ref, source).await
            })
            .buffer_unordered(self.settings.concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(record) => aggregator.record(record),
                Err(failure) if self.settings.fail_fast => {
                    return Err(failure
                        .error
                        .context(format!("failed to process {:?}", failure.source)));
                }
                Err(failure) => aggregator.record_failure(failure),
            }
        }
        drop(outcomes);

        let aggregate = aggregator.finish()?;
        tracing::info!(
            "all hashed: {} files, {} failed",
            aggregate.records.len(),
            aggregate.failures.len()
        );
        report.records = aggregate.records;
        report.failures = aggregate.failures;

        if let (Some(mapping), Some(template)) = (aggregate.mapping, self.settings.mapping.as_ref()) {
            let path = normalize(&template.render(&deriver.group_vars()));
            self.persist_mapping(&path, &mapping).await?;
            report.mapping = mapping;
            report.mapping_path = Some(path);
        }

        Ok(report)
    }

    /// Keeps sources that resolve to existing regular files, dropping
    /// duplicates.
    async fn filter_sources(
        &self,
        deriver: &PathDeriver,
        group: &FileGroup,
        report: &mut GroupReport,
    ) -> anyhow::Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(group.sources.len());
        for source in &group.sources {
            if !seen.insert(source.as_str()) {
                continue;
            }
            let resolved = deriver.resolve(source);
            if !self.store.exists(&resolved).await? {
                tracing::warn!("source file {resolved:?} not found");
                report.missing.push(source.clone());
            } else if self.store.is_file(&resolved).await? {
                kept.push(source.clone());
            } else {
                tracing::debug!("skipping {resolved:?}: not a regular file");
            }
        }
        Ok(kept)
    }

    async fn process_file(
        &self,
        deriver: &PathDeriver,
        templates: &PlanTemplates<'_>,
        source: String,
    ) -> Result<FileRecord, FileFailure> {
        let resolved = deriver.resolve(&source);
        let fingerprint = match self.fingerprinter.fingerprint(&*self.store, &resolved).await {
            Ok(fingerprint) => fingerprint,
            Err(error) => return Err(FileFailure { source, error }),
        };

        let plan = deriver.plan(templates, &source, &fingerprint);
        if let Some(dest) = deriver.dest()
            && let Err(error) = materialize(&*self.store, &plan, dest, self.settings.keep).await
        {
            return Err(FileFailure { source, error });
        }

        Ok(FileRecord { fingerprint, plan })
    }

    async fn persist_mapping(&self, path: &str, mapping: &Mapping) -> anyhow::Result<()> {
        let mut persisted = mapping.clone();
        if self.settings.merge && self.store.exists(path).await? {
            let existing = self
                .store
                .read_json(path)
                .await
                .with_context(|| format!("failed to read existing mapping {path:?}"))?;
            let added = persisted.merge_existing(existing);
            tracing::debug!("merged {added} entries from {path:?}");
        }
        self.store
            .write_text(path, &persisted.to_json()?)
            .await
            .with_context(|| format!("failed to write mapping {path:?}"))?;
        tracing::info!("hash map {path:?} saved");
        Ok(())
    }
}
