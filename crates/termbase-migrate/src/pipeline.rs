//! Import run orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde_json::Value;
use termbase_core::{SearchIndexer, Store};
use tracing::{debug, info, warn};

use crate::config::{ImportConfig, ImportOptions};
use crate::error::Result;
use crate::http::{create_http_client, DEFAULT_TIMEOUT};
use crate::importers::{
    create_importer, ImportContext, Importer, ImporterKind, LineImporter, ReferenceImporter,
};
use crate::input::{load_lines, load_reference_document};
use crate::legacy::{with_errors, LegacyRecord};
use crate::legacy_api::{HttpLegacyApi, LegacyApi};
use crate::report::{Bucket, ImportReport};

/// One importer run over one input.
pub struct Pipeline {
    kind: ImporterKind,
    input: String,
    store: Arc<dyn Store>,
    indexer: Arc<dyn SearchIndexer>,
    options: ImportOptions,
    client: Client,
    legacy_api: Option<Arc<dyn LegacyApi>>,
}

impl Pipeline {
    /// Creates a pipeline importing `input` with the `kind` importer.
    pub fn new(
        kind: ImporterKind,
        input: impl Into<String>,
        store: Arc<dyn Store>,
        indexer: Arc<dyn SearchIndexer>,
        options: ImportOptions,
    ) -> Self {
        Self {
            kind,
            input: input.into(),
            store,
            indexer,
            options,
            client: create_http_client(DEFAULT_TIMEOUT),
            legacy_api: None,
        }
    }

    /// Uses `legacy_api` for mapping-reference runs.
    #[must_use]
    pub fn with_legacy_api(mut self, legacy_api: Arc<dyn LegacyApi>) -> Self {
        self.legacy_api = Some(legacy_api);
        self
    }

    /// Creates a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(
        config: &ImportConfig,
        store: Arc<dyn Store>,
        indexer: Arc<dyn SearchIndexer>,
    ) -> Result<Self> {
        config.validate()?;
        let mut pipeline = Self::new(
            config.importer_kind()?,
            config.input.clone(),
            store,
            indexer,
            config.options.clone(),
        );
        pipeline.client = create_http_client(Duration::from_secs(config.legacy_api.timeout_secs));
        if let Some(api) = HttpLegacyApi::from_config(&config.legacy_api)? {
            debug!("Legacy API at {}", api.base_url());
            pipeline = pipeline.with_legacy_api(Arc::new(api));
        }
        Ok(pipeline)
    }

    /// The importer this pipeline runs.
    #[must_use]
    pub fn kind(&self) -> ImporterKind {
        self.kind
    }

    /// Runs the import.
    ///
    /// Record-level failures land in the report; the run itself fails only
    /// when the input cannot be loaded or the store breaks.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is unreadable or malformed, or if the
    /// store fails.
    pub async fn run(&self) -> Result<ImportReport> {
        let start = Instant::now();
        let mut ctx = ImportContext::new(
            self.kind,
            self.store.clone(),
            self.indexer.clone(),
            self.options.clone(),
        );

        info!("Starting {} import from {}", self.kind, self.input);

        match create_importer(self.kind, self.legacy_api.clone()) {
            Importer::Lines(mut importer) => {
                self.run_lines(importer.as_mut(), &mut ctx).await?;
                importer.after_run(&mut ctx);
            }
            Importer::References(mut importer) => {
                self.run_references(&mut importer, &mut ctx).await?;
                importer.after_run(&mut ctx);
            }
        }

        let mut report = ctx.report;
        report.elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Import complete: {} processed of {} in {:.2}s",
            report.processed, report.total, report.elapsed_seconds
        );
        info!("{}", report.summary());
        Ok(report)
    }

    async fn run_lines(
        &self,
        importer: &mut dyn LineImporter,
        ctx: &mut ImportContext,
    ) -> Result<()> {
        let lines = load_lines(&self.input, &self.client).await?;
        ctx.report.total = lines.len();
        info!("TOTAL: {}", lines.len());

        let progress = create_progress_bar(lines.len() as u64, self.options.show_progress);
        for line in &lines {
            ctx.report.processed += 1;
            let result = import_line(importer, ctx, line);
            progress.inc(1);
            result?;
        }
        progress.finish_and_clear();
        Ok(())
    }

    async fn run_references(
        &self,
        importer: &mut ReferenceImporter,
        ctx: &mut ImportContext,
    ) -> Result<()> {
        let document = load_reference_document(&self.input, &self.client).await?;
        ctx.report.total = document.len();
        info!("TOTAL: {}", document.len());
        if self.kind == ImporterKind::MappingReference && self.legacy_api.is_none() {
            warn!("No legacy API configured, mapping expressions resolve locally only");
        }

        let progress = create_progress_bar(document.len() as u64, self.options.show_progress);
        for (collection_uri, expressions) in &document {
            ctx.report.processed += 1;
            debug!(
                "Processing: {} ({}/{})",
                collection_uri, ctx.report.processed, ctx.report.total
            );
            importer.process(ctx, collection_uri, expressions).await?;
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(())
    }
}

/// Imports one line and files it in the report.
///
/// Only store failures unrelated to the record escape as errors.
fn import_line(importer: &mut dyn LineImporter, ctx: &mut ImportContext, line: &str) -> Result<()> {
    let mut record = match LegacyRecord::parse(line) {
        Ok(record) => record,
        Err(err) => {
            warn!("Failed: unparseable line ({})", err);
            ctx.report.push(
                Bucket::Failed,
                with_errors(Value::String(line.to_string()), err.messages()),
            );
            return Ok(());
        }
    };

    debug!(
        "Processing: {} ({}/{})",
        record.label(),
        ctx.report.processed,
        ctx.report.total
    );
    match importer.process(ctx, &mut record) {
        Ok(bucket) => ctx.report.push(bucket, record.original().clone()),
        Err(err) if err.is_fatal() => return Err(err.into()),
        Err(err) => {
            warn!("Failed: {} ({})", record.label(), err);
            ctx.report.push(Bucket::Failed, record.with_errors(err.messages()));
        }
    }
    Ok(())
}

fn create_progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
