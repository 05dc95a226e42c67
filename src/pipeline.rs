use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::discover;
use crate::error::{ConfigError, FetchError};
use crate::fetch::{Fetcher, Page};
use crate::ids;
use crate::merge::{self, SourceBatch};
use crate::parser::{self, CompiledSchema};
use crate::reading::dictionary::KanaConverter;
use crate::reading::ReadingResolver;
use crate::record::CandidateRecord;
use crate::report::{EntryFailure, NameFailure, RunReport};

pub struct RunOutput {
    pub records: Vec<CandidateRecord>,
    pub report: RunReport,
}

/// Compile every source's schema, in configuration order.
pub fn compile(cfg: &RunConfig) -> Result<Vec<CompiledSchema>, ConfigError> {
    cfg.sources.iter().map(CompiledSchema::compile).collect()
}

/// Static URLs plus discovered listing pages, tagged with their source index.
pub async fn collect_targets(
    cfg: &RunConfig,
    fetcher: &Fetcher,
) -> Result<Vec<(usize, String)>, FetchError> {
    let mut targets = Vec::new();
    for (i, source) in cfg.sources.iter().enumerate() {
        targets.extend(source.urls.iter().map(|u| (i, u.clone())));
        if let Some(rule) = &source.discover {
            let found = discover::discover(fetcher, rule).await?;
            if found.is_empty() {
                warn!("No listing pages found for {}", source.id);
            }
            targets.extend(found.into_iter().map(|u| (i, u)));
        }
    }
    Ok(targets)
}

/// Extract → resolve → merge over already fetched pages.
///
/// Pages are extracted in parallel; everything after extraction runs in page order,
/// so the output order only depends on the configured source order and page order.
pub fn process<C: KanaConverter>(
    cfg: &RunConfig,
    schemas: &[CompiledSchema],
    resolver: &ReadingResolver<C>,
    pages: &[Page],
) -> RunOutput {
    let mut report = RunReport {
        pages: pages.len(),
        ..Default::default()
    };

    let extracted: Vec<_> = pages
        .par_iter()
        .map(|p| parser::extract_page(&p.html, &schemas[p.source]))
        .collect();

    let mut batches: Vec<SourceBatch> = cfg
        .sources
        .iter()
        .map(|s| SourceBatch {
            source_id: s.id.clone(),
            priority: s.priority,
            records: Vec::new(),
        })
        .collect();

    for (page, extraction) in pages.iter().zip(extracted) {
        let schema = &schemas[page.source];
        if extraction.fields.is_empty() {
            warn!("No candidates found on {}", page.url);
        }
        report.entries += extraction.fields.len();
        report.duplicate_blocks += extraction.duplicates;
        report
            .extraction_errors
            .extend(extraction.errors.into_iter().map(|error| EntryFailure {
                source: schema.source_id.clone(),
                url: page.url.clone(),
                error,
            }));

        for field in &extraction.fields {
            match resolver.resolve(field, schema.readings) {
                Ok(record) => batches[page.source].records.push(record),
                Err(error) => {
                    warn!(source = %schema.source_id, "omitting candidate: {}", error);
                    report.resolution_errors.push(NameFailure {
                        source: schema.source_id.clone(),
                        error,
                    });
                }
            }
        }
    }

    let merged = merge::merge(batches);
    let mut records = merged.records;
    report.conflicts = merged.conflicts;

    if cfg.output.assign_ids {
        ids::assign_ids(&mut records, resolver.converter());
    }
    report.records = records.len();
    info!(
        "Built {} records from {} entries ({} skipped, {} omitted, {} conflicts)",
        report.records,
        report.entries,
        report.extraction_errors.len(),
        report.resolution_errors.len(),
        report.conflicts.len()
    );

    RunOutput { records, report }
}
