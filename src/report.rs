use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ExtractionError, ResolutionError};
use crate::merge::ConflictWarning;

#[derive(Debug, Serialize)]
pub struct EntryFailure {
    pub source: String,
    pub url: String,
    #[serde(flatten)]
    pub error: ExtractionError,
}

#[derive(Debug, Serialize)]
pub struct NameFailure {
    pub source: String,
    #[serde(flatten)]
    pub error: ResolutionError,
}

/// Everything skipped, dropped or reconciled during one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub pages: usize,
    pub entries: usize,
    pub duplicate_blocks: usize,
    pub records: usize,
    pub extraction_errors: Vec<EntryFailure>,
    pub resolution_errors: Vec<NameFailure>,
    pub conflicts: Vec<ConflictWarning>,
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport {
            generated_at: Utc::now(),
            pages: 0,
            entries: 0,
            duplicate_blocks: 0,
            records: 0,
            extraction_errors: Vec::new(),
            resolution_errors: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

impl RunReport {
    pub fn print(&self) {
        println!(
            "Read {} pages: {} entries ({} duplicate blocks dropped), {} records.",
            self.pages, self.entries, self.duplicate_blocks, self.records
        );

        if !self.extraction_errors.is_empty() {
            println!("\n--- Skipped entries ({}) ---", self.extraction_errors.len());
            for f in &self.extraction_errors {
                println!("  [{}] {}: {}", f.source, f.url, f.error);
            }
        }
        if !self.resolution_errors.is_empty() {
            println!("\n--- Omitted candidates ({}) ---", self.resolution_errors.len());
            for f in &self.resolution_errors {
                println!("  [{}] {}", f.source, f.error);
            }
        }
        if !self.conflicts.is_empty() {
            println!("\n--- Conflicts ({}) ---", self.conflicts.len());
            for c in &self.conflicts {
                println!(
                    "  {} {}: kept {} ({}), dropped {} ({})",
                    c.kanji_name, c.field, c.kept, c.kept_source, c.discarded, c.discarded_source
                );
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        Ok(())
    }
}
