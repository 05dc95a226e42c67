use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::record::{CandidateRecord, CONFLICTS_KEY};

/// All resolved records from one source, in page order.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_id: String,
    /// Lower rank wins conflicts.
    pub priority: u32,
    pub records: Vec<CandidateRecord>,
}

/// Two sources disagreed on a field. Not an error; the kept value is the
/// higher-priority one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictWarning {
    pub kanji_name: String,
    pub field: String,
    pub kept: String,
    pub kept_source: String,
    pub discarded: String,
    pub discarded_source: String,
}

impl ConflictWarning {
    fn describe(&self) -> String {
        format!(
            "{}: {} ({}) vs {} ({})",
            self.field, self.kept, self.kept_source, self.discarded, self.discarded_source
        )
    }
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub records: Vec<CandidateRecord>,
    pub conflicts: Vec<ConflictWarning>,
}

#[derive(Debug, Clone)]
struct Origin {
    source_id: String,
    priority: u32,
}

struct Slot {
    record: CandidateRecord,
    /// Which source each non-empty field value came from.
    origins: BTreeMap<String, Origin>,
    conflicts: Vec<ConflictWarning>,
}

impl Slot {
    fn new(record: CandidateRecord, origin: &Origin) -> Self {
        let origins = record
            .mergeable_fields()
            .into_iter()
            .filter(|f| !record.field(f).is_empty())
            .map(|f| (f, origin.clone()))
            .collect();
        Slot {
            record,
            origins,
            conflicts: Vec::new(),
        }
    }

    fn absorb(&mut self, incoming: &CandidateRecord, origin: &Origin) {
        for field in incoming.mergeable_fields() {
            let new_value = incoming.field(&field);
            if new_value.is_empty() {
                continue;
            }
            let current = self.record.field(&field).to_string();
            if current.is_empty() {
                self.record.set_field(&field, new_value);
                self.origins.insert(field, origin.clone());
                continue;
            }
            if current == new_value {
                continue;
            }

            let held = self.origins.get(&field).cloned().unwrap_or_else(|| origin.clone());
            // equal ranks keep the value seen first
            let incoming_wins = origin.priority < held.priority;
            let conflict = if incoming_wins {
                self.record.set_field(&field, new_value);
                self.origins.insert(field.clone(), origin.clone());
                ConflictWarning {
                    kanji_name: self.record.kanji_name.clone(),
                    field,
                    kept: new_value.to_string(),
                    kept_source: origin.source_id.clone(),
                    discarded: current,
                    discarded_source: held.source_id,
                }
            } else {
                ConflictWarning {
                    kanji_name: self.record.kanji_name.clone(),
                    field,
                    kept: current,
                    kept_source: held.source_id,
                    discarded: new_value.to_string(),
                    discarded_source: origin.source_id.clone(),
                }
            };
            warn!(name = %conflict.kanji_name, "conflict on {}", conflict.describe());
            self.conflicts.push(conflict);
        }
    }

    fn finish(mut self) -> (CandidateRecord, Vec<ConflictWarning>) {
        if !self.conflicts.is_empty() {
            let mut notes: Vec<String> = self
                .record
                .metadata
                .get(CONFLICTS_KEY)
                .filter(|s| !s.is_empty())
                .map(|s| vec![s.clone()])
                .unwrap_or_default();
            notes.extend(self.conflicts.iter().map(ConflictWarning::describe));
            self.record
                .metadata
                .insert(CONFLICTS_KEY.to_string(), notes.join(" | "));
        }
        (self.record, self.conflicts)
    }
}

/// Reconcile records from several sources into one record per kanji name.
///
/// Names are matched exactly. Output keeps first-seen order across the batches
/// as given. Never fails: disagreements keep the higher-priority value and are
/// recorded in the record's `conflicts` metadata and in the returned warnings.
pub fn merge(batches: Vec<SourceBatch>) -> MergeOutcome {
    let mut slots: Vec<Slot> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for batch in batches {
        let origin = Origin {
            source_id: batch.source_id,
            priority: batch.priority,
        };
        for record in batch.records {
            match index.get(&record.kanji_name) {
                Some(&i) => slots[i].absorb(&record, &origin),
                None => {
                    index.insert(record.kanji_name.clone(), slots.len());
                    slots.push(Slot::new(record, &origin));
                }
            }
        }
    }

    let mut out = MergeOutcome::default();
    for slot in slots {
        let (record, conflicts) = slot.finish();
        out.records.push(record);
        out.conflicts.extend(conflicts);
    }
    out
}
