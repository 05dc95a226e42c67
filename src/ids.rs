use std::collections::HashMap;

use crate::reading::dictionary::KanaConverter;
use crate::reading::kana::is_valid_yomi;
use crate::reading::romaji::{slugify, to_romaji};
use crate::record::CandidateRecord;

pub const ID_KEY: &str = "id";

/// Give every record a romanized `<district>-<name>` id, unique within the run.
///
/// The district part is left out when the district has no readable kanji.
/// Repeated ids get a numeric suffix in output order.
pub fn assign_ids<C: KanaConverter>(records: &mut [CandidateRecord], converter: &C) {
    let mut used: HashMap<String, usize> = HashMap::new();

    for r in records.iter_mut() {
        let district = r
            .metadata
            .get("district")
            .map(|d| converter.to_hiragana(d))
            .filter(|y| is_valid_yomi(y))
            .map(|y| slugify(&to_romaji(&y)))
            .filter(|s| !s.is_empty());
        let name = slugify(&to_romaji(&r.yomi));

        let base = match district {
            Some(d) if !name.is_empty() => format!("{}-{}", d, name),
            Some(d) => d,
            None => name,
        };
        if base.is_empty() {
            continue;
        }

        let n = used.entry(base.clone()).or_insert(0);
        *n += 1;
        let id = if *n == 1 { base } else { format!("{}-{}", base, n) };
        r.metadata.insert(ID_KEY.to_string(), id);
    }
}
