use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::record::{CandidateRecord, CONFLICTS_KEY};

const FIXED_COLUMNS: &[&str] = &["kanji_name", "yomi", "party"];
const BOM: &str = "\u{FEFF}";

/// Metadata columns: explicit order if configured, else every key seen (sorted)
/// with `conflicts` moved to the end.
pub fn metadata_columns(records: &[CandidateRecord], configured: Option<&[String]>) -> Vec<String> {
    if let Some(cols) = configured {
        return cols.to_vec();
    }
    let keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.metadata.keys().map(String::as_str))
        .collect();
    let mut cols: Vec<String> = keys
        .iter()
        .filter(|k| **k != CONFLICTS_KEY)
        .map(|k| k.to_string())
        .collect();
    if keys.contains(CONFLICTS_KEY) {
        cols.push(CONFLICTS_KEY.to_string());
    }
    cols
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

pub fn write_row<W: Write>(w: &mut W, row: &[&str]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            w.write_all(b",")?;
        }
        first = false;
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}

/// Header plus one row per record.
pub fn write_csv<W: Write>(
    w: &mut W,
    records: &[CandidateRecord],
    columns: &[String],
    bom: bool,
) -> io::Result<()> {
    if bom {
        w.write_all(BOM.as_bytes())?;
    }
    let header: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(columns.iter().map(String::as_str))
        .collect();
    write_row(w, &header)?;

    for r in records {
        let mut row: Vec<&str> = vec![r.kanji_name.as_str(), r.yomi.as_str(), r.party.as_str()];
        row.extend(
            columns
                .iter()
                .map(|c| r.metadata.get(c).map(String::as_str).unwrap_or("")),
        );
        write_row(w, &row)?;
    }
    Ok(())
}

pub fn write_file(
    path: &Path,
    records: &[CandidateRecord],
    configured: Option<&[String]>,
    bom: bool,
) -> Result<()> {
    let columns = metadata_columns(records, configured);
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_csv(&mut w, records, &columns, bom)?;
    w.flush()?;
    info!("Saved {} with {} records", path.display(), records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rec(name: &str, yomi: &str, party: &str, meta: &[(&str, &str)]) -> CandidateRecord {
        CandidateRecord {
            kanji_name: name.into(),
            yomi: yomi.into(),
            party: party.into(),
            metadata: meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn default_columns_sorted_conflicts_last() {
        let records = vec![
            rec("山田太郎", "やまだたろう", "自民", &[("district", "東京"), ("conflicts", "x")]),
            rec("鈴木一郎", "すずきいちろう", "", &[("age", "61")]),
        ];
        assert_eq!(metadata_columns(&records, None), vec!["age", "district", "conflicts"]);
        let fixed = vec!["district".to_string()];
        assert_eq!(metadata_columns(&records, Some(fixed.as_slice())), vec!["district"]);
    }

    #[test]
    fn writes_header_and_rows() {
        let records = vec![
            rec("山田太郎", "やまだたろう", "自民", &[("district", "東京")]),
            rec("鈴木一郎", "すずきいちろう", "", &[("conflicts", "party: 維新 (a), 立憲 (b)")]),
        ];
        let cols = metadata_columns(&records, None);
        let mut buf = Vec::new();
        write_csv(&mut buf, &records, &cols, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "kanji_name,yomi,party,district,conflicts");
        assert_eq!(lines[1], "山田太郎,やまだたろう,自民,東京,");
        assert_eq!(lines[2], "鈴木一郎,すずきいちろう,,,\"party: 維新 (a), 立憲 (b)\"");
    }

    #[test]
    fn escapes_quotes() {
        let mut buf = Vec::new();
        write_row(&mut buf, &["a\"b", "c"]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"a\"\"b\",c\r\n");
    }

    #[test]
    fn bom_and_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![rec("佐藤花子", "さとうはなこ", "公明", &[])];
        write_file(&path, &records, None, true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('\u{FEFF}'));
        assert!(text.contains("佐藤花子,さとうはなこ,公明"));
    }
}
