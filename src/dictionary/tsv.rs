//! Persisted rule-file format.
//!
//! The data dictionary lives on disk as a tab-separated table with a fixed
//! 15-column header, chosen so multiple authors can edit it in a
//! spreadsheet. The first row must be exactly the standard header or the
//! load is rejected. Serialization and parsing are reciprocal: serializing a
//! loaded rule set reproduces it.

use super::row::DictionaryRow;
use crate::domain::{LetheError, Result};

/// Number of columns in a rule file.
pub const COLUMN_COUNT: usize = 15;

/// The fixed header, in persisted column order.
pub const HEADER: [&str; COLUMN_COUNT] = [
    "src_db",
    "src_table",
    "src_field",
    "src_datatype",
    "src_flags",
    "scrub_src",
    "scrub_method",
    "omit",
    "alter_method",
    "dest_table",
    "dest_field",
    "dest_datatype",
    "index",
    "indexlen",
    "comment",
];

/// Parses rule-file text into unvalidated rows.
///
/// Per-row coercion failures are reported with the row's signature; the
/// caller is responsible for running full row validation afterwards.
pub fn parse_rows(text: &str) -> Result<Vec<DictionaryRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => {
            return Err(LetheError::malformed(
                "header",
                "rule file is empty; expected the standard 15-column header".to_string(),
            ))
        }
    };
    let header_fields: Vec<&str> = header.iter().collect();
    if header_fields != HEADER {
        return Err(LetheError::malformed(
            "header",
            format!(
                "rule file header must be exactly: {}",
                HEADER.join(", ")
            ),
        ));
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let values: Vec<String> = record.iter().map(str::to_string).collect();
        rows.push(DictionaryRow::from_record(&values)?);
    }
    Ok(rows)
}

/// Serializes rows back to the persisted format: header first, then one
/// line per rule, in the order given.
pub fn serialize_rows(rows: &[DictionaryRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| LetheError::Io(format!("rule file write error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| LetheError::Io(format!("rule file encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::row::{AlterMethod, ScrubMethod, ScrubSource};

    fn sample_tsv() -> String {
        let header = HEADER.join("\t");
        [
            header.as_str(),
            "ehr\tpatients\tid\tINT\tKH\t\t\t0\t\tpatients\tid\tINT\tU\t\t",
            "ehr\tpatients\tsurname\tVARCHAR(100)\t\tpatient\ttext\t1\t\tpatients\tsurname\tVARCHAR(100)\t\t\tfamily name",
            "ehr\tnotes\tnote_text\tTEXT\t\t\t\t0\tscrub\tnotes\tnote_text\tTEXT\tF\t\t",
        ]
        .join("\n")
            + "\n"
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(&sample_tsv()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].src_flags.primary_key);
        assert!(rows[0].src_flags.add_source_hash);
        assert_eq!(rows[1].scrub_source, Some(ScrubSource::Patient));
        assert_eq!(rows[1].scrub_method, Some(ScrubMethod::Text));
        assert!(rows[1].omit);
        assert_eq!(rows[1].comment.as_deref(), Some("family name"));
        assert_eq!(rows[2].alter_method, Some(AlterMethod::ScrubIn));
    }

    #[test]
    fn test_roundtrip_is_identity() {
        let text = sample_tsv();
        let rows = parse_rows(&text).unwrap();
        let serialized = serialize_rows(&rows).unwrap();
        assert_eq!(serialized, text);
    }

    #[test]
    fn test_header_must_match_exactly() {
        let text = sample_tsv().replace("src_db", "source_db");
        let err = parse_rows(&text).unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(parse_rows("").is_err());
    }

    #[test]
    fn test_wrong_column_count_rejected() {
        let header = HEADER.join("\t");
        let text = format!("{header}\nehr\tpatients\tid\n");
        let err = parse_rows(&text).unwrap_err();
        assert!(err.to_string().contains("columns"));
    }
}
