//! Derived indexes over the rule list.
//!
//! Every map here is a pure function of the row list, rebuilt in a single
//! pass by [`DictionaryIndex::build`] and never mutated independently. The
//! dictionary's whole query surface answers from these structures; nothing
//! re-scans the row list at query time.

use super::row::DictionaryRow;
use crate::domain::SourceTableKey;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-source-table summary of primary-key and change-hash handling,
/// consumed by the execution engine for incremental updates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceHashDescriptor {
    /// The table's primary-key column, if a rule flags one
    pub pk_field: Option<String>,
    /// Was a change-detection hash column requested for this table?
    pub add_source_hash: bool,
    /// Destination table the hash column belongs to
    pub dest_table: String,
    /// Destination name of the primary-key column, when it is kept
    pub pk_dest_field: Option<String>,
}

/// All derived caches, rebuilt whenever the row list changes.
#[derive(Debug, Default)]
pub struct DictionaryIndex {
    /// Destination tables with at least one non-omitted rule
    pub(crate) dest_tables: BTreeSet<String>,
    /// Source databases contributing rows (patient info or active output)
    pub(crate) source_databases: BTreeSet<String>,
    /// Every (db, table) pair any rule mentions
    pub(crate) src_table_pairs: BTreeSet<SourceTableKey>,
    /// Pairs with at least one scrub-source rule
    pub(crate) src_table_pairs_with_patient_info: BTreeSet<SourceTableKey>,
    /// Complement of the above within `src_table_pairs`
    pub(crate) src_table_pairs_without_patient_info: BTreeSet<SourceTableKey>,
    /// Row positions of scrub-source rules, omitted or not
    pub(crate) scrub_source_rows: Vec<usize>,
    /// Per-db contributing tables
    pub(crate) src_tables: BTreeMap<String, BTreeSet<String>>,
    /// Per-db tables carrying patient-identifying columns
    pub(crate) src_tables_with_patient_info: BTreeMap<String, BTreeSet<String>>,
    /// Per-db patient tables that also write to the destination
    pub(crate) patient_tables_with_dest: BTreeMap<String, BTreeSet<String>>,
    /// Row positions per source table
    pub(crate) rows_for_src_table: HashMap<SourceTableKey, Vec<usize>>,
    /// Row positions per destination table
    pub(crate) rows_for_dest_table: BTreeMap<String, Vec<usize>>,
    /// Field names per source table
    pub(crate) fieldnames_for_src_table: HashMap<SourceTableKey, BTreeSet<String>>,
    /// Source pairs feeding each destination table (fan-in check)
    pub(crate) src_tables_for_dest_table: BTreeMap<String, BTreeSet<SourceTableKey>>,
    /// Destination tables fed by each source pair (fan-out check)
    pub(crate) dest_tables_for_src_table: HashMap<SourceTableKey, BTreeSet<String>>,
    /// Primary-key / change-hash summary per source pair
    pub(crate) source_hash_info: HashMap<SourceTableKey, SourceHashDescriptor>,
    /// Does the source pair write anything at all?
    pub(crate) has_active_destination: HashMap<SourceTableKey, bool>,
    /// Count of rules that define the patient-identifier universe
    pub(crate) n_definers: usize,
}

impl DictionaryIndex {
    /// Recomputes every cache from `rows`. Idempotent; safe to re-run after
    /// any mutation of the row list.
    pub fn build(rows: &[DictionaryRow]) -> Self {
        let mut index = DictionaryIndex::default();

        for (position, row) in rows.iter().enumerate() {
            let key = SourceTableKey::new(row.src_db.clone(), row.src_table.clone());

            index.src_table_pairs.insert(key.clone());
            index
                .rows_for_src_table
                .entry(key.clone())
                .or_default()
                .push(position);
            index
                .fieldnames_for_src_table
                .entry(key.clone())
                .or_default()
                .insert(row.src_field.clone());
            index.has_active_destination.entry(key.clone()).or_insert(false);

            if !row.dest_table.is_empty() {
                index
                    .src_tables_for_dest_table
                    .entry(row.dest_table.clone())
                    .or_default()
                    .insert(key.clone());
                index
                    .rows_for_dest_table
                    .entry(row.dest_table.clone())
                    .or_default()
                    .push(position);
            }

            let descriptor = index
                .source_hash_info
                .entry(key.clone())
                .or_insert_with(|| SourceHashDescriptor {
                    dest_table: row.dest_table.clone(),
                    ..SourceHashDescriptor::default()
                });
            if row.src_flags.primary_key {
                *descriptor = SourceHashDescriptor {
                    pk_field: Some(row.src_field.clone()),
                    add_source_hash: row.src_flags.add_source_hash,
                    dest_table: row.dest_table.clone(),
                    pk_dest_field: if row.omit {
                        None
                    } else {
                        Some(row.dest_field.clone())
                    },
                };
            }

            let patient_info = row.scrub_source.is_some();
            if patient_info {
                index.scrub_source_rows.push(position);
                index
                    .src_tables_with_patient_info
                    .entry(row.src_db.clone())
                    .or_default()
                    .insert(row.src_table.clone());
                index
                    .src_table_pairs_with_patient_info
                    .insert(key.clone());
            }

            // A table matters to the pipeline if it feeds the scrubber or
            // the destination; rows that do neither are inert bookkeeping.
            if patient_info || !row.omit {
                index.source_databases.insert(row.src_db.clone());
                index
                    .src_tables
                    .entry(row.src_db.clone())
                    .or_default()
                    .insert(row.src_table.clone());
            }

            if !row.omit {
                index.dest_tables.insert(row.dest_table.clone());
                index.has_active_destination.insert(key.clone(), true);
                index
                    .dest_tables_for_src_table
                    .entry(key.clone())
                    .or_default()
                    .insert(row.dest_table.clone());
            }

            if row.src_flags.defines_primary_patient_ids {
                index.n_definers += 1;
            }
        }

        index.src_table_pairs_without_patient_info = index
            .src_table_pairs
            .difference(&index.src_table_pairs_with_patient_info)
            .cloned()
            .collect();

        for (db, patient_tables) in &index.src_tables_with_patient_info {
            let with_dest: BTreeSet<String> = patient_tables
                .iter()
                .filter(|table| {
                    index
                        .has_active_destination
                        .get(&SourceTableKey::new(db.clone(), (*table).clone()))
                        .copied()
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            index.patient_tables_with_dest.insert(db.clone(), with_dest);
        }

        index
    }

    /// Row positions carrying a unique-index primary key, per table; used by
    /// the collective at-most-one-PK check.
    pub(crate) fn pk_count(&self, rows: &[DictionaryRow], key: &SourceTableKey) -> usize {
        self.rows_for_src_table
            .get(key)
            .map(|positions| {
                positions
                    .iter()
                    .filter(|p| rows[**p].src_flags.primary_key)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Does any non-omitted row of this table scrub text in or carry the
    /// master identifier? Such tables must also carry the patient-identifier
    /// column.
    pub(crate) fn needs_pid_field(&self, rows: &[DictionaryRow], key: &SourceTableKey) -> bool {
        self.rows_for_src_table
            .get(key)
            .map(|positions| {
                positions.iter().any(|p| {
                    let row = &rows[*p];
                    !row.omit
                        && (row.alter_method == Some(super::row::AlterMethod::ScrubIn)
                            || row.src_flags.master_patient_id)
                })
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::row::{AlterMethod, IndexKind, RowOrigin, ScrubSource, SrcFlags};

    fn row(
        table: &str,
        field: &str,
        omit: bool,
        scrub: Option<ScrubSource>,
    ) -> DictionaryRow {
        DictionaryRow {
            src_db: "ehr".to_string(),
            src_table: table.to_string(),
            src_field: field.to_string(),
            src_datatype: "VARCHAR(50)".to_string(),
            src_flags: SrcFlags::default(),
            scrub_source: scrub,
            scrub_method: None,
            omit,
            alter_method: None,
            dest_table: table.to_string(),
            dest_field: field.to_string(),
            dest_datatype: "VARCHAR(50)".to_string(),
            index_kind: None,
            index_len: None,
            comment: None,
            origin: RowOrigin::RuleFile,
        }
    }

    #[test]
    fn test_patient_info_partition() {
        let rows = vec![
            row("patients", "surname", true, Some(ScrubSource::Patient)),
            row("patients", "height", false, None),
            row("visits", "ward", false, None),
        ];
        let index = DictionaryIndex::build(&rows);

        let patients = SourceTableKey::new("ehr", "patients");
        let visits = SourceTableKey::new("ehr", "visits");
        assert!(index.src_table_pairs_with_patient_info.contains(&patients));
        assert!(!index.src_table_pairs_with_patient_info.contains(&visits));
        assert!(index.src_table_pairs_without_patient_info.contains(&visits));
        assert_eq!(index.scrub_source_rows, vec![0]);
    }

    #[test]
    fn test_active_destination_flag() {
        let rows = vec![
            row("patients", "surname", true, Some(ScrubSource::Patient)),
            row("patients", "height", false, None),
            row("archive", "blob", true, None),
        ];
        let index = DictionaryIndex::build(&rows);

        assert!(index.has_active_destination[&SourceTableKey::new("ehr", "patients")]);
        assert!(!index.has_active_destination[&SourceTableKey::new("ehr", "archive")]);
        assert!(index.dest_tables.contains("patients"));
        assert!(!index.dest_tables.contains("archive"));
    }

    #[test]
    fn test_source_hash_descriptor_tracks_pk() {
        let mut pk = row("patients", "id", false, None);
        pk.src_datatype = "INT".to_string();
        pk.dest_datatype = "INT".to_string();
        pk.src_flags.primary_key = true;
        pk.src_flags.add_source_hash = true;
        pk.index_kind = Some(IndexKind::Unique);

        let rows = vec![row("patients", "height", false, None), pk];
        let index = DictionaryIndex::build(&rows);

        let descriptor = &index.source_hash_info[&SourceTableKey::new("ehr", "patients")];
        assert_eq!(descriptor.pk_field.as_deref(), Some("id"));
        assert!(descriptor.add_source_hash);
        assert_eq!(descriptor.dest_table, "patients");
        assert_eq!(descriptor.pk_dest_field.as_deref(), Some("id"));
    }

    #[test]
    fn test_descriptor_defaults_without_pk() {
        let rows = vec![row("patients", "height", false, None)];
        let index = DictionaryIndex::build(&rows);
        let descriptor = &index.source_hash_info[&SourceTableKey::new("ehr", "patients")];
        assert_eq!(descriptor.pk_field, None);
        assert!(!descriptor.add_source_hash);
    }

    #[test]
    fn test_patient_tables_with_dest_is_an_intersection() {
        let rows = vec![
            // patient info, nothing kept
            row("scrub_only", "surname", true, Some(ScrubSource::Patient)),
            // patient info, output too
            row("patients", "surname", true, Some(ScrubSource::Patient)),
            row("patients", "height", false, None),
        ];
        let index = DictionaryIndex::build(&rows);
        let with_dest = &index.patient_tables_with_dest["ehr"];
        assert!(with_dest.contains("patients"));
        assert!(!with_dest.contains("scrub_only"));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let rows = vec![
            row("patients", "surname", true, Some(ScrubSource::Patient)),
            row("patients", "height", false, None),
        ];
        let a = DictionaryIndex::build(&rows);
        let b = DictionaryIndex::build(&rows);
        assert_eq!(a.dest_tables, b.dest_tables);
        assert_eq!(a.src_table_pairs, b.src_table_pairs);
        assert_eq!(a.scrub_source_rows, b.scrub_source_rows);
        assert_eq!(a.n_definers, b.n_definers);
    }

    #[test]
    fn test_needs_pid_field_trigger() {
        let mut scrubbed = row("notes", "note_text", false, None);
        scrubbed.src_datatype = "TEXT".to_string();
        scrubbed.dest_datatype = "TEXT".to_string();
        scrubbed.alter_method = Some(AlterMethod::ScrubIn);
        let rows = vec![scrubbed, row("visits", "ward", false, None)];
        let index = DictionaryIndex::build(&rows);

        assert!(index.needs_pid_field(&rows, &SourceTableKey::new("ehr", "notes")));
        assert!(!index.needs_pid_field(&rows, &SourceTableKey::new("ehr", "visits")));
    }
}
