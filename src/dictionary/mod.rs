//! The data dictionary: the full, validated rule set.
//!
//! A [`Dictionary`] owns an ordered list of [`DictionaryRow`]s (order matters
//! only for serialization; identity is the `db.table.field` signature) plus a
//! set of derived indexes answering every query the execution engine makes in
//! O(1). Construction either loads a persisted rule file or derives a draft
//! from live schema introspection; both end in per-row and collective
//! validation, and a dictionary that fails any check is never handed out.
//!
//! There is no partial or degraded dictionary: one inconsistent rule (say a
//! patient identifier routed to an unhashed output column) is an
//! information-disclosure failure, so the whole pass aborts with enough
//! context to fix the rule file.

pub mod index;
pub mod row;
pub mod tsv;

pub use index::SourceHashDescriptor;
pub use row::{
    AlterMethod, DictionaryRow, IndexKind, RowOrigin, ScrubMethod, ScrubSource, SrcFlags,
    DEFAULT_INDEX_LEN,
};

use crate::config::LetheConfig;
use crate::domain::{LetheError, Result, SourceTableKey};
use crate::schema::SchemaIntrospector;
use index::DictionaryIndex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// The rule engine's central structure. See the module docs.
#[derive(Debug, Default)]
pub struct Dictionary {
    rows: Vec<DictionaryRow>,
    index: DictionaryIndex,
}

impl Dictionary {
    /// An empty dictionary, ready for [`extend_from_schema`](Self::extend_from_schema).
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a persisted rule set from TSV text.
    ///
    /// Every row is fully re-validated even though the file is trusted, and
    /// duplicate signatures are rejected. Collective validation is a
    /// separate step (the engine runs it once the whole rule set, possibly
    /// supplemented by derivation, is in place).
    pub fn load_str(text: &str, config: &LetheConfig) -> Result<Self> {
        debug!("loading data dictionary");
        let rows = tsv::parse_rows(text)?;
        let mut seen = HashSet::new();
        for row in &rows {
            row.validate(config)?;
            if !seen.insert(row.signature()) {
                return Err(LetheError::inconsistent(
                    row.offender_signature(),
                    "duplicate rule for this source column",
                ));
            }
        }
        let index = DictionaryIndex::build(&rows);
        debug!(rows = rows.len(), "data dictionary loaded");
        Ok(Self { rows, index })
    }

    /// Loads a persisted rule set from a file.
    pub fn load_file(path: impl AsRef<Path>, config: &LetheConfig) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LetheError::Io(format!("cannot read rule file {}: {e}", path.display()))
        })?;
        Self::load_str(&text, config)
    }

    /// Derives draft rules from every configured source database's schema.
    ///
    /// For each introspected (table, column) not blacklisted by its profile,
    /// a default rule is built; columns whose signature was already loaded
    /// from a rule file keep their file rule untouched. After the full pass,
    /// any derived scrub-in rule on a table not known to carry patient
    /// information is demoted to no alteration: its scrub vocabulary would be
    /// empty and the cost wasted.
    pub fn extend_from_schema(
        &mut self,
        config: &LetheConfig,
        introspector: &dyn SchemaIntrospector,
    ) -> Result<()> {
        info!("deriving draft rules from source schemas");
        let mut signatures: HashSet<String> =
            self.rows.iter().map(DictionaryRow::signature).collect();

        for (db_name, source) in &config.sources {
            let profile = &source.profile;
            let columns = introspector.columns(db_name)?;
            debug!(db = %db_name, columns = columns.len(), "read source schema");
            for column in &columns {
                if profile.table_blacklist.iter().any(|t| *t == column.table) {
                    continue;
                }
                if profile.field_blacklist.iter().any(|f| *f == column.name) {
                    continue;
                }
                let row = DictionaryRow::derive(db_name, column, profile, &config.output);
                row.validate(config)?;
                if signatures.insert(row.signature()) {
                    self.rows.push(row);
                }
            }
        }
        self.rebuild_index();

        let patient_tables = self.index.src_tables_with_patient_info.clone();
        let mut demoted = 0usize;
        for row in &mut self.rows {
            if row.origin != RowOrigin::Derived {
                continue;
            }
            if row.alter_method == Some(AlterMethod::ScrubIn) {
                let table_has_patient_info = patient_tables
                    .get(&row.src_db)
                    .is_some_and(|tables| tables.contains(&row.src_table));
                if !table_has_patient_info {
                    row.alter_method = None;
                    demoted += 1;
                }
            }
        }
        if demoted > 0 {
            debug!(demoted, "removed scrub-in from tables without patient information");
            self.rebuild_index();
        }
        info!(rows = self.rows.len(), "draft dictionary ready");
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = DictionaryIndex::build(&self.rows);
    }

    /// Cross-row and cross-table consistency checks.
    ///
    /// Violations are gathered and reported together, one per line. When an
    /// introspector is supplied, referenced source tables are also checked
    /// against the live schema; pass `None` to skip only that cross-check.
    pub fn validate_collective(
        &self,
        config: &LetheConfig,
        introspector: Option<&dyn SchemaIntrospector>,
    ) -> Result<()> {
        info!("checking data dictionary consistency");
        if self.rows.is_empty() {
            return Err(LetheError::CollectiveInconsistency(
                "empty data dictionary".to_string(),
            ));
        }
        if self.index.dest_tables.is_empty() {
            return Err(LetheError::CollectiveInconsistency(
                "data dictionary writes nothing: every rule is omitted".to_string(),
            ));
        }

        let mut problems: Vec<String> = Vec::new();

        for table in &self.index.dest_tables {
            if let Some(pairs) = self.index.src_tables_for_dest_table.get(table) {
                if pairs.len() > 1 {
                    let sources: Vec<String> = pairs.iter().map(ToString::to_string).collect();
                    problems.push(format!(
                        "destination table {table} is fed by multiple source tables: {}",
                        sources.join(", ")
                    ));
                }
            }
        }

        static EMPTY: BTreeSet<String> = BTreeSet::new();
        for db in &self.index.source_databases {
            let Some(profile) = config.profile(db) else {
                // per-row validation already rejects unknown databases
                problems.push(format!("source database {db} is not configured"));
                continue;
            };
            for table in self.index.src_tables.get(db).unwrap_or(&EMPTY) {
                let key = SourceTableKey::new(db.clone(), table.clone());

                if let Some(dests) = self.index.dest_tables_for_src_table.get(&key) {
                    if dests.len() > 1 {
                        let names: Vec<&str> = dests.iter().map(String::as_str).collect();
                        problems.push(format!(
                            "source table {key} maps to more than one destination table: {}",
                            names.join(", ")
                        ));
                    }
                }

                if self.index.needs_pid_field(&self.rows, &key) {
                    let has_active_pid = self.rows_for_src_table(&key).any(|r| {
                        r.src_field == profile.per_table_pid_field && !r.omit
                    });
                    if !has_active_pid {
                        problems.push(format!(
                            "source table {key} has scrub-in or master-identifier rules but \
                             no active rule on its patient-identifier field {}",
                            profile.per_table_pid_field
                        ));
                    }
                }

                let pk_rules = self.index.pk_count(&self.rows, &key);
                if pk_rules > 1 {
                    problems.push(format!(
                        "source table {key} has {pk_rules} primary-key rules; at most one is allowed"
                    ));
                }

                if let Some(introspector) = introspector {
                    if !introspector.table_exists(db, table)? {
                        problems.push(format!(
                            "table {key} is referenced by the dictionary but missing from \
                             the source database"
                        ));
                    }
                }
            }
        }

        match self.index.n_definers {
            0 => problems.push(
                "no rule defines the primary patient IDs; exactly one row should carry \
                 defines_primary_patient_ids"
                    .to_string(),
            ),
            1 => {}
            n => warn!(
                definers = n,
                "unusual: more than one rule defines the primary patient IDs"
            ),
        }

        if problems.is_empty() {
            info!("data dictionary is consistent");
            Ok(())
        } else {
            Err(LetheError::CollectiveInconsistency(problems.join("\n")))
        }
    }

    // ---- query surface (all O(1) against the derived indexes) ----

    /// All rules, in serialization order.
    pub fn rows(&self) -> &[DictionaryRow] {
        &self.rows
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Is the dictionary empty?
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Destination tables with at least one non-omitted rule.
    pub fn dest_tables(&self) -> &BTreeSet<String> {
        &self.index.dest_tables
    }

    /// Source databases contributing rows.
    pub fn source_databases(&self) -> &BTreeSet<String> {
        &self.index.source_databases
    }

    /// Contributing tables of one source database.
    pub fn src_tables<'a>(&'a self, db: &str) -> impl Iterator<Item = &'a str> {
        self.index
            .src_tables
            .get(db)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Rules for one source table.
    pub fn rows_for_src_table<'a>(
        &'a self,
        key: &SourceTableKey,
    ) -> impl Iterator<Item = &'a DictionaryRow> {
        self.index
            .rows_for_src_table
            .get(key)
            .into_iter()
            .flatten()
            .map(move |position| &self.rows[*position])
    }

    /// Rules feeding one destination table.
    pub fn rows_for_dest_table<'a>(
        &'a self,
        dest_table: &str,
    ) -> impl Iterator<Item = &'a DictionaryRow> {
        self.index
            .rows_for_dest_table
            .get(dest_table)
            .into_iter()
            .flatten()
            .map(move |position| &self.rows[*position])
    }

    /// Field names mentioned for one source table.
    pub fn fieldnames_for_src_table<'a>(
        &'a self,
        key: &SourceTableKey,
    ) -> impl Iterator<Item = &'a str> {
        self.index
            .fieldnames_for_src_table
            .get(key)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Source tables feeding one destination table.
    pub fn src_tables_for_dest_table<'a>(
        &'a self,
        dest_table: &str,
    ) -> impl Iterator<Item = &'a SourceTableKey> {
        self.index
            .src_tables_for_dest_table
            .get(dest_table)
            .into_iter()
            .flatten()
    }

    /// Destination tables fed by one source table (more than one is a
    /// collective inconsistency).
    pub fn dest_tables_for_src_table<'a>(
        &'a self,
        key: &SourceTableKey,
    ) -> impl Iterator<Item = &'a str> {
        self.index
            .dest_tables_for_src_table
            .get(key)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Source table pairs carrying patient-identifying columns.
    pub fn src_table_pairs_with_patient_info(&self) -> &BTreeSet<SourceTableKey> {
        &self.index.src_table_pairs_with_patient_info
    }

    /// Source table pairs carrying no patient-identifying columns.
    pub fn src_table_pairs_without_patient_info(&self) -> &BTreeSet<SourceTableKey> {
        &self.index.src_table_pairs_without_patient_info
    }

    /// Tables of one source database that carry patient information.
    pub fn src_tables_with_patient_info<'a>(&'a self, db: &str) -> impl Iterator<Item = &'a str> {
        self.index
            .src_tables_with_patient_info
            .get(db)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Patient tables of one source database that also write output.
    pub fn patient_tables_with_active_destination<'a>(
        &'a self,
        db: &str,
    ) -> impl Iterator<Item = &'a str> {
        self.index
            .patient_tables_with_dest
            .get(db)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Scrub-source rules (omitted or not; omission does not stop a column
    /// feeding the scrub vocabulary).
    pub fn scrub_source_rows(&self) -> impl Iterator<Item = &DictionaryRow> {
        self.index
            .scrub_source_rows
            .iter()
            .map(move |position| &self.rows[*position])
    }

    /// Primary-key / change-hash summary for one source table.
    pub fn source_hash_descriptor(&self, key: &SourceTableKey) -> Option<&SourceHashDescriptor> {
        self.index.source_hash_info.get(key)
    }

    /// Does this source table write anything to the destination?
    pub fn has_active_destination(&self, key: &SourceTableKey) -> bool {
        self.index
            .has_active_destination
            .get(key)
            .copied()
            .unwrap_or(false)
    }

    /// Serializes back to the persisted rule format. Reciprocal with
    /// [`load_str`](Self::load_str): the output re-parses to an identical
    /// rule set.
    pub fn to_tsv(&self) -> Result<String> {
        tsv::serialize_rows(&self.rows)
    }
}
