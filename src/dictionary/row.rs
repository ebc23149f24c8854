//! The atomic rule: one source column's fate.
//!
//! A [`DictionaryRow`] says, for exactly one column of one source table,
//! whether the value reaches the destination, under what name and type, how
//! it is altered on the way, whether it feeds the free-text scrubber, and how
//! the destination column is indexed. Rows are constructed either by parsing
//! a persisted rule file or by derivation from live schema introspection;
//! both paths end in the same full validation, and a validated row is never
//! mutated again.

use crate::config::{LetheConfig, OutputConfig, SourceProfile};
use crate::domain::{LetheError, Result};
use crate::pseudonym::SQLTYPE_PSEUDONYM;
use crate::schema::SourceColumn;
use crate::sql;
use std::fmt;

/// Default index prefix length for types that need one (TEXT/BLOB).
pub const DEFAULT_INDEX_LEN: u32 = 20;

/// Which scrub vocabulary a column's values feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubSource {
    /// Patient-identifying values (names, dates of birth, numbers)
    Patient,
    /// Carer/family/other third-party values
    ThirdParty,
}

impl ScrubSource {
    /// Rule-file token.
    pub fn as_token(self) -> &'static str {
        match self {
            ScrubSource::Patient => "patient",
            ScrubSource::ThirdParty => "thirdparty",
        }
    }

    fn parse(token: &str) -> std::result::Result<Option<Self>, String> {
        match token.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "patient" => Ok(Some(ScrubSource::Patient)),
            "thirdparty" => Ok(Some(ScrubSource::ThirdParty)),
            other => Err(format!("invalid scrub_src: {other}")),
        }
    }
}

/// How a scrub-source column's values are matched in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubMethod {
    /// Match as words/strings
    Text,
    /// Match as a number (digit sequences, ignoring separators)
    Numeric,
    /// Match as a date in any of the recognized renderings
    Date,
}

impl ScrubMethod {
    /// Rule-file token.
    pub fn as_token(self) -> &'static str {
        match self {
            ScrubMethod::Text => "text",
            ScrubMethod::Numeric => "number",
            ScrubMethod::Date => "date",
        }
    }

    fn parse(token: &str) -> std::result::Result<Option<Self>, String> {
        match token.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "text" => Ok(Some(ScrubMethod::Text)),
            "number" => Ok(Some(ScrubMethod::Numeric)),
            "date" => Ok(Some(ScrubMethod::Date)),
            other => Err(format!("invalid scrub_method: {other}")),
        }
    }
}

/// In-flight alteration applied to a kept value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterMethod {
    /// Pass the text through the scrubber
    ScrubIn,
    /// Truncate a date to the first of its month
    TruncateDate,
}

impl AlterMethod {
    /// Rule-file token.
    pub fn as_token(self) -> &'static str {
        match self {
            AlterMethod::ScrubIn => "scrub",
            AlterMethod::TruncateDate => "truncatedate",
        }
    }

    fn parse(token: &str) -> std::result::Result<Option<Self>, String> {
        match token.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "scrub" => Ok(Some(AlterMethod::ScrubIn)),
            "truncatedate" => Ok(Some(AlterMethod::TruncateDate)),
            other => Err(format!("invalid alter_method: {other}")),
        }
    }
}

/// Index to create on the destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Ordinary index
    Normal,
    /// Unique index
    Unique,
    /// FULLTEXT index for long text
    FullText,
}

impl IndexKind {
    /// Rule-file token.
    pub fn as_token(self) -> &'static str {
        match self {
            IndexKind::Normal => "I",
            IndexKind::Unique => "U",
            IndexKind::FullText => "F",
        }
    }

    fn parse(token: &str) -> std::result::Result<Option<Self>, String> {
        match token.trim().to_uppercase().as_str() {
            "" => Ok(None),
            "I" => Ok(Some(IndexKind::Normal)),
            "U" => Ok(Some(IndexKind::Unique)),
            "F" => Ok(Some(IndexKind::FullText)),
            other => Err(format!("invalid index: {other}")),
        }
    }
}

/// Source-column role flags, serialized as a compact letter string
/// (`K` primary key, `H` add source hash, `P` primary patient ID,
/// `M` master patient ID, `*` defines primary patient IDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SrcFlags {
    /// This column is the table's primary key
    pub primary_key: bool,
    /// Add a change-detection hash column to the destination table
    pub add_source_hash: bool,
    /// This column is the per-table patient identifier
    pub primary_patient_id: bool,
    /// This column defines the patient-identifier universe
    pub defines_primary_patient_ids: bool,
    /// This column is the master identifier (e.g. NHS number)
    pub master_patient_id: bool,
}

impl SrcFlags {
    /// Parses a flag letter string; order-insensitive, unknown letters
    /// rejected.
    pub fn parse(token: &str) -> std::result::Result<Self, String> {
        let mut flags = SrcFlags::default();
        for c in token.trim().chars() {
            match c {
                'K' => flags.primary_key = true,
                'H' => flags.add_source_hash = true,
                'P' => flags.primary_patient_id = true,
                'M' => flags.master_patient_id = true,
                '*' => flags.defines_primary_patient_ids = true,
                other => return Err(format!("invalid src_flags character: {other}")),
            }
        }
        Ok(flags)
    }

    /// Canonical letter-string form (`K`, `H`, `P`, `M`, `*` in that order).
    pub fn as_token(&self) -> String {
        let mut s = String::new();
        if self.primary_key {
            s.push('K');
        }
        if self.add_source_hash {
            s.push('H');
        }
        if self.primary_patient_id {
            s.push('P');
        }
        if self.master_patient_id {
            s.push('M');
        }
        if self.defines_primary_patient_ids {
            s.push('*');
        }
        s
    }

    /// True when no flag is set.
    pub fn is_empty(&self) -> bool {
        *self == SrcFlags::default()
    }
}

impl fmt::Display for SrcFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// How a row came to exist. File-loaded rows are authoritative and never
/// overwritten by derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// Parsed from a persisted rule file
    RuleFile,
    /// Auto-derived from live schema introspection (draft)
    Derived,
}

/// One source column's transformation rule. See the module docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRow {
    /// Source database alias
    pub src_db: String,
    /// Source table name
    pub src_table: String,
    /// Source column name
    pub src_field: String,
    /// Raw SQL type of the source column, uppercased
    pub src_datatype: String,
    /// Role flags
    pub src_flags: SrcFlags,
    /// Scrub vocabulary this column feeds, if any
    pub scrub_source: Option<ScrubSource>,
    /// How to match this column's values in free text
    pub scrub_method: Option<ScrubMethod>,
    /// Omit from the destination entirely?
    pub omit: bool,
    /// Alteration applied to kept values
    pub alter_method: Option<AlterMethod>,
    /// Destination table name
    pub dest_table: String,
    /// Destination column name
    pub dest_field: String,
    /// Destination SQL type, uppercased
    pub dest_datatype: String,
    /// Index to create on the destination column
    pub index_kind: Option<IndexKind>,
    /// Index prefix length, where the destination type needs one
    pub index_len: Option<u32>,
    /// Free-form comment carried into the destination schema
    pub comment: Option<String>,
    /// Construction path
    pub origin: RowOrigin,
}

/// Boolean tokens accepted in rule files.
fn parse_bool(token: &str) -> std::result::Result<bool, String> {
    match token.trim().to_lowercase().as_str() {
        "" | "0" | "n" | "f" | "false" => Ok(false),
        "1" | "y" | "t" | "true" => Ok(true),
        other => Err(format!("invalid boolean: {other}")),
    }
}

fn parse_opt_u32(token: &str) -> std::result::Result<Option<u32>, String> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    token
        .parse()
        .map(Some)
        .map_err(|_| format!("invalid integer: {token}"))
}

fn opt_string(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl DictionaryRow {
    /// `db.table.field` identity; unique within a dictionary.
    pub fn signature(&self) -> String {
        format!("{}.{}.{}", self.src_db, self.src_table, self.src_field)
    }

    /// Signature including the destination mapping, for error reports.
    pub fn offender_signature(&self) -> String {
        if self.omit {
            self.signature()
        } else {
            format!(
                "{} -> {}.{}",
                self.signature(),
                self.dest_table,
                self.dest_field
            )
        }
    }

    /// Builds a row from the 15 rule-file column values, in persisted order.
    /// Type strings are uppercased, booleans and integers coerced, blanks
    /// treated as unset. The row still needs [`validate`](Self::validate).
    pub fn from_record(values: &[String]) -> Result<Self> {
        if values.len() != super::tsv::COLUMN_COUNT {
            return Err(LetheError::malformed(
                values.join("\t"),
                format!(
                    "expected {} columns, found {}",
                    super::tsv::COLUMN_COUNT,
                    values.len()
                ),
            ));
        }
        let signature = format!("{}.{}.{}", values[0], values[1], values[2]);
        let fail = |message: String| LetheError::malformed(signature.clone(), message);

        Ok(DictionaryRow {
            src_db: values[0].trim().to_string(),
            src_table: values[1].trim().to_string(),
            src_field: values[2].trim().to_string(),
            src_datatype: values[3].trim().to_uppercase(),
            src_flags: SrcFlags::parse(&values[4]).map_err(&fail)?,
            scrub_source: ScrubSource::parse(&values[5]).map_err(&fail)?,
            scrub_method: ScrubMethod::parse(&values[6]).map_err(&fail)?,
            omit: parse_bool(&values[7]).map_err(&fail)?,
            alter_method: AlterMethod::parse(&values[8]).map_err(&fail)?,
            dest_table: values[9].trim().to_string(),
            dest_field: values[10].trim().to_string(),
            dest_datatype: values[11].trim().to_uppercase(),
            index_kind: IndexKind::parse(&values[12]).map_err(&fail)?,
            index_len: parse_opt_u32(&values[13]).map_err(&fail)?,
            comment: opt_string(&values[14]),
            origin: RowOrigin::RuleFile,
        })
    }

    /// The 15 rule-file column values, in persisted order.
    pub fn to_record(&self) -> [String; super::tsv::COLUMN_COUNT] {
        [
            self.src_db.clone(),
            self.src_table.clone(),
            self.src_field.clone(),
            self.src_datatype.clone(),
            self.src_flags.as_token(),
            self.scrub_source.map(ScrubSource::as_token).unwrap_or("").to_string(),
            self.scrub_method.map(ScrubMethod::as_token).unwrap_or("").to_string(),
            if self.omit { "1" } else { "0" }.to_string(),
            self.alter_method.map(AlterMethod::as_token).unwrap_or("").to_string(),
            self.dest_table.clone(),
            self.dest_field.clone(),
            self.dest_datatype.clone(),
            self.index_kind.map(IndexKind::as_token).unwrap_or("").to_string(),
            self.index_len.map(|n| n.to_string()).unwrap_or_default(),
            self.comment.clone().unwrap_or_default(),
        ]
    }

    /// Derives a draft rule for one introspected column, using the source
    /// profile's defaults and the configured output naming.
    ///
    /// The derived row is a draft: it may later be demoted (a scrub-in rule
    /// on a table with no patient information loses its alteration) and must
    /// pass [`validate`](Self::validate) like any other row.
    ///
    /// Inclusion policy: a column defaults to omitted unless the profile asks
    /// for default inclusion, and a scrub-source column is always omitted by
    /// default. Structural keys and identifier columns are always kept;
    /// identifiers leave pseudonymized.
    pub fn derive(
        db: &str,
        column: &SourceColumn,
        profile: &SourceProfile,
        output: &OutputConfig,
    ) -> Self {
        let field = column.name.as_str();
        let datatype = column.datatype_full.trim().to_uppercase();

        let mut flags = SrcFlags::default();
        if profile.possible_pk_fields.iter().any(|f| f == field) {
            flags.primary_key = true;
            flags.add_source_hash = true;
        }
        if field == profile.per_table_pid_field {
            flags.primary_patient_id = true;
        }
        if profile.master_pid_field.as_deref() == Some(field) {
            flags.master_patient_id = true;
        }
        if profile.pid_defining_fields.iter().any(|f| f == field) {
            flags.defines_primary_patient_ids = true;
        }

        let scrub_source = if profile.scrubsrc_patient_fields.iter().any(|f| f == field) {
            Some(ScrubSource::Patient)
        } else if profile.scrubsrc_thirdparty_fields.iter().any(|f| f == field) {
            Some(ScrubSource::ThirdParty)
        } else {
            None
        };

        // Precedence: numeric beats date beats text. Identifier columns are
        // numbers wherever they appear, including in text renderings.
        let scrub_method = if scrub_source.is_none() {
            None
        } else if sql::is_sqltype_numeric(&datatype)
            || field == profile.per_table_pid_field
            || profile.master_pid_field.as_deref() == Some(field)
            || profile.scrubmethod_number_fields.iter().any(|f| f == field)
        {
            Some(ScrubMethod::Numeric)
        } else if sql::is_sqltype_date(&datatype)
            || profile.scrubmethod_date_fields.iter().any(|f| f == field)
        {
            Some(ScrubMethod::Date)
        } else {
            Some(ScrubMethod::Text)
        };

        let omit = (!profile.default_include || scrub_source.is_some())
            && !flags.primary_key
            && !flags.primary_patient_id
            && !flags.master_patient_id;

        let alter_method = if sql::is_sqltype_text_over_one_char(&datatype)
            && !omit
            && !profile
                .safe_fields_exempt_from_scrubbing
                .iter()
                .any(|f| f == field)
        {
            Some(AlterMethod::ScrubIn)
        } else if profile.truncate_date_fields.iter().any(|f| f == field) {
            Some(AlterMethod::TruncateDate)
        } else {
            None
        };

        let dest_field = if flags.primary_patient_id {
            output.research_id_field.clone()
        } else if flags.master_patient_id {
            output.master_research_id_field.clone()
        } else {
            field.to_string()
        };

        let dest_datatype = if flags.primary_patient_id || flags.master_patient_id {
            SQLTYPE_PSEUDONYM.to_string()
        } else {
            datatype.clone()
        };

        let index_kind = if flags.primary_key {
            Some(IndexKind::Unique)
        } else if dest_field == output.research_id_field {
            Some(IndexKind::Normal)
        } else if sql::sqltype_merits_fulltext_index(&dest_datatype) {
            Some(IndexKind::FullText)
        } else {
            None
        };

        let index_len = if sql::sqltype_requires_index_len(&dest_datatype)
            && index_kind != Some(IndexKind::FullText)
        {
            Some(DEFAULT_INDEX_LEN)
        } else {
            None
        };

        DictionaryRow {
            src_db: db.to_string(),
            src_table: column.table.clone(),
            src_field: field.to_string(),
            src_datatype: datatype,
            src_flags: flags,
            scrub_source,
            scrub_method,
            omit,
            alter_method,
            dest_table: column.table.clone(),
            dest_field,
            dest_datatype,
            index_kind,
            index_len,
            comment: column.comment.clone(),
            origin: RowOrigin::Derived,
        }
    }

    /// Full per-row validation against the owning configuration.
    ///
    /// Checks the §invariants that can be decided from one row alone;
    /// cross-row consistency belongs to the dictionary. Every error carries
    /// the full offender signature.
    pub fn validate(&self, config: &LetheConfig) -> Result<()> {
        let sig = self.offender_signature();
        let malformed = |message: String| LetheError::malformed(sig.clone(), message);
        let inconsistent = |message: String| LetheError::inconsistent(sig.clone(), message);

        for (name, value) in [
            ("src_db", &self.src_db),
            ("src_table", &self.src_table),
            ("src_field", &self.src_field),
            ("src_datatype", &self.src_datatype),
        ] {
            if value.is_empty() {
                return Err(malformed(format!("{name} must not be blank")));
            }
        }
        if !self.omit {
            for (name, value) in [
                ("dest_table", &self.dest_table),
                ("dest_field", &self.dest_field),
                ("dest_datatype", &self.dest_datatype),
            ] {
                if value.is_empty() {
                    return Err(malformed(format!(
                        "{name} must not be blank on a non-omitted row"
                    )));
                }
            }
        }

        let profile = config.profile(&self.src_db).ok_or_else(|| {
            inconsistent(format!(
                "references source database {} which is not configured",
                self.src_db
            ))
        })?;

        if !sql::is_valid_table_name(&self.src_table) {
            return Err(malformed(format!("invalid source table name: {}", self.src_table)));
        }
        if !sql::is_valid_field_name(&self.src_field) {
            return Err(malformed(format!("invalid source field name: {}", self.src_field)));
        }
        if !sql::is_sqltype_valid(&self.src_datatype) {
            return Err(malformed(format!(
                "invalid source data type: {}",
                self.src_datatype
            )));
        }

        if self.src_field == profile.per_table_pid_field
            && !sql::is_sqltype_integer(&self.src_datatype)
        {
            return Err(inconsistent(format!(
                "rows on {} must have an integer source type, for work distribution",
                self.src_field
            )));
        }

        if self.src_flags.defines_primary_patient_ids && !self.src_flags.primary_patient_id {
            return Err(inconsistent(
                "defines_primary_patient_ids requires primary_patient_id".to_string(),
            ));
        }

        let exclusive = [
            self.src_flags.primary_patient_id,
            self.src_flags.master_patient_id,
            self.alter_method.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count();
        if exclusive > 1 {
            return Err(inconsistent(
                "a row may carry only one of: primary_patient_id, master_patient_id, \
                 an alter_method"
                    .to_string(),
            ));
        }

        if !self.omit {
            if !sql::is_valid_table_name(&self.dest_table) {
                return Err(malformed(format!(
                    "invalid destination table name: {}",
                    self.dest_table
                )));
            }
            if !sql::is_valid_field_name(&self.dest_field) {
                return Err(malformed(format!(
                    "invalid destination field name: {}",
                    self.dest_field
                )));
            }
            if self.dest_field == config.output.source_hash_field {
                return Err(inconsistent(format!(
                    "destination fields may not be named {}; that name is reserved \
                     for the source-hash column",
                    config.output.source_hash_field
                )));
            }
            if !sql::is_sqltype_valid(&self.dest_datatype) {
                return Err(malformed(format!(
                    "invalid destination data type: {}",
                    self.dest_datatype
                )));
            }

            if self.src_field == profile.per_table_pid_field {
                if !self.src_flags.primary_patient_id {
                    return Err(inconsistent(format!(
                        "non-omitted rows on {} must carry primary_patient_id",
                        self.src_field
                    )));
                }
                if self.dest_field != config.output.research_id_field {
                    return Err(inconsistent(format!(
                        "primary patient ID rows must map to destination field {}",
                        config.output.research_id_field
                    )));
                }
            }
            if profile.master_pid_field.as_deref() == Some(self.src_field.as_str())
                && !self.src_flags.master_patient_id
            {
                return Err(inconsistent(format!(
                    "non-omitted rows on {} must carry master_patient_id",
                    self.src_field
                )));
            }

            match self.alter_method {
                Some(AlterMethod::TruncateDate) => {
                    if !sql::is_sqltype_date(&self.src_datatype)
                        && !sql::is_sqltype_text_over_one_char(&self.src_datatype)
                    {
                        return Err(inconsistent(
                            "cannot truncate-date a non-date, non-text field".to_string(),
                        ));
                    }
                }
                Some(AlterMethod::ScrubIn) => {
                    if !sql::is_sqltype_text_over_one_char(&self.src_datatype) {
                        return Err(inconsistent(
                            "cannot scrub into a non-text or single-character field".to_string(),
                        ));
                    }
                }
                None => {}
            }

            if (self.src_flags.primary_patient_id || self.src_flags.master_patient_id)
                && self.dest_datatype != SQLTYPE_PSEUDONYM
            {
                return Err(inconsistent(format!(
                    "pseudonymized identifier rows must use destination type {SQLTYPE_PSEUDONYM}"
                )));
            }

            if matches!(self.index_kind, Some(IndexKind::Normal) | Some(IndexKind::Unique))
                && self.index_len.is_none()
                && sql::sqltype_requires_index_len(&self.dest_datatype)
            {
                return Err(inconsistent(
                    "an index on a TEXT or BLOB destination needs an explicit index length"
                        .to_string(),
                ));
            }
        }

        if self.src_flags.add_source_hash {
            if !self.src_flags.primary_key {
                return Err(inconsistent(
                    "add_source_hash may only be set on primary-key rows".to_string(),
                ));
            }
            if self.omit {
                return Err(inconsistent(
                    "do not set omit on add_source_hash rows".to_string(),
                ));
            }
            if self.index_kind != Some(IndexKind::Unique) {
                return Err(inconsistent(
                    "add_source_hash rows require a unique index".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl fmt::Display for DictionaryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_record().join("\t"))
    }
}
