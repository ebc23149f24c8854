//! End-to-end derivation: from a live schema snapshot and a source profile
//! to a validated draft dictionary.

use lethe::config::{parse_config, LetheConfig};
use lethe::dictionary::{AlterMethod, Dictionary, IndexKind, ScrubMethod, ScrubSource};
use lethe::engine::Engine;
use lethe::pseudonym::SQLTYPE_PSEUDONYM;
use lethe::schema::MemorySchema;

/// Profile: `id` is the per-table patient identifier and defines the patient
/// universe; `nhsnum` is the master identifier; `name` and `dob` feed the
/// patient scrub vocabulary; `dob` dates are truncated.
const CONFIG: &str = r#"
[destination_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "anon_output"
user = "writer"
password = "wpw"

[admin_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "anon_admin"
user = "admin"
password = "apw"

[secrets]
per_table_patient_id = "s1"
master_patient_id = "s2"
change_detection = "s3"

[scrub]
replace_patient_info_with = "XXX"
replace_third_party_info_with = "YYY"

[output]
mapping_patient_id_field = "mapping_pid"
research_id_field = "rid"
mapping_master_id_field = "mapping_mid"
master_research_id_field = "nhshash"
source_hash_field = "_src_hash"

[sources.registry]
per_table_pid_field = "id"
master_pid_field = "nhsnum"
pid_defining_fields = ["id"]
scrubsrc_patient_fields = ["name", "dob"]
truncate_date_fields = ["dob"]

[sources.registry.connection]
engine = "mysql"
host = "dbhost"
port = 3306
db = "registry_live"
user = "reader"
password = "rpw"
"#;

fn config() -> LetheConfig {
    parse_config(CONFIG).expect("fixture config is valid")
}

fn patients_schema() -> MemorySchema {
    let mut schema = MemorySchema::new();
    schema.add_table(
        "registry",
        "patients",
        &[
            ("id", "INT"),
            ("nhsnum", "INT"),
            ("name", "VARCHAR(100)"),
            ("dob", "DATE"),
        ],
    );
    schema
}

#[test]
fn patients_table_derives_the_expected_rules() {
    let config = config();
    let schema = patients_schema();
    let mut dd = Dictionary::new();
    dd.extend_from_schema(&config, &schema).unwrap();
    assert_eq!(dd.len(), 4);

    let row = |field: &str| {
        dd.rows()
            .iter()
            .find(|r| r.src_field == field)
            .unwrap_or_else(|| panic!("no rule for {field}"))
    };

    // id: the patient identifier, defining the patient universe; kept,
    // pseudonymized, indexed
    let id = row("id");
    assert!(id.src_flags.primary_patient_id);
    assert!(id.src_flags.defines_primary_patient_ids);
    assert!(!id.omit);
    assert_eq!(id.dest_field, "rid");
    assert_eq!(id.dest_datatype, SQLTYPE_PSEUDONYM);
    assert_eq!(id.index_kind, Some(IndexKind::Normal));

    // nhsnum: master identifier, kept pseudonymized
    let nhsnum = row("nhsnum");
    assert!(nhsnum.src_flags.master_patient_id);
    assert!(!nhsnum.omit);
    assert_eq!(nhsnum.dest_field, "nhshash");
    assert_eq!(nhsnum.dest_datatype, SQLTYPE_PSEUDONYM);

    // name: patient scrub vocabulary; omitted from the output by default
    // (scrub sources never default into the destination)
    let name = row("name");
    assert_eq!(name.scrub_source, Some(ScrubSource::Patient));
    assert_eq!(name.scrub_method, Some(ScrubMethod::Text));
    assert!(name.omit);
    assert_eq!(name.alter_method, None);

    // dob: scrubbed as a date, truncated if ever included
    let dob = row("dob");
    assert_eq!(dob.scrub_source, Some(ScrubSource::Patient));
    assert_eq!(dob.scrub_method, Some(ScrubMethod::Date));
    assert!(dob.omit);
    assert_eq!(dob.alter_method, Some(AlterMethod::TruncateDate));
}

#[test]
fn derived_draft_passes_collective_validation() {
    let config = config();
    let schema = patients_schema();
    let engine = Engine::initialise(config, Some(&schema)).unwrap();
    assert_eq!(engine.dictionary().len(), 4);
}

#[test]
fn derived_draft_roundtrips_through_tsv() {
    let config = config();
    let schema = patients_schema();
    let draft = Engine::draft_dictionary(&config, &schema).unwrap();
    let text = draft.to_tsv().unwrap();
    let reloaded = Dictionary::load_str(&text, &config).unwrap();
    assert_eq!(reloaded.to_tsv().unwrap(), text);
}

#[test]
fn tables_without_patient_columns_are_never_scrubbed() {
    let mut config = config();
    // include everything so free text would otherwise be scrubbed in
    config
        .sources
        .get_mut("registry")
        .unwrap()
        .profile
        .default_include = true;
    let mut schema = patients_schema();
    schema.add_table(
        "registry",
        "wards",
        &[("ward_code", "VARCHAR(10)"), ("description", "TEXT")],
    );
    let mut dd = Dictionary::new();
    dd.extend_from_schema(&config, &schema).unwrap();

    for row in dd.rows().iter().filter(|r| r.src_table == "wards") {
        assert_ne!(
            row.alter_method,
            Some(AlterMethod::ScrubIn),
            "{} must not be scrubbed: wards has no patient columns",
            row.src_field
        );
    }
}

#[test]
fn blacklisted_tables_and_fields_are_skipped() {
    let mut config = config();
    {
        let profile = &mut config.sources.get_mut("registry").unwrap().profile;
        profile.table_blacklist.push("audit_log".to_string());
        profile.field_blacklist.push("legacy_notes".to_string());
    }
    let mut schema = patients_schema();
    schema.add_table("registry", "audit_log", &[("id", "INT"), ("detail", "TEXT")]);
    schema.add_column(
        "registry",
        lethe::schema::SourceColumn::new("patients", "legacy_notes", "TEXT"),
    );

    let mut dd = Dictionary::new();
    dd.extend_from_schema(&config, &schema).unwrap();

    assert!(!dd.rows().iter().any(|r| r.src_table == "audit_log"));
    assert!(!dd.rows().iter().any(|r| r.src_field == "legacy_notes"));
}
