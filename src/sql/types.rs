//! SQL type classification
//!
//! Pure predicates over raw SQL type strings as they come back from schema
//! introspection (`VARCHAR(50)`, `INT`, `DATETIME`, `DECIMAL(10,2)`...).
//! Total and side-effect-free: anything unrecognized simply classifies as
//! false. Tolerant across the MySQL/SQL Server dialect pair the source
//! systems use.

use regex::Regex;
use std::sync::LazyLock;

/// `BASE` or `BASE(n)` or `BASE(n,m)`, where BASE may contain a space
/// (`DOUBLE PRECISION`, `INT UNSIGNED`).
static SQLTYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z ]*[A-Z]|[A-Z])(?:\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?$")
        .expect("hardcoded regex")
});

const INTEGER_BASES: &[&str] = &[
    "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT",
];

const DECIMAL_BASES: &[&str] = &[
    "FLOAT",
    "DOUBLE",
    "DOUBLE PRECISION",
    "REAL",
    "DECIMAL",
    "DEC",
    "NUMERIC",
];

const DATE_BASES: &[&str] = &["DATE", "DATETIME", "TIMESTAMP", "TIME"];

/// Character types that carry an explicit length qualifier.
const SIZED_TEXT_BASES: &[&str] = &[
    "CHAR",
    "NCHAR",
    "VARCHAR",
    "NVARCHAR",
    "CHARACTER",
    "CHARACTER VARYING",
];

/// Character large-object types with no length qualifier.
const UNBOUNDED_TEXT_BASES: &[&str] = &[
    "TINYTEXT",
    "TEXT",
    "MEDIUMTEXT",
    "LONGTEXT",
    "NTEXT",
    "CLOB",
];

const BLOB_BASES: &[&str] = &["TINYBLOB", "BLOB", "MEDIUMBLOB", "LONGBLOB"];

const BINARY_BASES: &[&str] = &["BINARY", "VARBINARY"];

const BOOLEAN_BASES: &[&str] = &["BIT", "BOOL", "BOOLEAN"];

/// Parsed form of a type string: uppercased base keyword plus optional
/// numeric qualifiers. `INT UNSIGNED` normalizes to base `INT`.
fn parse(datatype: &str) -> Option<(String, Option<u64>, Option<u64>)> {
    let upper = datatype.trim().to_uppercase();
    let caps = SQLTYPE_RE.captures(&upper)?;
    let mut base = caps[1].trim().to_string();
    if let Some(stripped) = base.strip_suffix(" UNSIGNED") {
        base = stripped.to_string();
    }
    let n = caps.get(2).and_then(|m| m.as_str().parse().ok());
    let m = caps.get(3).and_then(|m| m.as_str().parse().ok());
    Some((base, n, m))
}

/// Is this a SQL type string we know how to handle at all?
pub fn is_sqltype_valid(datatype: &str) -> bool {
    let Some((base, n, _)) = parse(datatype) else {
        return false;
    };
    // VARCHAR and friends are meaningless without a length
    if matches!(base.as_str(), "VARCHAR" | "NVARCHAR" | "VARBINARY") && n.is_none() {
        return false;
    }
    INTEGER_BASES.contains(&base.as_str())
        || DECIMAL_BASES.contains(&base.as_str())
        || DATE_BASES.contains(&base.as_str())
        || SIZED_TEXT_BASES.contains(&base.as_str())
        || UNBOUNDED_TEXT_BASES.contains(&base.as_str())
        || BLOB_BASES.contains(&base.as_str())
        || BINARY_BASES.contains(&base.as_str())
        || BOOLEAN_BASES.contains(&base.as_str())
}

/// Integer type (any width, signed or unsigned)?
pub fn is_sqltype_integer(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, _, _)| INTEGER_BASES.contains(&base.as_str()))
}

/// Numeric type (integer or exact/approximate decimal)?
pub fn is_sqltype_numeric(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, _, _)| {
        INTEGER_BASES.contains(&base.as_str()) || DECIMAL_BASES.contains(&base.as_str())
    })
}

/// Date or date/time type?
pub fn is_sqltype_date(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, _, _)| DATE_BASES.contains(&base.as_str()))
}

/// Text type able to hold more than one character? This is the gate for
/// scrub-in alteration: single-character codes carry no free text.
pub fn is_sqltype_text_over_one_char(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, n, _)| {
        if UNBOUNDED_TEXT_BASES.contains(&base.as_str()) {
            return true;
        }
        if SIZED_TEXT_BASES.contains(&base.as_str()) {
            // CHAR with no qualifier defaults to length 1
            return n.unwrap_or(1) > 1;
        }
        false
    })
}

/// Does an ordinary (non-fulltext) index on this type need an explicit
/// prefix length? True for the unbounded TEXT/BLOB families, which MySQL
/// refuses to index in full.
pub fn sqltype_requires_index_len(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, _, _)| {
        UNBOUNDED_TEXT_BASES.contains(&base.as_str()) || BLOB_BASES.contains(&base.as_str())
    })
}

/// Is this type long-form text worth a FULLTEXT index?
pub fn sqltype_merits_fulltext_index(datatype: &str) -> bool {
    parse(datatype).is_some_and(|(base, _, _)| {
        matches!(base.as_str(), "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "NTEXT" | "CLOB")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("INT", true)]
    #[test_case("int", true; "lowercase tolerated")]
    #[test_case("INT UNSIGNED", true)]
    #[test_case("BIGINT", true)]
    #[test_case("VARCHAR(50)", true)]
    #[test_case("VARCHAR", false; "varchar needs a length")]
    #[test_case("DECIMAL(10,2)", true)]
    #[test_case("DOUBLE PRECISION", true)]
    #[test_case("LONGTEXT", true)]
    #[test_case("DATETIME", true)]
    #[test_case("GEOMETRY", false; "unknown base")]
    #[test_case("", false)]
    #[test_case("VARCHAR(abc)", false)]
    fn test_is_sqltype_valid(datatype: &str, expected: bool) {
        assert_eq!(is_sqltype_valid(datatype), expected);
    }

    #[test_case("INT", true)]
    #[test_case("TINYINT", true)]
    #[test_case("INT UNSIGNED", true)]
    #[test_case("FLOAT", false)]
    #[test_case("VARCHAR(10)", false)]
    fn test_is_sqltype_integer(datatype: &str, expected: bool) {
        assert_eq!(is_sqltype_integer(datatype), expected);
    }

    #[test_case("INT", true)]
    #[test_case("DECIMAL(8,3)", true)]
    #[test_case("DOUBLE", true)]
    #[test_case("DATE", false)]
    #[test_case("TEXT", false)]
    fn test_is_sqltype_numeric(datatype: &str, expected: bool) {
        assert_eq!(is_sqltype_numeric(datatype), expected);
    }

    #[test_case("DATE", true)]
    #[test_case("DATETIME", true)]
    #[test_case("TIMESTAMP", true)]
    #[test_case("VARCHAR(10)", false)]
    fn test_is_sqltype_date(datatype: &str, expected: bool) {
        assert_eq!(is_sqltype_date(datatype), expected);
    }

    #[test_case("VARCHAR(100)", true)]
    #[test_case("CHAR(2)", true)]
    #[test_case("CHAR(1)", false; "single char is not free text")]
    #[test_case("CHAR", false; "bare char defaults to one")]
    #[test_case("TEXT", true)]
    #[test_case("LONGTEXT", true)]
    #[test_case("INT", false)]
    fn test_is_sqltype_text_over_one_char(datatype: &str, expected: bool) {
        assert_eq!(is_sqltype_text_over_one_char(datatype), expected);
    }

    #[test_case("TEXT", true)]
    #[test_case("LONGBLOB", true)]
    #[test_case("VARCHAR(200)", false; "sized types index in full")]
    #[test_case("INT", false)]
    fn test_sqltype_requires_index_len(datatype: &str, expected: bool) {
        assert_eq!(sqltype_requires_index_len(datatype), expected);
    }

    #[test_case("TEXT", true)]
    #[test_case("LONGTEXT", true)]
    #[test_case("TINYTEXT", false; "too short to be worth it")]
    #[test_case("VARCHAR(4000)", false)]
    #[test_case("BLOB", false)]
    fn test_sqltype_merits_fulltext_index(datatype: &str, expected: bool) {
        assert_eq!(sqltype_merits_fulltext_index(datatype), expected);
    }
}
