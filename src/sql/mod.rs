//! Identifier and SQL-type validators.
//!
//! Stateless predicates used by rule validation and rule derivation. They
//! classify raw type strings as they appear in `information_schema` output;
//! no connection to a live database is involved.

pub mod idents;
pub mod types;

pub use idents::{is_valid_field_name, is_valid_table_name};
pub use types::{
    is_sqltype_date, is_sqltype_integer, is_sqltype_numeric, is_sqltype_text_over_one_char,
    is_sqltype_valid, sqltype_merits_fulltext_index, sqltype_requires_index_len,
};
