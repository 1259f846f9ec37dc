//! Purpose: Define the public Rust API boundary for csvmodel.
//! Exports: Model inference, table runtime, dynamic context and error types.
//! Role: Additive-only surface used by the CLI and integration tests.
//! Invariants: Everything a consumer needs is reachable from this module.

pub use crate::core::context::{Context, ContextOptions, ContextTable, DynRow};
pub use crate::core::delimited::{
    RowReader, detect_delimiter, is_valid_delimited_file, read_header_row, read_rows,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::files::{common_root, file_size_info, resolve_files};
pub use crate::core::ident::{is_valid_identifier, make_names_unique, sanitize};
pub use crate::core::infer::{ModelOptions, build_model, detect_relations, foreign_key_candidates};
pub use crate::core::intern::{Field, Interner};
pub use crate::core::model::{ColumnSchema, Database, Relation, TableId, TableSchema};
pub use crate::core::row::{ColumnBinding, RelationLink, RowMapper};
pub use crate::core::table::{Rows, Table, TableOptions};
