// Inferred schema: database, tables, columns and directed relations.
// Tables are referenced by position in `Database::tables`, columns by position in their table.
use std::path::PathBuf;

use serde::Serialize;

/// Position of a table inside `Database::tables`.
pub type TableId = usize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Database {
    /// Common root directory of all source files.
    pub name: String,
    pub tables: Vec<TableSchema>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub file_path: PathBuf,
    #[serde(serialize_with = "serialize_delimiter")]
    pub delimiter: u8,
    pub code_name: String,
    pub display_name: String,
    pub columns: Vec<ColumnSchema>,
    pub relations: Vec<Relation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub code_name: String,
    pub display_name: String,
    /// Header text exactly as found in the file.
    pub header: String,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Relation {
    pub code_name: String,
    pub display_name: String,
    pub source_table: TableId,
    pub source_column: usize,
    pub target_table: TableId,
    pub target_column: usize,
}

impl Database {
    pub fn table(&self, code_name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.code_name == code_name)
    }

    pub fn table_id(&self, code_name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|table| table.code_name == code_name)
    }

    pub fn relation_count(&self) -> usize {
        self.tables.iter().map(|table| table.relations.len()).sum()
    }
}

impl TableSchema {
    pub fn column(&self, code_name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.code_name == code_name)
    }

    pub fn relation(&self, code_name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|relation| relation.code_name == code_name)
    }
}

/// `symbolic` alone, or `symbolic (descriptive)` when there is descriptive text.
pub fn display_name(code_name: &str, descriptive: &str) -> String {
    if descriptive.trim().is_empty() {
        code_name.to_string()
    } else {
        format!("{code_name} ({descriptive})")
    }
}

fn serialize_delimiter<S: serde::Serializer>(
    delimiter: &u8,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_char(char::from(*delimiter))
}
