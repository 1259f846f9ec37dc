// Dynamic consumer of an inferred model: one table runtime per schema table over `DynRow`,
// with relation links resolved lazily through the target table's indexed lookups.
// Links hold a `Weak` handle to the context, so rows never keep the context alive.
use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::error::{Error, ErrorKind};
use crate::core::intern::{Field, Interner};
use crate::core::model::{Database, Relation, TableId, TableSchema};
use crate::core::row::{ColumnBinding, RelationLink, RowMapper};
use crate::core::table::{Rows, Table, TableOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextOptions {
    pub cache: bool,
    pub intern: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            cache: true,
            intern: true,
        }
    }
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_intern(mut self, intern: bool) -> Self {
        self.intern = intern;
        self
    }
}

/// A row whose shape is only known at runtime: one slot per schema column.
#[derive(Debug, Default)]
pub struct DynRow {
    values: Vec<Option<Field>>,
    links: Vec<RelationLink<DynRow>>,
}

impl DynRow {
    pub fn get(&self, column: usize) -> Option<&str> {
        self.values.get(column)?.as_deref()
    }

    pub fn values(&self) -> &[Option<Field>] {
        &self.values
    }

    /// One link per outgoing relation of the row's table, in relation order.
    pub fn links(&self) -> &[RelationLink<DynRow>] {
        &self.links
    }

    pub fn link(&self, relation: &str) -> Option<&RelationLink<DynRow>> {
        self.links.iter().find(|link| link.name() == relation)
    }
}

pub struct ContextTable {
    schema: TableSchema,
    runtime: Table<DynRow>,
}

impl ContextTable {
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn runtime(&self) -> &Table<DynRow> {
        &self.runtime
    }

    pub fn column_index(&self, code_name: &str) -> Option<usize> {
        self.schema.column(code_name).map(|column| column.index)
    }

    pub fn enumerate(&self) -> Result<Rows<DynRow>, Error> {
        self.runtime.enumerate()
    }

    pub fn lookup(&self, column: &str, values: &[&str]) -> Result<Vec<Arc<DynRow>>, Error> {
        let index = self.column_index(column).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!(
                    "column `{column}` not found in table `{}`",
                    self.schema.code_name
                ))
                .with_hint("Run `csvmodel schema` to list column names.")
        })?;
        self.lookup_at(index, values)
    }

    fn lookup_at(&self, index: usize, values: &[&str]) -> Result<Vec<Arc<DynRow>>, Error> {
        let field_key = self
            .schema
            .columns
            .get(index)
            .map(|column| column.code_name.as_str())
            .ok_or_else(|| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("column position {index} out of range"))
            })?;
        self.runtime
            .where_indexed(|row| row.get(index), field_key, values)
    }
}

impl fmt::Debug for ContextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTable")
            .field("code_name", &self.schema.code_name)
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[derive(Debug)]
pub struct Context {
    name: String,
    tables: Vec<ContextTable>,
}

impl Context {
    pub fn new(database: Database, options: ContextOptions) -> Arc<Self> {
        let interner = options.intern.then(Interner::new);
        Arc::new_cyclic(|context: &Weak<Context>| {
            let tables = database
                .tables
                .into_iter()
                .map(|schema| {
                    let mapper = dyn_mapper(&schema, context.clone());
                    let table_options = TableOptions::new()
                        .with_cache(options.cache)
                        .with_interner(interner.clone());
                    let runtime = Table::new(
                        schema.delimiter,
                        schema.file_path.clone(),
                        mapper,
                        table_options,
                    );
                    ContextTable { schema, runtime }
                })
                .collect();
            Context {
                name: database.name,
                tables,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[ContextTable] {
        &self.tables
    }

    pub fn table(&self, code_name: &str) -> Option<&ContextTable> {
        self.tables
            .iter()
            .find(|table| table.schema.code_name == code_name)
    }

    pub fn table_by_id(&self, id: TableId) -> Option<&ContextTable> {
        self.tables.get(id)
    }
}

fn dyn_mapper(schema: &TableSchema, context: Weak<Context>) -> RowMapper<DynRow> {
    let width = schema.columns.len();
    let bindings = schema
        .columns
        .iter()
        .map(|column| {
            let slot = column.index;
            ColumnBinding::new(slot, column.code_name.clone(), move |row: &mut DynRow, value| {
                if row.values.len() < width {
                    row.values.resize(width, None);
                }
                row.values[slot] = value;
            })
        })
        .collect();

    let relations = schema.relations.clone();
    RowMapper::new(bindings, move |row: &mut DynRow| {
        row.links = relations
            .iter()
            .map(|relation| relation_link(row, relation, &context))
            .collect();
    })
}

fn relation_link(
    row: &DynRow,
    relation: &Relation,
    context: &Weak<Context>,
) -> RelationLink<DynRow> {
    let Some(value) = row.values.get(relation.source_column).cloned().flatten() else {
        return RelationLink::empty(relation.code_name.clone());
    };

    let context = context.clone();
    let target_table = relation.target_table;
    let target_column = relation.target_column;
    RelationLink::new(relation.code_name.clone(), move || {
        let context = context.upgrade().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("data context was dropped")
        })?;
        let table = context.table_by_id(target_table).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("relation target table {target_table} not found"))
        })?;
        table.lookup_at(target_column, &[&*value])
    })
}
