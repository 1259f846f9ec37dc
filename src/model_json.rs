//! Purpose: JSON and text renderings of the inferred model and of table rows.
//! Exports: `database_json`, `database_text`, `row_json`.
//! Role: Keep output envelopes consistent across `schema`, `rows` and `lookup`.
//! Invariants: Rows are keyed by column symbolic name; absent fields are `null`.
//! Invariants: Related rows are rendered one level deep, without their own relations.

use csvmodel::api::{Context, ContextTable, Database, DynRow, Error, Relation, TableSchema};
use serde_json::{Map, Value, json};

pub(crate) fn database_json(db: &Database) -> Value {
    let tables = db
        .tables
        .iter()
        .map(|table| table_json(db, table))
        .collect::<Vec<_>>();
    json!({
        "name": db.name,
        "tables": tables,
    })
}

fn table_json(db: &Database, table: &TableSchema) -> Value {
    let columns = table
        .columns
        .iter()
        .map(|column| {
            json!({
                "name": column.code_name,
                "display_name": column.display_name,
                "header": column.header,
                "index": column.index,
            })
        })
        .collect::<Vec<_>>();
    let relations = table
        .relations
        .iter()
        .map(|relation| relation_json(db, table, relation))
        .collect::<Vec<_>>();

    let mut map = Map::new();
    map.insert("name".to_string(), json!(table.code_name));
    map.insert("display_name".to_string(), json!(table.display_name));
    map.insert("path".to_string(), json!(table.file_path.display().to_string()));
    map.insert(
        "delimiter".to_string(),
        json!(char::from(table.delimiter).to_string()),
    );
    map.insert("columns".to_string(), Value::Array(columns));
    map.insert("relations".to_string(), Value::Array(relations));
    Value::Object(map)
}

fn relation_json(db: &Database, table: &TableSchema, relation: &Relation) -> Value {
    let target = db.tables.get(relation.target_table);
    json!({
        "name": relation.code_name,
        "display_name": relation.display_name,
        "column": column_name(table, relation.source_column),
        "target_table": target.map(|target| target.code_name.as_str()),
        "target_column": target.and_then(|target| column_name(target, relation.target_column)),
    })
}

fn column_name(table: &TableSchema, index: usize) -> Option<&str> {
    table
        .columns
        .get(index)
        .map(|column| column.code_name.as_str())
}

pub(crate) fn database_text(db: &Database) -> String {
    let mut lines = Vec::new();
    lines.push(format!("database: {}", db.name));
    for table in &db.tables {
        lines.push(String::new());
        lines.push(format!("table {}", table.display_name));
        for column in &table.columns {
            lines.push(format!("  {}", column.display_name));
        }
        for relation in &table.relations {
            lines.push(format!("  -> {}", relation.display_name));
        }
    }
    lines.join("\n")
}

pub(crate) fn row_json(
    context: &Context,
    table: &ContextTable,
    row: &DynRow,
    with_relations: bool,
) -> Result<Value, Error> {
    let mut map = fields_json(table.schema(), row);
    if with_relations {
        let mut relations = Map::new();
        for (relation, link) in table.schema().relations.iter().zip(row.links()) {
            let target = context.table_by_id(relation.target_table);
            let related = link
                .rows()?
                .iter()
                .map(|related| match target {
                    Some(target) => Value::Object(fields_json(target.schema(), related)),
                    None => Value::Null,
                })
                .collect::<Vec<_>>();
            relations.insert(link.name().to_string(), Value::Array(related));
        }
        map.insert("relations".to_string(), Value::Object(relations));
    }
    Ok(Value::Object(map))
}

fn fields_json(schema: &TableSchema, row: &DynRow) -> Map<String, Value> {
    schema
        .columns
        .iter()
        .map(|column| (column.code_name.clone(), json!(row.get(column.index))))
        .collect()
}
