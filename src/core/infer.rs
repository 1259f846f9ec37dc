// Schema and relation inference over a set of delimited files.
// Steps: resolve files, read headers, detect relations, uniquify names, finalize display names.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::core::delimited::{detect_delimiter, is_valid_delimited_file, read_header_row};
use crate::core::error::Error;
use crate::core::files::{common_root, file_size_info, relative_dir, resolve_files};
use crate::core::ident::{make_names_unique, sanitize};
use crate::core::model::{ColumnSchema, Database, Relation, TableId, TableSchema, display_name};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelOptions {
    /// Fixed delimiter for every file; `None` detects it per file.
    pub delimiter: Option<u8>,
    pub ignore_invalid_files: bool,
    pub detect_relations: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            ignore_invalid_files: false,
            detect_relations: true,
        }
    }
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_ignore_invalid_files(mut self, ignore: bool) -> Self {
        self.ignore_invalid_files = ignore;
        self
    }

    pub fn with_detect_relations(mut self, detect: bool) -> Self {
        self.detect_relations = detect;
        self
    }
}

/// Builds the relational model for the given file entries (paths or glob patterns).
///
/// Missing files are skipped. With `ignore_invalid_files`, files whose
/// delimiter cannot be sampled or that fail the structural check are skipped
/// too; otherwise the first header that cannot be read fails the build.
pub fn build_model<S: AsRef<str>>(
    entries: &[S],
    options: &ModelOptions,
) -> Result<Database, Error> {
    let mut retained: Vec<(PathBuf, u8)> = Vec::new();
    for path in resolve_files(entries)? {
        if !path.is_file() {
            warn!(path = %path.display(), "skipping missing file");
            continue;
        }
        let delimiter = match options.delimiter {
            Some(delimiter) => delimiter,
            None => match detect_delimiter(&path) {
                Ok(delimiter) => delimiter,
                Err(err) if options.ignore_invalid_files => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    continue;
                }
                Err(err) => return Err(err),
            },
        };
        if options.ignore_invalid_files && !is_valid_delimited_file(&path, delimiter) {
            warn!(path = %path.display(), "skipping invalid delimited file");
            continue;
        }
        retained.push((path, delimiter));
    }

    let paths: Vec<PathBuf> = retained.iter().map(|(path, _)| path.clone()).collect();
    let root = common_root(&paths);

    let mut tables = Vec::with_capacity(retained.len());
    for (path, delimiter) in retained {
        let header = read_header_row(&path, delimiter)?;
        let table = table_schema(path, delimiter, &root, header);
        debug!(
            table = %table.code_name,
            columns = table.columns.len(),
            delimiter = %char::from(table.delimiter),
            "discovered table"
        );
        tables.push(table);
    }

    let mut db = Database {
        name: root.to_string_lossy().into_owned(),
        tables,
    };

    if options.detect_relations {
        detect_relations(&mut db.tables);
    }
    make_code_names_unique(&mut db)?;
    finalize_display_names(&mut db);

    info!(
        database = %db.name,
        tables = db.tables.len(),
        relations = db.relation_count(),
        "model built"
    );
    Ok(db)
}

fn table_schema(path: PathBuf, delimiter: u8, root: &Path, header: Vec<String>) -> TableSchema {
    let stem = file_stem(&path);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = relative_dir(&path, root);
    let in_dir = !dir.trim().is_empty();

    let code_name = if in_dir {
        sanitize(&format!("{stem}_{dir}"))
    } else {
        sanitize(&stem)
    };
    let mut descriptive = file_name;
    if in_dir {
        descriptive.push_str(" in ");
        descriptive.push_str(&dir);
    }
    let size = file_size_info(&path);
    if !size.is_empty() {
        descriptive.push(' ');
        descriptive.push_str(&size);
    }

    let columns = header
        .into_iter()
        .enumerate()
        .map(|(index, header)| ColumnSchema {
            code_name: sanitize(&header),
            display_name: String::new(),
            header,
            index,
        })
        .collect();

    TableSchema {
        file_path: path,
        delimiter,
        code_name,
        display_name: descriptive,
        columns,
        relations: Vec::new(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased column names that would reference a table built from `stem`.
///
/// `item` → `itemid`; `items` → `itemsid`, `itemid`; `fishes` → `fishesid`,
/// `fisheid`, `fishid`.
pub fn foreign_key_candidates(stem: &str) -> Vec<String> {
    if stem.trim().is_empty() {
        return Vec::new();
    }
    let stem = stem.to_lowercase();
    let mut names = vec![format!("{stem}id")];
    if let Some(singular) = stem.strip_suffix('s') {
        names.push(format!("{singular}id"));
    }
    if let Some(singular) = stem.strip_suffix("es") {
        names.push(format!("{singular}id"));
    }
    names
}

/// Naming-convention foreign keys, stored in both directions on their source tables.
///
/// `t1.c1 → t2.c2` when `c1` is `id` or one of `t1`'s candidate names and a
/// different table `t2` has a column `c2` named like one of those candidates.
/// The match is deliberately permissive and may yield several relations into
/// the same target.
pub fn detect_relations(tables: &mut [TableSchema]) {
    let mut id_columns: HashMap<String, Vec<(TableId, usize)>> = HashMap::new();
    for (table_id, table) in tables.iter().enumerate() {
        for column in &table.columns {
            let key = column.header.to_lowercase();
            if key.ends_with("id") {
                id_columns.entry(key).or_default().push((table_id, column.index));
            }
        }
    }

    let mut pairs: IndexSet<(TableId, usize, TableId, usize)> = IndexSet::new();
    for (t1, table) in tables.iter().enumerate() {
        let candidates = foreign_key_candidates(&file_stem(&table.file_path));
        for c1 in &table.columns {
            let header = c1.header.to_lowercase();
            if header != "id" && !candidates.contains(&header) {
                continue;
            }
            let targets = candidates
                .iter()
                .filter_map(|key| id_columns.get(key))
                .flatten();
            for &(t2, c2) in targets {
                if t2 == t1 {
                    continue;
                }
                pairs.insert((t1, c1.index, t2, c2));
                pairs.insert((t2, c2, t1, c1.index));
            }
        }
    }

    for (t1, c1, t2, c2) in pairs {
        let target = &tables[t2];
        let relation = Relation {
            code_name: target.code_name.clone(),
            display_name: format!(
                "{}=={}.{}",
                tables[t1].columns[c1].code_name, target.code_name, target.columns[c2].code_name
            ),
            source_table: t1,
            source_column: c1,
            target_table: t2,
            target_column: c2,
        };
        debug!(
            source = %tables[t1].code_name,
            relation = %relation.display_name,
            "detected relation"
        );
        tables[t1].relations.push(relation);
    }
}

fn make_code_names_unique(db: &mut Database) -> Result<(), Error> {
    make_names_unique(
        &mut db.tables,
        |table| table.code_name.as_str(),
        |table, name| table.code_name = name,
    )?;
    for table in &mut db.tables {
        make_names_unique(
            &mut table.columns,
            |column| column.code_name.as_str(),
            |column, name| column.code_name = name,
        )?;
        make_names_unique(
            &mut table.relations,
            |relation| relation.code_name.as_str(),
            |relation, name| relation.code_name = name,
        )?;
    }
    Ok(())
}

fn finalize_display_names(db: &mut Database) {
    for table in &mut db.tables {
        table.display_name = display_name(&table.code_name, &table.display_name);
        for column in &mut table.columns {
            column.display_name = display_name(&column.code_name, &column.display_name);
        }
        for relation in &mut table.relations {
            relation.display_name = display_name(&relation.code_name, &relation.display_name);
        }
    }
}
