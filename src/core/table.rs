// Table runtime over one delimited file: streamed or cached row sequences
// plus equality lookups over a single extracted field.
// Caching tables materialize rows once; first-time materialization and index
// builds are serialized, completed caches are read without exclusive locks.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::debug;

use crate::core::delimited::{RowReader, read_rows};
use crate::core::error::Error;
use crate::core::intern::{Field, Interner};
use crate::core::row::RowMapper;

#[derive(Clone, Debug, Default)]
pub struct TableOptions {
    /// Materialize rows on first enumeration and keep lookup indexes.
    pub cache: bool,
    /// Draw field values from a shared string pool.
    pub interner: Option<Interner>,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_interner(mut self, interner: Option<Interner>) -> Self {
        self.interner = interner;
        self
    }
}

type Index = HashMap<Field, Vec<usize>>;

struct Cache<R> {
    rows: OnceLock<Arc<[Arc<R>]>>,
    build: Mutex<()>,
    indexes: RwLock<HashMap<String, Arc<Index>>>,
}

impl<R> Cache<R> {
    fn new() -> Self {
        Self {
            rows: OnceLock::new(),
            build: Mutex::new(()),
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

enum Storage<R> {
    Streaming,
    Caching(Cache<R>),
}

pub struct Table<R> {
    path: PathBuf,
    delimiter: u8,
    mapper: RowMapper<R>,
    interner: Option<Interner>,
    storage: Storage<R>,
}

impl<R: Default> Table<R> {
    /// The file is not opened here; a missing file surfaces on first enumeration.
    pub fn new(
        delimiter: u8,
        path: impl Into<PathBuf>,
        mapper: RowMapper<R>,
        options: TableOptions,
    ) -> Self {
        let storage = if options.cache {
            Storage::Caching(Cache::new())
        } else {
            Storage::Streaming
        };
        Self {
            path: path.into(),
            delimiter,
            mapper,
            interner: options.interner,
            storage,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.storage, Storage::Caching(_))
    }

    pub fn is_materialized(&self) -> bool {
        match &self.storage {
            Storage::Streaming => false,
            Storage::Caching(cache) => cache.rows.get().is_some(),
        }
    }

    /// Rows in file order. Each call starts a fresh sequence.
    pub fn enumerate(&self) -> Result<Rows<R>, Error> {
        match &self.storage {
            Storage::Streaming => Ok(Rows {
                inner: RowsInner::Streamed {
                    reader: self.read()?,
                    mapper: self.mapper.clone(),
                },
            }),
            Storage::Caching(cache) => Ok(Rows {
                inner: RowsInner::Cached {
                    rows: self.materialize(cache)?,
                    next: 0,
                },
            }),
        }
    }

    /// Rows whose extracted field equals any of `values`, in file order.
    ///
    /// `field_key` names the index a caching table keeps for `extract`; it is
    /// never compared against data. Rows with an absent field never match.
    pub fn where_indexed<F>(
        &self,
        extract: F,
        field_key: &str,
        values: &[&str],
    ) -> Result<Vec<Arc<R>>, Error>
    where
        F: Fn(&R) -> Option<&str>,
    {
        let wanted: HashSet<&str> = values.iter().copied().collect();
        match &self.storage {
            Storage::Streaming => {
                let mut matched = Vec::new();
                for row in self.enumerate()? {
                    let row = row?;
                    if extract(&*row).is_some_and(|value| wanted.contains(value)) {
                        matched.push(row);
                    }
                }
                Ok(matched)
            }
            Storage::Caching(cache) => {
                let rows = self.materialize(cache)?;
                let index = self.index(cache, &rows, &extract, field_key);
                let mut positions: Vec<usize> = wanted
                    .iter()
                    .filter_map(|value| index.get(*value))
                    .flatten()
                    .copied()
                    .collect();
                positions.sort_unstable();
                Ok(positions
                    .into_iter()
                    .map(|position| Arc::clone(&rows[position]))
                    .collect())
            }
        }
    }

    fn read(&self) -> Result<RowReader, Error> {
        read_rows(&self.path, self.delimiter, self.interner.as_ref())
    }

    fn materialize(&self, cache: &Cache<R>) -> Result<Arc<[Arc<R>]>, Error> {
        if let Some(rows) = cache.rows.get() {
            return Ok(Arc::clone(rows));
        }
        // A panicked builder never set the rows, so the guard is still usable.
        let _guard = cache
            .build
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(rows) = cache.rows.get() {
            return Ok(Arc::clone(rows));
        }

        let mut rows = Vec::new();
        for raw in self.read()? {
            rows.push(Arc::new(self.mapper.map_row(&raw?)));
        }
        debug!(path = %self.path.display(), rows = rows.len(), "materialized table");
        let rows: Arc<[Arc<R>]> = rows.into();
        Ok(Arc::clone(cache.rows.get_or_init(|| rows)))
    }

    fn index<F>(
        &self,
        cache: &Cache<R>,
        rows: &[Arc<R>],
        extract: &F,
        field_key: &str,
    ) -> Arc<Index>
    where
        F: Fn(&R) -> Option<&str>,
    {
        {
            let indexes = cache
                .indexes
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(index) = indexes.get(field_key) {
                return Arc::clone(index);
            }
        }

        let mut indexes = cache
            .indexes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(index) = indexes.get(field_key) {
            return Arc::clone(index);
        }

        let mut index = Index::new();
        for (position, row) in rows.iter().enumerate() {
            if let Some(value) = extract(&**row) {
                index.entry(self.key(value)).or_default().push(position);
            }
        }
        debug!(
            path = %self.path.display(),
            field = field_key,
            keys = index.len(),
            "built lookup index"
        );
        let index = Arc::new(index);
        indexes.insert(field_key.to_string(), Arc::clone(&index));
        index
    }

    fn key(&self, value: &str) -> Field {
        match &self.interner {
            Some(interner) => interner.intern(value),
            None => Field::from(value),
        }
    }
}

impl<R> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("delimiter", &char::from(self.delimiter))
            .field("cached", &matches!(self.storage, Storage::Caching(_)))
            .field("interned", &self.interner.is_some())
            .finish()
    }
}

/// A restartable-by-call sequence of rows produced by `Table::enumerate`.
pub struct Rows<R> {
    inner: RowsInner<R>,
}

enum RowsInner<R> {
    Streamed {
        reader: RowReader,
        mapper: RowMapper<R>,
    },
    Cached {
        rows: Arc<[Arc<R>]>,
        next: usize,
    },
}

impl<R> fmt::Debug for Rows<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            RowsInner::Streamed { reader, .. } => {
                f.debug_struct("Rows").field("reader", reader).finish()
            }
            RowsInner::Cached { rows, next } => f
                .debug_struct("Rows")
                .field("cached", &rows.len())
                .field("next", next)
                .finish(),
        }
    }
}

impl<R: Default> Iterator for Rows<R> {
    type Item = Result<Arc<R>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowsInner::Streamed { reader, mapper } => Some(
                reader
                    .next()?
                    .map(|raw| Arc::new(mapper.map_row(&raw))),
            ),
            RowsInner::Cached { rows, next } => {
                let row = rows.get(*next)?;
                *next += 1;
                Some(Ok(Arc::clone(row)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            RowsInner::Streamed { .. } => (0, None),
            RowsInner::Cached { rows, next } => {
                let remaining = rows.len() - *next;
                (remaining, Some(remaining))
            }
        }
    }
}
