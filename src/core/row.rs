// Positional row mapping with precomputed column bindings and an injected relation hook.
// Mapping never fails: missing trailing fields become `None`, extra raw fields are ignored.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::core::error::Error;
use crate::core::intern::Field;

pub type Setter<R> = Arc<dyn Fn(&mut R, Option<Field>) + Send + Sync>;
pub type RelationsInit<R> = Arc<dyn Fn(&mut R) + Send + Sync>;
pub type Resolver<R> = Box<dyn Fn() -> Result<Vec<Arc<R>>, Error> + Send + Sync>;

/// One `position → setter` pair, resolved once per table.
pub struct ColumnBinding<R> {
    index: usize,
    name: String,
    set: Setter<R>,
}

impl<R> ColumnBinding<R> {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        set: impl Fn(&mut R, Option<Field>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            set: Arc::new(set),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<R> Clone for ColumnBinding<R> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            name: self.name.clone(),
            set: Arc::clone(&self.set),
        }
    }
}

impl<R> fmt::Debug for ColumnBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBinding")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}

pub struct RowMapper<R> {
    bindings: Arc<[ColumnBinding<R>]>,
    relations_init: RelationsInit<R>,
}

impl<R: Default> RowMapper<R> {
    pub fn new(
        bindings: Vec<ColumnBinding<R>>,
        relations_init: impl Fn(&mut R) + Send + Sync + 'static,
    ) -> Self {
        Self {
            bindings: bindings.into(),
            relations_init: Arc::new(relations_init),
        }
    }

    pub fn without_relations(bindings: Vec<ColumnBinding<R>>) -> Self {
        Self::new(bindings, |_| {})
    }

    pub fn bindings(&self) -> &[ColumnBinding<R>] {
        &self.bindings
    }

    pub fn map_row(&self, raw: &[Field]) -> R {
        let mut row = R::default();
        for binding in self.bindings.iter() {
            (binding.set)(&mut row, raw.get(binding.index).cloned());
        }
        (self.relations_init)(&mut row);
        row
    }
}

impl<R> Clone for RowMapper<R> {
    fn clone(&self) -> Self {
        Self {
            bindings: Arc::clone(&self.bindings),
            relations_init: Arc::clone(&self.relations_init),
        }
    }
}

impl<R> fmt::Debug for RowMapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMapper")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Related rows reachable from one row, resolved on first access.
///
/// Resolved rows are held weakly so links between cached rows never form
/// `Arc` cycles; the link resolves again once any of them has been dropped.
pub struct RelationLink<R> {
    name: String,
    resolve: Resolver<R>,
    resolved: Mutex<Option<Vec<Weak<R>>>>,
}

impl<R> RelationLink<R> {
    pub fn new(
        name: impl Into<String>,
        resolve: impl Fn() -> Result<Vec<Arc<R>>, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            resolve: Box::new(resolve),
            resolved: Mutex::new(None),
        }
    }

    /// A link with nothing behind it, e.g. when the source field is absent.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolve: Box::new(|| Ok(Vec::new())),
            resolved: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resolved(&self) -> bool {
        self.live().is_some()
    }

    pub fn rows(&self) -> Result<Vec<Arc<R>>, Error> {
        if let Some(rows) = self.live() {
            return Ok(rows);
        }
        let rows = (self.resolve)()?;
        *self.lock() = Some(rows.iter().map(Arc::downgrade).collect());
        Ok(rows)
    }

    fn live(&self) -> Option<Vec<Arc<R>>> {
        self.lock().as_ref()?.iter().map(Weak::upgrade).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<Weak<R>>>> {
        // Weak handles stay valid even if a holder panicked.
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R> fmt::Debug for RelationLink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationLink")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnBinding, RelationLink, RowMapper};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::intern::Field;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Item {
        id: Option<Field>,
        name: Option<Field>,
        note: Option<Field>,
        initialized: bool,
    }

    fn item_mapper() -> RowMapper<Item> {
        RowMapper::new(
            vec![
                ColumnBinding::new(0, "id", |row: &mut Item, value| row.id = value),
                ColumnBinding::new(1, "name", |row: &mut Item, value| row.name = value),
                ColumnBinding::new(2, "note", |row: &mut Item, value| row.note = value),
            ],
            |row: &mut Item| row.initialized = true,
        )
    }

    fn raw(values: &[&str]) -> Vec<Field> {
        values.iter().map(|value| Field::from(*value)).collect()
    }

    #[test]
    fn assigns_fields_by_position_and_runs_hook() {
        let row = item_mapper().map_row(&raw(&["1", "apple", "red"]));
        assert_eq!(row.id.as_deref(), Some("1"));
        assert_eq!(row.name.as_deref(), Some("apple"));
        assert_eq!(row.note.as_deref(), Some("red"));
        assert!(row.initialized);
    }

    #[test]
    fn short_rows_leave_missing_fields_empty() {
        let row = item_mapper().map_row(&raw(&["7"]));
        assert_eq!(row.id.as_deref(), Some("7"));
        assert!(row.name.is_none());
        assert!(row.note.is_none());
        assert!(row.initialized);

        let row = item_mapper().map_row(&[]);
        assert!(row.id.is_none());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let row = item_mapper().map_row(&raw(&["1", "a", "b", "c", "d"]));
        assert_eq!(row.note.as_deref(), Some("b"));
    }

    #[test]
    fn bindings_need_not_be_contiguous() {
        let mapper = RowMapper::without_relations(vec![ColumnBinding::new(
            3,
            "note",
            |row: &mut Item, value| row.note = value,
        )]);
        let row = mapper.map_row(&raw(&["a", "b", "c", "d"]));
        assert_eq!(row.note.as_deref(), Some("d"));
        assert!(row.id.is_none());
        assert!(!row.initialized);
    }

    #[test]
    fn link_resolves_once_while_targets_live() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let target = Arc::new(Item::default());
        let held = Arc::clone(&target);
        let link: RelationLink<Item> = RelationLink::new("items", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Arc::clone(&held)])
        });

        assert!(!link.is_resolved());
        assert_eq!(link.rows().expect("rows").len(), 1);
        assert!(Arc::ptr_eq(&link.rows().expect("rows")[0], &target));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(link.is_resolved());
    }

    #[test]
    fn link_does_not_keep_targets_alive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let link: RelationLink<Item> = RelationLink::new("items", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Arc::new(Item::default())])
        });

        let rows = link.rows().expect("rows");
        let weak = Arc::downgrade(&rows[0]);
        assert!(link.is_resolved());
        drop(rows);
        assert!(weak.upgrade().is_none());
        assert!(!link.is_resolved());

        assert_eq!(link.rows().expect("rows").len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn link_errors_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let link: RelationLink<Item> = RelationLink::new("items", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::new(ErrorKind::Io).with_message("gone"))
        });
        assert!(link.rows().is_err());
        assert!(link.rows().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let empty = RelationLink::<Item>::empty("none");
        assert!(empty.is_resolved());
        assert!(empty.rows().expect("rows").is_empty());
    }
}
