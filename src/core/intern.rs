// Shared string pool so equal field values across rows and columns share one allocation.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A field value as handed to row mappers and index builders.
pub type Field = Arc<str>;

#[derive(Clone, Debug, Default)]
pub struct Interner {
    pool: Arc<Mutex<HashSet<Field>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, value: &str) -> Field {
        // A poisoned pool still holds valid entries.
        let mut pool = self
            .pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = pool.get(value) {
            return Arc::clone(existing);
        }
        let field: Field = Arc::from(value);
        pool.insert(Arc::clone(&field));
        field
    }

    pub fn len(&self) -> usize {
        self.pool
            .lock()
            .map(|pool| pool.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
