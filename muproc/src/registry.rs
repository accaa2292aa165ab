use std::collections::BTreeMap;

use serde::Serialize;

use mucore::data::dataset::MuonDataset;
use mucore::data::period::PeriodSet;
use mucore::error::{Error, Result};

/// A value published under a name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RegistryEntry {
    Dataset(MuonDataset),
    Periods(PeriodSet),
}

/// Named-object store the pipeline publishes into.
///
/// The pipeline only ever calls `put` with `overwrite = true` and never
/// deletes; the flag makes replacing an existing entry an explicit decision
/// at the call site instead of something inferred from name equality.
pub trait Registry {
    fn get(&self, name: &str) -> Option<&RegistryEntry>;
    fn put(&mut self, name: &str, value: RegistryEntry, overwrite: bool) -> Result<()>;
    fn exists(&self, name: &str) -> bool;
}

/// In-memory registry used by the CLI and by tests.
#[derive(Clone, Debug, Default, Serialize)]
pub struct InMemoryRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        InMemoryRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered names in lexical order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|name| name.as_str()).collect()
    }
}

impl Registry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    fn put(&mut self, name: &str, value: RegistryEntry, overwrite: bool) -> Result<()> {
        if !overwrite && self.entries.contains_key(name) {
            return Err(Error::Validation(format!("name '{}' is already registered", name)));
        }
        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
