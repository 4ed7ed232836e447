use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use hashbrown::HashMap;

pub mod step;
pub mod steps;
pub mod strategy;
pub mod traversal;


/// The unit of flow through a traversal: a payload plus optional path history, a loop counter for
/// jump steps, and a bulk (multiplicity) count.
///
/// Traversers are immutable once emitted by a step; steps that transform a traverser produce a new
/// one via [`split`](Traverser::split) or the loop/bulk builders.
#[derive(Clone, Debug, PartialEq)]
pub struct Traverser {
    value: PropertyValue,
    path: Option<Vec<(Option<String>, PropertyValue)>>,
    loops: u32,
    bulk: u64,
}

impl Traverser {
    pub fn new(value: PropertyValue) -> Self {
        Self { value, path: None, loops: 0, bulk: 1 }
    }

    pub fn get(&self) -> &PropertyValue {
        &self.value
    }

    pub fn into_value(self) -> PropertyValue {
        self.value
    }

    /// Child traverser with a new head value, inheriting path, loop counter and bulk.
    pub fn split(&self, value: PropertyValue) -> Self {
        Self { value, path: self.path.clone(), loops: self.loops, bulk: self.bulk }
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn increment_loops(mut self) -> Self {
        self.loops += 1;
        self
    }

    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    pub fn with_bulk(mut self, bulk: u64) -> Self {
        self.bulk = bulk;
        self
    }

    /// Records the current head under `label` in the path history. Called by the traversal driver
    /// for path-extending steps when path tracking is enabled.
    pub(crate) fn record_path(&mut self, label: Option<String>) {
        self.path.get_or_insert_with(Vec::new).push((label, self.value.clone()));
    }

    pub fn path(&self) -> Option<&[(Option<String>, PropertyValue)]> {
        self.path.as_deref()
    }

    /// The ordered sequence of path values, without labels.
    pub fn path_values(&self) -> Vec<PropertyValue> {
        self.path
            .as_ref()
            .map(|path| path.iter().map(|(_, value)| value.clone()).collect())
            .unwrap_or_default()
    }
}

/// The side-effect store of one traversal: a string-keyed value map written by side-effecting
/// steps while the pipeline is pulled, and read back by cap steps or the caller once drained.
#[derive(Default, Debug)]
pub struct TraversalMemory {
    values: HashMap<String, PropertyValue>,
}

impl TraversalMemory {
    /// An unset key is reported as `None`, never conflated with a default value.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: PropertyValue) {
        self.values.insert(key.to_owned(), value);
    }

    /// Merging into a key holding a value of another type is a type mismatch, never a silent
    /// no-op.
    pub fn add_isize(&mut self, key: &str, delta: isize) -> Result<(), GfError> {
        let entry = self
            .values
            .entry(key.to_owned())
            .or_insert_with(|| PropertyValue::Isize(0));
        if let PropertyValue::Isize(current) = entry {
            *current += delta;
            Ok(())
        } else {
            Err(GfError::TypeMismatch("Isize", entry.value_type().to_owned()))
        }
    }

    /// Appends to the list stored under `key`, creating the list on first use.
    pub fn push_to_list(&mut self, key: &str, value: PropertyValue) -> Result<(), GfError> {
        let entry = self
            .values
            .entry(key.to_owned())
            .or_insert_with(|| PropertyValue::List(Vec::new()));
        if let PropertyValue::List(values) = entry {
            values.push(value);
            Ok(())
        } else {
            Err(GfError::TypeMismatch("List", entry.value_type().to_owned()))
        }
    }
}
