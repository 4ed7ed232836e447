use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Global, computation-wide state shared by every vertex execution, the terminate check and the
/// MapReduce stage. Values are always current; they are not versioned by superstep.
///
/// Concurrent-write contract: [`set`](SideEffects::set) is last-write-wins and is intended for
/// the orchestrator and terminate paths. Vertices accumulating concurrently within one superstep
/// must use the merge operations (`add_isize`, `add_double`, `and_bool`, `push_to_list`), which
/// read-modify-write atomically under the map lock. Merging into a key holding a value of a
/// different type is a type mismatch error, never a silent no-op.
#[derive(Default, Debug)]
pub struct SideEffects {
    values: Mutex<HashMap<String, PropertyValue>>,
    iteration: AtomicU64,
}

impl SideEffects {
    /// An unset key is `None`, never a default value.
    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        self.values.lock().expect("SideEffects lock poisoned").get(key).cloned()
    }

    pub fn set(&self, key: &str, value: PropertyValue) {
        self.values.lock().expect("SideEffects lock poisoned").insert(key.to_owned(), value);
    }

    pub fn remove(&self, key: &str) -> Option<PropertyValue> {
        self.values.lock().expect("SideEffects lock poisoned").remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.lock().expect("SideEffects lock poisoned").keys().cloned().collect()
    }

    pub fn add_isize(&self, key: &str, delta: isize) -> Result<(), GfError> {
        let mut values = self.values.lock().expect("SideEffects lock poisoned");
        let entry =
            values.entry(key.to_owned()).or_insert_with(|| PropertyValue::Isize(0));
        if let PropertyValue::Isize(current) = entry {
            *current += delta;
            Ok(())
        } else {
            Err(GfError::TypeMismatch("Isize", entry.value_type().to_owned()))
        }
    }

    pub fn add_double(&self, key: &str, delta: f64) -> Result<(), GfError> {
        let mut values = self.values.lock().expect("SideEffects lock poisoned");
        let entry =
            values.entry(key.to_owned()).or_insert_with(|| PropertyValue::Double(0.0));
        if let PropertyValue::Double(current) = entry {
            *current += delta;
            Ok(())
        } else {
            Err(GfError::TypeMismatch("Double", entry.value_type().to_owned()))
        }
    }

    pub fn and_bool(&self, key: &str, value: bool) -> Result<(), GfError> {
        let mut values = self.values.lock().expect("SideEffects lock poisoned");
        let entry =
            values.entry(key.to_owned()).or_insert_with(|| PropertyValue::Bool(true));
        if let PropertyValue::Bool(current) = entry {
            *current = *current && value;
            Ok(())
        } else {
            Err(GfError::TypeMismatch("Bool", entry.value_type().to_owned()))
        }
    }

    pub fn push_to_list(&self, key: &str, value: PropertyValue) -> Result<(), GfError> {
        let mut values = self.values.lock().expect("SideEffects lock poisoned");
        let entry =
            values.entry(key.to_owned()).or_insert_with(|| PropertyValue::List(Vec::new()));
        if let PropertyValue::List(list) = entry {
            list.push(value);
            Ok(())
        } else {
            Err(GfError::TypeMismatch("List", entry.value_type().to_owned()))
        }
    }

    /// The current superstep, maintained by the graph computer.
    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::SeqCst)
    }

    pub(crate) fn set_iteration(&self, iteration: u64) {
        self.iteration.store(iteration, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::SideEffects;
    use crate::graph::property_value::PropertyValue;

    #[test]
    fn absent_is_not_default() {
        let side_effects = SideEffects::default();
        assert_eq!(side_effects.get("missing"), None);
        side_effects.set("present", PropertyValue::Isize(0));
        assert_eq!(side_effects.get("present"), Some(PropertyValue::Isize(0)));
    }

    #[test]
    fn merge_operations() {
        let side_effects = SideEffects::default();
        side_effects.add_double("delta", 0.25).expect("Merge failed");
        side_effects.add_double("delta", 0.5).expect("Merge failed");
        assert_eq!(side_effects.get("delta"), Some(PropertyValue::Double(0.75)));
        side_effects.and_bool("halt", true).expect("Merge failed");
        side_effects.and_bool("halt", false).expect("Merge failed");
        assert_eq!(side_effects.get("halt"), Some(PropertyValue::Bool(false)));
        side_effects.push_to_list("names", PropertyValue::Isize(1)).expect("Merge failed");
        side_effects.push_to_list("names", PropertyValue::Isize(2)).expect("Merge failed");
        assert_eq!(
            side_effects.get("names"),
            Some(PropertyValue::List(vec![PropertyValue::Isize(1), PropertyValue::Isize(2)]))
        );
    }

    #[test]
    fn merging_into_a_mismatched_value_is_an_error() {
        let side_effects = SideEffects::default();
        side_effects.set("delta", PropertyValue::Bool(true));
        let error = side_effects.add_double("delta", 1.0).expect_err("Expected a type mismatch");
        assert!(error.to_string().contains("Double"));
        assert_eq!(side_effects.get("delta"), Some(PropertyValue::Bool(true)));
        let error = side_effects
            .push_to_list("delta", PropertyValue::Isize(1))
            .expect_err("Expected a type mismatch");
        assert!(error.to_string().contains("List"));
    }
}
