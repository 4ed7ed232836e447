use crate::error::GfError;
use crate::graph::VertexId;
use itertools::Itertools;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Dynamically typed value flowing through the engine: element properties, traverser payloads,
/// vertex-program messages, compute-key state and side effects all use this one representation.
///
/// `Double` is compared and hashed through its bit pattern (`total_cmp`/`to_bits`) so values can
/// serve as grouping keys in the MapReduce shuffle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PropertyValue {
    Isize(isize),
    Double(f64),
    Bool(bool),
    String(String),
    Vertex(VertexId),
    List(Vec<PropertyValue>),
    Pair(Box<PropertyValue>, Box<PropertyValue>),
}

impl PropertyValue {
    pub fn pair(first: PropertyValue, second: PropertyValue) -> Self {
        PropertyValue::Pair(Box::new(first), Box::new(second))
    }

    pub fn value_type(&self) -> &'static str {
        match self {
            PropertyValue::Isize(_) => "Isize",
            PropertyValue::Double(_) => "Double",
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::String(_) => "String",
            PropertyValue::Vertex(_) => "Vertex",
            PropertyValue::List(_) => "List",
            PropertyValue::Pair(_, _) => "Pair",
        }
    }

    pub fn as_isize(&self) -> Result<isize, GfError> {
        if let PropertyValue::Isize(value) = self {
            Ok(*value)
        } else {
            Err(GfError::TypeMismatch("Isize", self.value_type().to_owned()))
        }
    }

    pub fn as_double(&self) -> Result<f64, GfError> {
        if let PropertyValue::Double(value) = self {
            Ok(*value)
        } else {
            Err(GfError::TypeMismatch("Double", self.value_type().to_owned()))
        }
    }

    pub fn as_bool(&self) -> Result<bool, GfError> {
        if let PropertyValue::Bool(value) = self {
            Ok(*value)
        } else {
            Err(GfError::TypeMismatch("Bool", self.value_type().to_owned()))
        }
    }

    pub fn as_str(&self) -> Result<&str, GfError> {
        if let PropertyValue::String(value) = self {
            Ok(value)
        } else {
            Err(GfError::TypeMismatch("String", self.value_type().to_owned()))
        }
    }

    pub fn as_vertex(&self) -> Result<VertexId, GfError> {
        if let PropertyValue::Vertex(id) = self {
            Ok(*id)
        } else {
            Err(GfError::TypeMismatch("Vertex", self.value_type().to_owned()))
        }
    }

    pub fn as_list(&self) -> Result<&[PropertyValue], GfError> {
        if let PropertyValue::List(values) = self {
            Ok(values)
        } else {
            Err(GfError::TypeMismatch("List", self.value_type().to_owned()))
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            PropertyValue::Isize(_) => 0,
            PropertyValue::Double(_) => 1,
            PropertyValue::Bool(_) => 2,
            PropertyValue::String(_) => 3,
            PropertyValue::Vertex(_) => 4,
            PropertyValue::List(_) => 5,
            PropertyValue::Pair(_, _) => 6,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::Isize(left), PropertyValue::Isize(right)) => left == right,
            (PropertyValue::Double(left), PropertyValue::Double(right)) => {
                left.to_bits() == right.to_bits()
            }
            (PropertyValue::Bool(left), PropertyValue::Bool(right)) => left == right,
            (PropertyValue::String(left), PropertyValue::String(right)) => left == right,
            (PropertyValue::Vertex(left), PropertyValue::Vertex(right)) => left == right,
            (PropertyValue::List(left), PropertyValue::List(right)) => left == right,
            (PropertyValue::Pair(l1, l2), PropertyValue::Pair(r1, r2)) => l1 == r1 && l2 == r2,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            PropertyValue::Isize(value) => value.hash(state),
            PropertyValue::Double(value) => value.to_bits().hash(state),
            PropertyValue::Bool(value) => value.hash(state),
            PropertyValue::String(value) => value.hash(state),
            PropertyValue::Vertex(id) => id.hash(state),
            PropertyValue::List(values) => values.hash(state),
            PropertyValue::Pair(first, second) => {
                first.hash(state);
                second.hash(state);
            }
        }
    }
}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PropertyValue::Isize(left), PropertyValue::Isize(right)) => left.cmp(right),
            (PropertyValue::Double(left), PropertyValue::Double(right)) => left.total_cmp(right),
            (PropertyValue::Bool(left), PropertyValue::Bool(right)) => left.cmp(right),
            (PropertyValue::String(left), PropertyValue::String(right)) => left.cmp(right),
            (PropertyValue::Vertex(left), PropertyValue::Vertex(right)) => left.cmp(right),
            (PropertyValue::List(left), PropertyValue::List(right)) => left.cmp(right),
            (PropertyValue::Pair(l1, l2), PropertyValue::Pair(r1, r2)) => {
                l1.cmp(r1).then_with(|| l2.cmp(r2))
            }
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            PropertyValue::Isize(value) => write!(f, "{}", value),
            PropertyValue::Double(value) => write!(f, "{}", value),
            PropertyValue::Bool(value) => write!(f, "{}", value),
            PropertyValue::String(value) => write!(f, "{}", value),
            PropertyValue::Vertex(id) => write!(f, "v[{}]", id),
            PropertyValue::List(values) => {
                write!(f, "[{}]", values.iter().map(ToString::to_string).join(","))
            }
            PropertyValue::Pair(first, second) => write!(f, "({},{})", first, second),
        }
    }
}
