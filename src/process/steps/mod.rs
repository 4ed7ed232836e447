pub mod barrier;
pub mod filter;
pub mod jump;
pub mod map;
pub mod side_effect;
pub mod source;

pub use barrier::{AggregateStep, CountStep, FoldStep, OrderStep, ShuffleStep};
pub use filter::{DedupStep, FilterStep, HasStep, IdentityStep};
pub use jump::{JumpStep, LoopPredicate};
pub use map::{FlatMapStep, InStep, MapStep, OutStep, PathStep, ValuesStep};
pub use side_effect::{SideEffectCapStep, SideEffectStep};
pub use source::{GraphVertexStep, InjectStep};
