//! Graphflow is an in-memory graph query and computation engine. The same logical traversal
//! language executes in two modes: a lazily-pulled OLTP step pipeline, where traversers flow
//! through a strategy-rewritten chain of steps, and an OLAP mode where the work is expressed as a
//! Pregel-style *vertex program* run by a bulk-synchronous [`GraphComputer`](compute::GraphComputer)
//! over supersteps, followed by MapReduce-style aggregation of the accumulated compute state.

// Enable warnings for all clippy lints. This automatically enables new lints shipped with new rust
// versions.
#![warn(clippy::correctness, clippy::style, clippy::complexity, clippy::perf, clippy::pedantic)]
// Now selectively disable unneeded lints.
#![allow(
    clippy::module_name_repetitions,        // Allow.
    clippy::use_debug,                      // Allow.
    clippy::float_arithmetic,               // Allow.
    clippy::float_cmp,                      // Allow.
    clippy::cast_precision_loss,            // Allow.
    clippy::too_many_arguments,             // Allow.
    clippy::use_self,                       // Allow.
    clippy::too_many_lines,                 // Allow.
    clippy::missing_errors_doc,             // Disabled.
    clippy::missing_panics_doc,             // Disabled.
    clippy::must_use_candidate,             // Allow.
    clippy::return_self_not_must_use,       // Allow.
    clippy::unnecessary_wraps,              // Step contracts are uniformly fallible.
    clippy::implicit_hasher                 // Default hasher is fine for now.
)]
// Do not allow print statements. Use `log::info!()` or equivalent instead.
#![deny(clippy::print_stdout)]

pub mod compute;
pub mod error;
pub mod graph;
pub mod process;
pub mod util;

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_new;
