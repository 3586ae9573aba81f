//! Monthly component graph.
//!
//! Components are wired into a directed graph by the [`ModelBuilder`]. The
//! graph fixes the order in which components are solved within a month:
//! a component reading a value produced in the same month runs after its
//! producer, and components rewriting the same state variable run in the
//! order they were registered.

mod builder;
mod null_component;
mod runtime;
mod types;

pub use builder::ModelBuilder;
pub use runtime::{Model, MonthResult};
pub use types::{CGraph, C};

#[cfg(test)]
mod tests;
