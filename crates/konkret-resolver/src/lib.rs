//! Concretization engine: turns an abstract spec request into a fully
//! concrete build DAG by expanding package dependencies, choosing providers
//! for virtual packages and resolving every node attribute to a fixpoint.

pub mod abi;
pub mod concretizer;
pub mod graph;
pub mod normalize;
pub mod providers;
pub mod report;
pub mod session;

pub use concretizer::{Concretizer, Step};
pub use graph::{ConcreteNode, SpecGraph};
pub use report::ConcretizationReport;
