//! Analyses of the program model.
//!
//! The analyses construct data structures that make answering questions
//! about value holders and members easier.
mod constant_values;
mod purity;
mod scope;

pub use constant_values::{
    ConstantFact, ConstantValueCollector, ConstantValuesTable, HolderClass,
};
pub use purity::PureMembers;
pub use scope::{ScopeId, ScopeTracker};
