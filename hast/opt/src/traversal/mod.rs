//! Helpers for traversing member bodies
mod action;
mod visitor;

pub use action::{Action, VisResult};
pub use visitor::{
    visit_block, BlockKind, ConstructVisitor, Named, Resubstitution,
    Visitable, Visitor,
};
