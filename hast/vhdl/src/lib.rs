//! # VHDL object model
//!
//! A small object model of the VHDL constructs the compiler emits, and the
//! code rendering it to source text. Every node implements [Vhdl]; rendering
//! depends only on the node and the [VhdlGenerationOptions], which also carry
//! the identifier shortening state shared by all nodes of one design.
//!
//! Declarations are owned by a [DeclarationBlock]. Statements and
//! expressions only hold [DataObjectReference]s to them.
mod data;
mod declarations;
mod expression;
mod module;
mod options;
mod statement;
mod writer;

pub use data::{
    DataObjectDeclaration, DataObjectKind, DataObjectReference, DataType,
    VhdlValue,
};
pub use declarations::{
    AttributeSpecification, Declaration, DeclarationArena, DeclarationBlock,
    DeclarationId,
};
pub use expression::{VhdlBinaryOperator, VhdlExpression, VhdlUnaryOperator};
pub use module::{Architecture, Entity, Module, Port, PortMode};
pub use options::{extended_identifier, NameShortener, VhdlGenerationOptions};
pub use statement::{
    CaseAlternative, Comment, ConcurrentStatement, Function, Process,
    SequentialStatement,
};
pub use writer::{Vhdl, VhdlWriter};
