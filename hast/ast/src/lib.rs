//! The program model the compiler works on: the types, members, statements
//! and expressions of an object-oriented program that has already been
//! parsed and normalized by a front end.
//!
//! Every declaration is identified by its [hast_utils::FullName], which the
//! rest of the compiler uses as a cross-reference key.
mod expression;
pub mod intrinsics;
mod known_types;
pub mod lookup;
mod printer;
mod program;
mod statement;
mod value;

pub use expression::{
    Argument, BinaryOperator, Expression, Invocation, OperatorKind,
    UnaryOperator,
};
pub use intrinsics::Intrinsic;
pub use known_types::{KnownType, KnownTypeKind, KnownTypeLookupTable};
pub use lookup::{
    LookupTables, MemberLookupTable, MemberSignature,
    TypeDeclarationLookupTable, TypeInfo,
};
pub use printer::Printer;
pub use program::{
    FieldDeclaration, MemberDeclaration, ParameterDeclaration, ParameterMode,
    Program, TypeDeclaration, TypeKind, TypeReference,
};
pub use statement::{Block, ParallelCall, Statement};
pub use value::{PrimitiveType, Value};
