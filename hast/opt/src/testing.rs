//! Small builders for programs used by the tests of the steps.
use crate::Context;
use hast_ast::{
    Block, Expression, FieldDeclaration, MemberDeclaration,
    ParameterDeclaration, ParameterMode, PrimitiveType, Program, Statement,
    TypeDeclaration, TypeReference, Value,
};
use hast_utils::{FullName, HardwareGenerationConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn int(v: i32) -> Expression {
    Expression::literal(Value::Int32(v))
}

pub fn int_ty() -> TypeReference {
    TypeReference::primitive(PrimitiveType::Int32)
}

pub fn bool_ty() -> TypeReference {
    TypeReference::primitive(PrimitiveType::Boolean)
}

/// A static member returning an `int`, with parameters of the given types.
pub fn member(
    name: &str,
    params: &[(&str, TypeReference)],
    body: Vec<Statement>,
) -> MemberDeclaration {
    let mut m = MemberDeclaration::new(FullName::new(name), int_ty());
    m.parameters = params
        .iter()
        .map(|(p, ty)| ParameterDeclaration {
            name: FullName::new(name).nested(p),
            ty: ty.clone(),
            mode: ParameterMode::Value,
        })
        .collect();
    m.body = Some(Block::new(body));
    m
}

pub fn static_field(name: &str) -> FieldDeclaration {
    FieldDeclaration {
        name: FullName::new(name),
        ty: int_ty(),
        is_static: true,
        is_property: false,
        initializer: None,
    }
}

/// A program with one type `T` declaring the given fields and members.
pub fn program(
    fields: Vec<FieldDeclaration>,
    members: Vec<MemberDeclaration>,
) -> Program {
    let mut ty = TypeDeclaration::new(FullName::new("T"));
    ty.fields = fields;
    ty.members = members;
    Program::new(vec![ty])
}

pub fn context(program: Program) -> Context {
    init_logging();
    Context::new(program, HardwareGenerationConfig::default())
}

/// The statements of a member body, printed one per line.
pub fn body_text(ctx: &Context, member: &str) -> Vec<String> {
    let mut lines = vec![];
    if let Some(body) = ctx
        .program
        .member(&FullName::new(member))
        .and_then(|m| m.body.as_ref())
    {
        for stmt in &body.statements {
            lines.push(hast_ast::Printer::statement_to_str(stmt));
        }
    }
    lines
}
