//! Implements a formatter for the program model.
//! The output is deterministic and is part of the transformation identity, so
//! any change to it invalidates cached results.
use crate::{
    Argument, Block, Expression, MemberDeclaration, ParameterMode, Program,
    Statement, TypeDeclaration, TypeKind,
};
use itertools::Itertools;
use std::io;

/// Printer for the program model.
pub struct Printer;

impl Printer {
    fn format_flags(member: &MemberDeclaration) -> String {
        let flags = [
            (member.is_hardware_entry, "@entry "),
            (member.is_intrinsic, "@intrinsic "),
            (member.is_inlinable, "@inline "),
            (member.is_static, "static "),
        ];
        flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, flag)| *flag)
            .collect()
    }

    fn format_mode(mode: ParameterMode) -> &'static str {
        match mode {
            ParameterMode::Value => "",
            ParameterMode::Ref => "ref ",
            ParameterMode::Out => "out ",
        }
    }

    fn format_arguments(args: &[Argument]) -> String {
        args.iter()
            .map(|a| {
                format!(
                    "{}{}",
                    Self::format_mode(a.mode),
                    Self::expression_to_str(&a.value)
                )
            })
            .join(", ")
    }

    /// Formats the whole program.
    pub fn write_program<F: io::Write>(
        program: &Program,
        f: &mut F,
    ) -> io::Result<()> {
        for ty in &program.types {
            Self::write_type(ty, f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    pub fn write_type<F: io::Write>(
        ty: &TypeDeclaration,
        f: &mut F,
    ) -> io::Result<()> {
        let kind = match ty.kind {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
        };
        let intrinsic = if ty.is_intrinsic { "@intrinsic " } else { "" };
        writeln!(f, "{intrinsic}{kind} {} {{", ty.name)?;
        for field in &ty.fields {
            write!(
                f,
                "  {}{}{} {}",
                if field.is_static { "static " } else { "" },
                if field.is_property { "property " } else { "field " },
                field.ty,
                field.name
            )?;
            match &field.initializer {
                Some(init) => writeln!(f, " = {init};")?,
                None => writeln!(f, ";")?,
            }
        }
        for member in &ty.members {
            Self::write_member(member, 2, f)?;
        }
        writeln!(f, "}}")
    }

    pub fn write_member<F: io::Write>(
        member: &MemberDeclaration,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        write!(
            f,
            "{}{}{} {}({})",
            " ".repeat(indent_level),
            Self::format_flags(member),
            member.return_type,
            member.name,
            member
                .parameters
                .iter()
                .map(|p| format!(
                    "{}{} {}",
                    Self::format_mode(p.mode),
                    p.ty,
                    p.name.last_segment()
                ))
                .join(", ")
        )?;
        match &member.body {
            Some(body) => {
                writeln!(f, " {{")?;
                Self::write_statements(body, indent_level + 2, f)?;
                writeln!(f, "{}}}", " ".repeat(indent_level))
            }
            None => writeln!(f, ";"),
        }
    }

    fn write_statements<F: io::Write>(
        block: &Block,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        for stmt in &block.statements {
            Self::write_statement(stmt, indent_level, f)?;
        }
        Ok(())
    }

    pub fn write_statement<F: io::Write>(
        stmt: &Statement,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let indent = " ".repeat(indent_level);
        write!(f, "{indent}")?;
        match stmt {
            Statement::VariableDeclaration {
                name,
                ty,
                initializer,
            } => {
                write!(f, "{ty} {}", name.last_segment())?;
                match initializer {
                    Some(init) => {
                        writeln!(f, " = {};", Self::expression_to_str(init))
                    }
                    None => writeln!(f, ";"),
                }
            }
            Statement::Assignment { target, value } => writeln!(
                f,
                "{} = {};",
                Self::expression_to_str(target),
                Self::expression_to_str(value)
            ),
            Statement::Expression(e) => {
                writeln!(f, "{};", Self::expression_to_str(e))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "if ({}) {{", Self::expression_to_str(condition))?;
                Self::write_statements(then_branch, indent_level + 2, f)?;
                write!(f, "{indent}}}")?;
                match else_branch {
                    Some(els) => {
                        writeln!(f, " else {{")?;
                        Self::write_statements(els, indent_level + 2, f)?;
                        writeln!(f, "{indent}}}")
                    }
                    None => writeln!(f),
                }
            }
            Statement::While { condition, body } => {
                writeln!(
                    f,
                    "while ({}) {{",
                    Self::expression_to_str(condition)
                )?;
                Self::write_statements(body, indent_level + 2, f)?;
                writeln!(f, "{indent}}}")
            }
            Statement::Return(Some(value)) => {
                writeln!(f, "return {};", Self::expression_to_str(value))
            }
            Statement::Return(None) => writeln!(f, "return;"),
            Statement::Block(block) => {
                writeln!(f, "{{")?;
                Self::write_statements(block, indent_level + 2, f)?;
                writeln!(f, "{indent}}}")
            }
            Statement::ParallelInvocation(calls) => {
                writeln!(f, "par {{")?;
                for call in calls {
                    write!(f, "{indent}  ")?;
                    if let Some(target) = &call.target {
                        write!(f, "{} = ", Self::expression_to_str(target))?;
                    }
                    writeln!(
                        f,
                        "{};",
                        Self::expression_to_str(&Expression::Invocation(
                            call.invocation.clone()
                        ))
                    )?;
                }
                writeln!(f, "{indent}}}")
            }
            Statement::Break => writeln!(f, "break;"),
            Statement::Continue => writeln!(f, "continue;"),
        }
    }

    /// Generate a String-based representation for an expression.
    pub fn expression_to_str(expr: &Expression) -> String {
        match expr {
            Expression::Literal(value) => value.to_string(),
            Expression::Local(name) | Expression::Parameter(name) => {
                name.last_segment().to_string()
            }
            Expression::Field {
                field,
                target: Some(target),
            } => format!("{}.{field}", Self::expression_to_str(target)),
            Expression::Field {
                field,
                target: None,
            } => field.to_string(),
            Expression::This => "this".to_string(),
            Expression::Unary { operator, operand } => {
                format!("{}{}", operator.symbol(), Self::expression_to_str(operand))
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => format!(
                "({} {} {})",
                Self::expression_to_str(left),
                operator.symbol(),
                Self::expression_to_str(right)
            ),
            Expression::Cast { ty, operand } => {
                format!("(({ty}){})", Self::expression_to_str(operand))
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => format!(
                "({} ? {} : {})",
                Self::expression_to_str(condition),
                Self::expression_to_str(then),
                Self::expression_to_str(otherwise)
            ),
            Expression::Invocation(inv) => {
                let target = inv
                    .target
                    .as_ref()
                    .map(|t| format!("{}.", Self::expression_to_str(t)))
                    .unwrap_or_default();
                format!(
                    "{target}{}[{}]",
                    inv.member,
                    Self::format_arguments(&inv.arguments)
                )
            }
            Expression::AddressOf(inner) => {
                format!("&{}", Self::expression_to_str(inner))
            }
            Expression::ArrayCreation {
                element_type,
                length,
            } => format!(
                "new {element_type}[{}]",
                Self::expression_to_str(length)
            ),
            Expression::ArrayElement { array, index } => format!(
                "{}[{}]",
                Self::expression_to_str(array),
                Self::expression_to_str(index)
            ),
            Expression::ArrayLength(array) => {
                format!("{}.Length", Self::expression_to_str(array))
            }
            Expression::ObjectCreation { ty, arguments } => format!(
                "new {ty}({})",
                arguments.iter().map(Self::expression_to_str).join(", ")
            ),
        }
    }

    /// Generate a String-based representation for a statement.
    pub fn statement_to_str(stmt: &Statement) -> String {
        let mut buf = Vec::new();
        Self::write_statement(stmt, 0, &mut buf).ok();
        String::from_utf8_lossy(buf.as_slice()).trim_end().to_string()
    }

    /// Generate a String-based representation for the whole program.
    pub fn program_to_str(program: &Program) -> String {
        let mut buf = Vec::new();
        Self::write_program(program, &mut buf).ok();
        String::from_utf8_lossy(buf.as_slice()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryOperator, TypeReference, Value};
    use hast_utils::FullName;

    #[test]
    fn prints_statements() {
        let x = FullName::new("A::M()::x");
        let stmt = Statement::if_else(
            Expression::binary(
                BinaryOperator::LessThan,
                Expression::local(x),
                Expression::literal(Value::Int32(3)),
            ),
            vec![Statement::assign(
                Expression::local(x),
                Expression::literal(Value::UInt32(5)),
            )],
            None,
        );
        assert_eq!(
            Printer::statement_to_str(&stmt),
            "if ((x < 3)) {\n  x = 5u;\n}"
        );
        let decl = Statement::declare(
            x,
            TypeReference::array_of(TypeReference::Named(FullName::new(
                "System.Int32",
            ))),
            None,
        );
        assert_eq!(Printer::statement_to_str(&decl), "System.Int32[] x;");
    }
}
