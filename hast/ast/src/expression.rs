use crate::{ParameterMode, TypeReference, Value};
use hast_utils::FullName;
use serde::{Deserialize, Serialize};

/// Binary operators of the source language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    ShiftLeft,
    ShiftRight,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    ConditionalAnd,
    ConditionalOr,
    Equality,
    InEquality,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// `a ?? b`. Has no hardware equivalent.
    NullCoalescing,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::ExclusiveOr => "^",
            Self::ConditionalAnd => "&&",
            Self::ConditionalOr => "||",
            Self::Equality => "==",
            Self::InEquality => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::NullCoalescing => "??",
        }
    }

    /// Operators producing a boolean.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equality
                | Self::InEquality
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }
}

/// Unary operators of the source language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    BitNot,
    /// `*p`. Has no hardware equivalent.
    Dereference,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "!",
            Self::BitNot => "~",
            Self::Dereference => "*",
        }
    }
}

/// Any operator, as handed to the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Binary(BinaryOperator),
    Unary(UnaryOperator),
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorKind::Binary(op) => f.write_str(op.symbol()),
            OperatorKind::Unary(op) => f.write_str(op.symbol()),
        }
    }
}

/// An argument passed to an invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub mode: ParameterMode,
    pub value: Expression,
}

impl Argument {
    pub fn by_value(value: Expression) -> Self {
        Argument {
            mode: ParameterMode::Value,
            value,
        }
    }
}

/// A call of a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub member: FullName,
    /// The object the member is called on. `None` for static members.
    pub target: Option<Box<Expression>>,
    pub arguments: Vec<Argument>,
}

impl Invocation {
    pub fn new_static(member: FullName, arguments: Vec<Expression>) -> Self {
        Invocation {
            member,
            target: None,
            arguments: arguments.into_iter().map(Argument::by_value).collect(),
        }
    }
}

/// Expressions of the program model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    /// Read of a local variable.
    Local(FullName),
    /// Read of a parameter of the enclosing member.
    Parameter(FullName),
    /// Read of a field or auto-property. `target` is `None` for static
    /// fields.
    Field {
        field: FullName,
        target: Option<Box<Expression>>,
    },
    /// The object the enclosing member was called on.
    This,
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Cast {
        ty: TypeReference,
        operand: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    Invocation(Invocation),
    /// `&holder`. Has no hardware equivalent.
    AddressOf(Box<Expression>),
    ArrayCreation {
        element_type: TypeReference,
        length: Box<Expression>,
    },
    ArrayElement {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    ArrayLength(Box<Expression>),
    ObjectCreation {
        ty: FullName,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    pub fn local<S: Into<FullName>>(name: S) -> Self {
        Expression::Local(name.into())
    }

    pub fn parameter<S: Into<FullName>>(name: S) -> Self {
        Expression::Parameter(name.into())
    }

    pub fn static_field<S: Into<FullName>>(name: S) -> Self {
        Expression::Field {
            field: name.into(),
            target: None,
        }
    }

    pub fn binary(
        operator: BinaryOperator,
        left: Expression,
        right: Expression,
    ) -> Self {
        Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(operator: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            operator,
            operand: Box::new(operand),
        }
    }

    pub fn call(member: FullName, arguments: Vec<Expression>) -> Self {
        Expression::Invocation(Invocation::new_static(member, arguments))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expression::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// The holder read by this expression, if it is a plain read of a local,
    /// parameter or field.
    pub fn holder(&self) -> Option<FullName> {
        match self {
            Expression::Local(name) | Expression::Parameter(name) => {
                Some(*name)
            }
            Expression::Field { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Direct children of this expression, in evaluation order.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_)
            | Expression::Local(_)
            | Expression::Parameter(_)
            | Expression::This => vec![],
            Expression::Field { target, .. } => {
                target.iter().map(|t| t.as_ref()).collect()
            }
            Expression::Unary { operand, .. }
            | Expression::Cast { operand, .. } => vec![&**operand],
            Expression::AddressOf(inner) | Expression::ArrayLength(inner) => {
                vec![&**inner]
            }
            Expression::Binary { left, right, .. } => vec![&**left, &**right],
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => vec![&**condition, &**then, &**otherwise],
            Expression::Invocation(inv) => inv
                .target
                .iter()
                .map(|t| t.as_ref())
                .chain(inv.arguments.iter().map(|a| &a.value))
                .collect(),
            Expression::ArrayCreation { length, .. } => vec![&**length],
            Expression::ArrayElement { array, index } => {
                vec![&**array, &**index]
            }
            Expression::ObjectCreation { arguments, .. } => {
                arguments.iter().collect()
            }
        }
    }

    /// Mutable access to the direct children of this expression.
    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Literal(_)
            | Expression::Local(_)
            | Expression::Parameter(_)
            | Expression::This => vec![],
            Expression::Field { target, .. } => {
                target.iter_mut().map(|t| t.as_mut()).collect()
            }
            Expression::Unary { operand, .. }
            | Expression::Cast { operand, .. } => vec![&mut **operand],
            Expression::AddressOf(inner) | Expression::ArrayLength(inner) => {
                vec![&mut **inner]
            }
            Expression::Binary { left, right, .. } => {
                vec![&mut **left, &mut **right]
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => vec![&mut **condition, &mut **then, &mut **otherwise],
            Expression::Invocation(inv) => inv
                .target
                .iter_mut()
                .map(|t| t.as_mut())
                .chain(inv.arguments.iter_mut().map(|a| &mut a.value))
                .collect(),
            Expression::ArrayCreation { length, .. } => vec![&mut **length],
            Expression::ArrayElement { array, index } => {
                vec![&mut **array, &mut **index]
            }
            Expression::ObjectCreation { arguments, .. } => {
                arguments.iter_mut().collect()
            }
        }
    }

    /// Calls `f` on every expression in this tree, parents before children.
    pub fn for_each<'a, F: FnMut(&'a Expression)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.for_each(f);
        }
    }

    /// Does the tree contain an invocation.
    pub fn contains_invocation(&self) -> bool {
        let mut found = false;
        self.for_each(&mut |e| {
            found |= matches!(e, Expression::Invocation(_))
        });
        found
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}
