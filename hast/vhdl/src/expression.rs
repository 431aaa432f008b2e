use crate::{DataObjectReference, VhdlValue, VhdlWriter};
use itertools::Itertools;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VhdlBinaryOperator {
    And,
    Or,
    Xor,
    Equality,
    InEquality,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Remainder,
    Concatenation,
}

impl VhdlBinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            VhdlBinaryOperator::And => "and",
            VhdlBinaryOperator::Or => "or",
            VhdlBinaryOperator::Xor => "xor",
            VhdlBinaryOperator::Equality => "=",
            VhdlBinaryOperator::InEquality => "/=",
            VhdlBinaryOperator::LessThan => "<",
            VhdlBinaryOperator::LessThanOrEqual => "<=",
            VhdlBinaryOperator::GreaterThan => ">",
            VhdlBinaryOperator::GreaterThanOrEqual => ">=",
            VhdlBinaryOperator::Add => "+",
            VhdlBinaryOperator::Subtract => "-",
            VhdlBinaryOperator::Multiply => "*",
            VhdlBinaryOperator::Divide => "/",
            VhdlBinaryOperator::Modulus => "mod",
            VhdlBinaryOperator::Remainder => "rem",
            VhdlBinaryOperator::Concatenation => "&",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VhdlUnaryOperator {
    Not,
    Negation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VhdlExpression {
    Value(VhdlValue),
    Reference(DataObjectReference),
    Binary {
        operator: VhdlBinaryOperator,
        left: Box<VhdlExpression>,
        right: Box<VhdlExpression>,
    },
    Unary {
        operator: VhdlUnaryOperator,
        operand: Box<VhdlExpression>,
    },
    /// Call of a function of the standard libraries, like `resize`.
    Call {
        function: &'static str,
        arguments: Vec<VhdlExpression>,
    },
    /// Call of a function declared in the design, addressed by identifier.
    FunctionCall {
        name: String,
        arguments: Vec<VhdlExpression>,
    },
    Index {
        array: Box<VhdlExpression>,
        index: Box<VhdlExpression>,
    },
    /// An integer argument of a standard function, e.g. a width.
    Integer(i64),
}

impl From<DataObjectReference> for VhdlExpression {
    fn from(reference: DataObjectReference) -> Self {
        VhdlExpression::Reference(reference)
    }
}

impl From<VhdlValue> for VhdlExpression {
    fn from(value: VhdlValue) -> Self {
        VhdlExpression::Value(value)
    }
}

impl VhdlExpression {
    pub fn binary<L, R>(operator: VhdlBinaryOperator, left: L, right: R) -> Self
    where
        L: Into<VhdlExpression>,
        R: Into<VhdlExpression>,
    {
        VhdlExpression::Binary {
            operator,
            left: Box::new(left.into()),
            right: Box::new(right.into()),
        }
    }

    pub fn not<E: Into<VhdlExpression>>(operand: E) -> Self {
        VhdlExpression::Unary {
            operator: VhdlUnaryOperator::Not,
            operand: Box::new(operand.into()),
        }
    }

    pub fn call(function: &'static str, arguments: Vec<VhdlExpression>) -> Self {
        VhdlExpression::Call {
            function,
            arguments,
        }
    }

    pub fn function_call<S: ToString>(
        name: S,
        arguments: Vec<VhdlExpression>,
    ) -> Self {
        VhdlExpression::FunctionCall {
            name: name.to_string(),
            arguments,
        }
    }

    pub fn index<A, I>(array: A, index: I) -> Self
    where
        A: Into<VhdlExpression>,
        I: Into<VhdlExpression>,
    {
        VhdlExpression::Index {
            array: Box::new(array.into()),
            index: Box::new(index.into()),
        }
    }

    pub fn equals<L, R>(left: L, right: R) -> Self
    where
        L: Into<VhdlExpression>,
        R: Into<VhdlExpression>,
    {
        Self::binary(VhdlBinaryOperator::Equality, left, right)
    }

    pub fn is_true<E: Into<VhdlExpression>>(e: E) -> Self {
        Self::equals(e, VhdlValue::Boolean(true))
    }

    /// The data object assigned when this expression is an assignment
    /// target.
    pub fn target_reference(&self) -> Option<&DataObjectReference> {
        match self {
            VhdlExpression::Reference(r) => Some(r),
            VhdlExpression::Index { array, .. } => array.target_reference(),
            _ => None,
        }
    }

    pub fn inline(&self, w: &VhdlWriter) -> String {
        match self {
            VhdlExpression::Value(v) => v.inline(w),
            VhdlExpression::Reference(r) => w.identifier(&r.name),
            VhdlExpression::Binary {
                operator,
                left,
                right,
            } => format!(
                "({} {} {})",
                left.inline(w),
                operator.symbol(),
                right.inline(w)
            ),
            VhdlExpression::Unary {
                operator: VhdlUnaryOperator::Not,
                operand,
            } => format!("not({})", operand.inline(w)),
            VhdlExpression::Unary {
                operator: VhdlUnaryOperator::Negation,
                operand,
            } => format!("-({})", operand.inline(w)),
            VhdlExpression::Call {
                function,
                arguments,
            } => format!(
                "{function}({})",
                arguments.iter().map(|a| a.inline(w)).join(", ")
            ),
            VhdlExpression::FunctionCall { name, arguments } => format!(
                "{}({})",
                w.identifier(name),
                arguments.iter().map(|a| a.inline(w)).join(", ")
            ),
            VhdlExpression::Index { array, index } => {
                format!("{}({})", array.inline(w), index.inline(w))
            }
            VhdlExpression::Integer(i) => i.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VhdlGenerationOptions;

    #[test]
    fn nested_expressions() {
        let options = VhdlGenerationOptions::default();
        let w = VhdlWriter::new(&options);
        let e = VhdlExpression::binary(
            VhdlBinaryOperator::Add,
            DataObjectReference::variable("x"),
            VhdlExpression::call(
                "resize",
                vec![
                    DataObjectReference::signal("y").into(),
                    VhdlExpression::Integer(32),
                ],
            ),
        );
        assert_eq!(e.inline(&w), "(\\x\\ + resize(\\y\\, 32))");
        assert_eq!(
            VhdlExpression::not(VhdlValue::Boolean(true)).inline(&w),
            "not(true)"
        );
    }
}
