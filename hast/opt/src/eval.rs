//! Pure evaluation of operators over literals.
//!
//! Reproduces the fixed-width semantics of the source language: binary
//! numeric promotion to at least 32 bits, wrapping overflow, masked shift
//! counts, division truncating toward zero and IEEE-754 floating point.
//! Anything the language would reject or trap on at runtime is reported as
//! an [EvalError] instead of being guessed.
use hast_ast::{
    BinaryOperator, Expression, OperatorKind, PrimitiveType, UnaryOperator,
    Value,
};
use hast_utils::{Warning, WarningCode};

#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    /// The operator can't be evaluated at all.
    UnsupportedOperator(OperatorKind),
    /// The operator isn't defined for the operands, or would trap.
    UnsupportedEvaluation(String),
}

impl EvalError {
    fn evaluation<S: ToString>(msg: S) -> Self {
        EvalError::UnsupportedEvaluation(msg.to_string())
    }

    pub fn into_warning(self) -> Warning {
        match self {
            EvalError::UnsupportedOperator(op) => Warning::new(
                WarningCode::UnsupportedOperator,
                format!(
                    "The operator `{op}' can't be evaluated at compile time."
                ),
            ),
            EvalError::UnsupportedEvaluation(msg) => {
                Warning::new(WarningCode::UnsupportedEvaluation, msg)
            }
        }
    }
}

pub type EvalResult = Result<Value, EvalError>;

/// Evaluate an operator on literal operands.
pub fn evaluate(op: OperatorKind, operands: &[Value]) -> EvalResult {
    match (op, operands) {
        (OperatorKind::Binary(op), [left, right]) => binary(op, *left, *right),
        (OperatorKind::Unary(op), [operand]) => unary(op, *operand),
        _ => Err(EvalError::evaluation(format!(
            "`{op}' applied to {} operands",
            operands.len()
        ))),
    }
}

/// Type an operand of a unary operator is promoted to.
fn unary_promotion(ty: PrimitiveType) -> Option<PrimitiveType> {
    use PrimitiveType as P;
    match ty {
        P::Boolean => None,
        P::SByte | P::Byte | P::Int16 | P::UInt16 | P::Char | P::Int32 => {
            Some(P::Int32)
        }
        other => Some(other),
    }
}

/// Type both operands of a binary arithmetic operator are converted to.
fn binary_promotion(
    left: PrimitiveType,
    right: PrimitiveType,
) -> Result<PrimitiveType, EvalError> {
    use PrimitiveType as P;
    let either = |ty: P| left == ty || right == ty;
    if either(P::Boolean) {
        return Err(EvalError::evaluation(
            "booleans can't be used as numbers",
        ));
    }
    if either(P::Double) {
        return Ok(P::Double);
    }
    if either(P::Single) {
        return Ok(P::Single);
    }
    if either(P::UInt64) {
        let other = if left == P::UInt64 { right } else { left };
        if other.is_signed() {
            return Err(EvalError::evaluation(format!(
                "no common type for {} and {}",
                left.full_name(),
                right.full_name()
            )));
        }
        return Ok(P::UInt64);
    }
    if either(P::Int64) {
        return Ok(P::Int64);
    }
    if either(P::UInt32) {
        let other = if left == P::UInt32 { right } else { left };
        return Ok(if other.is_signed() { P::Int64 } else { P::UInt32 });
    }
    Ok(P::Int32)
}

/// Inclusive range of an integral type.
fn integer_range(ty: PrimitiveType) -> (i128, i128) {
    let bits = ty.size_bits();
    if ty.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn integer_operand(value: Value) -> Result<i128, EvalError> {
    value.as_integer().ok_or_else(|| {
        EvalError::evaluation(format!("{value} is not an integer"))
    })
}

fn to_f32(value: Value) -> f32 {
    match value {
        Value::Single(v) => v,
        Value::Double(v) => v as f32,
        other => other.as_integer().unwrap_or_default() as f32,
    }
}

fn to_f64(value: Value) -> f64 {
    match value {
        Value::Single(v) => v as f64,
        Value::Double(v) => v,
        other => other.as_integer().unwrap_or_default() as f64,
    }
}

pub fn binary(op: BinaryOperator, left: Value, right: Value) -> EvalResult {
    use BinaryOperator as B;
    if op == B::NullCoalescing {
        return Err(EvalError::UnsupportedOperator(OperatorKind::Binary(op)));
    }
    if let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) {
        return match op {
            B::ConditionalAnd | B::BitwiseAnd => Ok(Value::Boolean(l && r)),
            B::ConditionalOr | B::BitwiseOr => Ok(Value::Boolean(l || r)),
            B::ExclusiveOr | B::InEquality => Ok(Value::Boolean(l != r)),
            B::Equality => Ok(Value::Boolean(l == r)),
            _ => Err(EvalError::evaluation(format!(
                "`{}' is not defined for booleans",
                op.symbol()
            ))),
        };
    }
    match op {
        B::ConditionalAnd | B::ConditionalOr => Err(EvalError::evaluation(
            format!("`{}' needs boolean operands", op.symbol()),
        )),
        B::ShiftLeft | B::ShiftRight => shift(op, left, right),
        _ => {
            let ty = binary_promotion(
                left.primitive_type(),
                right.primitive_type(),
            )?;
            match ty {
                PrimitiveType::Single => {
                    single_binary(op, to_f32(left), to_f32(right))
                }
                PrimitiveType::Double => {
                    double_binary(op, to_f64(left), to_f64(right))
                }
                _ => integer_binary(
                    op,
                    ty,
                    integer_operand(left)?,
                    integer_operand(right)?,
                ),
            }
        }
    }
}

fn integer_binary(
    op: BinaryOperator,
    ty: PrimitiveType,
    a: i128,
    b: i128,
) -> EvalResult {
    use BinaryOperator as B;
    let wrap = |v: i128| -> EvalResult { Ok(Value::from_integer(ty, v)) };
    let (min, _) = integer_range(ty);
    match op {
        B::Add => wrap(a.wrapping_add(b)),
        B::Subtract => wrap(a.wrapping_sub(b)),
        B::Multiply => wrap(a.wrapping_mul(b)),
        B::Divide | B::Modulus => {
            if b == 0 {
                Err(EvalError::evaluation("division by zero"))
            } else if ty.is_signed() && a == min && b == -1 {
                Err(EvalError::evaluation(format!(
                    "{} overflows",
                    Value::from_integer(ty, a)
                )))
            } else if op == B::Divide {
                wrap(a / b)
            } else {
                wrap(a % b)
            }
        }
        B::BitwiseAnd => wrap(a & b),
        B::BitwiseOr => wrap(a | b),
        B::ExclusiveOr => wrap(a ^ b),
        B::Equality => Ok(Value::Boolean(a == b)),
        B::InEquality => Ok(Value::Boolean(a != b)),
        B::LessThan => Ok(Value::Boolean(a < b)),
        B::LessThanOrEqual => Ok(Value::Boolean(a <= b)),
        B::GreaterThan => Ok(Value::Boolean(a > b)),
        B::GreaterThanOrEqual => Ok(Value::Boolean(a >= b)),
        B::ShiftLeft
        | B::ShiftRight
        | B::ConditionalAnd
        | B::ConditionalOr
        | B::NullCoalescing => Err(EvalError::evaluation(format!(
            "`{}' is not an arithmetic operator",
            op.symbol()
        ))),
    }
}

macro_rules! float_binary {
    ($name:ident, $ty:ty, $ctor:path) => {
        fn $name(op: BinaryOperator, a: $ty, b: $ty) -> EvalResult {
            use BinaryOperator as B;
            match op {
                B::Add => Ok($ctor(a + b)),
                B::Subtract => Ok($ctor(a - b)),
                B::Multiply => Ok($ctor(a * b)),
                B::Divide => Ok($ctor(a / b)),
                B::Modulus => Ok($ctor(a % b)),
                B::Equality => Ok(Value::Boolean(a == b)),
                B::InEquality => Ok(Value::Boolean(a != b)),
                B::LessThan => Ok(Value::Boolean(a < b)),
                B::LessThanOrEqual => Ok(Value::Boolean(a <= b)),
                B::GreaterThan => Ok(Value::Boolean(a > b)),
                B::GreaterThanOrEqual => Ok(Value::Boolean(a >= b)),
                _ => Err(EvalError::evaluation(format!(
                    "`{}' is not defined for floating point numbers",
                    op.symbol()
                ))),
            }
        }
    };
}

float_binary!(single_binary, f32, Value::Single);
float_binary!(double_binary, f64, Value::Double);

fn shift(op: BinaryOperator, left: Value, right: Value) -> EvalResult {
    let ty = unary_promotion(left.primitive_type())
        .filter(|ty| ty.is_integral())
        .ok_or_else(|| {
            EvalError::evaluation(format!("{left} can't be shifted"))
        })?;
    if unary_promotion(right.primitive_type()) != Some(PrimitiveType::Int32) {
        return Err(EvalError::evaluation(format!(
            "the shift count {right} must be an int"
        )));
    }
    let mask = if ty.size_bits() == 64 { 63 } else { 31 };
    let count = (integer_operand(right)? as i32 & mask) as u32;
    let value = integer_operand(left)?;
    let shifted = match op {
        BinaryOperator::ShiftLeft => value.wrapping_shl(count),
        _ => value >> count,
    };
    Ok(Value::from_integer(ty, shifted))
}

pub fn unary(op: UnaryOperator, operand: Value) -> EvalResult {
    use UnaryOperator as U;
    if op == U::Dereference {
        return Err(EvalError::UnsupportedOperator(OperatorKind::Unary(op)));
    }
    if let Some(b) = operand.as_bool() {
        return match op {
            U::Not => Ok(Value::Boolean(!b)),
            _ => Err(EvalError::evaluation(format!(
                "`{}' is not defined for booleans",
                op.symbol()
            ))),
        };
    }
    if op == U::Not {
        return Err(EvalError::evaluation(format!(
            "`!' is not defined for {operand}"
        )));
    }
    let ty = unary_promotion(operand.primitive_type()).ok_or_else(|| {
        EvalError::evaluation(format!("`{}' applied to {operand}", op.symbol()))
    })?;
    match (ty, operand) {
        (_, Value::Single(v)) => match op {
            U::Plus => Ok(Value::Single(v)),
            U::Minus => Ok(Value::Single(-v)),
            _ => Err(EvalError::evaluation("`~' applied to a float")),
        },
        (_, Value::Double(v)) => match op {
            U::Plus => Ok(Value::Double(v)),
            U::Minus => Ok(Value::Double(-v)),
            _ => Err(EvalError::evaluation("`~' applied to a double")),
        },
        _ => {
            let value = integer_operand(operand)?;
            match op {
                U::Plus => Ok(Value::from_integer(ty, value)),
                U::Minus => match ty {
                    PrimitiveType::UInt64 => Err(EvalError::evaluation(
                        "an ulong can't be negated",
                    )),
                    PrimitiveType::UInt32 => {
                        Ok(Value::from_integer(PrimitiveType::Int64, -value))
                    }
                    _ => Ok(Value::from_integer(ty, value.wrapping_neg())),
                },
                _ => Ok(Value::from_integer(ty, !value)),
            }
        }
    }
}

/// Unchecked conversion of a literal to another primitive type.
pub fn cast(value: Value, to: PrimitiveType) -> EvalResult {
    let from = value.primitive_type();
    if from == to {
        return Ok(value);
    }
    if from == PrimitiveType::Boolean || to == PrimitiveType::Boolean {
        return Err(EvalError::evaluation(format!(
            "{value} can't be converted to {}",
            to.full_name()
        )));
    }
    match to {
        PrimitiveType::Single => return Ok(Value::Single(to_f32(value))),
        PrimitiveType::Double => return Ok(Value::Double(to_f64(value))),
        _ => {}
    }
    if let Some(integer) = value.as_integer() {
        return Ok(Value::from_integer(to, integer));
    }
    let truncated = to_f64(value).trunc();
    let (min, max) = integer_range(to);
    if truncated.is_nan()
        || truncated < min as f64
        || truncated >= (max + 1) as f64
    {
        return Err(EvalError::evaluation(format!(
            "{value} is out of the range of {}",
            to.full_name()
        )));
    }
    Ok(Value::from_integer(to, truncated as i128))
}

/// Evaluate an expression tree. Reads of holders are resolved with
/// `resolve`; problems found along the way are pushed to `errors`.
/// Returns `None` if the expression isn't a compile-time constant.
pub fn evaluate_expression<R>(
    expr: &Expression,
    resolve: &mut R,
    errors: &mut Vec<EvalError>,
) -> Option<Value>
where
    R: FnMut(&Expression) -> Option<Value>,
{
    match expr {
        Expression::Literal(v) => Some(*v),
        Expression::Local(_)
        | Expression::Parameter(_)
        | Expression::Field { .. }
        | Expression::Invocation(_) => resolve(expr),
        Expression::Unary { operator, operand } => {
            let value = evaluate_expression(operand, resolve, errors)?;
            unary(*operator, value).map_err(|e| errors.push(e)).ok()
        }
        Expression::Binary {
            operator,
            left,
            right,
        } => {
            let l = evaluate_expression(left, resolve, errors);
            // The right side of a short-circuiting operator is irrelevant
            // once the left side decides the result.
            match (operator, l.and_then(|v| v.as_bool())) {
                (BinaryOperator::ConditionalAnd, Some(false)) => {
                    return Some(Value::Boolean(false))
                }
                (BinaryOperator::ConditionalOr, Some(true)) => {
                    return Some(Value::Boolean(true))
                }
                _ => {}
            }
            let r = evaluate_expression(right, resolve, errors)?;
            binary(*operator, l?, r).map_err(|e| errors.push(e)).ok()
        }
        Expression::Cast { ty, operand } => {
            let value = evaluate_expression(operand, resolve, errors)?;
            let to = ty.as_primitive()?;
            cast(value, to).map_err(|e| errors.push(e)).ok()
        }
        Expression::Conditional {
            condition,
            then,
            otherwise,
        } => match evaluate_expression(condition, resolve, errors)?.as_bool()? {
            true => evaluate_expression(then, resolve, errors),
            false => evaluate_expression(otherwise, resolve, errors),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use BinaryOperator as B;

    #[test]
    fn promotion() {
        assert_eq!(
            binary(B::Add, Value::Byte(200), Value::Byte(100)),
            Ok(Value::Int32(300))
        );
        assert_eq!(
            binary(B::Add, Value::UInt32(1), Value::Int32(-2)),
            Ok(Value::Int64(-1))
        );
        assert_eq!(
            binary(B::Add, Value::UInt32(u32::MAX), Value::Byte(1)),
            Ok(Value::UInt32(0))
        );
        assert!(binary(B::Add, Value::UInt64(1), Value::Int32(1)).is_err());
        assert_eq!(
            binary(B::Multiply, Value::Single(1.5), Value::Int32(2)),
            Ok(Value::Single(3.0))
        );
    }

    #[test]
    fn division_edge_cases_are_not_guessed() {
        assert!(matches!(
            binary(B::Divide, Value::Int32(1), Value::Int32(0)),
            Err(EvalError::UnsupportedEvaluation(_))
        ));
        assert!(binary(B::Divide, Value::Int32(i32::MIN), Value::Int32(-1))
            .is_err());
        assert!(binary(B::Modulus, Value::Int64(i64::MIN), Value::Int64(-1))
            .is_err());
        assert_eq!(
            binary(B::Divide, Value::Int32(-7), Value::Int32(2)),
            Ok(Value::Int32(-3))
        );
        assert_eq!(
            binary(B::Modulus, Value::Int32(-7), Value::Int32(2)),
            Ok(Value::Int32(-1))
        );
        assert_eq!(
            binary(B::Divide, Value::UInt32(u32::MAX), Value::UInt32(2)),
            Ok(Value::UInt32(u32::MAX / 2))
        );
        let inf = binary(B::Divide, Value::Double(1.0), Value::Double(0.0));
        assert_eq!(inf, Ok(Value::Double(f64::INFINITY)));
    }

    #[test]
    fn shifts() {
        assert_eq!(
            binary(B::ShiftLeft, Value::Int32(1), Value::Int32(33)),
            Ok(Value::Int32(2))
        );
        assert_eq!(
            binary(B::ShiftRight, Value::Int32(-8), Value::Int32(1)),
            Ok(Value::Int32(-4))
        );
        assert_eq!(
            binary(B::ShiftRight, Value::UInt32(0x8000_0000), Value::Int32(31)),
            Ok(Value::UInt32(1))
        );
        assert_eq!(
            binary(B::ShiftLeft, Value::Int64(1), Value::Int32(65)),
            Ok(Value::Int64(2))
        );
        assert_eq!(
            binary(B::ShiftLeft, Value::Byte(0x80), Value::Int32(1)),
            Ok(Value::Int32(0x100))
        );
        assert!(
            binary(B::ShiftLeft, Value::Int32(1), Value::UInt32(1)).is_err()
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(
            unary(UnaryOperator::Minus, Value::UInt32(1)),
            Ok(Value::Int64(-1))
        );
        assert_eq!(
            unary(UnaryOperator::Minus, Value::Int32(i32::MIN)),
            Ok(Value::Int32(i32::MIN))
        );
        assert_eq!(
            unary(UnaryOperator::BitNot, Value::Byte(0)),
            Ok(Value::Int32(-1))
        );
        assert_eq!(
            unary(UnaryOperator::Not, Value::Boolean(true)),
            Ok(Value::Boolean(false))
        );
        assert!(matches!(
            unary(UnaryOperator::Dereference, Value::Int32(1)),
            Err(EvalError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            evaluate(
                OperatorKind::Binary(B::NullCoalescing),
                &[Value::Int32(1), Value::Int32(2)]
            ),
            Err(EvalError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn casts() {
        assert_eq!(
            cast(Value::Int32(-1), PrimitiveType::UInt32),
            Ok(Value::UInt32(u32::MAX))
        );
        assert_eq!(
            cast(Value::Int32(300), PrimitiveType::Byte),
            Ok(Value::Byte(44))
        );
        assert_eq!(
            cast(Value::Double(-2.7), PrimitiveType::Int32),
            Ok(Value::Int32(-2))
        );
        assert!(cast(Value::Double(f64::NAN), PrimitiveType::Int32).is_err());
        assert!(cast(Value::Double(1e10), PrimitiveType::Int32).is_err());
        assert!(cast(Value::Boolean(true), PrimitiveType::Int32).is_err());
    }

    #[test]
    fn short_circuit_skips_unknown_operands() {
        let expr = Expression::binary(
            B::ConditionalAnd,
            Expression::literal(Value::Boolean(false)),
            Expression::local("A::M()::unknown"),
        );
        let mut errors = vec![];
        let result = evaluate_expression(&expr, &mut |_| None, &mut errors);
        assert_eq!(result, Some(Value::Boolean(false)));
        assert!(errors.is_empty());
    }

    proptest! {
        #[test]
        fn int_arithmetic_wraps(a in any::<i32>(), b in any::<i32>()) {
            prop_assert_eq!(
                binary(B::Add, Value::Int32(a), Value::Int32(b)),
                Ok(Value::Int32(a.wrapping_add(b)))
            );
            prop_assert_eq!(
                binary(B::Subtract, Value::Int32(a), Value::Int32(b)),
                Ok(Value::Int32(a.wrapping_sub(b)))
            );
            prop_assert_eq!(
                binary(B::Multiply, Value::Int32(a), Value::Int32(b)),
                Ok(Value::Int32(a.wrapping_mul(b)))
            );
        }

        #[test]
        fn uint_arithmetic_wraps(a in any::<u32>(), b in any::<u32>()) {
            prop_assert_eq!(
                binary(B::Add, Value::UInt32(a), Value::UInt32(b)),
                Ok(Value::UInt32(a.wrapping_add(b)))
            );
            prop_assert_eq!(
                binary(B::Multiply, Value::UInt32(a), Value::UInt32(b)),
                Ok(Value::UInt32(a.wrapping_mul(b)))
            );
        }

        #[test]
        fn long_arithmetic_wraps(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(
                binary(B::Multiply, Value::Int64(a), Value::Int64(b)),
                Ok(Value::Int64(a.wrapping_mul(b)))
            );
            prop_assert_eq!(
                binary(B::ExclusiveOr, Value::Int64(a), Value::Int64(b)),
                Ok(Value::Int64(a ^ b))
            );
        }

        #[test]
        fn ulong_multiplication_wraps(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(
                binary(B::Multiply, Value::UInt64(a), Value::UInt64(b)),
                Ok(Value::UInt64(a.wrapping_mul(b)))
            );
        }

        #[test]
        fn shift_counts_are_masked(a in any::<i32>(), s in 0i32..200) {
            prop_assert_eq!(
                binary(B::ShiftLeft, Value::Int32(a), Value::Int32(s)),
                Ok(Value::Int32(a.wrapping_shl(s as u32)))
            );
            prop_assert_eq!(
                binary(B::ShiftRight, Value::Int32(a), Value::Int32(s)),
                Ok(Value::Int32(a.wrapping_shr(s as u32)))
            );
        }

        #[test]
        fn division_truncates(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(b != 0 && !(a == i32::MIN && b == -1));
            prop_assert_eq!(
                binary(B::Divide, Value::Int32(a), Value::Int32(b)),
                Ok(Value::Int32(a / b))
            );
            prop_assert_eq!(
                binary(B::Modulus, Value::Int32(a), Value::Int32(b)),
                Ok(Value::Int32(a % b))
            );
        }
    }
}
