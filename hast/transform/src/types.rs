//! Hardware representation of the types of the program and the conversions
//! between them.
use hast_ast::{
    intrinsics::SIMPLE_MEMORY_TYPE, KnownTypeKind, KnownTypeLookupTable,
    PrimitiveType, TypeReference, Value,
};
use hast_utils::FullName;
use hast_vhdl::{DataType, VhdlExpression, VhdlValue};

/// A value that fits into one data object without being an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Boolean,
    Integer { width: u32, signed: bool },
}

impl Scalar {
    pub const INT32: Scalar = Scalar::Integer {
        width: 32,
        signed: true,
    };
    pub const UINT32: Scalar = Scalar::Integer {
        width: 32,
        signed: false,
    };

    /// `None` for floating point and non-primitive types.
    pub fn of(ty: &TypeReference) -> Option<Scalar> {
        let known = KnownTypeLookupTable::global().lookup(ty)?;
        match known.kind {
            KnownTypeKind::Boolean => Some(Scalar::Boolean),
            KnownTypeKind::Integer | KnownTypeKind::Character => {
                Some(Scalar::Integer {
                    width: known.size_bits,
                    signed: known.signed,
                })
            }
            KnownTypeKind::FloatingPoint | KnownTypeKind::Void => None,
        }
    }

    pub fn of_primitive(ty: PrimitiveType) -> Option<Scalar> {
        Scalar::of(&TypeReference::primitive(ty))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Boolean => DataType::Boolean,
            Scalar::Integer {
                width,
                signed: true,
            } => DataType::Signed(*width),
            Scalar::Integer {
                width,
                signed: false,
            } => DataType::Unsigned(*width),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Scalar::Boolean => 1,
            Scalar::Integer { width, .. } => *width,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Scalar::Integer { signed: true, .. })
    }

    /// The type arithmetic on a single operand of this type is done in:
    /// anything narrower than 32 bits becomes an `int`.
    pub fn promote(&self) -> Scalar {
        match *self {
            Scalar::Integer { width, signed } if width >= 32 => {
                Scalar::Integer { width, signed }
            }
            _ => Scalar::INT32,
        }
    }

    /// The common type of the operands of a binary arithmetic operator.
    pub fn promote_binary(left: Scalar, right: Scalar) -> Scalar {
        const LONG: Scalar = Scalar::Integer {
            width: 64,
            signed: true,
        };
        const ULONG: Scalar = Scalar::Integer {
            width: 64,
            signed: false,
        };
        let (l, r) = (left.promote(), right.promote());
        if l.width() == 64 || r.width() == 64 {
            let unsigned = (l == ULONG && !right.is_signed())
                || (r == ULONG && !left.is_signed());
            return if unsigned { ULONG } else { LONG };
        }
        match (l == Scalar::UINT32, r == Scalar::UINT32) {
            (true, true) => Scalar::UINT32,
            // A `uint` meeting a signed operand needs 64 bits.
            (true, false) if right.is_signed() => LONG,
            (false, true) if left.is_signed() => LONG,
            (true, false) | (false, true) => Scalar::UINT32,
            (false, false) => Scalar::INT32,
        }
    }
}

/// How a value holder is represented in hardware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HardwareType {
    Scalar(Scalar),
    Array {
        /// The element type as written in the program.
        element_name: String,
        element: Scalar,
        length: u32,
    },
}

impl HardwareType {
    /// The representation of a holder of type `ty`. Arrays need the length
    /// determined for the holder.
    pub fn of(ty: &TypeReference, length: Option<u32>) -> Option<HardwareType> {
        match ty {
            TypeReference::Array(element) => {
                let scalar = Scalar::of(element)?;
                Some(HardwareType::Array {
                    element_name: element.to_string(),
                    element: scalar,
                    length: length?,
                })
            }
            other => Scalar::of(other).map(HardwareType::Scalar),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            HardwareType::Scalar(s) => s.data_type(),
            HardwareType::Array {
                element_name,
                element,
                length,
            } => DataType::Array {
                name: format!("{element_name}[{length}]"),
                element: Box::new(element.data_type()),
                length: *length,
            },
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            HardwareType::Scalar(s) => Some(*s),
            HardwareType::Array { .. } => None,
        }
    }
}

/// Holders of this type stand for the memory shared with the host and have
/// no hardware of their own.
pub fn is_memory_type(ty: &TypeReference) -> bool {
    *ty == TypeReference::Named(FullName::new(SIMPLE_MEMORY_TYPE))
}

/// The hardware literal of a program literal. `None` for floating point
/// values.
pub fn literal(value: &Value) -> Option<(VhdlValue, Scalar)> {
    if let Some(b) = value.as_bool() {
        return Some((VhdlValue::Boolean(b), Scalar::Boolean));
    }
    let scalar = Scalar::of_primitive(value.primitive_type())?;
    let int = value.as_integer()?;
    Some((VhdlValue::from_integer(int, scalar.width()), scalar))
}

/// The integer a bit string of `width` bits stands for.
pub fn bits_value(value: u128, width: u32, signed: bool) -> i128 {
    if signed && width > 0 && width < 128 && (value >> (width - 1)) & 1 == 1 {
        value as i128 - (1i128 << width)
    } else {
        value as i128
    }
}

pub fn resize(expr: VhdlExpression, width: u32) -> VhdlExpression {
    VhdlExpression::call("resize", vec![expr, VhdlExpression::Integer(width as i64)])
}

pub fn as_signed(expr: VhdlExpression) -> VhdlExpression {
    VhdlExpression::call("signed", vec![expr])
}

pub fn as_unsigned(expr: VhdlExpression) -> VhdlExpression {
    VhdlExpression::call("unsigned", vec![expr])
}

/// Keep the low `width` bits of `expr`, a vector of the signedness of `to`.
/// Narrowing a signed vector with `resize` would keep its sign bit.
pub fn truncate(expr: VhdlExpression, to: Scalar) -> VhdlExpression {
    if to.is_signed() {
        as_signed(resize(as_unsigned(expr), to.width()))
    } else {
        resize(expr, to.width())
    }
}

/// Convert `expr` of type `from` to `to` the way an unchecked cast does.
/// Booleans don't convert to or from integers.
pub fn convert(expr: VhdlExpression, from: Scalar, to: Scalar) -> Option<VhdlExpression> {
    if from == to {
        return Some(expr);
    }
    if let (
        VhdlExpression::Value(VhdlValue::Bits { value, width }),
        Scalar::Integer { signed, .. },
        Scalar::Integer { width: to_width, .. },
    ) = (&expr, from, to)
    {
        // Literals have no type of their own in a conversion.
        return Some(VhdlValue::from_integer(bits_value(*value, *width, signed), to_width).into());
    }
    let (
        Scalar::Integer {
            width: fw,
            signed: fs,
        },
        Scalar::Integer {
            width: tw,
            signed: ts,
        },
    ) = (from, to)
    else {
        return None;
    };
    let retype = |e: VhdlExpression| match (fs, ts) {
        (true, false) => as_unsigned(e),
        (false, true) => as_signed(e),
        _ => e,
    };
    Some(if tw > fw {
        // Extend in the source signedness first.
        retype(resize(expr, tw))
    } else if tw < fw {
        let low = if fs {
            resize(as_unsigned(expr), tw)
        } else {
            resize(expr, tw)
        };
        if ts {
            as_signed(low)
        } else {
            low
        }
    } else {
        retype(expr)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_vhdl::{DataObjectReference, VhdlGenerationOptions, VhdlWriter};

    fn int(width: u32, signed: bool) -> Scalar {
        Scalar::Integer { width, signed }
    }

    #[test]
    fn binary_promotion() {
        assert_eq!(Scalar::promote_binary(int(8, false), int(16, true)), Scalar::INT32);
        assert_eq!(Scalar::promote_binary(Scalar::UINT32, int(8, false)), Scalar::UINT32);
        assert_eq!(Scalar::promote_binary(int(16, false), Scalar::UINT32), Scalar::UINT32);
        assert_eq!(Scalar::promote_binary(Scalar::UINT32, Scalar::INT32), int(64, true));
        assert_eq!(Scalar::promote_binary(int(64, false), Scalar::UINT32), int(64, false));
        assert_eq!(Scalar::promote_binary(int(64, true), Scalar::UINT32), int(64, true));
    }

    #[test]
    fn primitive_mapping() {
        let uint = TypeReference::primitive(PrimitiveType::UInt32);
        assert_eq!(HardwareType::of(&uint, None).unwrap().data_type(), DataType::Unsigned(32));
        let double = TypeReference::primitive(PrimitiveType::Double);
        assert_eq!(HardwareType::of(&double, None), None);
        let array = TypeReference::array_of(uint);
        assert_eq!(HardwareType::of(&array, None), None);
        let DataType::Array { name, length, .. } =
            HardwareType::of(&array, Some(4)).unwrap().data_type()
        else {
            panic!("not an array")
        };
        assert_eq!(name, "System.UInt32[4]");
        assert_eq!(length, 4);
    }

    #[test]
    fn conversions_render() {
        let options = VhdlGenerationOptions::default();
        let w = VhdlWriter::new(&options);
        let x = || VhdlExpression::from(DataObjectReference::variable("x"));
        let narrow = convert(x(), Scalar::INT32, int(8, true)).unwrap();
        assert_eq!(narrow.inline(&w), "signed(resize(unsigned(\\x\\), 8))");
        let widen = convert(x(), int(8, false), Scalar::INT32).unwrap();
        assert_eq!(widen.inline(&w), "signed(resize(\\x\\, 32))");
        assert_eq!(convert(x(), Scalar::Boolean, Scalar::INT32), None);
        let minus_one = VhdlExpression::from(VhdlValue::from_integer(-1, 8));
        assert_eq!(
            convert(minus_one, int(8, true), Scalar::INT32).unwrap(),
            VhdlExpression::from(VhdlValue::from_integer(-1, 32))
        );
        assert_eq!(
            convert(x(), Scalar::INT32, Scalar::INT32).unwrap().inline(&w),
            "\\x\\"
        );
    }

    #[test]
    fn literals() {
        let (value, scalar) = literal(&Value::Int16(-2)).unwrap();
        assert_eq!(scalar, int(16, true));
        assert_eq!(value, VhdlValue::Bits { value: 0xfffe, width: 16 });
        assert!(literal(&Value::Single(1.0)).is_none());
    }
}
