use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// The primitive types a value can have.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
pub enum PrimitiveType {
    #[strum(serialize = "System.Boolean")]
    Boolean,
    #[strum(serialize = "System.Char")]
    Char,
    #[strum(serialize = "System.SByte")]
    SByte,
    #[strum(serialize = "System.Byte")]
    Byte,
    #[strum(serialize = "System.Int16")]
    Int16,
    #[strum(serialize = "System.UInt16")]
    UInt16,
    #[strum(serialize = "System.Int32")]
    Int32,
    #[strum(serialize = "System.UInt32")]
    UInt32,
    #[strum(serialize = "System.Int64")]
    Int64,
    #[strum(serialize = "System.UInt64")]
    UInt64,
    #[strum(serialize = "System.Single")]
    Single,
    #[strum(serialize = "System.Double")]
    Double,
}

impl PrimitiveType {
    /// The full name of the type, e.g. `System.Int32`.
    pub fn full_name(&self) -> &'static str {
        self.into()
    }

    pub fn from_full_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn size_bits(&self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte | Self::Byte => 8,
            Self::Char | Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 | Self::Single => 32,
            Self::Int64 | Self::UInt64 | Self::Double => 64,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Single
                | Self::Double
        )
    }

    /// Integer types, including `char`.
    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::Boolean | Self::Single | Self::Double)
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Self::Single | Self::Double)
    }

    /// The value a holder of this type has before its first write.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Boolean => Value::Boolean(false),
            Self::Single => Value::Single(0.0),
            Self::Double => Value::Double(0.0),
            ty => Value::from_integer(*ty, 0),
        }
    }
}

/// A compile-time literal.
///
/// Floating point values compare and hash by their bit pattern so literals
/// can be used as keys.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Char(u16),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
}

impl Value {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Char(_) => PrimitiveType::Char,
            Value::SByte(_) => PrimitiveType::SByte,
            Value::Byte(_) => PrimitiveType::Byte,
            Value::Int16(_) => PrimitiveType::Int16,
            Value::UInt16(_) => PrimitiveType::UInt16,
            Value::Int32(_) => PrimitiveType::Int32,
            Value::UInt32(_) => PrimitiveType::UInt32,
            Value::Int64(_) => PrimitiveType::Int64,
            Value::UInt64(_) => PrimitiveType::UInt64,
            Value::Single(_) => PrimitiveType::Single,
            Value::Double(_) => PrimitiveType::Double,
        }
    }

    /// Truncates `value` to the width of `ty`, wrapping around like an
    /// unchecked conversion does. `ty` must be an integral type; booleans
    /// become `value != 0` and floats are converted.
    pub fn from_integer(ty: PrimitiveType, value: i128) -> Value {
        match ty {
            PrimitiveType::Boolean => Value::Boolean(value != 0),
            PrimitiveType::Char => Value::Char(value as u16),
            PrimitiveType::SByte => Value::SByte(value as i8),
            PrimitiveType::Byte => Value::Byte(value as u8),
            PrimitiveType::Int16 => Value::Int16(value as i16),
            PrimitiveType::UInt16 => Value::UInt16(value as u16),
            PrimitiveType::Int32 => Value::Int32(value as i32),
            PrimitiveType::UInt32 => Value::UInt32(value as u32),
            PrimitiveType::Int64 => Value::Int64(value as i64),
            PrimitiveType::UInt64 => Value::UInt64(value as u64),
            PrimitiveType::Single => Value::Single(value as f32),
            PrimitiveType::Double => Value::Double(value as f64),
        }
    }

    /// The value of an integral literal, `None` for booleans and floats.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Char(v) => Some(v as i128),
            Value::SByte(v) => Some(v as i128),
            Value::Byte(v) => Some(v as i128),
            Value::Int16(v) => Some(v as i128),
            Value::UInt16(v) => Some(v as i128),
            Value::Int32(v) => Some(v as i128),
            Value::UInt32(v) => Some(v as i128),
            Value::Int64(v) => Some(v as i128),
            Value::UInt64(v) => Some(v as i128),
            Value::Boolean(_) | Value::Single(_) | Value::Double(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Single(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    fn bits(&self) -> (PrimitiveType, u64) {
        let bits = match *self {
            Value::Boolean(b) => b as u64,
            Value::Single(v) => v.to_bits() as u64,
            Value::Double(v) => v.to_bits(),
            // Every integral value fits into 64 bits.
            _ => self.as_integer().unwrap_or_default() as u64,
        };
        (self.primitive_type(), bits)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "(char){c}"),
            Value::SByte(v) => write!(f, "(sbyte){v}"),
            Value::Byte(v) => write!(f, "(byte){v}"),
            Value::Int16(v) => write!(f, "(short){v}"),
            Value::UInt16(v) => write!(f, "(ushort){v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}u"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::UInt64(v) => write!(f, "{v}UL"),
            Value::Single(v) => write!(f, "{v:?}f"),
            Value::Double(v) => write!(f, "{v:?}d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        use strum::IntoEnumIterator;
        for ty in PrimitiveType::iter() {
            assert_eq!(PrimitiveType::from_full_name(ty.full_name()), Some(ty));
        }
        assert_eq!(PrimitiveType::from_full_name("System.String"), None);
    }

    #[test]
    fn integer_conversion_wraps() {
        assert_eq!(
            Value::from_integer(PrimitiveType::Byte, 300),
            Value::Byte(44)
        );
        assert_eq!(
            Value::from_integer(PrimitiveType::Int32, u32::MAX as i128),
            Value::Int32(-1)
        );
    }

    #[test]
    fn equality_is_typed() {
        assert_ne!(Value::Int32(1), Value::UInt32(1));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }
}
