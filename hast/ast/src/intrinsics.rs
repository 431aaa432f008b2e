//! Members implemented by the compiler instead of the program.
use crate::PrimitiveType;
use hast_utils::FullName;

/// The type giving programs access to the memory shared with the host.
pub const SIMPLE_MEMORY_TYPE: &str = "Hast.Transformer.SimpleMemory.SimpleMemory";

/// The type providing the integer square root.
pub const INTEGER_MATH_TYPE: &str = "Hast.Algorithms.IntegerMath";

/// Element types the memory can be read and written as.
const MEMORY_CELL_TYPES: [PrimitiveType; 3] = [
    PrimitiveType::UInt32,
    PrimitiveType::Int32,
    PrimitiveType::Boolean,
];

/// A call the compiler lowers itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `Read<T>(cellIndex)`
    MemoryRead(PrimitiveType),
    /// `Write<T>(cellIndex, value)`
    MemoryWrite(PrimitiveType),
    /// `Sqrt(x)` over an unsigned integer.
    SquareRoot(PrimitiveType),
}

fn short_type_name(ty: PrimitiveType) -> &'static str {
    ty.full_name().trim_start_matches("System.")
}

impl Intrinsic {
    /// Recognize an intrinsic by the full name of the invoked member.
    pub fn from_member(member: &FullName) -> Option<Intrinsic> {
        let declaring = member.declaring_type()?;
        let name = member.as_str();
        let rest = &name[declaring.as_str().len() + 2..];
        let (method, args) = rest.split_once('(')?;
        let args = args.strip_suffix(')')?;
        match declaring.as_str() {
            SIMPLE_MEMORY_TYPE => MEMORY_CELL_TYPES.iter().find_map(|ty| {
                let short = short_type_name(*ty);
                if method.strip_prefix("Read") == Some(short)
                    && args == "System.Int32"
                {
                    Some(Intrinsic::MemoryRead(*ty))
                } else if method.strip_prefix("Write") == Some(short)
                    && args == format!("System.Int32,{}", ty.full_name())
                {
                    Some(Intrinsic::MemoryWrite(*ty))
                } else {
                    None
                }
            }),
            INTEGER_MATH_TYPE if method == "Sqrt" => {
                let ty = PrimitiveType::from_full_name(args)?;
                (ty.is_integral() && !ty.is_signed())
                    .then_some(Intrinsic::SquareRoot(ty))
            }
            _ => None,
        }
    }

    /// Full name of the member implementing the intrinsic.
    pub fn member_name(&self) -> FullName {
        match self {
            Intrinsic::MemoryRead(ty) => FullName::new(format!(
                "{SIMPLE_MEMORY_TYPE}::Read{}(System.Int32)",
                short_type_name(*ty)
            )),
            Intrinsic::MemoryWrite(ty) => FullName::new(format!(
                "{SIMPLE_MEMORY_TYPE}::Write{}(System.Int32,{})",
                short_type_name(*ty),
                ty.full_name()
            )),
            Intrinsic::SquareRoot(ty) => FullName::new(format!(
                "{INTEGER_MATH_TYPE}::Sqrt({})",
                ty.full_name()
            )),
        }
    }

    pub fn is_memory_access(&self) -> bool {
        matches!(self, Intrinsic::MemoryRead(_) | Intrinsic::MemoryWrite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_intrinsics() {
        for intrinsic in [
            Intrinsic::MemoryRead(PrimitiveType::UInt32),
            Intrinsic::MemoryWrite(PrimitiveType::Int32),
            Intrinsic::SquareRoot(PrimitiveType::UInt64),
        ] {
            assert_eq!(
                Intrinsic::from_member(&intrinsic.member_name()),
                Some(intrinsic)
            );
        }
        assert_eq!(
            Intrinsic::from_member(&FullName::new(
                "Hast.Algorithms.IntegerMath::Sqrt(System.Int32)"
            )),
            None
        );
        assert_eq!(
            Intrinsic::from_member(&FullName::new("Samples.A::Read()")),
            None
        );
    }
}
