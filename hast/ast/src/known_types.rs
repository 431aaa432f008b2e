use crate::{PrimitiveType, TypeReference};
use hast_utils::FullName;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Broad category of a well-known type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownTypeKind {
    Boolean,
    Character,
    Integer,
    FloatingPoint,
    Void,
}

/// Semantic information about a well-known type used to pick its hardware
/// representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KnownType {
    pub size_bits: u32,
    pub signed: bool,
    pub kind: KnownTypeKind,
    /// `None` for `System.Void`.
    pub primitive: Option<PrimitiveType>,
}

/// Maps the full names of well-known types to their [KnownType].
pub struct KnownTypeLookupTable {
    types: BTreeMap<FullName, KnownType>,
}

lazy_static! {
    static ref KNOWN_TYPES: KnownTypeLookupTable = KnownTypeLookupTable::new();
}

impl KnownTypeLookupTable {
    fn new() -> Self {
        let mut types: BTreeMap<FullName, KnownType> = PrimitiveType::iter()
            .map(|ty| {
                let kind = match ty {
                    PrimitiveType::Boolean => KnownTypeKind::Boolean,
                    PrimitiveType::Char => KnownTypeKind::Character,
                    PrimitiveType::Single | PrimitiveType::Double => {
                        KnownTypeKind::FloatingPoint
                    }
                    _ => KnownTypeKind::Integer,
                };
                let known = KnownType {
                    size_bits: ty.size_bits(),
                    signed: ty.is_signed(),
                    kind,
                    primitive: Some(ty),
                };
                (FullName::new(ty.full_name()), known)
            })
            .collect();
        types.insert(
            FullName::new("System.Void"),
            KnownType {
                size_bits: 0,
                signed: false,
                kind: KnownTypeKind::Void,
                primitive: None,
            },
        );
        KnownTypeLookupTable { types }
    }

    /// The process-wide table.
    pub fn global() -> &'static KnownTypeLookupTable {
        &KNOWN_TYPES
    }

    pub fn get(&self, name: &FullName) -> Option<&KnownType> {
        self.types.get(name)
    }

    pub fn lookup(&self, ty: &TypeReference) -> Option<&KnownType> {
        match ty {
            TypeReference::Void => self.get(&FullName::new("System.Void")),
            TypeReference::Named(name) => self.get(name),
            TypeReference::Array(_) => None,
        }
    }

    pub fn is_known(&self, name: &FullName) -> bool {
        self.types.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_sizes() {
        let table = KnownTypeLookupTable::global();
        let uint = table.get(&FullName::new("System.UInt32")).unwrap();
        assert_eq!(uint.size_bits, 32);
        assert!(!uint.signed);
        assert_eq!(uint.kind, KnownTypeKind::Integer);
        let void = table.lookup(&TypeReference::Void).unwrap();
        assert_eq!(void.kind, KnownTypeKind::Void);
        assert!(!table.is_known(&FullName::new("Samples.Prime")));
    }
}
