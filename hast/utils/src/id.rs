use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use symbol_table::GlobalSymbol;

/// Represents an interned string.
///
/// Comparison and hashing are cheap because they operate on the interned
/// symbol. Ordering uses the underlying string so that sorted collections of
/// [Id]s never depend on the order in which strings were interned.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    id: GlobalSymbol,
}

impl Id {
    pub fn new(name: impl AsRef<str>) -> Self {
        Id {
            id: GlobalSymbol::from(name.as_ref()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(Id::new(s))
    }
}

/// The stable, unique name of a declaration in the program model: namespace,
/// type, member and signature, e.g. `Samples.Prime::IsPrime(System.UInt32)`.
///
/// Nested declarations (parameters, locals, the return slot) append
/// `::<name>` to the name of their member.
/// The type is opaque so that full names are never confused with other
/// strings flowing through the compiler.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FullName(Id);

/// Name of a value holder: local, field, property, parameter or return slot.
pub type HolderName = FullName;

/// Separator between a member's full name and its nested declarations.
const NESTING_SEPARATOR: &str = "::";

impl FullName {
    pub fn new(name: impl AsRef<str>) -> Self {
        FullName(Id::new(name))
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    pub fn id(&self) -> Id {
        self.0
    }

    /// Name of a declaration nested in this one.
    pub fn nested(&self, name: &str) -> FullName {
        FullName::new(format!("{}{NESTING_SEPARATOR}{name}", self.as_str()))
    }

    /// The full name of the return slot of the member named `self`.
    pub fn return_slot(&self) -> FullName {
        self.nested("return")
    }

    /// Returns the part of `self` that follows the full name of `parent`, or
    /// the whole name if `self` isn't nested inside `parent`.
    pub fn relative_to(&self, parent: &FullName) -> &'static str {
        let name = self.as_str();
        name.strip_prefix(parent.as_str())
            .and_then(|rest| rest.strip_prefix(NESTING_SEPARATOR))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(name)
    }

    /// Name of the type declaring the member named `self`, if `self` is a
    /// member name.
    pub fn declaring_type(&self) -> Option<FullName> {
        let name = self.as_str();
        let signature_start = name.find('(').unwrap_or(name.len());
        name[..signature_start]
            .rfind(NESTING_SEPARATOR)
            .map(|idx| FullName::new(&name[..idx]))
    }

    /// The part of the name following the last separator outside of the
    /// signature, e.g. `number` for `A::M(System.UInt32)::number`.
    pub fn last_segment(&self) -> &'static str {
        let name = self.as_str();
        let signature_end = name.rfind(')').map(|idx| idx + 1).unwrap_or(0);
        name[signature_end..]
            .rfind(NESTING_SEPARATOR)
            .map(|idx| &name[signature_end + idx + NESTING_SEPARATOR.len()..])
            .unwrap_or(name)
    }

    /// Does the name start with the given prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }
}

impl std::fmt::Display for FullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for FullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FullName({:?})", self.as_str())
    }
}

impl From<&str> for FullName {
    fn from(s: &str) -> Self {
        FullName::new(s)
    }
}

impl From<String> for FullName {
    fn from(s: String) -> Self {
        FullName::new(s)
    }
}

/// A trait representing something in the program model that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> FullName;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_names() {
        let member = FullName::new("Samples.Prime::IsPrime(System.UInt32)");
        let number = member.nested("number");
        assert_eq!(number.as_str(), "Samples.Prime::IsPrime(System.UInt32)::number");
        assert_eq!(number.relative_to(&member), "number");
        assert_eq!(member.return_slot().relative_to(&member), "return");
        assert_eq!(
            member.declaring_type(),
            Some(FullName::new("Samples.Prime"))
        );
    }

    #[test]
    fn declaring_type_ignores_signature_separators() {
        let member = FullName::new("A.B::M(A.B::Nested)");
        assert_eq!(member.declaring_type(), Some(FullName::new("A.B")));
        assert_eq!(FullName::new("NoMember").declaring_type(), None);
    }

    #[test]
    fn last_segment() {
        let local = FullName::new("A::M(B::C)::x");
        assert_eq!(local.last_segment(), "x");
        assert_eq!(FullName::new("A::field").last_segment(), "field");
        assert_eq!(FullName::new("A::M(B::C)").last_segment(), "A::M(B::C)");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let b = Id::new("zeta-interned-first");
        let a = Id::new("alpha-interned-second");
        assert!(a < b);
    }
}
