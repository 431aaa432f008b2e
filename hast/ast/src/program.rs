use crate::{Block, PrimitiveType};
use hast_utils::{Error, FullName, GetName, HastResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How an argument is passed to a parameter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ParameterMode {
    #[default]
    Value,
    Ref,
    Out,
}

impl ParameterMode {
    /// Passing the argument hands out the address of the holder.
    pub fn takes_address(&self) -> bool {
        !matches!(self, ParameterMode::Value)
    }
}

/// The type of a holder or expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeReference {
    Void,
    Named(FullName),
    Array(Box<TypeReference>),
}

impl TypeReference {
    pub fn primitive(ty: PrimitiveType) -> Self {
        TypeReference::Named(FullName::new(ty.full_name()))
    }

    pub fn array_of(element: TypeReference) -> Self {
        TypeReference::Array(Box::new(element))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeReference::Named(name) => {
                PrimitiveType::from_full_name(name.as_str())
            }
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&TypeReference> {
        match self {
            TypeReference::Array(element) => Some(element),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeReference::Void => write!(f, "System.Void"),
            TypeReference::Named(name) => write!(f, "{name}"),
            TypeReference::Array(element) => write!(f, "{element}[]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: FullName,
    pub ty: TypeReference,
    #[serde(default)]
    pub mode: ParameterMode,
}

/// A field, or the backing storage of an auto-property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: FullName,
    pub ty: TypeReference,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_property: bool,
    /// The literal the field is initialized with, if it has an initializer.
    #[serde(default)]
    pub initializer: Option<crate::Value>,
}

impl FieldDeclaration {
    /// The value the field holds before any write in the program.
    pub fn initial_value(&self) -> Option<crate::Value> {
        self.initializer
            .or_else(|| self.ty.as_primitive().map(|p| p.default_value()))
    }
}

impl GetName for FieldDeclaration {
    fn name(&self) -> FullName {
        self.name
    }
}

/// A method of a type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberDeclaration {
    pub name: FullName,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    pub return_type: TypeReference,
    /// `None` for members implemented outside of the program.
    #[serde(default)]
    pub body: Option<Block>,
    /// The member is a primitive of the compiler and its body is never
    /// inlined or transformed.
    #[serde(default)]
    pub is_intrinsic: bool,
    /// The member is called from the host.
    #[serde(default)]
    pub is_hardware_entry: bool,
    #[serde(default)]
    pub is_inlinable: bool,
    #[serde(default)]
    pub is_static: bool,
}

impl MemberDeclaration {
    pub fn new(name: FullName, return_type: TypeReference) -> Self {
        MemberDeclaration {
            name,
            parameters: vec![],
            return_type,
            body: None,
            is_intrinsic: false,
            is_hardware_entry: false,
            is_inlinable: false,
            is_static: true,
        }
    }

    pub fn returns_value(&self) -> bool {
        self.return_type != TypeReference::Void
    }

    pub fn parameter(&self, name: &FullName) -> Option<&ParameterDeclaration> {
        self.parameters.iter().find(|p| p.name == *name)
    }
}

impl GetName for MemberDeclaration {
    fn name(&self) -> FullName {
        self.name
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum TypeKind {
    #[default]
    Class,
    Struct,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: FullName,
    #[serde(default)]
    pub kind: TypeKind,
    /// The type is provided by the compiler. None of its members are
    /// transformed.
    #[serde(default)]
    pub is_intrinsic: bool,
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
    #[serde(default)]
    pub members: Vec<MemberDeclaration>,
}

impl TypeDeclaration {
    pub fn new(name: FullName) -> Self {
        TypeDeclaration {
            name,
            kind: TypeKind::Class,
            is_intrinsic: false,
            fields: vec![],
            members: vec![],
        }
    }

    /// Fields of such types are written by the host.
    pub fn declares_hardware_entry(&self) -> bool {
        self.members.iter().any(|m| m.is_hardware_entry)
    }
}

impl GetName for TypeDeclaration {
    fn name(&self) -> FullName {
        self.name
    }
}

/// The whole program, as produced by the front end.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub types: Vec<TypeDeclaration>,
}

impl Program {
    pub fn new(types: Vec<TypeDeclaration>) -> Self {
        Program { types }
    }

    pub fn from_json(json: &str) -> HastResult<Program> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> HastResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Merge several programs into one, sorted by type name. Types present
    /// in several programs must be identical.
    pub fn merge<I: IntoIterator<Item = Program>>(
        programs: I,
    ) -> HastResult<Program> {
        let mut types = programs
            .into_iter()
            .flat_map(|p| p.types)
            .sorted_by_key(|t| t.name)
            .collect_vec();
        let mut merged: Vec<TypeDeclaration> = Vec::with_capacity(types.len());
        for ty in types.drain(..) {
            match merged.last() {
                Some(prev) if prev.name == ty.name => {
                    log::trace!("`{}' is declared by several images.", ty.name);
                    if *prev != ty {
                        return Err(Error::malformed_program(format!(
                            "The type `{}' is declared differently by two program images.",
                            ty.name
                        )));
                    }
                }
                _ => merged.push(ty),
            }
        }
        log::debug!("Merged programs declaring {} types.", merged.len());
        Ok(Program { types: merged })
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberDeclaration> {
        self.types.iter().flat_map(|t| t.members.iter())
    }

    pub fn members_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut MemberDeclaration> {
        self.types.iter_mut().flat_map(|t| t.members.iter_mut())
    }

    pub fn member(&self, name: &FullName) -> Option<&MemberDeclaration> {
        self.members().find(|m| m.name == *name)
    }

    pub fn member_mut(
        &mut self,
        name: &FullName,
    ) -> Option<&mut MemberDeclaration> {
        self.members_mut().find(|m| m.name == *name)
    }

    pub fn hardware_entry_members(
        &self,
    ) -> impl Iterator<Item = &MemberDeclaration> {
        self.members().filter(|m| m.is_hardware_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(name: &str, field_count: usize) -> TypeDeclaration {
        let mut decl = TypeDeclaration::new(FullName::new(name));
        decl.fields = (0..field_count)
            .map(|i| FieldDeclaration {
                name: FullName::new(format!("{name}::f{i}")),
                ty: TypeReference::primitive(PrimitiveType::Int32),
                is_static: true,
                is_property: false,
                initializer: None,
            })
            .collect();
        decl
    }

    #[test]
    fn merge_sorts_and_deduplicates() {
        let _ = env_logger::builder().is_test(true).try_init();
        let first = Program::new(vec![ty("B", 0), ty("Shared", 1)]);
        let second = Program::new(vec![ty("Shared", 1), ty("A", 0)]);
        let merged = Program::merge([first, second]).unwrap();
        let names = merged.types.iter().map(|t| t.name.as_str()).collect_vec();
        assert_eq!(names, vec!["A", "B", "Shared"]);
    }

    #[test]
    fn merge_rejects_conflicting_types() {
        let first = Program::new(vec![ty("Shared", 1)]);
        let second = Program::new(vec![ty("Shared", 2)]);
        assert!(Program::merge([first, second]).is_err());
    }

    #[test]
    fn json_interchange() {
        let json = r#"{
            "types": [{
                "name": "Samples.Counter",
                "fields": [{
                    "name": "Samples.Counter::Step",
                    "ty": {"Named": "System.Int32"},
                    "is_static": true,
                    "initializer": {"Int32": 2}
                }],
                "members": [{
                    "name": "Samples.Counter::Next(System.Int32)",
                    "parameters": [{
                        "name": "Samples.Counter::Next(System.Int32)::x",
                        "ty": {"Named": "System.Int32"}
                    }],
                    "return_type": {"Named": "System.Int32"},
                    "is_hardware_entry": true,
                    "body": {"statements": [
                        {"Return": {"Binary": {
                            "operator": "Add",
                            "left": {"Parameter": "Samples.Counter::Next(System.Int32)::x"},
                            "right": {"Field": {"field": "Samples.Counter::Step", "target": null}}
                        }}}
                    ]}
                }]
            }]
        }"#;
        let program = Program::from_json(json).unwrap();
        let member = program
            .member(&FullName::new("Samples.Counter::Next(System.Int32)"))
            .unwrap();
        assert!(member.is_hardware_entry);
        assert_eq!(member.parameters[0].mode, ParameterMode::Value);
        assert_eq!(
            program.types[0].fields[0].initial_value(),
            Some(crate::Value::Int32(2))
        );
        let again = Program::from_json(&program.to_json().unwrap()).unwrap();
        assert_eq!(program, again);
    }
}
