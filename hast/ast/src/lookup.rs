//! Indices from full names to declarations of the program.
//!
//! The tables own summaries of the declarations instead of borrowing the
//! [Program], so they stay usable while passes rewrite member bodies.
use crate::{
    FieldDeclaration, ParameterDeclaration, Program, TypeKind, TypeReference,
};
use hast_utils::FullName;
use std::collections::BTreeMap;

/// What the compiler needs to know about a type.
#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub name: FullName,
    pub kind: TypeKind,
    pub is_intrinsic: bool,
    /// Fields of types with hardware entry members are written by the host.
    pub declares_hardware_entry: bool,
    pub fields: Vec<FieldDeclaration>,
    pub members: Vec<FullName>,
}

/// Full name to type declaration.
#[derive(Clone, Debug, Default)]
pub struct TypeDeclarationLookupTable {
    types: BTreeMap<FullName, TypeInfo>,
    /// Field name to the name of the declaring type.
    field_owners: BTreeMap<FullName, FullName>,
}

impl TypeDeclarationLookupTable {
    pub fn build(program: &Program) -> Self {
        let mut table = Self::default();
        for ty in &program.types {
            for field in &ty.fields {
                table.field_owners.insert(field.name, ty.name);
            }
            table.types.insert(
                ty.name,
                TypeInfo {
                    name: ty.name,
                    kind: ty.kind,
                    is_intrinsic: ty.is_intrinsic,
                    declares_hardware_entry: ty.declares_hardware_entry(),
                    fields: ty.fields.clone(),
                    members: ty.members.iter().map(|m| m.name).collect(),
                },
            );
        }
        table
    }

    pub fn get(&self, name: &FullName) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Is the type declared by the program, as opposed to an opaque or
    /// intrinsic type.
    pub fn is_in_program(&self, name: &FullName) -> bool {
        self.get(name).is_some_and(|t| !t.is_intrinsic)
    }

    /// The type declaring the field.
    pub fn field_owner(&self, field: &FullName) -> Option<&TypeInfo> {
        self.field_owners.get(field).and_then(|ty| self.get(ty))
    }

    pub fn field(&self, field: &FullName) -> Option<&FieldDeclaration> {
        self.field_owner(field)
            .and_then(|ty| ty.fields.iter().find(|f| f.name == *field))
    }

    /// All fields in the program, sorted by name.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDeclaration> {
        self.field_owners.keys().filter_map(|f| self.field(f))
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }
}

/// What callers need to know about a member.
#[derive(Clone, Debug)]
pub struct MemberSignature {
    pub name: FullName,
    pub declaring_type: FullName,
    pub parameters: Vec<ParameterDeclaration>,
    pub return_type: TypeReference,
    /// The member or its type is intrinsic.
    pub is_intrinsic: bool,
    pub is_hardware_entry: bool,
    pub is_inlinable: bool,
    pub is_static: bool,
    pub has_body: bool,
}

impl MemberSignature {
    /// Members whose body is never inlined or transformed.
    pub fn is_opaque(&self) -> bool {
        self.is_intrinsic || !self.has_body
    }
}

/// Full name to member declaration.
#[derive(Clone, Debug, Default)]
pub struct MemberLookupTable {
    members: BTreeMap<FullName, MemberSignature>,
}

impl MemberLookupTable {
    pub fn build(program: &Program) -> Self {
        let members = program
            .types
            .iter()
            .flat_map(|ty| {
                ty.members.iter().map(move |m| {
                    let sig = MemberSignature {
                        name: m.name,
                        declaring_type: ty.name,
                        parameters: m.parameters.clone(),
                        return_type: m.return_type.clone(),
                        is_intrinsic: m.is_intrinsic || ty.is_intrinsic,
                        is_hardware_entry: m.is_hardware_entry,
                        is_inlinable: m.is_inlinable,
                        is_static: m.is_static,
                        has_body: m.body.is_some(),
                    };
                    (m.name, sig)
                })
            })
            .collect::<BTreeMap<_, _>>();
        log::debug!("Indexed {} members.", members.len());
        MemberLookupTable { members }
    }

    pub fn get(&self, name: &FullName) -> Option<&MemberSignature> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &FullName) -> bool {
        self.members.contains_key(name)
    }

    /// Members without a body in the program count as opaque.
    pub fn is_opaque(&self, name: &FullName) -> bool {
        self.get(name).map_or(true, |m| m.is_opaque())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberSignature> {
        self.members.values()
    }
}

/// Both tables, built together.
#[derive(Clone, Debug, Default)]
pub struct LookupTables {
    pub types: TypeDeclarationLookupTable,
    pub members: MemberLookupTable,
}

impl LookupTables {
    pub fn build(program: &Program) -> Self {
        LookupTables {
            types: TypeDeclarationLookupTable::build(program),
            members: MemberLookupTable::build(program),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, MemberDeclaration, TypeDeclaration};

    #[test]
    fn intrinsic_types_make_members_opaque() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut memory = TypeDeclaration::new(FullName::new("Memory"));
        memory.is_intrinsic = true;
        let mut read =
            MemberDeclaration::new(FullName::new("Memory::Read()"), TypeReference::Void);
        read.body = Some(Block::default());
        memory.members.push(read);

        let mut user = TypeDeclaration::new(FullName::new("User"));
        let mut run =
            MemberDeclaration::new(FullName::new("User::Run()"), TypeReference::Void);
        run.body = Some(Block::default());
        run.is_hardware_entry = true;
        user.members.push(run);

        let program = Program::new(vec![memory, user]);
        let tables = LookupTables::build(&program);
        assert!(tables.members.is_opaque(&FullName::new("Memory::Read()")));
        assert!(!tables.members.is_opaque(&FullName::new("User::Run()")));
        assert!(tables.members.is_opaque(&FullName::new("Missing::M()")));
        assert!(tables.types.is_in_program(&FullName::new("User")));
        assert!(!tables.types.is_in_program(&FullName::new("Memory")));
        assert!(
            tables
                .types
                .get(&FullName::new("User"))
                .unwrap()
                .declares_hardware_entry
        );
    }
}
