//! Declarations and the arena they are stored in.
use crate::{
    DataObjectDeclaration, DataObjectKind, DataObjectReference, DataType,
    Function, Vhdl, VhdlWriter,
};
use hast_utils::{Error, HastResult};
use std::collections::HashMap;

/// Index of a declaration in its [DeclarationArena].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(u32);

/// `attribute <attribute> of <target>: signal is <value>;`
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSpecification {
    pub attribute: String,
    pub target: DataObjectReference,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    /// Declaration of an enumeration or array type.
    Type(DataType),
    /// `attribute <name>: string;`
    Attribute(String),
    Function(Function),
    DataObject(DataObjectDeclaration),
    AttributeSpecification(AttributeSpecification),
}

impl Declaration {
    /// The identifier the declaration introduces. Attribute specifications
    /// are keyed by attribute and target.
    fn key(&self) -> String {
        match self {
            Declaration::Type(ty) => match ty {
                DataType::Enumeration { name, .. }
                | DataType::Array { name, .. } => name.clone(),
                other => format!("{other:?}"),
            },
            Declaration::Attribute(name) => name.clone(),
            Declaration::Function(f) => f.name.clone(),
            Declaration::DataObject(d) => d.name.clone(),
            Declaration::AttributeSpecification(spec) => {
                format!("{} of {}", spec.attribute, spec.target.name)
            }
        }
    }

    /// Declarations render grouped in this order.
    fn group(&self) -> u8 {
        match self {
            Declaration::Type(_) | Declaration::Attribute(_) => 0,
            Declaration::Function(_) => 1,
            Declaration::DataObject(d) => match d.kind {
                DataObjectKind::Constant => 2,
                DataObjectKind::Signal => 3,
                DataObjectKind::SharedVariable | DataObjectKind::Variable => 4,
            },
            Declaration::AttributeSpecification(_) => 5,
        }
    }
}

impl Vhdl for Declaration {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        match self {
            Declaration::Type(ty) => w.line(format!(
                "type {} is {};",
                ty.inline(w),
                ty.definition(w)
            )),
            Declaration::Attribute(name) => {
                w.line(format!("attribute {}: string;", w.identifier(name)))
            }
            Declaration::Function(f) => f.write_vhdl(w),
            Declaration::DataObject(d) => w.line(d.inline(w)),
            Declaration::AttributeSpecification(spec) => w.line(format!(
                "attribute {} of {}: signal is \"{}\";",
                w.identifier(&spec.attribute),
                w.identifier(&spec.target.name),
                spec.value
            )),
        }
    }
}

/// Owns declarations. Everything else refers to them by [DeclarationId] or
/// by [DataObjectReference].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeclarationArena {
    declarations: Vec<Declaration>,
    index: HashMap<String, DeclarationId>,
}

impl DeclarationArena {
    /// Add a declaration. Declaring the same name again returns the id of the
    /// first declaration if both declare the same thing.
    pub fn add(&mut self, declaration: Declaration) -> HastResult<DeclarationId> {
        let key = declaration.key();
        if let Some(&id) = self.index.get(&key) {
            let existing = &self.declarations[id.0 as usize];
            let compatible = match (existing, &declaration) {
                (Declaration::DataObject(a), Declaration::DataObject(b)) => {
                    a.kind == b.kind && a.ty == b.ty
                }
                (a, b) => a == b,
            };
            return if compatible {
                Ok(id)
            } else {
                Err(Error::invariant(format!(
                    "`{key}' is declared twice with different definitions."
                )))
            };
        }
        let id = DeclarationId(self.declarations.len() as u32);
        self.declarations.push(declaration);
        self.index.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: DeclarationId) -> &Declaration {
        &self.declarations[id.0 as usize]
    }

    pub fn find(&self, name: &str) -> Option<DeclarationId> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// The declarative part of an architecture or process. Renders declarations
/// grouped as types, functions, constants, signals, variables and attribute
/// specifications, each group in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeclarationBlock {
    arena: DeclarationArena,
}

impl DeclarationBlock {
    /// Declare a data object, or get the reference to the existing one of the
    /// same name. Composite types have to be declared separately.
    pub fn data_object(
        &mut self,
        declaration: DataObjectDeclaration,
    ) -> HastResult<DataObjectReference> {
        let reference = declaration.reference();
        self.arena.add(Declaration::DataObject(declaration))?;
        Ok(reference)
    }

    pub fn add(&mut self, declaration: Declaration) -> HastResult<DeclarationId> {
        self.arena.add(declaration)
    }

    /// Add every declaration of `other`, keeping their order.
    pub fn extend(&mut self, other: DeclarationBlock) -> HastResult<()> {
        for declaration in other.arena.declarations {
            self.arena.add(declaration)?;
        }
        Ok(())
    }

    /// Declarations of data objects of the given kind.
    pub fn data_objects(
        &self,
        kind: DataObjectKind,
    ) -> impl Iterator<Item = &DataObjectDeclaration> {
        self.arena.iter().filter_map(move |d| match d {
            Declaration::DataObject(d) if d.kind == kind => Some(d),
            _ => None,
        })
    }

    pub fn arena(&self) -> &DeclarationArena {
        &self.arena
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

impl Vhdl for DeclarationBlock {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        let mut ordered: Vec<&Declaration> = self.arena.iter().collect();
        ordered.sort_by_key(|d| d.group());
        let mut previous = None;
        for declaration in ordered {
            let group = declaration.group();
            if previous.is_some_and(|p| p != group) {
                w.blank();
            }
            previous = Some(group);
            declaration.write_vhdl(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VhdlGenerationOptions;

    fn signal(name: &str) -> DataObjectDeclaration {
        DataObjectDeclaration::new(DataObjectKind::Signal, name, DataType::Boolean)
    }

    #[test]
    fn redeclaration_returns_existing() {
        let mut block = DeclarationBlock::default();
        let first = block.data_object(signal("a")).unwrap();
        let second = block.data_object(signal("a")).unwrap();
        assert_eq!(first, second);
        assert_eq!(block.arena().len(), 1);

        let clash = DataObjectDeclaration::new(
            DataObjectKind::Signal,
            "a",
            DataType::Integer,
        );
        assert!(block.data_object(clash).is_err());
    }

    #[test]
    fn declarations_are_grouped() {
        let mut block = DeclarationBlock::default();
        let state = DataType::Enumeration {
            name: "State".to_string(),
            values: vec!["Idle".to_string(), "Busy".to_string()],
        };
        let s = block.data_object(signal("s")).unwrap();
        block
            .add(Declaration::AttributeSpecification(AttributeSpecification {
                attribute: "dont_touch".to_string(),
                target: s,
                value: "true".to_string(),
            }))
            .unwrap();
        block
            .data_object(
                DataObjectDeclaration::new(
                    DataObjectKind::SharedVariable,
                    "v",
                    state.clone(),
                )
                .with_initial_value(state.default_value()),
            )
            .unwrap();
        block.add(Declaration::Attribute("dont_touch".to_string())).unwrap();
        block.add(Declaration::Type(state.clone())).unwrap();

        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let lines: Vec<String> =
            block.to_vhdl(&options).lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "type \\State\\ is (\\Idle\\, \\Busy\\);",
                "attribute \\dont_touch\\: string;",
                "signal \\s\\: boolean;",
                "shared variable \\v\\: \\State\\ := \\Idle\\;",
                "attribute \\dont_touch\\ of \\s\\: signal is \"true\";",
            ]
        );
    }
}
