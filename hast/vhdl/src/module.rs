use crate::{
    Comment, ConcurrentStatement, DataObjectReference, DataType,
    DeclarationBlock, Vhdl, VhdlWriter,
};
use itertools::Itertools;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortMode {
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Port {
    pub name: String,
    pub mode: PortMode,
    pub ty: DataType,
}

impl Port {
    pub fn new<S: ToString>(name: S, mode: PortMode, ty: DataType) -> Self {
        Port {
            name: name.to_string(),
            mode,
            ty,
        }
    }

    /// Ports are read and driven like signals.
    pub fn reference(&self) -> DataObjectReference {
        DataObjectReference::signal(&self.name)
    }
}

#[derive(Default)]
pub struct Entity {
    pub name: String,
    pub ports: Vec<Port>,
}

impl Vhdl for Entity {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        let name = w.identifier(&self.name);
        w.line(format!("entity {name} is"));
        if !self.ports.is_empty() {
            w.indented(|w| {
                w.line("port (");
                let last = self.ports.len() - 1;
                w.indented(|w| {
                    for (i, port) in self.ports.iter().enumerate() {
                        let mode = match port.mode {
                            PortMode::In => "in",
                            PortMode::Out => "out",
                        };
                        let sep = if i == last { "" } else { ";" };
                        w.line(format!(
                            "{}: {mode} {}{sep}",
                            w.identifier(&port.name),
                            port.ty.inline(w)
                        ));
                    }
                });
                w.line(");");
            });
        }
        w.line(format!("end {name};"));
    }
}

#[derive(Default)]
pub struct Architecture {
    pub name: String,
    pub declarations: DeclarationBlock,
    pub body: Vec<ConcurrentStatement>,
}

/// A design unit: library clauses, an entity and its architecture.
#[derive(Default)]
pub struct Module {
    /// Comments before the library clauses.
    pub header: Vec<Comment>,
    /// Packages made visible with `use`, e.g. `ieee.numeric_std.all`.
    pub libraries: Vec<String>,
    pub entity: Entity,
    pub architecture: Architecture,
}

impl Module {
    pub fn new<S: ToString>(entity_name: S) -> Self {
        Module {
            libraries: vec![
                "ieee.std_logic_1164.all".to_string(),
                "ieee.numeric_std.all".to_string(),
            ],
            entity: Entity {
                name: entity_name.to_string(),
                ports: vec![],
            },
            architecture: Architecture {
                name: "Imp".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl Vhdl for Module {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        self.header.write_vhdl(w);
        w.blank();
        let libraries = self
            .libraries
            .iter()
            .filter_map(|l| l.split('.').next())
            .unique()
            .collect_vec();
        for library in libraries {
            w.line(format!("library {library};"));
        }
        for package in &self.libraries {
            w.line(format!("use {package};"));
        }
        w.blank();
        self.entity.write_vhdl(w);
        w.blank();

        let arch = &self.architecture;
        w.line(format!(
            "architecture {} of {} is",
            w.identifier(&arch.name),
            w.identifier(&self.entity.name)
        ));
        w.indented(|w| arch.declarations.write_vhdl(w));
        w.line("begin");
        w.indented(|w| arch.body.write_vhdl(w));
        w.line(format!("end {};", w.identifier(&arch.name)));
    }
}
