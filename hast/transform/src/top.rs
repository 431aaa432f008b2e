//! The top level entity: the ports the host drives, the dispatch of its
//! requests to the hardware entry members and the wiring of every component.
use crate::invocation::{connect_invocations, connect_memory, CallerSlot, MemorySignals};
use crate::{ArchitectureComponent, ComponentInfo};
use hast_utils::{Error, FullName, HastResult, Warning};
use hast_vhdl::{
    Comment, ConcurrentStatement, DataObjectDeclaration, DataObjectKind,
    DataObjectReference, DataType, DeclarationBlock, Module, Port, PortMode, Process,
    SequentialStatement, VhdlExpression, VhdlValue,
};

pub const ENTITY_NAME: &str = "Hast_IP";

pub(crate) fn clock() -> DataObjectReference {
    DataObjectReference::signal("Clock")
}

pub(crate) fn reset() -> DataObjectReference {
    DataObjectReference::signal("Reset")
}

/// `if rising_edge(Clock) then if Reset = '1' then <reset> else <body>`
pub(crate) fn clocked(
    on_reset: Vec<SequentialStatement>,
    body: Vec<SequentialStatement>,
) -> Vec<SequentialStatement> {
    vec![SequentialStatement::if_then(
        VhdlExpression::call("rising_edge", vec![clock().into()]),
        vec![SequentialStatement::if_else(
            VhdlExpression::equals(reset(), VhdlValue::StdLogic(true)),
            on_reset,
            body,
        )],
    )]
}

fn ports(use_memory: bool) -> Vec<Port> {
    let mut ports = vec![
        Port::new("Clock", PortMode::In, DataType::StdLogic),
        Port::new("Reset", PortMode::In, DataType::StdLogic),
        Port::new("Started", PortMode::In, DataType::Boolean),
        Port::new("Finished", PortMode::Out, DataType::Boolean),
        Port::new("MemberId", PortMode::In, DataType::Unsigned(32)),
    ];
    if use_memory {
        ports.extend([
            Port::new("CellIndex", PortMode::Out, MemorySignals::CELL_INDEX),
            Port::new("DataIn", PortMode::In, MemorySignals::DATA),
            Port::new("DataOut", PortMode::Out, MemorySignals::DATA),
            Port::new("ReadEnable", PortMode::Out, DataType::Boolean),
            Port::new("WriteEnable", PortMode::Out, DataType::Boolean),
            Port::new("ReadsDone", PortMode::In, DataType::Boolean),
            Port::new("WritesDone", PortMode::In, DataType::Boolean),
        ]);
    }
    ports
}

/// Turns the host's requests into invocations of the hardware entry
/// members. The member to run is selected by the `MemberId` port.
pub struct ExternalInvocationProxy {
    /// Hardware entry members with their ids, sorted by id.
    entry_points: Vec<(FullName, u32)>,
    use_memory: bool,
}

impl ExternalInvocationProxy {
    pub fn new(mut entry_points: Vec<(FullName, u32)>, use_memory: bool) -> Self {
        entry_points.sort_by_key(|(_, id)| *id);
        ExternalInvocationProxy {
            entry_points,
            use_memory,
        }
    }

    /// The caller slot invoking the first instance of `component`'s member on
    /// behalf of the host. Its signals are declared in `declarations`.
    fn slot_for(
        component: &ArchitectureComponent,
        declarations: &mut DeclarationBlock,
        statements: &mut Vec<ConcurrentStatement>,
    ) -> HastResult<CallerSlot> {
        let prefix = CallerSlot::prefix(ENTITY_NAME, &component.member, 0);
        let mut signal = |name: String, ty: DataType| {
            declarations.data_object(DataObjectDeclaration::new(
                DataObjectKind::Signal,
                name,
                ty,
            ))
        };
        let started = signal(format!("{prefix}.Started"), DataType::Boolean)?;
        let finished = signal(format!("{prefix}.Finished"), DataType::Boolean)?;
        let instance = &component.signals;
        let mut arguments = vec![];
        for (name, input, default) in &instance.parameters {
            let ty = component
                .declarations
                .data_objects(DataObjectKind::Signal)
                .find(|d| d.name == input.name)
                .map(|d| d.ty.clone())
                .ok_or_else(|| {
                    Error::invariant(format!("`{}' is not declared.", input.name))
                })?;
            let argument = signal(format!("{prefix}.{name}.Out"), ty)?;
            // The host passes its arguments through the memory.
            statements.push(ConcurrentStatement::Assignment {
                target: argument.clone(),
                value: default.clone().into(),
            });
            arguments.push((name.clone(), argument));
        }
        Ok(CallerSlot {
            callee: component.member,
            slot: 0,
            target: Some(component.instance_index),
            started,
            finished,
            arguments,
            array_results: vec![],
            return_value: None,
        })
    }

    /// `if MemberId = <id> then <slot>.Started <= Started; Finished <=
    /// <slot>.Finished;` for every entry point.
    fn dispatch(&self, slots: &[(u32, CallerSlot)]) -> Process {
        let finished = DataObjectReference::signal("Finished");
        let mut on_reset = vec![SequentialStatement::assign(
            finished.clone(),
            VhdlValue::Boolean(false),
        )];
        let mut body = vec![];
        for (id, slot) in slots {
            on_reset.push(SequentialStatement::assign(
                slot.started.clone(),
                VhdlValue::Boolean(false),
            ));
            body.push(SequentialStatement::if_then(
                VhdlExpression::equals(
                    DataObjectReference::signal("MemberId"),
                    VhdlValue::from_integer(*id as i128, 32),
                ),
                vec![
                    SequentialStatement::assign(
                        slot.started.clone(),
                        DataObjectReference::signal("Started"),
                    ),
                    SequentialStatement::assign(finished.clone(), slot.finished.clone()),
                ],
            ));
        }
        let mut process = Process::new(format!("{ENTITY_NAME}.Dispatch"));
        process.sensitivity.push(clock());
        process.body = clocked(on_reset, body);
        process
    }

    /// Assemble the module out of the components.
    pub fn build(
        &self,
        components: Vec<ArchitectureComponent>,
        warnings: &mut Vec<Warning>,
    ) -> HastResult<(Module, Vec<ComponentInfo>)> {
        let mut module = Module::new(ENTITY_NAME);
        module.entity.ports = ports(self.use_memory);

        let mut host_wiring = vec![];
        let mut slots = vec![];
        for (member, id) in &self.entry_points {
            let first = components
                .iter()
                .find(|c| c.member == *member && c.instance_index == 0);
            match first {
                Some(component) => {
                    let slot = Self::slot_for(
                        component,
                        &mut module.architecture.declarations,
                        &mut host_wiring,
                    )?;
                    slots.push((*id, slot));
                }
                None => log::debug!("No hardware for the entry point `{member}'."),
            }
        }

        let external_slots: Vec<CallerSlot> =
            slots.iter().map(|(_, s)| s.clone()).collect();
        let invocation_wiring =
            connect_invocations(&components, &external_slots, warnings)?;
        let memory_wiring = if self.use_memory {
            connect_memory(&components, &MemorySignals::named(None))?
        } else {
            vec![]
        };

        let infos = components.iter().map(|c| c.info()).collect();
        let body = &mut module.architecture.body;
        for component in components {
            module
                .architecture
                .declarations
                .extend(component.declarations)?;
            body.push(ConcurrentStatement::Comment(Comment::Block(format!(
                "State machine of `{}', instance {}",
                component.member, component.instance_index
            ))));
            body.push(ConcurrentStatement::Process(component.process));
        }
        body.push(ConcurrentStatement::Comment(Comment::Block(
            "Invocation handlers".to_string(),
        )));
        body.extend(host_wiring);
        body.extend(invocation_wiring);
        if self.use_memory {
            body.push(ConcurrentStatement::Comment(Comment::Block(
                "Memory access".to_string(),
            )));
            body.extend(memory_wiring);
        }
        body.push(ConcurrentStatement::Process(self.dispatch(&slots)));
        Ok((module, infos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_vhdl::{Vhdl, VhdlGenerationOptions};

    #[test]
    fn clocked_body_renders() {
        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let text = clocked(
            vec![SequentialStatement::assign(
                DataObjectReference::signal("a"),
                VhdlValue::Boolean(false),
            )],
            vec![],
        )
        .to_vhdl(&options);
        assert_eq!(
            text,
            "if (rising_edge(\\Clock\\)) then\nif ((\\Reset\\ = '1')) then\n\\a\\ <= false;\nend if;\nend if;\n"
        );
    }

    #[test]
    fn empty_design_has_ports_and_dispatch() {
        let proxy = ExternalInvocationProxy::new(vec![], true);
        let (module, infos) = proxy.build(vec![], &mut vec![]).unwrap();
        assert!(infos.is_empty());
        assert_eq!(module.entity.ports.len(), 12);
        let text = module.to_vhdl(&VhdlGenerationOptions::default());
        assert!(text.contains("entity \\Hast_IP\\ is"));
        assert!(text.contains("\\Hast_IP.Dispatch\\: process (\\Clock\\)"));
    }
}
