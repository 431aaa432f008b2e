//! The signals connecting callers to the components of the members they
//! invoke, and the proxy wiring them together.
use crate::arbiter::{Arbiter, ArbiterClient};
use crate::ArchitectureComponent;
use hast_utils::{Error, FullName, HastResult, Warning, WarningCode};
use hast_vhdl::{ConcurrentStatement, DataObjectReference, DataType, VhdlValue};
use itertools::Itertools;

/// Signals of a component seen from its callers.
#[derive(Clone, Debug)]
pub struct InstanceSignals {
    /// `<component>.Started`, driven by the caller.
    pub started: DataObjectReference,
    /// `<component>.Finished`, driven by the component.
    pub finished: DataObjectReference,
    /// `<component>.<parameter>.In`, with the value they have when the
    /// component isn't invoked by anyone.
    pub parameters: Vec<(String, DataObjectReference, VhdlValue)>,
    /// `<component>.<parameter>.Out`: final content of array parameters.
    pub array_outputs: Vec<(String, DataObjectReference)>,
    /// `<component>.return`
    pub return_value: Option<DataObjectReference>,
}

impl InstanceSignals {
    pub fn named(component: &str) -> Self {
        InstanceSignals {
            started: DataObjectReference::signal(format!("{component}.Started")),
            finished: DataObjectReference::signal(format!("{component}.Finished")),
            parameters: vec![],
            array_outputs: vec![],
            return_value: None,
        }
    }
}

/// One invocation of a member a caller can have running at a time.
#[derive(Clone, Debug)]
pub struct CallerSlot {
    pub callee: FullName,
    pub slot: u32,
    /// Instance index of the component serving the slot. `None` when the
    /// invocation can't be served.
    pub target: Option<u32>,
    /// `<caller>.<callee>.<slot>.Started`, driven by the caller.
    pub started: DataObjectReference,
    /// `<caller>.<callee>.<slot>.Finished`
    pub finished: DataObjectReference,
    /// `<caller>.<callee>.<slot>.<parameter>.Out`, driven by the caller.
    pub arguments: Vec<(String, DataObjectReference)>,
    /// `<caller>.<callee>.<slot>.<parameter>.In` of array parameters.
    pub array_results: Vec<(String, DataObjectReference, VhdlValue)>,
    /// `<caller>.<callee>.<slot>.return`
    pub return_value: Option<(DataObjectReference, VhdlValue)>,
}

impl CallerSlot {
    pub fn prefix(caller: &str, callee: &FullName, slot: u32) -> String {
        format!("{caller}.{callee}.{slot}")
    }

    /// Signals the proxy drives.
    fn inputs(&self) -> Vec<(DataObjectReference, VhdlValue)> {
        std::iter::once((self.finished.clone(), VhdlValue::Boolean(false)))
            .chain(self.array_results.iter().map(|(_, s, v)| (s.clone(), v.clone())))
            .chain(self.return_value.clone())
            .collect()
    }

    fn client_of(&self, instance: &InstanceSignals) -> HastResult<ArbiterClient> {
        let mut forward = vec![(instance.started.clone(), self.started.clone())];
        for (name, input, _) in &instance.parameters {
            let (_, argument) = self
                .arguments
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| {
                    Error::invariant(format!(
                        "No argument for the parameter `{name}' of `{}'.",
                        self.callee
                    ))
                })?;
            forward.push((input.clone(), argument.clone()));
        }
        let mut backward = vec![(self.finished.clone(), instance.finished.clone())];
        for (name, output) in &instance.array_outputs {
            if let Some((_, result, _)) =
                self.array_results.iter().find(|(n, _, _)| n == name)
            {
                backward.push((result.clone(), output.clone()));
            }
        }
        if let (Some((result, _)), Some(output)) =
            (&self.return_value, &instance.return_value)
        {
            backward.push((result.clone(), output.clone()));
        }
        Ok(ArbiterClient {
            requests: vec![self.started.clone()],
            forward,
            backward,
        })
    }
}

/// The memory access signals of a component, or the memory ports of the
/// whole design.
#[derive(Clone, Debug)]
pub struct MemorySignals {
    pub cell_index: DataObjectReference,
    pub data_out: DataObjectReference,
    pub read_enable: DataObjectReference,
    pub write_enable: DataObjectReference,
    pub data_in: DataObjectReference,
    pub reads_done: DataObjectReference,
    pub writes_done: DataObjectReference,
}

impl MemorySignals {
    pub const CELL_INDEX: DataType = DataType::Signed(32);
    pub const DATA: DataType = DataType::StdLogicVector(32);

    /// Signals prefixed by `prefix`, or the ports when `None`.
    pub fn named(prefix: Option<&str>) -> Self {
        let name = |n: &str| match prefix {
            Some(p) => DataObjectReference::signal(format!("{p}.{n}")),
            None => DataObjectReference::signal(n),
        };
        MemorySignals {
            cell_index: name("CellIndex"),
            data_out: name("DataOut"),
            read_enable: name("ReadEnable"),
            write_enable: name("WriteEnable"),
            data_in: name("DataIn"),
            reads_done: name("ReadsDone"),
            writes_done: name("WritesDone"),
        }
    }

    /// Declare the signals of `component`.
    pub fn declare(component: &mut ArchitectureComponent) -> HastResult<Self> {
        let name = component.name.clone();
        let signals = Self::named(Some(&name));
        component.internal_signal(&signals.cell_index.name, Self::CELL_INDEX)?;
        component.internal_signal(&signals.data_out.name, Self::DATA)?;
        component.internal_signal(&signals.read_enable.name, DataType::Boolean)?;
        component.internal_signal(&signals.write_enable.name, DataType::Boolean)?;
        component.external_signal(&signals.data_in.name, Self::DATA)?;
        component.external_signal(&signals.reads_done.name, DataType::Boolean)?;
        component.external_signal(&signals.writes_done.name, DataType::Boolean)?;
        Ok(signals)
    }

    /// Signals of the memory driven by the design, with their reset values.
    fn outputs(&self) -> Vec<(DataObjectReference, VhdlValue)> {
        vec![
            (self.cell_index.clone(), Self::CELL_INDEX.default_value()),
            (self.data_out.clone(), Self::DATA.default_value()),
            (self.read_enable.clone(), VhdlValue::Boolean(false)),
            (self.write_enable.clone(), VhdlValue::Boolean(false)),
        ]
    }

    fn client_of(&self, ports: &MemorySignals) -> ArbiterClient {
        ArbiterClient {
            requests: vec![self.read_enable.clone(), self.write_enable.clone()],
            forward: vec![
                (ports.cell_index.clone(), self.cell_index.clone()),
                (ports.data_out.clone(), self.data_out.clone()),
                (ports.read_enable.clone(), self.read_enable.clone()),
                (ports.write_enable.clone(), self.write_enable.clone()),
            ],
            backward: vec![
                (self.data_in.clone(), ports.data_in.clone()),
                (self.reads_done.clone(), ports.reads_done.clone()),
                (self.writes_done.clone(), ports.writes_done.clone()),
            ],
        }
    }
}

fn tie_off(signals: Vec<(DataObjectReference, VhdlValue)>) -> Vec<ConcurrentStatement> {
    signals
        .into_iter()
        .map(|(target, value)| ConcurrentStatement::Assignment {
            target,
            value: value.into(),
        })
        .collect()
}

/// Connect every caller slot to the component serving it. Components invoked
/// through several slots get an arbiter.
pub fn connect_invocations(
    components: &[ArchitectureComponent],
    external_slots: &[CallerSlot],
    warnings: &mut Vec<Warning>,
) -> HastResult<Vec<ConcurrentStatement>> {
    let slots = components
        .iter()
        .flat_map(|c| c.caller_slots.iter())
        .chain(external_slots)
        .collect_vec();
    let mut statements = vec![];

    for slot in slots.iter().filter(|s| s.target.is_none()) {
        statements.extend(tie_off(slot.inputs()));
    }
    for slot in slots.iter().filter(|s| s.target.is_some()) {
        let served = components
            .iter()
            .any(|c| c.member == slot.callee && Some(c.instance_index) == slot.target);
        if !served {
            return Err(Error::invariant(format!(
                "`{}' invokes the missing instance {:?} of `{}'.",
                slot.started.name, slot.target, slot.callee
            )));
        }
    }

    for component in components {
        let signals = &component.signals;
        let clients = slots
            .iter()
            .filter(|s| {
                s.callee == component.member
                    && s.target == Some(component.instance_index)
            })
            .map(|s| s.client_of(signals))
            .collect::<HastResult<Vec<_>>>()?;
        match clients.len() {
            0 => {
                let idle = std::iter::once((
                    signals.started.clone(),
                    VhdlValue::Boolean(false),
                ))
                .chain(
                    signals
                        .parameters
                        .iter()
                        .map(|(_, s, v)| (s.clone(), v.clone())),
                )
                .collect();
                statements.extend(tie_off(idle));
            }
            1 => statements.extend(clients[0].direct()),
            count => {
                warnings.push(
                    Warning::new(
                        WarningCode::SharedInstance,
                        format!(
                            "{count} callers share the instance `{}' and wait for each other.",
                            component.name
                        ),
                    )
                    .with_subject(component.member),
                );
                let mut driven =
                    vec![(signals.started.clone(), VhdlValue::Boolean(false))];
                driven.extend(
                    signals
                        .parameters
                        .iter()
                        .map(|(_, s, v)| (s.clone(), v.clone())),
                );
                for slot in slots.iter().filter(|s| {
                    s.callee == component.member
                        && s.target == Some(component.instance_index)
                }) {
                    driven.extend(slot.inputs());
                }
                let arbiter = Arbiter {
                    name: format!("{}.Arbiter", component.name),
                    clients,
                    busy: vec![signals.finished.clone()],
                    driven,
                };
                statements.push(ConcurrentStatement::Process(arbiter.into_process()?));
            }
        }
    }
    Ok(statements)
}

/// Connect the memory signals of the components to the memory ports.
pub fn connect_memory(
    components: &[ArchitectureComponent],
    ports: &MemorySignals,
) -> HastResult<Vec<ConcurrentStatement>> {
    let users = components
        .iter()
        .filter_map(|c| c.memory.as_ref().map(|m| (c, m)))
        .collect_vec();
    Ok(match users.as_slice() {
        [] => tie_off(ports.outputs()),
        [(_, memory)] => memory.client_of(ports).direct(),
        _ => {
            let mut driven = ports.outputs();
            for (_, memory) in &users {
                driven.push((memory.data_in.clone(), MemorySignals::DATA.default_value()));
                driven.push((memory.reads_done.clone(), VhdlValue::Boolean(false)));
                driven.push((memory.writes_done.clone(), VhdlValue::Boolean(false)));
            }
            let arbiter = Arbiter {
                name: "SimpleMemory.Arbiter".to_string(),
                clients: users.iter().map(|(_, m)| m.client_of(ports)).collect(),
                busy: vec![ports.reads_done.clone(), ports.writes_done.clone()],
                driven,
            };
            vec![ConcurrentStatement::Process(arbiter.into_process()?)]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callee(index: u32) -> ArchitectureComponent {
        let mut c = ArchitectureComponent::new(FullName::new("T::N(System.Int32)"), index);
        let name = c.name.clone();
        c.signals.parameters.push((
            "x".to_string(),
            DataObjectReference::signal(format!("{name}.x.In")),
            VhdlValue::from_integer(0, 32),
        ));
        c
    }

    fn slot(caller: &str, target: Option<u32>) -> CallerSlot {
        let callee = FullName::new("T::N(System.Int32)");
        let prefix = CallerSlot::prefix(caller, &callee, 0);
        CallerSlot {
            callee,
            slot: 0,
            target,
            started: DataObjectReference::signal(format!("{prefix}.Started")),
            finished: DataObjectReference::signal(format!("{prefix}.Finished")),
            arguments: vec![(
                "x".to_string(),
                DataObjectReference::signal(format!("{prefix}.x.Out")),
            )],
            array_results: vec![],
            return_value: None,
        }
    }

    #[test]
    fn one_caller_is_wired_directly() {
        let mut warnings = vec![];
        let statements =
            connect_invocations(&[callee(0)], &[slot("A", Some(0))], &mut warnings).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn shared_instance_is_arbitrated() {
        let mut warnings = vec![];
        let statements = connect_invocations(
            &[callee(0)],
            &[slot("A", Some(0)), slot("B", Some(0))],
            &mut warnings,
        )
        .unwrap();
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], ConcurrentStatement::Process(_)));
        assert_eq!(warnings[0].code, WarningCode::SharedInstance);
    }

    #[test]
    fn idle_instances_and_unserved_slots_are_tied_off() {
        let mut warnings = vec![];
        let statements =
            connect_invocations(&[callee(0)], &[slot("A", None)], &mut warnings).unwrap();
        // The slot's Finished, the instance's Started and its parameter.
        assert_eq!(statements.len(), 3);
        assert!(connect_invocations(&[callee(0)], &[slot("A", Some(1))], &mut warnings).is_err());
    }
}
