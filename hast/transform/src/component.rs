use crate::invocation::{CallerSlot, InstanceSignals, MemorySignals};
use hast_utils::{FullName, HastResult};
use hast_vhdl::{
    DataObjectDeclaration, DataObjectKind, DataObjectReference, DataType,
    DeclarationBlock, Process, VhdlValue,
};
use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An operation whose result is only valid some clock cycles after its
/// operands are. Synthesis needs to know about it to relax the timing of the
/// path producing `result`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiCycleOperation {
    /// The signal the result of the operation is stored in.
    pub result: DataObjectReference,
    pub required_clock_cycles_ceiling: u32,
}

/// The hardware of one instance of a member: a state machine process and
/// the data objects it uses.
pub struct ArchitectureComponent {
    /// `<member full name>.<instance index>`
    pub name: String,
    pub member: FullName,
    pub instance_index: u32,
    /// Declared in the architecture: signals, shared variables and the types
    /// and functions the process needs.
    pub declarations: DeclarationBlock,
    pub process: Process,
    /// Signals driven by the process, with the value they get on reset.
    pub internally_driven_signals: LinkedHashMap<DataObjectReference, VhdlValue>,
    /// Signals the process reads but never drives.
    pub externally_driven_signals: Vec<DataObjectReference>,
    pub multi_cycle_operations: Vec<MultiCycleOperation>,
    /// Members this component invokes, with how many of their invocations
    /// may run at the same time.
    pub invoked_members: BTreeMap<FullName, u32>,
    pub(crate) signals: InstanceSignals,
    pub(crate) caller_slots: Vec<CallerSlot>,
    pub(crate) memory: Option<MemorySignals>,
}

impl ArchitectureComponent {
    pub fn new(member: FullName, instance_index: u32) -> Self {
        let name = format!("{member}.{instance_index}");
        ArchitectureComponent {
            signals: InstanceSignals::named(&name),
            process: Process::new(&name),
            name,
            member,
            instance_index,
            declarations: DeclarationBlock::default(),
            internally_driven_signals: LinkedHashMap::new(),
            externally_driven_signals: vec![],
            multi_cycle_operations: vec![],
            invoked_members: BTreeMap::new(),
            caller_slots: vec![],
            memory: None,
        }
    }

    /// Declare a signal driven by this component's process.
    pub fn internal_signal<S: ToString>(
        &mut self,
        name: S,
        ty: DataType,
    ) -> HastResult<DataObjectReference> {
        let decl = DataObjectDeclaration::new(DataObjectKind::Signal, name, ty);
        let reset = decl.reset_value();
        let reference = self.declarations.data_object(decl)?;
        self.internally_driven_signals.insert(reference.clone(), reset);
        Ok(reference)
    }

    /// Declare a signal driven from outside of this component.
    pub fn external_signal<S: ToString>(
        &mut self,
        name: S,
        ty: DataType,
    ) -> HastResult<DataObjectReference> {
        let reference = self.declarations.data_object(DataObjectDeclaration::new(
            DataObjectKind::Signal,
            name,
            ty,
        ))?;
        if !self.externally_driven_signals.contains(&reference) {
            self.externally_driven_signals.push(reference.clone());
        }
        Ok(reference)
    }

    /// Read-only summary of the component, kept after the hardware is
    /// generated.
    pub fn info(&self) -> ComponentInfo {
        ComponentInfo {
            name: self.name.clone(),
            member: self.member,
            instance_index: self.instance_index,
            multi_cycle_operations: self.multi_cycle_operations.clone(),
            invoked_members: self
                .invoked_members
                .iter()
                .map(|(m, count)| (*m, *count))
                .collect(),
        }
    }
}

/// What back ends need to know about a generated component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    pub member: FullName,
    pub instance_index: u32,
    multi_cycle_operations: Vec<MultiCycleOperation>,
    invoked_members: Vec<(FullName, u32)>,
}

impl ComponentInfo {
    pub fn multi_cycle_operations(&self) -> &[MultiCycleOperation] {
        &self.multi_cycle_operations
    }

    /// Invoked members and their maximal number of concurrent invocations,
    /// sorted by member.
    pub fn invoked_members(&self) -> &[(FullName, u32)] {
        &self.invoked_members
    }

    /// The multi-cycle operation storing its result in `signal`.
    pub fn multi_cycle_operation(&self, signal: &str) -> Option<&MultiCycleOperation> {
        self.multi_cycle_operations
            .iter()
            .find(|op| op.result.name == signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_are_classified() {
        let mut component = ArchitectureComponent::new(FullName::new("T::M()"), 1);
        assert_eq!(component.name, "T::M().1");
        let done = component
            .internal_signal("T::M().1.Done", DataType::Boolean)
            .unwrap();
        component
            .external_signal("T::M().1.Go", DataType::Boolean)
            .unwrap();
        component
            .external_signal("T::M().1.Go", DataType::Boolean)
            .unwrap();
        assert_eq!(
            component.internally_driven_signals.get(&done),
            Some(&VhdlValue::Boolean(false))
        );
        assert_eq!(component.externally_driven_signals.len(), 1);
        assert!(component
            .internal_signal("T::M().1.Go", DataType::Integer)
            .is_err());
    }

    #[test]
    fn info_exposes_operations() {
        let mut component = ArchitectureComponent::new(FullName::new("T::M()"), 0);
        component.multi_cycle_operations.push(MultiCycleOperation {
            result: DataObjectReference::signal("T::M().0.div"),
            required_clock_cycles_ceiling: 4,
        });
        component.invoked_members.insert(FullName::new("T::N()"), 2);
        let info = component.info();
        assert_eq!(
            info.multi_cycle_operation("T::M().0.div")
                .map(|op| op.required_clock_cycles_ceiling),
            Some(4)
        );
        assert!(info.multi_cycle_operation("T::M().0.mul").is_none());
        assert_eq!(info.invoked_members(), &[(FullName::new("T::N()"), 2)]);
    }
}
