use crate::TransformationIdentity;
use hast_transform::{ComponentInfo, MultiCycleOperation};
use hast_utils::{Error, FullName, HastResult, Warning};
use serde::{Deserialize, Serialize};

/// The result of a transformation: the VHDL source of the design and what
/// device back ends need to know about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDescription {
    identity: TransformationIdentity,
    vhdl: String,
    components: Vec<ComponentInfo>,
    /// Hardware entry members and the member ids the host starts them with.
    entry_points: Vec<(FullName, u32)>,
    warnings: Vec<Warning>,
}

impl HardwareDescription {
    pub fn new(
        identity: TransformationIdentity,
        vhdl: String,
        components: Vec<ComponentInfo>,
        entry_points: Vec<(FullName, u32)>,
        warnings: Vec<Warning>,
    ) -> Self {
        HardwareDescription {
            identity,
            vhdl,
            components,
            entry_points,
            warnings,
        }
    }

    pub fn identity(&self) -> &TransformationIdentity {
        &self.identity
    }

    pub fn vhdl(&self) -> &str {
        &self.vhdl
    }

    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    pub fn entry_points(&self) -> &[(FullName, u32)] {
        &self.entry_points
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The id the host selects `member` with.
    pub fn member_id(&self, member: &FullName) -> Option<u32> {
        self.entry_points
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, id)| *id)
    }

    /// The multi-cycle operation of `component` storing its result in
    /// `signal`. Back ends ask for the operations they found in the design,
    /// so a missing one is a bug.
    pub fn multi_cycle_path(
        &self,
        component: &str,
        signal: &str,
    ) -> HastResult<&MultiCycleOperation> {
        let info = self
            .components
            .iter()
            .find(|c| c.name == component)
            .ok_or_else(|| {
                Error::invariant(format!("There is no component `{component}'."))
            })?;
        info.multi_cycle_operation(signal).ok_or_else(|| {
            Error::invariant(format!(
                "`{signal}' is not the result of a multi-cycle operation of `{component}'."
            ))
        })
    }

    pub fn to_json(&self) -> HastResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> HastResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
