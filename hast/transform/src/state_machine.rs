use hast_vhdl::{
    CaseAlternative, DataObjectDeclaration, DataObjectKind, DataObjectReference,
    DataType, SequentialStatement, VhdlValue,
};

/// Index of a state of a [StateMachine].
pub type StateId = usize;

/// The states of the process implementing a member. Each state holds the
/// statements executed in one clock cycle; every state ends by choosing the
/// next one, or stays to wait.
pub struct StateMachine {
    name: String,
    states: Vec<Vec<SequentialStatement>>,
}

impl StateMachine {
    /// The idle state, waiting for the component to be started.
    pub const WAIT_FOR_START: StateId = 0;
    /// Signals that the component finished until the caller acknowledges.
    pub const FINISHED: StateId = 1;

    pub fn new<S: ToString>(name: S) -> Self {
        StateMachine {
            name: name.to_string(),
            states: vec![vec![], vec![]],
        }
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(vec![]);
        self.states.len() - 1
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn push(&mut self, state: StateId, stmt: SequentialStatement) {
        self.states[state].push(stmt);
    }

    /// The state does nothing but comments.
    pub fn is_empty(&self, state: StateId) -> bool {
        self.states[state]
            .iter()
            .all(|s| matches!(s, SequentialStatement::Comment(_)))
    }

    fn value_name(&self, state: StateId) -> String {
        format!("{}._State_{state}", self.name)
    }

    pub fn state_type(&self) -> DataType {
        DataType::Enumeration {
            name: format!("{}._States", self.name),
            values: (0..self.states.len()).map(|s| self.value_name(s)).collect(),
        }
    }

    /// The process variable holding the current state.
    pub fn state_variable(&self) -> DataObjectDeclaration {
        let ty = self.state_type();
        let reset = ty.default_value();
        DataObjectDeclaration::new(
            DataObjectKind::Variable,
            format!("{}._State", self.name),
            ty,
        )
        .with_initial_value(reset)
    }

    fn state_reference(&self) -> DataObjectReference {
        DataObjectReference::variable(format!("{}._State", self.name))
    }

    /// `State := <to>`
    pub fn transition(&self, to: StateId) -> SequentialStatement {
        SequentialStatement::assign(
            self.state_reference(),
            VhdlValue::EnumerationValue(self.value_name(to)),
        )
    }

    /// The `case` statement selecting the statements of the current state.
    pub fn into_case(self) -> SequentialStatement {
        let alternatives = self
            .states
            .iter()
            .enumerate()
            .map(|(id, body)| CaseAlternative {
                choice: Some(VhdlValue::EnumerationValue(self.value_name(id)).into()),
                body: body.clone(),
            })
            .collect();
        SequentialStatement::Case {
            expression: self.state_reference().into(),
            alternatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_vhdl::{Vhdl, VhdlGenerationOptions};

    #[test]
    fn states_render_as_case() {
        let mut fsm = StateMachine::new("M.0");
        let body = fsm.add_state();
        assert_eq!(body, 2);
        fsm.push(body, fsm.transition(StateMachine::FINISHED));
        assert!(fsm.is_empty(StateMachine::WAIT_FOR_START));
        let DataType::Enumeration { values, .. } = fsm.state_type() else {
            panic!("states are an enumeration")
        };
        assert_eq!(values.len(), 3);
        assert_eq!(
            fsm.state_variable().reset_value(),
            VhdlValue::EnumerationValue("M.0._State_0".to_string())
        );

        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let text = fsm.into_case().to_vhdl(&options);
        assert!(text.starts_with("case (\\M.0._State\\) is\nwhen \\M.0._State_0\\ =>\nnull;"));
        assert!(text.contains("when \\M.0._State_2\\ =>\n\\M.0._State\\ := \\M.0._State_1\\;"));
    }
}
