//! Sharing of one resource between several components.
use crate::top::clocked;
use hast_utils::HastResult;
use hast_vhdl::{
    CaseAlternative, ConcurrentStatement, DataObjectDeclaration, DataObjectKind,
    DataObjectReference, DataType, Process, SequentialStatement,
    VhdlBinaryOperator, VhdlExpression, VhdlValue,
};

/// A component competing for the resource.
#[derive(Clone, Debug, Default)]
pub struct ArbiterClient {
    /// The client wants the resource while any of these is true.
    pub requests: Vec<DataObjectReference>,
    /// `(shared, client)`: the shared signal follows the client's one while
    /// the client owns the resource.
    pub forward: Vec<(DataObjectReference, DataObjectReference)>,
    /// `(client, shared)`: the client's signal follows the shared one while
    /// the client owns the resource.
    pub backward: Vec<(DataObjectReference, DataObjectReference)>,
}

impl ArbiterClient {
    /// Connect the client to the resource permanently.
    pub fn direct(&self) -> Vec<ConcurrentStatement> {
        self.forward
            .iter()
            .chain(&self.backward)
            .map(|(target, source)| ConcurrentStatement::Assignment {
                target: target.clone(),
                value: source.clone().into(),
            })
            .collect()
    }

    fn assignments(&self) -> Vec<SequentialStatement> {
        self.forward
            .iter()
            .chain(&self.backward)
            .map(|(target, source)| {
                SequentialStatement::assign(target.clone(), source.clone())
            })
            .collect()
    }
}

fn any(signals: &[DataObjectReference]) -> VhdlExpression {
    signals
        .iter()
        .map(|s| VhdlExpression::from(s.clone()))
        .reduce(|l, r| VhdlExpression::binary(VhdlBinaryOperator::Or, l, r))
        .unwrap_or(VhdlValue::Boolean(false).into())
}

/// Serializes the access of several clients. The first client requesting
/// the resource owns it until it stops requesting and the resource isn't
/// busy anymore. Clients declared earlier win ties.
pub struct Arbiter {
    pub name: String,
    pub clients: Vec<ArbiterClient>,
    /// The resource can't be handed over while any of these is true.
    pub busy: Vec<DataObjectReference>,
    /// Every signal the arbiter drives, with its reset value.
    pub driven: Vec<(DataObjectReference, VhdlValue)>,
}

impl Arbiter {
    pub fn into_process(self) -> HastResult<Process> {
        let mut process = Process::new(&self.name);
        let owner_decl = DataObjectDeclaration::new(
            DataObjectKind::Variable,
            format!("{}.Owner", self.name),
            DataType::Integer,
        )
        .with_initial_value(VhdlValue::Integer(0));
        let owner = process.declarations.data_object(owner_decl)?;

        let mut reset: Vec<SequentialStatement> = self
            .driven
            .iter()
            .map(|(s, v)| SequentialStatement::assign(s.clone(), v.clone()))
            .collect();
        reset.push(SequentialStatement::assign(
            owner.clone(),
            VhdlValue::Integer(0),
        ));

        let mut claims = self.clients.iter().enumerate().map(|(i, client)| {
            let mut body = vec![SequentialStatement::assign(
                owner.clone(),
                VhdlValue::Integer(i as i64 + 1),
            )];
            body.extend(client.forward.iter().map(|(target, source)| {
                SequentialStatement::assign(target.clone(), source.clone())
            }));
            (any(&client.requests), body)
        });
        let idle = match claims.next() {
            Some((condition, then)) => vec![SequentialStatement::If {
                condition,
                then,
                elsifs: claims.collect(),
                otherwise: vec![],
            }],
            None => vec![],
        };

        let mut alternatives = vec![CaseAlternative {
            choice: Some(VhdlValue::Integer(0).into()),
            body: idle,
        }];
        for (i, client) in self.clients.iter().enumerate() {
            let idle_signals = client.requests.iter().chain(&self.busy).cloned();
            let released = idle_signals
                .map(VhdlExpression::not)
                .reduce(|l, r| VhdlExpression::binary(VhdlBinaryOperator::And, l, r))
                .unwrap_or(VhdlValue::Boolean(true).into());
            let mut body = client.assignments();
            body.push(SequentialStatement::if_then(
                released,
                vec![SequentialStatement::assign(
                    owner.clone(),
                    VhdlValue::Integer(0),
                )],
            ));
            alternatives.push(CaseAlternative {
                choice: Some(VhdlValue::Integer(i as i64 + 1).into()),
                body,
            });
        }
        alternatives.push(CaseAlternative {
            choice: None,
            body: vec![SequentialStatement::assign(
                owner.clone(),
                VhdlValue::Integer(0),
            )],
        });

        process.body = clocked(
            reset,
            vec![SequentialStatement::Case {
                expression: owner.into(),
                alternatives,
            }],
        );
        process.sensitivity.push(crate::top::clock());
        Ok(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_vhdl::{Vhdl, VhdlGenerationOptions};

    fn client(name: &str) -> ArbiterClient {
        ArbiterClient {
            requests: vec![DataObjectReference::signal(format!("{name}.Go"))],
            forward: vec![(
                DataObjectReference::signal("R.Go"),
                DataObjectReference::signal(format!("{name}.Go")),
            )],
            backward: vec![(
                DataObjectReference::signal(format!("{name}.Done")),
                DataObjectReference::signal("R.Done"),
            )],
        }
    }

    #[test]
    fn single_client_is_wired() {
        let options = VhdlGenerationOptions::default();
        let text = client("A").direct().to_vhdl(&options);
        assert_eq!(text, "\\R.Go\\ <= \\A.Go\\;\n\\A.Done\\ <= \\R.Done\\;\n");
    }

    #[test]
    fn arbiter_prefers_first_client() {
        let arbiter = Arbiter {
            name: "R.Arbiter".to_string(),
            clients: vec![client("A"), client("B")],
            busy: vec![DataObjectReference::signal("R.Done")],
            driven: vec![(
                DataObjectReference::signal("R.Go"),
                VhdlValue::Boolean(false),
            )],
        };
        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let text = arbiter.into_process().unwrap().to_vhdl(&options);
        assert!(text.contains("variable \\R.Arbiter.Owner\\: integer := 0;"));
        assert!(text.contains(
            "when 0 =>\nif (\\A.Go\\) then\n\\R.Arbiter.Owner\\ := 1;\n\\R.Go\\ <= \\A.Go\\;\nelsif (\\B.Go\\) then"
        ));
        assert!(text.contains("if ((not(\\B.Go\\) and not(\\R.Done\\))) then\n\\R.Arbiter.Owner\\ := 0;"));
        assert!(text.contains("when others =>"));
    }
}
