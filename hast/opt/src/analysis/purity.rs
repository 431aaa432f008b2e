use hast_ast::{Expression, LookupTables, MemberDeclaration, Program, Statement};
use hast_utils::FullName;
use std::collections::BTreeSet;

/// Members whose invocation has no effect besides the returned value.
///
/// A member is pure if it only writes its own locals and parameters and only
/// calls pure members. Opaque members are never pure.
#[derive(Clone, Debug, Default)]
pub struct PureMembers {
    pure: BTreeSet<FullName>,
}

impl PureMembers {
    pub fn compute(program: &Program, lookup: &LookupTables) -> Self {
        let mut callees = Vec::new();
        for member in program.members() {
            if lookup.members.is_opaque(&member.name) {
                continue;
            }
            if let Some(calls) = Self::local_effects(member) {
                callees.push((member.name, calls));
            }
        }

        // Drop members calling anything not known to be pure until nothing
        // changes.
        let mut pure: BTreeSet<FullName> =
            callees.iter().map(|(name, _)| *name).collect();
        loop {
            let before = pure.len();
            callees.retain(|(name, calls)| {
                let keep = calls.iter().all(|c| pure.contains(c));
                if !keep {
                    pure.remove(name);
                }
                keep
            });
            if pure.len() == before {
                break;
            }
        }
        log::debug!("{} pure members", pure.len());
        PureMembers { pure }
    }

    /// The members called by `member`, or `None` if the body itself has side
    /// effects.
    fn local_effects(member: &MemberDeclaration) -> Option<BTreeSet<FullName>> {
        let body = member.body.as_ref()?;
        let mut calls = BTreeSet::new();
        let mut effects = false;
        body.for_each_statement(&mut |stmt| match stmt {
            Statement::Assignment { target, .. } => {
                effects |= !matches!(
                    target,
                    Expression::Local(_) | Expression::Parameter(_)
                );
            }
            Statement::ParallelInvocation(_) => effects = true,
            _ => (),
        });
        body.for_each_expression(&mut |expr| match expr {
            Expression::Invocation(inv) => {
                effects |= inv.arguments.iter().any(|a| a.mode.takes_address());
                calls.insert(inv.member);
            }
            Expression::AddressOf(_) | Expression::ObjectCreation { .. } => {
                effects = true
            }
            _ => (),
        });
        (!effects).then_some(calls)
    }

    pub fn is_pure(&self, member: &FullName) -> bool {
        self.pure.contains(member)
    }

    /// Can evaluating `expr` be skipped without changing the behavior of the
    /// program.
    pub fn is_side_effect_free(&self, expr: &Expression) -> bool {
        let mut free = true;
        expr.for_each(&mut |e| match e {
            Expression::Invocation(inv) => {
                free &= self.is_pure(&inv.member)
                    && inv.arguments.iter().all(|a| !a.mode.takes_address())
            }
            Expression::AddressOf(_) | Expression::ObjectCreation { .. } => {
                free = false
            }
            _ => (),
        });
        free
    }

    pub fn iter(&self) -> impl Iterator<Item = &FullName> {
        self.pure.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_ast::{
        Block, PrimitiveType, TypeDeclaration, TypeReference, Value,
    };

    fn member(name: &str, body: Vec<Statement>) -> MemberDeclaration {
        let mut m = MemberDeclaration::new(
            FullName::new(name),
            TypeReference::primitive(PrimitiveType::Int32),
        );
        m.body = Some(Block::new(body));
        m
    }

    #[test]
    fn impurity_propagates_through_calls() {
        let mut ty = TypeDeclaration::new(FullName::new("T"));
        ty.members = vec![
            member(
                "T::Leaf()",
                vec![Statement::ret(Expression::literal(Value::Int32(1)))],
            ),
            member(
                "T::Writer()",
                vec![
                    Statement::assign(
                        Expression::static_field("T::F"),
                        Expression::literal(Value::Int32(1)),
                    ),
                    Statement::ret(Expression::literal(Value::Int32(1))),
                ],
            ),
            member(
                "T::CallsLeaf()",
                vec![Statement::ret(Expression::call(
                    FullName::new("T::Leaf()"),
                    vec![],
                ))],
            ),
            member(
                "T::CallsWriter()",
                vec![Statement::ret(Expression::call(
                    FullName::new("T::Writer()"),
                    vec![],
                ))],
            ),
        ];
        let program = Program::new(vec![ty]);
        let pure = PureMembers::compute(&program, &LookupTables::build(&program));
        assert!(pure.is_pure(&FullName::new("T::Leaf()")));
        assert!(pure.is_pure(&FullName::new("T::CallsLeaf()")));
        assert!(!pure.is_pure(&FullName::new("T::Writer()")));
        assert!(!pure.is_pure(&FullName::new("T::CallsWriter()")));
        assert!(!pure.is_side_effect_free(&Expression::call(
            FullName::new("T::Unknown()"),
            vec![]
        )));
    }
}
