use crate::traversal::{
    Action, BlockKind, ConstructVisitor, Named, VisResult, Visitor,
};
use crate::Context;
use hast_ast::{Block, Expression, MemberDeclaration, Statement};
use hast_utils::{Error, FullName, HastResult};
use std::collections::HashSet;

/// Pass to check if the program is well-formed.
///
/// Catches the following errors:
/// 1. Full names declared more than once.
/// 2. Hardware entry members without a body.
/// 3. Reads of undeclared locals, parameters of other members and unknown
///    fields.
/// 4. Invocations of unknown members, or with the wrong number of arguments.
/// 5. `break` and `continue` outside of loops.
pub struct WellFormed {
    /// Locals declared so far in the current member.
    locals: HashSet<FullName>,
    /// Number of loops around the current statement.
    loop_depth: usize,
}

impl ConstructVisitor for WellFormed {
    fn from(ctx: &Context) -> HastResult<Self>
    where
        Self: Sized,
    {
        let mut names = HashSet::new();
        for ty in &ctx.program.types {
            let declared = std::iter::once(ty.name)
                .chain(ty.fields.iter().map(|f| f.name))
                .chain(ty.members.iter().map(|m| m.name));
            for name in declared {
                if !names.insert(name) {
                    return Err(Error::malformed_program(format!(
                        "`{name}' is declared more than once."
                    )));
                }
            }
            for member in &ty.members {
                if member.is_hardware_entry && member.body.is_none() {
                    return Err(Error::malformed_program(format!(
                        "The hardware entry member `{}' has no body.",
                        member.name
                    )));
                }
                let mut params = HashSet::new();
                if let Some(dup) =
                    member.parameters.iter().find(|p| !params.insert(p.name))
                {
                    return Err(Error::malformed_program(format!(
                        "The parameter `{}' is declared more than once.",
                        dup.name
                    )));
                }
            }
        }

        Ok(WellFormed {
            locals: HashSet::new(),
            loop_depth: 0,
        })
    }

    fn clear_data(&mut self) {
        self.locals.clear();
        self.loop_depth = 0;
    }
}

impl Named for WellFormed {
    fn name() -> &'static str {
        "well-formed"
    }

    fn description() -> &'static str {
        "check that names are unique and every reference resolves"
    }
}

impl WellFormed {
    fn check_expression(
        &self,
        expr: &Expression,
        member: &MemberDeclaration,
        ctx: &Context,
    ) -> HastResult<()> {
        let mut result = Ok(());
        expr.for_each(&mut |e| {
            if result.is_ok() {
                result = self.check_node(e, member, ctx);
            }
        });
        result
    }

    fn check_node(
        &self,
        expr: &Expression,
        member: &MemberDeclaration,
        ctx: &Context,
    ) -> HastResult<()> {
        match expr {
            Expression::Local(name) if !self.locals.contains(name) => {
                Err(Error::malformed_program(format!(
                    "`{name}' is used in `{}' before being declared.",
                    member.name
                )))
            }
            Expression::Parameter(name) if member.parameter(name).is_none() => {
                Err(Error::malformed_program(format!(
                    "`{name}' is not a parameter of `{}'.",
                    member.name
                )))
            }
            Expression::Field { field, .. }
                if ctx.lookup.types.field(field).is_none() =>
            {
                Err(Error::malformed_program(format!(
                    "`{}' uses the unknown field `{field}'.",
                    member.name
                )))
            }
            Expression::Invocation(inv) => {
                let Some(sig) = ctx.lookup.members.get(&inv.member) else {
                    return Err(Error::malformed_program(format!(
                        "`{}' invokes the unknown member `{}'.",
                        member.name, inv.member
                    )));
                };
                if sig.parameters.len() != inv.arguments.len() {
                    return Err(Error::malformed_program(format!(
                        "`{}' invokes `{}' with {} arguments, it takes {}.",
                        member.name,
                        inv.member,
                        inv.arguments.len(),
                        sig.parameters.len()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Visitor for WellFormed {
    fn start_block(
        &mut self,
        _block: &mut Block,
        kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        if kind == BlockKind::Loop {
            self.loop_depth += 1;
        }
        Ok(Action::Continue)
    }

    fn finish_block(
        &mut self,
        _block: &mut Block,
        kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        if kind == BlockKind::Loop {
            self.loop_depth -= 1;
        }
        Ok(Action::Continue)
    }

    fn start_if(
        &mut self,
        condition: &mut Expression,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.check_expression(condition, member, ctx)?;
        Ok(Action::Continue)
    }

    fn start_while(
        &mut self,
        condition: &mut Expression,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.check_expression(condition, member, ctx)?;
        Ok(Action::Continue)
    }

    fn statement(
        &mut self,
        stmt: &mut Statement,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        match stmt {
            Statement::Break | Statement::Continue if self.loop_depth == 0 => {
                return Err(Error::malformed_program(format!(
                    "`{}' has a break or continue outside of a loop.",
                    member.name
                )));
            }
            Statement::Return(value)
                if value.is_some() != member.returns_value() =>
            {
                return Err(Error::malformed_program(format!(
                    "A return statement of `{}' doesn't match its return type.",
                    member.name
                )));
            }
            _ => (),
        }
        for expr in stmt.expressions() {
            self.check_expression(expr, member, ctx)?;
        }
        if let Statement::VariableDeclaration { name, .. } = stmt {
            self.locals.insert(*name);
        }
        Ok(Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn accepts_valid_program() {
        let name = "T::M(System.Int32)";
        let p = Expression::parameter(FullName::new(name).nested("p"));
        let mut ctx = context(program(
            vec![static_field("T::F")],
            vec![member(
                name,
                &[("p", int_ty())],
                vec![
                    Statement::assign(Expression::static_field("T::F"), p.clone()),
                    Statement::while_loop(p, vec![Statement::Break]),
                    Statement::ret(int(0)),
                ],
            )],
        ));
        assert!(WellFormed::do_pass_default(&mut ctx).is_ok());
    }

    #[test]
    fn rejects_undeclared_local() {
        let name = "T::M()";
        let mut ctx = context(program(
            vec![],
            vec![member(
                name,
                &[],
                vec![Statement::ret(Expression::local(
                    FullName::new(name).nested("x"),
                ))],
            )],
        ));
        assert!(WellFormed::do_pass_default(&mut ctx).is_err());
    }

    #[test]
    fn rejects_break_outside_loop() {
        let mut ctx = context(program(
            vec![],
            vec![member("T::M()", &[], vec![Statement::Break])],
        ));
        assert!(WellFormed::do_pass_default(&mut ctx).is_err());
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let mut ctx = context(program(
            vec![],
            vec![
                member("T::A()", &[], vec![Statement::ret(int(1))]),
                member(
                    "T::B()",
                    &[],
                    vec![Statement::ret(Expression::call(
                        FullName::new("T::A()"),
                        vec![int(1)],
                    ))],
                ),
            ],
        ));
        assert!(WellFormed::do_pass_default(&mut ctx).is_err());
    }

    #[test]
    fn rejects_duplicate_members() {
        let mut ctx = context(program(
            vec![],
            vec![
                member("T::A()", &[], vec![Statement::ret(int(1))]),
                member("T::A()", &[], vec![Statement::ret(int(2))]),
            ],
        ));
        assert!(WellFormed::do_pass_default(&mut ctx).is_err());
    }
}
