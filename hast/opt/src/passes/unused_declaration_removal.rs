use crate::analysis::PureMembers;
use crate::traversal::{
    visit_block, Action, BlockKind, ConstructVisitor, Named, Resubstitution,
    VisResult, Visitor,
};
use crate::Context;
use hast_ast::{Block, Expression, MemberDeclaration, Statement};
use hast_utils::{FullName, HastResult};
use std::collections::HashSet;

/// Removes locals that are never read, together with every write to them.
///
/// Values with side effects are kept as expression statements. The targets of
/// parallel invocations storing into unread locals are dropped. Removing a
/// local can make others unread, so members are visited until nothing
/// changes.
pub struct UnusedDeclarationRemoval {
    pure: PureMembers,
    /// Locals read anywhere in the member being visited.
    read: HashSet<FullName>,
    removed: usize,
    /// Statements removed in the current sweep of the member.
    removed_in_sweep: usize,
}

/// Locals read in `block`. Writes to a local don't count as reads of it.
fn read_locals(block: &Block) -> HashSet<FullName> {
    let mut read = HashSet::new();
    let mut add = |expr: &Expression| {
        expr.for_each(&mut |e| {
            if let Expression::Local(name) = e {
                read.insert(*name);
            }
        })
    };
    block.for_each_statement(&mut |stmt| match stmt {
        Statement::Assignment { target, value } => {
            if !matches!(target, Expression::Local(_)) {
                add(target);
            }
            add(value);
        }
        Statement::ParallelInvocation(calls) => {
            for call in calls {
                if let Some(target) = &call.target {
                    if !matches!(target, Expression::Local(_)) {
                        add(target);
                    }
                }
                let invocation = Expression::Invocation(call.invocation.clone());
                add(&invocation);
            }
        }
        _ => {
            for expr in stmt.expressions() {
                add(expr);
            }
        }
    });
    read
}

/// Drop the statements emptied by the sweep.
fn prune(block: &mut Block) {
    block
        .statements
        .retain(|s| !matches!(s, Statement::Block(b) if b.is_empty()));
    for stmt in &mut block.statements {
        match stmt {
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                prune(then_branch);
                if let Some(els) = else_branch {
                    prune(els);
                }
            }
            Statement::While { body, .. } => prune(body),
            Statement::Block(inner) => prune(inner),
            _ => (),
        }
    }
}

impl UnusedDeclarationRemoval {
    fn is_unread(&self, expr: &Expression) -> bool {
        matches!(expr, Expression::Local(name) if !self.read.contains(name))
    }

    /// The statement left after dropping a write of `value`.
    fn keep_effects(&mut self, value: Option<Expression>) -> Statement {
        self.removed_in_sweep += 1;
        match value {
            Some(value) if !self.pure.is_side_effect_free(&value) => {
                Statement::Expression(value)
            }
            _ => Statement::Block(Block::default()),
        }
    }
}

impl ConstructVisitor for UnusedDeclarationRemoval {
    fn from(ctx: &Context) -> HastResult<Self> {
        Ok(UnusedDeclarationRemoval {
            pure: PureMembers::compute(&ctx.program, &ctx.lookup),
            read: HashSet::new(),
            removed: 0,
            removed_in_sweep: 0,
        })
    }

    fn clear_data(&mut self) {
        self.read.clear();
        self.removed_in_sweep = 0;
    }
}

impl Named for UnusedDeclarationRemoval {
    fn name() -> &'static str {
        "unused-declaration-removal"
    }

    fn description() -> &'static str {
        "remove locals that are never read"
    }

    fn dependencies() -> &'static [&'static str] {
        &["constant-substitution"]
    }

    fn resubstitution() -> Resubstitution {
        Resubstitution::ReuseTable
    }
}

impl Visitor for UnusedDeclarationRemoval {
    fn start(
        &mut self,
        body: &mut Block,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.read = read_locals(body);
        self.removed_in_sweep = 0;
        Ok(Action::Continue)
    }

    fn finish(
        &mut self,
        body: &mut Block,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        while self.removed_in_sweep > 0 {
            prune(body);
            self.removed += self.removed_in_sweep;
            self.read = read_locals(body);
            self.removed_in_sweep = 0;
            visit_block(body, BlockKind::Body, self, member, ctx)?;
        }
        Ok(Action::Continue)
    }

    fn statement(
        &mut self,
        stmt: &mut Statement,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        match stmt {
            Statement::VariableDeclaration {
                name, initializer, ..
            } if !self.read.contains(name) => {
                let value = initializer.take();
                Ok(Action::change(self.keep_effects(value)))
            }
            Statement::Assignment { target, value } if self.is_unread(target) => {
                let value = std::mem::replace(value, Expression::This);
                Ok(Action::change(self.keep_effects(Some(value))))
            }
            Statement::ParallelInvocation(calls) => {
                for call in calls {
                    if call.target.as_ref().is_some_and(|t| self.is_unread(t)) {
                        call.target = None;
                        self.removed_in_sweep += 1;
                    }
                }
                Ok(Action::Continue)
            }
            _ => Ok(Action::Continue),
        }
    }

    fn finish_program(&mut self, _ctx: &mut Context) -> HastResult<()> {
        log::debug!("Removed {} unused writes and declarations", self.removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use hast_ast::{Invocation, ParallelCall};

    const RUN: &str = "T::Run()";

    fn local(name: &str) -> Expression {
        Expression::local(FullName::new(RUN).nested(name))
    }

    fn declare(name: &str, init: Expression) -> Statement {
        Statement::declare(FullName::new(RUN).nested(name), int_ty(), Some(init))
    }

    fn effect() -> MemberDeclaration {
        member(
            "T::Effect()",
            &[],
            vec![
                Statement::assign(Expression::static_field("T::F"), int(1)),
                Statement::ret(int(1)),
            ],
        )
    }

    #[test]
    fn removes_chains_of_unread_locals() {
        let mut ctx = context(program(
            vec![],
            vec![member(
                RUN,
                &[],
                vec![
                    declare("a", int(1)),
                    declare("b", local("a")),
                    Statement::assign(local("b"), int(3)),
                    declare("c", int(2)),
                    Statement::ret(local("c")),
                ],
            )],
        ));
        UnusedDeclarationRemoval::do_pass_default(&mut ctx).unwrap();
        assert_eq!(
            body_text(&ctx, RUN),
            vec!["System.Int32 c = 2;", "return c;"]
        );
    }

    #[test]
    fn keeps_side_effects() {
        let call = Expression::call(FullName::new("T::Effect()"), vec![]);
        let mut ctx = context(program(
            vec![static_field("T::F")],
            vec![
                effect(),
                member(
                    RUN,
                    &[],
                    vec![
                        declare("a", call.clone()),
                        Statement::if_else(
                            Expression::static_field("T::F"),
                            vec![Statement::assign(local("a"), call)],
                            None,
                        ),
                        Statement::ret(int(0)),
                    ],
                ),
            ],
        ));
        UnusedDeclarationRemoval::do_pass_default(&mut ctx).unwrap();
        let text = body_text(&ctx, RUN);
        assert_eq!(text[0], "T::Effect()[];");
        assert!(text[1].contains("  T::Effect()[];"));
        assert_eq!(text[2], "return 0;");
    }

    #[test]
    fn drops_parallel_targets() {
        let mut ctx = context(program(
            vec![static_field("T::F")],
            vec![
                effect(),
                member(
                    RUN,
                    &[],
                    vec![
                        Statement::declare(FullName::new(RUN).nested("a"), int_ty(), None),
                        Statement::ParallelInvocation(vec![ParallelCall {
                            target: Some(local("a")),
                            invocation: Invocation::new_static(
                                FullName::new("T::Effect()"),
                                vec![],
                            ),
                        }]),
                        Statement::ret(int(0)),
                    ],
                ),
            ],
        ));
        UnusedDeclarationRemoval::do_pass_default(&mut ctx).unwrap();
        let body = &ctx.program.member(&FullName::new(RUN)).unwrap().body;
        let stmts = &body.as_ref().unwrap().statements;
        assert_eq!(stmts.len(), 2);
        assert!(matches!(
            &stmts[0],
            Statement::ParallelInvocation(calls) if calls[0].target.is_none()
        ));
    }
}
