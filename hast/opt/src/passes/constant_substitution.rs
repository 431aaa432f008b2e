use crate::analysis::{
    ConstantValueCollector, ConstantValuesTable, PureMembers, ScopeId,
    ScopeTracker,
};
use crate::eval;
use crate::traversal::{
    Action, BlockKind, ConstructVisitor, Named, VisResult, Visitor,
};
use crate::Context;
use hast_ast::{Block, Expression, Invocation, MemberDeclaration, Statement};
use hast_utils::{FullName, HastResult};

/// Replaces reads of value holders that provably hold a single literal with
/// that literal, and folds the operators whose operands became literals.
///
/// Every round first collects facts about parameters, fields and return
/// slots over the whole program, then visits each member: facts about its
/// locals are collected on top of the global ones before the reads are
/// rewritten. Rounds repeat until one of them doesn't change anything.
///
/// Writes are never removed; that is left to
/// [super::UnusedDeclarationRemoval].
pub struct ConstantSubstitution {
    globals: ConstantValuesTable,
    pure: PureMembers,
    /// Facts for the member being visited.
    table: ConstantValuesTable,
    tracker: ScopeTracker,
    /// Facts for every member visited so far.
    union: ConstantValuesTable,
    replacements: usize,
}

impl ConstantSubstitution {
    fn new(globals: ConstantValuesTable, pure: PureMembers) -> Self {
        ConstantSubstitution {
            union: globals.clone(),
            globals,
            pure,
            table: ConstantValuesTable::default(),
            tracker: ScopeTracker::program(),
            replacements: 0,
        }
    }

    /// Run rounds of substitution until the program doesn't change any more.
    /// With `reuse` the facts of the previous run are kept, so holders found
    /// not to be constant stay that way. Returns the number of replaced
    /// expressions.
    pub fn substitute(ctx: &mut Context, reuse: bool) -> HastResult<usize> {
        if !ctx.config.enable_constant_substitution {
            log::info!("Constant substitution is disabled.");
            return Ok(0);
        }
        let base = if reuse {
            std::mem::take(&mut ctx.constant_values)
        } else {
            ConstantValuesTable::default()
        };

        let mut total = 0;
        for round in 1.. {
            let globals =
                ConstantValueCollector::collect_globals(ctx, base.clone())?;
            let pure = PureMembers::compute(&ctx.program, &ctx.lookup);
            let mut visitor = ConstantSubstitution::new(globals, pure);
            visitor.do_pass(ctx)?;
            log::debug!(
                "Round {round} replaced {} expressions",
                visitor.replacements
            );
            total += visitor.replacements;
            ctx.constant_values = visitor.union;
            if visitor.replacements == 0 {
                break;
            }
        }
        ctx.substitution_count += total;
        Ok(total)
    }

    /// The literal a read of a holder can be replaced with.
    fn holder_value(&self, expr: &Expression, scope: &ScopeId) -> Option<hast_ast::Value> {
        match expr {
            Expression::Local(name) | Expression::Parameter(name) => {
                self.table.lookup(name, scope)
            }
            Expression::Field { field, target } => {
                let droppable = target
                    .as_deref()
                    .map_or(true, |t| self.pure.is_side_effect_free(t));
                if droppable {
                    self.table.lookup(field, scope)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// The literal returned by a call of a pure member, if the call can be
    /// dropped.
    fn return_value(&self, inv: &Invocation) -> Option<hast_ast::Value> {
        let droppable = self.pure.is_pure(&inv.member)
            && inv
                .target
                .as_deref()
                .map_or(true, |t| self.pure.is_side_effect_free(t))
            && inv.arguments.iter().all(|a| {
                !a.mode.takes_address()
                    && self.pure.is_side_effect_free(&a.value)
            });
        if !droppable {
            return None;
        }
        self.table
            .get(&inv.member.return_slot(), &ScopeId::program())
            .and_then(|f| f.as_literal())
    }

    fn rewrite(
        &mut self,
        expr: &mut Expression,
        scope: &ScopeId,
        member: FullName,
        ctx: &mut Context,
    ) {
        if let Some(value) = self.holder_value(expr, scope) {
            log::debug!("{member}: {expr:?} is {value}");
            *expr = Expression::Literal(value);
            self.replacements += 1;
            return;
        }
        match expr {
            // The operand is a holder whose address is taken, not a read.
            Expression::AddressOf(_) => return,
            Expression::Invocation(inv) => {
                if let Some(target) = inv.target.as_deref_mut() {
                    self.rewrite(target, scope, member, ctx);
                }
                for arg in &mut inv.arguments {
                    if !arg.mode.takes_address() {
                        self.rewrite(&mut arg.value, scope, member, ctx);
                    }
                }
            }
            _ => {
                for child in expr.children_mut() {
                    self.rewrite(child, scope, member, ctx);
                }
            }
        }

        if let Expression::Invocation(inv) = expr {
            if let Some(value) = self.return_value(inv) {
                log::debug!("{member}: {} returns {value}", inv.member);
                *expr = Expression::Literal(value);
                self.replacements += 1;
            }
            return;
        }
        self.fold(expr, member, ctx);
    }

    fn fold(&mut self, expr: &mut Expression, member: FullName, ctx: &mut Context) {
        if !matches!(
            expr,
            Expression::Unary { .. }
                | Expression::Binary { .. }
                | Expression::Cast { .. }
                | Expression::Conditional { .. }
        ) {
            return;
        }
        let mut errors = vec![];
        let value = eval::evaluate_expression(expr, &mut |_| None, &mut errors);
        for err in errors {
            ctx.add_warning(err.into_warning().with_subject(member));
        }
        if let Some(value) = value {
            *expr = Expression::Literal(value);
            self.replacements += 1;
        }
    }

    fn rewrite_read(
        &mut self,
        expr: &mut Expression,
        member: FullName,
        ctx: &mut Context,
    ) {
        let scope = self.tracker.current();
        self.rewrite(expr, &scope, member, ctx);
    }

    /// Rewrite the reads inside an assignment target, but not the written
    /// holder itself.
    fn rewrite_target(
        &mut self,
        target: &mut Expression,
        member: FullName,
        ctx: &mut Context,
    ) {
        match target {
            Expression::Local(_) | Expression::Parameter(_) => (),
            Expression::Field { target, .. } => {
                if let Some(object) = target.as_deref_mut() {
                    self.rewrite_read(object, member, ctx);
                }
            }
            other => {
                for child in other.children_mut() {
                    self.rewrite_read(child, member, ctx);
                }
            }
        }
    }
}

impl ConstructVisitor for ConstantSubstitution {
    fn from(ctx: &Context) -> HastResult<Self> {
        Ok(ConstantSubstitution::new(
            ctx.constant_values.clone(),
            PureMembers::compute(&ctx.program, &ctx.lookup),
        ))
    }

    fn clear_data(&mut self) {
        self.table = ConstantValuesTable::default();
        self.tracker = ScopeTracker::program();
    }
}

impl Named for ConstantSubstitution {
    fn name() -> &'static str {
        "constant-substitution"
    }

    fn description() -> &'static str {
        "replace holders that only ever hold one literal with the literal"
    }

    fn dependencies() -> &'static [&'static str] {
        &["method-inliner"]
    }
}

impl Visitor for ConstantSubstitution {
    fn start(
        &mut self,
        body: &mut Block,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.tracker = ScopeTracker::new(member.name);
        self.table = ConstantValueCollector::collect_locals(
            body,
            member,
            ctx,
            self.globals.clone(),
        )?;
        Ok(Action::Continue)
    }

    fn finish(
        &mut self,
        _body: &mut Block,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.union.merge(&self.table);
        Ok(Action::Continue)
    }

    fn start_block(
        &mut self,
        _block: &mut Block,
        kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.tracker.enter(kind);
        Ok(Action::Continue)
    }

    fn finish_block(
        &mut self,
        _block: &mut Block,
        kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.tracker.exit(kind);
        Ok(Action::Continue)
    }

    fn start_if(
        &mut self,
        condition: &mut Expression,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.rewrite_read(condition, member.name, ctx);
        Ok(Action::Continue)
    }

    fn start_while(
        &mut self,
        condition: &mut Expression,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.rewrite_read(condition, member.name, ctx);
        Ok(Action::Continue)
    }

    fn statement(
        &mut self,
        stmt: &mut Statement,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        let name = member.name;
        match stmt {
            Statement::VariableDeclaration {
                initializer: Some(init),
                ..
            } => self.rewrite_read(init, name, ctx),
            Statement::Assignment { target, value } => {
                self.rewrite_target(target, name, ctx);
                self.rewrite_read(value, name, ctx);
            }
            Statement::Expression(e) | Statement::Return(Some(e)) => {
                self.rewrite_read(e, name, ctx)
            }
            Statement::ParallelInvocation(calls) => {
                for call in calls {
                    if let Some(target) = call.invocation.target.as_deref_mut() {
                        self.rewrite_read(target, name, ctx);
                    }
                    for arg in &mut call.invocation.arguments {
                        if !arg.mode.takes_address() {
                            self.rewrite_read(&mut arg.value, name, ctx);
                        }
                    }
                }
            }
            _ => (),
        }
        Ok(Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use hast_ast::{BinaryOperator, ParallelCall};
    use hast_utils::WarningCode;

    const RUN: &str = "T::Run(System.Boolean)";

    fn local(name: &str) -> Expression {
        Expression::local(FullName::new(RUN).nested(name))
    }

    fn declare(name: &str, init: Option<Expression>) -> Statement {
        Statement::declare(FullName::new(RUN).nested(name), int_ty(), init)
    }

    fn store(field: &str, value: Expression) -> Statement {
        Statement::assign(Expression::static_field(field), value)
    }

    fn entry(body: Vec<Statement>) -> MemberDeclaration {
        let mut m = member(RUN, &[("c", bool_ty())], body);
        m.is_hardware_entry = true;
        m
    }

    fn fields() -> Vec<hast_ast::FieldDeclaration> {
        ["T::A", "T::B", "T::C"].iter().map(|f| static_field(f)).collect()
    }

    #[test]
    fn single_literal_write_is_substituted() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("y", Some(int(7))),
                store("T::A", Expression::binary(BinaryOperator::Add, local("y"), int(1))),
                Statement::ret(int(0)),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        assert_eq!(body_text(&ctx, RUN)[1], "T::A = 8;");
        assert!(ctx.substitution_count >= 2);
    }

    #[test]
    fn sibling_branch_writes_are_not_substituted() {
        let c = Expression::parameter(FullName::new(RUN).nested("c"));
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("x", None),
                Statement::if_else(
                    c,
                    vec![
                        Statement::assign(local("x"), int(5)),
                        store("T::A", local("x")),
                    ],
                    Some(vec![
                        Statement::assign(local("x"), int(6)),
                        store("T::B", local("x")),
                    ]),
                ),
                Statement::ret(int(0)),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        let text = body_text(&ctx, RUN);
        assert!(text[1].contains("T::A = x;"), "{}", text[1]);
        assert!(text[1].contains("T::B = x;"), "{}", text[1]);
        assert!(text[1].starts_with("if (c)"));
    }

    #[test]
    fn conflicting_writes_erase_the_literal() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("z", Some(int(3))),
                Statement::assign(local("z"), int(4)),
                store("T::A", local("z")),
                Statement::ret(int(0)),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        assert_eq!(body_text(&ctx, RUN)[2], "T::A = z;");
    }

    #[test]
    fn provably_dead_branch_is_ignored() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("w", Some(int(1))),
                Statement::if_else(
                    Expression::binary(BinaryOperator::Equality, local("w"), int(2)),
                    vec![Statement::assign(local("w"), int(9))],
                    None,
                ),
                store("T::A", local("w")),
                Statement::ret(int(0)),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        let text = body_text(&ctx, RUN);
        assert!(text[1].starts_with("if (false)"), "{}", text[1]);
        assert_eq!(text[2], "T::A = 1;");
    }

    #[test]
    fn calls_of_pure_members_are_folded_across_rounds() {
        let helper = "T::Helper(System.Int32)";
        let p = Expression::parameter(FullName::new(helper).nested("p"));
        let mut ctx = context(program(
            fields(),
            vec![
                entry(vec![
                    store(
                        "T::A",
                        Expression::call(FullName::new(helper), vec![int(4)]),
                    ),
                    Statement::ret(int(0)),
                ]),
                member(
                    helper,
                    &[("p", int_ty())],
                    vec![Statement::ret(Expression::binary(
                        BinaryOperator::Add,
                        p,
                        int(1),
                    ))],
                ),
            ],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        assert_eq!(body_text(&ctx, RUN)[0], "T::A = 5;");
        assert_eq!(body_text(&ctx, helper)[0], "return 5;");
    }

    #[test]
    fn parallel_call_arguments_are_parameter_writes() {
        let work = "T::Work(System.Int32)";
        let p = Expression::parameter(FullName::new(work).nested("p"));
        let call = |target: &str, arg: i32| ParallelCall {
            target: Some(Expression::static_field(target)),
            invocation: Invocation::new_static(
                FullName::new(work),
                vec![int(arg)],
            ),
        };
        let mut ctx = context(program(
            fields(),
            vec![
                entry(vec![
                    store(
                        "T::A",
                        Expression::call(FullName::new(work), vec![int(5)]),
                    ),
                    Statement::ParallelInvocation(vec![
                        call("T::B", 7),
                        call("T::C", 9),
                    ]),
                    Statement::ret(int(0)),
                ]),
                member(
                    work,
                    &[("p", int_ty())],
                    vec![Statement::ret(Expression::binary(
                        BinaryOperator::Add,
                        p,
                        int(1),
                    ))],
                ),
            ],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        assert_eq!(body_text(&ctx, work)[0], "return (p + 1);");
    }

    #[test]
    fn host_driven_holders_stay() {
        let c = Expression::parameter(FullName::new(RUN).nested("c"));
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                Statement::if_else(c, vec![store("T::A", int(1))], None),
                Statement::ret(Expression::static_field("T::A")),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        // T declares an entry member, so its fields are written by the host.
        assert_eq!(body_text(&ctx, RUN)[1], "return T::A;");
    }

    #[test]
    fn substitution_is_idempotent() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("y", Some(int(7))),
                declare("z", Some(Expression::binary(BinaryOperator::Multiply, local("y"), int(6)))),
                store("T::A", local("z")),
                Statement::ret(local("z")),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        let once = ctx.program.clone();
        assert_eq!(ConstantSubstitution::substitute(&mut ctx, false).unwrap(), 0);
        assert_eq!(ctx.program, once);
        assert_eq!(ConstantSubstitution::substitute(&mut ctx, true).unwrap(), 0);
        assert_eq!(ctx.program, once);
        assert_eq!(body_text(&ctx, RUN)[2], "T::A = 42;");
    }

    #[test]
    fn division_by_zero_is_reported_not_folded() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                store("T::A", Expression::binary(BinaryOperator::Divide, int(1), int(0))),
                Statement::ret(int(0)),
            ])],
        ));
        ConstantSubstitution::substitute(&mut ctx, false).unwrap();
        assert_eq!(body_text(&ctx, RUN)[0], "T::A = (1 / 0);");
        let warnings = ctx.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::UnsupportedEvaluation);
        assert_eq!(warnings[0].subject, Some(FullName::new(RUN)));
    }

    #[test]
    fn disabled_substitution_changes_nothing() {
        let mut ctx = context(program(
            fields(),
            vec![entry(vec![
                declare("y", Some(int(7))),
                store("T::A", local("y")),
                Statement::ret(int(0)),
            ])],
        ));
        ctx.config.enable_constant_substitution = false;
        assert_eq!(ConstantSubstitution::substitute(&mut ctx, false).unwrap(), 0);
        assert_eq!(body_text(&ctx, RUN)[1], "T::A = y;");
    }
}
