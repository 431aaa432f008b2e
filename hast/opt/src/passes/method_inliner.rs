use crate::analysis::PureMembers;
use crate::traversal::{Action, ConstructVisitor, Named, VisResult, Visitor};
use crate::Context;
use hast_ast::{Expression, MemberDeclaration, Statement};
use hast_utils::{Error, FullName, HastResult, Warning, WarningCode};
use std::collections::{BTreeMap, BTreeSet};

/// A member whose invocations can be replaced by its returned expression.
struct Inlinable {
    parameters: Vec<FullName>,
    returned: Expression,
}

/// Inlines members whose body is a single `return` statement. Only members
/// marked inlinable, or listed in the configuration, are inlined.
///
/// An invocation is inlined only if its arguments can be evaluated any number
/// of times without changing the behavior of the program, since the
/// parameters are replaced by copies of them.
pub struct MethodInliner {
    members: BTreeMap<FullName, Inlinable>,
    pure: PureMembers,
    /// Members being inlined, innermost last.
    stack: Vec<FullName>,
    warnings: Vec<Warning>,
    inlined: usize,
}

impl MethodInliner {
    fn candidate(
        member: &MemberDeclaration,
        ctx: &Context,
    ) -> Result<Inlinable, String> {
        if ctx.lookup.members.is_opaque(&member.name) {
            return Err("it has no transformable body".to_string());
        }
        if member.parameters.iter().any(|p| p.mode.takes_address()) {
            return Err("it has ref or out parameters".to_string());
        }
        let returned = match member.body.as_ref().map(|b| b.statements.as_slice()) {
            Some([Statement::Return(Some(value))]) => value.clone(),
            _ => {
                return Err(
                    "its body is not a single return statement".to_string()
                )
            }
        };
        let mut recursive = false;
        returned.for_each(&mut |e| {
            recursive |= matches!(e, Expression::Invocation(inv) if inv.member == member.name)
        });
        if recursive {
            return Err("it invokes itself".to_string());
        }
        Ok(Inlinable {
            parameters: member.parameters.iter().map(|p| p.name).collect(),
            returned,
        })
    }

    /// The expression replacing `expr`, if it is an invocation that can be
    /// inlined.
    fn inline_call(&self, expr: &Expression) -> Option<Expression> {
        let Expression::Invocation(inv) = expr else {
            return None;
        };
        let inlinable = self.members.get(&inv.member)?;
        if self.stack.contains(&inv.member) {
            return None;
        }
        let droppable = inv.arguments.iter().all(|a| {
            !a.mode.takes_address() && self.pure.is_side_effect_free(&a.value)
        }) && inv
            .target
            .as_deref()
            .map_or(true, |t| self.pure.is_side_effect_free(t));
        if !droppable {
            log::debug!("Not inlining `{}': arguments have effects", inv.member);
            return None;
        }
        let arguments: BTreeMap<FullName, &Expression> = inlinable
            .parameters
            .iter()
            .copied()
            .zip(inv.arguments.iter().map(|a| &a.value))
            .collect();
        let mut result = inlinable.returned.clone();
        replace_reads(&mut result, &arguments, inv.target.as_deref());
        Some(result)
    }

    fn rewrite(&mut self, expr: &mut Expression) {
        for child in expr.children_mut() {
            self.rewrite(child);
        }
        let member = match expr {
            Expression::Invocation(inv) => inv.member,
            _ => return,
        };
        if let Some(mut inlined) = self.inline_call(expr) {
            self.stack.push(member);
            self.rewrite(&mut inlined);
            self.stack.pop();
            *expr = inlined;
            self.inlined += 1;
        }
    }
}

/// Replace parameters by the arguments and `this` by the target.
fn replace_reads(
    expr: &mut Expression,
    arguments: &BTreeMap<FullName, &Expression>,
    target: Option<&Expression>,
) {
    match expr {
        Expression::Parameter(name) => {
            if let Some(arg) = arguments.get(name) {
                *expr = (*arg).clone();
            }
        }
        Expression::This => {
            if let Some(target) = target {
                *expr = target.clone();
            }
        }
        _ => {
            for child in expr.children_mut() {
                replace_reads(child, arguments, target);
            }
        }
    }
}

impl ConstructVisitor for MethodInliner {
    fn from(ctx: &Context) -> HastResult<Self> {
        let mut requested: BTreeSet<FullName> = ctx
            .program
            .members()
            .filter(|m| m.is_inlinable)
            .map(|m| m.name)
            .collect();
        for name in &ctx.config.additional_inlinable_members {
            if !ctx.lookup.members.contains(name) {
                return Err(Error::configuration(format!(
                    "The member `{name}' requested for inlining doesn't exist."
                )));
            }
            requested.insert(*name);
        }

        let mut members = BTreeMap::new();
        let mut warnings = vec![];
        for name in requested {
            let Some(member) = ctx.program.member(&name) else {
                continue;
            };
            match Self::candidate(member, ctx) {
                Ok(inlinable) => {
                    members.insert(name, inlinable);
                }
                Err(reason) => warnings.push(
                    Warning::new(
                        WarningCode::InliningSkipped,
                        format!("Not inlined because {reason}."),
                    )
                    .with_subject(name),
                ),
            }
        }

        Ok(MethodInliner {
            members,
            pure: PureMembers::compute(&ctx.program, &ctx.lookup),
            stack: vec![],
            warnings,
            inlined: 0,
        })
    }

    fn clear_data(&mut self) {
        self.stack.clear();
    }
}

impl Named for MethodInliner {
    fn name() -> &'static str {
        "method-inliner"
    }

    fn description() -> &'static str {
        "inline members whose body is a single return statement"
    }

    fn dependencies() -> &'static [&'static str] {
        &["well-formed"]
    }
}

impl Visitor for MethodInliner {
    fn precondition(ctx: &Context) -> Option<String> {
        (!ctx.config.enable_method_inlining)
            .then(|| "method inlining is disabled".to_string())
    }

    fn start_if(
        &mut self,
        condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.rewrite(condition);
        Ok(Action::Continue)
    }

    fn start_while(
        &mut self,
        condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.rewrite(condition);
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
                initializer: Some(e),
                ..
            }
            | Statement::Expression(e)
            | Statement::Return(Some(e)) => self.rewrite(e),
            Statement::Assignment { target, value } => {
                for child in target.children_mut() {
                    self.rewrite(child);
                }
                self.rewrite(value);
            }
            _ => (),
        }
        Ok(Action::Continue)
    }

    fn finish_program(&mut self, ctx: &mut Context) -> HastResult<()> {
        for warning in self.warnings.drain(..) {
            ctx.add_warning(warning);
        }
        log::debug!("Inlined {} invocations", self.inlined);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use hast_ast::BinaryOperator;

    const TWICE: &str = "T::Twice(System.Int32)";

    fn twice(inlinable: bool) -> MemberDeclaration {
        let p = Expression::parameter(FullName::new(TWICE).nested("p"));
        let mut m = member(
            TWICE,
            &[("p", int_ty())],
            vec![Statement::ret(Expression::binary(
                BinaryOperator::Multiply,
                p,
                int(2),
            ))],
        );
        m.is_inlinable = inlinable;
        m
    }

    fn caller(arg: Expression) -> MemberDeclaration {
        member(
            "T::Run()",
            &[],
            vec![Statement::ret(Expression::call(
                FullName::new(TWICE),
                vec![arg],
            ))],
        )
    }

    #[test]
    fn inlines_single_return_members() {
        let mut ctx = context(program(vec![], vec![twice(true), caller(int(3))]));
        MethodInliner::do_pass_default(&mut ctx).unwrap();
        assert_eq!(body_text(&ctx, "T::Run()"), vec!["return (3 * 2);"]);
    }

    #[test]
    fn respects_configuration() {
        let mut ctx = context(program(vec![], vec![twice(false), caller(int(3))]));
        MethodInliner::do_pass_default(&mut ctx).unwrap();
        assert_eq!(
            body_text(&ctx, "T::Run()"),
            vec!["return T::Twice(System.Int32)[3];"]
        );

        ctx.config.additional_inlinable_members = vec![FullName::new(TWICE)];
        MethodInliner::do_pass_default(&mut ctx).unwrap();
        assert_eq!(body_text(&ctx, "T::Run()"), vec!["return (3 * 2);"]);

        ctx.config.additional_inlinable_members = vec![FullName::new("T::Nope()")];
        let err = MethodInliner::do_pass_default(&mut ctx).err().unwrap();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn keeps_calls_with_effectful_arguments() {
        let mut writer = member(
            "T::Write()",
            &[],
            vec![
                Statement::assign(Expression::static_field("T::F"), int(1)),
                Statement::ret(int(1)),
            ],
        );
        writer.is_inlinable = true;
        let arg = Expression::call(FullName::new("T::Write()"), vec![]);
        let mut ctx = context(program(
            vec![static_field("T::F")],
            vec![twice(true), writer, caller(arg)],
        ));
        MethodInliner::do_pass_default(&mut ctx).unwrap();
        assert_eq!(
            body_text(&ctx, "T::Run()"),
            vec!["return T::Twice(System.Int32)[T::Write()[]];"]
        );
        assert!(ctx
            .warnings()
            .iter()
            .any(|w| w.code == WarningCode::InliningSkipped
                && w.subject == Some(FullName::new("T::Write()"))));
    }
}
