use crate::traversal::{
    Action, ConstructVisitor, Named, Resubstitution, VisResult, Visitor,
};
use crate::Context;
use hast_ast::{Expression, MemberDeclaration, Statement, TypeReference, Value};
use hast_utils::{Error, FullName, HastResult};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// Where the array stored in a holder comes from.
#[derive(Clone, Debug, PartialEq)]
enum ArraySource {
    /// `new T[n]` with a literal `n`.
    Created(u32),
    /// Another holder.
    Holder(FullName),
    Unknown,
}

impl ArraySource {
    fn of(expr: &Expression) -> Self {
        match expr {
            Expression::ArrayCreation { length, .. } => length
                .as_literal()
                .and_then(|v| v.as_integer())
                .and_then(|n| u32::try_from(n).ok())
                .map_or(ArraySource::Unknown, ArraySource::Created),
            Expression::Invocation(inv) => {
                ArraySource::Holder(inv.member.return_slot())
            }
            other => other
                .holder()
                .map_or(ArraySource::Unknown, ArraySource::Holder),
        }
    }
}

/// Determines the length of every array holder and replaces reads of
/// `Length` with literals.
///
/// Hardware can't allocate memory dynamically, so every array has to have a
/// length known at compile time: either created with a literal length and
/// passed around unchanged, or given in
/// [hast_utils::HardwareGenerationConfig::array_lengths].
pub struct ArrayLengthResolution {
    lengths: BTreeMap<FullName, u32>,
    replaced: usize,
}

impl ArrayLengthResolution {
    /// Holders of array type, and every write to a holder.
    fn collect(
        ctx: &Context,
    ) -> (BTreeSet<FullName>, Vec<(FullName, ArraySource)>) {
        let is_array = |ty: &TypeReference| ty.element_type().is_some();
        let mut holders = BTreeSet::new();
        let mut writes = vec![];

        for ty in ctx.program.types.iter().filter(|t| !t.is_intrinsic) {
            holders.extend(
                ty.fields.iter().filter(|f| is_array(&f.ty)).map(|f| f.name),
            );
        }
        for member in ctx.program.members() {
            if ctx.lookup.members.is_opaque(&member.name) {
                continue;
            }
            let Some(body) = &member.body else {
                continue;
            };
            holders.extend(
                member
                    .parameters
                    .iter()
                    .filter(|p| is_array(&p.ty))
                    .map(|p| p.name),
            );
            if is_array(&member.return_type) {
                holders.insert(member.name.return_slot());
            }
            body.for_each_statement(&mut |stmt| match stmt {
                Statement::VariableDeclaration {
                    name,
                    ty,
                    initializer,
                } if is_array(ty) => {
                    holders.insert(*name);
                    if let Some(init) = initializer {
                        writes.push((*name, ArraySource::of(init)));
                    }
                }
                Statement::Assignment { target, value } => {
                    if let Some(holder) = target.holder() {
                        writes.push((holder, ArraySource::of(value)));
                    }
                }
                Statement::Return(Some(value)) => {
                    writes.push((
                        member.name.return_slot(),
                        ArraySource::of(value),
                    ));
                }
                Statement::ParallelInvocation(calls) => {
                    for call in calls {
                        if let Some(holder) =
                            call.target.as_ref().and_then(|t| t.holder())
                        {
                            writes.push((
                                holder,
                                ArraySource::Holder(
                                    call.invocation.member.return_slot(),
                                ),
                            ));
                        }
                    }
                }
                _ => (),
            });
            body.for_each_expression(&mut |expr| {
                let Expression::Invocation(inv) = expr else {
                    return;
                };
                let Some(sig) = ctx.lookup.members.get(&inv.member) else {
                    return;
                };
                for (param, arg) in sig.parameters.iter().zip(&inv.arguments) {
                    if is_array(&param.ty) {
                        writes.push((param.name, ArraySource::of(&arg.value)));
                    }
                }
            });
        }
        writes.retain(|(holder, _)| holders.contains(holder));
        (holders, writes)
    }

    fn resolve(ctx: &Context) -> HastResult<BTreeMap<FullName, u32>> {
        let (holders, writes) = Self::collect(ctx);
        let overrides = &ctx.config.array_lengths;
        let mut lengths = overrides.clone();
        loop {
            let mut changed = false;
            for (holder, source) in &writes {
                if overrides.contains_key(holder) {
                    continue;
                }
                let length = match source {
                    ArraySource::Created(n) => Some(*n),
                    ArraySource::Holder(from) => lengths.get(from).copied(),
                    ArraySource::Unknown => None,
                };
                let Some(length) = length else {
                    continue;
                };
                match lengths.get(holder) {
                    None => {
                        lengths.insert(*holder, length);
                        changed = true;
                    }
                    Some(&known) if known != length => {
                        return Err(Error::configuration(format!(
                            "The array holder `{holder}' is assigned arrays of length {known} and {length}. Set its length in the configuration."
                        )));
                    }
                    Some(_) => (),
                }
            }
            if !changed {
                break;
            }
        }

        let unknown = holders
            .iter()
            .filter(|h| !lengths.contains_key(h))
            .collect_vec();
        if let Some(first) = unknown.first() {
            log::debug!("Arrays without a length: {}", unknown.iter().join(", "));
            return Err(Error::MissingArrayLength(**first));
        }
        Ok(lengths)
    }

    fn length_of(&self, array: &Expression) -> Option<u32> {
        match ArraySource::of(array) {
            ArraySource::Created(n) => Some(n),
            ArraySource::Holder(holder) => self.lengths.get(&holder).copied(),
            ArraySource::Unknown => None,
        }
    }

    fn rewrite(&mut self, expr: &mut Expression) {
        if let Expression::ArrayLength(array) = expr {
            if let Some(length) = self.length_of(array) {
                *expr = Expression::Literal(Value::Int32(length as i32));
                self.replaced += 1;
                return;
            }
        }
        for child in expr.children_mut() {
            self.rewrite(child);
        }
    }
}

impl ConstructVisitor for ArrayLengthResolution {
    fn from(ctx: &Context) -> HastResult<Self> {
        Ok(ArrayLengthResolution {
            lengths: Self::resolve(ctx)?,
            replaced: 0,
        })
    }

    fn clear_data(&mut self) {}
}

impl Named for ArrayLengthResolution {
    fn name() -> &'static str {
        "array-length-resolution"
    }

    fn description() -> &'static str {
        "determine the length of every array"
    }

    fn dependencies() -> &'static [&'static str] {
        &["constant-substitution"]
    }

    fn resubstitution() -> Resubstitution {
        Resubstitution::ReuseTable
    }
}

impl Visitor for ArrayLengthResolution {
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
                self.rewrite(target);
                self.rewrite(value);
            }
            Statement::ParallelInvocation(calls) => {
                for call in calls {
                    for arg in &mut call.invocation.arguments {
                        self.rewrite(&mut arg.value);
                    }
                }
            }
            _ => (),
        }
        Ok(Action::Continue)
    }

    fn finish_program(&mut self, ctx: &mut Context) -> HastResult<()> {
        log::debug!(
            "{} array lengths, {} reads of Length replaced",
            self.lengths.len(),
            self.replaced
        );
        ctx.array_lengths = std::mem::take(&mut self.lengths);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use hast_ast::PrimitiveType;

    const RUN: &str = "T::Run()";

    fn array_ty() -> TypeReference {
        TypeReference::array_of(int_ty())
    }

    fn new_array(len: i32) -> Expression {
        Expression::ArrayCreation {
            element_type: int_ty(),
            length: Box::new(int(len)),
        }
    }

    fn local(name: &str) -> Expression {
        Expression::local(FullName::new(RUN).nested(name))
    }

    fn declare(name: &str, init: Expression) -> Statement {
        Statement::declare(FullName::new(RUN).nested(name), array_ty(), Some(init))
    }

    #[test]
    fn lengths_follow_assignments() {
        let mut ctx = context(program(
            vec![],
            vec![member(
                RUN,
                &[],
                vec![
                    declare("a", new_array(4)),
                    declare("b", local("a")),
                    Statement::ret(Expression::ArrayLength(Box::new(local("b")))),
                ],
            )],
        ));
        ArrayLengthResolution::do_pass_default(&mut ctx).unwrap();
        assert_eq!(body_text(&ctx, RUN)[2], "return 4;");
        assert_eq!(ctx.array_lengths.get(&FullName::new("T::Run()::b")), Some(&4));
    }

    #[test]
    fn missing_length_is_an_error() {
        let mut ctx = context(program(
            vec![],
            vec![member(
                RUN,
                &[],
                vec![
                    Statement::declare(
                        FullName::new("T::Run()::a"),
                        array_ty(),
                        Some(Expression::ArrayCreation {
                            element_type: TypeReference::primitive(PrimitiveType::Byte),
                            length: Box::new(Expression::static_field("T::N")),
                        }),
                    ),
                    Statement::ret(int(0)),
                ],
            )],
        ));
        let err = ArrayLengthResolution::do_pass_default(&mut ctx).err().unwrap();
        assert!(matches!(err, Error::MissingArrayLength(name) if name == FullName::new("T::Run()::a")));

        ctx.config.array_lengths.insert(FullName::new("T::Run()::a"), 16);
        ArrayLengthResolution::do_pass_default(&mut ctx).unwrap();
        assert_eq!(ctx.array_lengths.get(&FullName::new("T::Run()::a")), Some(&16));
    }

    #[test]
    fn conflicting_lengths_are_rejected() {
        let mut ctx = context(program(
            vec![],
            vec![member(
                RUN,
                &[],
                vec![
                    declare("a", new_array(4)),
                    Statement::assign(local("a"), new_array(8)),
                    Statement::ret(int(0)),
                ],
            )],
        ));
        let err = ArrayLengthResolution::do_pass_default(&mut ctx).err().unwrap();
        assert!(err.is_configuration_error());
    }
}
