//! Implements a visitor for member bodies.
//! Conversion steps implemented as a Visitor are directly invoked on a
//! [`Context`] to rewrite the body of every member using the step.
use super::action::{Action, VisResult};
use crate::Context;
use hast_ast::{Block, Expression, MemberDeclaration, Statement};
use hast_utils::HastResult;

/// Whether the constant record table has to be refreshed after a step ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resubstitution {
    /// The step never invalidates constant facts.
    #[default]
    None,
    /// Substitute again, keeping the facts found so far.
    ReuseTable,
    /// Substitute again from scratch.
    FreshTable,
}

/// Trait that describes named things. Calling [`do_pass`](Visitor::do_pass) and [`do_pass_default`](Visitor::do_pass_default)
/// require this to be implemented.
///
/// This has to be a separate trait from [`Visitor`] because these methods don't recieve `self` which
/// means that it is impossible to create dynamic trait objects.
pub trait Named {
    /// The name of a step. Is used for identifying steps.
    fn name() -> &'static str;
    /// A short description of the step.
    fn description() -> &'static str;
    /// Names of the steps that have to run before this one.
    fn dependencies() -> &'static [&'static str] {
        &[]
    }
    /// Does running the step invalidate the constant records.
    fn resubstitution() -> Resubstitution {
        Resubstitution::None
    }
}

/// Trait defining method that can be used to construct a Visitor from a
/// [Context].
/// This is useful when a step needs to construct information using the
/// whole program *before* visiting the members.
///
/// For steps that don't need to use the context, this trait can be automatically
/// be derived from [Default].
pub trait ConstructVisitor {
    /// Construct the visitor using information from the Context
    fn from(ctx: &Context) -> HastResult<Self>
    where
        Self: Sized;

    /// Clear the data stored in the visitor. Called before traversing the
    /// next member by [Visitor::do_pass].
    fn clear_data(&mut self);
}

/// Derive ConstructVisitor when [Default] is provided for a visitor.
impl<T: Default + Sized + Visitor> ConstructVisitor for T {
    fn from(_ctx: &Context) -> HastResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

/// Where a block sits in its parent statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// The body of the member.
    Body,
    /// The arm of an `if` taken when the condition holds.
    Then,
    Else,
    /// The body of a loop.
    Loop,
    /// A block statement.
    Nested,
}

/// The visiting interface for member bodies.
/// Contains two kinds of functions:
/// 1. start_<node>: Called when visiting <node> top-down.
/// 2. finish_<node>: Called when visiting <node> bottow-up.
///
/// During the traversal the members are taken out of `ctx.program`; a step
/// that needs the whole program collects what it needs in
/// [ConstructVisitor::from].
pub trait Visitor {
    /// Precondition for this step to run on the program. If this function returns
    /// None, the step triggers. Otherwise it aborts and logs the string as the reason.
    fn precondition(_ctx: &Context) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// Also visit intrinsic members and members of intrinsic types.
    fn visit_opaque_members() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Define the traversal over a member.
    /// Calls [Visitor::start], visits each statement, and finally calls
    /// [Visitor::finish]. Members without a body are skipped.
    fn traverse_member(
        &mut self,
        member: &mut MemberDeclaration,
        ctx: &mut Context,
    ) -> HastResult<()>
    where
        Self: Sized,
    {
        let Some(mut body) = member.body.take() else {
            return Ok(());
        };
        let result = self.traverse_body(&mut body, member, ctx);
        member.body = Some(body);
        result
    }

    /// Visit a body taken out of `member`.
    fn traverse_body(
        &mut self,
        body: &mut Block,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> HastResult<()>
    where
        Self: Sized,
    {
        self.start(body, member, ctx)?
            .and_then(|| visit_block(body, BlockKind::Body, self, member, ctx))?
            .and_then(|| self.finish(body, member, ctx))?;
        Ok(())
    }

    /// Run the visitor on a given [Context].
    /// The function takes the types out of the program and traverses the
    /// body of every member.
    ///
    /// After visiting a member, it calls [ConstructVisitor::clear_data] to
    /// reset the struct.
    fn do_pass(&mut self, ctx: &mut Context) -> HastResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(msg) = Self::precondition(&*ctx) {
            log::info!("Skipping `{}': {msg}", Self::name());
            return Ok(());
        }

        // Temporarily take ownership of the types from the context.
        let mut types = std::mem::take(&mut ctx.program.types);
        let mut result = Ok(());
        for member in types.iter_mut().flat_map(|t| t.members.iter_mut()) {
            if !Self::visit_opaque_members()
                && ctx.lookup.members.is_opaque(&member.name)
            {
                continue;
            }
            result = self.traverse_member(member, ctx);
            if result.is_err() {
                break;
            }
            self.clear_data();
        }
        ctx.program.types = types;
        result?;

        self.finish_program(ctx)
    }

    /// Build a [Default] implementation of this step and call [Visitor::do_pass]
    /// using it.
    #[inline(always)]
    fn do_pass_default(ctx: &mut Context) -> HastResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*ctx)?;
        visitor.do_pass(ctx)?;
        Ok(visitor)
    }

    /// Executed once after every member was visited, with the program back
    /// in the context.
    fn finish_program(&mut self, _ctx: &mut Context) -> HastResult<()> {
        Ok(())
    }

    /// Executed before the traversal of a member body begins.
    fn start(
        &mut self,
        _body: &mut Block,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after the traversal ends.
    fn finish(
        &mut self,
        _body: &mut Block,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the statements of a block.
    fn start_block(
        &mut self,
        _block: &mut Block,
        _kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the statements of a block.
    /// This method is always invoked regardless of the [Action] returned from
    /// the children.
    fn finish_block(
        &mut self,
        _block: &mut Block,
        _kind: BlockKind,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the arms of an `if` statement.
    fn start_if(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the arms of an `if` statement.
    fn finish_if(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the body of a loop.
    fn start_while(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the body of a loop.
    fn finish_while(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed at every statement that has no nested block.
    fn statement(
        &mut self,
        _stmt: &mut Statement,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }
}

/// Describes types that can be visited by things implementing [Visitor].
/// This performs a recursive walk of the tree.
///
/// It calls `Visitor::start_*` on the way down, and `Visitor::finish_*` on
/// the way up.
pub trait Visitable {
    /// Perform the traversal.
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult;
}

/// Visit a block and its statements.
pub fn visit_block(
    block: &mut Block,
    kind: BlockKind,
    visitor: &mut dyn Visitor,
    member: &MemberDeclaration,
    ctx: &mut Context,
) -> VisResult {
    visitor
        .start_block(block, kind, member, ctx)?
        .and_then(|| block.statements.visit(visitor, member, ctx))?
        .pop()
        .and_then(|| visitor.finish_block(block, kind, member, ctx))
}

impl Visitable for Statement {
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        let res = match self {
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => visitor
                .start_if(condition, member, ctx)?
                .and_then(|| {
                    visit_block(then_branch, BlockKind::Then, visitor, member, ctx)
                })?
                .and_then(|| match else_branch {
                    Some(els) => {
                        visit_block(els, BlockKind::Else, visitor, member, ctx)
                    }
                    None => Ok(Action::Continue),
                })?
                .pop()
                .and_then(|| visitor.finish_if(condition, member, ctx))?,
            Statement::While { condition, body } => visitor
                .start_while(condition, member, ctx)?
                .and_then(|| {
                    visit_block(body, BlockKind::Loop, visitor, member, ctx)
                })?
                .pop()
                .and_then(|| visitor.finish_while(condition, member, ctx))?,
            Statement::Block(block) => {
                visit_block(block, BlockKind::Nested, visitor, member, ctx)?
            }
            _ => visitor.statement(self, member, ctx)?,
        };
        Ok(res.apply_change(self))
    }
}

/// Blanket implementation for Vectors of Visitables
impl<V: Visitable> Visitable for Vec<V> {
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        for t in self {
            let res = t.visit(visitor, member, ctx)?;
            match res {
                Action::Continue | Action::SkipChildren | Action::Change(_) => {
                    continue;
                }
                Action::Stop => return Ok(Action::Stop),
            };
        }
        Ok(Action::Continue)
    }
}
