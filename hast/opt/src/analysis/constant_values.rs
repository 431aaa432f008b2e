//! Records of which value holders hold a single compile-time literal.
use super::scope::{ScopeId, ScopeTracker};
use crate::eval;
use crate::traversal::{
    Action, BlockKind, ConstructVisitor, Named, VisResult, Visitor,
};
use crate::Context;
use hast_ast::{Block, Expression, Invocation, MemberDeclaration, Statement, Value};
use hast_utils::{HastResult, HolderName};
use std::collections::{btree_map::Entry, BTreeMap};

/// What is known about a holder in a scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstantFact {
    Literal(Value),
    /// Written with a non-literal, with two different literals, or its
    /// address was taken. Never becomes constant again.
    NotConstant,
}

impl ConstantFact {
    /// The fact describing a write of `value`.
    pub fn of_write(value: &Expression) -> Self {
        match value {
            Expression::Literal(v) => ConstantFact::Literal(*v),
            _ => ConstantFact::NotConstant,
        }
    }

    pub fn as_literal(&self) -> Option<Value> {
        match self {
            ConstantFact::Literal(v) => Some(*v),
            ConstantFact::NotConstant => None,
        }
    }
}

/// `(holder, scope) -> fact`. Ordered so that iteration and serialization
/// are deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantValuesTable {
    records: BTreeMap<(HolderName, ScopeId), ConstantFact>,
}

impl ConstantValuesTable {
    /// Record a fact. A second, different literal turns the record into
    /// [ConstantFact::NotConstant]. Returns true if the table changed.
    pub fn record(
        &mut self,
        holder: HolderName,
        scope: ScopeId,
        fact: ConstantFact,
    ) -> bool {
        match self.records.entry((holder, scope)) {
            Entry::Vacant(entry) => {
                entry.insert(fact);
                true
            }
            Entry::Occupied(mut entry) => {
                let existing = *entry.get();
                if existing == ConstantFact::NotConstant || existing == fact {
                    return false;
                }
                entry.insert(ConstantFact::NotConstant);
                true
            }
        }
    }

    pub fn invalidate(&mut self, holder: HolderName, scope: ScopeId) -> bool {
        self.record(holder, scope, ConstantFact::NotConstant)
    }

    pub fn get(&self, holder: &HolderName, scope: &ScopeId) -> Option<&ConstantFact> {
        self.records.get(&(*holder, scope.clone()))
    }

    /// The literal `holder` has when read in `scope`. The nearest enclosing
    /// scope with a record decides.
    pub fn lookup(&self, holder: &HolderName, scope: &ScopeId) -> Option<Value> {
        scope
            .ancestors()
            .find_map(|s| self.get(holder, &s))
            .and_then(ConstantFact::as_literal)
    }

    /// Merge the records of `other` into this table using the same conflict
    /// rule as [ConstantValuesTable::record].
    pub fn merge(&mut self, other: &ConstantValuesTable) {
        for ((holder, scope), fact) in &other.records {
            self.record(*holder, scope.clone(), *fact);
        }
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&(HolderName, ScopeId), &ConstantFact)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear()
    }

    /// Number of records holding a literal.
    pub fn literal_count(&self) -> usize {
        self.records
            .values()
            .filter(|f| matches!(f, ConstantFact::Literal(_)))
            .count()
    }
}

/// Which holders a [ConstantValueCollector] tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HolderClass {
    /// Parameters, fields, properties and return slots.
    Global,
    /// Locals of one member body.
    Local,
}

/// Tables of the arms of a branch, merged when the branch is finished.
struct BranchFrame {
    parent: ConstantValuesTable,
    arms: Vec<ConstantValuesTable>,
    /// The value of the condition, if it is known.
    decision: Option<bool>,
}

/// Collects [ConstantFact]s by looking at every write of a holder.
///
/// A write only counts as literal if the written expression is a literal.
/// Facts found in an arm of a branch or in a loop body are gathered in a copy
/// of the table; the copy is dropped if the arm provably never runs and merged
/// back otherwise.
pub struct ConstantValueCollector {
    class: HolderClass,
    table: ConstantValuesTable,
    tracker: ScopeTracker,
    frames: Vec<BranchFrame>,
}

impl ConstantValueCollector {
    pub fn new(class: HolderClass, table: ConstantValuesTable) -> Self {
        ConstantValueCollector {
            class,
            table,
            tracker: ScopeTracker::program(),
            frames: vec![],
        }
    }

    pub fn into_table(self) -> ConstantValuesTable {
        self.table
    }

    /// Collect facts about global holders until they don't change any more.
    pub fn collect_globals(
        ctx: &mut Context,
        base: ConstantValuesTable,
    ) -> HastResult<ConstantValuesTable> {
        let mut collector = Self::new(HolderClass::Global, base);
        collector.seed_globals(ctx);
        loop {
            let before = collector.table.clone();
            collector.do_pass(ctx)?;
            if collector.table == before {
                break;
            }
        }
        log::debug!(
            "{} global records, {} constant",
            collector.table.len(),
            collector.table.literal_count()
        );
        Ok(collector.table)
    }

    /// Collect facts about the locals of `body` on top of `seed`.
    pub fn collect_locals(
        body: &mut Block,
        member: &MemberDeclaration,
        ctx: &mut Context,
        seed: ConstantValuesTable,
    ) -> HastResult<ConstantValuesTable> {
        let mut collector = Self::new(HolderClass::Local, seed);
        loop {
            let before = collector.table.clone();
            collector.traverse_body(body, member, ctx)?;
            if collector.table == before {
                break;
            }
        }
        Ok(collector.table)
    }

    /// Facts known before looking at any write: initial values of fields, and
    /// holders driven from outside of the program.
    fn seed_globals(&mut self, ctx: &Context) {
        let program = ScopeId::program();
        for field in ctx.lookup.types.fields() {
            let host_driven = ctx
                .lookup
                .types
                .field_owner(&field.name)
                .is_some_and(|ty| ty.declares_hardware_entry);
            if host_driven {
                self.table.invalidate(field.name, program.clone());
            } else if let Some(value) = field.initial_value() {
                self.table.record(
                    field.name,
                    program.clone(),
                    ConstantFact::Literal(value),
                );
            }
        }
        for sig in ctx.lookup.members.iter() {
            for param in &sig.parameters {
                if sig.is_hardware_entry || param.mode.takes_address() {
                    self.table
                        .invalidate(param.name, ScopeId::member(sig.name));
                }
            }
        }
    }

    /// The scope a write of `holder` is recorded in, if this collector
    /// tracks it.
    fn record_scope(&self, holder: &Expression) -> Option<(HolderName, ScopeId)> {
        match (self.class, holder) {
            (HolderClass::Global, Expression::Field { field, .. }) => {
                Some((*field, ScopeId::program()))
            }
            (HolderClass::Global, Expression::Parameter(param)) => {
                Some((*param, self.member_scope()))
            }
            (HolderClass::Local, Expression::Local(local)) => {
                Some((*local, self.tracker.declaring_scope(local)))
            }
            _ => None,
        }
    }

    fn member_scope(&self) -> ScopeId {
        self.tracker
            .current()
            .ancestors()
            .find(|s| s.depth() == 0)
            .unwrap_or_else(ScopeId::program)
    }

    fn record_write(&mut self, target: &Expression, fact: ConstantFact) {
        if let Some((holder, scope)) = self.record_scope(target) {
            if self.table.record(holder, scope.clone(), fact) {
                log::trace!("{holder} in {scope}: {fact:?}");
            }
        }
    }

    /// Account for the writes hidden in an expression: arguments passed to
    /// parameters and addresses handed out.
    fn scan(&mut self, expr: &Expression, ctx: &Context) {
        let mut calls: Vec<&Invocation> = vec![];
        let mut escaped: Vec<&Expression> = vec![];
        expr.for_each(&mut |e| match e {
            Expression::Invocation(inv) => calls.push(inv),
            Expression::AddressOf(inner) => escaped.push(inner),
            _ => (),
        });
        for inner in escaped {
            self.record_write(inner, ConstantFact::NotConstant);
        }
        for inv in calls {
            self.scan_invocation(inv, ctx);
        }
    }

    fn scan_invocation(&mut self, inv: &Invocation, ctx: &Context) {
        for arg in &inv.arguments {
            if arg.mode.takes_address() {
                self.record_write(&arg.value, ConstantFact::NotConstant);
            }
        }
        if self.class != HolderClass::Global {
            return;
        }
        let Some(sig) = ctx.lookup.members.get(&inv.member) else {
            return;
        };
        if sig.is_opaque() {
            return;
        }
        for (arg, param) in inv.arguments.iter().zip(&sig.parameters) {
            let fact = if arg.mode.takes_address() || param.mode.takes_address()
            {
                ConstantFact::NotConstant
            } else {
                ConstantFact::of_write(&arg.value)
            };
            self.table
                .record(param.name, ScopeId::member(inv.member), fact);
        }
    }

    /// The value of a branch condition under the facts known so far.
    fn decide(&self, condition: &Expression) -> Option<bool> {
        let scope = self.tracker.current();
        let table = &self.table;
        let mut errors = vec![];
        eval::evaluate_expression(
            condition,
            &mut |e| e.holder().and_then(|h| table.lookup(&h, &scope)),
            &mut errors,
        )?
        .as_bool()
    }

    fn open_branch(&mut self, condition: &Expression, ctx: &Context) {
        self.scan(condition, ctx);
        let decision = self.decide(condition);
        self.frames.push(BranchFrame {
            parent: self.table.clone(),
            arms: vec![],
            decision,
        });
    }

    fn close_branch(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.table = frame.parent;
            for arm in &frame.arms {
                self.table.merge(arm);
            }
        }
    }
}

impl ConstructVisitor for ConstantValueCollector {
    fn from(ctx: &Context) -> HastResult<Self> {
        let mut collector =
            Self::new(HolderClass::Global, ConstantValuesTable::default());
        collector.seed_globals(ctx);
        Ok(collector)
    }

    fn clear_data(&mut self) {
        self.tracker = ScopeTracker::program();
        self.frames.clear();
    }
}

impl Named for ConstantValueCollector {
    fn name() -> &'static str {
        "constant-value-collection"
    }

    fn description() -> &'static str {
        "find holders that only ever hold one literal"
    }
}

impl Visitor for ConstantValueCollector {
    fn start(
        &mut self,
        _body: &mut Block,
        member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.tracker = ScopeTracker::new(member.name);
        self.frames.clear();
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
        if matches!(kind, BlockKind::Then | BlockKind::Else | BlockKind::Loop) {
            if let Some(frame) = self.frames.last() {
                self.table = frame.parent.clone();
            }
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
        self.tracker.exit(kind);
        let dead_when = match kind {
            BlockKind::Then | BlockKind::Loop => false,
            BlockKind::Else => true,
            BlockKind::Body | BlockKind::Nested => return Ok(Action::Continue),
        };
        let arm = std::mem::take(&mut self.table);
        if let Some(frame) = self.frames.last_mut() {
            if frame.decision != Some(dead_when) {
                frame.arms.push(arm);
            }
        }
        Ok(Action::Continue)
    }

    fn start_if(
        &mut self,
        condition: &mut Expression,
        _member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.open_branch(condition, ctx);
        Ok(Action::Continue)
    }

    fn finish_if(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.close_branch();
        Ok(Action::Continue)
    }

    fn start_while(
        &mut self,
        condition: &mut Expression,
        _member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        self.open_branch(condition, ctx);
        Ok(Action::Continue)
    }

    fn finish_while(
        &mut self,
        _condition: &mut Expression,
        _member: &MemberDeclaration,
        _ctx: &mut Context,
    ) -> VisResult {
        self.close_branch();
        Ok(Action::Continue)
    }

    fn statement(
        &mut self,
        stmt: &mut Statement,
        member: &MemberDeclaration,
        ctx: &mut Context,
    ) -> VisResult {
        for expr in stmt.expressions() {
            self.scan(expr, ctx);
        }
        match stmt {
            Statement::VariableDeclaration {
                name, initializer, ..
            } => {
                self.tracker.declare(*name);
                if let Some(init) = initializer {
                    self.record_write(
                        &Expression::Local(*name),
                        ConstantFact::of_write(init),
                    );
                }
            }
            Statement::Assignment { target, value } => {
                self.record_write(target, ConstantFact::of_write(value));
            }
            Statement::Return(Some(value))
                if self.class == HolderClass::Global =>
            {
                self.table.record(
                    member.name.return_slot(),
                    ScopeId::program(),
                    ConstantFact::of_write(value),
                );
            }
            Statement::ParallelInvocation(calls) => {
                for call in calls.iter() {
                    self.scan_invocation(&call.invocation, ctx);
                    if let Some(target) = &call.target {
                        self.record_write(target, ConstantFact::NotConstant);
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
    use hast_utils::FullName;

    fn name(s: &str) -> FullName {
        FullName::new(s)
    }

    #[test]
    fn conflicting_literals_erase_the_record() {
        let mut table = ConstantValuesTable::default();
        let x = name("T::M()::x");
        let scope = ScopeId::member(name("T::M()"));
        table.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(3)));
        assert_eq!(table.lookup(&x, &scope), Some(Value::Int32(3)));
        table.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(3)));
        assert_eq!(table.lookup(&x, &scope), Some(Value::Int32(3)));
        table.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(4)));
        assert_eq!(table.lookup(&x, &scope), None);
        table.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(4)));
        assert_eq!(table.get(&x, &scope), Some(&ConstantFact::NotConstant));
    }

    #[test]
    fn inner_tombstone_hides_outer_literal() {
        let mut table = ConstantValuesTable::default();
        let f = name("T::F");
        let inner = ScopeId::member(name("T::M()")).child(0);
        table.record(f, ScopeId::program(), ConstantFact::Literal(Value::Int32(1)));
        assert_eq!(table.lookup(&f, &inner), Some(Value::Int32(1)));
        table.invalidate(f, inner.clone());
        assert_eq!(table.lookup(&f, &inner), None);
        assert_eq!(table.lookup(&f, &ScopeId::program()), Some(Value::Int32(1)));
    }

    #[test]
    fn merge_uses_conflict_rule() {
        let x = name("x");
        let scope = ScopeId::program();
        let mut left = ConstantValuesTable::default();
        left.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(5)));
        let mut right = ConstantValuesTable::default();
        right.record(x, scope.clone(), ConstantFact::Literal(Value::Int32(6)));
        left.merge(&right);
        assert_eq!(left.get(&x, &scope), Some(&ConstantFact::NotConstant));
    }
}
