//! Lowering of a member body into the state machine of a component.
//!
//! Statements are lowered in order into the current state. Anything that has
//! to wait for other hardware (invocations, memory accesses, multi-cycle
//! operations) and every branch of the control flow starts a new state.
//! Expressions are lowered into VHDL expressions over the process variables;
//! their side effects are emitted into the current state first.
use crate::builder::TransformContext;
use crate::invocation::{CallerSlot, MemorySignals};
use crate::state_machine::{StateId, StateMachine};
use crate::top::{clock, clocked};
use crate::types::{
    as_signed, as_unsigned, bits_value, convert, is_memory_type, literal,
    truncate, HardwareType, Scalar,
};
use crate::{ArchitectureComponent, MultiCycleOperation};
use hast_ast::{
    BinaryOperator, Block, Expression, Intrinsic, Invocation, MemberDeclaration,
    MemberSignature, ParallelCall, PrimitiveType, Printer, Statement,
    TypeReference, UnaryOperator, Value,
};
use hast_utils::{
    Error, FullName, NameGenerator, TimedOperation, Warning, WarningCode,
};
use hast_vhdl::{
    AttributeSpecification, DataObjectDeclaration, DataObjectKind,
    DataObjectReference, DataType, Declaration, DeclarationBlock, Function,
    SequentialStatement, VhdlBinaryOperator, VhdlExpression, VhdlUnaryOperator,
    VhdlValue,
};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Why a member has no hardware.
#[derive(Debug)]
pub enum LoweringError {
    /// The member uses a construct hardware can't express. The member is
    /// skipped with a warning.
    Unsupported(String),
    /// Compilation can't continue.
    Failed(Error),
}

impl From<Error> for LoweringError {
    fn from(e: Error) -> Self {
        LoweringError::Failed(e)
    }
}

pub type LoweringResult<T> = Result<T, LoweringError>;

fn unsupported<T, S: ToString>(what: S) -> LoweringResult<T> {
    Err(LoweringError::Unsupported(what.to_string()))
}

fn malformed<S: ToString>(msg: S) -> LoweringError {
    LoweringError::Failed(Error::malformed_program(msg))
}

fn missing_conversion() -> Error {
    Error::invariant("Integer conversions always exist.")
}

fn all<I>(conditions: I) -> VhdlExpression
where
    I: IntoIterator<Item = VhdlExpression>,
{
    conditions
        .into_iter()
        .reduce(|l, r| VhdlExpression::binary(VhdlBinaryOperator::And, l, r))
        .unwrap_or(VhdlValue::Boolean(true).into())
}

/// `to_integer(e)`, folding literals.
fn to_integer(expr: VhdlExpression, scalar: Scalar) -> VhdlExpression {
    match expr {
        VhdlExpression::Value(VhdlValue::Bits { value, width }) => {
            let signed = scalar.is_signed();
            VhdlExpression::Integer(bits_value(value, width, signed) as i64)
        }
        e => VhdlExpression::call("to_integer", vec![e]),
    }
}

/// The value of a holder before anything writes it.
fn initial_value(value: &Value, ty: &HardwareType) -> Option<VhdlValue> {
    match ty {
        HardwareType::Scalar(Scalar::Boolean) => {
            value.as_bool().map(VhdlValue::Boolean)
        }
        HardwareType::Scalar(s) => value
            .as_integer()
            .map(|i| VhdlValue::from_integer(i, s.width())),
        HardwareType::Array { .. } => None,
    }
}

fn argument(inv: &Invocation, index: usize) -> LoweringResult<&Expression> {
    inv.arguments
        .get(index)
        .map(|a| &a.value)
        .ok_or_else(|| {
            malformed(format!(
                "`{}' is invoked without argument {index}.",
                inv.member
            ))
        })
}

/// Parameters and locals of `member`, which become process variables.
fn holder_names(member: &MemberDeclaration) -> Vec<FullName> {
    let mut names = member.parameters.iter().map(|p| p.name).collect_vec();
    if let Some(body) = &member.body {
        body.for_each_statement(&mut |stmt| {
            if let Statement::VariableDeclaration { name, .. } = stmt {
                names.push(*name);
            }
        });
    }
    names
}

pub fn square_root_name(width: u32) -> String {
    format!("SquareRoot.{width}")
}

/// Integer square root of an unsigned `width` bits value, one result bit per
/// iteration.
pub fn square_root_function(width: u32) -> Result<Function, Error> {
    let ty = DataType::Unsigned(width);
    let mut declarations = DeclarationBlock::default();
    let mut variable = |name: &str, initial: VhdlValue| {
        declarations.data_object(
            DataObjectDeclaration::new(
                DataObjectKind::Variable,
                name,
                ty.clone(),
            )
            .with_initial_value(initial),
        )
    };
    let remainder = variable("remainder", ty.default_value())?;
    let result = variable("result", ty.default_value())?;
    let one = variable(
        "one",
        VhdlValue::from_integer(1i128 << (width.max(2) - 2), width),
    )?;
    let shift_right = |r: &DataObjectReference, by: i64| {
        VhdlExpression::call(
            "shift_right",
            vec![r.clone().into(), VhdlExpression::Integer(by)],
        )
    };
    let candidate = VhdlExpression::binary(
        VhdlBinaryOperator::Add,
        result.clone(),
        one.clone(),
    );
    let step = SequentialStatement::if_else(
        VhdlExpression::binary(
            VhdlBinaryOperator::GreaterThanOrEqual,
            remainder.clone(),
            candidate.clone(),
        ),
        vec![
            SequentialStatement::assign(
                remainder.clone(),
                VhdlExpression::binary(
                    VhdlBinaryOperator::Subtract,
                    remainder.clone(),
                    candidate,
                ),
            ),
            SequentialStatement::assign(
                result.clone(),
                VhdlExpression::binary(
                    VhdlBinaryOperator::Add,
                    shift_right(&result, 1),
                    one.clone(),
                ),
            ),
        ],
        vec![SequentialStatement::assign(
            result.clone(),
            shift_right(&result, 1),
        )],
    );
    Ok(Function {
        name: square_root_name(width),
        parameters: vec![("value".to_string(), ty.clone())],
        return_type: ty,
        declarations,
        body: vec![
            SequentialStatement::assign(
                remainder,
                DataObjectReference::variable("value"),
            ),
            SequentialStatement::For {
                variable: "i".to_string(),
                from: 0,
                to: (width / 2) as i64 - 1,
                body: vec![
                    step,
                    SequentialStatement::assign(
                        one.clone(),
                        shift_right(&one, 2),
                    ),
                ],
            },
            SequentialStatement::Return(result.into()),
        ],
    })
}

/// The state of the lowering of one instance of a member.
struct MemberLowering<'c, 'p> {
    ctx: &'c TransformContext<'p>,
    member: &'c MemberDeclaration,
    /// Parallel lane and recursion depth of the instance.
    lane: u32,
    depth: u32,
    component: ArchitectureComponent,
    fsm: StateMachine,
    current: StateId,
    /// Process variables of the locals and parameters.
    holders: HashMap<FullName, (DataObjectReference, HardwareType)>,
    memory_parameters: HashSet<FullName>,
    return_type: Option<HardwareType>,
    /// `(condition state, exit state)` of the enclosing loops, innermost
    /// last.
    loops: Vec<(StateId, StateId)>,
    names: NameGenerator,
    /// Shared variables of fields written by the process, with their
    /// initial values.
    written_fields: LinkedHashMap<DataObjectReference, VhdlValue>,
    /// Executed when the component is started.
    start_copies: Vec<SequentialStatement>,
    /// Executed while the component signals it finished.
    finish_copies: Vec<SequentialStatement>,
    warnings: Vec<Warning>,
}

impl<'c, 'p> MemberLowering<'c, 'p> {
    fn new(
        ctx: &'c TransformContext<'p>,
        member: &'c MemberDeclaration,
        instance_index: u32,
    ) -> Self {
        let counts = ctx.config.resolve_instance_count(&member.name);
        let depths = counts.max_recursion_depth + 1;
        let component = ArchitectureComponent::new(member.name, instance_index);
        let names = NameGenerator::with_reserved(
            holder_names(member).into_iter().map(|h| {
                format!("{}.{}", component.name, h.relative_to(&member.name))
            }),
        );
        MemberLowering {
            ctx,
            member,
            lane: instance_index / depths,
            depth: instance_index % depths,
            fsm: StateMachine::new(&component.name),
            component,
            current: StateMachine::WAIT_FOR_START,
            holders: HashMap::new(),
            memory_parameters: HashSet::new(),
            return_type: None,
            loops: vec![],
            names,
            written_fields: LinkedHashMap::new(),
            start_copies: vec![],
            finish_copies: vec![],
            warnings: vec![],
        }
    }

    fn push(&mut self, stmt: SequentialStatement) {
        self.fsm.push(self.current, stmt);
    }

    fn goto(&mut self, state: StateId) {
        let transition = self.fsm.transition(state);
        self.push(transition);
    }

    /// Continue in a state that doesn't execute anything yet.
    fn fresh_state(&mut self) -> StateId {
        if !self.fsm.is_empty(self.current) {
            let next = self.fsm.add_state();
            self.goto(next);
            self.current = next;
        }
        self.current
    }

    fn holder_name(&self, holder: &FullName) -> String {
        format!(
            "{}.{}",
            self.component.name,
            holder.relative_to(&self.member.name)
        )
    }

    fn holder_type(
        &self,
        holder: FullName,
        ty: &TypeReference,
    ) -> LoweringResult<HardwareType> {
        let length = self.ctx.array_lengths.get(&holder).copied();
        if let Some(hw) = HardwareType::of(ty, length) {
            return Ok(hw);
        }
        match ty.element_type() {
            Some(element) if Scalar::of(element).is_some() => {
                Err(Error::MissingArrayLength(holder).into())
            }
            _ => unsupported(format!(
                "`{holder}' has the type `{ty}', \
                 which has no hardware representation"
            )),
        }
    }

    fn declare_type(&mut self, ty: &HardwareType) -> LoweringResult<()> {
        if let HardwareType::Array { .. } = ty {
            self.component
                .declarations
                .add(Declaration::Type(ty.data_type()))?;
        }
        Ok(())
    }

    fn variable(
        &mut self,
        name: String,
        ty: &HardwareType,
    ) -> LoweringResult<DataObjectReference> {
        self.declare_type(ty)?;
        let data_type = ty.data_type();
        let reset = data_type.default_value();
        let decl = DataObjectDeclaration::new(
            DataObjectKind::Variable,
            name,
            data_type,
        )
        .with_initial_value(reset);
        Ok(self.component.process.declarations.data_object(decl)?)
    }

    fn temp(
        &mut self,
        prefix: &str,
        ty: &HardwareType,
    ) -> LoweringResult<DataObjectReference> {
        let name = self
            .names
            .gen_name(format!("{}.{prefix}", self.component.name));
        self.variable(name.as_str().to_string(), ty)
    }

    fn comment(&mut self, stmt: &Statement) {
        let text = Printer::statement_to_str(stmt);
        self.push(SequentialStatement::comment(text));
    }

    /// Signals of the component seen by its callers, and the variables of
    /// its parameters.
    fn declare_interface(&mut self) -> LoweringResult<()> {
        let started = self.component.signals.started.name.clone();
        self.component.external_signal(started, DataType::Boolean)?;
        let finished = self.component.signals.finished.name.clone();
        self.component.internal_signal(finished, DataType::Boolean)?;

        let member = self.member;
        for parameter in &member.parameters {
            if is_memory_type(&parameter.ty) {
                self.memory_parameters.insert(parameter.name);
                continue;
            }
            if parameter.mode.takes_address() {
                return unsupported(format!(
                    "the parameter `{}' is passed by reference",
                    parameter.name
                ));
            }
            let ty = self.holder_type(parameter.name, &parameter.ty)?;
            self.declare_type(&ty)?;
            let relative = parameter.name.relative_to(&member.name);
            let data_type = ty.data_type();
            let input = self.component.external_signal(
                format!("{}.{relative}.In", self.component.name),
                data_type.clone(),
            )?;
            self.component.signals.parameters.push((
                relative.to_string(),
                input.clone(),
                data_type.default_value(),
            ));
            let name = self.holder_name(&parameter.name);
            let variable = self.variable(name, &ty)?;
            self.start_copies
                .push(SequentialStatement::assign(variable.clone(), input));
            if let HardwareType::Array { .. } = ty {
                let output = self.component.internal_signal(
                    format!("{}.{relative}.Out", self.component.name),
                    data_type,
                )?;
                self.component
                    .signals
                    .array_outputs
                    .push((relative.to_string(), output.clone()));
                self.finish_copies.push(SequentialStatement::assign(
                    output,
                    variable.clone(),
                ));
            }
            self.holders.insert(parameter.name, (variable, ty));
        }

        if member.returns_value() {
            let ty = self
                .holder_type(member.name.return_slot(), &member.return_type)?;
            self.declare_type(&ty)?;
            let signal = self.component.internal_signal(
                format!("{}.return", self.component.name),
                ty.data_type(),
            )?;
            self.component.signals.return_value = Some(signal);
            self.return_type = Some(ty);
        }
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> LoweringResult<()> {
        for stmt in &block.statements {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stmt: &Statement) -> LoweringResult<()> {
        match stmt {
            Statement::VariableDeclaration {
                name,
                ty,
                initializer,
            } => {
                let hw = self.holder_type(*name, ty)?;
                let variable_name = self.holder_name(name);
                let variable = self.variable(variable_name, &hw)?;
                self.holders.insert(*name, (variable.clone(), hw.clone()));
                if let Some(init) = initializer {
                    self.comment(stmt);
                    let value = self.lower_value(init, &hw)?;
                    self.push(SequentialStatement::assign(variable, value));
                }
            }
            Statement::Assignment { target, value } => {
                self.comment(stmt);
                let (target, ty) = self.lower_target(target)?;
                let value = self.lower_value(value, &ty)?;
                self.push(SequentialStatement::assign(target, value));
            }
            Statement::Expression(e) => {
                self.comment(stmt);
                match e {
                    Expression::Invocation(inv) => {
                        self.lower_invocation(inv)?;
                    }
                    other => {
                        self.lower_expression(other)?;
                    }
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.lower_condition(condition)?;
                let then_state = self.fsm.add_state();
                let else_state =
                    else_branch.as_ref().map(|_| self.fsm.add_state());
                let after = self.fsm.add_state();
                let otherwise =
                    self.fsm.transition(else_state.unwrap_or(after));
                let then = self.fsm.transition(then_state);
                self.push(SequentialStatement::if_else(
                    condition,
                    vec![then],
                    vec![otherwise],
                ));
                self.current = then_state;
                self.lower_block(then_branch)?;
                self.goto(after);
                if let (Some(state), Some(block)) = (else_state, else_branch) {
                    self.current = state;
                    self.lower_block(block)?;
                    self.goto(after);
                }
                self.current = after;
            }
            Statement::While { condition, body } => {
                let head = self.fsm.add_state();
                self.goto(head);
                self.current = head;
                let condition = self.lower_condition(condition)?;
                let body_state = self.fsm.add_state();
                let exit = self.fsm.add_state();
                let enter = self.fsm.transition(body_state);
                let leave = self.fsm.transition(exit);
                self.push(SequentialStatement::if_else(
                    condition,
                    vec![enter],
                    vec![leave],
                ));
                self.loops.push((head, exit));
                self.current = body_state;
                self.lower_block(body)?;
                self.goto(head);
                self.loops.pop();
                self.current = exit;
            }
            Statement::Return(value) => {
                if let Some(value) = value {
                    self.comment(stmt);
                    let ty = self.return_type.clone().ok_or_else(|| {
                        malformed(format!(
                            "`{}' returns nothing but returns a value.",
                            self.member.name
                        ))
                    })?;
                    let value = self.lower_value(value, &ty)?;
                    let signal =
                        self.component.signals.return_value.clone().ok_or_else(
                            || {
                                Error::invariant(format!(
                                    "`{}' has no return signal.",
                                    self.component.name
                                ))
                            },
                        )?;
                    self.push(SequentialStatement::assign(signal, value));
                }
                self.goto(StateMachine::FINISHED);
                self.current = self.fsm.add_state();
            }
            Statement::Block(block) => self.lower_block(block)?,
            Statement::ParallelInvocation(calls) => self.lower_parallel(calls)?,
            Statement::Break | Statement::Continue => {
                let (head, exit) = *self.loops.last().ok_or_else(|| {
                    malformed(format!(
                        "`{}' outside of a loop.",
                        Printer::statement_to_str(stmt)
                    ))
                })?;
                let target = if matches!(stmt, Statement::Break) {
                    exit
                } else {
                    head
                };
                self.goto(target);
                self.current = self.fsm.add_state();
            }
        }
        Ok(())
    }

    /// A value of the holder type `ty`.
    fn lower_value(
        &mut self,
        expr: &Expression,
        ty: &HardwareType,
    ) -> LoweringResult<VhdlExpression> {
        if let Expression::ArrayCreation { .. } = expr {
            return match ty {
                HardwareType::Array { .. } => {
                    Ok(ty.data_type().default_value().into())
                }
                HardwareType::Scalar(_) => {
                    Err(malformed("An array is stored in a scalar holder."))
                }
            };
        }
        let (value, from) = self.lower_expression(expr)?;
        self.coerce(value, &from, ty)
    }

    fn coerce(
        &self,
        value: VhdlExpression,
        from: &HardwareType,
        to: &HardwareType,
    ) -> LoweringResult<VhdlExpression> {
        match (from, to) {
            (HardwareType::Scalar(f), HardwareType::Scalar(t)) => {
                match convert(value, *f, *t) {
                    Some(converted) => Ok(converted),
                    None => {
                        unsupported("conversion between booleans and integers")
                    }
                }
            }
            (a, b) if a.data_type() == b.data_type() => Ok(value),
            _ => unsupported(
                "assignment between arrays of different types or lengths",
            ),
        }
    }

    fn lower_condition(
        &mut self,
        expr: &Expression,
    ) -> LoweringResult<VhdlExpression> {
        match self.lower_scalar(expr)? {
            (condition, Scalar::Boolean) => Ok(condition),
            _ => Err(malformed(format!(
                "The condition `{}' is not a boolean.",
                Printer::expression_to_str(expr)
            ))),
        }
    }

    fn lower_scalar(
        &mut self,
        expr: &Expression,
    ) -> LoweringResult<(VhdlExpression, Scalar)> {
        let (value, ty) = self.lower_expression(expr)?;
        match ty.as_scalar() {
            Some(scalar) => Ok((value, scalar)),
            None => unsupported(format!(
                "the array `{}' used as a single value",
                Printer::expression_to_str(expr)
            )),
        }
    }

    fn lower_integer(
        &mut self,
        expr: &Expression,
    ) -> LoweringResult<(VhdlExpression, Scalar)> {
        match self.lower_scalar(expr)? {
            (_, Scalar::Boolean) => Err(malformed(format!(
                "`{}' is used as an integer.",
                Printer::expression_to_str(expr)
            ))),
            integer => Ok(integer),
        }
    }

    /// The shared variable of a field.
    fn field(
        &mut self,
        field: FullName,
        target: Option<&Expression>,
    ) -> LoweringResult<(DataObjectReference, HardwareType, VhdlValue)> {
        match target {
            None | Some(Expression::This) => {}
            Some(other) => {
                return unsupported(format!(
                    "accessing `{field}' of `{}' instead of `this'",
                    Printer::expression_to_str(other)
                ))
            }
        }
        let declaration = self
            .ctx
            .lookup
            .types
            .field(&field)
            .ok_or_else(|| {
                malformed(format!("The field `{field}' is not declared."))
            })?;
        let ty = self.holder_type(field, &declaration.ty)?;
        self.declare_type(&ty)?;
        let data_type = ty.data_type();
        let initial = declaration
            .initial_value()
            .and_then(|v| initial_value(&v, &ty))
            .unwrap_or_else(|| data_type.default_value());
        let reference = self.component.declarations.data_object(
            DataObjectDeclaration::new(
                DataObjectKind::SharedVariable,
                field,
                data_type,
            )
            .with_initial_value(initial.clone()),
        )?;
        Ok((reference, ty, initial))
    }

    fn element(
        &mut self,
        array: VhdlExpression,
        ty: HardwareType,
        index: &Expression,
    ) -> LoweringResult<(VhdlExpression, HardwareType)> {
        let HardwareType::Array { element, .. } = ty else {
            return Err(malformed(format!(
                "Indexing a value that is not an array with `{}'.",
                Printer::expression_to_str(index)
            )));
        };
        let (index, scalar) = self.lower_integer(index)?;
        Ok((
            VhdlExpression::index(array, to_integer(index, scalar)),
            HardwareType::Scalar(element),
        ))
    }

    /// The data object written when assigning to `target`.
    fn lower_target(
        &mut self,
        target: &Expression,
    ) -> LoweringResult<(VhdlExpression, HardwareType)> {
        match target {
            Expression::Local(name) | Expression::Parameter(name) => {
                let (reference, ty) = self.holder(name)?;
                Ok((reference.into(), ty))
            }
            Expression::Field { field, target } => {
                let (reference, ty, initial) =
                    self.field(*field, target.as_deref())?;
                self.written_fields.insert(reference.clone(), initial);
                Ok((reference.into(), ty))
            }
            Expression::ArrayElement { array, index } => {
                let (array, ty) = self.lower_target(array)?;
                self.element(array, ty, index)
            }
            other => unsupported(format!(
                "assignment to `{}'",
                Printer::expression_to_str(other)
            )),
        }
    }

    fn holder(
        &self,
        name: &FullName,
    ) -> LoweringResult<(DataObjectReference, HardwareType)> {
        if self.memory_parameters.contains(name) {
            return unsupported(format!("the memory `{name}' used as a value"));
        }
        self.holders.get(name).cloned().ok_or_else(|| {
            malformed(format!("`{name}' is used before it is declared."))
        })
    }

    fn lower_expression(
        &mut self,
        expr: &Expression,
    ) -> LoweringResult<(VhdlExpression, HardwareType)> {
        let scalar =
            |(e, s): (VhdlExpression, Scalar)| (e, HardwareType::Scalar(s));
        match expr {
            Expression::Literal(value) => match literal(value) {
                Some((value, s)) => Ok((value.into(), HardwareType::Scalar(s))),
                None => {
                    unsupported(format!("the floating point value {value}"))
                }
            },
            Expression::Local(name) | Expression::Parameter(name) => {
                let (reference, ty) = self.holder(name)?;
                Ok((reference.into(), ty))
            }
            Expression::Field { field, target } => {
                let (reference, ty, _) = self.field(*field, target.as_deref())?;
                Ok((reference.into(), ty))
            }
            Expression::This => unsupported("`this' used as a value"),
            Expression::Unary { operator, operand } => {
                self.lower_unary(*operator, operand).map(scalar)
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => self.lower_binary(*operator, left, right).map(scalar),
            Expression::Cast { ty, operand } => {
                let Some(to) = Scalar::of(ty) else {
                    return unsupported(format!("conversion to `{ty}'"));
                };
                let (value, from) = self.lower_scalar(operand)?;
                match convert(value, from, to) {
                    Some(converted) => {
                        Ok((converted, HardwareType::Scalar(to)))
                    }
                    None => {
                        unsupported("conversion between booleans and integers")
                    }
                }
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if then.contains_invocation()
                    || otherwise.contains_invocation()
                {
                    return unsupported(
                        "invocations in the branches of a conditional \
                         expression",
                    );
                }
                let condition = self.lower_condition(condition)?;
                let (then, then_ty) = self.lower_scalar(then)?;
                let (otherwise, otherwise_ty) = self.lower_scalar(otherwise)?;
                let same = then_ty == otherwise_ty;
                let ty = if same || then_ty == Scalar::Boolean {
                    then_ty
                } else {
                    Scalar::promote_binary(then_ty, otherwise_ty)
                };
                let hw = HardwareType::Scalar(ty);
                let then =
                    self.coerce(then, &HardwareType::Scalar(then_ty), &hw)?;
                let otherwise = self.coerce(
                    otherwise,
                    &HardwareType::Scalar(otherwise_ty),
                    &hw,
                )?;
                let temp = self.temp("conditional", &hw)?;
                self.push(SequentialStatement::if_else(
                    condition,
                    vec![SequentialStatement::assign(temp.clone(), then)],
                    vec![SequentialStatement::assign(temp.clone(), otherwise)],
                ));
                Ok((temp.into(), hw))
            }
            Expression::Invocation(inv) => {
                self.lower_invocation(inv)?.ok_or_else(|| {
                    malformed(format!(
                        "The result of `{}' is used but it returns nothing.",
                        inv.member
                    ))
                })
            }
            Expression::AddressOf(_) => {
                unsupported("taking the address of a holder")
            }
            Expression::ArrayCreation { .. } => {
                unsupported("array creation outside of an assignment")
            }
            Expression::ArrayElement { array, index } => {
                let (array, ty) = self.lower_expression(array)?;
                self.element(array, ty, index)
            }
            Expression::ArrayLength(array) => {
                match self.lower_expression(array)?.1 {
                    HardwareType::Array { length, .. } => Ok((
                        VhdlValue::from_integer(length as i128, 32).into(),
                        HardwareType::Scalar(Scalar::INT32),
                    )),
                    HardwareType::Scalar(_) => Err(malformed(
                        "The length of a value that is not an array.",
                    )),
                }
            }
            Expression::ObjectCreation { ty, .. } => {
                unsupported(format!("creating an object of `{ty}'"))
            }
        }
    }

    fn lower_unary(
        &mut self,
        operator: UnaryOperator,
        operand: &Expression,
    ) -> LoweringResult<(VhdlExpression, Scalar)> {
        match operator {
            UnaryOperator::Not => {
                let condition = self.lower_condition(operand)?;
                Ok((VhdlExpression::not(condition), Scalar::Boolean))
            }
            UnaryOperator::Plus
            | UnaryOperator::Minus
            | UnaryOperator::BitNot => {
                let (value, from) = self.lower_integer(operand)?;
                let to = match operator {
                    UnaryOperator::Minus if from == Scalar::UINT32 => {
                        Scalar::Integer {
                            width: 64,
                            signed: true,
                        }
                    }
                    _ => from.promote(),
                };
                let value =
                    convert(value, from, to).ok_or_else(missing_conversion)?;
                Ok(match operator {
                    UnaryOperator::Minus if !to.is_signed() => {
                        return unsupported(
                            "negation of an unsigned 64 bit value",
                        )
                    }
                    UnaryOperator::Minus => (
                        VhdlExpression::Unary {
                            operator: VhdlUnaryOperator::Negation,
                            operand: Box::new(value),
                        },
                        to,
                    ),
                    UnaryOperator::BitNot => (VhdlExpression::not(value), to),
                    _ => (value, to),
                })
            }
            UnaryOperator::Dereference => {
                unsupported("dereferencing a pointer")
            }
        }
    }

    fn lower_binary(
        &mut self,
        operator: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> LoweringResult<(VhdlExpression, Scalar)> {
        use BinaryOperator as B;
        use VhdlBinaryOperator as V;
        if operator == B::NullCoalescing {
            return unsupported("the `??' operator");
        }
        if matches!(operator, B::ConditionalAnd | B::ConditionalOr)
            && right.contains_invocation()
        {
            return unsupported(format!(
                "invocations in the right operand of `{}'",
                operator.symbol()
            ));
        }
        let (l, ls) = self.lower_scalar(left)?;
        let (r, rs) = self.lower_scalar(right)?;

        if ls == Scalar::Boolean || rs == Scalar::Boolean {
            let op = match operator {
                _ if ls != rs => None,
                B::ConditionalAnd | B::BitwiseAnd => Some(V::And),
                B::ConditionalOr | B::BitwiseOr => Some(V::Or),
                B::ExclusiveOr => Some(V::Xor),
                B::Equality => Some(V::Equality),
                B::InEquality => Some(V::InEquality),
                _ => None,
            };
            return match op {
                Some(op) => {
                    Ok((VhdlExpression::binary(op, l, r), Scalar::Boolean))
                }
                None => Err(malformed(format!(
                    "`{}' is applied to a boolean and a value of another type.",
                    operator.symbol()
                ))),
            };
        }

        if matches!(operator, B::ShiftLeft | B::ShiftRight) {
            let to = ls.promote();
            let value = convert(l, ls, to).ok_or_else(missing_conversion)?;
            // Only the low bits of the count are used.
            let count = VhdlExpression::binary(
                V::Modulus,
                to_integer(r, rs),
                VhdlExpression::Integer(to.width() as i64),
            );
            let function = if operator == B::ShiftLeft {
                "shift_left"
            } else {
                "shift_right"
            };
            return Ok((VhdlExpression::call(function, vec![value, count]), to));
        }

        let ty = Scalar::promote_binary(ls, rs);
        let promote =
            |e, from| convert(e, from, ty).ok_or_else(missing_conversion);
        let (l, r) = (promote(l, ls)?, promote(r, rs)?);
        let comparison = match operator {
            B::Equality => Some(V::Equality),
            B::InEquality => Some(V::InEquality),
            B::LessThan => Some(V::LessThan),
            B::LessThanOrEqual => Some(V::LessThanOrEqual),
            B::GreaterThan => Some(V::GreaterThan),
            B::GreaterThanOrEqual => Some(V::GreaterThanOrEqual),
            _ => None,
        };
        if let Some(op) = comparison {
            return Ok((VhdlExpression::binary(op, l, r), Scalar::Boolean));
        }
        match operator {
            B::Add => Ok((VhdlExpression::binary(V::Add, l, r), ty)),
            B::Subtract => Ok((VhdlExpression::binary(V::Subtract, l, r), ty)),
            B::BitwiseAnd => Ok((VhdlExpression::binary(V::And, l, r), ty)),
            B::BitwiseOr => Ok((VhdlExpression::binary(V::Or, l, r), ty)),
            B::ExclusiveOr => Ok((VhdlExpression::binary(V::Xor, l, r), ty)),
            B::Multiply => {
                let product =
                    truncate(VhdlExpression::binary(V::Multiply, l, r), ty);
                let operation = TimedOperation::Multiplication;
                self.timed(operation, "multiply", product, ty)
            }
            B::Divide => {
                let quotient = VhdlExpression::binary(V::Divide, l, r);
                self.timed(TimedOperation::Division, "divide", quotient, ty)
            }
            B::Modulus => {
                let remainder = VhdlExpression::binary(V::Remainder, l, r);
                let operation = TimedOperation::Remainder;
                self.timed(operation, "remainder", remainder, ty)
            }
            other => Err(malformed(format!(
                "`{}' is applied to integers.",
                other.symbol()
            ))),
        }
    }

    /// Evaluate an operation that may take longer than a clock cycle. When
    /// it does, its result is computed into a dedicated signal during as
    /// many states as the device needs.
    fn timed(
        &mut self,
        operation: TimedOperation,
        name: &str,
        expr: VhdlExpression,
        ty: Scalar,
    ) -> LoweringResult<(VhdlExpression, Scalar)> {
        let cycles = self.ctx.device.required_cycles(operation, ty.width());
        if cycles <= 1 {
            return Ok((expr, ty));
        }
        let signal_name = self
            .names
            .gen_name(format!("{}.{name}", self.component.name));
        let result = self
            .component
            .internal_signal(signal_name.as_str(), ty.data_type())?;
        self.component
            .declarations
            .add(Declaration::Attribute("dont_touch".to_string()))?;
        self.component
            .declarations
            .add(Declaration::AttributeSpecification(AttributeSpecification {
                attribute: "dont_touch".to_string(),
                target: result.clone(),
                value: "true".to_string(),
            }))?;
        self.component.multi_cycle_operations.push(MultiCycleOperation {
            result: result.clone(),
            required_clock_cycles_ceiling: cycles,
        });
        self.fresh_state();
        for _ in 0..cycles {
            self.push(SequentialStatement::assign(
                result.clone(),
                expr.clone(),
            ));
            let next = self.fsm.add_state();
            self.goto(next);
            self.current = next;
        }
        Ok((result.into(), ty))
    }

    fn lower_invocation(
        &mut self,
        inv: &Invocation,
    ) -> LoweringResult<Option<(VhdlExpression, HardwareType)>> {
        if let Some(intrinsic) = Intrinsic::from_member(&inv.member) {
            return self.lower_intrinsic(intrinsic, inv);
        }
        let mut results = self.invoke(&[inv])?;
        Ok(results.pop().flatten())
    }

    /// The signature of an invoked member that has hardware.
    fn signature(
        &self,
        inv: &Invocation,
    ) -> LoweringResult<&'p MemberSignature> {
        let lookup = self.ctx.lookup;
        let Some(signature) = lookup.members.get(&inv.member) else {
            return unsupported(format!(
                "invoking `{}', which is not part of the program",
                inv.member
            ));
        };
        if signature.is_opaque() {
            return unsupported(format!(
                "invoking `{}', which has no body",
                inv.member
            ));
        }
        if self.ctx.failed.contains(&inv.member) {
            return unsupported(format!(
                "invoking `{}', which can't be transformed",
                inv.member
            ));
        }
        match inv.target.as_deref() {
            None | Some(Expression::This) => {}
            Some(other) => {
                return unsupported(format!(
                    "invoking `{}' on `{}' instead of `this'",
                    inv.member,
                    Printer::expression_to_str(other)
                ))
            }
        }
        if inv.arguments.iter().any(|a| a.mode.takes_address()) {
            return unsupported(format!(
                "passing arguments of `{}' by reference",
                inv.member
            ));
        }
        if inv.arguments.len() != signature.parameters.len() {
            return Err(malformed(format!(
                "`{}' is invoked with {} arguments instead of {}.",
                inv.member,
                inv.arguments.len(),
                signature.parameters.len()
            )));
        }
        Ok(signature)
    }

    /// How many invocations of `callee` this component may run at the same
    /// time.
    fn capacity(&self, callee: &FullName) -> u32 {
        if *callee == self.member.name {
            1
        } else {
            self.ctx
                .config
                .resolve_instance_count(callee)
                .max_degree_of_parallelism
                .max(1)
        }
    }

    /// The instance serving the `slot`th concurrent invocation of `callee`.
    fn slot_target(&mut self, callee: FullName, slot: u32) -> Option<u32> {
        let counts = self.ctx.config.resolve_instance_count(&callee);
        if callee != self.member.name {
            let lane = slot % counts.max_degree_of_parallelism.max(1);
            return Some(counts.instance_index(lane, 0));
        }
        if self.depth < counts.max_recursion_depth {
            return Some(counts.instance_index(self.lane, self.depth + 1));
        }
        self.warnings.push(
            Warning::new(
                WarningCode::RecursionDepthExceeded,
                format!(
                    "The recursion is deeper than the maximal depth of {}. \
                     The invocation never finishes.",
                    counts.max_recursion_depth
                ),
            )
            .with_subject(callee),
        );
        None
    }

    /// The signals of an invocation slot, declared on first use.
    fn caller_slot(
        &mut self,
        signature: &MemberSignature,
        slot: u32,
    ) -> LoweringResult<CallerSlot> {
        if let Some(existing) = self
            .component
            .caller_slots
            .iter()
            .find(|s| s.callee == signature.name && s.slot == slot)
        {
            return Ok(existing.clone());
        }
        let prefix =
            CallerSlot::prefix(&self.component.name, &signature.name, slot);
        let started = self
            .component
            .internal_signal(format!("{prefix}.Started"), DataType::Boolean)?;
        let finished = self
            .component
            .external_signal(format!("{prefix}.Finished"), DataType::Boolean)?;
        let mut arguments = vec![];
        let mut array_results = vec![];
        for parameter in &signature.parameters {
            if is_memory_type(&parameter.ty) {
                continue;
            }
            let name = parameter.name.relative_to(&signature.name).to_string();
            let ty = self.holder_type(parameter.name, &parameter.ty)?;
            self.declare_type(&ty)?;
            let data_type = ty.data_type();
            let out = self.component.internal_signal(
                format!("{prefix}.{name}.Out"),
                data_type.clone(),
            )?;
            arguments.push((name.clone(), out));
            if let HardwareType::Array { .. } = ty {
                let result = self.component.external_signal(
                    format!("{prefix}.{name}.In"),
                    data_type.clone(),
                )?;
                array_results.push((name, result, data_type.default_value()));
            }
        }
        let return_value = if signature.return_type != TypeReference::Void {
            let ty = self.holder_type(
                signature.name.return_slot(),
                &signature.return_type,
            )?;
            self.declare_type(&ty)?;
            let data_type = ty.data_type();
            let signal = self.component.external_signal(
                format!("{prefix}.return"),
                data_type.clone(),
            )?;
            Some((signal, data_type.default_value()))
        } else {
            None
        };
        let caller_slot = CallerSlot {
            callee: signature.name,
            slot,
            target: self.slot_target(signature.name, slot),
            started,
            finished,
            arguments,
            array_results,
            return_value,
        };
        self.component.caller_slots.push(caller_slot.clone());
        let count = self
            .component
            .invoked_members
            .entry(signature.name)
            .or_insert(0);
        *count = (*count).max(slot + 1);
        Ok(caller_slot)
    }

    /// Start the invocations together and wait until all of them finish.
    /// Returns the results in the order of `calls`.
    fn invoke(
        &mut self,
        calls: &[&Invocation],
    ) -> LoweringResult<Vec<Option<(VhdlExpression, HardwareType)>>> {
        struct Prepared<'s> {
            signature: &'s MemberSignature,
            slot: CallerSlot,
            arguments: Vec<SequentialStatement>,
            copy_back: Vec<SequentialStatement>,
        }

        let mut used: BTreeMap<FullName, u32> = BTreeMap::new();
        let mut prepared = vec![];
        for inv in calls {
            let signature = self.signature(inv)?;
            let counter = used.entry(inv.member).or_insert(0);
            let slot_index = *counter;
            *counter += 1;
            let slot = self.caller_slot(signature, slot_index)?;
            let mut arguments = vec![];
            let mut copy_back = vec![];
            let pairs = signature.parameters.iter().zip(&inv.arguments);
            for (parameter, argument) in pairs {
                if is_memory_type(&parameter.ty) {
                    continue;
                }
                let name = parameter.name.relative_to(&signature.name);
                let ty = self.holder_type(parameter.name, &parameter.ty)?;
                let value = self.lower_value(&argument.value, &ty)?;
                let (_, out) = slot
                    .arguments
                    .iter()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| {
                        Error::invariant(format!(
                            "No signal for the argument `{name}'."
                        ))
                    })?;
                arguments.push(SequentialStatement::assign(out.clone(), value));
                let result =
                    slot.array_results.iter().find(|(n, _, _)| n == name);
                let holder = argument.value.holder();
                if let (Some((_, result, _)), Some(_)) = (result, holder) {
                    let (target, _) = self.lower_target(&argument.value)?;
                    copy_back.push(SequentialStatement::assign(
                        target,
                        result.clone(),
                    ));
                }
            }
            prepared.push(Prepared {
                signature,
                slot,
                arguments,
                copy_back,
            });
        }
        if prepared.is_empty() {
            return Ok(vec![]);
        }

        self.fresh_state();
        let wait = self.fsm.add_state();
        let idle = all(prepared
            .iter()
            .map(|p| VhdlExpression::not(p.slot.finished.clone())));
        let mut begin = vec![];
        for p in &prepared {
            begin.extend(p.arguments.iter().cloned());
            begin.push(SequentialStatement::assign(
                p.slot.started.clone(),
                VhdlValue::Boolean(true),
            ));
        }
        begin.push(self.fsm.transition(wait));
        self.push(SequentialStatement::if_then(idle, begin));

        self.current = wait;
        let after = self.fsm.add_state();
        let done = all(prepared
            .iter()
            .map(|p| VhdlExpression::from(p.slot.finished.clone())));
        let mut end = vec![];
        let mut results = vec![];
        for p in prepared {
            match &p.slot.return_value {
                Some((signal, _)) => {
                    let ty = self.holder_type(
                        p.signature.name.return_slot(),
                        &p.signature.return_type,
                    )?;
                    let temp = self.temp("invocationResult", &ty)?;
                    end.push(SequentialStatement::assign(
                        temp.clone(),
                        signal.clone(),
                    ));
                    results.push(Some((temp.into(), ty)));
                }
                None => results.push(None),
            }
            end.extend(p.copy_back);
            end.push(SequentialStatement::assign(
                p.slot.started.clone(),
                VhdlValue::Boolean(false),
            ));
        }
        end.push(self.fsm.transition(after));
        self.push(SequentialStatement::if_then(done, end));
        self.current = after;
        Ok(results)
    }

    fn lower_parallel(&mut self, calls: &[ParallelCall]) -> LoweringResult<()> {
        let mut batches: Vec<Vec<&ParallelCall>> = vec![vec![]];
        let mut used: HashMap<FullName, u32> = HashMap::new();
        for call in calls {
            let callee = call.invocation.member;
            if Intrinsic::from_member(&callee).is_some() {
                return unsupported(format!("`{callee}' invoked in parallel"));
            }
            let running = used.get(&callee).copied().unwrap_or(0);
            if running >= self.capacity(&callee) {
                batches.push(vec![]);
                used.clear();
            }
            *used.entry(callee).or_insert(0) += 1;
            if let Some(batch) = batches.last_mut() {
                batch.push(call);
            }
        }
        if batches.len() > 1 {
            self.warnings.push(
                Warning::new(
                    WarningCode::SerializedInvocation,
                    format!(
                        "{} parallel invocations need more instances than \
                         configured and run in {} batches.",
                        calls.len(),
                        batches.len()
                    ),
                )
                .with_subject(self.member.name),
            );
        }
        for batch in batches {
            let invocations = batch.iter().map(|c| &c.invocation).collect_vec();
            let results = self.invoke(&invocations)?;
            for (call, result) in batch.iter().zip(results) {
                let Some(target) = &call.target else {
                    continue;
                };
                let (value, ty) = result.ok_or_else(|| {
                    malformed(format!(
                        "The result of `{}' is stored but it returns nothing.",
                        call.invocation.member
                    ))
                })?;
                let (target, target_ty) = self.lower_target(target)?;
                let value = self.coerce(value, &ty, &target_ty)?;
                self.push(SequentialStatement::assign(target, value));
            }
        }
        Ok(())
    }

    fn memory(&mut self) -> LoweringResult<MemorySignals> {
        if !self.ctx.config.use_simple_memory {
            return unsupported("memory access while the memory is disabled");
        }
        if let Some(memory) = &self.component.memory {
            return Ok(memory.clone());
        }
        let memory = MemorySignals::declare(&mut self.component)?;
        self.component.memory = Some(memory.clone());
        Ok(memory)
    }

    fn lower_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        inv: &Invocation,
    ) -> LoweringResult<Option<(VhdlExpression, HardwareType)>> {
        if intrinsic.is_memory_access() {
            match inv.target.as_deref() {
                None => {}
                Some(Expression::Parameter(p))
                    if self.memory_parameters.contains(p) => {}
                Some(other) => {
                    return unsupported(format!(
                        "accessing the memory through `{}'",
                        Printer::expression_to_str(other)
                    ))
                }
            }
        }
        let int32 = HardwareType::Scalar(Scalar::INT32);
        match intrinsic {
            Intrinsic::MemoryRead(ty) => {
                let cell = self.lower_value(argument(inv, 0)?, &int32)?;
                let memory = self.memory()?;
                let scalar = self.cell_type(ty)?;
                self.fresh_state();
                let wait = self.fsm.add_state();
                let index = memory.cell_index.clone();
                let request = vec![
                    SequentialStatement::assign(index, cell),
                    flag(&memory.read_enable, true),
                    self.fsm.transition(wait),
                ];
                let idle = memory_idle(&memory);
                self.push(SequentialStatement::if_then(idle, request));

                self.current = wait;
                let hw = HardwareType::Scalar(scalar);
                let temp = self.temp("memoryRead", &hw)?;
                let data = memory.data_in.clone();
                let value = match scalar {
                    Scalar::Boolean => VhdlExpression::equals(
                        VhdlExpression::index(data, VhdlExpression::Integer(0)),
                        VhdlValue::StdLogic(true),
                    ),
                    s if s.is_signed() => as_signed(data.into()),
                    _ => as_unsigned(data.into()),
                };
                let after = self.fsm.add_state();
                let done = vec![
                    SequentialStatement::assign(temp.clone(), value),
                    flag(&memory.read_enable, false),
                    self.fsm.transition(after),
                ];
                let reads_done = memory.reads_done.clone().into();
                self.push(SequentialStatement::if_then(reads_done, done));
                self.current = after;
                Ok(Some((temp.into(), hw)))
            }
            Intrinsic::MemoryWrite(ty) => {
                let scalar = self.cell_type(ty)?;
                let cell = self.lower_value(argument(inv, 0)?, &int32)?;
                let hw = HardwareType::Scalar(scalar);
                let value = self.lower_value(argument(inv, 1)?, &hw)?;
                let memory = self.memory()?;
                self.fresh_state();
                let data_out = memory.data_out.clone();
                let word = |v| VhdlValue::from_integer(v, 32);
                let data = match (scalar, value) {
                    (Scalar::Boolean, value) => SequentialStatement::if_else(
                        value,
                        vec![SequentialStatement::assign(
                            data_out.clone(),
                            word(1),
                        )],
                        vec![SequentialStatement::assign(data_out, word(0))],
                    ),
                    (_, VhdlExpression::Value(bits)) => {
                        SequentialStatement::assign(data_out, bits)
                    }
                    (_, value) => SequentialStatement::assign(
                        data_out,
                        VhdlExpression::call("std_logic_vector", vec![value]),
                    ),
                };
                let wait = self.fsm.add_state();
                let index = memory.cell_index.clone();
                let request = vec![
                    SequentialStatement::assign(index, cell),
                    data,
                    flag(&memory.write_enable, true),
                    self.fsm.transition(wait),
                ];
                let idle = memory_idle(&memory);
                self.push(SequentialStatement::if_then(idle, request));

                self.current = wait;
                let after = self.fsm.add_state();
                let done = vec![
                    flag(&memory.write_enable, false),
                    self.fsm.transition(after),
                ];
                let writes_done = memory.writes_done.clone().into();
                self.push(SequentialStatement::if_then(writes_done, done));
                self.current = after;
                Ok(None)
            }
            Intrinsic::SquareRoot(ty) => {
                let scalar = Scalar::of_primitive(ty).ok_or_else(|| {
                    Error::invariant(format!("`{ty:?}' has no hardware type."))
                })?;
                let hw = HardwareType::Scalar(scalar);
                let value = self.lower_value(argument(inv, 0)?, &hw)?;
                let width = scalar.width();
                self.component
                    .declarations
                    .add(Declaration::Function(square_root_function(width)?))?;
                let call = VhdlExpression::function_call(
                    square_root_name(width),
                    vec![value],
                );
                let operation = TimedOperation::SquareRoot;
                let (result, scalar) =
                    self.timed(operation, "squareRoot", call, scalar)?;
                Ok(Some((result, HardwareType::Scalar(scalar))))
            }
        }
    }

    fn cell_type(&self, ty: PrimitiveType) -> LoweringResult<Scalar> {
        Scalar::of_primitive(ty).ok_or_else(|| {
            LoweringError::Failed(Error::invariant(format!(
                "Memory cells can't hold `{ty:?}'."
            )))
        })
    }

    fn finish(
        mut self,
        start: StateId,
    ) -> LoweringResult<(ArchitectureComponent, Vec<Warning>)> {
        self.goto(StateMachine::FINISHED);

        let started = self.component.signals.started.clone();
        let finished = self.component.signals.finished.clone();
        let mut begin = std::mem::take(&mut self.start_copies);
        begin.push(self.fsm.transition(start));
        self.fsm.push(
            StateMachine::WAIT_FOR_START,
            SequentialStatement::if_then(started.clone().into(), begin),
        );

        let mut done = vec![SequentialStatement::assign(
            finished.clone(),
            VhdlValue::Boolean(true),
        )];
        done.append(&mut self.finish_copies);
        done.push(SequentialStatement::if_then(
            VhdlExpression::not(started),
            vec![
                flag(&finished, false),
                self.fsm.transition(StateMachine::WAIT_FOR_START),
            ],
        ));
        for stmt in done {
            self.fsm.push(StateMachine::FINISHED, stmt);
        }

        let MemberLowering {
            mut component,
            fsm,
            written_fields,
            warnings,
            ..
        } = self;
        component.declarations.add(Declaration::Type(fsm.state_type()))?;
        component.process.declarations.data_object(fsm.state_variable())?;

        let mut on_reset: Vec<SequentialStatement> = component
            .internally_driven_signals
            .iter()
            .map(|(s, v)| SequentialStatement::assign(s.clone(), v.clone()))
            .collect();
        let variables = component
            .process
            .declarations
            .data_objects(DataObjectKind::Variable)
            .map(|d| {
                SequentialStatement::assign(d.reference(), d.reset_value())
            })
            .collect_vec();
        on_reset.extend(variables);
        on_reset.extend(
            written_fields
                .into_iter()
                .map(|(f, v)| SequentialStatement::assign(f, v)),
        );
        log::trace!(
            "`{}' has {} states.",
            component.name,
            fsm.state_count()
        );
        component.process.body = clocked(on_reset, vec![fsm.into_case()]);
        component.process.sensitivity.push(clock());
        Ok((component, warnings))
    }
}

/// `not ReadsDone and not WritesDone`: the previous access is over.
fn flag(signal: &DataObjectReference, value: bool) -> SequentialStatement {
    SequentialStatement::assign(signal.clone(), VhdlValue::Boolean(value))
}

fn memory_idle(memory: &MemorySignals) -> VhdlExpression {
    all([
        VhdlExpression::not(memory.reads_done.clone()),
        VhdlExpression::not(memory.writes_done.clone()),
    ])
}

/// Build the component of one instance of `member`.
pub fn lower_member(
    ctx: &TransformContext,
    member: &MemberDeclaration,
    instance_index: u32,
) -> LoweringResult<(ArchitectureComponent, Vec<Warning>)> {
    let Some(body) = &member.body else {
        return unsupported(format!("`{}' has no body", member.name));
    };
    let mut lowering = MemberLowering::new(ctx, member, instance_index);
    lowering.declare_interface()?;
    let start = lowering.fsm.add_state();
    lowering.current = start;
    lowering.lower_block(body)?;
    lowering.finish(start)
}
