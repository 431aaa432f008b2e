use crate::{Expression, Invocation, TypeReference};
use hast_utils::FullName;
use serde::{Deserialize, Serialize};

/// A sequence of statements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Block { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Calls `f` on every statement of the block and of nested blocks,
    /// parents before children.
    pub fn for_each_statement<'a, F: FnMut(&'a Statement)>(&'a self, f: &mut F) {
        for stmt in &self.statements {
            stmt.for_each_statement(f);
        }
    }

    /// Calls `f` on every expression tree of the block. Sub-expressions are
    /// reached through [Expression::for_each].
    pub fn for_each_expression<'a, F: FnMut(&'a Expression)>(&'a self, f: &mut F) {
        self.for_each_statement(&mut |stmt| {
            for expr in stmt.expressions() {
                expr.for_each(f);
            }
        });
    }
}

/// One of the invocations started together by a
/// [Statement::ParallelInvocation].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelCall {
    /// Where the result is stored once every invocation finished.
    pub target: Option<Expression>,
    pub invocation: Invocation,
}

/// Statements of the program model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    VariableDeclaration {
        name: FullName,
        ty: TypeReference,
        initializer: Option<Expression>,
    },
    Assignment {
        target: Expression,
        value: Expression,
    },
    Expression(Expression),
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    Return(Option<Expression>),
    Block(Block),
    /// Invocations that start at the same time and are awaited together.
    ParallelInvocation(Vec<ParallelCall>),
    Break,
    Continue,
}

impl Statement {
    pub fn declare(
        name: FullName,
        ty: TypeReference,
        initializer: Option<Expression>,
    ) -> Self {
        Statement::VariableDeclaration {
            name,
            ty,
            initializer,
        }
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        Statement::Assignment { target, value }
    }

    pub fn if_else(
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    ) -> Self {
        Statement::If {
            condition,
            then_branch: Block::new(then_branch),
            else_branch: else_branch.map(Block::new),
        }
    }

    pub fn while_loop(condition: Expression, body: Vec<Statement>) -> Self {
        Statement::While {
            condition,
            body: Block::new(body),
        }
    }

    pub fn ret(value: Expression) -> Self {
        Statement::Return(Some(value))
    }

    /// Expression trees directly owned by this statement.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Statement::VariableDeclaration { initializer, .. } => {
                initializer.iter().collect()
            }
            Statement::Assignment { target, value } => vec![target, value],
            Statement::Expression(e) => vec![e],
            Statement::If { condition, .. }
            | Statement::While { condition, .. } => vec![condition],
            Statement::Return(value) => value.iter().collect(),
            Statement::ParallelInvocation(calls) => calls
                .iter()
                .flat_map(|call| {
                    call.target
                        .iter()
                        .chain(call.invocation.target.iter().map(|t| &**t))
                        .chain(call.invocation.arguments.iter().map(|a| &a.value))
                })
                .collect(),
            Statement::Block(_) | Statement::Break | Statement::Continue => {
                vec![]
            }
        }
    }

    /// Blocks nested directly in this statement.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => std::iter::once(then_branch)
                .chain(else_branch.iter())
                .collect(),
            Statement::While { body, .. } => vec![body],
            Statement::Block(block) => vec![block],
            _ => vec![],
        }
    }

    pub fn for_each_statement<'a, F: FnMut(&'a Statement)>(&'a self, f: &mut F) {
        f(self);
        for block in self.blocks() {
            block.for_each_statement(f);
        }
    }
}
