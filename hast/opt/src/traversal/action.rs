//! Actions control the traversal of member bodies.
use hast_ast::Statement;
use hast_utils::HastResult;

/// Result of performing a visit.
pub type VisResult = HastResult<Action>;

/// Action performed at the end of visiting a statement.
pub enum Action {
    /// Continue traversal of the member body.
    Continue,
    /// Globally abort traversal of the member body.
    Stop,
    /// Skips the traversal of this node's children but continues traversing
    /// the sibling nodes.
    SkipChildren,
    /// Replace the current statement with a new one.
    /// If performed using a start_* method, none of the newly created children
    /// will be visited.
    Change(Box<Statement>),
}

impl Action {
    /// Run the traversal specified by `next` if this traversal succeeds.
    /// If the result of this traversal is not `Action::Continue`, do not
    /// run `next()`.
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Change(_) | Action::Stop | Action::SkipChildren => Ok(self),
        }
    }

    pub fn change(stmt: Statement) -> Self {
        Action::Change(Box::new(stmt))
    }

    /// Applies the Change action if `self` is a Change action.
    /// Otherwise passes the action through unchanged
    pub(super) fn apply_change(self, stmt: &mut Statement) -> Action {
        match self {
            Action::Change(s) => {
                *stmt = *s;
                Action::Continue
            }
            action => action,
        }
    }

    /// Changes a Action::SkipChildren to Action::Continue.
    /// Should be called to indicate the boundary of traversing the children
    /// of a node.
    pub(super) fn pop(self) -> Self {
        match self {
            Action::SkipChildren => Action::Continue,
            x => x,
        }
    }
}
