use crate::traversal::BlockKind;
use hast_utils::FullName;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Identifies a scope: the program, a member body, or a block nested in a
/// member body.
///
/// Nested blocks are addressed by the path of child indices from the member
/// body, so the same body always produces the same ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    member: Option<FullName>,
    path: SmallVec<[u32; 8]>,
}

impl ScopeId {
    /// The scope of fields, properties and return slots.
    pub fn program() -> Self {
        ScopeId {
            member: None,
            path: SmallVec::new(),
        }
    }

    /// The body of a member. Parameters live here.
    pub fn member(member: FullName) -> Self {
        ScopeId {
            member: Some(member),
            path: SmallVec::new(),
        }
    }

    pub fn child(&self, index: u32) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        ScopeId {
            member: self.member,
            path,
        }
    }

    /// The enclosing scope. The program scope has no parent.
    pub fn parent(&self) -> Option<Self> {
        match (self.member, self.path.is_empty()) {
            (None, _) => None,
            (Some(_), true) => Some(ScopeId::program()),
            (Some(member), false) => Some(ScopeId {
                member: Some(member),
                path: SmallVec::from_slice(&self.path[..self.path.len() - 1]),
            }),
        }
    }

    /// This scope followed by every enclosing one, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = ScopeId> {
        std::iter::successors(Some(self.clone()), |s| s.parent())
    }

    pub fn is_program(&self) -> bool {
        self.member.is_none()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.member {
            None => write!(f, "<program>"),
            Some(member) => {
                write!(f, "{member}")?;
                for idx in &self.path {
                    write!(f, "/{idx}")?;
                }
                Ok(())
            }
        }
    }
}

struct Frame {
    scope: ScopeId,
    next_child: u32,
    declared: HashSet<FullName>,
}

/// Follows the block structure of a member body during a traversal.
///
/// Every visitor that has to agree on [ScopeId]s drives a tracker from its
/// `start_block` and `finish_block` hooks.
pub struct ScopeTracker {
    frames: Vec<Frame>,
}

impl ScopeTracker {
    pub fn new(member: FullName) -> Self {
        ScopeTracker {
            frames: vec![Frame {
                scope: ScopeId::member(member),
                next_child: 0,
                declared: HashSet::new(),
            }],
        }
    }

    /// A tracker outside of any member.
    pub fn program() -> Self {
        ScopeTracker {
            frames: vec![Frame {
                scope: ScopeId::program(),
                next_child: 0,
                declared: HashSet::new(),
            }],
        }
    }

    pub fn enter(&mut self, kind: BlockKind) {
        if kind == BlockKind::Body {
            return;
        }
        let Some(top) = self.frames.last_mut() else {
            return;
        };
        let scope = top.scope.child(top.next_child);
        top.next_child += 1;
        self.frames.push(Frame {
            scope,
            next_child: 0,
            declared: HashSet::new(),
        });
    }

    pub fn exit(&mut self, kind: BlockKind) {
        if kind != BlockKind::Body && self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn current(&self) -> ScopeId {
        self.frames
            .last()
            .map(|f| f.scope.clone())
            .unwrap_or_else(ScopeId::program)
    }

    /// Record that `local` is declared in the current scope.
    pub fn declare(&mut self, local: FullName) {
        if let Some(top) = self.frames.last_mut() {
            top.declared.insert(local);
        }
    }

    /// The innermost open scope declaring `local`. Falls back to the
    /// outermost scope for locals declared nowhere in sight.
    pub fn declaring_scope(&self, local: &FullName) -> ScopeId {
        self.frames
            .iter()
            .rev()
            .find(|f| f.declared.contains(local))
            .or_else(|| self.frames.first())
            .map(|f| f.scope.clone())
            .unwrap_or_else(ScopeId::program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_end_at_program() {
        let m = FullName::new("T::M()");
        let scope = ScopeId::member(m).child(1).child(0);
        let chain = scope.ancestors().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(chain, vec!["T::M()/1/0", "T::M()/1", "T::M()", "<program>"]);
    }

    #[test]
    fn sibling_blocks_get_distinct_scopes() {
        let m = FullName::new("T::M()");
        let mut tracker = ScopeTracker::new(m);
        tracker.enter(BlockKind::Body);
        tracker.enter(BlockKind::Then);
        let then = tracker.current();
        tracker.exit(BlockKind::Then);
        tracker.enter(BlockKind::Else);
        let els = tracker.current();
        tracker.exit(BlockKind::Else);
        assert_ne!(then, els);
        assert_eq!(then.parent(), els.parent());
        assert_eq!(tracker.current(), ScopeId::member(m));
    }

    #[test]
    fn declaring_scope_prefers_innermost() {
        let m = FullName::new("T::M()");
        let x = FullName::new("T::M()::x");
        let mut tracker = ScopeTracker::new(m);
        tracker.declare(x);
        tracker.enter(BlockKind::Loop);
        assert_eq!(tracker.declaring_scope(&x), ScopeId::member(m));
        tracker.declare(x);
        assert_eq!(tracker.declaring_scope(&x), tracker.current());
    }
}
