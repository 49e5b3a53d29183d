#![forbid(unsafe_code)]

//! Per-path ownership facts, threaded through the walk by value.

use std::collections::BTreeMap;

use veritas_ast::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorrowKind {
    Immutable,
    Mutable,
}

impl BorrowKind {
    pub fn display(&self) -> &'static str {
        match self {
            BorrowKind::Immutable => "immutable",
            BorrowKind::Mutable => "mutable",
        }
    }
}

/// A binding keeping a borrow alive, identified by the frame that declares
/// it so a shadowing binding in an inner block is a different holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BorrowHolder {
    pub name: String,
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveBorrow {
    pub kind: BorrowKind,
    pub span: Span,
    /// The binding keeping the borrow alive (`let r = &x;`), or `None` for a
    /// temporary that ends with its statement.
    pub holder: Option<BorrowHolder>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableState {
    pub moved: bool,
    pub move_location: Option<Span>,
    pub active_borrows: Vec<ActiveBorrow>,
}

impl VariableState {
    pub fn mark_moved(&mut self, span: &Span) {
        if !self.moved {
            self.moved = true;
            self.move_location = Some(span.clone());
        }
    }

    /// Assignment gives the binding a fresh value.
    pub fn reinitialize(&mut self) {
        self.moved = false;
        self.move_location = None;
    }

    pub fn has_mutable_borrow(&self) -> bool {
        self.active_borrows.iter().any(|b| b.kind == BorrowKind::Mutable)
    }
}

type Frame = BTreeMap<String, VariableState>;

/// Ownership state of every visible binding, one frame per lexical block.
///
/// Branch points clone the whole state; merge points call [`FlowState::join`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowState {
    frames: Vec<Frame>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowState {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Index of the innermost frame, where new bindings land.
    pub fn innermost(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Drop the innermost frame. Borrows held by its bindings end with it.
    pub fn pop_frame(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        self.frames.pop();
        let popped = self.frames.len();
        self.retain_borrows(|b| b.holder.as_ref().is_none_or(|h| h.depth < popped));
    }

    /// Frame index of the binding `name` currently resolves to.
    pub fn frame_of(&self, name: &str) -> Option<usize> {
        self.frames.iter().rposition(|f| f.contains_key(name))
    }

    /// Introduce `name` in the innermost frame, shadowing outer bindings.
    pub fn declare(&mut self, name: impl Into<String>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), VariableState::default());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&VariableState> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut VariableState> {
        self.frames.iter_mut().rev().find_map(|f| f.get_mut(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn clear_borrows(&mut self) {
        self.retain_borrows(|_| false);
    }

    /// End every borrow not bound to a name.
    pub fn release_temporaries(&mut self) {
        self.retain_borrows(|b| b.holder.is_some());
    }

    fn retain_borrows(&mut self, mut keep: impl FnMut(&ActiveBorrow) -> bool) {
        for var in self.frames.iter_mut().flat_map(|f| f.values_mut()) {
            var.active_borrows.retain(&mut keep);
        }
    }

    /// Merge two paths: a binding is moved afterwards only if it was moved on
    /// both, and no borrow survives the merge.
    pub fn join(&self, other: &FlowState) -> FlowState {
        let mut merged = self.clone();
        for (frame, other_frame) in merged.frames.iter_mut().zip(&other.frames) {
            for (name, var) in frame.iter_mut() {
                let moved_on_both = other_frame.get(name).is_some_and(|o| o.moved);
                if !moved_on_both {
                    var.reinitialize();
                }
            }
        }
        merged.clear_borrows();
        merged
    }

    pub fn join_all(states: impl IntoIterator<Item = FlowState>) -> Option<FlowState> {
        states.into_iter().reduce(|acc, next| acc.join(&next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn borrow(kind: BorrowKind, holder: Option<(&str, usize)>) -> ActiveBorrow {
        ActiveBorrow {
            kind,
            span: Span::dummy(),
            holder: holder.map(|(name, depth)| BorrowHolder {
                name: name.to_string(),
                depth,
            }),
        }
    }

    #[test]
    fn join_requires_move_on_both_paths() {
        let mut base = FlowState::new();
        base.declare("a");
        base.declare("b");

        let mut left = base.clone();
        let mut right = base.clone();
        for name in ["a", "b"] {
            if let Some(v) = left.lookup_mut(name) {
                v.mark_moved(&Span::at(1, 1, 1));
            }
        }
        if let Some(v) = right.lookup_mut("a") {
            v.mark_moved(&Span::at(2, 1, 1));
        }

        let joined = left.join(&right);
        assert!(joined.lookup("a").is_some_and(|v| v.moved));
        assert!(joined.lookup("b").is_some_and(|v| !v.moved));
    }

    #[test]
    fn join_clears_borrows() {
        let mut state = FlowState::new();
        state.declare("x");
        if let Some(x) = state.lookup_mut("x") {
            x.active_borrows.push(borrow(BorrowKind::Mutable, Some(("r", 0))));
        }
        let joined = state.join(&state.clone());
        assert!(joined.lookup("x").is_some_and(|v| v.active_borrows.is_empty()));
    }

    #[test]
    fn popping_a_frame_releases_its_borrows_and_names() {
        let mut state = FlowState::new();
        state.declare("x");
        state.push_frame();
        state.declare("r");
        state.declare("x");
        if let Some(x) = state.lookup_mut("x") {
            x.mark_moved(&Span::dummy());
        }
        assert!(state.lookup("x").is_some_and(|v| v.moved));

        state.pop_frame();
        assert!(state.lookup("x").is_some_and(|v| !v.moved));
        assert!(!state.is_declared("r"));
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn held_borrows_outlive_statements() {
        let mut state = FlowState::new();
        state.declare("x");
        state.push_frame();
        state.declare("r");
        if let Some(x) = state.lookup_mut("x") {
            x.active_borrows.push(borrow(BorrowKind::Immutable, Some(("r", 1))));
            x.active_borrows.push(borrow(BorrowKind::Immutable, None));
        }
        state.release_temporaries();
        assert_eq!(state.lookup("x").map(|v| v.active_borrows.len()), Some(1));
        state.pop_frame();
        assert_eq!(state.lookup("x").map(|v| v.active_borrows.len()), Some(0));
    }

    #[test]
    fn shadowing_holder_in_inner_frame_keeps_outer_borrow() {
        let mut state = FlowState::new();
        state.declare("x");
        state.declare("r");
        if let Some(x) = state.lookup_mut("x") {
            x.active_borrows.push(borrow(BorrowKind::Mutable, Some(("r", 0))));
        }
        state.push_frame();
        state.declare("r");
        assert_eq!(state.frame_of("r"), Some(1));
        state.pop_frame();
        assert_eq!(state.frame_of("r"), Some(0));
        assert!(state.lookup("x").is_some_and(|v| v.has_mutable_borrow()));
    }
}
