use std::cmp::Ordering;

use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::RewriteContext;
use crate::term::{MutableTerm, Overlap};

/// A rewrite rule that replaces occurrences of LHS with RHS.
///
/// Invariant: LHS is greater than RHS in the linear order on terms, so
/// every application strictly decreases a term.
#[derive(Clone, Debug)]
pub struct Rule {
    lhs: MutableTerm,
    rhs: MutableTerm,
    deleted: bool,
}

impl Rule {
    pub fn new(lhs: MutableTerm, rhs: MutableTerm) -> Rule {
        Rule {
            lhs,
            rhs,
            deleted: false,
        }
    }

    pub fn lhs(&self) -> &MutableTerm {
        &self.lhs
    }

    pub fn rhs(&self) -> &MutableTerm {
        &self.rhs
    }

    /// Performs one rewrite step on `term`, replacing the first occurrence
    /// of the LHS with the RHS. Returns whether a replacement occurred.
    pub fn apply(&self, term: &mut MutableTerm) -> bool {
        term.rewrite_sub_term(&self.lhs, &self.rhs)
    }

    /// Checks this rule's LHS against the other rule's LHS for the two
    /// overlap shapes that produce critical pairs.
    pub fn check_for_overlap(&self, other: &Rule) -> Option<Overlap> {
        self.lhs.check_for_overlap(&other.lhs)
    }

    /// Returns true if the other rule's LHS occurs inside this rule's LHS,
    /// meaning this rule is subsumed once the other rule exists.
    pub fn can_reduce_left_hand_side(&self, other: &Rule) -> bool {
        self.lhs.contains_sub_term(&other.lhs)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Deletes the rule, removing it from consideration in simplification
    /// and completion. Deleted rules are marked rather than removed from
    /// the rule vector, so rule indices held elsewhere (in particular by
    /// the completion worklist) remain valid.
    pub fn mark_deleted(&mut self) {
        assert!(!self.deleted);
        self.deleted = true;
    }

    /// Replaces the RHS with a simplified version. Never used to re-orient
    /// a rule.
    pub(crate) fn set_rhs(&mut self, rhs: MutableTerm) {
        self.rhs = rhs;
    }

    /// The length of the left hand side: the quantity bounded by the
    /// completion depth limit.
    pub fn depth(&self) -> usize {
        self.lhs.len()
    }

    /// Orders rules by their left hand sides.
    pub fn compare(&self, other: &Rule, ctx: &RewriteContext, graph: &ProtocolGraph) -> Ordering {
        self.lhs.compare(&other.lhs, ctx, graph)
    }

    pub fn display(&self, ctx: &RewriteContext) -> String {
        let mut out = format!("{} => {}", self.lhs.display(ctx), self.rhs.display(ctx));
        if self.deleted {
            out.push_str(" [deleted]");
        }
        out
    }
}
