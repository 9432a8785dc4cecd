use std::cmp::Ordering;
use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::RewriteContext;
use crate::rule::Rule;
use crate::symbol::{Symbol, SymbolKind};
use crate::term::{MutableTerm, Term};

/// A term rewrite system for working with the types of a generic
/// signature.
///
/// One instance lives per completion problem: the caller seeds it with
/// requirement pairs via `initialize`, runs `compute_confluent_completion`,
/// and afterwards normalizes arbitrary terms with `simplify` or extracts
/// property rules with `build_property_map`. The rule vector is
/// index-stable: rules are tombstoned, never removed, because the
/// completion worklist refers to rules by index.
pub struct RewriteSystem {
    /// The rules added so far, from the client as well as from the
    /// completion procedure.
    pub(crate) rules: Vec<Rule>,

    /// The graph of all protocols transitively referenced by the rules,
    /// used for the linear order on symbols.
    pub(crate) protos: ProtocolGraph,

    /// Pending pairs for the associated type merging heuristic.
    ///
    /// Each pair (lhs, rhs) satisfies:
    /// - lhs > rhs
    /// - all symbols but the last are pairwise equal
    /// - both final symbols are associated type symbols with the same name
    ///
    /// See `process_merged_associated_types` for details.
    pub(crate) merged_associated_types: Vec<(MutableTerm, MutableTerm)>,

    /// Pending rule-index pairs for the overlap check in the completion
    /// procedure.
    pub(crate) worklist: VecDeque<(usize, usize)>,
}

impl RewriteSystem {
    pub fn new() -> RewriteSystem {
        RewriteSystem {
            rules: vec![],
            protos: ProtocolGraph::new(),
            merged_associated_types: vec![],
            worklist: VecDeque::new(),
        }
    }

    /// The object recording what is known about protocols.
    pub fn protocols(&self) -> &ProtocolGraph {
        &self.protos
    }

    /// The final rule collection, queryable after completion. Includes
    /// tombstoned rules; check `Rule::is_deleted`.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Seeds the rule set from caller-supplied requirement pairs, orienting
    /// each via `add_rule`.
    pub fn initialize(
        &mut self,
        rules: Vec<(MutableTerm, MutableTerm)>,
        protos: ProtocolGraph,
        ctx: &mut RewriteContext,
    ) {
        self.protos = protos;
        for (lhs, rhs) in rules {
            self.add_rule(lhs, rhs, ctx);
        }
    }

    /// Re-simplifies the substitutions of a superclass or concrete type
    /// symbol against the current rule set.
    pub(crate) fn simplify_substitutions(
        &self,
        symbol: Symbol,
        ctx: &mut RewriteContext,
    ) -> Symbol {
        symbol.transform_concrete_substitutions(ctx, |ctx, term| {
            let mut mutable = MutableTerm::from_term(term, ctx);
            if !self.simplify(&mut mutable) {
                return term;
            }
            Term::get(&mutable, ctx)
        })
    }

    /// Adds a rule for the equation `lhs == rhs`.
    ///
    /// Both sides are first simplified against the existing rules. If they
    /// are then equal, nothing is added and false is returned. Otherwise
    /// the greater term becomes the left hand side, the rule is appended,
    /// and an overlap check against every existing live rule is queued in
    /// both directions (overlap is not commutative).
    ///
    /// A rule of the merge shape `X.[P1:T] => X.[P2:T]` is additionally
    /// recorded for the associated type merging pass.
    pub fn add_rule(
        &mut self,
        mut lhs: MutableTerm,
        mut rhs: MutableTerm,
        ctx: &mut RewriteContext,
    ) -> bool {
        assert!(!lhs.is_empty(), "rule with empty left hand side");
        assert!(!rhs.is_empty(), "rule with empty right hand side");

        // Simplifying up front avoids unnecessary work in the completion
        // procedure.
        self.simplify(&mut lhs);
        self.simplify(&mut rhs);

        let result = lhs.compare(&rhs, ctx, &self.protos);
        if result == Ordering::Equal {
            return false;
        }
        if result == Ordering::Less {
            std::mem::swap(&mut lhs, &mut rhs);
        }

        if lhs.back().is_superclass_or_concrete_type(ctx) {
            let simplified = self.simplify_substitutions(lhs.back(), ctx);
            lhs.set_back(simplified);
        }

        debug_assert_eq!(lhs.compare(&rhs, ctx, &self.protos), Ordering::Greater);

        debug!(
            lhs = %lhs.display(ctx),
            rhs = %rhs.display(ctx),
            "adding rule"
        );

        // Check for the merge shape X.[P1:T] => X.[P2:T] and record it for
        // later; `process_merged_associated_types` will merge the two
        // associated type symbols.
        if lhs.len() == rhs.len()
            && lhs.symbols()[..lhs.len() - 1] == rhs.symbols()[..rhs.len() - 1]
            && lhs.back().kind(ctx) == SymbolKind::AssociatedType
            && rhs.back().kind(ctx) == SymbolKind::AssociatedType
            && lhs.back().name(ctx) == rhs.back().name(ctx)
        {
            self.merged_associated_types.push((lhs.clone(), rhs.clone()));
        }

        let new_index = self.rules.len();
        self.rules.push(Rule::new(lhs, rhs));

        // The new rule must be checked for overlap against every existing
        // live rule, in both directions.
        for other_index in 0..new_index {
            if self.rules[other_index].is_deleted() {
                continue;
            }
            self.worklist.push_back((new_index, other_index));
            self.worklist.push_back((other_index, new_index));
        }

        true
    }

    /// Reduces a term by applying rewrite rules until fixed point, and
    /// returns whether any rewriting occurred.
    ///
    /// The earliest-added applicable rule wins each step, then the scan
    /// restarts, so normalization is deterministic. Termination follows
    /// from every rewrite strictly decreasing the term order.
    pub fn simplify(&self, term: &mut MutableTerm) -> bool {
        let mut changed = false;

        loop {
            let mut applied = false;
            for (index, rule) in self.rules.iter().enumerate() {
                if rule.is_deleted() {
                    continue;
                }
                if rule.apply(term) {
                    trace!(rule = index, "applied rule");
                    changed = true;
                    applied = true;
                    break;
                }
            }
            if !applied {
                break;
            }
        }

        changed
    }

    /// Re-simplifies every surviving rule's right hand side against the
    /// final rule set; an RHS may have become reducible by rules discovered
    /// after it was added. Never re-orients or deletes a rule.
    pub fn simplify_right_hand_sides(&mut self, ctx: &RewriteContext) {
        for index in 0..self.rules.len() {
            if self.rules[index].is_deleted() {
                continue;
            }
            let mut rhs = self.rules[index].rhs().clone();
            self.simplify(&mut rhs);
            self.rules[index].set_rhs(rhs);
        }

        #[cfg(debug_assertions)]
        self.check_rule_invariants(ctx);
        #[cfg(not(debug_assertions))]
        let _ = ctx;
    }

    /// Structural invariants that hold for every surviving rule of a
    /// well-formed system once completion has settled.
    #[cfg(debug_assertions)]
    fn check_rule_invariants(&self, ctx: &RewriteContext) {
        for rule in &self.rules {
            if rule.is_deleted() {
                continue;
            }

            rule.lhs().assert_well_formed(ctx);
            rule.rhs().assert_well_formed(ctx);

            // The right hand side is always a canonical type term: no
            // unbound names, no property symbols past the root.
            for (index, &symbol) in rule.rhs().symbols().iter().enumerate() {
                let kind = symbol.kind(ctx);
                assert!(
                    kind != SymbolKind::Name,
                    "unbound name in right hand side: {}",
                    rule.display(ctx)
                );
                assert!(
                    !matches!(
                        kind,
                        SymbolKind::Layout | SymbolKind::Superclass | SymbolKind::ConcreteType
                    ),
                    "property symbol in right hand side: {}",
                    rule.display(ctx)
                );
                if index != 0 {
                    assert!(
                        kind != SymbolKind::Protocol,
                        "protocol past the root of a right hand side: {}",
                        rule.display(ctx)
                    );
                }
            }

            assert_eq!(
                rule.lhs().root_protocols(ctx),
                rule.rhs().root_protocols(ctx),
                "rule changes the root domain: {}",
                rule.display(ctx)
            );
        }
    }

    pub fn dump(&self, ctx: &RewriteContext) -> String {
        let mut out = String::from("Rewrite system: {\n");
        for rule in &self.rules {
            out.push_str("- ");
            out.push_str(&rule.display(ctx));
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }
}
