//! The bounded completion procedure.
//!
//! Starting from the rules the client added, completion repeatedly finds
//! overlapping left hand sides, forms their critical pair, and adds the
//! resolved pair as a new rule, until every overlap is joinable or a bound
//! is hit. A confluent system rewrites every term to a unique normal form
//! regardless of application order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rewrite_context::{ProtocolId, RewriteContext};
use crate::rewrite_system::RewriteSystem;
use crate::symbol::{Symbol, SymbolKind};
use crate::term::{MutableTerm, Overlap};

/// The outcome of the completion procedure. Completion of an arbitrary
/// rewrite system is undecidable, so both bounds are load-bearing: hitting
/// one means the requirements are too complex for the configured limits,
/// not that anything went wrong internally.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompletionResult {
    /// The rewrite system is confluent.
    Success,

    /// The pair limit was reached before the worklist drained.
    MaxIterations,

    /// Completion produced a rule whose left hand side exceeds the length
    /// limit.
    MaxDepth,
}

impl RewriteSystem {
    /// Builds the critical pair for an overlap between the left hand sides
    /// of rules `i` and `j`: the two terms reached by rewriting the
    /// overlapped term one step with each rule. Adding the pair as a rule
    /// makes the overlap joinable.
    fn compute_critical_pair(
        &self,
        i: usize,
        j: usize,
        overlap: Overlap,
    ) -> (MutableTerm, MutableTerm) {
        let rule = &self.rules[i];
        let other = &self.rules[j];

        match overlap {
            // lhs(i) == T·U·V and lhs(j) == U. The overlapped term is
            // lhs(i) itself; rule i rewrites it to rhs(i), rule j rewrites
            // the embedded U, yielding T·rhs(j)·V.
            Overlap::First(t, v) => {
                let first = rule.rhs().clone();
                let mut second = t;
                second.append(other.rhs());
                second.append(&v);
                (first, second)
            }

            // lhs(i) == T·U and lhs(j) == U·V. The overlapped term is
            // T·U·V; rule i rewrites the prefix, yielding rhs(i)·V, and
            // rule j rewrites the suffix, yielding T·rhs(j).
            Overlap::Second(t, v) => {
                let mut first = rule.rhs().clone();
                first.append(&v);
                let mut second = t;
                second.append(other.rhs());
                (first, second)
            }
        }
    }

    /// Runs completion until the worklist drains or a bound is hit.
    /// Returns the outcome together with the number of worklist pairs
    /// processed.
    ///
    /// Every pair of rules is checked for overlap in both directions. A
    /// non-joinable critical pair becomes a new rule, which is checked
    /// against all live rules in turn; a rule whose left hand side the new
    /// rule can reduce is deleted as redundant. Deferred associated type
    /// merge candidates are processed once the worklist drains, and the
    /// rules they introduce feed back into overlap checking.
    ///
    /// On a bound failure the rule set is left in a usable but
    /// non-confluent state; `simplify` still terminates, it just no longer
    /// guarantees unique normal forms. Unprocessed pairs remain on the
    /// worklist, so calling again with a larger budget continues the run.
    pub fn compute_confluent_completion(
        &mut self,
        max_iterations: u32,
        max_depth: u32,
        ctx: &mut RewriteContext,
    ) -> (CompletionResult, u32) {
        let mut iterations = 0;

        loop {
            while let Some(&(i, j)) = self.worklist.front() {
                // Check the budget before popping, so the pair that trips
                // the limit stays queued and a retry with a larger budget
                // resumes where this run stopped.
                if iterations >= max_iterations {
                    info!(iterations, "completion exceeded the pair limit");
                    return (CompletionResult::MaxIterations, iterations);
                }
                self.worklist.pop_front();
                iterations += 1;

                // A rule deleted after this pair was queued.
                if self.rules[i].is_deleted() || self.rules[j].is_deleted() {
                    continue;
                }

                let overlap = match self.rules[i].check_for_overlap(&self.rules[j]) {
                    Some(overlap) => overlap,
                    None => continue,
                };

                let (first, second) = self.compute_critical_pair(i, j, overlap);

                // A joinable pair simplifies to a trivial equation inside
                // add_rule and adds nothing.
                if !self.add_rule(first, second, ctx) {
                    continue;
                }

                let new_index = self.rules.len() - 1;
                if self.rules[new_index].depth() > max_depth as usize {
                    info!(
                        iterations,
                        depth = self.rules[new_index].depth(),
                        "completion exceeded the depth limit"
                    );
                    return (CompletionResult::MaxDepth, iterations);
                }

                // The new rule makes any rule whose left hand side it can
                // reduce redundant; that rule's equation is still derivable
                // through the new rule.
                for index in 0..new_index {
                    if self.rules[index].is_deleted() {
                        continue;
                    }
                    if self.rules[index].can_reduce_left_hand_side(&self.rules[new_index]) {
                        debug!(rule = index, by = new_index, "deleting subsumed rule");
                        self.rules[index].mark_deleted();
                    }
                }
            }

            if self.merged_associated_types.is_empty() {
                break;
            }

            // Merging may add rules, which re-fills the worklist.
            self.process_merged_associated_types(ctx);
        }

        info!(iterations, rules = self.rules.len(), "completion succeeded");
        (CompletionResult::Success, iterations)
    }

    /// Constructs the merged associated type symbol for two symbols with
    /// the same name: the union of their protocols, pruned of protocols
    /// implied by another member, in canonical order.
    pub fn merge_associated_types(
        &self,
        lhs: Symbol,
        rhs: Symbol,
        ctx: &mut RewriteContext,
    ) -> Symbol {
        debug_assert_eq!(lhs.name(ctx), rhs.name(ctx));

        let mut protocols: Vec<ProtocolId> = lhs.protocols(ctx).to_vec();
        protocols.extend_from_slice(rhs.protocols(ctx));
        protocols.sort_by(|&a, &b| self.protos.compare_protocols(a, b, ctx));
        protocols.dedup();

        let pruned: Vec<ProtocolId> = protocols
            .iter()
            .copied()
            .filter(|&protocol| {
                !protocols
                    .iter()
                    .any(|&other| other != protocol && self.protos.inherits_from(other, protocol))
            })
            .collect();

        let name = ctx.name_str(lhs.name(ctx)).to_string();
        Symbol::for_associated_type(&pruned, &name, ctx)
    }

    /// Processes the deferred merge candidates recorded by `add_rule`.
    ///
    /// A candidate `X.[P1:T] => X.[P2:T]` says the two associated types are
    /// the same nested type, so that type conforms to both protocols. For
    /// each candidate this introduces the merged symbol `[P1&P2:T]`,
    /// rewrites both originals to it, and lifts conformance rules of either
    /// original onto it: `[P1:T].[Q] => [P1:T]` begets
    /// `[P1&P2:T].[Q] => [P1&P2:T]`.
    pub(crate) fn process_merged_associated_types(&mut self, ctx: &mut RewriteContext) {
        let candidates = std::mem::take(&mut self.merged_associated_types);

        for (lhs, rhs) in candidates {
            let lhs_symbol = lhs.back();
            let rhs_symbol = rhs.back();
            let merged = self.merge_associated_types(lhs_symbol, rhs_symbol, ctx);

            // The right hand symbol already carries every protocol of the
            // left; the recorded rule needs no strengthening. This is also
            // what stops the pass from re-processing its own output.
            if merged == rhs_symbol {
                continue;
            }

            debug!(
                lhs = %lhs_symbol.display(ctx),
                rhs = %rhs_symbol.display(ctx),
                merged = %merged.display(ctx),
                "merging associated types"
            );

            let mut merged_term = rhs.clone();
            merged_term.set_back(merged);

            self.add_rule(lhs.clone(), merged_term.clone(), ctx);
            self.add_rule(rhs.clone(), merged_term.clone(), ctx);

            // Lift conformance rules from either original symbol onto the
            // merged symbol.
            for index in 0..self.rules.len() {
                if self.rules[index].is_deleted() {
                    continue;
                }

                let rule_lhs = self.rules[index].lhs();
                if rule_lhs.len() != 2 {
                    continue;
                }
                let subject = rule_lhs.get(0);
                if subject != lhs_symbol && subject != rhs_symbol {
                    continue;
                }
                let property = rule_lhs.get(1);
                if property.kind(ctx) != SymbolKind::Protocol {
                    continue;
                }
                let rule_rhs = self.rules[index].rhs();
                if rule_rhs.len() != 1 || rule_rhs.get(0) != subject {
                    continue;
                }

                let mut new_lhs = MutableTerm::new();
                new_lhs.add(merged);
                new_lhs.add(property);
                let mut new_rhs = MutableTerm::new();
                new_rhs.add(merged);
                self.add_rule(new_lhs, new_rhs, ctx);
            }
        }
    }
}
