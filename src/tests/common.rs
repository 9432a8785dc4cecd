use rand::rngs::StdRng;
use rand::Rng;

use crate::completion::CompletionResult;
use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::{ProtocolId, RewriteContext};
use crate::rewrite_system::RewriteSystem;
use crate::term::MutableTerm;

pub const MAX_ITERATIONS: u32 = 2000;
pub const MAX_DEPTH: u32 = 12;

/// Builds a rewrite system from mnemonic rules and a list of
/// (protocol, inherited protocols). Parents must precede children.
pub fn build_system(
    rules: &[(&str, &str)],
    protocols: &[(&str, &[&str])],
) -> (RewriteContext, RewriteSystem) {
    let mut ctx = RewriteContext::new();

    let mut graph = ProtocolGraph::new();
    for &(name, inherited) in protocols {
        let inherited: Vec<ProtocolId> = inherited
            .iter()
            .map(|&parent| ctx.add_protocol(parent))
            .collect();
        let id = ctx.add_protocol(name);
        graph.add_protocol(id, &inherited);
    }

    let rules = rules
        .iter()
        .map(|&(lhs, rhs)| {
            (
                MutableTerm::parse(lhs, &mut ctx),
                MutableTerm::parse(rhs, &mut ctx),
            )
        })
        .collect();

    let mut system = RewriteSystem::new();
    system.initialize(rules, graph, &mut ctx);
    (ctx, system)
}

/// Runs completion and asserts it succeeds, returning the number of pairs
/// processed.
pub fn complete_ok(system: &mut RewriteSystem, ctx: &mut RewriteContext) -> u32 {
    let (result, iterations) =
        system.compute_confluent_completion(MAX_ITERATIONS, MAX_DEPTH, ctx);
    assert_eq!(
        result,
        CompletionResult::Success,
        "completion failed:\n{}",
        system.dump(ctx)
    );
    iterations
}

pub fn normal_form(s: &str, system: &RewriteSystem, ctx: &mut RewriteContext) -> String {
    let mut term = MutableTerm::parse(s, ctx);
    system.simplify(&mut term);
    term.display(ctx)
}

/// Reduces a term by repeatedly applying a randomly chosen applicable rule.
/// On a confluent system this must reach the same normal form as
/// `RewriteSystem::simplify`, whatever the rng does.
pub fn randomized_normal_form(
    term: &MutableTerm,
    system: &RewriteSystem,
    rng: &mut StdRng,
) -> MutableTerm {
    let mut term = term.clone();
    loop {
        let applicable: Vec<usize> = system
            .rules()
            .iter()
            .enumerate()
            .filter(|(_, rule)| !rule.is_deleted() && term.contains_sub_term(rule.lhs()))
            .map(|(index, _)| index)
            .collect();
        if applicable.is_empty() {
            return term;
        }
        let pick = applicable[rng.gen_range(0..applicable.len())];
        assert!(system.rules()[pick].apply(&mut term));
    }
}
