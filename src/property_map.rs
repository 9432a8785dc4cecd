//! Extraction of per-type properties from a completed rewrite system.
//!
//! A rule of the form `T.[p] => T` says nothing gets rewritten so much as
//! it records a fact: the type named by `T` has property `[p]`. The
//! property map collects these facts into one bag per key term, so clients
//! can ask "what does the suffix structure imply about this type" without
//! re-scanning the rules.

use tracing::debug;

use crate::completion::CompletionResult;
use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::{ProtocolId, RewriteContext};
use crate::rewrite_system::RewriteSystem;
use crate::symbol::{LayoutConstraint, Symbol, SymbolKind};
use crate::term::MutableTerm;

/// The properties recorded against one key term: the protocols it conforms
/// to, its layout constraint, and its superclass and concrete type bounds,
/// if any.
#[derive(Clone, Debug)]
pub struct PropertyBag {
    key: MutableTerm,
    conforms_to: Vec<ProtocolId>,
    layout: Option<LayoutConstraint>,
    superclass: Option<Symbol>,
    concrete_type: Option<Symbol>,
}

impl PropertyBag {
    fn new(key: MutableTerm) -> PropertyBag {
        PropertyBag {
            key,
            conforms_to: vec![],
            layout: None,
            superclass: None,
            concrete_type: None,
        }
    }

    pub fn key(&self) -> &MutableTerm {
        &self.key
    }

    pub fn conforms_to(&self) -> &[ProtocolId] {
        &self.conforms_to
    }

    pub fn layout(&self) -> Option<LayoutConstraint> {
        self.layout
    }

    /// The superclass symbol, if a superclass bound was recorded.
    pub fn superclass(&self) -> Option<Symbol> {
        self.superclass
    }

    /// The concrete type symbol, if the key is constrained to a concrete
    /// type.
    pub fn concrete_type(&self) -> Option<Symbol> {
        self.concrete_type
    }

    fn add_property(&mut self, property: Symbol, ctx: &RewriteContext) {
        match property.kind(ctx) {
            SymbolKind::Protocol => {
                let protocol = property.protocol(ctx);
                if !self.conforms_to.contains(&protocol) {
                    self.conforms_to.push(protocol);
                }
            }

            SymbolKind::Layout => {
                let layout = property.layout_constraint(ctx);
                self.layout = Some(match self.layout {
                    Some(existing) => existing.merge(layout),
                    None => layout,
                });
            }

            SymbolKind::Superclass => {
                if self.superclass.is_none() {
                    self.superclass = Some(property);
                } else if self.superclass != Some(property) {
                    debug!(
                        key = %self.key.display(ctx),
                        "conflicting superclass bounds, keeping the first"
                    );
                }
            }

            SymbolKind::ConcreteType => {
                if self.concrete_type.is_none() {
                    self.concrete_type = Some(property);
                } else if self.concrete_type != Some(property) {
                    debug!(
                        key = %self.key.display(ctx),
                        "conflicting concrete type bounds, keeping the first"
                    );
                }
            }

            kind => panic!("not a property symbol: {:?}", kind),
        }
    }

    /// Copies the properties of a bag whose key is a suffix of this bag's
    /// key: whatever holds for the suffix holds for every term ending in it.
    fn copy_properties_from(&mut self, other: &PropertyBag) {
        for &protocol in &other.conforms_to {
            if !self.conforms_to.contains(&protocol) {
                self.conforms_to.push(protocol);
            }
        }
        if let Some(layout) = other.layout {
            self.layout = Some(match self.layout {
                Some(existing) => existing.merge(layout),
                None => layout,
            });
        }
        if self.superclass.is_none() {
            self.superclass = other.superclass;
        }
        if self.concrete_type.is_none() {
            self.concrete_type = other.concrete_type;
        }
    }
}

fn is_suffix(key: &MutableTerm, term: &MutableTerm) -> bool {
    key.len() <= term.len() && term.symbols()[term.len() - key.len()..] == *key.symbols()
}

/// The per-key property bags extracted from a rewrite system.
///
/// Bags are kept in ascending key length order, which is also construction
/// order: a bag copies the properties of the longest already-built bag
/// whose key is a proper suffix of its own, so suffix facts propagate
/// transitively.
#[derive(Debug, Default)]
pub struct PropertyMap {
    bags: Vec<PropertyBag>,
}

impl PropertyMap {
    pub fn new() -> PropertyMap {
        PropertyMap { bags: vec![] }
    }

    pub fn bags(&self) -> &[PropertyBag] {
        &self.bags
    }

    /// The bag with the longest key that is a suffix of `term`, if any.
    /// The bag's properties all hold for `term`.
    pub fn lookup(&self, term: &MutableTerm) -> Option<&PropertyBag> {
        self.bags
            .iter()
            .filter(|bag| is_suffix(&bag.key, term))
            .max_by_key(|bag| bag.key.len())
    }

    fn get_or_create(&mut self, key: MutableTerm) -> &mut PropertyBag {
        if let Some(position) = self.bags.iter().position(|bag| bag.key == key) {
            return &mut self.bags[position];
        }

        let mut bag = PropertyBag::new(key);
        let suffix = self
            .bags
            .iter()
            .filter(|other| other.key.len() < bag.key.len() && is_suffix(&other.key, &bag.key))
            .max_by_key(|other| other.key.len())
            .cloned();
        if let Some(suffix) = suffix {
            bag.copy_properties_from(&suffix);
        }

        self.bags.push(bag);
        self.bags.last_mut().expect("bag was just pushed")
    }

    /// Records a batch of (key, property) facts. Keys are inserted in
    /// ascending length order so suffix inheritance sees shorter keys
    /// first.
    fn add_properties(&mut self, mut entries: Vec<(MutableTerm, Symbol)>, ctx: &RewriteContext) {
        entries.sort_by_key(|(key, _)| key.len());
        for (key, property) in entries {
            self.get_or_create(key).add_property(property, ctx);
        }
    }

    /// Orders each bag's conformance list canonically.
    fn sort_conformances(&mut self, ctx: &RewriteContext, graph: &ProtocolGraph) {
        for bag in &mut self.bags {
            bag.conforms_to
                .sort_by(|&a, &b| graph.compare_protocols(a, b, ctx));
        }
    }
}

impl RewriteSystem {
    /// Completes the rewrite system, then populates `map` from its
    /// property rules: every surviving rule of the form `T.[p] => T`
    /// contributes property `[p]` to the bag keyed by `T`. Any previous
    /// contents of `map` are discarded; the sink reflects exactly this
    /// system.
    ///
    /// The map is populated even when completion hits a bound; its facts
    /// are still sound, completion failure only means they may be
    /// incomplete.
    pub fn build_property_map(
        &mut self,
        map: &mut PropertyMap,
        max_iterations: u32,
        max_depth: u32,
        ctx: &mut RewriteContext,
    ) -> (CompletionResult, u32) {
        map.bags.clear();

        let (result, iterations) =
            self.compute_confluent_completion(max_iterations, max_depth, ctx);
        self.simplify_right_hand_sides(ctx);

        let mut entries = vec![];
        for rule in &self.rules {
            if rule.is_deleted() {
                continue;
            }
            let lhs = rule.lhs();
            let property = lhs.back();
            if !property.is_property(ctx) {
                continue;
            }
            let key = MutableTerm::from_symbols(lhs.symbols()[..lhs.len() - 1].to_vec());
            if &key != rule.rhs() {
                continue;
            }
            entries.push((key, property));
        }

        map.add_properties(entries, ctx);
        map.sort_conformances(ctx, &self.protos);

        (result, iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        rules: &[(&str, &str)],
        protocols: &[(&str, &[&str])],
    ) -> (RewriteContext, PropertyMap, CompletionResult) {
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

        let mut map = PropertyMap::new();
        let (result, _) = system.build_property_map(&mut map, 1000, 10, &mut ctx);
        (ctx, map, result)
    }

    fn conformance_names(bag: &PropertyBag, ctx: &RewriteContext) -> Vec<String> {
        bag.conforms_to()
            .iter()
            .map(|&protocol| ctx.protocol_name(protocol).to_string())
            .collect()
    }

    #[test]
    fn test_conformance_and_layout_land_in_one_bag() {
        let (mut ctx, map, result) = build(
            &[
                ("x0.[P]", "x0"),
                ("x0.[Q]", "x0"),
                ("x0.[layout: Class]", "x0"),
            ],
            &[("P", &[]), ("Q", &[])],
        );
        assert_eq!(result, CompletionResult::Success);
        assert_eq!(map.bags().len(), 1);

        let term = MutableTerm::parse("x0", &mut ctx);
        let bag = map.lookup(&term).expect("x0 has properties");
        assert_eq!(conformance_names(bag, &ctx), ["P", "Q"]);
        assert_eq!(bag.layout(), Some(LayoutConstraint::Class));
        assert!(bag.superclass().is_none());
        assert!(bag.concrete_type().is_none());
    }

    #[test]
    fn test_layout_constraints_merge_to_most_specific() {
        let (mut ctx, map, result) = build(
            &[
                ("x0.[layout: AnyObject]", "x0"),
                ("x0.[layout: NativeClass]", "x0"),
            ],
            &[],
        );
        assert_eq!(result, CompletionResult::Success);

        let term = MutableTerm::parse("x0", &mut ctx);
        let bag = map.lookup(&term).expect("x0 has properties");
        assert_eq!(bag.layout(), Some(LayoutConstraint::NativeClass));
    }

    #[test]
    fn test_suffix_inheritance_from_protocol_domain() {
        // The rule in P's domain says any type ending in [P:T] conforms
        // to Q; the bag for x0.[P:T] must pick that up.
        let (mut ctx, map, result) = build(
            &[
                ("[P:T].[Q]", "[P:T]"),
                ("x0.[P:T].[layout: AnyObject]", "x0.[P:T]"),
            ],
            &[("P", &[]), ("Q", &[])],
        );
        assert_eq!(result, CompletionResult::Success);
        assert_eq!(map.bags().len(), 2);

        let term = MutableTerm::parse("x0.[P:T]", &mut ctx);
        let bag = map.lookup(&term).expect("x0.[P:T] has properties");
        assert_eq!(bag.key().display(&ctx), "x0.[P:T]");
        assert_eq!(conformance_names(bag, &ctx), ["Q"]);
        assert_eq!(bag.layout(), Some(LayoutConstraint::AnyObject));

        // A different term ending in [P:T] finds the suffix bag directly.
        let other = MutableTerm::parse("x1.[P:T]", &mut ctx);
        let bag = map.lookup(&other).expect("suffix bag applies");
        assert_eq!(bag.key().display(&ctx), "[P:T]");
        assert_eq!(conformance_names(bag, &ctx), ["Q"]);
    }

    #[test]
    fn test_superclass_and_concrete_type_bounds() {
        let (mut ctx, map, result) = build(
            &[
                ("x0.[superclass: Base]", "x0"),
                ("x1.[concrete: Int]", "x1"),
            ],
            &[],
        );
        assert_eq!(result, CompletionResult::Success);
        assert_eq!(map.bags().len(), 2);

        let term = MutableTerm::parse("x0", &mut ctx);
        let bag = map.lookup(&term).expect("x0 has properties");
        let superclass = bag.superclass().expect("superclass bound");
        assert_eq!(superclass.display(&ctx), "[superclass: Base]");
        assert!(bag.concrete_type().is_none());

        let term = MutableTerm::parse("x1", &mut ctx);
        let bag = map.lookup(&term).expect("x1 has properties");
        let concrete = bag.concrete_type().expect("concrete bound");
        assert_eq!(concrete.display(&ctx), "[concrete: Int]");
    }

    #[test]
    fn test_lookup_prefers_longest_suffix() {
        let (mut ctx, map, result) = build(
            &[
                ("[P:T].[Q]", "[P:T]"),
                ("x0.[P:T].[R]", "x0.[P:T]"),
            ],
            &[("P", &[]), ("Q", &[]), ("R", &[])],
        );
        assert_eq!(result, CompletionResult::Success);

        let term = MutableTerm::parse("x0.[P:T]", &mut ctx);
        let bag = map.lookup(&term).expect("bag exists");
        assert_eq!(bag.key().display(&ctx), "x0.[P:T]");
        assert_eq!(conformance_names(bag, &ctx), ["Q", "R"]);

        let unrelated = MutableTerm::parse("x2", &mut ctx);
        assert!(map.lookup(&unrelated).is_none());
    }

    #[test]
    fn test_rebuild_discards_previous_contents() {
        let mut ctx = RewriteContext::new();
        let mut map = PropertyMap::new();

        let mut first = RewriteSystem::new();
        first.initialize(
            vec![(
                MutableTerm::parse("x0.[P]", &mut ctx),
                MutableTerm::parse("x0", &mut ctx),
            )],
            ProtocolGraph::new(),
            &mut ctx,
        );
        first.build_property_map(&mut map, 1000, 10, &mut ctx);
        assert_eq!(map.bags().len(), 1);

        let mut second = RewriteSystem::new();
        second.initialize(
            vec![(
                MutableTerm::parse("x1.[Q]", &mut ctx),
                MutableTerm::parse("x1", &mut ctx),
            )],
            ProtocolGraph::new(),
            &mut ctx,
        );
        second.build_property_map(&mut map, 1000, 10, &mut ctx);

        // Only the second system's facts survive.
        assert_eq!(map.bags().len(), 1);
        let stale = MutableTerm::parse("x0", &mut ctx);
        assert!(map.lookup(&stale).is_none());
        let term = MutableTerm::parse("x1", &mut ctx);
        assert!(map.lookup(&term).is_some());
    }

    #[test]
    fn test_derived_conformance_reaches_the_map() {
        // x0.T reduces to x0, so completion derives x0.[P] => x0 and the
        // conformance shows up against x0 rather than x0.[P:T].
        let (mut ctx, map, result) = build(
            &[
                ("x0.[P:T].[P]", "x0.[P:T]"),
                ("x0.[P:T]", "x0"),
            ],
            &[("P", &[])],
        );
        assert_eq!(result, CompletionResult::Success);

        let term = MutableTerm::parse("x0", &mut ctx);
        let bag = map.lookup(&term).expect("x0 has properties");
        assert_eq!(conformance_names(bag, &ctx), ["P"]);
    }
}
