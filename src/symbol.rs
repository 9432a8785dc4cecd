use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::{NameId, ProtocolId, RewriteContext};
use crate::term::Term;

/// The kinds of symbols, in the order used by the linear order on symbols,
/// smallest first.
///
/// Protocol is special: at the start of a term it denotes a nested type of
/// the protocol's Self type, and at the end of a term it denotes that the
/// term conforms to the protocol. The last three kinds are "property-like"
/// and may only appear at the end of a term.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum SymbolKind {
    Protocol,
    AssociatedType,
    GenericParam,
    Name,
    Layout,
    Superclass,
    ConcreteType,
}

/// A layout constraint, ordered by specificity with the most specific
/// constraint first.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum LayoutConstraint {
    NativeClass,
    Class,
    AnyObject,
    Trivial,
}

impl LayoutConstraint {
    /// The most specific constraint satisfying both inputs.
    pub fn merge(self, other: LayoutConstraint) -> LayoutConstraint {
        self.min(other)
    }

    pub fn parse(s: &str) -> Option<LayoutConstraint> {
        match s {
            "NativeClass" => Some(LayoutConstraint::NativeClass),
            "Class" => Some(LayoutConstraint::Class),
            "AnyObject" => Some(LayoutConstraint::AnyObject),
            "Trivial" => Some(LayoutConstraint::Trivial),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutConstraint::NativeClass => "NativeClass",
            LayoutConstraint::Class => "Class",
            LayoutConstraint::AnyObject => "AnyObject",
            LayoutConstraint::Trivial => "Trivial",
        }
    }
}

/// The interned content of a symbol.
///
/// For Superclass and ConcreteType, the schema is a canonical type whose
/// structural holes are numbered, and each substitution term fills one hole.
/// Substitution terms only reference generic parameters of depth 0.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum SymbolData {
    Name(NameId),
    Protocol(ProtocolId),
    AssociatedType {
        protocols: Vec<ProtocolId>,
        name: NameId,
    },
    GenericParam {
        depth: u16,
        index: u16,
    },
    Layout(LayoutConstraint),
    Superclass {
        schema: NameId,
        substitutions: Vec<Term>,
    },
    ConcreteType {
        schema: NameId,
        substitutions: Vec<Term>,
    },
}

/// The smallest element of the rewrite system: an interned handle into the
/// RewriteContext. Equal content always interns to the same handle, so
/// handle equality substitutes for structural equality.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    pub(crate) fn from_raw(raw: u32) -> Symbol {
        Symbol(raw)
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    /// Creates a new unbound name symbol.
    pub fn for_name(name: &str, ctx: &mut RewriteContext) -> Symbol {
        let name = ctx.name(name);
        ctx.intern_symbol(SymbolData::Name(name))
    }

    /// Creates a new protocol symbol.
    pub fn for_protocol(protocol: ProtocolId, ctx: &mut RewriteContext) -> Symbol {
        ctx.intern_symbol(SymbolData::Protocol(protocol))
    }

    /// Creates an associated type symbol. A symbol with more than one
    /// protocol is a merged symbol, denoting a nested type that conforms to
    /// multiple protocols which all declare an associated type with this
    /// name.
    pub fn for_associated_type(
        protocols: &[ProtocolId],
        name: &str,
        ctx: &mut RewriteContext,
    ) -> Symbol {
        assert!(!protocols.is_empty());
        let name = ctx.name(name);
        ctx.intern_symbol(SymbolData::AssociatedType {
            protocols: protocols.to_vec(),
            name,
        })
    }

    /// Creates a generic parameter symbol, denoting a generic parameter of
    /// the top-level generic signature.
    pub fn for_generic_param(depth: u16, index: u16, ctx: &mut RewriteContext) -> Symbol {
        ctx.intern_symbol(SymbolData::GenericParam { depth, index })
    }

    /// Creates a layout symbol, denoting a layout constraint.
    pub fn for_layout(layout: LayoutConstraint, ctx: &mut RewriteContext) -> Symbol {
        ctx.intern_symbol(SymbolData::Layout(layout))
    }

    /// Creates a superclass symbol from a type schema and the terms filling
    /// the schema's holes.
    pub fn for_superclass(
        schema: &str,
        substitutions: Vec<Term>,
        ctx: &mut RewriteContext,
    ) -> Symbol {
        let schema = ctx.name(schema);
        ctx.intern_symbol(SymbolData::Superclass {
            schema,
            substitutions,
        })
    }

    /// Creates a concrete type symbol from a type schema and the terms
    /// filling the schema's holes.
    pub fn for_concrete_type(
        schema: &str,
        substitutions: Vec<Term>,
        ctx: &mut RewriteContext,
    ) -> Symbol {
        let schema = ctx.name(schema);
        ctx.intern_symbol(SymbolData::ConcreteType {
            schema,
            substitutions,
        })
    }

    pub fn kind(self, ctx: &RewriteContext) -> SymbolKind {
        match ctx.symbol_data(self) {
            SymbolData::Name(_) => SymbolKind::Name,
            SymbolData::Protocol(_) => SymbolKind::Protocol,
            SymbolData::AssociatedType { .. } => SymbolKind::AssociatedType,
            SymbolData::GenericParam { .. } => SymbolKind::GenericParam,
            SymbolData::Layout(_) => SymbolKind::Layout,
            SymbolData::Superclass { .. } => SymbolKind::Superclass,
            SymbolData::ConcreteType { .. } => SymbolKind::ConcreteType,
        }
    }

    /// A property records something about a term's type: a protocol
    /// conformance, a layout constraint, or a superclass or concrete type
    /// constraint.
    pub fn is_property(self, ctx: &RewriteContext) -> bool {
        matches!(
            self.kind(ctx),
            SymbolKind::Protocol
                | SymbolKind::Layout
                | SymbolKind::Superclass
                | SymbolKind::ConcreteType
        )
    }

    pub fn is_superclass_or_concrete_type(self, ctx: &RewriteContext) -> bool {
        matches!(
            self.kind(ctx),
            SymbolKind::Superclass | SymbolKind::ConcreteType
        )
    }

    /// The name of an unbound name symbol or an associated type symbol.
    pub fn name(self, ctx: &RewriteContext) -> NameId {
        match ctx.symbol_data(self) {
            SymbolData::Name(name) => *name,
            SymbolData::AssociatedType { name, .. } => *name,
            data => panic!("symbol has no name: {:?}", data),
        }
    }

    /// The single protocol of a protocol symbol.
    pub fn protocol(self, ctx: &RewriteContext) -> ProtocolId {
        match ctx.symbol_data(self) {
            SymbolData::Protocol(protocol) => *protocol,
            data => panic!("not a protocol symbol: {:?}", data),
        }
    }

    /// The protocols of a protocol or associated type symbol. For a protocol
    /// symbol the slice has exactly one element.
    pub fn protocols(self, ctx: &RewriteContext) -> &[ProtocolId] {
        match ctx.symbol_data(self) {
            SymbolData::Protocol(protocol) => std::slice::from_ref(protocol),
            SymbolData::AssociatedType { protocols, .. } => protocols,
            data => panic!("symbol has no protocols: {:?}", data),
        }
    }

    /// The (depth, index) pair of a generic parameter symbol.
    pub fn generic_param(self, ctx: &RewriteContext) -> (u16, u16) {
        match ctx.symbol_data(self) {
            SymbolData::GenericParam { depth, index } => (*depth, *index),
            data => panic!("not a generic parameter symbol: {:?}", data),
        }
    }

    pub fn layout_constraint(self, ctx: &RewriteContext) -> LayoutConstraint {
        match ctx.symbol_data(self) {
            SymbolData::Layout(layout) => *layout,
            data => panic!("not a layout symbol: {:?}", data),
        }
    }

    /// The type schema of a superclass or concrete type symbol.
    pub fn type_schema(self, ctx: &RewriteContext) -> NameId {
        match ctx.symbol_data(self) {
            SymbolData::Superclass { schema, .. } => *schema,
            SymbolData::ConcreteType { schema, .. } => *schema,
            data => panic!("symbol has no type schema: {:?}", data),
        }
    }

    /// The substitution terms of a superclass or concrete type symbol.
    pub fn substitutions(self, ctx: &RewriteContext) -> &[Term] {
        match ctx.symbol_data(self) {
            SymbolData::Superclass { substitutions, .. } => substitutions,
            SymbolData::ConcreteType { substitutions, .. } => substitutions,
            data => panic!("symbol has no substitutions: {:?}", data),
        }
    }

    /// Linear order on symbols.
    ///
    /// The primary key is the kind, in SymbolKind order. Ties are broken as
    /// follows:
    ///
    /// - Associated type symbols with more protocols sort first, so a merged
    ///   symbol precedes the symbols it merged. Otherwise protocols are
    ///   compared pairwise with the graph comparator, then by name.
    /// - Generic parameters order by depth, then index.
    /// - Names and type schemas order lexicographically.
    /// - Protocols use the graph comparator.
    /// - Layouts use the specificity order on LayoutConstraint.
    /// - Superclass and concrete type symbols order by schema, then
    ///   substitution count, then pairwise substitution comparison.
    pub fn compare(self, other: Symbol, ctx: &RewriteContext, graph: &ProtocolGraph) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }

        let kind = self.kind(ctx);
        let other_kind = other.kind(ctx);
        if kind != other_kind {
            return kind.cmp(&other_kind);
        }

        let result = match kind {
            SymbolKind::Name => ctx
                .name_str(self.name(ctx))
                .cmp(ctx.name_str(other.name(ctx))),

            SymbolKind::Protocol => {
                graph.compare_protocols(self.protocol(ctx), other.protocol(ctx), ctx)
            }

            SymbolKind::AssociatedType => {
                let protos = self.protocols(ctx);
                let other_protos = other.protocols(ctx);

                // Symbols with more protocols are smaller.
                if protos.len() != other_protos.len() {
                    return other_protos.len().cmp(&protos.len());
                }

                for (&lhs, &rhs) in protos.iter().zip(other_protos) {
                    let result = graph.compare_protocols(lhs, rhs, ctx);
                    if result != Ordering::Equal {
                        return result;
                    }
                }

                ctx.name_str(self.name(ctx))
                    .cmp(ctx.name_str(other.name(ctx)))
            }

            SymbolKind::GenericParam => {
                let (depth, index) = self.generic_param(ctx);
                let (other_depth, other_index) = other.generic_param(ctx);
                depth.cmp(&other_depth).then(index.cmp(&other_index))
            }

            SymbolKind::Layout => self
                .layout_constraint(ctx)
                .cmp(&other.layout_constraint(ctx)),

            SymbolKind::Superclass | SymbolKind::ConcreteType => {
                let result = ctx
                    .name_str(self.type_schema(ctx))
                    .cmp(ctx.name_str(other.type_schema(ctx)));
                if result != Ordering::Equal {
                    return result;
                }

                let subs = self.substitutions(ctx);
                let other_subs = other.substitutions(ctx);
                if subs.len() != other_subs.len() {
                    return subs.len().cmp(&other_subs.len());
                }

                for (&lhs, &rhs) in subs.iter().zip(other_subs) {
                    let result = lhs.compare(rhs, ctx, graph);
                    if result != Ordering::Equal {
                        return result;
                    }
                }

                Ordering::Equal
            }
        };

        debug_assert!(
            result != Ordering::Equal,
            "two distinct symbols should not compare equal"
        );
        result
    }

    /// For a superclass or concrete type symbol, applies `f` to each
    /// substitution term and reinterns the result. Returns the original
    /// handle if nothing changed. Used to rebase substitutions when a term's
    /// prefix changes or its substitutions become reducible.
    ///
    /// Panics if this is not a superclass or concrete type symbol.
    pub fn transform_concrete_substitutions<F>(self, ctx: &mut RewriteContext, mut f: F) -> Symbol
    where
        F: FnMut(&mut RewriteContext, Term) -> Term,
    {
        let (kind, schema, substitutions) = match ctx.symbol_data(self) {
            SymbolData::Superclass {
                schema,
                substitutions,
            } => (SymbolKind::Superclass, *schema, substitutions.clone()),
            SymbolData::ConcreteType {
                schema,
                substitutions,
            } => (SymbolKind::ConcreteType, *schema, substitutions.clone()),
            data => panic!("symbol has no substitutions: {:?}", data),
        };

        if substitutions.is_empty() {
            return self;
        }

        let mut any_changed = false;
        let mut new_substitutions = Vec::with_capacity(substitutions.len());
        for term in substitutions {
            let new_term = f(ctx, term);
            if new_term != term {
                any_changed = true;
            }
            new_substitutions.push(new_term);
        }

        if !any_changed {
            return self;
        }

        let data = match kind {
            SymbolKind::Superclass => SymbolData::Superclass {
                schema,
                substitutions: new_substitutions,
            },
            SymbolKind::ConcreteType => SymbolData::ConcreteType {
                schema,
                substitutions: new_substitutions,
            },
            _ => unreachable!(),
        };
        ctx.intern_symbol(data)
    }

    /// Renders the symbol in mnemonic form: `A`, `[P]`, `[P&Q:T]`, `x0`,
    /// `[layout: Class]`, `[superclass: Foo with <...>]`, `[concrete: Foo]`.
    pub fn display(self, ctx: &RewriteContext) -> String {
        let substitutions_str = |substitutions: &[Term]| {
            if substitutions.is_empty() {
                return String::new();
            }
            let parts: Vec<String> = substitutions
                .iter()
                .map(|term| term.display(ctx))
                .collect();
            format!(" with <{}>", parts.join(", "))
        };

        match ctx.symbol_data(self) {
            SymbolData::Name(name) => ctx.name_str(*name).to_string(),

            SymbolData::Protocol(protocol) => format!("[{}]", ctx.protocol_name(*protocol)),

            SymbolData::AssociatedType { protocols, name } => {
                let parts: Vec<&str> = protocols
                    .iter()
                    .map(|&protocol| ctx.protocol_name(protocol))
                    .collect();
                format!("[{}:{}]", parts.join("&"), ctx.name_str(*name))
            }

            SymbolData::GenericParam { depth, index } => {
                if *depth == 0 {
                    format!("x{}", index)
                } else {
                    format!("x{}_{}", depth, index)
                }
            }

            SymbolData::Layout(layout) => format!("[layout: {}]", layout.as_str()),

            SymbolData::Superclass {
                schema,
                substitutions,
            } => format!(
                "[superclass: {}{}]",
                ctx.name_str(*schema),
                substitutions_str(substitutions)
            ),

            SymbolData::ConcreteType {
                schema,
                substitutions,
            } => format!(
                "[concrete: {}{}]",
                ctx.name_str(*schema),
                substitutions_str(substitutions)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::MutableTerm;

    fn setup() -> (RewriteContext, ProtocolGraph) {
        (RewriteContext::new(), ProtocolGraph::new())
    }

    #[test]
    fn test_kind_ordering() {
        assert!(SymbolKind::Protocol < SymbolKind::AssociatedType);
        assert!(SymbolKind::AssociatedType < SymbolKind::GenericParam);
        assert!(SymbolKind::GenericParam < SymbolKind::Name);
        assert!(SymbolKind::Name < SymbolKind::Layout);
        assert!(SymbolKind::Layout < SymbolKind::Superclass);
        assert!(SymbolKind::Superclass < SymbolKind::ConcreteType);
    }

    #[test]
    fn test_merged_symbol_sorts_before_components() {
        let (mut ctx, mut graph) = setup();
        let p = ctx.add_protocol("P");
        let q = ctx.add_protocol("Q");
        graph.add_protocol(p, &[]);
        graph.add_protocol(q, &[]);

        let merged = Symbol::for_associated_type(&[p, q], "T", &mut ctx);
        let just_p = Symbol::for_associated_type(&[p], "T", &mut ctx);
        let just_q = Symbol::for_associated_type(&[q], "T", &mut ctx);

        assert_eq!(merged.compare(just_p, &ctx, &graph), Ordering::Less);
        assert_eq!(merged.compare(just_q, &ctx, &graph), Ordering::Less);
        assert_eq!(just_p.compare(just_q, &ctx, &graph), Ordering::Less);
    }

    #[test]
    fn test_generic_param_ordering() {
        let (mut ctx, graph) = setup();
        let x0 = Symbol::for_generic_param(0, 0, &mut ctx);
        let x1 = Symbol::for_generic_param(0, 1, &mut ctx);
        let deep = Symbol::for_generic_param(1, 0, &mut ctx);

        assert_eq!(x0.compare(x1, &ctx, &graph), Ordering::Less);
        assert_eq!(x1.compare(deep, &ctx, &graph), Ordering::Less);
        assert_eq!(x0.compare(x0, &ctx, &graph), Ordering::Equal);
    }

    #[test]
    fn test_is_property() {
        let (mut ctx, _) = setup();
        let p = ctx.add_protocol("P");

        let protocol = Symbol::for_protocol(p, &mut ctx);
        let layout = Symbol::for_layout(LayoutConstraint::AnyObject, &mut ctx);
        let concrete = Symbol::for_concrete_type("Int", vec![], &mut ctx);
        let name = Symbol::for_name("A", &mut ctx);
        let assoc = Symbol::for_associated_type(&[p], "A", &mut ctx);
        let param = Symbol::for_generic_param(0, 0, &mut ctx);

        assert!(protocol.is_property(&ctx));
        assert!(layout.is_property(&ctx));
        assert!(concrete.is_property(&ctx));
        assert!(!name.is_property(&ctx));
        assert!(!assoc.is_property(&ctx));
        assert!(!param.is_property(&ctx));
    }

    #[test]
    fn test_layout_merge_keeps_most_specific() {
        assert_eq!(
            LayoutConstraint::AnyObject.merge(LayoutConstraint::NativeClass),
            LayoutConstraint::NativeClass
        );
        assert_eq!(
            LayoutConstraint::Class.merge(LayoutConstraint::Class),
            LayoutConstraint::Class
        );
    }

    #[test]
    fn test_transform_concrete_substitutions_reinterns() {
        let (mut ctx, _) = setup();
        let x0 = MutableTerm::parse("x0", &mut ctx);
        let x1 = MutableTerm::parse("x1", &mut ctx);
        let t0 = Term::get(&x0, &mut ctx);
        let t1 = Term::get(&x1, &mut ctx);

        let symbol = Symbol::for_concrete_type("Array", vec![t1], &mut ctx);

        // Identity transform returns the same handle.
        let unchanged = symbol.transform_concrete_substitutions(&mut ctx, |_, term| term);
        assert_eq!(unchanged, symbol);

        // Replacing x1 with x0 interns a new symbol equal to building it
        // directly.
        let changed = symbol.transform_concrete_substitutions(&mut ctx, |_, _| t0);
        let expected = Symbol::for_concrete_type("Array", vec![t0], &mut ctx);
        assert_eq!(changed, expected);
        assert_ne!(changed, symbol);
    }

    #[test]
    fn test_display() {
        let (mut ctx, _) = setup();
        let p = ctx.add_protocol("P");
        let q = ctx.add_protocol("Q");

        assert_eq!(Symbol::for_name("A", &mut ctx).display(&ctx), "A");
        assert_eq!(Symbol::for_protocol(p, &mut ctx).display(&ctx), "[P]");
        assert_eq!(
            Symbol::for_associated_type(&[p, q], "T", &mut ctx).display(&ctx),
            "[P&Q:T]"
        );
        assert_eq!(
            Symbol::for_generic_param(0, 2, &mut ctx).display(&ctx),
            "x2"
        );
        assert_eq!(
            Symbol::for_generic_param(1, 2, &mut ctx).display(&ctx),
            "x1_2"
        );
        assert_eq!(
            Symbol::for_layout(LayoutConstraint::Class, &mut ctx).display(&ctx),
            "[layout: Class]"
        );
    }
}
