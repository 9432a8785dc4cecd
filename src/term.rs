use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::protocol_graph::ProtocolGraph;
use crate::rewrite_context::{ProtocolId, RewriteContext};
use crate::symbol::{LayoutConstraint, Symbol, SymbolKind};

/// An interned term: a permanently-allocated, uniqued sequence of one or
/// more symbols, used inside superclass and concrete type symbols and
/// anywhere a stable handle is preferable to a working copy. Produced only
/// by interning a MutableTerm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Term(u32);

impl Term {
    pub(crate) fn from_raw(raw: u32) -> Term {
        Term(raw)
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    /// Interns a working term. Panics if the term is empty.
    pub fn get(term: &MutableTerm, ctx: &mut RewriteContext) -> Term {
        ctx.intern_term(term.symbols())
    }

    pub fn symbols(self, ctx: &RewriteContext) -> &[Symbol] {
        ctx.term_symbols(self)
    }

    pub fn size(self, ctx: &RewriteContext) -> usize {
        self.symbols(ctx).len()
    }

    /// Shortlex order, see MutableTerm::compare.
    pub fn compare(self, other: Term, ctx: &RewriteContext, graph: &ProtocolGraph) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }

        let symbols = self.symbols(ctx);
        let other_symbols = other.symbols(ctx);
        if symbols.len() != other_symbols.len() {
            return symbols.len().cmp(&other_symbols.len());
        }

        for (&lhs, &rhs) in symbols.iter().zip(other_symbols) {
            let result = lhs.compare(rhs, ctx, graph);
            if result != Ordering::Equal {
                return result;
            }
        }

        Ordering::Equal
    }

    pub fn display(self, ctx: &RewriteContext) -> String {
        let parts: Vec<String> = self
            .symbols(ctx)
            .iter()
            .map(|symbol| symbol.display(ctx))
            .collect();
        parts.join(".")
    }
}

/// The two overlap shapes between two terms, used for critical pair
/// generation. This is the critical-pair construction for rewriting over
/// linear sequences, not trees: two left hand sides overlap when one
/// contains the other, or when a suffix of one matches a prefix of the
/// other.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Overlap {
    /// self == T·U·V and other == U; carries (T, V).
    First(MutableTerm, MutableTerm),

    /// self == T·U and other == U·V; carries (T, V).
    Second(MutableTerm, MutableTerm),
}

/// A working term: an owned, growable sequence of one or more symbols.
/// The unit of work for simplification, overlap detection, and ordering
/// comparisons.
///
/// The first symbol of a valid term is a protocol, generic parameter, or
/// associated type symbol; a property symbol may only appear at the end.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct MutableTerm {
    symbols: Vec<Symbol>,
}

impl MutableTerm {
    /// Creates an empty term. At least one symbol must be added for the
    /// term to become valid.
    pub fn new() -> MutableTerm {
        MutableTerm { symbols: vec![] }
    }

    pub fn from_symbols(symbols: Vec<Symbol>) -> MutableTerm {
        MutableTerm { symbols }
    }

    pub fn from_term(term: Term, ctx: &RewriteContext) -> MutableTerm {
        MutableTerm {
            symbols: term.symbols(ctx).to_vec(),
        }
    }

    pub fn add(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn append(&mut self, other: &MutableTerm) {
        self.symbols.extend_from_slice(&other.symbols);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn get(&self, index: usize) -> Symbol {
        self.symbols[index]
    }

    /// The last symbol. Panics on an empty term.
    pub fn back(&self) -> Symbol {
        *self.symbols.last().expect("empty term has no back symbol")
    }

    pub fn set_back(&mut self, symbol: Symbol) {
        *self.symbols.last_mut().expect("empty term has no back symbol") = symbol;
    }

    /// The "domain" of this term, read off the first symbol: the protocols
    /// of a protocol or associated type root, or the empty set for a
    /// generic parameter root. Panics on any other root.
    pub fn root_protocols(&self, ctx: &RewriteContext) -> Vec<ProtocolId> {
        let root = self.symbols[0];
        match root.kind(ctx) {
            SymbolKind::Protocol | SymbolKind::AssociatedType => root.protocols(ctx).to_vec(),
            SymbolKind::GenericParam => vec![],
            kind => panic!("bad root symbol kind: {:?}", kind),
        }
    }

    /// Shortlex order on terms: first compare lengths, then compare symbols
    /// lexicographically. Used both to orient new rules and to pick
    /// canonical forms.
    pub fn compare(
        &self,
        other: &MutableTerm,
        ctx: &RewriteContext,
        graph: &ProtocolGraph,
    ) -> Ordering {
        if self.len() != other.len() {
            return self.len().cmp(&other.len());
        }

        for (&lhs, &rhs) in self.symbols.iter().zip(&other.symbols) {
            let result = lhs.compare(rhs, ctx, graph);
            if result != Ordering::Equal {
                return result;
            }
        }

        Ordering::Equal
    }

    /// Finds the first position where `other` occurs as a contiguous
    /// subsequence of this term. Terms stay short (bounded by the depth
    /// cap), so a naive window scan is fine.
    pub fn find_sub_term(&self, other: &MutableTerm) -> Option<usize> {
        if other.is_empty() || other.len() > self.len() {
            return None;
        }

        (0..=self.len() - other.len())
            .find(|&start| self.symbols[start..start + other.len()] == other.symbols[..])
    }

    /// Returns true if this term contains, or is equal to, `other`.
    pub fn contains_sub_term(&self, other: &MutableTerm) -> bool {
        self.find_sub_term(other).is_some()
    }

    /// Replaces the first occurrence of `lhs` in this term with `rhs`.
    /// `rhs` must precede `lhs` in the linear order on terms. Returns true
    /// if the term contained `lhs`; otherwise the term is unchanged.
    pub fn rewrite_sub_term(&mut self, lhs: &MutableTerm, rhs: &MutableTerm) -> bool {
        let start = match self.find_sub_term(lhs) {
            Some(start) => start,
            None => return false,
        };

        debug_assert!(rhs.len() <= lhs.len());
        self.symbols
            .splice(start..start + lhs.len(), rhs.symbols.iter().copied());
        true
    }

    /// Detects the two overlap shapes between this term and `other`:
    ///
    /// - First: `other` occurs entirely inside this term (self == T·U·V,
    ///   other == U).
    /// - Second: a proper suffix of this term matches a proper prefix of
    ///   `other` (self == T·U, other == U·V); the longest such suffix wins.
    ///
    /// The check is directional; callers must also check the reversed pair.
    pub fn check_for_overlap(&self, other: &MutableTerm) -> Option<Overlap> {
        // Containment is only possible when the other term is no longer.
        if other.len() <= self.len() {
            if let Some(start) = self.find_sub_term(other) {
                let prefix = MutableTerm::from_symbols(self.symbols[..start].to_vec());
                let suffix =
                    MutableTerm::from_symbols(self.symbols[start + other.len()..].to_vec());
                return Some(Overlap::First(prefix, suffix));
            }
        }

        // Proper suffixes only: a full-length match is one term contained
        // in the other, which the first shape already covers from this
        // direction or the reversed call.
        let max_overlap = self.len().min(other.len());
        for overlap_len in (1..max_overlap).rev() {
            if self.symbols[self.len() - overlap_len..] == other.symbols[..overlap_len] {
                let prefix =
                    MutableTerm::from_symbols(self.symbols[..self.len() - overlap_len].to_vec());
                let rest = MutableTerm::from_symbols(other.symbols[overlap_len..].to_vec());
                return Some(Overlap::Second(prefix, rest));
            }
        }

        None
    }

    /// Structural invariants on a finished term: a valid root symbol,
    /// property symbols only at the end, generic parameters only at the
    /// start, protocols not in the middle.
    pub(crate) fn assert_well_formed(&self, ctx: &RewriteContext) {
        assert!(!self.is_empty(), "empty term");

        for (index, &symbol) in self.symbols.iter().enumerate() {
            let kind = symbol.kind(ctx);

            if index == 0 {
                assert!(
                    matches!(
                        kind,
                        SymbolKind::Protocol | SymbolKind::GenericParam | SymbolKind::AssociatedType
                    ),
                    "bad root symbol: {}",
                    symbol.display(ctx)
                );
            } else {
                assert!(kind != SymbolKind::GenericParam, "generic param not at root");
            }

            if index + 1 != self.len() {
                assert!(
                    !matches!(
                        kind,
                        SymbolKind::Layout | SymbolKind::Superclass | SymbolKind::ConcreteType
                    ),
                    "property symbol not at end: {}",
                    symbol.display(ctx)
                );
                if index != 0 {
                    assert!(kind != SymbolKind::Protocol, "protocol in the middle of a term");
                }
            }
        }
    }

    /// Parses a term from its mnemonic representation, with symbols
    /// separated by dots. Format per symbol: `A` for a name, `[P]` for a
    /// protocol, `[P&Q:T]` for an associated type, `x1` or `x1_2` for a
    /// generic parameter (depth defaults to 0), `[layout: Class]`,
    /// `[superclass: Foo]`, `[concrete: Foo]`. Protocols are registered in
    /// the context as a side effect.
    pub fn parse(s: &str, ctx: &mut RewriteContext) -> MutableTerm {
        let mut term = MutableTerm::new();
        for token in s.split('.') {
            term.add(parse_symbol(token.trim(), ctx));
        }
        term
    }

    pub fn display(&self, ctx: &RewriteContext) -> String {
        let parts: Vec<String> = self
            .symbols
            .iter()
            .map(|symbol| symbol.display(ctx))
            .collect();
        parts.join(".")
    }
}

fn parse_symbol(token: &str, ctx: &mut RewriteContext) -> Symbol {
    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        if let Some(rest) = inner.strip_prefix("layout: ") {
            let layout = match LayoutConstraint::parse(rest) {
                Some(layout) => layout,
                None => panic!("unknown layout constraint: '{}'", rest),
            };
            return Symbol::for_layout(layout, ctx);
        }
        if let Some(rest) = inner.strip_prefix("superclass: ") {
            return Symbol::for_superclass(rest, vec![], ctx);
        }
        if let Some(rest) = inner.strip_prefix("concrete: ") {
            return Symbol::for_concrete_type(rest, vec![], ctx);
        }
        if let Some((protocols, name)) = inner.split_once(':') {
            let ids: Vec<ProtocolId> = protocols
                .split('&')
                .map(|protocol| ctx.add_protocol(protocol))
                .collect();
            return Symbol::for_associated_type(&ids, name, ctx);
        }
        let protocol = ctx.add_protocol(inner);
        return Symbol::for_protocol(protocol, ctx);
    }

    if let Some(rest) = token.strip_prefix('x') {
        if let Some((depth, index)) = rest.split_once('_') {
            if let (Ok(depth), Ok(index)) = (depth.parse(), index.parse()) {
                return Symbol::for_generic_param(depth, index, ctx);
            }
        } else if let Ok(index) = rest.parse() {
            return Symbol::for_generic_param(0, index, ctx);
        }
    }

    Symbol::for_name(token, ctx)
}
