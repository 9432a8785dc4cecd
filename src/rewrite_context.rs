use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::symbol::{Symbol, SymbolData};
use crate::term::{MutableTerm, Term};

/// An interned identifier, used for unbound names, associated type names,
/// and concrete type schemas.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct NameId(pub u32);

/// An interned protocol. The RewriteContext records the protocol's name;
/// everything else about a protocol lives in the ProtocolGraph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ProtocolId(pub u32);

/// The content-addressed arena that owns all interned symbol and term
/// storage for one completion problem.
///
/// Interning the same content twice always yields the same handle, so
/// handle equality substitutes for structural equality everywhere.
/// The context is single-threaded; concurrent callers must each use an
/// independent context.
pub struct RewriteContext {
    names: Vec<String>,
    name_ids: HashMap<String, NameId>,

    protocols: Vec<String>,
    protocol_ids: HashMap<String, ProtocolId>,

    symbols: Vec<SymbolData>,
    symbol_ids: HashMap<SymbolData, Symbol>,

    terms: Vec<Vec<Symbol>>,
    term_ids: HashMap<Vec<Symbol>, Term>,
}

impl RewriteContext {
    pub fn new() -> RewriteContext {
        RewriteContext {
            names: vec![],
            name_ids: HashMap::new(),
            protocols: vec![],
            protocol_ids: HashMap::new(),
            symbols: vec![],
            symbol_ids: HashMap::new(),
            terms: vec![],
            term_ids: HashMap::new(),
        }
    }

    /// Interns a name, returning the existing id if this name was seen before.
    pub fn name(&mut self, s: &str) -> NameId {
        if let Some(&id) = self.name_ids.get(s) {
            return id;
        }
        let id = NameId(self.names.len() as u32);
        self.names.push(s.to_string());
        self.name_ids.insert(s.to_string(), id);
        id
    }

    pub fn name_str(&self, id: NameId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Registers a protocol by name, returning the existing id if this
    /// protocol was seen before.
    pub fn add_protocol(&mut self, s: &str) -> ProtocolId {
        if let Some(&id) = self.protocol_ids.get(s) {
            return id;
        }
        let id = ProtocolId(self.protocols.len() as u32);
        self.protocols.push(s.to_string());
        self.protocol_ids.insert(s.to_string(), id);
        id
    }

    pub fn protocol_named(&self, s: &str) -> Option<ProtocolId> {
        self.protocol_ids.get(s).copied()
    }

    pub fn protocol_name(&self, id: ProtocolId) -> &str {
        &self.protocols[id.0 as usize]
    }

    /// Interns a symbol. Equal content always returns the same handle.
    pub(crate) fn intern_symbol(&mut self, data: SymbolData) -> Symbol {
        if let Some(&symbol) = self.symbol_ids.get(&data) {
            return symbol;
        }
        let symbol = Symbol::from_raw(self.symbols.len() as u32);
        self.symbols.push(data.clone());
        self.symbol_ids.insert(data, symbol);
        symbol
    }

    pub(crate) fn symbol_data(&self, symbol: Symbol) -> &SymbolData {
        &self.symbols[symbol.raw() as usize]
    }

    /// Interns a term. The term must be non-empty.
    pub(crate) fn intern_term(&mut self, symbols: &[Symbol]) -> Term {
        assert!(!symbols.is_empty(), "term must have at least one symbol");

        if let Some(&term) = self.term_ids.get(symbols) {
            return term;
        }
        let term = Term::from_raw(self.terms.len() as u32);
        self.terms.push(symbols.to_vec());
        self.term_ids.insert(symbols.to_vec(), term);
        term
    }

    pub(crate) fn term_symbols(&self, term: Term) -> &[Symbol] {
        &self.terms[term.raw() as usize]
    }

    /// Copies an interned term back into a working term.
    pub fn mutable_term(&self, term: Term) -> MutableTerm {
        MutableTerm::from_symbols(self.term_symbols(term).to_vec())
    }
}
