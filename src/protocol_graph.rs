use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::rewrite_context::{ProtocolId, RewriteContext};

/// Everything the rewrite system needs to know about one protocol:
/// its direct parents and the transitive closure of everything it inherits.
#[derive(Clone, Debug)]
struct ProtocolInfo {
    inherited: Vec<ProtocolId>,

    /// Transitive closure, so if P extends Q and Q extends R, then P's set
    /// contains both Q and R.
    all_inherited: HashSet<ProtocolId>,
}

/// The graph of all protocols transitively referenced by a rewrite system.
///
/// The graph supplies the comparator that resolves the protocol hierarchy's
/// partial order into the total order used on protocol-bearing symbols:
/// an inheriting protocol sorts before its ancestors, unrelated protocols
/// are ordered by inheritance-closure size (more-derived first) and then
/// by name.
#[derive(Clone, Debug)]
pub struct ProtocolGraph {
    info: HashMap<ProtocolId, ProtocolInfo>,
}

impl ProtocolGraph {
    pub fn new() -> ProtocolGraph {
        ProtocolGraph {
            info: HashMap::new(),
        }
    }

    /// Adds a protocol with its directly inherited protocols.
    /// Inherited protocols must be added before their children.
    pub fn add_protocol(&mut self, id: ProtocolId, inherited: &[ProtocolId]) {
        assert!(
            !self.info.contains_key(&id),
            "protocol registered twice in graph"
        );

        let mut all_inherited = HashSet::new();
        for &parent in inherited {
            all_inherited.insert(parent);
            if let Some(parent_info) = self.info.get(&parent) {
                all_inherited.extend(parent_info.all_inherited.iter().copied());
            }
        }

        self.info.insert(
            id,
            ProtocolInfo {
                inherited: inherited.to_vec(),
                all_inherited,
            },
        );
    }

    pub fn contains(&self, id: ProtocolId) -> bool {
        self.info.contains_key(&id)
    }

    /// Returns the directly inherited protocols of `id`.
    pub fn inherited(&self, id: ProtocolId) -> &[ProtocolId] {
        match self.info.get(&id) {
            Some(info) => &info.inherited,
            None => &[],
        }
    }

    /// Returns true if `child` transitively inherits from `parent`.
    /// A protocol does not inherit from itself.
    pub fn inherits_from(&self, child: ProtocolId, parent: ProtocolId) -> bool {
        match self.info.get(&child) {
            Some(info) => info.all_inherited.contains(&parent),
            None => false,
        }
    }

    /// The size of the transitive inheritance closure, used as a stand-in
    /// for topological rank when two protocols are unrelated.
    fn closure_size(&self, id: ProtocolId) -> usize {
        match self.info.get(&id) {
            Some(info) => info.all_inherited.len(),
            None => 0,
        }
    }

    /// Total order on protocols.
    ///
    /// An inheriting protocol sorts before the protocols it inherits from.
    /// Unrelated protocols are ordered by closure size, more-derived first,
    /// then by name.
    pub fn compare_protocols(
        &self,
        lhs: ProtocolId,
        rhs: ProtocolId,
        ctx: &RewriteContext,
    ) -> Ordering {
        if lhs == rhs {
            return Ordering::Equal;
        }
        if self.inherits_from(lhs, rhs) {
            return Ordering::Less;
        }
        if self.inherits_from(rhs, lhs) {
            return Ordering::Greater;
        }

        let result = self.closure_size(rhs).cmp(&self.closure_size(lhs));
        if result != Ordering::Equal {
            return result;
        }

        ctx.protocol_name(lhs).cmp(ctx.protocol_name(rhs))
    }
}
