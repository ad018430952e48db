//! Node identities ([NodeId], [VarId]) and the internal node representation ([Node]).
//!
//! A [Bdd] is the public handle a client holds: either a Boolean constant or a reference to an
//! internal node owned by some [`BddBuilder`](crate::core::builder::BddBuilder). `Bdd` never
//! points outside its owning builder's arena.

use std::rc::Rc;

/// Stable identity of an internal node, assigned monotonically at allocation time.
///
/// Two nodes with the same identity are the same node: identity coincides with structural
/// equality inside a single builder (hash-consing, see [super::builder]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Index of a source variable. Variable order is simply numeric order: a node's descendants all
/// have a strictly greater [VarId] than the node itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A BDD handle: either a Boolean constant or a node living in some builder's arena.
///
/// This is the type clients pass around. Terminal shortcuts throughout the core are pervasive
/// and are written as explicit matches on this enum rather than through a sentinel node, since
/// constants carry no identity to hash-cons against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Bdd {
    Const(bool),
    Node(NodeId),
}

impl Bdd {
    pub const TRUE: Bdd = Bdd::Const(true);
    pub const FALSE: Bdd = Bdd::Const(false);

    pub fn is_const(&self, value: bool) -> bool {
        matches!(self, Bdd::Const(v) if *v == value)
    }

    pub fn as_const(&self) -> Option<bool> {
        match self {
            Bdd::Const(v) => Some(*v),
            Bdd::Node(_) => None,
        }
    }

    /// A total order over handles used to canonicalize commutative cache keys and to fold
    /// n-ary operations deterministically. Constants sort before nodes; nodes sort by identity,
    /// which is allocation order.
    pub(crate) fn sort_key(&self) -> (u8, u32) {
        match self {
            Bdd::Const(false) => (0, 0),
            Bdd::Const(true) => (0, 1),
            Bdd::Node(id) => (1, id.0),
        }
    }
}

/// An internal ROBDD node: `ite(choice, high, low)`.
///
/// `support` is precomputed at construction time (§4.1 of the spec) as the union of the
/// children's supports plus `choice`, stored sorted and deduplicated so it can double as the
/// key for the pseudo-Boolean "simplicity" ordering (§4.4) without recomputing anything.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub choice: VarId,
    pub high: Bdd,
    pub low: Bdd,
    pub support: Rc<Vec<u32>>,
}

impl Node {
    pub(crate) fn key(&self) -> (VarId, Bdd, Bdd) {
        (self.choice, self.high, self.low)
    }
}
