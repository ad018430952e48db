//! The hash-consed ROBDD builder: node table, restriction and the Apply engine.
//!
//! Follows the teacher's `DDManager` in spirit (a `nodes: HashMap<NodeId, Node>` arena plus a
//! handful of operation caches keyed on operand identities) but drops the `order: Vec<u32>`
//! level-indirection entirely: variable reordering is out of scope here (see SPEC_FULL.md §9),
//! so a node's `VarId` *is* its position in the order.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::core::node::{Bdd, Node, NodeId, VarId};
use crate::error::BuilderError;

/// Hash-consed ROBDD arena plus every memoization table the core operations use.
///
/// A `BddBuilder` is a mutable, single-threaded arena (§5 of the spec): nodes are immutable once
/// created, but constructing a new one requires `&mut self`. Handles ([Bdd]) returned by one
/// builder are meaningless for another; there is no cross-builder sharing.
#[derive(Default)]
pub struct BddBuilder {
    nodes: FxHashMap<NodeId, Node>,
    unique: FxHashMap<(VarId, Bdd, Bdd), NodeId>,
    next_id: u32,

    restrict_cache: FxHashMap<(Bdd, VarId, bool), Bdd>,
    not_cache: FxHashMap<Bdd, Bdd>,
    and_cache: FxHashMap<(Bdd, Bdd), Bdd>,
    nary_and_cache: FxHashMap<Vec<Bdd>, Bdd>,
    or_cache: FxHashMap<Vec<Bdd>, Bdd>,
    xor_cache: FxHashMap<(Bdd, Bdd), Bdd>,
    ite_cache: FxHashMap<(Bdd, Bdd, Bdd), Bdd>,

    pub(crate) pbc_outer_cache: FxHashMap<(Vec<(i64, Bdd)>, i64, i64), Bdd>,
    pub(crate) pbc_inner_cache: FxHashMap<(Vec<(i64, Bdd)>, i64, i64), Bdd>,
}

static EMPTY_SUPPORT: &[u32] = &[];

impl std::fmt::Debug for BddBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BddBuilder [{} nodes, and-cache {}, ite-cache {}]",
            self.nodes.len(),
            self.and_cache.len(),
            self.ite_cache.len()
        )
    }
}

impl BddBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    //------------------------------------------------------------------------//
    // Node table (§4.1)

    fn choice_of(&self, b: Bdd) -> Option<VarId> {
        match b {
            Bdd::Const(_) => None,
            Bdd::Node(id) => Some(self.nodes.get(&id).expect("dangling NodeId").choice),
        }
    }

    fn child_of(&self, b: Bdd, high: bool) -> Bdd {
        match b {
            Bdd::Const(_) => b,
            Bdd::Node(id) => {
                let node = self.nodes.get(&id).expect("dangling NodeId");
                if high {
                    node.high
                } else {
                    node.low
                }
            }
        }
    }

    /// Support set of a BDD, precomputed at node construction time (§3, §4.1).
    pub fn support(&self, b: Bdd) -> &[u32] {
        match b {
            Bdd::Const(_) => EMPTY_SUPPORT,
            Bdd::Node(id) => &self.nodes.get(&id).expect("dangling NodeId").support,
        }
    }

    fn union_support(a: &[u32], b: &[u32], choice: u32) -> Vec<u32> {
        let mut merged: Vec<u32> = Vec::with_capacity(a.len() + b.len() + 1);
        merged.push(choice);
        merged.extend_from_slice(a);
        merged.extend_from_slice(b);
        merged.sort_unstable();
        merged.dedup();
        merged
    }

    /// Simplicity key used to order pseudo-Boolean terms (§4.4) and to fold n-ary `and` in a
    /// deterministic order (§4.3): Boolean constants are simplest, then nodes ordered by
    /// support size, then lexicographically by support, then by identity.
    pub(crate) fn simplicity_key(&self, b: Bdd) -> (u8, usize, Vec<u32>, u32) {
        match b {
            Bdd::Const(v) => (0, 0, Vec::new(), v as u32),
            Bdd::Node(id) => {
                let support = self.support(b).to_vec();
                (1, support.len(), support, id.0)
            }
        }
    }

    /// `make(choice, high, low)`: the sole node-table operation (§4.1).
    ///
    /// Enforces reducedness (`high == low` collapses to the child) and hash-consing
    /// (structurally equal triples share a node). Also performs the "post-reduction" probe: once
    /// children have been restricted along `choice`, the table is consulted again under the
    /// restricted triple so that `make` is idempotent with respect to equivalent but
    /// syntactically distinct constructions.
    pub(crate) fn make(&mut self, choice: VarId, high: Bdd, low: Bdd) -> Bdd {
        if high == low {
            return high;
        }

        if let Some(&id) = self.unique.get(&(choice, high, low)) {
            return Bdd::Node(id);
        }

        // Post-reduction probe: restrict both children along `choice` and look again.
        let rhigh = self.restrict(high, choice, true);
        let rlow = self.restrict(low, choice, false);
        if rhigh == rlow {
            return rhigh;
        }
        if let Some(&id) = self.unique.get(&(choice, rhigh, rlow)) {
            return Bdd::Node(id);
        }

        let support = Self::union_support(
            self.support(rhigh),
            self.support(rlow),
            choice.0,
        );

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let node = Node {
            id,
            choice,
            high: rhigh,
            low: rlow,
            support: Rc::new(support),
        };

        log::trace!("allocating node {:?}: ({:?}, {:?}, {:?})", id, choice, rhigh, rlow);

        self.unique.insert((choice, rhigh, rlow), id);
        self.unique.insert((choice, high, low), id);
        self.nodes.insert(id, node);

        Bdd::Node(id)
    }

    //------------------------------------------------------------------------//
    // Variables

    /// `variable(i)`: the BDD `ite(i, true, false)`.
    pub fn variable(&mut self, i: u32) -> Bdd {
        self.make(VarId(i), Bdd::TRUE, Bdd::FALSE)
    }

    //------------------------------------------------------------------------//
    // Reduction engine (§4.2)

    /// `restrict(n, v, value)`: substitute variable `v` with the constant `value`, returning an
    /// equivalent BDD from which `v` has been eliminated.
    pub fn restrict(&mut self, n: Bdd, v: VarId, value: bool) -> Bdd {
        let node = match n {
            Bdd::Const(_) => return n,
            Bdd::Node(id) => id,
        };

        if !self.support(n).binary_search(&v.0).is_ok() {
            return n;
        }

        if let Some(&cached) = self.restrict_cache.get(&(n, v, value)) {
            log::trace!("restrict cache hit for ({:?}, {:?}, {})", n, v, value);
            return cached;
        }

        let node = self.nodes.get(&node).expect("dangling NodeId").clone();

        let result = if v == node.choice {
            if value {
                node.high
            } else {
                node.low
            }
        } else {
            debug_assert!(v.0 > node.choice.0, "restrict called out of order");
            let high = self.restrict(node.high, v, value);
            let low = self.restrict(node.low, v, value);
            self.make(node.choice, high, low)
        };

        self.restrict_cache.insert((n, v, value), result);
        debug_assert!(!self.support(result).binary_search(&v.0).is_ok());
        result
    }

    //------------------------------------------------------------------------//
    // Apply engine (§4.3)

    /// `not(x)`.
    pub fn not(&mut self, x: Bdd) -> Bdd {
        if let Bdd::Const(v) = x {
            return Bdd::Const(!v);
        }
        if let Some(&cached) = self.not_cache.get(&x) {
            log::trace!("not cache hit for {:?}", x);
            return cached;
        }

        let node = match x {
            Bdd::Node(id) => self.nodes.get(&id).expect("dangling NodeId").clone(),
            Bdd::Const(_) => unreachable!(),
        };
        let high = self.not(node.high);
        let low = self.not(node.low);
        let result = self.make(node.choice, high, low);

        self.not_cache.insert(x, result);
        self.not_cache.insert(result, x);
        result
    }

    /// Binary `and(x, y)`.
    fn and2(&mut self, x: Bdd, y: Bdd) -> Bdd {
        if x.is_const(false) || y.is_const(false) {
            return Bdd::FALSE;
        }
        if x.is_const(true) {
            return y;
        }
        if y.is_const(true) {
            return x;
        }
        if x == y {
            return x;
        }

        let (a, b) = if x.sort_key() <= y.sort_key() {
            (x, y)
        } else {
            (y, x)
        };

        if let Some(&cached) = self.and_cache.get(&(a, b)) {
            log::trace!("and cache hit for ({:?}, {:?})", a, b);
            return cached;
        }

        let achoice = self.choice_of(a).unwrap();
        let bchoice = self.choice_of(b).unwrap();

        let result = if achoice == bchoice {
            let high = self.and2(self.child_of(a, true), self.child_of(b, true));
            let low = self.and2(self.child_of(a, false), self.child_of(b, false));
            self.make(achoice, high, low)
        } else if achoice.0 < bchoice.0 {
            let high = self.and2(self.child_of(a, true), b);
            let low = self.and2(self.child_of(a, false), b);
            self.make(achoice, high, low)
        } else {
            let high = self.and2(a, self.child_of(b, true));
            let low = self.and2(a, self.child_of(b, false));
            self.make(bchoice, high, low)
        };

        self.and_cache.insert((a, b), result);
        self.and_cache.insert((b, a), result);
        result
    }

    /// N-ary `and(xs...)` (§4.3): folds left-to-right over a deterministic, simplicity-sorted
    /// order after dropping unit elements and short-circuiting on an absorbing `false`.
    pub fn and(&mut self, xs: &[Bdd]) -> Bdd {
        if xs.is_empty() {
            return Bdd::TRUE;
        }
        if xs.len() == 1 {
            return xs[0];
        }
        if xs.iter().any(|x| x.is_const(false)) {
            return Bdd::FALSE;
        }

        let mut terms: Vec<Bdd> = xs.iter().copied().filter(|x| !x.is_const(true)).collect();
        if terms.is_empty() {
            return Bdd::TRUE;
        }
        if terms.len() == 1 {
            return terms[0];
        }

        terms.sort_by_key(|b| self.simplicity_key(*b));

        let mut sorted_ids: Vec<Bdd> = terms.clone();
        sorted_ids.sort_by_key(|b| b.sort_key());
        if let Some(&cached) = self.nary_and_cache.get(&sorted_ids) {
            log::trace!("n-ary and cache hit for {} terms", sorted_ids.len());
            return cached;
        }

        let mut result = Bdd::TRUE;
        for t in &terms {
            result = self.and2(result, *t);
            if result.is_const(false) {
                break;
            }
        }

        self.nary_and_cache.insert(sorted_ids, result);
        result
    }

    /// `or(xs...) = not(and(map(not, xs)))`.
    pub fn or(&mut self, xs: &[Bdd]) -> Bdd {
        let mut key: Vec<Bdd> = xs.to_vec();
        key.sort_by_key(|b| b.sort_key());
        if let Some(&cached) = self.or_cache.get(&key) {
            log::trace!("or cache hit for {} terms", key.len());
            return cached;
        }

        let negated: Vec<Bdd> = xs.iter().map(|x| self.not(*x)).collect();
        let anded = self.and(&negated);
        let result = self.not(anded);

        self.or_cache.insert(key, result);
        result
    }

    /// `xor(x, y) = or(and(not x, y), and(x, not y))`.
    pub fn xor(&mut self, x: Bdd, y: Bdd) -> Bdd {
        let key = if x.sort_key() <= y.sort_key() { (x, y) } else { (y, x) };
        if let Some(&cached) = self.xor_cache.get(&key) {
            log::trace!("xor cache hit for {:?}", key);
            return cached;
        }

        let nx = self.not(x);
        let ny = self.not(y);
        let left = self.and(&[nx, y]);
        let right = self.and(&[x, ny]);
        let result = self.or(&[left, right]);

        self.xor_cache.insert(key, result);
        self.xor_cache.insert((key.1, key.0), result);
        result
    }

    /// `ite(c, t, e) = or(and(c, t), and(not c, e))`.
    pub fn ite(&mut self, c: Bdd, t: Bdd, e: Bdd) -> Bdd {
        if let Some(&cached) = self.ite_cache.get(&(c, t, e)) {
            log::trace!("ite cache hit for ({:?}, {:?}, {:?})", c, t, e);
            return cached;
        }

        let nc = self.not(c);
        let left = self.and(&[c, t]);
        let right = self.and(&[nc, e]);
        let result = self.or(&[left, right]);

        self.ite_cache.insert((c, t, e), result);
        result
    }

    /// Decomposes a node handle into `(choice, high, low)`. Returns `None` for constants. Used
    /// by the CNF mapper, which needs read access to node structure without owning the builder.
    pub fn node_parts(&self, b: Bdd) -> Option<(VarId, Bdd, Bdd)> {
        match b {
            Bdd::Const(_) => None,
            Bdd::Node(id) => {
                let node = self.nodes.get(&id).expect("dangling NodeId");
                Some((node.choice, node.high, node.low))
            }
        }
    }

    /// Validates that a handle was produced by *this* builder, for callers that accept BDDs
    /// from elsewhere (§7, "builder mismatch").
    pub fn check_owned(&self, b: Bdd) -> Result<(), BuilderError> {
        match b {
            Bdd::Const(_) => Ok(()),
            Bdd::Node(id) => {
                if self.nodes.contains_key(&id) {
                    Ok(())
                } else {
                    Err(BuilderError::ForeignHandle(id.0))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_is_deterministic_and_associative() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let y = b.variable(1);
        let z = b.variable(2);

        let left = b.and(&[b.and(&[x, y]), z]);
        let right = b.and(&[x, b.and(&[y, z])]);
        let nary = b.and(&[x, y, z]);

        assert_eq!(left, right);
        assert_eq!(left, nary);
        assert_eq!(b.and(&[x, y]), b.and(&[y, x]));
    }

    #[test]
    fn not_is_an_involution() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let y = b.variable(1);
        let conj = b.and(&[x, y]);

        assert_eq!(b.not(b.not(conj)), conj);
        assert_eq!(b.not(b.not(x)), x);
    }

    #[test]
    fn restrict_eliminates_the_variable_from_support() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);

        assert_eq!(b.restrict(x, VarId(0), true), Bdd::TRUE);
        assert_eq!(b.restrict(x, VarId(0), false), Bdd::FALSE);
    }

    #[test]
    fn restrict_on_a_conjunction_drops_the_other_conjunct() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let y = b.variable(1);
        let xy = b.and(&[x, y]);

        assert_eq!(b.restrict(xy, VarId(0), true), y);
        assert_eq!(b.restrict(xy, VarId(1), true), x);
        assert_ne!(xy, x);
        assert_ne!(xy, y);
    }

    #[test]
    fn restrict_removes_variable_from_remaining_support() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let y = b.variable(1);
        let z = b.variable(2);
        let conj = b.and(&[x, y, z]);

        let restricted = b.restrict(conj, VarId(1), true);
        assert!(!b.support(restricted).contains(&1));
    }

    #[test]
    fn internal_nodes_never_have_equal_children() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let y = b.variable(1);
        let ite = b.ite(x, y, y);

        // ite(x, y, y) should collapse to y rather than allocate a degenerate node.
        assert_eq!(ite, y);
    }

    #[test]
    fn descendants_have_strictly_greater_choice_than_their_parent() {
        let mut b = BddBuilder::new();
        let x0 = b.variable(0);
        let x2 = b.variable(2);
        let conj = b.and(&[x0, x2]);

        if let Bdd::Node(_) = conj {
            let (choice, high, low) = b.node_parts(conj).unwrap();
            for child in [high, low] {
                if let Some((child_choice, _, _)) = b.node_parts(child) {
                    assert!(child_choice.0 > choice.0);
                }
            }
        }
    }

    #[test]
    fn check_owned_rejects_a_handle_from_another_builder() {
        let mut a = BddBuilder::new();
        let b = BddBuilder::new();
        let x = a.variable(0);

        assert!(b.check_owned(x).is_err());
        assert!(a.check_owned(x).is_ok());
    }
}
