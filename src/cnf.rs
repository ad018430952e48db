//! Tseitin encoding of a BDD into CNF (§4.5).
//!
//! Grounded in `original_source/bddbuilder.py`'s `CNFMapper`: one fresh SAT variable per source
//! variable (via [`CnfMapper::remap`]) and one per non-trivial BDD node, with the classic
//! `n ↔ ite(c, h, l)` four-clause gadget per node.

use rustc_hash::FxHashMap;

use crate::backend::{SatBackend, SatOutcome};
use crate::core::{Bdd, BddBuilder, VarId};
use crate::error::SolveError;

/// Signed DIMACS literal: positive for a positive occurrence, negative for a negated one. Never
/// zero.
pub type Literal = i32;

/// Single-use Tseitin encoder tied to one [BddBuilder]. Mirrors the builder's own "single-use,
/// non-reentrant" resource model (§5): a mapper accumulates a counter and a clause list and is
/// discarded after one `solve`.
pub struct CnfMapper<'a> {
    builder: &'a BddBuilder,
    last: Literal,
    clauses: Vec<Vec<Literal>>,
    var_map: FxHashMap<VarId, Literal>,
    node_lit_cache: FxHashMap<Bdd, Literal>,
    true_lit: Option<Literal>,
    false_lit: Option<Literal>,
}

impl<'a> CnfMapper<'a> {
    pub fn new(builder: &'a BddBuilder) -> Self {
        Self {
            builder,
            last: 0,
            clauses: Vec::new(),
            var_map: FxHashMap::default(),
            node_lit_cache: FxHashMap::default(),
            true_lit: None,
            false_lit: None,
        }
    }

    fn fresh(&mut self) -> Literal {
        self.last += 1;
        self.last
    }

    pub fn true_lit(&mut self) -> Literal {
        if let Some(v) = self.true_lit {
            return v;
        }
        let v = self.fresh();
        self.clauses.push(vec![v]);
        self.true_lit = Some(v);
        v
    }

    pub fn false_lit(&mut self) -> Literal {
        if let Some(v) = self.false_lit {
            return v;
        }
        let v = self.fresh();
        self.clauses.push(vec![-v]);
        self.false_lit = Some(v);
        v
    }

    /// Allocate (once) and return the SAT variable standing in for a source variable.
    pub fn remap(&mut self, source_var: VarId) -> Literal {
        if let Some(&v) = self.var_map.get(&source_var) {
            return v;
        }
        let v = self.fresh();
        self.var_map.insert(source_var, v);
        v
    }

    /// Tseitin-encode `term`, returning the literal standing in for it.
    pub fn encode(&mut self, term: Bdd) -> Literal {
        if let Some(&cached) = self.node_lit_cache.get(&term) {
            return cached;
        }

        let lit = match term {
            Bdd::Const(true) => self.true_lit(),
            Bdd::Const(false) => self.false_lit(),
            Bdd::Node(_) => {
                let (choice, high, low) = self
                    .builder
                    .node_parts(term)
                    .expect("Node variant always decomposes");
                let c = self.remap(choice);

                if high.is_const(true) && low.is_const(false) {
                    c
                } else if high.is_const(false) && low.is_const(true) {
                    -c
                } else {
                    let n = self.fresh();
                    let h = self.encode(high);
                    let l = self.encode(low);

                    self.clauses.push(vec![-n, -c, h]);
                    self.clauses.push(vec![-n, c, l]);
                    self.clauses.push(vec![n, -c, -h]);
                    self.clauses.push(vec![n, c, -l]);

                    n
                }
            }
        };

        self.node_lit_cache.insert(term, lit);
        lit
    }

    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    /// Highest SAT variable allocated so far; the variable count a DIMACS header needs.
    pub fn num_vars(&self) -> Literal {
        self.last
    }

    /// Inverts [`remap`](Self::remap): given a SAT variable, the source variable it stands for,
    /// if any (used to project a model back onto source variables).
    pub fn source_var_for(&self, sat_var: Literal) -> Option<VarId> {
        self.var_map
            .iter()
            .find(|&(_, &v)| v == sat_var)
            .map(|(&k, _)| k)
    }
}

/// Drives a single root BDD all the way to a model (§4.5, "To solve: ..."): short-circuits on a
/// root that is literally `⊥`, otherwise Tseitin-encodes it, appends the root literal as a unit
/// clause, and hands the result to `backend`.
///
/// Maps every way §7 says a solve can fail to [SolveError]: the root reducing to `false`, or the
/// SAT backend itself reporting UNSAT, both surface as `SolveError::Unsatisfiable`; any other
/// backend failure (missing binary, abnormal exit, malformed output) surfaces as
/// `SolveError::Backend`.
pub fn solve(builder: &BddBuilder, root: Bdd, backend: &SatBackend) -> Result<Vec<Literal>, SolveError> {
    if root.is_const(false) {
        log::info!("solve: root is the constant false, formula is unsatisfiable");
        return Err(SolveError::Unsatisfiable);
    }

    let mut mapper = CnfMapper::new(builder);
    let root_lit = mapper.encode(root);
    let mut clauses = mapper.clauses().to_vec();
    clauses.push(vec![root_lit]);

    match backend.solve(&clauses, mapper.num_vars() as u32) {
        Ok(SatOutcome::Sat(model)) => Ok(model),
        Ok(SatOutcome::Unsat) => {
            log::info!("solve: SAT backend reported UNSAT");
            Err(SolveError::Unsatisfiable)
        }
        Err(e) => Err(SolveError::Backend(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BddBuilder;

    fn assignment_from_model(model: &[i32]) -> std::collections::HashSet<i32> {
        model.iter().copied().collect()
    }

    /// Brute-force-check that the produced clause set is satisfied exactly by the models that
    /// also satisfy the source BDD (scenario 6 of the spec's concrete tests).
    fn clauses_satisfied(clauses: &[Vec<i32>], model: &std::collections::HashSet<i32>) -> bool {
        clauses.iter().all(|clause| {
            clause.iter().any(|&lit| {
                if lit > 0 {
                    model.contains(&lit)
                } else {
                    !model.contains(&(-lit))
                }
            })
        })
    }

    #[test]
    fn and_of_two_variables_round_trips() {
        let mut b = BddBuilder::new();
        let x0 = b.variable(0);
        let x1 = b.variable(1);
        let conj = b.and(&[x0, x1]);

        let mut mapper = CnfMapper::new(&b);
        let root_lit = mapper.encode(conj);
        let mut clauses = mapper.clauses().to_vec();
        clauses.push(vec![root_lit]);

        let v0 = mapper.remap(crate::core::VarId(0));
        let v1 = mapper.remap(crate::core::VarId(1));

        // Enumerate every assignment over the SAT variables used and check clause satisfaction
        // agrees exactly with x0 && x1.
        for bits in 0..(1 << mapper.num_vars()) {
            let mut model = std::collections::HashSet::new();
            for v in 1..=mapper.num_vars() {
                if bits & (1 << (v - 1)) != 0 {
                    model.insert(v);
                }
            }
            let sat = clauses_satisfied(&clauses, &model);
            let expected = model.contains(&v0) && model.contains(&v1);
            assert_eq!(sat, expected, "model {:?}", model);
        }
    }

    #[test]
    fn constant_true_is_a_unit_clause() {
        let b = BddBuilder::new();
        let mut mapper = CnfMapper::new(&b);
        let lit = mapper.encode(Bdd::TRUE);
        assert_eq!(mapper.clauses(), &[vec![lit]]);
    }

    #[test]
    fn constant_false_is_a_negative_unit_clause() {
        let b = BddBuilder::new();
        let mut mapper = CnfMapper::new(&b);
        let lit = mapper.encode(Bdd::FALSE);
        assert_eq!(mapper.clauses(), &[vec![-lit]]);
    }

    #[test]
    fn single_variable_shortcuts_to_its_own_literal() {
        let mut b = BddBuilder::new();
        let x = b.variable(3);
        let mut mapper = CnfMapper::new(&b);
        let lit = mapper.encode(x);
        assert!(mapper.clauses().is_empty());
        assert_eq!(lit, mapper.remap(crate::core::VarId(3)));
    }

    #[test]
    fn negated_variable_shortcuts_to_negative_literal() {
        let mut b = BddBuilder::new();
        let x = b.variable(2);
        let nx = b.not(x);
        let mut mapper = CnfMapper::new(&b);
        let lit = mapper.encode(nx);
        assert!(mapper.clauses().is_empty());
        assert_eq!(lit, -mapper.remap(crate::core::VarId(2)));
    }

    #[test]
    fn assignment_helper_is_order_independent() {
        let a = assignment_from_model(&[1, 2, 3]);
        let b = assignment_from_model(&[3, 2, 1]);
        assert_eq!(a, b);
    }

    #[test]
    fn solve_on_constant_false_is_unsatisfiable_without_invoking_the_backend() {
        let b = BddBuilder::new();
        // A nonexistent executable would fail loudly if `solve` ever reached it; the constant
        // `false` root must short-circuit before that.
        let backend = SatBackend::new(crate::backend::BackendConfig {
            executable: "definitely-not-a-real-sat-solver-binary".into(),
            args: Vec::new(),
            timeout: None,
        });

        let err = solve(&b, Bdd::FALSE, &backend).unwrap_err();
        assert_eq!(err, SolveError::Unsatisfiable);
    }

    #[test]
    fn solve_surfaces_backend_failure_as_solve_error() {
        let mut b = BddBuilder::new();
        let x = b.variable(0);
        let backend = SatBackend::new(crate::backend::BackendConfig {
            executable: "definitely-not-a-real-sat-solver-binary".into(),
            args: Vec::new(),
            timeout: None,
        });

        let err = solve(&b, x, &backend).unwrap_err();
        assert!(matches!(err, SolveError::Backend(_)));
    }
}
