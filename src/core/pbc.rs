//! Pseudo-Boolean constraint compiler (§4.4): `L ≤ Σ cᵢ·tᵢ ≤ U` compiled into a BDD via
//! coefficient normalization followed by a memoized recursive Shannon expansion.
//!
//! Grounded in `original_source/bddbuilder.py`'s `pseudo_boolean_constraint` /
//! `__pbc_normalized_already`, translated from the dynamically-typed Python (where a "term" is
//! either `True`/`False` or a `GraphNode`) into the builder's `Bdd` enum.

use crate::core::builder::BddBuilder;
use crate::core::node::Bdd;
use crate::error::BuilderError;

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn gcd_all(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, gcd)
}

impl BddBuilder {
    /// `pseudo_boolean_constraint(formula, L, U)` (§4.4).
    pub fn pseudo_boolean_constraint(
        &mut self,
        formula: &[(i64, Bdd)],
        lower_bound: i64,
        upper_bound: i64,
    ) -> Result<Bdd, BuilderError> {
        if lower_bound > upper_bound {
            return Err(BuilderError::InvalidBounds {
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        for &(_, t) in formula {
            self.check_owned(t)?;
        }

        // Step 1: merge duplicate terms.
        let mut merged: rustc_hash::FxHashMap<Bdd, i64> = rustc_hash::FxHashMap::default();
        for &(c, t) in formula {
            *merged.entry(t).or_insert(0) += c;
        }
        let mut cache_key_items: Vec<(i64, Bdd)> = merged.iter().map(|(&t, &c)| (c, t)).collect();
        cache_key_items.sort_by_key(|&(_, t)| t.sort_key());

        let cache_key = (cache_key_items.clone(), lower_bound, upper_bound);
        if let Some(&cached) = self.pbc_outer_cache.get(&cache_key) {
            log::trace!("pbc outer cache hit for {} merged terms", cache_key_items.len());
            return Ok(cached);
        }

        let result = self.pbc_normalize(cache_key_items, lower_bound, upper_bound)?;
        self.pbc_outer_cache.insert(cache_key, result);
        Ok(result)
    }

    fn pbc_normalize(
        &mut self,
        items: Vec<(i64, Bdd)>,
        mut lower_bound: i64,
        mut upper_bound: i64,
    ) -> Result<Bdd, BuilderError> {
        if items.is_empty() {
            return Ok(Bdd::Const(lower_bound <= 0 && 0 <= upper_bound));
        }

        // Steps 2-4: drop constants, sign-normalize, force impossible picks.
        let mut forced = Bdd::TRUE;
        let mut normalized: Vec<(i64, Bdd)> = Vec::new();
        for (c, t) in items {
            if c == 0 {
                continue;
            }
            if let Bdd::Const(v) = t {
                if v {
                    lower_bound -= c;
                    upper_bound -= c;
                }
                continue;
            }

            let (mut coeff, mut term) = (c, t);
            if coeff < 0 {
                coeff = -coeff;
                term = self.not(term);
                lower_bound += coeff;
                upper_bound += coeff;
            }

            if coeff > upper_bound {
                log::info!(
                    "pbc: forcing term false, coefficient {} exceeds upper bound {}",
                    coeff,
                    upper_bound
                );
                let nterm = self.not(term);
                forced = self.and(&[forced, nterm]);
                if forced.is_const(false) {
                    log::info!("pbc: forced accumulator collapsed to false, constraint is unsatisfiable");
                    return Ok(Bdd::FALSE);
                }
            } else {
                normalized.push((coeff, term));
            }
        }

        if normalized.is_empty() {
            let in_range = Bdd::Const(lower_bound <= 0 && 0 <= upper_bound);
            return Ok(self.and(&[in_range, forced]));
        }

        // Step 5: early decisions.
        let total: i64 = normalized.iter().map(|&(c, _)| c).sum();
        if total < lower_bound {
            log::info!(
                "pbc: early decision false, sum of remaining coefficients {} is below lower bound {}",
                total,
                lower_bound
            );
            return Ok(Bdd::FALSE);
        }
        if total <= upper_bound && lower_bound <= 0 {
            log::info!(
                "pbc: early decision, every assignment satisfies bounds [{}, {}]",
                lower_bound,
                upper_bound
            );
            return Ok(forced);
        }

        // Step 6: tighten remaining terms under the forced accumulator.
        if let Bdd::Node(_) = forced {
            let mut tightened = Vec::with_capacity(normalized.len());
            for (coefficient, term) in normalized {
                let restricted = self.and(&[term, forced]);
                if self.simplicity_key(restricted) < self.simplicity_key(term) {
                    match restricted {
                        Bdd::Const(true) => {
                            lower_bound -= coefficient;
                            upper_bound -= coefficient;
                            continue;
                        }
                        Bdd::Const(false) => continue,
                        _ => tightened.push((coefficient, restricted)),
                    }
                } else {
                    tightened.push((coefficient, term));
                }
            }
            normalized = tightened;
        }

        if normalized.is_empty() {
            let in_range = Bdd::Const(lower_bound <= 0 && 0 <= upper_bound);
            return Ok(self.and(&[in_range, forced]));
        }

        for &(c, _) in &normalized {
            debug_assert!(c > 0);
        }

        // Step 7: divide by gcd.
        let divide_by = gcd_all(
            std::iter::once(lower_bound.abs())
                .chain(std::iter::once(upper_bound.abs()))
                .chain(normalized.iter().map(|&(c, _)| c)),
        );
        let divide_by = divide_by.max(1);
        if divide_by > 1 {
            log::info!("pbc: dividing bounds and {} coefficients by gcd {}", normalized.len(), divide_by);
            lower_bound /= divide_by;
            upper_bound /= divide_by;
            for pair in normalized.iter_mut() {
                pair.0 /= divide_by;
            }
        }

        // Step 8: sort heaviest-and-simplest first.
        normalized.sort_by_key(|&(c, t)| (-c, self.simplicity_key(t)));

        let recursed = self.pbc_normalized(normalized, lower_bound, upper_bound);
        Ok(self.and(&[forced, recursed]))
    }

    /// Normalized recursion `pbc_norm` (§4.4): operates on an already sign-normalized,
    /// gcd-reduced, sorted list.
    fn pbc_normalized(&mut self, list: Vec<(i64, Bdd)>, lower_bound: i64, upper_bound: i64) -> Bdd {
        if list.is_empty() {
            return Bdd::Const(lower_bound <= 0 && 0 <= upper_bound);
        }

        let key = (list.clone(), lower_bound, upper_bound);
        if let Some(&cached) = self.pbc_inner_cache.get(&key) {
            log::trace!("pbc inner cache hit for {} remaining terms", list.len());
            return cached;
        }

        let (c0, t0) = list[0];
        let rest = list[1..].to_vec();

        let with_true = self.pbc_normalized(rest.clone(), lower_bound - c0, upper_bound - c0);
        let with_false = self.pbc_normalized(rest, lower_bound, upper_bound);
        let result = self.ite(t0, with_true, with_false);

        self.pbc_inner_cache.insert(key, result);
        result
    }
}
