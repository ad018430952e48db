//! A reduced ordered binary decision diagram (ROBDD) builder, pseudo-Boolean constraint
//! compiler, and CNF/SAT bridge.
//!
//! See [`core::BddBuilder`] for the node table, restriction and Apply engine, plus the
//! pseudo-Boolean constraint compiler; [`cnf::CnfMapper`] for Tseitin encoding into DIMACS CNF;
//! and [`backend::SatBackend`] for handing that CNF to an external solver.

pub mod backend;
pub mod cnf;
pub mod core;
pub mod error;

pub use crate::backend::{BackendConfig, BackendError, SatBackend, SatOutcome};
pub use crate::cnf::{solve, CnfMapper, Literal};
pub use crate::core::{Bdd, BddBuilder, NodeId, VarId};
pub use crate::error::{BuilderError, SolveError};
