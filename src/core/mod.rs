//! The BDD core: node identities, the hash-consed builder (node table, restriction, Apply), and
//! the pseudo-Boolean constraint compiler.

pub mod builder;
pub mod node;
mod pbc;

pub use builder::BddBuilder;
pub use node::{Bdd, NodeId, VarId};
