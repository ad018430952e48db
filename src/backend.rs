//! SAT backend glue (§4.6).
//!
//! This crate does not embed a SAT solver. It ships the thin client-side half of the contract:
//! write a DIMACS CNF file, spawn an external solver binary on it, and interpret the exit code
//! the way every DIMACS-speaking solver (minisat, cadical, kissat, ...) does: 10 for SAT, 20 for
//! UNSAT, anything else is an error.
//!
//! Grounded in `original_source/minisat.py`, which writes a `.sat` temp file and an empty `.out`
//! temp file, invokes `minisat <sat> <out>`, and distinguishes the three exit codes via
//! `subprocess.CalledProcessError`. We use `tempfile::NamedTempFile` in place of `mkstemp`
//! (`marlls1989-espresso-logic` uses the same crate the same way to hand a temp path to an
//! external tool).

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cnf::Literal;
use crate::error::BuilderError;

/// Configuration for invoking an external SAT solver. TOML-loadable (§6): a deployment picks its
/// solver and flags without a recompile.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Path to (or bare name of, if on `PATH`) the solver executable.
    pub executable: PathBuf,
    /// Extra arguments inserted before the input/output file paths.
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional wall-clock budget for one `solve` call.
    #[serde(default, with = "duration_secs")]
    pub timeout: Option<Duration>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("minisat"),
            args: vec!["-mem-lim=2000".to_string()],
            timeout: None,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

/// Result of handing a CNF instance to the configured backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    /// Satisfiable; the literal assigned true for each SAT variable that appeared in a clause.
    Sat(Vec<Literal>),
    Unsat,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to run SAT backend: {0}")]
    Io(#[from] std::io::Error),

    #[error("SAT backend exited with unexpected status {0:?}")]
    AbnormalExit(Option<i32>),

    #[error("SAT backend produced output that could not be parsed: {0}")]
    MalformedOutput(String),

    #[error("clause list was empty")]
    NoClauses,

    #[error(transparent)]
    InvalidInput(#[from] BuilderError),
}

/// Formats a clause list as a DIMACS CNF document (§6's wire format to the backend).
pub struct DimacsWriter;

impl DimacsWriter {
    /// Renders `p cnf <num_vars> <num_clauses>` followed by one `0`-terminated line per clause.
    ///
    /// Rejects any clause containing a literal `0`, which is not a valid signed literal (§7,
    /// *invalid input*) and would otherwise be written straight into the DIMACS text, confusing
    /// it with the line's own terminator.
    pub fn render(clauses: &[Vec<Literal>], num_vars: u32) -> Result<String, BuilderError> {
        if clauses.iter().any(|clause| clause.iter().any(|&lit| lit == 0)) {
            return Err(BuilderError::ZeroLiteral);
        }

        let mut out = String::new();
        out.push_str(&format!("p cnf {} {}\n", num_vars, clauses.len()));
        for clause in clauses {
            for lit in clause {
                out.push_str(&lit.to_string());
                out.push(' ');
            }
            out.push_str("0\n");
        }
        Ok(out)
    }
}

/// Thin client for an external DIMACS-speaking SAT solver. Single-use like [`CnfMapper`]
/// (§5): construct, call [`solve`](Self::solve) once, discard.
///
/// [`CnfMapper`]: crate::cnf::CnfMapper
pub struct SatBackend {
    config: BackendConfig,
}

impl SatBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Writes `clauses` to a temp DIMACS file, spawns the configured solver on it with a second
    /// temp file as the output target, and maps its exit code to a [`SatOutcome`].
    pub fn solve(&self, clauses: &[Vec<Literal>], num_vars: u32) -> Result<SatOutcome, BackendError> {
        if clauses.is_empty() {
            return Err(BackendError::NoClauses);
        }

        let dimacs = DimacsWriter::render(clauses, num_vars)?;

        let mut input = tempfile::Builder::new().suffix(".cnf").tempfile()?;
        input.write_all(dimacs.as_bytes())?;
        input.flush()?;

        let output = tempfile::Builder::new().suffix(".out").tempfile()?;

        log::debug!(
            "invoking SAT backend {:?} on {} clauses over {} variables",
            self.config.executable,
            clauses.len(),
            num_vars
        );

        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.args)
            .arg(input.path())
            .arg(output.path());

        let status = command.status()?;
        let code = status.code();

        match code {
            Some(20) => {
                log::info!("SAT backend reported UNSAT");
                Ok(SatOutcome::Unsat)
            }
            Some(10) => {
                let text = std::fs::read_to_string(output.path())?;
                parse_minisat_output(&text, num_vars).map(SatOutcome::Sat)
            }
            other => Err(BackendError::AbnormalExit(other)),
        }
    }
}

/// Parses minisat's two-line output format: a `SAT` header line followed by a space-separated,
/// zero-terminated literal list. Mirrors `original_source/minisat.py`'s assertions.
fn parse_minisat_output(text: &str, num_vars: u32) -> Result<Vec<Literal>, BackendError> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| BackendError::MalformedOutput("empty output".to_string()))?;
    if header.trim() != "SAT" {
        return Err(BackendError::MalformedOutput(format!(
            "expected a 'SAT' header line, got {:?}",
            header
        )));
    }

    let model_line = lines
        .next()
        .ok_or_else(|| BackendError::MalformedOutput("missing model line".to_string()))?;
    let mut literals: Vec<Literal> = model_line
        .split_whitespace()
        .map(|tok| {
            tok.parse::<Literal>()
                .map_err(|_| BackendError::MalformedOutput(format!("non-integer token {:?}", tok)))
        })
        .collect::<Result<_, _>>()?;

    match literals.pop() {
        Some(0) => {}
        _ => {
            return Err(BackendError::MalformedOutput(
                "model line did not end in a 0 terminator".to_string(),
            ))
        }
    }

    if literals.iter().any(|&l| l == 0 || l.unsigned_abs() > num_vars) {
        return Err(BackendError::MalformedOutput(
            "model line referenced a variable outside the instance".to_string(),
        ));
    }

    Ok(literals.into_iter().filter(|&l| l > 0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_empty_clause_free_header() {
        let text = DimacsWriter::render(&[], 3).unwrap();
        assert_eq!(text, "p cnf 3 0\n");
    }

    #[test]
    fn renders_one_clause_per_line_zero_terminated() {
        let clauses = vec![vec![1, -2], vec![-1, 2, 3]];
        let text = DimacsWriter::render(&clauses, 3).unwrap();
        assert_eq!(text, "p cnf 3 2\n1 -2 0\n-1 2 3 0\n");
    }

    #[test]
    fn rejects_a_clause_containing_a_zero_literal() {
        let clauses = vec![vec![1, 0, -2]];
        let err = DimacsWriter::render(&clauses, 2).unwrap_err();
        assert_eq!(err, BuilderError::ZeroLiteral);
    }

    #[test]
    fn solve_rejects_a_zero_literal_before_invoking_the_backend() {
        let backend = SatBackend::new(BackendConfig::default());
        let err = backend.solve(&[vec![1, 0]], 1).unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(BuilderError::ZeroLiteral)));
    }

    #[test]
    fn parses_well_formed_sat_output() {
        let text = "SAT\n1 -2 3 0\n";
        let model = parse_minisat_output(text, 3).unwrap();
        assert_eq!(model, vec![1, 3]);
    }

    #[test]
    fn rejects_missing_sat_header() {
        let text = "UNSAT\n";
        assert!(parse_minisat_output(text, 3).is_err());
    }

    #[test]
    fn rejects_model_line_without_terminator() {
        let text = "SAT\n1 -2 3\n";
        assert!(parse_minisat_output(text, 3).is_err());
    }

    #[test]
    fn rejects_out_of_range_variable() {
        let text = "SAT\n1 99 0\n";
        assert!(parse_minisat_output(text, 3).is_err());
    }

    #[test]
    fn default_config_names_minisat() {
        let config = BackendConfig::default();
        assert_eq!(config.executable, PathBuf::from("minisat"));
    }
}
