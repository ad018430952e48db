//! Minimal end-to-end demo: build a BDD for a small pseudo-Boolean constraint, Tseitin-encode it
//! to CNF, and hand it to whatever SAT backend is configured (falls back to `minisat` on `PATH`).

use robdd::{solve, BackendConfig, BddBuilder, SatBackend};

fn main() {
    env_logger::init();

    let mut builder = BddBuilder::new();
    let x0 = builder.variable(0);
    let x1 = builder.variable(1);
    let x2 = builder.variable(2);

    // "at least two of {x0, x1, x2}": 1*x0 + 1*x1 + 1*x2 in [2, 3].
    let formula = vec![(1, x0), (1, x1), (1, x2)];
    let root = builder
        .pseudo_boolean_constraint(&formula, 2, 3)
        .expect("bounds are valid here");

    let config = load_backend_config();
    let backend = SatBackend::new(config);

    match solve(&builder, root, &backend) {
        Ok(model) => println!("SAT, true literals: {:?}", model),
        Err(e) => eprintln!("solve failed: {e}"),
    }
}

fn load_backend_config() -> BackendConfig {
    let path = std::env::var("ROBDD_BACKEND_CONFIG").unwrap_or_default();
    if path.is_empty() {
        return BackendConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
            log::warn!("failed to parse {path}: {e}, using default backend config");
            BackendConfig::default()
        }),
        Err(e) => {
            log::warn!("failed to read {path}: {e}, using default backend config");
            BackendConfig::default()
        }
    }
}
