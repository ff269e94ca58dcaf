//! Times one encryption and one decryption per scheme (BFV, CKKS, BGV) and writes the
//! plaintext/ciphertext artifacts to the working directory.

use he_bench::{run_all, HarnessConfig, Reporter};
use rand::thread_rng;
use std::error::Error;
use std::io;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    // diagnostics only; the report itself goes to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .compact()
        .with_file(false)
        .with_line_number(false)
        .without_time()
        .init();

    let config = HarnessConfig::default();
    let mut rng = thread_rng();
    let mut reporter = Reporter::new(io::stdout().lock(), config.time_unit);

    let runs = run_all(&config, &mut rng, &mut reporter)?;
    tracing::info!(schemes = runs.len(), "benchmark complete");
    Ok(())
}
