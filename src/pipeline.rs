//! The benchmark routine, written once and instantiated per scheme.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{CryptoRng, Rng, SeedableRng};
use tracing::{debug, error, info, info_span};

use crate::cipher::{Ciphertext, Plaintext};
use crate::config::{FailureMode, HarnessConfig};
use crate::context::Context;
use crate::descriptor::{Bfv, Bgv, Ckks, SchemeDescriptor};
use crate::error::{Error, Result};
use crate::keys::KeyGenerator;
use crate::report::{Phase, PhaseTimings, Reporter};
use crate::scheme::{Decryptor, Encryptor};

/// Files written by one routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Encoded sample data.
    pub plaintext: PathBuf,
    /// Encryption of the plaintext.
    pub ciphertext: PathBuf,
}

impl ArtifactPaths {
    /// `<dir>/<prefix>_pt` and `<dir>/<prefix>_ct`.
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            plaintext: dir.join(format!("{prefix}_pt")),
            ciphertext: dir.join(format!("{prefix}_ct")),
        }
    }
}

/// Outcome of one successful routine.
#[derive(Clone, Debug)]
pub struct BenchmarkRun {
    /// Report name of the scheme.
    pub scheme: &'static str,
    /// Measured encrypt/decrypt times.
    pub timings: PhaseTimings,
    /// Samples generated.
    pub sample_count: usize,
    /// Slots offered by the encoder.
    pub slot_count: usize,
    /// Files written.
    pub artifacts: ArtifactPaths,
}

fn save_to(path: &Path, save: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    save(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Writes `<prefix>_pt` then `<prefix>_ct` into `dir`, truncating existing files.
pub fn write_artifacts(
    dir: &Path,
    prefix: &str,
    plain: &Plaintext,
    cipher: &Ciphertext,
) -> Result<ArtifactPaths> {
    let paths = ArtifactPaths::new(dir, prefix);
    save_to(&paths.plaintext, |w| plain.save(w))?;
    save_to(&paths.ciphertext, |w| cipher.save(w))?;
    debug!(
        plaintext = %paths.plaintext.display(),
        ciphertext = %paths.ciphertext.display(),
        "wrote artifacts"
    );
    Ok(paths)
}

/// Parameters, keys, encode, timed encrypt, timed decrypt, artifacts.
pub fn run_scheme<S, R, W>(
    config: &HarnessConfig,
    rng: &mut R,
    reporter: &mut Reporter<W>,
) -> Result<BenchmarkRun>
where
    S: SchemeDescriptor,
    R: Rng + CryptoRng,
    W: Write,
{
    let _span = info_span!("scheme", name = S::NAME).entered();

    let context = Context::new(S::build_parameters(config)?)?;

    reporter.key_generation_started()?;
    let keygen = KeyGenerator::new(&context, rng);
    reporter.key_generation_done()?;
    let public_key = keygen.create_public_key(rng)?;

    let encryptor = Encryptor::new(&context, &public_key)?;
    let decryptor = Decryptor::new(&context, keygen.secret_key())?;
    let encoder = S::encoder(&context)?;

    let slot_count = S::slot_count(&encoder);
    // sample data is not secret; it comes from a fast non-cryptographic generator
    let mut sample_rng = SmallRng::seed_from_u64(rng.gen());
    let samples = S::generate_samples(&context, &encoder, &mut sample_rng)?;
    let plain = S::encode(&context, &encoder, &samples)?;
    debug!(samples = samples.len(), slot_count, "encoded samples");

    let mut timings = PhaseTimings::default();

    let start = Instant::now();
    let cipher = encryptor.encrypt(&plain, rng)?;
    timings.encrypt += start.elapsed();
    reporter.phase_time(S::NAME, Phase::Encryption, timings.encrypt)?;

    let start = Instant::now();
    let _decrypted = decryptor.decrypt(&cipher)?;
    timings.decrypt += start.elapsed();
    reporter.phase_time(S::NAME, Phase::Decryption, timings.decrypt)?;

    let artifacts = write_artifacts(&config.output_dir, S::FILE_PREFIX, &plain, &cipher)?;
    info!(
        encrypt_us = timings.encrypt_micros(),
        decrypt_us = timings.decrypt_micros(),
        "routine finished"
    );

    Ok(BenchmarkRun {
        scheme: S::NAME,
        timings,
        sample_count: samples.len(),
        slot_count,
        artifacts,
    })
}

/// Runs BFV, CKKS and BGV in that order.
///
/// Under [`FailureMode::FailFast`] the first error is returned as is. Under
/// [`FailureMode::ReportAndContinue`] failed routines are logged and skipped, and the run ends
/// with [`Error::IncompleteRun`] if any of them failed.
pub fn run_all<R, W>(
    config: &HarnessConfig,
    rng: &mut R,
    reporter: &mut Reporter<W>,
) -> Result<Vec<BenchmarkRun>>
where
    R: Rng + CryptoRng,
    W: Write,
{
    type Routine<G, O> = fn(&HarnessConfig, &mut G, &mut Reporter<O>) -> Result<BenchmarkRun>;
    let routines: [(&str, Routine<R, W>); 3] = [
        (Bfv::NAME, run_scheme::<Bfv, R, W>),
        (Ckks::NAME, run_scheme::<Ckks, R, W>),
        (Bgv::NAME, run_scheme::<Bgv, R, W>),
    ];

    let total = routines.len();
    let mut runs = Vec::with_capacity(total);
    let mut failed = Vec::new();
    for (name, routine) in routines {
        match routine(config, rng, reporter) {
            Ok(run) => runs.push(run),
            Err(err) if config.failure_mode == FailureMode::ReportAndContinue => {
                error!(scheme = name, %err, "routine failed, continuing with the next scheme");
                failed.push(name);
            }
            Err(err) => return Err(err),
        }
    }

    if failed.is_empty() {
        Ok(runs)
    } else {
        Err(Error::IncompleteRun {
            failed: failed.len(),
            total,
            schemes: failed.join(", "),
        })
    }
}
