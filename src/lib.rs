//! he-bench: encryption/decryption timing for BFV, CKKS and BGV over a small RLWE backend

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, missing_docs)]

pub mod error;
pub mod modulus;
pub mod ntt;
pub mod polynomial;
pub mod params;
pub mod context;
pub mod keys;
pub mod encoder;
pub mod cipher;
pub mod scheme;

pub mod config;
pub mod descriptor;
pub mod report;
pub mod pipeline;

pub use cipher::{Ciphertext, Plaintext};
pub use config::{FailureMode, HarnessConfig, TimeUnitLabel};
pub use context::Context;
pub use descriptor::{Bfv, Bgv, Ckks, SchemeDescriptor};
pub use encoder::{BatchEncoder, CkksEncoder};
pub use error::{Error, Result};
pub use keys::{KeyGenerator, PublicKey, SecretKey};
pub use modulus::{CoeffModulus, Modulus, PlainModulus};
pub use params::{EncryptionParameters, SchemeType, SecurityLevel};
pub use pipeline::{run_all, run_scheme, write_artifacts, ArtifactPaths, BenchmarkRun};
pub use report::{Phase, PhaseTimings, Reporter};
pub use scheme::{Decryptor, Encryptor};
