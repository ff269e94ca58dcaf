//! Line-oriented progress and timing output.

use std::io::Write;
use std::time::Duration;

use crate::config::TimeUnitLabel;
use crate::error::Result;

/// Encryption and decryption wall-clock time of one routine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Time spent in `Encryptor::encrypt`.
    pub encrypt: Duration,
    /// Time spent in `Decryptor::decrypt`.
    pub decrypt: Duration,
}

impl PhaseTimings {
    /// Encryption time in whole microseconds.
    #[inline]
    pub fn encrypt_micros(&self) -> u128 {
        self.encrypt.as_micros()
    }

    /// Decryption time in whole microseconds.
    #[inline]
    pub fn decrypt_micros(&self) -> u128 {
        self.decrypt.as_micros()
    }
}

/// A timed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// `Encryptor::encrypt`
    Encryption,
    /// `Decryptor::decrypt`
    Decryption,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Encryption => "Encryption",
            Phase::Decryption => "Decryption",
        }
    }
}

/// Writes the report lines to any sink (stdout in the binary, a buffer in tests).
pub struct Reporter<W: Write> {
    out: W,
    unit: TimeUnitLabel,
}

impl<W: Write> Reporter<W> {
    /// Reports to `out` with the given unit suffix.
    pub fn new(out: W, unit: TimeUnitLabel) -> Self {
        Self { out, unit }
    }

    /// Printed (and flushed) before key generation starts.
    pub fn key_generation_started(&mut self) -> Result<()> {
        write!(self.out, "Generating secret/public keys: ")?;
        self.out.flush()?;
        Ok(())
    }

    /// Completes the key-generation line.
    pub fn key_generation_done(&mut self) -> Result<()> {
        writeln!(self.out, "Done")?;
        Ok(())
    }

    /// Two lines: `<scheme> <phase> Time: ` and the elapsed microseconds with the unit suffix.
    pub fn phase_time(&mut self, scheme: &str, phase: Phase, elapsed: Duration) -> Result<()> {
        writeln!(self.out, "{scheme} {} Time: ", phase.label())?;
        writeln!(self.out, "{}{}", elapsed.as_micros(), self.unit.suffix())?;
        self.out.flush()?;
        Ok(())
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> PhaseTimings {
        PhaseTimings {
            encrypt: Duration::from_micros(1234),
            decrypt: Duration::from_nanos(456_789),
        }
    }

    #[test]
    fn test_legacy_format() {
        let mut reporter = Reporter::new(Vec::new(), TimeUnitLabel::Legacy);
        reporter.key_generation_started().unwrap();
        reporter.key_generation_done().unwrap();
        let timings = timings();
        reporter.phase_time("BFV", Phase::Encryption, timings.encrypt).unwrap();
        reporter.phase_time("BFV", Phase::Decryption, timings.decrypt).unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            text,
            "Generating secret/public keys: Done\n\
             BFV Encryption Time: \n1234ms\n\
             BFV Decryption Time: \n456ms\n"
        );
    }

    #[test]
    fn test_corrected_unit() {
        let mut reporter = Reporter::new(Vec::new(), TimeUnitLabel::Corrected);
        let timings = PhaseTimings::default();
        reporter.phase_time("CKKS", Phase::Encryption, timings.encrypt).unwrap();
        reporter.phase_time("CKKS", Phase::Decryption, timings.decrypt).unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text, "CKKS Encryption Time: \n0us\nCKKS Decryption Time: \n0us\n");
    }
}
