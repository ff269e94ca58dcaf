//! Harness configuration.

use std::path::PathBuf;

/// What to do when one scheme's routine fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop at the first failure.
    #[default]
    FailFast,
    /// Log the failure, run the remaining schemes, then report the run as incomplete.
    ReportAndContinue,
}

/// Suffix printed after each microsecond count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnitLabel {
    /// `ms`, kept for output compatibility even though the value is in microseconds.
    #[default]
    Legacy,
    /// `us`
    Corrected,
}

impl TimeUnitLabel {
    /// The text printed after the number.
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnitLabel::Legacy => "ms",
            TimeUnitLabel::Corrected => "us",
        }
    }
}

/// Everything the harness needs to run. `Default` reproduces the reference run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Ring degree N shared by all three schemes.
    pub poly_modulus_degree: usize,
    /// Plaintext modulus for BFV and BGV.
    pub plain_modulus: u64,
    /// Where the `<prefix>_pt` / `<prefix>_ct` files go.
    pub output_dir: PathBuf,
    /// Whether one failing scheme stops the others.
    pub failure_mode: FailureMode,
    /// Suffix used on the timing lines.
    pub time_unit: TimeUnitLabel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 4096,
            plain_modulus: 786_433,
            output_dir: PathBuf::from("."),
            failure_mode: FailureMode::default(),
            time_unit: TimeUnitLabel::default(),
        }
    }
}

impl HarnessConfig {
    /// Sets the artifact directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the failure mode.
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the time unit label.
    pub fn with_time_unit(mut self, unit: TimeUnitLabel) -> Self {
        self.time_unit = unit;
        self
    }
}
