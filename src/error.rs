use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    Dimension {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index} out of range for {len} channels")]
    Index { index: usize, len: usize },

    #[error("Sampling time must be positive and finite, got {0}")]
    InvalidSamplingTime(f64),

    #[error("Simulation duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),

    #[error("Sampling time mismatch: controller {controller} s, dynamics {dynamics} s")]
    SamplingMismatch { controller: f64, dynamics: f64 },

    #[error("Non-finite state after integration at t={time:.3} s")]
    NonFiniteState { time: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table value at row={row}, col={col} is not a number: {value:?}")]
    Parse { row: usize, col: usize, value: String },

    #[error("Table shape error at row {row}: expected {expected_rows}x{expected_cols}")]
    TableShape {
        expected_rows: usize,
        expected_cols: usize,
        row: usize,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Fail with [`SimError::Dimension`] unless `actual == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> SimResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(SimError::Dimension { what, expected, actual })
    }
}

pub(crate) fn check_duration(duration: f64) -> SimResult<()> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidDuration(duration))
    }
}

pub(crate) fn check_sampling_time(dt: f64) -> SimResult<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidSamplingTime(dt))
    }
}
