use thiserror::Error as ThisError;

/// Error taxonomy of the reduction pipeline.
///
/// `Validation` covers bad configuration and is always raised before any
/// numeric work starts. `PeriodIndex` is raised when a requested period does
/// not exist. `IncompatibleShape` is raised at the point of combination when
/// two spectra or datasets cannot be combined elementwise.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("period index {index} is out of range, the data contains {count} period(s)")]
    PeriodIndex { index: usize, count: usize },
    #[error("{0}")]
    IncompatibleShape(String),
}

pub type Result<T> = std::result::Result<T, Error>;
