#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("unknown coefficient: {0}")]
    UnknownCoefficient(String),
    #[error("design matrix is rank deficient")]
    RankDeficient,
    #[error("{n} observations are not enough to estimate {k} parameters")]
    InsufficientObservations { n: usize, k: usize },
    #[error("invalid formula: {0}")]
    InvalidFormula(String),
    #[error("invalid alternative hypothesis {0}, expected two-sided, greater or less")]
    InvalidAlternative(String),
    #[error("significance level {0} is not in (0, 1)")]
    InvalidAlpha(f64),
    #[error("t statistic {0} is not finite")]
    InvalidStatistic(f64),
    #[error("invalid plot configuration: {0}")]
    InvalidPlotConfig(String),
    #[error("invalid degrees of freedom {0}")]
    InvalidDegreesOfFreedom(u64),
    #[error("column name {0} not found")]
    ColumnNameNotFound(String),
    #[error("duplicate column name {0}")]
    DuplicateColumnName(String),
    #[error("unequal column lengths")]
    UnequalColumnLengths,
    #[error("dataset {0} not found")]
    DatasetNotFound(String),
    #[error("no file name")]
    NoFileName,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("No file extension")]
    NoFileExtension,
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("incomplete file")]
    IncompleteFile,
    #[error("parse float error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("render error: {0}")]
    Render(String),
}

impl From<std::fmt::Error> for Error {
    #[cfg_attr(coverage_nightly, coverage(off))]
    fn from(err: std::fmt::Error) -> Self {
        Error::Render(err.to_string())
    }
}
