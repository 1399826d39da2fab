use crate::catalog::workspace::CatalogError;

/// Failure reported by the external pairwise stitch.
///
/// The orchestration never inspects these; they are passed through as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CombineError {
    #[error("overlap region [{start}, {end}] is outside the x range of '{workspace}'")]
    OverlapOutOfRange { workspace: String, start: f64, end: f64 },

    #[error("binning of '{lhs}' and '{rhs}' cannot be reconciled by rebinning")]
    IncompatibleBinning { lhs: String, rhs: String },

    #[error("'{0}' is not a histogram workspace")]
    NotHistogram(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("too few workspaces to stitch: need at least 2, got {0}")]
    InsufficientInputs(usize),

    #[error("StartOverlaps and EndOverlaps are different lengths ({starts} vs {ends})")]
    OverlapMismatch { starts: usize, ends: usize },

    #[error("wrong number of overlaps, should be {expected} not {actual}")]
    OverlapCount { expected: usize, actual: usize },

    #[error("start overlap {start} is greater than end overlap {end} for pair {pair}")]
    InvalidOverlap { pair: usize, start: f64, end: f64 },

    #[error("rebin parameters are mandatory")]
    MissingParams,

    #[error("input workspaces must be all groups or all single workspaces")]
    MixedInputKinds,

    #[error("group '{0}' has no members")]
    EmptyGroup(String),

    #[error("group '{name}' has {actual} members, expected {expected}")]
    GroupSizeMismatch { name: String, expected: usize, actual: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    ExternalCombine(#[from] CombineError),

    #[error("failed to build stitching thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
