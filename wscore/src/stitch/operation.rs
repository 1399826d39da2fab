use crate::stitch::error::CombineError;
use crate::stitch::params::{Overlap, RebinParams, ScalePolicy};

/// One call of the pairwise stitch: combine `lhs` and `rhs` into `output`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairStitch<'a> {
    pub lhs: &'a str,
    pub rhs: &'a str,
    pub overlap: Overlap,
    pub params: &'a RebinParams,
    pub scale: &'a ScalePolicy,
    pub output: &'a str,
}

impl PairStitch<'_> {
    pub fn scale_rhs_workspace(&self) -> bool {
        self.scale.direction.scale_rhs_workspace()
    }
}

/// The host's pairwise stitch.
///
/// An implementation registers `output` in the catalog on success and
/// returns the scale factor it actually applied.
pub trait Stitch1D: Send + Sync {
    fn stitch(&self, request: &PairStitch<'_>) -> Result<f64, CombineError>;
}
