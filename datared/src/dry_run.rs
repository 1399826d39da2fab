use std::sync::Mutex;

use serde::Serialize;
use wscore::catalog::in_memory::InMemoryCatalog;
use wscore::stitch::error::CombineError;
use wscore::stitch::operation::{PairStitch, Stitch1D};
use wscore::stitch::params::Overlap;

/// One pairwise stitch as it would be executed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StitchStep {
    pub lhs: String,
    pub rhs: String,
    pub output: String,
    pub overlap: Overlap,
    pub scale_rhs_workspace: bool,
    pub scale_factor: f64,
}

/// Pairwise stitch that only registers its output and reports the manual
/// scale factor, or 1.0 when none is given.
pub struct DryRunStitch<'a> {
    catalog: &'a InMemoryCatalog<()>,
    steps: Mutex<Vec<StitchStep>>,
}

impl<'a> DryRunStitch<'a> {
    pub fn new(catalog: &'a InMemoryCatalog<()>) -> Self {
        DryRunStitch { catalog, steps: Mutex::new(Vec::new()) }
    }

    pub fn steps(&self) -> Vec<StitchStep> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

impl Stitch1D for DryRunStitch<'_> {
    fn stitch(&self, request: &PairStitch<'_>) -> Result<f64, CombineError> {
        for name in [request.lhs, request.rhs] {
            if self.catalog.dataset(name).is_none() {
                return Err(CombineError::NotHistogram(name.to_string()));
            }
        }
        let scale_factor = request.scale.manual_factor().unwrap_or(1.0);
        self.catalog.add_dataset(request.output, ());
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(StitchStep {
                lhs: request.lhs.to_string(),
                rhs: request.rhs.to_string(),
                output: request.output.to_string(),
                overlap: request.overlap,
                scale_rhs_workspace: request.scale_rhs_workspace(),
                scale_factor,
            });
        Ok(scale_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wscore::stitch::many::SequentialStitcher;
    use wscore::stitch::params::{RebinParams, ScalePolicy, StitchParameters};

    #[test]
    fn test_dry_run_lists_steps() {
        let catalog = InMemoryCatalog::new();
        for name in ["r1", "r2", "r3"] {
            catalog.add_dataset(name, ());
        }
        let dry_run = DryRunStitch::new(&catalog);
        let params = StitchParameters::new("r1,r2,r3", "iq", vec![-0.02])
            .with_manual_scale_factor(2.0);

        let result = SequentialStitcher::new(&catalog, &dry_run).stitch(&params).unwrap();

        let outputs: Vec<String> = dry_run.steps().into_iter().map(|step| step.output).collect();
        assert_eq!(outputs, vec!["r1r2".to_string(), "iq".to_string()]);
        assert_eq!(result.scale_factor, 2.0);
        assert_eq!(catalog.names(), vec!["iq", "r1", "r2", "r3"]);
    }

    #[test]
    fn test_group_is_not_a_histogram() {
        let catalog = InMemoryCatalog::new();
        catalog.add_dataset("r1", ());
        catalog.add_group("g", &["r1".to_string()]).unwrap();
        let dry_run = DryRunStitch::new(&catalog);
        let policy = ScalePolicy::default();
        let params = RebinParams::default();

        let err = dry_run
            .stitch(&PairStitch {
                lhs: "r1",
                rhs: "g",
                overlap: Overlap::unspecified(),
                params: &params,
                scale: &policy,
                output: "out",
            })
            .unwrap_err();

        assert_eq!(err, CombineError::NotHistogram("g".to_string()));
    }
}
