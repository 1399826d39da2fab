use serde::{Deserialize, Deserializer, Serialize};

use crate::stitch::error::StitchError;

/// Overlap region between two adjacent workspaces, in x-axis units.
///
/// A missing bound lets the pairwise stitch work it out on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl Overlap {
    pub fn new(start: f64, end: f64) -> Self {
        Overlap { start: Some(start), end: Some(end) }
    }

    pub fn unspecified() -> Self {
        Overlap::default()
    }
}

/// Rebinning parameters, forwarded verbatim. See Rebin for the format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RebinParams(pub Vec<f64>);

impl RebinParams {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for RebinParams {
    fn from(values: Vec<f64>) -> Self {
        RebinParams(values)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleDirection {
    /// Walk left to right, scaling each right-hand workspace
    Forward,
    /// Walk right to left, scaling each left-hand workspace
    Backward,
}

impl ScaleDirection {
    pub fn from_scale_rhs(scale_rhs_workspace: bool) -> Self {
        if scale_rhs_workspace {
            ScaleDirection::Forward
        } else {
            ScaleDirection::Backward
        }
    }

    pub fn scale_rhs_workspace(&self) -> bool {
        matches!(self, ScaleDirection::Forward)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalePolicy {
    pub direction: ScaleDirection,
    pub use_manual_scale_factor: bool,
    pub manual_scale_factor: f64,
}

impl ScalePolicy {
    pub fn manual_factor(&self) -> Option<f64> {
        self.use_manual_scale_factor.then_some(self.manual_scale_factor)
    }
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy {
            direction: ScaleDirection::Forward,
            use_manual_scale_factor: false,
            manual_scale_factor: 1.0,
        }
    }
}

/// Everything a multi-workspace stitch is invoked with.
///
/// Field names follow the algorithm properties when (de)serialized, so a
/// JSON property set can be loaded directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StitchParameters {
    #[serde(deserialize_with = "split_names", serialize_with = "join_names")]
    pub input_workspaces: Vec<String>,
    pub output_workspace: String,
    #[serde(default)]
    pub start_overlaps: Option<Vec<f64>>,
    #[serde(default)]
    pub end_overlaps: Option<Vec<f64>>,
    pub params: RebinParams,
    #[serde(rename = "ScaleRHSWorkspace", default = "default_true")]
    pub scale_rhs_workspace: bool,
    #[serde(default)]
    pub use_manual_scale_factor: bool,
    #[serde(default = "default_manual_scale_factor")]
    pub manual_scale_factor: f64,
}

fn default_true() -> bool {
    true
}

fn default_manual_scale_factor() -> f64 {
    1.0
}

fn split_names<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(parse_workspace_list(&raw))
}

fn join_names<S: serde::Serializer>(names: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&names.join(","))
}

/// Split a comma separated list of workspace names, trimming each entry.
pub fn parse_workspace_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl StitchParameters {
    pub fn new(input_workspaces: &str, output_workspace: &str, params: Vec<f64>) -> Self {
        StitchParameters {
            input_workspaces: parse_workspace_list(input_workspaces),
            output_workspace: output_workspace.to_string(),
            start_overlaps: None,
            end_overlaps: None,
            params: RebinParams(params),
            scale_rhs_workspace: true,
            use_manual_scale_factor: false,
            manual_scale_factor: 1.0,
        }
    }

    pub fn with_overlaps(mut self, starts: Vec<f64>, ends: Vec<f64>) -> Self {
        self.start_overlaps = Some(starts);
        self.end_overlaps = Some(ends);
        self
    }

    pub fn with_scale_rhs_workspace(mut self, scale_rhs_workspace: bool) -> Self {
        self.scale_rhs_workspace = scale_rhs_workspace;
        self
    }

    pub fn with_manual_scale_factor(mut self, factor: f64) -> Self {
        self.use_manual_scale_factor = true;
        self.manual_scale_factor = factor;
        self
    }

    pub fn scale_policy(&self) -> ScalePolicy {
        ScalePolicy {
            direction: ScaleDirection::from_scale_rhs(self.scale_rhs_workspace),
            use_manual_scale_factor: self.use_manual_scale_factor,
            manual_scale_factor: self.manual_scale_factor,
        }
    }

    /// Check the invocation and pair up start/end overlaps.
    ///
    /// An overlap list left at its default (absent or empty) expands to one
    /// unspecified slot per adjacent pair of inputs.
    pub fn resolve_overlaps(&self) -> Result<Vec<Overlap>, StitchError> {
        let n_workspaces = self.input_workspaces.len();
        let n_pairs = n_workspaces.saturating_sub(1);

        let starts = expand_or_default(&self.start_overlaps, n_pairs);
        let ends = expand_or_default(&self.end_overlaps, n_pairs);

        if n_workspaces < 2 {
            return Err(StitchError::InsufficientInputs(n_workspaces));
        }
        if starts.len() != ends.len() {
            return Err(StitchError::OverlapMismatch { starts: starts.len(), ends: ends.len() });
        }
        if starts.len() != n_pairs {
            return Err(StitchError::OverlapCount { expected: n_pairs, actual: starts.len() });
        }
        if self.params.is_empty() {
            return Err(StitchError::MissingParams);
        }

        let overlaps: Vec<Overlap> = starts
            .into_iter()
            .zip(ends)
            .map(|(start, end)| Overlap { start, end })
            .collect();

        for (pair, overlap) in overlaps.iter().enumerate() {
            if let (Some(start), Some(end)) = (overlap.start, overlap.end) {
                if start > end {
                    return Err(StitchError::InvalidOverlap { pair, start, end });
                }
            }
        }

        Ok(overlaps)
    }
}

fn expand_or_default(values: &Option<Vec<f64>>, n_entries: usize) -> Vec<Option<f64>> {
    match values {
        Some(values) if !values.is_empty() => values.iter().copied().map(Some).collect(),
        _ => vec![None; n_entries],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace_list_trims_names() {
        assert_eq!(
            parse_workspace_list(" a, b ,c,"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_default_overlaps_expand_to_unspecified() {
        let params = StitchParameters::new("a,b,c", "out", vec![0.1]);

        let overlaps = params.resolve_overlaps().unwrap();

        assert_eq!(overlaps, vec![Overlap::unspecified(); 2]);
    }

    #[test]
    fn test_single_input_is_rejected_first() {
        // overlap lengths are also wrong, but the input count is checked first
        let params = StitchParameters::new("a", "out", vec![0.1]).with_overlaps(vec![1.0], vec![]);

        assert!(matches!(params.resolve_overlaps(), Err(StitchError::InsufficientInputs(1))));
    }

    #[test]
    fn test_mismatched_overlap_lengths() {
        let params = StitchParameters::new("a,b,c", "out", vec![0.1])
            .with_overlaps(vec![1.0, 2.0], vec![1.5]);

        assert!(matches!(
            params.resolve_overlaps(),
            Err(StitchError::OverlapMismatch { starts: 2, ends: 1 })
        ));
    }

    #[test]
    fn test_wrong_overlap_count() {
        let params = StitchParameters::new("a,b,c", "out", vec![0.1])
            .with_overlaps(vec![1.0], vec![1.5]);

        assert!(matches!(
            params.resolve_overlaps(),
            Err(StitchError::OverlapCount { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_one_list_given_other_defaulted() {
        let mut params = StitchParameters::new("a,b,c", "out", vec![0.1]);
        params.start_overlaps = Some(vec![0.5, 0.8]);

        let overlaps = params.resolve_overlaps().unwrap();

        assert_eq!(overlaps[0], Overlap { start: Some(0.5), end: None });
        assert_eq!(overlaps[1], Overlap { start: Some(0.8), end: None });
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let params = StitchParameters::new("a,b", "out", vec![0.1])
            .with_overlaps(vec![2.0], vec![1.0]);

        assert!(matches!(
            params.resolve_overlaps(),
            Err(StitchError::InvalidOverlap { pair: 0, .. })
        ));
    }

    #[test]
    fn test_empty_params_rejected() {
        let params = StitchParameters::new("a,b", "out", vec![]);

        assert!(matches!(params.resolve_overlaps(), Err(StitchError::MissingParams)));
    }

    #[test]
    fn test_deserialize_property_set() {
        let json = r#"{
            "InputWorkspaces": "run_1, run_2",
            "OutputWorkspace": "stitched",
            "Params": [0.01, -0.02, 0.3],
            "ScaleRHSWorkspace": false
        }"#;

        let params: StitchParameters = serde_json::from_str(json).unwrap();

        assert_eq!(params.input_workspaces, vec!["run_1".to_string(), "run_2".to_string()]);
        assert_eq!(params.start_overlaps, None);
        assert!(!params.use_manual_scale_factor);
        assert_eq!(params.manual_scale_factor, 1.0);
        assert_eq!(params.scale_policy().direction, ScaleDirection::Backward);
    }

    #[test]
    fn test_manual_factor_only_when_enabled() {
        let policy = ScalePolicy { manual_scale_factor: 3.0, ..ScalePolicy::default() };
        assert_eq!(policy.manual_factor(), None);

        let params = StitchParameters::new("a,b", "out", vec![0.1]).with_manual_scale_factor(3.0);
        assert_eq!(params.scale_policy().manual_factor(), Some(3.0));
    }
}
