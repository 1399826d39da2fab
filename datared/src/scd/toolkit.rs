use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wscore::catalog::workspace::WorkspaceCatalog;

use crate::scd::strategy::{EllipsoidIntegration, FitPeaksIntegration, PeaksMdIntegration};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct ToolkitError {
    pub operation: String,
    pub message: String,
}

impl ToolkitError {
    pub fn new(operation: &str, message: impl Into<String>) -> Self {
        ToolkitError { operation: operation.to_string(), message: message.into() }
    }
}

/// Conversion of an event workspace to a 3D elastic Q (lab units A^-1) MD
/// event workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MdConversion {
    pub lorentz_correction: bool,
    pub min_values: [f64; 3],
    pub max_values: [f64; 3],
    pub split_into: u32,
    pub split_threshold: u32,
    pub max_recursion_depth: u32,
}

impl MdConversion {
    /// Lorentz corrected, finely split box structure for peak finding.
    pub fn for_peak_finding(max_q: f64) -> Self {
        MdConversion {
            lorentz_correction: true,
            min_values: [-max_q; 3],
            max_values: [max_q; 3],
            split_into: 2,
            split_threshold: 50,
            max_recursion_depth: 14,
        }
    }

    /// Raw counts, coarser boxes; enough for integration.
    pub fn for_integration(max_q: f64) -> Self {
        MdConversion {
            lorentz_correction: false,
            min_values: [-max_q; 3],
            max_values: [max_q; 3],
            split_into: 2,
            split_threshold: 500,
            max_recursion_depth: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakSearch {
    pub max_peaks: usize,
    pub peak_distance_threshold: f64,
}

impl PeakSearch {
    pub fn new(max_peaks: usize, max_d: f64) -> Self {
        PeakSearch { max_peaks, peak_distance_threshold: 0.9 * 6.28 / max_d }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakPrediction {
    pub wavelength_min: f64,
    pub wavelength_max: f64,
    pub min_dspacing: f64,
    pub max_dspacing: f64,
    pub reflection_condition: String,
}

/// The host's diffraction toolkit.
///
/// Every operation works on named workspaces living in the toolkit's
/// catalog; producing operations register their output under the given name.
pub trait ScdToolkit {
    fn catalog(&self) -> &dyn WorkspaceCatalog;

    /// Find the event file of `run` when no data directory is configured.
    fn locate_event_file(&self, instrument: &str, run: &str) -> Result<PathBuf, ToolkitError>;

    fn load_event_nexus(
        &self,
        file: &Path,
        tof_min: f64,
        tof_max: f64,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn load_isaw_det_cal(
        &self,
        workspace: &str,
        file_1: Option<&Path>,
        file_2: Option<&Path>,
    ) -> Result<(), ToolkitError>;

    fn load_nexus_monitors(&self, file: &Path, output: &str) -> Result<(), ToolkitError>;

    /// Total counts of one monitor spectrum between two times of flight.
    fn integrate_monitor(
        &self,
        monitors: &str,
        range_lower: f64,
        range_upper: f64,
        workspace_index: usize,
    ) -> Result<f64, ToolkitError>;

    fn convert_to_md(
        &self,
        events: &str,
        conversion: &MdConversion,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn find_peaks_md(
        &self,
        md: &str,
        search: &PeakSearch,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn find_ub_using_fft(
        &self,
        peaks: &str,
        min_d: f64,
        max_d: f64,
        tolerance: f64,
    ) -> Result<(), ToolkitError>;

    /// Returns the number of peaks indexed.
    fn index_peaks(&self, peaks: &str, tolerance: f64) -> Result<usize, ToolkitError>;

    fn save_isaw_ub(&self, peaks: &str, file: &Path) -> Result<(), ToolkitError>;

    fn save_isaw_peaks(&self, peaks: &str, file: &Path, append: bool) -> Result<(), ToolkitError>;

    fn predict_peaks(
        &self,
        peaks: &str,
        prediction: &PeakPrediction,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn number_of_peaks(&self, peaks: &str) -> Result<usize, ToolkitError>;

    fn set_peak_monitor_count(
        &self,
        peaks: &str,
        peak_index: usize,
        monitor_count: f64,
    ) -> Result<(), ToolkitError>;

    fn integrate_peaks_md(
        &self,
        md: &str,
        peaks: &str,
        integration: &PeaksMdIntegration,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn rebin(
        &self,
        events: &str,
        params: [f64; 3],
        preserve_events: bool,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn peak_integration(
        &self,
        peaks: &str,
        events: &str,
        integration: &FitPeaksIntegration,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn integrate_ellipsoids(
        &self,
        events: &str,
        peaks: &str,
        integration: &EllipsoidIntegration,
        output: &str,
    ) -> Result<(), ToolkitError>;

    fn select_cell_of_type(
        &self,
        peaks: &str,
        cell_type: &str,
        centering: &str,
        apply: bool,
        tolerance: f64,
    ) -> Result<(), ToolkitError>;
}
