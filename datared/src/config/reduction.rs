use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::dictionary::{ConfigError, ParameterDictionary};

/// All parameters needed to reduce one run, with the defaults used when a
/// key is missing from the parameter file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReductionConfig {
    pub instrument_name: String,
    pub calibration_file_1: Option<PathBuf>,
    pub calibration_file_2: Option<PathBuf>,
    /// When unset, event files are located through the toolkit
    pub data_directory: Option<PathBuf>,
    pub output_directory: PathBuf,

    // time-of-flight windows (microseconds)
    pub min_tof: f64,
    pub max_tof: f64,
    pub min_monitor_tof: f64,
    pub max_monitor_tof: f64,
    pub monitor_index: usize,

    // conventional cell to switch to after integration, both or neither
    pub cell_type: Option<String>,
    pub centering: Option<String>,

    // peak finding and indexing
    pub num_peaks_to_find: usize,
    pub min_d: f64,
    pub max_d: f64,
    pub max_q: f64,
    pub tolerance: f64,

    // peak prediction
    pub integrate_predicted_peaks: bool,
    pub min_pred_wl: f64,
    pub max_pred_wl: f64,
    pub min_pred_dspacing: f64,
    pub max_pred_dspacing: f64,

    // integration method switches, first enabled one wins
    pub use_sphere_integration: bool,
    pub use_cylinder_integration: bool,
    pub use_ellipse_integration: bool,
    pub use_fit_peaks_integration: bool,

    pub peak_radius: f64,
    pub bkg_inner_radius: f64,
    pub bkg_outer_radius: f64,
    pub integrate_if_edge_peak: bool,

    pub cylinder_length: f64,
    pub cylinder_percent_bkg: f64,
    pub cylinder_int_option: String,
    pub cylinder_profile_fit: String,

    pub rebin_step: f64,
    pub preserve_events: bool,
    pub use_ikeda_carpenter: bool,
    pub n_bad_edge_pixels: usize,

    pub ellipse_region_radius: f64,
    pub ellipse_size_specified: bool,
}

impl ReductionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let dictionary = ParameterDictionary::load(path)?;
        Self::from_dictionary(&dictionary)
    }

    pub fn from_dictionary(dict: &ParameterDictionary) -> Result<Self, ConfigError> {
        let config = ReductionConfig {
            instrument_name: dict.text_or("instrument_name", "TOPAZ"),
            calibration_file_1: dict.text("calibration_file_1").map(PathBuf::from),
            calibration_file_2: dict.text("calibration_file_2").map(PathBuf::from),
            data_directory: dict.text("data_directory").map(PathBuf::from),
            output_directory: PathBuf::from(dict.required_text("output_directory")?),

            min_tof: dict.f64_or("min_tof", 400.0)?,
            max_tof: dict.f64_or("max_tof", 16666.0)?,
            min_monitor_tof: dict.f64_or("min_monitor_tof", 1000.0)?,
            max_monitor_tof: dict.f64_or("max_monitor_tof", 12500.0)?,
            monitor_index: dict.usize_or("monitor_index", 0)?,

            cell_type: dict.text("cell_type"),
            centering: dict.text("centering"),

            num_peaks_to_find: dict.usize_or("num_peaks_to_find", 500)?,
            min_d: dict.f64_or("min_d", 4.0)?,
            max_d: dict.f64_or("max_d", 8.0)?,
            max_q: dict.f64_or("max_Q", 30.0)?,
            tolerance: dict.f64_or("tolerance", 0.12)?,

            integrate_predicted_peaks: dict.bool_or("integrate_predicted_peaks", false)?,
            min_pred_wl: dict.f64_or("min_pred_wl", 0.25)?,
            max_pred_wl: dict.f64_or("max_pred_wl", 3.5)?,
            min_pred_dspacing: dict.f64_or("min_pred_dspacing", 0.2)?,
            max_pred_dspacing: dict.f64_or("max_pred_dspacing", 2.5)?,

            use_sphere_integration: dict.bool_or("use_sphere_integration", true)?,
            use_cylinder_integration: dict.bool_or("use_cylinder_integration", false)?,
            use_ellipse_integration: dict.bool_or("use_ellipse_integration", false)?,
            use_fit_peaks_integration: dict.bool_or("use_fit_peaks_integration", false)?,

            peak_radius: dict.f64_or("peak_radius", 0.18)?,
            bkg_inner_radius: dict.f64_or("bkg_inner_radius", 0.18)?,
            bkg_outer_radius: dict.f64_or("bkg_outer_radius", 0.23)?,
            integrate_if_edge_peak: dict.bool_or("integrate_if_edge_peak", true)?,

            cylinder_length: dict.f64_or("cylinder_length", 0.0)?,
            cylinder_percent_bkg: dict.f64_or("cylinder_percent_bkg", 0.0)?,
            cylinder_int_option: dict.text_or("cylinder_int_option", "GaussianQuadrature"),
            cylinder_profile_fit: dict.text_or("cylinder_profile_fit", "Gaussian"),

            rebin_step: dict.f64_or("rebin_step", -0.004)?,
            preserve_events: dict.bool_or("preserve_events", true)?,
            use_ikeda_carpenter: dict.bool_or("use_ikeda_carpenter", false)?,
            n_bad_edge_pixels: dict.usize_or("n_bad_edge_pixels", 10)?,

            ellipse_region_radius: dict.f64_or("ellipse_region_radius", 0.45)?,
            ellipse_size_specified: dict.bool_or("ellipse_size_specified", false)?,
        };

        // the peak distance threshold divides by max_d
        if config.max_d <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "max_d".to_string(),
                value: config.max_d.to_string(),
                expected: "a positive number",
            });
        }

        Ok(config)
    }

    /// Rebin parameters `[min_tof, rebin_step, max_tof]`.
    pub fn rebin_params(&self) -> [f64; 3] {
        [self.min_tof, self.rebin_step, self.max_tof]
    }

    /// Conventional cell type and centering, when both are configured.
    pub fn conventional_cell(&self) -> Option<(&str, &str)> {
        match (&self.cell_type, &self.centering) {
            (Some(cell_type), Some(centering)) => Some((cell_type.as_str(), centering.as_str())),
            _ => None,
        }
    }
}
