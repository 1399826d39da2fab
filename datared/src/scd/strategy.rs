use serde::{Deserialize, Serialize};

use crate::config::reduction::ReductionConfig;

/// Extra settings turning sphere integration into cylinder integration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CylinderProfile {
    pub length: f64,
    pub percent_background: f64,
    pub integration_option: String,
    pub profile_function: String,
}

/// Integration of peaks in an MD event workspace, in the sample frame Q
/// coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeaksMdIntegration {
    pub peak_radius: f64,
    pub background_inner_radius: f64,
    pub background_outer_radius: f64,
    pub integrate_if_on_edge: bool,
    pub cylinder: Option<CylinderProfile>,
}

/// Profile fitting of each peak in time of flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitPeaksIntegration {
    pub rebin_params: [f64; 3],
    pub preserve_events: bool,
    pub ikeda_carpenter_tof: bool,
    pub matching_run_no: bool,
    pub n_bad_edge_pixels: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipsoidIntegration {
    pub region_radius: f64,
    pub specify_size: bool,
    pub peak_size: f64,
    pub background_inner_size: f64,
    pub background_outer_size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum IntegrationStrategy {
    Sphere(PeaksMdIntegration),
    Cylinder(PeaksMdIntegration),
    FitPeaks(FitPeaksIntegration),
    Ellipsoid(EllipsoidIntegration),
}

impl IntegrationStrategy {
    /// Pick the integration method from the configuration switches.
    ///
    /// Switches are checked in the order sphere, cylinder, fit peaks,
    /// ellipsoid; the first one set wins. `None` if all are off.
    pub fn select(config: &ReductionConfig) -> Option<Self> {
        let peaks_md = |cylinder: Option<CylinderProfile>| PeaksMdIntegration {
            peak_radius: config.peak_radius,
            background_inner_radius: config.bkg_inner_radius,
            background_outer_radius: config.bkg_outer_radius,
            integrate_if_on_edge: config.integrate_if_edge_peak,
            cylinder,
        };

        if config.use_sphere_integration {
            Some(IntegrationStrategy::Sphere(peaks_md(None)))
        } else if config.use_cylinder_integration {
            Some(IntegrationStrategy::Cylinder(peaks_md(Some(CylinderProfile {
                length: config.cylinder_length,
                percent_background: config.cylinder_percent_bkg,
                integration_option: config.cylinder_int_option.clone(),
                profile_function: config.cylinder_profile_fit.clone(),
            }))))
        } else if config.use_fit_peaks_integration {
            Some(IntegrationStrategy::FitPeaks(FitPeaksIntegration {
                rebin_params: config.rebin_params(),
                preserve_events: config.preserve_events,
                ikeda_carpenter_tof: config.use_ikeda_carpenter,
                matching_run_no: true,
                n_bad_edge_pixels: config.n_bad_edge_pixels,
            }))
        } else if config.use_ellipse_integration {
            Some(IntegrationStrategy::Ellipsoid(EllipsoidIntegration {
                region_radius: config.ellipse_region_radius,
                specify_size: config.ellipse_size_specified,
                peak_size: config.peak_radius,
                background_inner_size: config.bkg_inner_radius,
                background_outer_size: config.bkg_outer_radius,
            }))
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntegrationStrategy::Sphere(_) => "sphere",
            IntegrationStrategy::Cylinder(_) => "cylinder",
            IntegrationStrategy::FitPeaks(_) => "fit-peaks",
            IntegrationStrategy::Ellipsoid(_) => "ellipsoid",
        }
    }
}
