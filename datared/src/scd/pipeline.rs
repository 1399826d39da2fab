//! Reduce one single crystal diffraction run.
//!
//! Load the events, find and index peaks, integrate either the found or the
//! predicted peaks and write ISAW UB and peaks files for the run, optionally
//! also in a conventional cell.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;
use wscore::catalog::workspace::CatalogError;

use crate::config::reduction::ReductionConfig;
use crate::scd::strategy::IntegrationStrategy;
use crate::scd::toolkit::{MdConversion, PeakPrediction, PeakSearch, ScdToolkit, ToolkitError};

#[derive(Debug, thiserror::Error)]
pub enum ReductionError {
    #[error("no event file found for {instrument} run {run}: {source}")]
    EventFileNotFound {
        instrument: String,
        run: String,
        #[source]
        source: ToolkitError,
    },

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Files written for one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunFiles {
    pub niggli_matrix: PathBuf,
    pub niggli_integrate: PathBuf,
    /// Matrix and integrate file in the conventional cell, if one is configured
    pub conventional: Option<(PathBuf, PathBuf)>,
}

impl RunFiles {
    pub fn new(
        output_directory: &Path,
        run: &str,
        conventional_cell: Option<(&str, &str)>,
    ) -> Self {
        RunFiles {
            niggli_matrix: output_directory.join(format!("{}_Niggli.mat", run)),
            niggli_integrate: output_directory.join(format!("{}_Niggli.integrate", run)),
            conventional: conventional_cell.map(|(cell_type, centering)| {
                let stem = format!("{}_{}_{}", run, cell_type, centering);
                (
                    output_directory.join(format!("{}.mat", stem)),
                    output_directory.join(format!("{}.integrate", stem)),
                )
            }),
        }
    }
}

/// Event file of a run inside a data directory.
pub fn event_file_name(data_directory: &Path, instrument: &str, run: &str) -> PathBuf {
    data_directory.join(format!("{}_{}_event.nxs", instrument, run))
}

// catalog names of the workspaces of one run
struct RunWorkspaces {
    events: String,
    monitors: String,
    md: String,
    peaks: String,
}

impl RunWorkspaces {
    fn new(instrument: &str, run: &str) -> Self {
        let prefix = format!("{}_{}", instrument, run);
        RunWorkspaces {
            events: format!("{}_event", prefix),
            monitors: format!("{}_monitors", prefix),
            md: format!("{}_md", prefix),
            peaks: format!("{}_peaks", prefix),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReductionSummary {
    pub run: String,
    pub event_file: PathBuf,
    pub monitor_count: f64,
    pub peaks_found: usize,
    pub peaks_indexed: usize,
    /// Peaks that went into integration, found or predicted
    pub peaks_integrated: usize,
    pub integration: Option<&'static str>,
    pub files: RunFiles,
    pub elapsed_seconds: f64,
}

pub struct RunReducer<'a, T: ?Sized> {
    config: &'a ReductionConfig,
    toolkit: &'a T,
}

impl<'a, T: ScdToolkit + ?Sized> RunReducer<'a, T> {
    pub fn new(config: &'a ReductionConfig, toolkit: &'a T) -> Self {
        RunReducer { config, toolkit }
    }

    pub fn event_file(&self, run: &str) -> Result<PathBuf, ReductionError> {
        let instrument = &self.config.instrument_name;
        match &self.config.data_directory {
            Some(directory) => Ok(event_file_name(directory, instrument, run)),
            None => self
                .toolkit
                .locate_event_file(instrument, run)
                .map_err(|source| ReductionError::EventFileNotFound {
                    instrument: instrument.clone(),
                    run: run.to_string(),
                    source,
                }),
        }
    }

    pub fn reduce(&self, run: &str) -> Result<ReductionSummary, ReductionError> {
        let start = Instant::now();
        let config = self.config;
        let toolkit = self.toolkit;
        let ws = RunWorkspaces::new(&config.instrument_name, run);
        let files = RunFiles::new(&config.output_directory, run, config.conventional_cell());

        let event_file = self.event_file(run)?;
        info!("processing file {}", event_file.display());

        toolkit.load_event_nexus(&event_file, config.min_tof, config.max_tof, &ws.events)?;

        // TOPAZ has one calibration file, SNAP may have two
        let calibration_1 = config.calibration_file_1.as_deref();
        let calibration_2 = config.calibration_file_2.as_deref();
        if calibration_1.is_some() || calibration_2.is_some() {
            toolkit.load_isaw_det_cal(&ws.events, calibration_1, calibration_2)?;
        }

        toolkit.load_nexus_monitors(&event_file, &ws.monitors)?;
        let monitor_count = toolkit.integrate_monitor(
            &ws.monitors,
            config.min_monitor_tof,
            config.max_monitor_tof,
            config.monitor_index,
        )?;
        info!("{} has calculated monitor count {}", run, monitor_count);

        // peaks are found on a Lorentz corrected MD workspace, dropped right after
        toolkit.convert_to_md(&ws.events, &MdConversion::for_peak_finding(config.max_q), &ws.md)?;
        toolkit.find_peaks_md(
            &ws.md,
            &PeakSearch::new(config.num_peaks_to_find, config.max_d),
            &ws.peaks,
        )?;
        toolkit.catalog().remove(&ws.md)?;
        let peaks_found = toolkit.number_of_peaks(&ws.peaks)?;

        toolkit.find_ub_using_fft(&ws.peaks, config.min_d, config.max_d, config.tolerance)?;
        let peaks_indexed = toolkit.index_peaks(&ws.peaks, config.tolerance)?;
        info!("indexed {} of {} peaks", peaks_indexed, peaks_found);

        // partial results, in case anything later goes wrong
        toolkit.save_isaw_ub(&ws.peaks, &files.niggli_matrix)?;
        toolkit.save_isaw_peaks(&ws.peaks, &files.niggli_integrate, false)?;

        if config.integrate_predicted_peaks {
            info!("predicting peaks to integrate");
            let prediction = PeakPrediction {
                wavelength_min: config.min_pred_wl,
                wavelength_max: config.max_pred_wl,
                min_dspacing: config.min_pred_dspacing,
                max_dspacing: config.max_pred_dspacing,
                reflection_condition: "Primitive".to_string(),
            };
            toolkit.predict_peaks(&ws.peaks, &prediction, &ws.peaks)?;
        } else {
            info!("only integrating found peaks");
        }

        let peaks_integrated = toolkit.number_of_peaks(&ws.peaks)?;
        for peak_index in 0..peaks_integrated {
            toolkit.set_peak_monitor_count(&ws.peaks, peak_index, monitor_count)?;
        }

        let strategy = IntegrationStrategy::select(config);
        match &strategy {
            Some(IntegrationStrategy::Sphere(integration))
            | Some(IntegrationStrategy::Cylinder(integration)) => {
                // raw counts, no need for high resolution
                toolkit.convert_to_md(
                    &ws.events,
                    &MdConversion::for_integration(config.max_q),
                    &ws.md,
                )?;
                toolkit.integrate_peaks_md(&ws.md, &ws.peaks, integration, &ws.peaks)?;
                toolkit.catalog().remove(&ws.md)?;
            }
            Some(IntegrationStrategy::FitPeaks(integration)) => {
                toolkit.rebin(
                    &ws.events,
                    integration.rebin_params,
                    integration.preserve_events,
                    &ws.events,
                )?;
                toolkit.peak_integration(&ws.peaks, &ws.events, integration, &ws.peaks)?;
            }
            Some(IntegrationStrategy::Ellipsoid(integration)) => {
                toolkit.integrate_ellipsoids(&ws.events, &ws.peaks, integration, &ws.peaks)?;
            }
            None => info!("no integration method enabled, saving peaks unintegrated"),
        }

        toolkit.save_isaw_peaks(&ws.peaks, &files.niggli_integrate, false)?;

        if let (Some((cell_type, centering)), Some((matrix, integrate))) =
            (config.conventional_cell(), &files.conventional)
        {
            debug!("switching to {} {} cell", cell_type, centering);
            toolkit.select_cell_of_type(&ws.peaks, cell_type, centering, true, config.tolerance)?;
            toolkit.save_isaw_peaks(&ws.peaks, integrate, false)?;
            toolkit.save_isaw_ub(&ws.peaks, matrix)?;
        }

        let elapsed_seconds = start.elapsed().as_secs_f64();
        info!("reduced run {} in {:.2} sec", run, elapsed_seconds);

        Ok(ReductionSummary {
            run: run.to_string(),
            event_file,
            monitor_count,
            peaks_found,
            peaks_indexed,
            peaks_integrated,
            integration: strategy.as_ref().map(IntegrationStrategy::name),
            files,
            elapsed_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_files() {
        let files = RunFiles::new(Path::new("/out"), "5637", Some(("Orthorhombic", "P")));

        assert_eq!(files.niggli_matrix, PathBuf::from("/out/5637_Niggli.mat"));
        assert_eq!(files.niggli_integrate, PathBuf::from("/out/5637_Niggli.integrate"));
        assert_eq!(
            files.conventional,
            Some((
                PathBuf::from("/out/5637_Orthorhombic_P.mat"),
                PathBuf::from("/out/5637_Orthorhombic_P.integrate")
            ))
        );
        assert_eq!(RunFiles::new(Path::new("/out"), "5637", None).conventional, None);
    }

    #[test]
    fn test_event_file_name() {
        assert_eq!(
            event_file_name(Path::new("/SNS/TOPAZ/IPTS-1/data"), "TOPAZ", "5637"),
            PathBuf::from("/SNS/TOPAZ/IPTS-1/data/TOPAZ_5637_event.nxs")
        );
    }
}
