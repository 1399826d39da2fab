//! A toolkit that performs nothing and remembers everything.
//!
//! Each call is recorded in order and its output workspace is registered in
//! an in-memory catalog, so a reduction can be planned (or tested) without
//! the host toolkit. Numbers the pipeline reads back, such as the monitor
//! count and the number of peaks, are canned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use wscore::catalog::in_memory::InMemoryCatalog;
use wscore::catalog::workspace::WorkspaceCatalog;

use crate::scd::strategy::{EllipsoidIntegration, FitPeaksIntegration, PeaksMdIntegration};
use crate::scd::toolkit::{MdConversion, PeakPrediction, PeakSearch, ScdToolkit, ToolkitError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "operation")]
pub enum ToolkitCall {
    LocateEventFile { instrument: String, run: String },
    LoadEventNexus { file: PathBuf, tof_min: f64, tof_max: f64, output: String },
    LoadIsawDetCal { workspace: String, file_1: Option<PathBuf>, file_2: Option<PathBuf> },
    LoadNexusMonitors { file: PathBuf, output: String },
    IntegrateMonitor {
        monitors: String,
        range_lower: f64,
        range_upper: f64,
        workspace_index: usize,
    },
    ConvertToMd { events: String, conversion: MdConversion, output: String },
    FindPeaksMd { md: String, search: PeakSearch, output: String },
    FindUbUsingFft { peaks: String, min_d: f64, max_d: f64, tolerance: f64 },
    IndexPeaks { peaks: String, tolerance: f64 },
    SaveIsawUb { peaks: String, file: PathBuf },
    SaveIsawPeaks { peaks: String, file: PathBuf, append: bool },
    PredictPeaks { peaks: String, prediction: PeakPrediction, output: String },
    NumberOfPeaks { peaks: String },
    SetPeakMonitorCount { peaks: String, peak_index: usize, monitor_count: f64 },
    IntegratePeaksMd { md: String, peaks: String, integration: PeaksMdIntegration, output: String },
    Rebin { events: String, params: [f64; 3], preserve_events: bool, output: String },
    PeakIntegration {
        peaks: String,
        events: String,
        integration: FitPeaksIntegration,
        output: String,
    },
    IntegrateEllipsoids {
        events: String,
        peaks: String,
        integration: EllipsoidIntegration,
        output: String,
    },
    SelectCellOfType {
        peaks: String,
        cell_type: String,
        centering: String,
        apply: bool,
        tolerance: f64,
    },
}

impl ToolkitCall {
    pub fn operation(&self) -> &'static str {
        match self {
            ToolkitCall::LocateEventFile { .. } => "LocateEventFile",
            ToolkitCall::LoadEventNexus { .. } => "LoadEventNexus",
            ToolkitCall::LoadIsawDetCal { .. } => "LoadIsawDetCal",
            ToolkitCall::LoadNexusMonitors { .. } => "LoadNexusMonitors",
            ToolkitCall::IntegrateMonitor { .. } => "IntegrateMonitor",
            ToolkitCall::ConvertToMd { .. } => "ConvertToMd",
            ToolkitCall::FindPeaksMd { .. } => "FindPeaksMd",
            ToolkitCall::FindUbUsingFft { .. } => "FindUbUsingFft",
            ToolkitCall::IndexPeaks { .. } => "IndexPeaks",
            ToolkitCall::SaveIsawUb { .. } => "SaveIsawUb",
            ToolkitCall::SaveIsawPeaks { .. } => "SaveIsawPeaks",
            ToolkitCall::PredictPeaks { .. } => "PredictPeaks",
            ToolkitCall::NumberOfPeaks { .. } => "NumberOfPeaks",
            ToolkitCall::SetPeakMonitorCount { .. } => "SetPeakMonitorCount",
            ToolkitCall::IntegratePeaksMd { .. } => "IntegratePeaksMd",
            ToolkitCall::Rebin { .. } => "Rebin",
            ToolkitCall::PeakIntegration { .. } => "PeakIntegration",
            ToolkitCall::IntegrateEllipsoids { .. } => "IntegrateEllipsoids",
            ToolkitCall::SelectCellOfType { .. } => "SelectCellOfType",
        }
    }
}

pub struct RecordingToolkit {
    catalog: InMemoryCatalog<()>,
    calls: Mutex<Vec<ToolkitCall>>,
    peak_counts: Mutex<HashMap<String, usize>>,
    monitor_count: f64,
    found_peaks: usize,
    predicted_peaks: usize,
    indexed_fraction: f64,
    event_directory: Option<PathBuf>,
    failing_operation: Option<String>,
}

impl Default for RecordingToolkit {
    fn default() -> Self {
        RecordingToolkit {
            catalog: InMemoryCatalog::new(),
            calls: Mutex::new(Vec::new()),
            peak_counts: Mutex::new(HashMap::new()),
            monitor_count: 1.0,
            found_peaks: 0,
            predicted_peaks: 0,
            indexed_fraction: 1.0,
            event_directory: None,
            failing_operation: None,
        }
    }
}

impl RecordingToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor_count(mut self, monitor_count: f64) -> Self {
        self.monitor_count = monitor_count;
        self
    }

    pub fn with_found_peaks(mut self, found_peaks: usize) -> Self {
        self.found_peaks = found_peaks;
        self
    }

    pub fn with_predicted_peaks(mut self, predicted_peaks: usize) -> Self {
        self.predicted_peaks = predicted_peaks;
        self
    }

    /// Fraction of peaks reported as indexed, clamped to [0, 1].
    pub fn with_indexed_fraction(mut self, fraction: f64) -> Self {
        self.indexed_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Directory `locate_event_file` pretends to search.
    pub fn with_event_directory(mut self, directory: &Path) -> Self {
        self.event_directory = Some(directory.to_path_buf());
        self
    }

    /// Make every call of `operation` fail.
    pub fn failing_on(mut self, operation: &str) -> Self {
        self.failing_operation = Some(operation.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolkitCall> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().iter().map(ToolkitCall::operation).collect()
    }

    pub fn workspaces(&self) -> Vec<String> {
        self.catalog.names()
    }

    fn record(&self, call: ToolkitCall) -> Result<(), ToolkitError> {
        let operation = call.operation();
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
        if self.failing_operation.as_deref() == Some(operation) {
            return Err(ToolkitError::new(operation, "failure requested"));
        }
        Ok(())
    }

    fn require(&self, operation: &str, workspace: &str) -> Result<(), ToolkitError> {
        if self.catalog.contains(workspace) {
            Ok(())
        } else {
            Err(ToolkitError::new(operation, format!("workspace '{}' does not exist", workspace)))
        }
    }

    fn peak_count(&self, peaks: &str) -> usize {
        self.peak_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(peaks)
            .copied()
            .unwrap_or(0)
    }

    fn register_peaks(&self, output: &str, count: usize) {
        self.catalog.add_dataset(output, ());
        self.peak_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(output.to_string(), count);
    }
}

impl ScdToolkit for RecordingToolkit {
    fn catalog(&self) -> &dyn WorkspaceCatalog {
        &self.catalog
    }

    fn locate_event_file(&self, instrument: &str, run: &str) -> Result<PathBuf, ToolkitError> {
        self.record(ToolkitCall::LocateEventFile {
            instrument: instrument.to_string(),
            run: run.to_string(),
        })?;
        self.event_directory
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}_event.nxs", instrument, run)))
            .ok_or_else(|| ToolkitError::new("LocateEventFile", "no event file found"))
    }

    fn load_event_nexus(
        &self,
        file: &Path,
        tof_min: f64,
        tof_max: f64,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::LoadEventNexus {
            file: file.to_path_buf(),
            tof_min,
            tof_max,
            output: output.to_string(),
        })?;
        self.catalog.add_dataset(output, ());
        Ok(())
    }

    fn load_isaw_det_cal(
        &self,
        workspace: &str,
        file_1: Option<&Path>,
        file_2: Option<&Path>,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::LoadIsawDetCal {
            workspace: workspace.to_string(),
            file_1: file_1.map(Path::to_path_buf),
            file_2: file_2.map(Path::to_path_buf),
        })?;
        self.require("LoadIsawDetCal", workspace)
    }

    fn load_nexus_monitors(&self, file: &Path, output: &str) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::LoadNexusMonitors {
            file: file.to_path_buf(),
            output: output.to_string(),
        })?;
        self.catalog.add_dataset(output, ());
        Ok(())
    }

    fn integrate_monitor(
        &self,
        monitors: &str,
        range_lower: f64,
        range_upper: f64,
        workspace_index: usize,
    ) -> Result<f64, ToolkitError> {
        self.record(ToolkitCall::IntegrateMonitor {
            monitors: monitors.to_string(),
            range_lower,
            range_upper,
            workspace_index,
        })?;
        self.require("IntegrateMonitor", monitors)?;
        Ok(self.monitor_count)
    }

    fn convert_to_md(
        &self,
        events: &str,
        conversion: &MdConversion,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::ConvertToMd {
            events: events.to_string(),
            conversion: conversion.clone(),
            output: output.to_string(),
        })?;
        self.require("ConvertToMd", events)?;
        self.catalog.add_dataset(output, ());
        Ok(())
    }

    fn find_peaks_md(
        &self,
        md: &str,
        search: &PeakSearch,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::FindPeaksMd {
            md: md.to_string(),
            search: search.clone(),
            output: output.to_string(),
        })?;
        self.require("FindPeaksMd", md)?;
        self.register_peaks(output, self.found_peaks.min(search.max_peaks));
        Ok(())
    }

    fn find_ub_using_fft(
        &self,
        peaks: &str,
        min_d: f64,
        max_d: f64,
        tolerance: f64,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::FindUbUsingFft {
            peaks: peaks.to_string(),
            min_d,
            max_d,
            tolerance,
        })?;
        self.require("FindUbUsingFft", peaks)
    }

    fn index_peaks(&self, peaks: &str, tolerance: f64) -> Result<usize, ToolkitError> {
        self.record(ToolkitCall::IndexPeaks { peaks: peaks.to_string(), tolerance })?;
        self.require("IndexPeaks", peaks)?;
        Ok((self.peak_count(peaks) as f64 * self.indexed_fraction).round() as usize)
    }

    fn save_isaw_ub(&self, peaks: &str, file: &Path) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::SaveIsawUb {
            peaks: peaks.to_string(),
            file: file.to_path_buf(),
        })?;
        self.require("SaveIsawUb", peaks)
    }

    fn save_isaw_peaks(&self, peaks: &str, file: &Path, append: bool) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::SaveIsawPeaks {
            peaks: peaks.to_string(),
            file: file.to_path_buf(),
            append,
        })?;
        self.require("SaveIsawPeaks", peaks)
    }

    fn predict_peaks(
        &self,
        peaks: &str,
        prediction: &PeakPrediction,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::PredictPeaks {
            peaks: peaks.to_string(),
            prediction: prediction.clone(),
            output: output.to_string(),
        })?;
        self.require("PredictPeaks", peaks)?;
        self.register_peaks(output, self.predicted_peaks);
        Ok(())
    }

    fn number_of_peaks(&self, peaks: &str) -> Result<usize, ToolkitError> {
        self.record(ToolkitCall::NumberOfPeaks { peaks: peaks.to_string() })?;
        self.require("NumberOfPeaks", peaks)?;
        Ok(self.peak_count(peaks))
    }

    fn set_peak_monitor_count(
        &self,
        peaks: &str,
        peak_index: usize,
        monitor_count: f64,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::SetPeakMonitorCount {
            peaks: peaks.to_string(),
            peak_index,
            monitor_count,
        })?;
        self.require("SetPeakMonitorCount", peaks)?;
        if peak_index >= self.peak_count(peaks) {
            let message = format!("no peak {} in '{}'", peak_index, peaks);
            return Err(ToolkitError::new("SetPeakMonitorCount", message));
        }
        Ok(())
    }

    fn integrate_peaks_md(
        &self,
        md: &str,
        peaks: &str,
        integration: &PeaksMdIntegration,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::IntegratePeaksMd {
            md: md.to_string(),
            peaks: peaks.to_string(),
            integration: integration.clone(),
            output: output.to_string(),
        })?;
        self.require("IntegratePeaksMd", md)?;
        self.require("IntegratePeaksMd", peaks)?;
        self.register_peaks(output, self.peak_count(peaks));
        Ok(())
    }

    fn rebin(
        &self,
        events: &str,
        params: [f64; 3],
        preserve_events: bool,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::Rebin {
            events: events.to_string(),
            params,
            preserve_events,
            output: output.to_string(),
        })?;
        self.require("Rebin", events)?;
        self.catalog.add_dataset(output, ());
        Ok(())
    }

    fn peak_integration(
        &self,
        peaks: &str,
        events: &str,
        integration: &FitPeaksIntegration,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::PeakIntegration {
            peaks: peaks.to_string(),
            events: events.to_string(),
            integration: integration.clone(),
            output: output.to_string(),
        })?;
        self.require("PeakIntegration", events)?;
        self.require("PeakIntegration", peaks)?;
        self.register_peaks(output, self.peak_count(peaks));
        Ok(())
    }

    fn integrate_ellipsoids(
        &self,
        events: &str,
        peaks: &str,
        integration: &EllipsoidIntegration,
        output: &str,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::IntegrateEllipsoids {
            events: events.to_string(),
            peaks: peaks.to_string(),
            integration: integration.clone(),
            output: output.to_string(),
        })?;
        self.require("IntegrateEllipsoids", events)?;
        self.require("IntegrateEllipsoids", peaks)?;
        self.register_peaks(output, self.peak_count(peaks));
        Ok(())
    }

    fn select_cell_of_type(
        &self,
        peaks: &str,
        cell_type: &str,
        centering: &str,
        apply: bool,
        tolerance: f64,
    ) -> Result<(), ToolkitError> {
        self.record(ToolkitCall::SelectCellOfType {
            peaks: peaks.to_string(),
            cell_type: cell_type.to_string(),
            centering: centering.to_string(),
            apply,
            tolerance,
        })?;
        self.require("SelectCellOfType", peaks)
    }
}
