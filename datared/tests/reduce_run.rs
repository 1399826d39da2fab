use std::io::Write;
use std::path::{Path, PathBuf};

use datared::config::dictionary::ParameterDictionary;
use datared::config::reduction::ReductionConfig;
use datared::scd::pipeline::{ReductionError, RunReducer};
use datared::scd::recorder::{RecordingToolkit, ToolkitCall};
use datared::scd::toolkit::ScdToolkit;

fn config(extra: &str) -> ReductionConfig {
    let text = format!("output_directory /out\ndata_directory /raw\n{}", extra);
    ReductionConfig::from_dictionary(&ParameterDictionary::parse(&text)).unwrap()
}

fn count(operations: &[&str], name: &str) -> usize {
    operations.iter().filter(|op| **op == name).count()
}

#[test]
fn sphere_integration_of_found_peaks() {
    let config = config("");
    let toolkit = RecordingToolkit::new().with_found_peaks(3).with_monitor_count(4.5e6);

    let summary = RunReducer::new(&config, &toolkit).reduce("5637").unwrap();

    assert_eq!(
        toolkit.operations(),
        vec![
            "LoadEventNexus",
            "LoadNexusMonitors",
            "IntegrateMonitor",
            "ConvertToMd",
            "FindPeaksMd",
            "NumberOfPeaks",
            "FindUbUsingFft",
            "IndexPeaks",
            "SaveIsawUb",
            "SaveIsawPeaks",
            "NumberOfPeaks",
            "SetPeakMonitorCount",
            "SetPeakMonitorCount",
            "SetPeakMonitorCount",
            "ConvertToMd",
            "IntegratePeaksMd",
            "SaveIsawPeaks",
        ]
    );
    assert_eq!(summary.event_file, PathBuf::from("/raw/TOPAZ_5637_event.nxs"));
    assert_eq!(summary.monitor_count, 4.5e6);
    assert_eq!(summary.peaks_found, 3);
    assert_eq!(summary.peaks_indexed, 3);
    assert_eq!(summary.peaks_integrated, 3);
    assert_eq!(summary.integration, Some("sphere"));
    assert_eq!(summary.files.niggli_integrate, PathBuf::from("/out/5637_Niggli.integrate"));

    // both MD workspaces are gone, events, monitors and peaks stay
    assert_eq!(
        toolkit.workspaces(),
        vec!["TOPAZ_5637_event", "TOPAZ_5637_monitors", "TOPAZ_5637_peaks"]
    );
}

#[test]
fn md_conversions_use_different_settings() {
    let config = config("max_Q 20\n");
    let toolkit = RecordingToolkit::new().with_found_peaks(1);

    RunReducer::new(&config, &toolkit).reduce("1").unwrap();

    let conversions: Vec<_> = toolkit
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ToolkitCall::ConvertToMd { conversion, .. } => Some(conversion),
            _ => None,
        })
        .collect();
    assert_eq!(conversions.len(), 2);
    assert!(conversions[0].lorentz_correction);
    assert_eq!(conversions[0].max_values, [20.0, 20.0, 20.0]);
    assert!(!conversions[1].lorentz_correction);
    assert_eq!(conversions[1].split_threshold, 500);
}

#[test]
fn predicted_peaks_get_the_monitor_count() {
    let config = config("integrate_predicted_peaks True\n");
    let toolkit = RecordingToolkit::new()
        .with_found_peaks(2)
        .with_predicted_peaks(5)
        .with_monitor_count(7.0);

    let summary = RunReducer::new(&config, &toolkit).reduce("42").unwrap();

    let operations = toolkit.operations();
    assert_eq!(count(&operations, "PredictPeaks"), 1);
    assert_eq!(count(&operations, "SetPeakMonitorCount"), 5);
    assert_eq!(summary.peaks_found, 2);
    assert_eq!(summary.peaks_integrated, 5);
    assert!(toolkit.calls().iter().all(|call| match call {
        ToolkitCall::SetPeakMonitorCount { monitor_count, .. } => *monitor_count == 7.0,
        _ => true,
    }));
}

#[test]
fn fit_peaks_rebins_before_integrating() {
    let config = config("use_sphere_integration False\nuse_fit_peaks_integration True\n");
    let toolkit = RecordingToolkit::new().with_found_peaks(1);

    let summary = RunReducer::new(&config, &toolkit).reduce("42").unwrap();

    let operations = toolkit.operations();
    let tail: Vec<&str> = operations[operations.len() - 3..].to_vec();
    assert_eq!(tail, vec!["Rebin", "PeakIntegration", "SaveIsawPeaks"]);
    assert_eq!(count(&operations, "ConvertToMd"), 1);
    assert_eq!(summary.integration, Some("fit-peaks"));
}

#[test]
fn ellipsoid_integration_works_on_events() {
    let config = config("use_sphere_integration False\nuse_ellipse_integration True\n");
    let toolkit = RecordingToolkit::new().with_found_peaks(1);

    RunReducer::new(&config, &toolkit).reduce("42").unwrap();

    let call = toolkit
        .calls()
        .into_iter()
        .find(|call| call.operation() == "IntegrateEllipsoids")
        .unwrap();
    match call {
        ToolkitCall::IntegrateEllipsoids { events, integration, .. } => {
            assert_eq!(events, "TOPAZ_42_event");
            assert_eq!(integration.peak_size, 0.18);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[test]
fn no_integration_method_still_saves_peaks() {
    let config = config("use_sphere_integration False\n");
    let toolkit = RecordingToolkit::new().with_found_peaks(1);

    let summary = RunReducer::new(&config, &toolkit).reduce("42").unwrap();

    assert_eq!(summary.integration, None);
    assert_eq!(toolkit.operations().last(), Some(&"SaveIsawPeaks"));
}

#[test]
fn conventional_cell_files_are_written_last() {
    let config = config("cell_type Monoclinic\ncentering C\n");
    let toolkit = RecordingToolkit::new().with_found_peaks(1);

    RunReducer::new(&config, &toolkit).reduce("42").unwrap();

    let calls = toolkit.calls();
    let n = calls.len();
    assert_eq!(calls[n - 3].operation(), "SelectCellOfType");
    assert_eq!(
        calls[n - 2],
        ToolkitCall::SaveIsawPeaks {
            peaks: "TOPAZ_42_peaks".to_string(),
            file: PathBuf::from("/out/42_Monoclinic_C.integrate"),
            append: false,
        }
    );
    assert_eq!(
        calls[n - 1],
        ToolkitCall::SaveIsawUb {
            peaks: "TOPAZ_42_peaks".to_string(),
            file: PathBuf::from("/out/42_Monoclinic_C.mat"),
        }
    );
}

#[test]
fn calibration_with_a_single_file() {
    let config = config("instrument_name SNAP\ncalibration_file_2 /cal/snap_2.DetCal\n");
    let toolkit = RecordingToolkit::new();

    RunReducer::new(&config, &toolkit).reduce("7").unwrap();

    assert_eq!(
        toolkit.calls()[1],
        ToolkitCall::LoadIsawDetCal {
            workspace: "SNAP_7_event".to_string(),
            file_1: None,
            file_2: Some(PathBuf::from("/cal/snap_2.DetCal")),
        }
    );
}

#[test]
fn event_file_located_without_data_directory() {
    let dict = ParameterDictionary::parse("output_directory /out\n");
    let config = ReductionConfig::from_dictionary(&dict).unwrap();
    let toolkit = RecordingToolkit::new().with_event_directory(Path::new("/SNS/TOPAZ/shared"));

    let summary = RunReducer::new(&config, &toolkit).reduce("9").unwrap();

    assert_eq!(toolkit.operations()[0], "LocateEventFile");
    assert_eq!(summary.event_file, PathBuf::from("/SNS/TOPAZ/shared/TOPAZ_9_event.nxs"));
}

#[test]
fn missing_event_file_stops_before_loading() {
    let dict = ParameterDictionary::parse("output_directory /out\n");
    let config = ReductionConfig::from_dictionary(&dict).unwrap();
    let toolkit = RecordingToolkit::new();

    let err = RunReducer::new(&config, &toolkit).reduce("9").unwrap_err();

    assert!(matches!(err, ReductionError::EventFileNotFound { ref run, .. } if run == "9"));
    assert_eq!(toolkit.operations(), vec!["LocateEventFile"]);
}

#[test]
fn toolkit_failure_aborts_the_run() {
    let config = config("");
    let toolkit = RecordingToolkit::new().with_found_peaks(4).failing_on("IndexPeaks");

    let err = RunReducer::new(&config, &toolkit).reduce("42").unwrap_err();

    assert!(matches!(err, ReductionError::Toolkit(ref e) if e.operation == "IndexPeaks"));
    assert_eq!(toolkit.operations().last(), Some(&"IndexPeaks"));
    assert!(!toolkit.catalog().contains("TOPAZ_42_md"));
}

#[test]
fn reduce_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ReduceSCD.config");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "# sample configuration").unwrap();
    writeln!(file, "instrument_name TOPAZ").unwrap();
    writeln!(file, "output_directory {}", dir.path().display()).unwrap();
    writeln!(file, "data_directory /raw").unwrap();
    writeln!(file, "num_peaks_to_find 2").unwrap();
    drop(file);

    let config = ReductionConfig::load(&path).unwrap();
    let toolkit = RecordingToolkit::new().with_found_peaks(10);
    let summary = RunReducer::new(&config, &toolkit).reduce("100").unwrap();

    assert_eq!(summary.peaks_found, 2);
    assert_eq!(summary.files.niggli_matrix, dir.path().join("100_Niggli.mat"));
}
