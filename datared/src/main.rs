use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use datared::config::reduction::ReductionConfig;
use datared::dry_run::DryRunStitch;
use datared::scd::pipeline::RunReducer;
use datared::scd::recorder::RecordingToolkit;
use wscore::catalog::in_memory::InMemoryCatalog;
use wscore::stitch::many::SequentialStitcher;
use wscore::stitch::params::{parse_workspace_list, StitchParameters};

/// Plan data reductions without the host toolkit.
#[derive(Parser, Debug)]
#[command(name = "datared", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the toolkit calls that reduce one single crystal run
    Reduce {
        /// Flat key-value parameter file
        config: PathBuf,
        /// Run number to reduce
        run: String,
        /// Peaks the dry run pretends to find
        #[arg(long, default_value_t = 0)]
        found_peaks: usize,
        /// Peaks the dry run pretends to predict
        #[arg(long, default_value_t = 0)]
        predicted_peaks: usize,
    },
    /// Print the pairwise stitches a multi-workspace stitch performs
    Stitch {
        /// JSON file with the stitch properties (InputWorkspaces, Params, ...)
        params: PathBuf,
        /// Declare a group input as NAME=member1,member2,...
        #[arg(long = "group", value_parser = parse_group)]
        groups: Vec<(String, Vec<String>)>,
        /// Threads used across group positions
        #[arg(long, default_value_t = 1)]
        num_threads: usize,
    },
}

fn parse_group(raw: &str) -> Result<(String, Vec<String>), String> {
    let (name, members) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=member1,member2, got '{}'", raw))?;
    let members = parse_workspace_list(members);
    if members.is_empty() {
        return Err(format!("group '{}' has no members", name));
    }
    Ok((name.trim().to_string(), members))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Reduce { config, run, found_peaks, predicted_peaks } => {
            let reduction_config = ReductionConfig::load(&config)?;
            let mut toolkit = RecordingToolkit::new()
                .with_found_peaks(found_peaks)
                .with_predicted_peaks(predicted_peaks);
            if let Some(directory) = &reduction_config.data_directory {
                toolkit = toolkit.with_event_directory(directory);
            }

            let summary = RunReducer::new(&reduction_config, &toolkit).reduce(&run)?;

            let plan = json!({
                "config_file": config,
                "config": reduction_config,
                "summary": summary,
                "calls": toolkit.calls(),
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Stitch { params, groups, num_threads } => {
            let text = fs::read_to_string(&params)?;
            let stitch_params: StitchParameters = serde_json::from_str(&text)?;

            let catalog = InMemoryCatalog::new();
            for (name, members) in &groups {
                for member in members {
                    catalog.add_dataset(member, ());
                }
                catalog.add_group(name, members)?;
            }
            for name in &stitch_params.input_workspaces {
                if !groups.iter().any(|(group, _)| group == name) {
                    catalog.add_dataset(name, ());
                }
            }

            let dry_run = DryRunStitch::new(&catalog);
            let result = SequentialStitcher::new(&catalog, &dry_run)
                .with_num_threads(num_threads)
                .stitch(&stitch_params)?;

            let plan = json!({
                "steps": dry_run.steps(),
                "result": result,
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group() {
        assert_eq!(
            parse_group("g=a, b").unwrap(),
            ("g".to_string(), vec!["a".to_string(), "b".to_string()])
        );
        assert!(parse_group("g").is_err());
        assert!(parse_group("g=").is_err());
    }

    #[test]
    fn test_cli_parses_stitch() {
        let args = ["datared", "stitch", "p.json", "--group", "g=a,b", "--num-threads", "2"];
        let cli = Cli::parse_from(args);

        match cli.command {
            Command::Stitch { params, groups, num_threads } => {
                assert_eq!(params, PathBuf::from("p.json"));
                assert_eq!(groups.len(), 1);
                assert_eq!(num_threads, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
