//! Stitch any number of workspaces by chaining pairwise stitches.
//!
//! Flat inputs are folded one pair at a time, threading the output of each
//! step into the next. Grouped inputs run the same fold once per group
//! position and collect the per-position outputs into a new group.

use std::collections::BTreeSet;

use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::catalog::workspace::{WorkspaceCatalog, WorkspaceKind};
use crate::stitch::error::StitchError;
use crate::stitch::operation::{PairStitch, Stitch1D};
use crate::stitch::params::{Overlap, RebinParams, ScaleDirection, ScalePolicy, StitchParameters};

/// Shape of the inputs, decided once before anything is stitched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputLayout {
    Flat(Vec<String>),
    /// One member list per input, all of the same length
    Grouped(Vec<Vec<String>>),
}

impl InputLayout {
    /// Every input name, group members included.
    pub fn names(&self) -> Vec<&str> {
        match self {
            InputLayout::Flat(inputs) => inputs.iter().map(String::as_str).collect(),
            InputLayout::Grouped(groups) => groups.iter().flatten().map(String::as_str).collect(),
        }
    }

    pub fn classify<C: WorkspaceCatalog + ?Sized>(
        catalog: &C,
        inputs: &[String],
    ) -> Result<Self, StitchError> {
        let kinds = inputs
            .iter()
            .map(|name| catalog.kind(name))
            .collect::<Result<Vec<_>, _>>()?;
        for (name, kind) in inputs.iter().zip(&kinds) {
            debug!("input '{}' is {}", name, kind);
        }

        if kinds.iter().all(|kind| !kind.is_group()) {
            return Ok(InputLayout::Flat(inputs.to_vec()));
        }

        let mut groups = Vec::with_capacity(kinds.len());
        for (name, kind) in inputs.iter().zip(kinds) {
            match kind {
                WorkspaceKind::Group(members) if members.is_empty() => {
                    return Err(StitchError::EmptyGroup(name.clone()));
                }
                WorkspaceKind::Group(members) => groups.push((name, members)),
                WorkspaceKind::Single => return Err(StitchError::MixedInputKinds),
            }
        }

        let expected = groups[0].1.len();
        if let Some((name, members)) = groups.iter().find(|(_, m)| m.len() != expected) {
            return Err(StitchError::GroupSizeMismatch {
                name: name.to_string(),
                expected,
                actual: members.len(),
            });
        }

        Ok(InputLayout::Grouped(groups.into_iter().map(|(_, members)| members).collect()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StitchResult {
    pub output: String,
    /// Factor reported by the last stitch executed
    pub scale_factor: f64,
    /// Per-position outputs of a grouped stitch, empty for flat inputs
    pub members: Vec<String>,
}

// the part of an invocation shared by every step
struct Recipe<'a> {
    overlaps: &'a [Overlap],
    params: &'a RebinParams,
    policy: &'a ScalePolicy,
    /// Caller-owned names a provisional output must never take
    reserved: &'a BTreeSet<String>,
}

// `base`, or `base_<n>` for the first n that avoids the reserved names and
// the workspace about to be read
fn provisional_name(base: String, reserved: &BTreeSet<String>, reading: &str) -> String {
    let mut name = base.clone();
    let mut suffix = 0;
    while reserved.contains(&name) || name == reading {
        suffix += 1;
        name = format!("{}_{}", base, suffix);
    }
    name
}

// the workspace currently holding the running result
struct Accumulator {
    name: String,
    provisional: bool,
}

impl Accumulator {
    fn input(name: &str) -> Self {
        Accumulator { name: name.to_string(), provisional: false }
    }

    fn produced(name: String) -> Self {
        Accumulator { name, provisional: true }
    }
}

pub struct SequentialStitcher<'a, C: ?Sized, S: ?Sized> {
    catalog: &'a C,
    operation: &'a S,
    num_threads: usize,
}

impl<'a, C, S> SequentialStitcher<'a, C, S>
where
    C: WorkspaceCatalog + ?Sized,
    S: Stitch1D + ?Sized,
{
    pub fn new(catalog: &'a C, operation: &'a S) -> Self {
        SequentialStitcher { catalog, operation, num_threads: 1 }
    }

    /// Stitch group positions on `num_threads` threads. Flat inputs are
    /// always stitched sequentially.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    pub fn stitch(&self, params: &StitchParameters) -> Result<StitchResult, StitchError> {
        // validate everything before the first external call
        let overlaps = params.resolve_overlaps()?;
        let layout = InputLayout::classify(self.catalog, &params.input_workspaces)?;
        let policy = params.scale_policy();
        let output = params.output_workspace.as_str();
        let reserved: BTreeSet<String> = params
            .input_workspaces
            .iter()
            .map(String::as_str)
            .chain(layout.names())
            .chain([output])
            .map(str::to_string)
            .collect();
        let recipe = Recipe {
            overlaps: &overlaps,
            params: &params.params,
            policy: &policy,
            reserved: &reserved,
        };

        let result = match layout {
            InputLayout::Flat(inputs) => StitchResult {
                output: output.to_string(),
                scale_factor: self.stitch_flat(&inputs, output, &recipe)?,
                members: Vec::new(),
            },
            InputLayout::Grouped(groups) => self.stitch_grouped(&groups, output, &recipe)?,
        };

        info!(
            "stitched {} workspaces into '{}' with scale factor {}",
            params.input_workspaces.len(),
            result.output,
            result.scale_factor
        );
        Ok(result)
    }

    fn stitch_flat(
        &self,
        inputs: &[String],
        output: &str,
        recipe: &Recipe<'_>,
    ) -> Result<f64, StitchError> {
        match recipe.policy.direction {
            ScaleDirection::Forward => self.stitch_forward(inputs, output, recipe),
            ScaleDirection::Backward => self.stitch_backward(inputs, output, recipe),
        }
    }

    // left to right: ((in0 + in1) + in2) + ...
    fn stitch_forward(
        &self,
        inputs: &[String],
        output: &str,
        recipe: &Recipe<'_>,
    ) -> Result<f64, StitchError> {
        let last = inputs.len().saturating_sub(1);
        let mut accumulator = Accumulator::input(&inputs[0]);
        let mut scale_factor = None;

        for (i, rhs) in inputs.iter().enumerate().skip(1) {
            let out = if i == last {
                output.to_string()
            } else {
                let base = format!("{}{}", accumulator.name, rhs);
                provisional_name(base, recipe.reserved, &accumulator.name)
            };
            let overlap = recipe.overlaps[i - 1];
            let factor = self.combine(&accumulator.name, rhs, overlap, recipe, &out)?;
            self.release(&accumulator, &out)?;
            accumulator = Accumulator::produced(out);
            scale_factor = Some(factor);
        }

        scale_factor.ok_or(StitchError::InsufficientInputs(inputs.len()))
    }

    // right to left: ... + (in(n-2) + in(n-1))
    fn stitch_backward(
        &self,
        inputs: &[String],
        output: &str,
        recipe: &Recipe<'_>,
    ) -> Result<f64, StitchError> {
        let last = inputs.len().saturating_sub(1);
        let mut accumulator = Accumulator::input(&inputs[last]);
        let mut scale_factor = None;

        for i in (0..last).rev() {
            let lhs = &inputs[i];
            let out = if i == 0 {
                output.to_string()
            } else {
                let base = format!("{}{}", lhs, accumulator.name);
                provisional_name(base, recipe.reserved, &accumulator.name)
            };
            // overlap i sits between inputs i and i + 1
            let factor = self.combine(lhs, &accumulator.name, recipe.overlaps[i], recipe, &out)?;
            self.release(&accumulator, &out)?;
            accumulator = Accumulator::produced(out);
            scale_factor = Some(factor);
        }

        scale_factor.ok_or(StitchError::InsufficientInputs(inputs.len()))
    }

    fn stitch_grouped(
        &self,
        groups: &[Vec<String>],
        output: &str,
        recipe: &Recipe<'_>,
    ) -> Result<StitchResult, StitchError> {
        let group_size = groups.first().map_or(0, Vec::len);
        let mut reserved = recipe.reserved.clone();

        let mut positions: Vec<(Vec<String>, String)> = Vec::with_capacity(group_size);
        for p in 0..group_size {
            let inputs: Vec<String> = groups.iter().map(|members| members[p].clone()).collect();
            let out = provisional_name(format!("{}_{}", inputs.concat(), p + 1), &reserved, "");
            reserved.insert(out.clone());
            positions.push((inputs, out));
        }
        // per-position intermediates must not land on another position's output
        let recipe = &Recipe { reserved: &reserved, ..*recipe };

        debug!("stitching {} group positions on {} thread(s)", group_size, self.num_threads);

        let factors: Vec<f64> = if self.num_threads > 1 {
            let pool = ThreadPoolBuilder::new().num_threads(self.num_threads).build()?;
            pool.install(|| {
                positions
                    .par_iter()
                    .map(|(inputs, out)| self.stitch_flat(inputs, out, recipe))
                    .collect::<Result<Vec<_>, _>>()
            })?
        } else {
            positions
                .iter()
                .map(|(inputs, out)| self.stitch_flat(inputs, out, recipe))
                .collect::<Result<Vec<_>, _>>()?
        };

        let members: Vec<String> = positions.into_iter().map(|(_, out)| out).collect();
        self.catalog.group(output, &members)?;

        let scale_factor = factors
            .last()
            .copied()
            .ok_or_else(|| StitchError::EmptyGroup(output.to_string()))?;

        Ok(StitchResult { output: output.to_string(), scale_factor, members })
    }

    fn combine(
        &self,
        lhs: &str,
        rhs: &str,
        overlap: Overlap,
        recipe: &Recipe<'_>,
        output: &str,
    ) -> Result<f64, StitchError> {
        let request = PairStitch {
            lhs,
            rhs,
            overlap,
            params: recipe.params,
            scale: recipe.policy,
            output,
        };
        debug!("stitching '{}' with '{}' into '{}' (overlap {:?})", lhs, rhs, output, overlap);
        let factor = self.operation.stitch(&request)?;
        debug!("'{}' scaled by {}", output, factor);
        Ok(factor)
    }

    // drop a superseded intermediate, never an input or the step's own output
    fn release(&self, superseded: &Accumulator, output: &str) -> Result<(), StitchError> {
        if superseded.provisional
            && superseded.name != output
            && self.catalog.contains(&superseded.name)
        {
            debug!("releasing intermediate '{}'", superseded.name);
            self.catalog.remove(&superseded.name)?;
        }
        Ok(())
    }
}
