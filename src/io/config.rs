//! Run files and per-point configurations.
//!
//! A run file lists the calculation points and the defaults they inherit:
//!
//! ```yaml
//! output: runs
//! workers: 4
//! defaults:
//!   particles: 500
//!   steps: 2000000
//!   max_delta: 1.0
//!   potential:
//!     kind: shelf
//!     epsilon: 4.0
//! points:
//!   - temperature: 10000
//!     density: 1.0e20
//!   - temperature: 20000
//!     density: 5.0e20
//!     resume: true
//! ```

use color_eyre::eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{BOHR, BOLTZMANN, ELECTRON_CHARGE};
use crate::potential::PotentialKind;

/// Which ensemble a point is sampled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleKind {
    #[default]
    Nvt,
    Gibbs,
}

/// How Gibbs trial kinds are chosen once equilibration is over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GibbsSchedule {
    /// Displacement, volume change and interchange in turn (step mod 3)
    #[default]
    Cyclic,
    /// Interchange with probability `switch_rate`, otherwise a volume change every
    /// `volume_period` steps and displacements in between
    SwitchRate { switch_rate: f64, volume_period: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GibbsParameters {
    /// Largest volume exchange as a fraction of the smaller box
    pub max_volume_change: f64,
    /// Frequent cadence period, steps
    pub resolution: usize,
    pub schedule: GibbsSchedule,
}

impl Default for GibbsParameters {
    fn default() -> Self {
        Self {
            max_volume_change: 0.07,
            resolution: 1000,
            schedule: GibbsSchedule::default(),
        }
    }
}

/// Immutable description of one calculation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Temperature, K
    pub temperature: u32,
    /// Number density of each species, cm⁻³
    pub density: f64,
    /// Total particle count, half ions and half electrons
    pub particles: usize,
    /// Step budget
    pub steps: usize,
    /// Trial displacement factor: 0 means the box width, otherwise the factor times the
    /// average inter-particle distance
    pub max_delta: f64,
    pub potential: PotentialKind,
    pub ensemble: EnsembleKind,
    /// Leading steps excluded from every average
    pub equilibration_steps: usize,
    /// Size of the energy averaging window; defaults to the sampled part of the budget
    pub averaging_points: Option<usize>,
    pub gibbs: GibbsParameters,
    pub save_trajectory: bool,
    pub start_from_lattice: bool,
    pub resume: bool,
    pub seed: Option<u64>,
}

impl Configuration {
    /// Folder identity `_{T}K_{N}pa_d{max_delta}/{density}` relative to the output root.
    pub fn folder(&self) -> String {
        format!(
            "_{}K_{}pa_d{}/{}",
            self.temperature,
            self.particles,
            self.max_delta,
            short_scientific(self.density)
        )
    }

    /// Short tag for status lines.
    pub fn tag(&self) -> String {
        format!("{}K/{}", self.temperature, short_scientific(self.density))
    }

    /// Name of the per-temperature aggregate result file.
    pub fn results_file_name(&self) -> String {
        format!("{}K_{}pa_d{}_results.txt", self.temperature, self.particles, self.max_delta)
    }

    /// Edge of the single-box cell, Bohr.
    pub fn box_width(&self) -> f64 {
        (self.particles as f64 / (2.0 * self.density)).cbrt() / BOHR
    }

    /// Total volume holding all particles at the configured density, Bohr³.
    pub fn total_volume(&self) -> f64 {
        self.box_width().powi(3)
    }

    /// Average inter-particle distance, Bohr.
    pub fn average_distance(&self) -> f64 {
        (1.0 / (2.0 * self.density)).cbrt() / BOHR
    }

    /// Coupling parameter Γ = e² (2n)^{1/3} / kT.
    pub fn gamma(&self) -> f64 {
        ELECTRON_CHARGE * ELECTRON_CHARGE * (2.0 * self.density).cbrt() / (BOLTZMANN * self.temperature as f64)
    }

    /// Single-box displacement scale, Bohr.
    pub fn displacement_scale(&self) -> f64 {
        if self.max_delta == 0.0 {
            self.box_width()
        } else {
            self.max_delta * self.average_distance()
        }
    }

    /// Equilibration length actually applied: none when the budget does not exceed it.
    pub fn effective_equilibration(&self) -> usize {
        if self.steps > self.equilibration_steps {
            self.equilibration_steps
        } else {
            0
        }
    }

    /// Capacity of the energy averaging window.
    pub fn averaging_window(&self) -> usize {
        self.averaging_points
            .unwrap_or_else(|| self.steps - self.effective_equilibration())
            .max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.temperature == 0 {
            bail!("{}: temperature must be positive", self.folder());
        }
        if !(self.density > 0.0) {
            bail!("{}: density must be positive", self.folder());
        }
        if self.particles < 2 || self.particles % 2 != 0 {
            bail!("{}: particle count must be even and at least 2, got {}", self.folder(), self.particles);
        }
        if self.ensemble == EnsembleKind::Gibbs && self.particles < 4 {
            bail!("{}: the two-box ensemble needs at least two pairs", self.folder());
        }
        if self.max_delta < 0.0 {
            bail!("{}: max_delta must not be negative", self.folder());
        }
        let max_volume_change = self.gibbs.max_volume_change;
        if !(max_volume_change > 0.0 && max_volume_change < 1.0) {
            bail!(
                "{}: max_volume_change must lie in (0, 1), got {}",
                self.folder(),
                max_volume_change
            );
        }
        if let GibbsSchedule::SwitchRate { switch_rate, .. } = self.gibbs.schedule {
            if !(0.0..=1.0).contains(&switch_rate) {
                bail!("{}: switch_rate must lie in [0, 1], got {}", self.folder(), switch_rate);
            }
        }
        Ok(())
    }
}

/// `2.5E20` style formatting used in folder names.
pub fn short_scientific(value: f64) -> String {
    format!("{:E}", value)
}

/// Values shared by all points of a run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointDefaults {
    pub particles: usize,
    pub steps: usize,
    pub max_delta: f64,
    pub potential: PotentialKind,
    pub ensemble: EnsembleKind,
    pub equilibration_steps: usize,
    pub averaging_points: Option<usize>,
    pub gibbs: GibbsParameters,
    pub save_trajectory: bool,
    pub start_from_lattice: bool,
    pub resume: bool,
    pub seed: Option<u64>,
}

impl Default for PointDefaults {
    fn default() -> Self {
        Self {
            particles: 500,
            steps: 1_000_000,
            max_delta: 1.0,
            potential: PotentialKind::default(),
            ensemble: EnsembleKind::default(),
            equilibration_steps: 50_000,
            averaging_points: None,
            gibbs: GibbsParameters::default(),
            save_trajectory: false,
            start_from_lattice: false,
            resume: false,
            seed: None,
        }
    }
}

/// One entry of the `points` list. Unset fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSpec {
    pub temperature: u32,
    pub density: f64,
    #[serde(default)]
    pub steps: Option<usize>,
    #[serde(default)]
    pub resume: Option<bool>,
    #[serde(default)]
    pub save_trajectory: Option<bool>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub workers: Option<usize>,
    /// Status refresh period, seconds
    #[serde(default)]
    pub refresh_seconds: Option<u64>,
    #[serde(default)]
    pub defaults: PointDefaults,
    #[serde(default)]
    pub points: Vec<PointSpec>,
}

impl RunFile {
    /// Expand the points into configurations, dropping points whose folder identity was
    /// already seen (first one wins).
    pub fn configurations(&self) -> Result<Vec<Configuration>> {
        let mut seen = HashSet::new();
        let mut configurations = Vec::with_capacity(self.points.len());

        for point in &self.points {
            let d = &self.defaults;
            let configuration = Configuration {
                temperature: point.temperature,
                density: point.density,
                particles: d.particles,
                steps: point.steps.unwrap_or(d.steps),
                max_delta: d.max_delta,
                potential: d.potential,
                ensemble: d.ensemble,
                equilibration_steps: d.equilibration_steps,
                averaging_points: d.averaging_points,
                gibbs: d.gibbs,
                save_trajectory: point.save_trajectory.unwrap_or(d.save_trajectory),
                start_from_lattice: d.start_from_lattice,
                resume: point.resume.unwrap_or(d.resume),
                seed: point.seed.or(d.seed),
            };
            configuration.validate()?;
            if seen.insert(configuration.folder()) {
                configurations.push(configuration);
            } else {
                tracing::warn!(point = %configuration.folder(), "duplicate calculation point skipped");
            }
        }
        Ok(configurations)
    }
}

/// Read and parse a YAML run file.
pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read run file: {}", path.display()))?;
    let run: RunFile = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse run file: {}", path.display()))?;
    Ok(run)
}
