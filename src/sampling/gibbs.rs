//! Two-box Gibbs ensemble for phase coexistence.
//!
//! Ion-electron pairs are distributed between two periodic cells of a fixed total volume.
//! Three trial kinds keep the cells in equilibrium with each other: particle displacement
//! inside one cell, volume exchange between the cells and transfer of a whole pair from
//! one cell to the other. Volume changes and transfers recompute both cell energies from
//! scratch.

use color_eyre::eyre::Result;
use nalgebra::Vector3;
use tracing::{debug, info, warn};

use super::averaging::{DensityAverager, EnergyWindow};
use super::traits::{Cadence, Ensemble, TrialMove};
use super::RandomSource;
use crate::constants::{BOHR, BOLTZMANN, ELECTRON_CHARGE};
use crate::geometry::PeriodicBox;
use crate::io::{CheckpointStore, Configuration, GibbsSchedule, TwoBoxCheckpoint};
use crate::particles::TwoBoxParticles;
use crate::potential::{
    build_potential, BoxView, LennardJones, PairKind, PairSums, PotentialKind, PotentialModel, Species,
};

/// Pending two-box trial.
#[derive(Debug, Clone)]
enum GibbsTrial {
    Displacement {
        which: usize,
        species: Species,
        pair: usize,
        position: Vector3<f64>,
        delta: PairSums,
    },
    Volume {
        widths: [f64; 2],
        ions: Vec<Vector3<f64>>,
        electrons: Vec<Vector3<f64>>,
    },
    Interchange {
        pair: usize,
        ion: Vector3<f64>,
        electron: Vector3<f64>,
    },
}

pub struct GibbsEnsemble {
    point: String,
    potential: Box<dyn PotentialModel>,
    particles: TwoBoxParticles,
    temperature: f64,
    gamma: f64,
    /// Lennard-Jones diameter, Bohr; results then report ρ* instead of Γ
    sigma: Option<f64>,
    total_volume: f64,
    max_delta: f64,
    deltas: [f64; 2],
    max_volume_change: f64,
    resolution: usize,
    schedule: GibbsSchedule,
    equilibration: usize,
    resume: bool,
    start_from_lattice: bool,
    save_trajectory: bool,
    energies: [f64; 2],
    windows: [EnergyWindow; 2],
    densities: DensityAverager,
    trial: Option<GibbsTrial>,
}

impl GibbsEnsemble {
    pub fn new(config: &Configuration) -> Self {
        let pairs = config.particles / 2;
        let total_volume = config.total_volume();
        let cells = [PeriodicBox::from_volume(0.5 * total_volume); 2];
        let window = config.averaging_window();

        let mut ensemble = Self {
            point: config.folder(),
            potential: build_potential(config.potential, config.temperature as f64, config.density),
            // replaced by initialize()
            particles: TwoBoxParticles::lattice(pairs, pairs / 2, cells),
            temperature: config.temperature as f64,
            gamma: config.gamma(),
            sigma: match config.potential {
                PotentialKind::LennardJones { epsilon, ro_star } => {
                    Some(LennardJones::from_density(epsilon, ro_star, config.density).sigma)
                }
                _ => None,
            },
            total_volume,
            max_delta: config.max_delta,
            deltas: [0.0; 2],
            max_volume_change: config.gibbs.max_volume_change,
            resolution: config.gibbs.resolution.max(1),
            schedule: config.gibbs.schedule,
            equilibration: config.effective_equilibration(),
            resume: config.resume,
            start_from_lattice: config.start_from_lattice,
            save_trajectory: config.save_trajectory,
            energies: [0.0; 2],
            windows: [EnergyWindow::new(window), EnergyWindow::new(window)],
            densities: DensityAverager::default(),
            trial: None,
        };
        ensemble.update_deltas();
        ensemble
    }

    pub fn particles(&self) -> &TwoBoxParticles {
        &self.particles
    }

    pub fn energies(&self) -> [f64; 2] {
        self.energies
    }

    pub fn volumes(&self) -> [f64; 2] {
        [self.particles.cell(0).volume(), self.particles.cell(1).volume()]
    }

    /// Instantaneous particle densities, Bohr⁻³.
    pub fn current_densities(&self) -> [f64; 2] {
        let v = self.volumes();
        [
            self.particles.particles_in(0) as f64 / v[0],
            self.particles.particles_in(1) as f64 / v[1],
        ]
    }

    /// Displacement scale per box: `max_delta · cbrt(V / N)` of that box.
    fn update_deltas(&mut self) {
        for which in 0..2 {
            let cell = self.particles.cell(which);
            self.deltas[which] = if self.max_delta == 0.0 {
                cell.width()
            } else {
                let n = self.particles.particles_in(which).max(1) as f64;
                self.max_delta * (cell.volume() / n).cbrt()
            };
        }
    }

    fn fresh_start(&mut self, rng: &mut RandomSource) {
        let pairs = self.particles.pairs();
        let cells = [PeriodicBox::from_volume(0.5 * self.total_volume); 2];
        self.particles = if self.start_from_lattice {
            TwoBoxParticles::lattice(pairs, pairs / 2, cells)
        } else {
            TwoBoxParticles::random(pairs, pairs / 2, cells, rng)
        };
    }

    fn restore(&mut self, store: &CheckpointStore) -> Option<usize> {
        if !self.resume || !store.has_state() {
            return None;
        }
        let pairs = self.particles.pairs();
        let checkpoint = match store.read_two_box(pairs) {
            Ok(checkpoint) if checkpoint.border > 0 && checkpoint.border < pairs => checkpoint,
            Ok(checkpoint) => {
                warn!(point = %self.point, border = checkpoint.border, "stored box border leaves a box empty, starting from scratch");
                return None;
            }
            Err(err) => {
                warn!(point = %self.point, "failed to read state, starting from scratch: {:#}", err);
                return None;
            }
        };

        let half = PeriodicBox::from_volume(0.5 * self.total_volume);
        let cells = match checkpoint.widths {
            Some([w0, w1]) if w0 > 0.0 && w1 > 0.0 => [PeriodicBox::new(w0), PeriodicBox::new(w1)],
            _ => [half, half],
        };
        self.particles = TwoBoxParticles::new(checkpoint.ions, checkpoint.electrons, checkpoint.border, cells);
        for which in 0..2 {
            self.windows[which].seed(checkpoint.average_energy[which]);
        }
        self.densities.seed(checkpoint.average_density);
        info!(point = %self.point, step = checkpoint.step, border = checkpoint.border, "state restored");
        Some(checkpoint.step)
    }

    fn total_potential_of(&self, ions: &[Vector3<f64>], electrons: &[Vector3<f64>], widths: [f64; 2]) -> f64 {
        (0..2)
            .map(|which| {
                let range = self.particles.range(which);
                let cell = PeriodicBox::new(widths[which]);
                let view = BoxView::new(&ions[range.clone()], &electrons[range], &cell);
                self.potential.total_potential(&view)
            })
            .sum()
    }

    fn propose_displacement(&mut self, rng: &mut RandomSource) -> f64 {
        let which = rng.index(2);
        let range = self.particles.range(which);
        let pairs = range.len();
        let pick = rng.index(2 * pairs);
        let species = if pick < pairs { Species::Ion } else { Species::Electron };
        let local = pick % pairs;
        let pair = range.start + local;

        let cell = *self.particles.cell(which);
        let old = *self.particles.position(species, pair);
        let position = cell.fold(&(old + rng.displacement(self.deltas[which])));

        let view = self.particles.view(which);
        let before = self.potential.interaction(&view, species, &old, Some((species, local)));
        let after = self.potential.interaction(&view, species, &position, Some((species, local)));
        let delta = after - before;

        self.trial = Some(GibbsTrial::Displacement { which, species, pair, position, delta });
        (-delta.potential).exp()
    }

    fn propose_volume_change(&mut self, rng: &mut RandomSource) -> f64 {
        let volumes = self.volumes();
        let step = rng.symmetric() * self.max_volume_change * volumes[0].min(volumes[1]);
        let new_volumes = [volumes[0] + step, volumes[1] - step];
        if !(new_volumes[0] > 0.0 && new_volumes[1] > 0.0) {
            self.trial = None;
            return 0.0;
        }
        let widths = [new_volumes[0].cbrt(), new_volumes[1].cbrt()];
        let (ions, electrons) = self.particles.rescaled(widths);

        let old_widths = [self.particles.cell(0).width(), self.particles.cell(1).width()];
        let old_potential = self.total_potential_of(self.particles.ions(), self.particles.electrons(), old_widths);
        let new_potential = self.total_potential_of(&ions, &electrons, widths);

        let entropy: f64 = (0..2)
            .map(|k| self.particles.particles_in(k) as f64 * (new_volumes[k] / volumes[k]).ln())
            .sum();

        self.trial = Some(GibbsTrial::Volume { widths, ions, electrons });
        (entropy - (new_potential - old_potential)).exp()
    }

    fn propose_interchange(&mut self, rng: &mut RandomSource) -> f64 {
        let pair = rng.index(self.particles.pairs());
        let from = self.particles.box_of(pair);
        let to = 1 - from;
        let n_from = self.particles.pairs_in(from);
        let n_to = self.particles.pairs_in(to);
        if n_from <= 1 {
            self.trial = None;
            return 0.0;
        }

        let to_cell = *self.particles.cell(to);
        let ion = rng.point_in_box(to_cell.width());
        let electron = rng.point_in_box(to_cell.width());

        // cost of taking the pair out of its box
        let local = pair - self.particles.range(from).start;
        let from_view = self.particles.view(from);
        let old_ion = self.particles.position(Species::Ion, pair);
        let old_electron = self.particles.position(Species::Electron, pair);
        let own = self
            .potential
            .pair_potential(from_view.cell.distance(old_ion, old_electron), PairKind::IonElectron);
        let removal = self.potential.interaction(&from_view, Species::Ion, old_ion, Some((Species::Ion, local))).potential
            + self
                .potential
                .interaction(&from_view, Species::Electron, old_electron, Some((Species::Electron, local)))
                .potential
            - own;

        // cost of putting it into the other box
        let to_view = self.particles.view(to);
        let insertion = self.potential.interaction(&to_view, Species::Ion, &ion, None).potential
            + self.potential.interaction(&to_view, Species::Electron, &electron, None).potential
            + self
                .potential
                .pair_potential(to_cell.distance(&ion, &electron), PairKind::IonElectron);

        let v_from = self.particles.cell(from).volume();
        let v_to = to_cell.volume();
        let bias = (n_from - 1) as f64 * v_to / (v_from * (n_to + 1) as f64);

        self.trial = Some(GibbsTrial::Interchange { pair, ion, electron });
        (-(insertion - removal)).exp() * bias
    }

    fn checkpoint(&mut self, step: usize) -> TwoBoxCheckpoint {
        TwoBoxCheckpoint {
            step,
            border: self.particles.border(),
            average_energy: [self.windows[0].average(), self.windows[1].average()],
            average_density: self.densities.averages(),
            gamma: self.gamma,
            widths: Some([self.particles.cell(0).width(), self.particles.cell(1).width()]),
            ions: self.particles.ions().to_vec(),
            electrons: self.particles.electrons().to_vec(),
        }
    }
}

impl Ensemble for GibbsEnsemble {
    fn name(&self) -> &'static str {
        "gibbs"
    }

    fn cadence(&self) -> Cadence {
        Cadence {
            frequent: self.resolution,
            mid: 3 * self.resolution,
            rare: 5 * self.resolution,
        }
    }

    fn initialize(&mut self, store: &mut CheckpointStore, rng: &mut RandomSource) -> usize {
        let restored = self.restore(store);
        if restored.is_none() {
            self.fresh_start(rng);
        }
        self.update_deltas();
        self.resync_energy();
        for which in 0..2 {
            if self.windows[which].mean() == 0.0 {
                self.windows[which].seed(self.energies[which]);
            }
        }
        if self.densities.averages() == [0.0; 2] {
            self.densities.seed(self.current_densities());
        }

        let append = restored.is_some();
        if let Err(err) = store.open_box_log(append) {
            warn!(point = %self.point, "two-box log disabled: {:#}", err);
        }
        if self.save_trajectory {
            if let Err(err) = store.open_trajectory(append) {
                warn!(point = %self.point, "trajectory disabled: {:#}", err);
            }
        }

        match restored {
            Some(step) => step,
            None => {
                info!(point = %self.point, potential = self.potential.name(), "fresh two-box start");
                if let Err(err) = self.save(0, store) {
                    warn!(point = %self.point, "failed to write initial state: {:#}", err);
                }
                0
            }
        }
    }

    fn select_move(&mut self, step: usize, rng: &mut RandomSource) -> TrialMove {
        if step < self.equilibration {
            return TrialMove::Displacement;
        }
        match self.schedule {
            GibbsSchedule::Cyclic => match step % 3 {
                0 => TrialMove::Displacement,
                1 => TrialMove::VolumeChange,
                _ => TrialMove::Interchange,
            },
            GibbsSchedule::SwitchRate { switch_rate, volume_period } => {
                if rng.uniform() < switch_rate {
                    TrialMove::Interchange
                } else if volume_period > 0 && step % volume_period == 0 {
                    TrialMove::VolumeChange
                } else {
                    TrialMove::Displacement
                }
            }
        }
    }

    fn propose(&mut self, trial: TrialMove, rng: &mut RandomSource) -> f64 {
        match trial {
            TrialMove::Displacement => self.propose_displacement(rng),
            TrialMove::VolumeChange => self.propose_volume_change(rng),
            TrialMove::Interchange => self.propose_interchange(rng),
        }
    }

    fn accept(&mut self) {
        match self.trial.take() {
            Some(GibbsTrial::Displacement { which, species, pair, position, delta }) => {
                self.particles.commit_move(species, pair, position);
                self.energies[which] += delta.energy;
            }
            Some(GibbsTrial::Volume { widths, ions, electrons }) => {
                self.particles.commit_volume_change(widths, ions, electrons);
                self.resync_energy();
                self.update_deltas();
            }
            Some(GibbsTrial::Interchange { pair, ion, electron }) => {
                let index = self.particles.commit_particle_transfer(pair, ion, electron);
                debug!(point = %self.point, pair, index, border = self.particles.border(), "pair transferred");
                self.resync_energy();
                self.update_deltas();
            }
            None => {}
        }
    }

    fn reject(&mut self) {
        self.trial = None;
    }

    fn record_sample(&mut self) {
        self.windows[0].push(self.energies[0]);
        self.windows[1].push(self.energies[1]);
        self.densities.record(self.current_densities());
    }

    fn resync_energy(&mut self) {
        for which in 0..2 {
            self.energies[which] = self.potential.total_energy(&self.particles.view(which));
        }
    }

    fn on_frequent(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()> {
        self.windows[0].average();
        self.windows[1].average();
        let densities = self.densities.roll();
        let counts = [self.particles.particles_in(0), self.particles.particles_in(1)];
        store.append_box_log(step, counts, densities)
    }

    fn on_mid(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()> {
        let positions = self.particles.ions().iter().chain(self.particles.electrons().iter());
        store.append_trajectory(step, positions)
    }

    fn save(&mut self, step: usize, store: &mut CheckpointStore) -> Result<()> {
        let checkpoint = self.checkpoint(step);
        store.write_two_box(&checkpoint)
    }

    /// `[Γ0, E0/N0, Γ1, E1/N1]`; Lennard-Jones points report `ρ* = nσ³` in place of Γ.
    fn observables(&self) -> Vec<f64> {
        let densities = self.densities.averages();
        let mut values = Vec::with_capacity(4);
        for which in 0..2 {
            let coupling = match self.sigma {
                Some(sigma) => densities[which] * sigma.powi(3),
                None => {
                    let n = densities[which] / BOHR.powi(3);
                    ELECTRON_CHARGE * ELECTRON_CHARGE * n.cbrt() / (BOLTZMANN * self.temperature)
                }
            };
            let particles = self.particles.particles_in(which).max(1) as f64;
            values.push(coupling);
            values.push(self.windows[which].mean() / particles);
        }
        values
    }
}
