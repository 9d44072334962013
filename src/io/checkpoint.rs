//! Plain-text state files of one calculation point.
//!
//! `config.dat` holds a header line followed by one `X\tY\tZ` line per particle. The
//! single-box header is `step avgEnergy avgEnergyPerParticle gamma`; the two-box header is
//! `step boxBorder avgEnergy0 avgDensity0 avgEnergy1 avgDensity1 gamma width0 width1`.

use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use nalgebra::Vector3;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::constants::{CORRELATION_FILE, GIBBS_BOX_LOG_FILE, STATE_FILE, TRAJECTORY_FILE};

/// Header and coordinates of a single-box checkpoint. Ions first.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleBoxCheckpoint {
    pub step: usize,
    pub average_energy: f64,
    pub energy_per_particle: f64,
    pub gamma: f64,
    pub positions: Vec<Vector3<f64>>,
}

/// Header and coordinates of a two-box checkpoint, coordinates in pair order.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoBoxCheckpoint {
    pub step: usize,
    pub border: usize,
    pub average_energy: [f64; 2],
    pub average_density: [f64; 2],
    pub gamma: f64,
    /// Box widths; absent in files that predate volume moves
    pub widths: Option<[f64; 2]>,
    pub ions: Vec<Vector3<f64>>,
    pub electrons: Vec<Vector3<f64>>,
}

/// File access for one point folder.
#[derive(Debug)]
pub struct CheckpointStore {
    folder: PathBuf,
    trajectory: Option<BufWriter<File>>,
    box_log: Option<BufWriter<File>>,
}

impl CheckpointStore {
    pub fn new(folder: PathBuf) -> Self {
        Self { folder, trajectory: None, box_log: None }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn state_path(&self) -> PathBuf {
        self.folder.join(STATE_FILE)
    }

    pub fn has_state(&self) -> bool {
        self.state_path().is_file()
    }

    /// Create the point folder.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.folder)
            .wrap_err_with(|| format!("Unable to create point folder: {}", self.folder.display()))
    }

    pub fn read_single(&self, particles: usize) -> Result<SingleBoxCheckpoint> {
        let content = self.read_state()?;
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header = parse_fields(lines.next().ok_or_else(|| eyre!("empty state file"))?)?;
        if header.len() < 4 {
            bail!("state header has {} fields, expected 4", header.len());
        }
        let positions = parse_coordinates(lines)?;
        if positions.len() != particles {
            bail!("state holds {} particles, expected {}", positions.len(), particles);
        }
        Ok(SingleBoxCheckpoint {
            step: parse_step(header[0])?,
            average_energy: header[1],
            energy_per_particle: header[2],
            gamma: header[3],
            positions,
        })
    }

    pub fn write_single(&self, checkpoint: &SingleBoxCheckpoint) -> Result<()> {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\t{:.15e}\t{:.6e}\t{:.6e}\n",
            checkpoint.step, checkpoint.average_energy, checkpoint.energy_per_particle, checkpoint.gamma
        ));
        push_coordinates(&mut out, checkpoint.positions.iter());
        self.write_state(&out)
    }

    pub fn read_two_box(&self, pairs: usize) -> Result<TwoBoxCheckpoint> {
        let content = self.read_state()?;
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header = parse_fields(lines.next().ok_or_else(|| eyre!("empty state file"))?)?;
        if header.len() < 7 {
            bail!("two-box state header has {} fields, expected 7", header.len());
        }
        let border = parse_step(header[1])?;
        if border > pairs {
            bail!("box border {} exceeds {} pairs", border, pairs);
        }
        let coordinates = parse_coordinates(lines)?;
        if coordinates.len() != 2 * pairs {
            bail!("state holds {} particles, expected {}", coordinates.len(), 2 * pairs);
        }

        // box 0 ions, box 0 electrons, box 1 ions, box 1 electrons
        let rest = pairs - border;
        let (box0, box1) = coordinates.split_at(2 * border);
        let mut ions = box0[..border].to_vec();
        let mut electrons = box0[border..].to_vec();
        ions.extend_from_slice(&box1[..rest]);
        electrons.extend_from_slice(&box1[rest..]);

        let widths = if header.len() >= 9 { Some([header[7], header[8]]) } else { None };
        Ok(TwoBoxCheckpoint {
            step: parse_step(header[0])?,
            border,
            average_energy: [header[2], header[4]],
            average_density: [header[3], header[5]],
            gamma: header[6],
            widths,
            ions,
            electrons,
        })
    }

    pub fn write_two_box(&self, checkpoint: &TwoBoxCheckpoint) -> Result<()> {
        let border = checkpoint.border;
        let mut out = format!(
            "{}\t{}\t{:.15e}\t{:.15e}\t{:.15e}\t{:.15e}\t{:.6e}",
            checkpoint.step,
            border,
            checkpoint.average_energy[0],
            checkpoint.average_density[0],
            checkpoint.average_energy[1],
            checkpoint.average_density[1],
            checkpoint.gamma
        );
        if let Some(widths) = checkpoint.widths {
            out.push_str(&format!("\t{:.15e}\t{:.15e}", widths[0], widths[1]));
        }
        out.push('\n');
        push_coordinates(&mut out, checkpoint.ions[..border].iter());
        push_coordinates(&mut out, checkpoint.electrons[..border].iter());
        push_coordinates(&mut out, checkpoint.ions[border..].iter());
        push_coordinates(&mut out, checkpoint.electrons[border..].iter());
        self.write_state(&out)
    }

    /// Write normalized `(r, g_ii, g_ei, g_ee)` rows.
    pub fn write_correlation(&self, rows: &[[f64; 4]]) -> Result<()> {
        let mut out = String::with_capacity(rows.len() * 96);
        for row in rows {
            out.push_str(&format!("{:.15e}\t{:.15e}\t{:.15e}\t{:.15e}\n", row[0], row[1], row[2], row[3]));
        }
        replace_file(&self.folder.join(CORRELATION_FILE), &out)
    }

    /// Open the trajectory log, appending when resuming and truncating otherwise.
    pub fn open_trajectory(&mut self, append: bool) -> Result<()> {
        self.trajectory = Some(open_log(&self.folder.join(TRAJECTORY_FILE), append)?);
        Ok(())
    }

    /// Append one configuration to the trajectory log, if it is open.
    pub fn append_trajectory<'a, I>(&mut self, step: usize, positions: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Vector3<f64>>,
    {
        if let Some(writer) = self.trajectory.as_mut() {
            let mut out = format!("# {}\n", step);
            push_coordinates(&mut out, positions);
            writer.write_all(out.as_bytes()).wrap_err("Failed to append trajectory")?;
        }
        Ok(())
    }

    pub fn open_box_log(&mut self, append: bool) -> Result<()> {
        self.box_log = Some(open_log(&self.folder.join(GIBBS_BOX_LOG_FILE), append)?);
        Ok(())
    }

    /// Append `step N0 density0 N1 density1` to the two-box log, if it is open.
    pub fn append_box_log(&mut self, step: usize, particles: [usize; 2], density: [f64; 2]) -> Result<()> {
        if let Some(writer) = self.box_log.as_mut() {
            writeln!(
                writer,
                "{}\t{}\t{:.15e}\t{}\t{:.15e}",
                step, particles[0], density[0], particles[1], density[1]
            )
            .wrap_err("Failed to append two-box log")?;
        }
        Ok(())
    }

    /// Flush and close the append-only logs.
    pub fn close_logs(&mut self) -> Result<()> {
        for mut writer in [self.trajectory.take(), self.box_log.take()].into_iter().flatten() {
            writer.flush().wrap_err("Failed to flush log")?;
        }
        Ok(())
    }

    fn read_state(&self) -> Result<String> {
        let path = self.state_path();
        fs::read_to_string(&path).wrap_err_with(|| format!("Unable to read {}", path.display()))
    }

    fn write_state(&self, content: &str) -> Result<()> {
        replace_file(&self.state_path(), content)
    }
}

/// Write `content` next to `path` and rename it into place, so readers see either the old
/// file or the complete new one.
fn replace_file(path: &Path, content: &str) -> Result<()> {
    let staging = staging_path(path);
    fs::write(&staging, content).wrap_err_with(|| format!("Failed to write {}", staging.display()))?;
    fs::rename(&staging, path).wrap_err_with(|| format!("Failed to replace {}", path.display()))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn open_log(path: &Path, append: bool) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .wrap_err_with(|| format!("Unable to open {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn parse_fields(line: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|field| {
            field
                .parse::<f64>()
                .wrap_err_with(|| format!("bad number '{}'", field))
        })
        .collect()
}

fn parse_step(value: f64) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        bail!("bad counter value {}", value);
    }
    Ok(value as usize)
}

fn parse_coordinates<'a, I>(lines: I) -> Result<Vec<Vector3<f64>>>
where
    I: Iterator<Item = &'a str>,
{
    lines
        .enumerate()
        .map(|(i, line)| {
            let fields = parse_fields(line)?;
            if fields.len() < 3 {
                bail!("coordinate line {} has {} fields", i + 2, fields.len());
            }
            Ok(Vector3::new(fields[0], fields[1], fields[2]))
        })
        .collect()
}

fn push_coordinates<'a, I>(out: &mut String, positions: I)
where
    I: IntoIterator<Item = &'a Vector3<f64>>,
{
    for r in positions {
        out.push_str(&format!("{:.15e}\t{:.15e}\t{:.15e}\n", r.x, r.y, r.z));
    }
}
