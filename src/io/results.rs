//! Aggregate result files, one per temperature.
//!
//! ```text
//! #10000  [10000K/1E20, 10000K/5E20]
//! -1.234567890123457e-1\t
//! -2.345678901234568e-1\t
//! ```

use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::Path;

/// Latest result tuple of one point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResult {
    pub tag: String,
    pub values: Vec<f64>,
}

pub fn format_results(temperature: u32, points: &[PointResult]) -> String {
    let tags: Vec<&str> = points.iter().map(|p| p.tag.as_str()).collect();
    let mut out = format!("#{}  [{}]\n", temperature, tags.join(", "));
    for point in points {
        for value in &point.values {
            out.push_str(&format!("{:.15e}\t", value));
        }
        out.push('\n');
    }
    out
}

/// Overwrite `root/file_name` with the results of all points at `temperature`.
pub fn write_results(root: &Path, file_name: &str, temperature: u32, points: &[PointResult]) -> Result<()> {
    let path = root.join(file_name);
    fs::write(&path, format_results(temperature, points))
        .wrap_err_with(|| format!("Failed to write results to {}", path.display()))
}
