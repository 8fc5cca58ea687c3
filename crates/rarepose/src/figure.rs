//! Diagnostic density maps of fitted bone models.
//!
//! Each map is an equirectangular projection (azimuth φ left to right from
//! −180° to 180°, inclination θ top to bottom from 0° to 180°) of the model
//! density, colored with a plasma-like ramp from 0 to the maximum density,
//! with a seeded subset of the training directions drawn as black dots.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::OutputConfig;
use crate::distribution::{sample_indices, DirectionalModel};
use crate::error::{Error, Result};
use crate::sphere::Spherical;

const MAP_WIDTH: u32 = 720;
const MAP_HEIGHT: u32 = 360;

/// Plasma color ramp control points.
const RAMP: [(f64, [f64; 3]); 5] = [
    (0.0, [13.0, 8.0, 135.0]),
    (0.25, [126.0, 3.0, 168.0]),
    (0.5, [204.0, 71.0, 120.0]),
    (0.75, [248.0, 149.0, 64.0]),
    (1.0, [240.0, 249.0, 33.0]),
];

fn ramp(t: f64) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    for w in RAMP.windows(2) {
        let (t0, c0) = w[0];
        let (t1, c1) = w[1];
        if t <= t1 {
            let s = (t - t0) / (t1 - t0);
            let mix = |i: usize| (c0[i] + s * (c1[i] - c0[i])).round() as u8;
            return Rgb([mix(0), mix(1), mix(2)]);
        }
    }
    let c = RAMP[RAMP.len() - 1].1;
    Rgb([c[0] as u8, c[1] as u8, c[2] as u8])
}

/// Pixel center of a direction.
fn pixel_of(direction: &Vector3<f64>) -> Option<(u32, u32)> {
    let s = Spherical::from_cartesian([direction.x, direction.y, direction.z])?;
    let col = ((s.phi + 180.0) / 360.0 * MAP_WIDTH as f64).floor();
    let row = (s.theta / 180.0 * MAP_HEIGHT as f64).floor();
    Some((
        (col as u32).min(MAP_WIDTH - 1),
        (row as u32).min(MAP_HEIGHT - 1),
    ))
}

/// Render the density map of `model` with up to `max_points` of `samples`
/// overlaid.
pub fn render_density_map<M: DirectionalModel>(
    model: &M,
    samples: &[Vector3<f64>],
    max_points: usize,
    seed: u64,
) -> RgbImage {
    let mut density = vec![0.0f64; (MAP_WIDTH * MAP_HEIGHT) as usize];
    for row in 0..MAP_HEIGHT {
        let theta = (row as f64 + 0.5) / MAP_HEIGHT as f64 * 180.0;
        for col in 0..MAP_WIDTH {
            let phi = (col as f64 + 0.5) / MAP_WIDTH as f64 * 360.0 - 180.0;
            let x = Spherical::from_angles(theta, phi).unit_vector();
            density[(row * MAP_WIDTH + col) as usize] = model.density(&x);
        }
    }
    let max = density
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold(0.0f64, f64::max);

    let mut img = RgbImage::new(MAP_WIDTH, MAP_HEIGHT);
    for (i, d) in density.iter().enumerate() {
        let t = if max > 0.0 { d / max } else { 0.0 };
        img.put_pixel(i as u32 % MAP_WIDTH, i as u32 / MAP_WIDTH, ramp(t));
    }

    let shown: Vec<usize> = if samples.len() > max_points {
        let mut rng = StdRng::seed_from_u64(seed);
        sample_indices(&mut rng, samples.len(), max_points)
    } else {
        (0..samples.len()).collect()
    };
    let black = Rgb([0u8, 0, 0]);
    for i in shown {
        if let Some((col, row)) = pixel_of(&samples[i]) {
            img.put_pixel(col, row, black);
            if col + 1 < MAP_WIDTH {
                img.put_pixel(col + 1, row, black);
            }
        }
    }
    img
}

/// Figure file for a bone: `<bone>_fb8.png`, or `<bone>_toy_fb8.png` for toy
/// runs.
pub fn figure_path(figs_dir: &Path, bone: usize, toy: bool) -> PathBuf {
    let name = if toy {
        format!("{bone}_toy_fb8.png")
    } else {
        format!("{bone}_fb8.png")
    };
    figs_dir.join(name)
}

/// Render and write the density map of one bone when figures are enabled.
///
/// Returns the written path, or `None` when `output.figs_dir` is unset.
pub fn write_density_map<M: DirectionalModel>(
    model: &M,
    samples: &[Vector3<f64>],
    bone: usize,
    output: &OutputConfig,
) -> Result<Option<PathBuf>> {
    let Some(dir) = output.figs_dir.as_deref() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = figure_path(dir, bone, output.toy);
    let img = render_density_map(model, samples, output.plot_max_points, output.plot_seed);
    img.save(&path).map_err(|source| Error::Image {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(bone, path = %path.display(), "density map written");
    Ok(Some(path))
}
