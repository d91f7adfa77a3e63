//! Seeded synthetic confocal scans.
//!
//! A scan is a radial background gradient (brightest in the middle) with
//! uniform noise, plus Gaussian spots standing in for NV centers. Spot
//! positions are returned with the grid so detections can be checked against
//! ground truth.

use nvision_core::{try_alloc, AllocError, Grid, InputError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Placement attempts per requested spot before giving up.
const ATTEMPTS_PER_SPOT: usize = 200;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyntheticError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error("spot size range [{min}, {max}] is invalid")]
    SpotSize { min: usize, max: usize },
    #[error("spot intensity range [{min}, {max}] is invalid")]
    SpotIntensity { min: f64, max: f64 },
}

/// Generator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticScanParams {
    pub width: usize,
    pub height: usize,
    /// Requested number of spots; crowded scans may receive fewer.
    pub centers: usize,
    /// Spot area range in pixels; the Gaussian radius is `sqrt(size / π)`.
    pub min_spot_size: usize,
    pub max_spot_size: usize,
    pub min_intensity: f64,
    pub max_intensity: f64,
    /// Amplitude of the uniform background noise.
    pub noise: f64,
    /// Minimum distance between spot centres, in pixels.
    pub min_separation: f64,
    pub seed: u64,
}

impl Default for SyntheticScanParams {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            centers: 20,
            min_spot_size: 5,
            max_spot_size: 12,
            min_intensity: 0.75,
            max_intensity: 0.85,
            noise: 0.1,
            min_separation: 10.0,
            seed: 42,
        }
    }
}

/// Ground-truth description of one generated spot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpot {
    pub x: f64,
    pub y: f64,
    pub size: usize,
    pub intensity: f64,
}

impl SyntheticSpot {
    #[inline]
    pub fn radius(&self) -> f64 {
        (self.size as f64 / PI).sqrt()
    }
}

/// Generated scan and the spots drawn into it.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticScan {
    pub grid: Grid,
    pub spots: Vec<SyntheticSpot>,
}

/// Generate a scan. The same parameters always produce the same scan.
pub fn generate(params: &SyntheticScanParams) -> Result<SyntheticScan, SyntheticError> {
    let (w, h) = (params.width, params.height);
    if w == 0 || h == 0 {
        return Err(InputError::Empty.into());
    }
    if params.min_spot_size == 0 || params.min_spot_size > params.max_spot_size {
        return Err(SyntheticError::SpotSize {
            min: params.min_spot_size,
            max: params.max_spot_size,
        });
    }
    if !(params.min_intensity.is_finite()
        && params.max_intensity.is_finite()
        && params.min_intensity <= params.max_intensity)
    {
        return Err(SyntheticError::SpotIntensity {
            min: params.min_intensity,
            max: params.max_intensity,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut data = try_alloc(w * h, 0.0f64)?;

    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    for (i, v) in data.iter_mut().enumerate() {
        let (x, y) = ((i % w) as f64, (i / w) as f64);
        let dist = (((x - cx) / cx).powi(2) + ((y - cy) / cy).powi(2)).sqrt();
        *v = (0.3 - 0.2 * dist).max(0.0) + rng.random::<f64>() * params.noise;
    }

    let spots = place_spots(params, &mut rng);
    for spot in &spots {
        draw_spot(&mut data, w, h, spot);
    }
    log::debug!(
        "generated {w}x{h} scan with {} of {} requested spots",
        spots.len(),
        params.centers
    );

    Ok(SyntheticScan {
        grid: Grid::from_vec(w, h, data)?,
        spots,
    })
}

fn place_spots(params: &SyntheticScanParams, rng: &mut StdRng) -> Vec<SyntheticSpot> {
    let max_radius = (params.max_spot_size as f64 / PI).sqrt();
    let margin = (2.0 * max_radius).ceil();
    let (x_hi, y_hi) = (
        params.width as f64 - 1.0 - margin,
        params.height as f64 - 1.0 - margin,
    );
    let mut spots: Vec<SyntheticSpot> = Vec::with_capacity(params.centers);
    if x_hi < margin || y_hi < margin {
        log::warn!("scan too small to hold any spot");
        return spots;
    }

    let min_sep2 = params.min_separation * params.min_separation;
    let mut attempts = params.centers * ATTEMPTS_PER_SPOT;
    while spots.len() < params.centers && attempts > 0 {
        attempts -= 1;
        let x = rng.random_range(margin..=x_hi);
        let y = rng.random_range(margin..=y_hi);
        let crowded = spots.iter().any(|s| {
            let (dx, dy) = (s.x - x, s.y - y);
            dx * dx + dy * dy < min_sep2
        });
        if crowded {
            continue;
        }
        spots.push(SyntheticSpot {
            x,
            y,
            size: rng.random_range(params.min_spot_size..=params.max_spot_size),
            intensity: rng.random_range(params.min_intensity..=params.max_intensity),
        });
    }
    if spots.len() < params.centers {
        log::warn!(
            "placed only {} of {} spots at separation {}",
            spots.len(),
            params.centers,
            params.min_separation
        );
    }
    spots
}

/// Add a Gaussian profile out to twice the spot radius, saturating at 1.
fn draw_spot(data: &mut [f64], w: usize, h: usize, spot: &SyntheticSpot) {
    let r = spot.radius();
    let reach = 2.0 * r;
    let x0 = (spot.x - reach).floor().max(0.0) as usize;
    let y0 = (spot.y - reach).floor().max(0.0) as usize;
    let x1 = ((spot.x + reach).ceil() as usize).min(w);
    let y1 = ((spot.y + reach).ceil() as usize).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let d = (x as f64 - spot.x).hypot(y as f64 - spot.y);
            if d <= reach {
                let v = &mut data[y * w + x];
                *v = (*v + spot.intensity * (-(d / r).powi(2)).exp()).min(1.0);
            }
        }
    }
}
