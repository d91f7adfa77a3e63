//! Connected-component labeling of binary masks.
//!
//! Labels are assigned in row-major first-touch order starting at 1. Each
//! component is grown with an iterative flood fill over an explicit stack,
//! so arbitrarily large regions never recurse.

use nvision_core::{try_alloc, AllocError, Mask};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Pixel adjacency rule used when growing regions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Orthogonal neighbours only.
    #[default]
    Four,
    /// Orthogonal and diagonal neighbours.
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub x: usize,
    pub y: usize,
}

/// Inclusive pixel bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl PixelBox {
    /// `true` if the real point `(x, y)` lies inside the box (edges included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x as f64
            && x <= self.max_x as f64
            && y >= self.min_y as f64
            && y <= self.max_y as f64
    }
}

/// One connected component, pixels listed in row-major order.
#[derive(Clone, Debug)]
pub struct Region {
    pub label: usize,
    pub pixels: Vec<Pixel>,
}

impl Region {
    /// Pixel count.
    #[inline]
    pub fn size(&self) -> usize {
        self.pixels.len()
    }

    /// Uniform-weight centroid `(x, y)`.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.pixels.len() as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        (sx / n, sy / n)
    }

    pub fn bounding_box(&self) -> PixelBox {
        let mut bbox = PixelBox {
            min_x: usize::MAX,
            min_y: usize::MAX,
            max_x: 0,
            max_y: 0,
        };
        for p in &self.pixels {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        bbox
    }
}

/// Per-pixel component labels (`0` = background).
#[derive(Clone, Debug)]
pub struct Labeling {
    width: usize,
    height: usize,
    labels: Vec<usize>,
    count: usize,
}

impl Labeling {
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of components.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Row-major labels.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.labels
    }

    /// Label at `(x, y)`; `None` for background or out-of-range pixels.
    pub fn label_at(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match self.labels[y * self.width + x] {
            0 => None,
            l => Some(l),
        }
    }

    /// Gather the pixels of every component, ordered by label.
    pub fn regions(&self) -> Result<Vec<Region>, AllocError> {
        let mut sizes = try_alloc(self.count, 0usize)?;
        for &l in self.labels.iter().filter(|&&l| l != 0) {
            sizes[l - 1] += 1;
        }

        let mut regions = Vec::new();
        regions
            .try_reserve_exact(self.count)
            .map_err(|_| AllocError {
                bytes: self.count.saturating_mul(std::mem::size_of::<Region>()),
            })?;
        for (i, &size) in sizes.iter().enumerate() {
            let mut pixels = Vec::new();
            pixels.try_reserve_exact(size).map_err(|_| AllocError {
                bytes: size.saturating_mul(std::mem::size_of::<Pixel>()),
            })?;
            regions.push(Region { label: i + 1, pixels });
        }

        for (idx, &l) in self.labels.iter().enumerate() {
            if l != 0 {
                regions[l - 1].pixels.push(Pixel {
                    x: idx % self.width,
                    y: idx / self.width,
                });
            }
        }
        Ok(regions)
    }
}

/// Label the connected components of `mask`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(mask), fields(width = mask.width(), height = mask.height()))
)]
pub fn label_components(mask: &Mask, connectivity: Connectivity) -> Result<Labeling, AllocError> {
    let (w, h) = (mask.width(), mask.height());
    let set = mask.as_slice();
    let mut labels = try_alloc(set.len(), 0usize)?;

    // Every pixel is pushed at most once, so the stack never outgrows the set count.
    let mut stack: Vec<usize> = Vec::new();
    let foreground = mask.count();
    stack.try_reserve_exact(foreground).map_err(|_| AllocError {
        bytes: foreground.saturating_mul(std::mem::size_of::<usize>()),
    })?;

    let offsets = connectivity.offsets();
    let mut count = 0;
    for seed in 0..set.len() {
        if !set[seed] || labels[seed] != 0 {
            continue;
        }
        count += 1;
        labels[seed] = count;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let (x, y) = ((idx % w) as isize, (idx / w) as isize);
            for &(dx, dy) in offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let n = ny as usize * w + nx as usize;
                if set[n] && labels[n] == 0 {
                    labels[n] = count;
                    stack.push(n);
                }
            }
        }
    }

    log::trace!("labeled {count} components over {foreground} foreground pixels");
    Ok(Labeling {
        width: w,
        height: h,
        labels,
        count,
    })
}
