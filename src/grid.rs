use crate::error::{RemError, RemResult};
use rem_common::{GridSpec, RemPoint, Vec3};

/// Produces the ordered sample points of a validated grid.
/// x is the outer axis, y the inner one; both bounds are inclusive.
#[derive(Debug, Clone)]
pub struct GridSampler {
    spec: GridSpec,
    x_step: f64,
    y_step: f64,
}

impl GridSampler {
    pub fn new(spec: GridSpec) -> RemResult<Self> {
        validate(&spec)?;
        Ok(GridSampler {
            spec,
            x_step: spec.x_step(),
            y_step: spec.y_step(),
        })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Number of points along y, i.e. the stride of the x axis.
    #[inline(always)]
    fn y_count(&self) -> usize {
        self.spec.y_res as usize + 1
    }

    pub fn len(&self) -> usize {
        self.spec.num_points()
    }

    pub fn is_empty(&self) -> bool {
        false // A valid grid holds at least four points
    }

    /// Point at a row-major index. Panics if `idx >= len()`.
    #[inline(always)]
    pub fn point_at(&self, idx: usize) -> RemPoint {
        assert!(idx < self.len(), "grid index {} out of range", idx);
        let ix = idx / self.y_count();
        let iy = idx % self.y_count();
        let x = axis_coord(self.spec.x_min, self.spec.x_max, self.x_step, ix, self.spec.x_res as usize);
        let y = axis_coord(self.spec.y_min, self.spec.y_max, self.y_step, iy, self.spec.y_res as usize);
        RemPoint::at(Vec3::new(x, y, self.spec.z))
    }

    /// Lazy, restartable sequence of all points.
    pub fn points(&self) -> GridPoints<'_> {
        GridPoints { sampler: self, next: 0 }
    }
}

/// Generates the full, ordered point list for a grid spec.
pub fn generate_points(spec: &GridSpec) -> RemResult<Vec<RemPoint>> {
    Ok(GridSampler::new(*spec)?.points().collect())
}

pub struct GridPoints<'a> {
    sampler: &'a GridSampler,
    next: usize,
}

impl Iterator for GridPoints<'_> {
    type Item = RemPoint;

    fn next(&mut self) -> Option<RemPoint> {
        if self.next >= self.sampler.len() {
            return None;
        }
        let point = self.sampler.point_at(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sampler.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridPoints<'_> {}

// Index i along an axis; the last index lands exactly on max.
#[inline(always)]
fn axis_coord(min: f64, max: f64, step: f64, i: usize, res: usize) -> f64 {
    if i >= res { max } else { min + i as f64 * step }
}

fn validate(spec: &GridSpec) -> RemResult<()> {
    let bounds = [spec.x_min, spec.x_max, spec.y_min, spec.y_max, spec.z];
    if bounds.iter().any(|v| !v.is_finite()) {
        return Err(RemError::grid("bounds and height must be finite"));
    }
    if spec.x_res == 0 || spec.y_res == 0 {
        return Err(RemError::grid(format!(
            "resolution must be at least 1 (x_res={}, y_res={})",
            spec.x_res, spec.y_res
        )));
    }
    if spec.x_max <= spec.x_min {
        return Err(RemError::grid(format!("x_max ({}) must exceed x_min ({})", spec.x_max, spec.x_min)));
    }
    if spec.y_max <= spec.y_min {
        return Err(RemError::grid(format!("y_max ({}) must exceed y_min ({})", spec.y_max, spec.y_min)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spec(x_res: u16, y_res: u16) -> GridSpec {
        GridSpec { x_min: -100.0, x_max: 100.0, x_res, y_min: -50.0, y_max: 150.0, y_res, z: 1.5 }
    }

    #[test]
    fn test_unit_resolution_yields_corners() {
        let points = generate_points(&spec(1, 1)).unwrap();
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.pos.x, p.pos.y)).collect();
        assert_eq!(coords, vec![(-100.0, -50.0), (-100.0, 150.0), (100.0, -50.0), (100.0, 150.0)]);
        assert!(points.iter().all(|p| p.pos.z == 1.5));
    }

    #[test]
    fn test_nine_point_grid() {
        let points = generate_points(&GridSpec {
            x_min: -100.0, x_max: 100.0, x_res: 2, y_min: -100.0, y_max: 100.0, y_res: 2, z: 1.5,
        })
        .unwrap();
        assert_eq!(points.len(), 9);
        assert_eq!(points[4].pos, Vec3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_rejects_invalid_specs() {
        assert!(matches!(GridSampler::new(spec(0, 3)), Err(RemError::InvalidGridSpec { .. })));
        assert!(matches!(GridSampler::new(spec(3, 0)), Err(RemError::InvalidGridSpec { .. })));
        let mut flipped = spec(2, 2);
        flipped.x_max = flipped.x_min;
        assert!(matches!(GridSampler::new(flipped), Err(RemError::InvalidGridSpec { .. })));
        let mut nan = spec(2, 2);
        nan.y_min = f64::NAN;
        assert!(GridSampler::new(nan).is_err());
    }

    #[test]
    fn test_points_are_restartable() {
        let sampler = GridSampler::new(spec(3, 4)).unwrap();
        let first: Vec<RemPoint> = sampler.points().collect();
        let second: Vec<RemPoint> = sampler.points().collect();
        assert_eq!(first, second);
        assert_eq!(sampler.points().len(), 20);
    }

    proptest! {
        #[test]
        fn prop_axis_has_res_plus_one_even_samples(x_res in 1u16..40, y_res in 1u16..40, x_min in -500.0f64..0.0, width in 1.0f64..1000.0) {
            let spec = GridSpec { x_min, x_max: x_min + width, x_res, y_min: 0.0, y_max: 10.0, y_res, z: 3.0 };
            let points = generate_points(&spec).unwrap();
            prop_assert_eq!(points.len(), (x_res as usize + 1) * (y_res as usize + 1));

            // Row-major: x changes every (y_res + 1) points
            let stride = y_res as usize + 1;
            let xs: Vec<f64> = points.iter().step_by(stride).map(|p| p.pos.x).collect();
            prop_assert_eq!(xs.len(), x_res as usize + 1);
            prop_assert_eq!(xs[0], spec.x_min);
            prop_assert_eq!(*xs.last().unwrap(), spec.x_max);
            let step = spec.x_step();
            for pair in xs.windows(2) {
                prop_assert!((pair[1] - pair[0] - step).abs() < 1e-9 * width.max(1.0));
            }
            for row in points.chunks(stride) {
                prop_assert!(row.iter().all(|p| p.pos.x == row[0].pos.x));
                prop_assert_eq!(row[0].pos.y, spec.y_min);
                prop_assert_eq!(row[stride - 1].pos.y, spec.y_max);
            }
        }
    }
}
