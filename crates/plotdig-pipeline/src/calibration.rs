//! Affine calibration from image space to user space.
//!
//! A user labels contours as [`TICK_LABEL`] and attaches the user-space
//! coordinate they represent (an axis tick, typically). The centroid of
//! each tick is paired with its coordinate, and the affine map
//! `user = M · [x, y, 1]ᵀ` is fitted to the pairs: exactly for three
//! pairs, by least squares for more.

use nalgebra::{DMatrix, Matrix2x3, Vector3};
use thiserror::Error;

use crate::registry::ContourRegistry;
use crate::types::Point;

/// Label that marks a contour as a calibration tick.
pub const TICK_LABEL: &str = "tick";

/// Minimum number of correspondences an affine map needs.
pub const MIN_TICKS: usize = 3;

/// Ratio of smallest to largest singular value below which the
/// correspondences are treated as collinear.
const RANK_TOLERANCE: f64 = 1e-10;

/// Why a calibration could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    /// Fewer than [`MIN_TICKS`] labeled ticks with coordinates.
    #[error("calibration needs at least 3 ticks with coordinates, found {found}")]
    InsufficientTicks {
        /// Usable ticks found.
        found: usize,
    },

    /// Image and user point lists differ in length.
    #[error("{image} image points but {user} user points")]
    LengthMismatch {
        /// Number of image-space points.
        image: usize,
        /// Number of user-space points.
        user: usize,
    },

    /// The image points are collinear (or coincident), so no unique
    /// affine map exists.
    #[error("tick positions are collinear; place ticks on both axes")]
    Singular,
}

/// An affine map from image coordinates to user coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
    matrix: Matrix2x3<f64>,
}

impl AffineMap {
    /// The map that leaves every point unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix2x3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0),
        }
    }

    /// Fit the map sending each `image[i]` to `user[i]`.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::LengthMismatch`] when the slices differ in
    /// length, [`CalibrationError::InsufficientTicks`] for fewer than
    /// three pairs and [`CalibrationError::Singular`] when the image
    /// points do not span the plane.
    pub fn from_correspondences(image: &[Point], user: &[Point]) -> Result<Self, CalibrationError> {
        if image.len() != user.len() {
            return Err(CalibrationError::LengthMismatch {
                image: image.len(),
                user: user.len(),
            });
        }
        let k = image.len();
        if k < MIN_TICKS {
            return Err(CalibrationError::InsufficientTicks { found: k });
        }

        let a = DMatrix::from_fn(k, 3, |r, c| match c {
            0 => image[r].x,
            1 => image[r].y,
            _ => 1.0,
        });
        let b = DMatrix::from_fn(k, 2, |r, c| if c == 0 { user[r].x } else { user[r].y });

        let svd = a.clone().svd(true, true);
        let largest = svd.singular_values.max();
        let smallest = svd.singular_values.min();
        if !largest.is_finite() || largest <= 0.0 || smallest / largest < RANK_TOLERANCE {
            return Err(CalibrationError::Singular);
        }

        // Solution is 3x2: column j holds the coefficients of user axis j.
        let x = if k == MIN_TICKS {
            a.lu().solve(&b).ok_or(CalibrationError::Singular)?
        } else {
            svd.solve(&b, RANK_TOLERANCE * largest)
                .map_err(|_| CalibrationError::Singular)?
        };

        let matrix = Matrix2x3::from_fn(|r, c| x[(c, r)]);
        if matrix.iter().all(|v| v.is_finite()) {
            Ok(Self { matrix })
        } else {
            Err(CalibrationError::Singular)
        }
    }

    /// Fit the map from the registry's tick contours.
    ///
    /// # Errors
    ///
    /// As [`from_correspondences`](Self::from_correspondences).
    pub fn from_ticks(registry: &ContourRegistry) -> Result<Self, CalibrationError> {
        let (image, user) = tick_correspondences(registry);
        if image.len() < MIN_TICKS {
            return Err(CalibrationError::InsufficientTicks { found: image.len() });
        }
        Self::from_correspondences(&image, &user)
    }

    /// Map an image-space point to user space.
    #[must_use]
    pub fn map(&self, p: Point) -> Point {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        Point::new(v[0], v[1])
    }

    /// Row-major coefficients `[[a, b, c], [d, e, f]]` with
    /// `u = a·x + b·y + c` and `v = d·x + e·y + f`.
    #[must_use]
    pub fn coefficients(&self) -> [[f64; 3]; 2] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ]
    }
}

/// `(image, user)` point pairs from every tick contour that has a
/// coordinate, in registry order. The image point is the tick's
/// centroid.
#[must_use]
pub fn tick_correspondences(registry: &ContourRegistry) -> (Vec<Point>, Vec<Point>) {
    registry
        .labeled()
        .filter(|(_, c)| c.label() == TICK_LABEL)
        .filter_map(|(_, c)| Some((c.centroid()?, c.coordinate()?)))
        .unzip()
}
