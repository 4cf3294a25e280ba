//! Reprojection map construction.
//!
//! A [`ReprojectionMap`] is a per-pixel lookup table from a rectilinear
//! destination image to equirectangular source coordinates. It is built once
//! per job and view and reused for every frame of the video, since the
//! camera rig geometry does not change within a clip.

use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;

/// Destination-to-source coordinate grids for bilinear resampling.
#[derive(Debug, Clone)]
pub struct ReprojectionMap {
    /// Source x coordinate per destination pixel, row-major `(dest_h, dest_w)`.
    pub map_x: Array2<f32>,
    /// Source y coordinate per destination pixel, row-major `(dest_h, dest_w)`.
    pub map_y: Array2<f32>,
}

impl ReprojectionMap {
    pub fn dest_width(&self) -> u32 {
        self.map_x.ncols() as u32
    }

    pub fn dest_height(&self) -> u32 {
        self.map_x.nrows() as u32
    }
}

/// Combined rotation `R = Ry(yaw) * Rx(pitch) * Rz(roll)` in a right-handed
/// camera frame: X right, Y down, Z forward.
pub fn rotation_matrix(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Matrix3<f64> {
    let yaw = yaw_deg.to_radians();
    let pitch = pitch_deg.to_radians();
    let roll = roll_deg.to_radians();

    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();

    #[rustfmt::skip]
    let ry = Matrix3::new(
         cy, 0.0,  sy,
        0.0, 1.0, 0.0,
        -sy, 0.0,  cy,
    );
    #[rustfmt::skip]
    let rx = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0,  cp, -sp,
        0.0,  sp,  cp,
    );
    #[rustfmt::skip]
    let rz = Matrix3::new(
         cr, -sr, 0.0,
         sr,  cr, 0.0,
        0.0, 0.0, 1.0,
    );

    ry * rx * rz
}

/// Build the reprojection map for one view.
///
/// The focal length follows from the horizontal field of view:
/// `f = 0.5 * dest_w / tan(0.5 * fov)`. Each destination pixel becomes a ray
/// on the z=1 plane, is rotated into the world frame, and converted to
/// longitude/latitude, which map linearly onto the equirectangular source.
#[allow(clippy::too_many_arguments)]
pub fn build_reprojection_map(
    src_h: u32,
    src_w: u32,
    dest_h: u32,
    dest_w: u32,
    fov_deg: f64,
    yaw_deg: f64,
    pitch_deg: f64,
    roll_deg: f64,
) -> ReprojectionMap {
    let f = 0.5 * dest_w as f64 / (0.5 * fov_deg.to_radians()).tan();
    let cx = dest_w as f64 / 2.0;
    let cy = dest_h as f64 / 2.0;

    let rot = rotation_matrix(yaw_deg, pitch_deg, roll_deg);

    let mut map_x = Array2::<f32>::zeros((dest_h as usize, dest_w as usize));
    let mut map_y = Array2::<f32>::zeros((dest_h as usize, dest_w as usize));

    let two_pi = 2.0 * std::f64::consts::PI;

    for row in 0..dest_h as usize {
        for col in 0..dest_w as usize {
            let ray = Vector3::new(
                (col as f64 - cx) / f,
                (row as f64 - cy) / f,
                1.0,
            );
            let rotated = rot * ray;

            let theta = rotated.x.atan2(rotated.z);
            let norm = rotated.norm();
            // z=1 before rotation, so the ray magnitude never drops below 1
            // (up to rounding in the rotation).
            debug_assert!(norm >= 1.0 - 1e-9);
            let phi = (rotated.y / norm).asin();

            map_x[(row, col)] = ((theta / two_pi + 0.5) * src_w as f64) as f32;
            map_y[(row, col)] = ((phi / std::f64::consts::PI + 0.5) * src_h as f64) as f32;
        }
    }

    ReprojectionMap { map_x, map_y }
}
