//! Virtual camera layout generation.
//!
//! Generation order is deterministic: active-camera subsets select by index
//! into this order, never by name.

use panoframe_common::{PanoframeError, PanoframeResult};
use panoframe_job_model::CameraLayout;

/// One virtual camera orientation. Immutable once generated for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: String,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Valid camera counts for layout generation.
pub const MIN_CAMERAS: u32 = 2;
pub const MAX_CAMERAS: u32 = 36;

/// Generate the ordered view list for `n` cameras.
///
/// - `Ring`: `n` views at `yaw = i*360/n`, constant pitch offset.
/// - `Cube`: always exactly 6 views; the Up/Down poles never tilt.
/// - `Fibonacci`: golden-section spiral over the sphere.
/// - `Adaptive`: ring below 6, cube at 6, fibonacci above.
pub fn generate_views(
    n: u32,
    pitch_offset_deg: f64,
    layout: CameraLayout,
) -> PanoframeResult<Vec<View>> {
    if !(MIN_CAMERAS..=MAX_CAMERAS).contains(&n) {
        return Err(PanoframeError::geometry(format!(
            "Camera count {n} outside supported range {MIN_CAMERAS}-{MAX_CAMERAS}"
        )));
    }

    let views = match layout {
        CameraLayout::Ring => ring_views(n, pitch_offset_deg),
        CameraLayout::Cube => cube_views(pitch_offset_deg),
        CameraLayout::Fibonacci => fibonacci_views(n, pitch_offset_deg),
        CameraLayout::Adaptive => {
            if n < 6 {
                ring_views(n, pitch_offset_deg)
            } else if n == 6 {
                cube_views(pitch_offset_deg)
            } else {
                fibonacci_views(n, pitch_offset_deg)
            }
        }
    };

    Ok(views)
}

fn ring_views(n: u32, pitch_offset_deg: f64) -> Vec<View> {
    (0..n)
        .map(|i| View {
            name: format!("View_{i}"),
            yaw_deg: (i as f64) * 360.0 / (n as f64),
            pitch_deg: pitch_offset_deg,
            roll_deg: 0.0,
        })
        .collect()
}

fn cube_views(pitch_offset_deg: f64) -> Vec<View> {
    let face = |name: &str, yaw: f64, pitch: f64| View {
        name: name.to_string(),
        yaw_deg: yaw,
        pitch_deg: pitch,
        roll_deg: 0.0,
    };
    vec![
        face("Front", 0.0, pitch_offset_deg),
        face("Right", 90.0, pitch_offset_deg),
        face("Back", 180.0, pitch_offset_deg),
        face("Left", 270.0, pitch_offset_deg),
        // Poles stay fixed; tilting them would just rotate the image in-plane.
        face("Up", 0.0, 90.0),
        face("Down", 0.0, -90.0),
    ]
}

fn fibonacci_views(n: u32, pitch_offset_deg: f64) -> Vec<View> {
    (0..n)
        .map(|i| {
            let (x, y, z) = fibonacci_point(i as usize, n as usize);
            let pitch_deg = y.asin().to_degrees();
            let yaw_deg = x.atan2(z).to_degrees().rem_euclid(360.0);
            View {
                name: format!("View_{i}"),
                yaw_deg,
                pitch_deg: pitch_deg + pitch_offset_deg,
                roll_deg: 0.0,
            }
        })
        .collect()
}

/// Point `i` of `n` on the golden-section spiral over the unit sphere.
pub fn fibonacci_point(i: usize, n: usize) -> (f64, f64, f64) {
    let step = 2.0 / n as f64;
    let y = 1.0 - (i as f64 + 0.5) * step;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = i as f64 * std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (phi.cos() * r, y, phi.sin() * r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ring_six_cameras() {
        let views = generate_views(6, 0.0, CameraLayout::Ring).unwrap();
        assert_eq!(views.len(), 6);
        let yaws: Vec<f64> = views.iter().map(|v| v.yaw_deg).collect();
        assert_eq!(yaws, vec![0.0, 60.0, 120.0, 180.0, 240.0, 300.0]);
    }

    #[test]
    fn test_ring_applies_pitch_offset() {
        let views = generate_views(4, -20.0, CameraLayout::Ring).unwrap();
        assert!(views.iter().all(|v| v.pitch_deg == -20.0));
        assert!(views.iter().all(|v| v.roll_deg == 0.0));
    }

    #[test]
    fn test_cube_ignores_camera_count() {
        let views = generate_views(12, -20.0, CameraLayout::Cube).unwrap();
        assert_eq!(views.len(), 6);
        let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Front", "Right", "Back", "Left", "Up", "Down"]);
    }

    #[test]
    fn test_cube_poles_never_tilt() {
        let views = generate_views(6, -20.0, CameraLayout::Cube).unwrap();
        let up = views.iter().find(|v| v.name == "Up").unwrap();
        let down = views.iter().find(|v| v.name == "Down").unwrap();
        assert_eq!(up.pitch_deg, 90.0);
        assert_eq!(down.pitch_deg, -90.0);
        let front = views.iter().find(|v| v.name == "Front").unwrap();
        assert_eq!(front.pitch_deg, -20.0);
    }

    #[test]
    fn test_fibonacci_count_and_yaw_range() {
        for n in [7u32, 8, 16, 36] {
            let views = generate_views(n, 0.0, CameraLayout::Fibonacci).unwrap();
            assert_eq!(views.len(), n as usize);
            assert!(views
                .iter()
                .all(|v| (0.0..360.0).contains(&v.yaw_deg)));
        }
    }

    #[test]
    fn test_adaptive_dispatch() {
        assert_eq!(
            generate_views(4, 0.0, CameraLayout::Adaptive).unwrap().len(),
            4
        );
        let six = generate_views(6, 0.0, CameraLayout::Adaptive).unwrap();
        assert_eq!(six[0].name, "Front");
        assert_eq!(
            generate_views(9, 0.0, CameraLayout::Adaptive).unwrap().len(),
            9
        );
    }

    #[test]
    fn test_camera_count_bounds() {
        assert!(generate_views(1, 0.0, CameraLayout::Ring).is_err());
        assert!(generate_views(37, 0.0, CameraLayout::Ring).is_err());
    }

    #[test]
    fn test_fibonacci_points_spread_over_octants() {
        // 1000 spiral points should land in every octant in roughly equal
        // numbers; strong clustering would skew the histogram badly.
        let n = 1000;
        let mut counts = [0usize; 8];
        for i in 0..n {
            let (x, y, z) = fibonacci_point(i, n);
            let octant =
                ((x >= 0.0) as usize) | (((y >= 0.0) as usize) << 1) | (((z >= 0.0) as usize) << 2);
            counts[octant] += 1;
        }
        for count in counts {
            assert!((75..=175).contains(&count), "octant count {count} out of range");
        }
    }

    proptest! {
        #[test]
        fn prop_ring_yaws_exact(n in 2u32..=36) {
            let views = generate_views(n, 0.0, CameraLayout::Ring).unwrap();
            prop_assert_eq!(views.len(), n as usize);
            for (i, view) in views.iter().enumerate() {
                prop_assert_eq!(view.yaw_deg, (i as f64) * 360.0 / (n as f64));
            }
        }

        #[test]
        fn prop_fibonacci_points_on_unit_sphere(i in 0usize..36, n in 7usize..=36) {
            prop_assume!(i < n);
            let (x, y, z) = fibonacci_point(i, n);
            let norm = (x * x + y * y + z * z).sqrt();
            prop_assert!((norm - 1.0).abs() < 1e-9);
        }
    }
}
