//! PanoFrame Projection Core
//!
//! Pure computation for turning equirectangular video frames into
//! rectilinear virtual-camera views:
//! - **View layouts:** ring, cube, and fibonacci camera placements
//! - **Reprojection maps:** per-pixel destination-to-source lookup grids
//! - **Sampling:** bilinear remap with horizontal wraparound, unsharp
//!   sharpening, sharpness and motion scoring
//! - **Gates:** the stateful blur and motion filters threaded through the
//!   extraction loop
//!
//! This crate is pure computation — no I/O, no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod gates;
pub mod map;
pub mod sample;
pub mod views;

pub use gates::{BlurDecision, BlurGate, MotionGate};
pub use map::ReprojectionMap;
pub use views::{generate_views, View};
