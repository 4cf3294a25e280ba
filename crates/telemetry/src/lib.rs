//! PanoFrame Telemetry
//!
//! Recovers a normalized, time-ordered GPS track from whatever telemetry a
//! 360° video carries: a GPX sidecar file, an embedded GPMF or CAMM binary
//! stream, or DJI-style subtitle telemetry. Binary decoders are defensive:
//! corrupt records trigger a resynchronization scan and partial results are
//! returned rather than errors.
//!
//! Container demuxing is the caller's job; streams arrive through the
//! [`TelemetryProbe`] trait.

pub mod camm;
pub mod exif;
pub mod gpmf;
pub mod gpx;
pub mod srt;
pub mod track;

pub use exif::GpsExifTags;
pub use track::{GpsFix, GpsSample, TelemetryProbe, TelemetrySource, TelemetryTrack};
