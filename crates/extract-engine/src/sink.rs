//! The output sink seam and its filesystem implementation.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use panoframe_common::error::{PanoframeError, PanoframeResult};
use panoframe_job_model::OutputFormat;
use panoframe_telemetry::GpsExifTags;
use serde::Serialize;

/// Where extracted views, masks and geotags end up.
///
/// The engine computes names and formats; the sink owns the encoding
/// mechanics. Implementations must tolerate `embed_gps` for a path they
/// wrote earlier in the same job.
pub trait OutputSink: Send + Sync {
    fn write_image(
        &self,
        path: &Path,
        image: &RgbImage,
        format: &OutputFormat,
    ) -> PanoframeResult<()>;

    /// Single-channel mask: 0 = subject, 255 = background.
    fn write_mask(&self, path: &Path, mask: &GrayImage) -> PanoframeResult<()>;

    /// Attach a GPS position to an already-written image.
    fn embed_gps(&self, image_path: &Path, tags: &GpsExifTags) -> PanoframeResult<()>;
}

/// Sink writing images to the local filesystem with the `image` crate.
///
/// Geotags are persisted as a JSON sidecar next to each image; embedding
/// EXIF bytes into the codec stream is left to sinks backed by a metadata
/// writer.
#[derive(Debug, Default)]
pub struct FsOutputSink;

impl FsOutputSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for FsOutputSink {
    fn write_image(
        &self,
        path: &Path,
        image: &RgbImage,
        format: &OutputFormat,
    ) -> PanoframeResult<()> {
        match format {
            OutputFormat::Jpg { quality } => {
                let file = File::create(path)
                    .map_err(|e| PanoframeError::output(format!("Cannot create {path:?}: {e}")))?;
                let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), *quality);
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| PanoframeError::output(format!("JPEG encode failed: {e}")))?;
            }
            OutputFormat::Png | OutputFormat::Tiff => {
                // Codec selection follows the path's extension.
                image
                    .save(path)
                    .map_err(|e| PanoframeError::output(format!("Cannot write {path:?}: {e}")))?;
            }
        }
        Ok(())
    }

    fn write_mask(&self, path: &Path, mask: &GrayImage) -> PanoframeResult<()> {
        mask.save(path)
            .map_err(|e| PanoframeError::output(format!("Cannot write mask {path:?}: {e}")))
    }

    fn embed_gps(&self, image_path: &Path, tags: &GpsExifTags) -> PanoframeResult<()> {
        let sidecar = GeoSidecar::from_tags(tags);
        let mut path = image_path.as_os_str().to_owned();
        path.push(".geo.json");

        let json = serde_json::to_string_pretty(&sidecar)?;
        std::fs::write(&path, json)
            .map_err(|e| PanoframeError::output(format!("Cannot write geotag {path:?}: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct GeoSidecar {
    latitude: f64,
    latitude_ref: char,
    longitude: f64,
    longitude_ref: char,
    altitude: f64,
    altitude_ref: u8,
}

impl GeoSidecar {
    fn from_tags(tags: &GpsExifTags) -> Self {
        Self {
            latitude: dms_degrees(&tags.latitude),
            latitude_ref: tags.latitude_ref,
            longitude: dms_degrees(&tags.longitude),
            longitude_ref: tags.longitude_ref,
            altitude: tags.altitude.to_f64(),
            altitude_ref: tags.altitude_ref,
        }
    }
}

fn dms_degrees(dms: &[panoframe_telemetry::exif::Rational; 3]) -> f64 {
    dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use panoframe_telemetry::GpsFix;

    fn test_image() -> RgbImage {
        RgbImage::from_pixel(16, 16, Rgb([120, 60, 30]))
    }

    #[test]
    fn test_write_jpg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.jpg");
        FsOutputSink::new()
            .write_image(&path, &test_image(), &OutputFormat::Jpg { quality: 90 })
            .unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }

    #[test]
    fn test_write_png_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsOutputSink::new();

        let path = dir.path().join("view.png");
        sink.write_image(&path, &test_image(), &OutputFormat::Png)
            .unwrap();

        let mask_path = dir.path().join("view.mask.png");
        let mask = GrayImage::from_pixel(16, 16, image::Luma([255]));
        sink.write_mask(&mask_path, &mask).unwrap();

        assert!(path.exists());
        assert!(mask_path.exists());
    }

    #[test]
    fn test_embed_gps_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.jpg");
        std::fs::write(&path, b"stub").unwrap();

        let tags = GpsExifTags::from_fix(GpsFix {
            lat: 48.8566,
            lon: 2.3522,
            alt: 35.0,
        });
        FsOutputSink::new().embed_gps(&path, &tags).unwrap();

        let sidecar = dir.path().join("view.jpg.geo.json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
        assert!((json["latitude"].as_f64().unwrap() - 48.8566).abs() < 1e-6);
        assert_eq!(json["latitude_ref"], "N");
    }

    #[test]
    fn test_write_image_to_missing_dir_fails() {
        let err = FsOutputSink::new()
            .write_image(
                Path::new("/nonexistent/dir/view.jpg"),
                &test_image(),
                &OutputFormat::Jpg { quality: 90 },
            )
            .unwrap_err();
        assert!(err.to_string().contains("Cannot create"));
    }
}
