use std::path::PathBuf;

use anyhow::{anyhow, Result};
use image::{ImageFormat, Rgb, RgbImage};

use super::{AnnotatedFrame, Sink};
use crate::geometry::BBox;
use crate::metrics::{MetricsHistory, MetricsSample};

const SNAPSHOT_NAME: &str = "latest.jpg";

/// Draws box outlines onto the frame and writes `latest.jpg` into a directory
/// every `every` rendered frames.
pub struct JpegSnapshotSink {
    dir: PathBuf,
    every: u64,
    rendered: u64,
}

impl JpegSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("snapshot dir {}: {}", dir.display(), e))?;
        Ok(Self {
            dir,
            every: every.max(1),
            rendered: 0,
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_NAME)
    }
}

fn draw_outline(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |x: i32| i64::from(x).clamp(0, w - 1) as u32;
    let clamp_y = |y: i32| i64::from(y).clamp(0, h - 1) as u32;
    let (x1, x2) = (clamp_x(bbox.x1), clamp_x(bbox.x2));
    let (y1, y2) = (clamp_y(bbox.y1), clamp_y(bbox.y2));

    for x in x1..=x2 {
        image.put_pixel(x, y1, color);
        image.put_pixel(x, y2, color);
    }
    for y in y1..=y2 {
        image.put_pixel(x1, y, color);
        image.put_pixel(x2, y, color);
    }
}

impl Sink for JpegSnapshotSink {
    fn render(&mut self, frame: &AnnotatedFrame<'_>) -> Result<()> {
        self.rendered += 1;
        if self.rendered % self.every != 0 {
            return Ok(());
        }
        let mut image = frame.frame.to_rgb_image()?;
        for annotation in frame.annotations {
            if let Some(bbox) = &annotation.bbox {
                draw_outline(&mut image, bbox, Rgb(annotation.style.rgb()));
            }
        }
        let path = self.snapshot_path();
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| anyhow!("snapshot write {}: {}", path.display(), e))?;
        log::debug!(
            "frame {}: snapshot written to {}",
            frame.frame.frame_index,
            path.display()
        );
        Ok(())
    }

    fn report_kpis(&mut self, _sample: &MetricsSample) -> Result<()> {
        Ok(())
    }

    fn report_trend(&mut self, _history: &MetricsHistory) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{Annotation, AnnotationStyle};
    use crate::frame::RawFrame;

    #[test]
    fn writes_snapshot_with_clamped_outlines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = JpegSnapshotSink::new(dir.path().join("snaps"), 1)?;
        let frame = RawFrame::blank(1, 64, 48).unwrap();
        let annotations = vec![Annotation {
            bbox: Some(BBox::new(-10, 5, 200, 40)),
            label: "FIRE".to_string(),
            anchor: (-10, -5),
            style: AnnotationStyle::Hazard,
        }];
        sink.render(&AnnotatedFrame {
            frame: &frame,
            annotations: &annotations,
        })?;
        assert!(sink.snapshot_path().exists());
        Ok(())
    }
}
