use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::error::{Error, Result};

use super::base::RgbFrame;

/// Collects rendered frames for one episode and encodes them as an
/// animated GIF when closed.
pub struct VideoRecorder {
    path: PathBuf,
    frame_delay_ms: u32,
    frames: Vec<RgbFrame>,
}

impl VideoRecorder {
    pub fn new(path: PathBuf, frame_delay_ms: u32) -> Self {
        Self {
            path,
            frame_delay_ms,
            frames: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capture_frame(&mut self, frame: RgbFrame) {
        self.frames.push(frame);
    }

    /// Writes the GIF. Returns `None` when no frames were captured.
    pub fn close(self) -> Result<Option<PathBuf>> {
        let Some(first) = self.frames.first() else {
            tracing::warn!("no frames captured for {:?}, skipping video", self.path);
            return Ok(None);
        };
        let (w, h) = (first.width, first.height);

        if let Some(bad) = self.frames.iter().find(|f| (f.width, f.height) != (w, h)) {
            return Err(Error::Video(format!(
                "frame size changed mid-episode: {}x{} then {}x{}",
                w, h, bad.width, bad.height
            )));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let video_err = |e: &dyn std::fmt::Debug| Error::Video(format!("{:?}: {e:?}", self.path));

        let mut backend =
            BitMapBackend::gif(&self.path, (w, h), self.frame_delay_ms).map_err(|e| video_err(&e))?;

        for frame in &self.frames {
            backend
                .blit_bitmap((0, 0), (w, h), &frame.data)
                .map_err(|e| video_err(&e))?;
            backend.present().map_err(|e| video_err(&e))?;
        }
        drop(backend);

        tracing::info!(
            "saved video with {} frames to {:?}",
            self.frames.len(),
            self.path
        );

        Ok(Some(self.path))
    }
}

#[cfg(test)]
mod test {
    use crate::env::base::RgbFrame;

    use super::VideoRecorder;

    fn frame(w: u32, h: u32, v: u8) -> RgbFrame {
        RgbFrame {
            width: w,
            height: h,
            data: vec![v; (w * h * 3) as usize],
        }
    }

    #[test]
    fn writes_gif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");

        let mut rec = VideoRecorder::new(path.clone(), 50);
        for v in [0, 128, 255] {
            rec.capture_frame(frame(8, 6, v));
        }
        assert_eq!(rec.len(), 3);

        let written = rec.close().unwrap();
        assert_eq!(written, Some(path.clone()));

        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..3], b"GIF");
    }

    #[test]
    fn empty_recorder_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gif");

        let rec = VideoRecorder::new(path.clone(), 50);
        assert_eq!(rec.close().unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn mismatched_frames_error() {
        let dir = tempfile::tempdir().unwrap();

        let mut rec = VideoRecorder::new(dir.path().join("bad.gif"), 50);
        rec.capture_frame(frame(8, 6, 0));
        rec.capture_frame(frame(6, 8, 0));

        assert!(rec.close().is_err());
    }
}
