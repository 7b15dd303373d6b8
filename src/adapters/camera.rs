use crate::core::{CameraProvider, Frame};
use crate::utils::error::{GuideError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Camera backed by image files on disk. A directory is replayed in file name
/// order, wrapping around at the end; a single file is returned on every capture.
#[derive(Debug)]
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
    released: AtomicBool,
}

impl DirectoryCamera {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let frames = if path.is_file() {
            vec![path.to_path_buf()]
        } else if path.is_dir() {
            let mut frames: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            frames.sort();
            frames
        } else {
            return Err(GuideError::CameraUnavailable {
                message: format!("no frame source at {}", path.display()),
            });
        };

        tracing::debug!("Frame source {} has {} images", path.display(), frames.len());

        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl CameraProvider for DirectoryCamera {
    fn is_ready(&self) -> bool {
        !self.frames.is_empty() && !self.released.load(Ordering::Acquire)
    }

    async fn capture(&self) -> Result<Frame> {
        if !self.is_ready() {
            return Err(GuideError::CameraUnavailable {
                message: "frame source is empty or released".to_string(),
            });
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let path = &self.frames[index];
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| GuideError::CaptureError {
                message: format!("{}: {}", path.display(), e),
            })?;

        Ok(Frame::new(data))
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}
