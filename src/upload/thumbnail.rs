use super::types::{FileId, Preview};
use crate::error::Result;
use image::imageops::FilterType;
use std::collections::{HashSet, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Width of generated previews; height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 256;

pub fn generate_preview(data: &[u8]) -> Result<Preview> {
    let img = image::load_from_memory(data)?;
    let thumbnail = img.resize(THUMBNAIL_WIDTH, u32::MAX, FilterType::Triangle);
    let rgba = thumbnail.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Preview {
        width,
        height,
        pixels: Arc::from(rgba.into_raw()),
    })
}

enum Command {
    Request(FileId, Arc<[u8]>),
    Cancel(FileId),
    Shutdown,
}

type Queued = Arc<Mutex<HashSet<FileId>>>;
type Generate = dyn Fn(&[u8]) -> Result<Preview> + Send;

/// Generates previews one at a time on a background thread.
///
/// A cancelled request is dropped only while it is still queued; a preview
/// that is already being generated is delivered regardless.
pub struct ThumbnailWorker {
    sender: Sender<Command>,
    queued: Queued,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThumbnailWorker {
    pub fn spawn(on_ready: impl Fn(FileId, Preview) + Send + 'static) -> Self {
        Self::spawn_with(Box::new(generate_preview), on_ready)
    }

    fn spawn_with(
        generate: Box<Generate>,
        on_ready: impl Fn(FileId, Preview) + Send + 'static,
    ) -> Self {
        let (sender, receiver) = channel();
        let queued: Queued = Arc::default();
        let worker_queued = Arc::clone(&queued);
        let handle = thread::Builder::new()
            .name("thumbnails".to_string())
            .spawn(move || run(receiver, worker_queued, generate, on_ready))
            .map_err(|e| warn!("Failed to start thumbnail worker: {}", e))
            .ok();

        Self {
            sender,
            queued,
            handle: Mutex::new(handle),
        }
    }

    pub fn request(&self, id: FileId, data: Arc<[u8]>) {
        let inserted = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        if inserted {
            let _ = self.sender.send(Command::Request(id, data));
        }
    }

    pub fn cancel(&self, id: &FileId) {
        let removed = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed {
            let _ = self.sender.send(Command::Cancel(id.clone()));
        }
    }

    pub fn is_queued(&self, id: &FileId) -> bool {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Stops the worker after the preview in progress, if any.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Thumbnail worker panicked");
            }
        }
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn run(
    receiver: Receiver<Command>,
    queued: Queued,
    generate: Box<Generate>,
    on_ready: impl Fn(FileId, Preview),
) {
    let mut queue: VecDeque<(FileId, Arc<[u8]>)> = VecDeque::new();

    'worker: loop {
        if queue.is_empty() {
            match receiver.recv() {
                Ok(command) => {
                    if !apply(command, &mut queue) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        while let Ok(command) = receiver.try_recv() {
            if !apply(command, &mut queue) {
                break 'worker;
            }
        }

        let Some((id, data)) = queue.pop_front() else {
            continue;
        };
        // The queued flag is cleared only after delivery, so a caller that
        // sees it unset also sees the preview.
        match generate(&data) {
            Ok(preview) => {
                debug!(file = %id, width = preview.width, height = preview.height, "Preview ready");
                on_ready(id.clone(), preview);
            }
            Err(e) => warn!(file = %id, "Failed to generate preview: {}", e),
        }
        queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
    debug!("Thumbnail worker stopped");
}

fn apply(command: Command, queue: &mut VecDeque<(FileId, Arc<[u8]>)>) -> bool {
    match command {
        Command::Request(id, data) => {
            if !queue.iter().any(|(queued, _)| queued == &id) {
                queue.push_back((id, data));
            }
        }
        Command::Cancel(id) => queue.retain(|(queued, _)| queued != &id),
        Command::Shutdown => return false,
    }
    true
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    let img = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}
