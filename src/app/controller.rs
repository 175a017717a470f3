use crate::config::{AppConfig, UploadMode};
use crate::error::{Result, UploadError};
use crate::layout::masonry::CARD_PADDING;
use crate::layout::{
    ElementRef, MasonryCache, MasonryConfig, MasonryItem, MasonryLayout, PaginationController,
    VisibilityTracker,
};
use crate::settings::{CloudCredentials, SettingsStore};
use crate::upload::{
    AggregatedStatus, BatchId, FileId, ManagedFile, Meta, NewFile, Restrictions, UploadManager,
    UploadProgress, UploadSnapshot, UploadTarget, META_RELATIVE_PATH, META_THUMBNAIL_HEIGHT,
};
use ignore::Walk;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A file that did not make it into the upload set, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionNotice {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(BatchId),
    /// Cloudinary details are missing; the credentials prompt was opened.
    NeedsCredentials,
    Failed(UploadError),
}

/// Everything the window does, minus the drawing.
pub struct UploadController<M: UploadManager> {
    manager: M,
    receiver: Receiver<Arc<UploadSnapshot>>,
    snapshot: Option<Arc<UploadSnapshot>>,
    pagination: PaginationController,
    cards: VisibilityTracker<FileId>,
    sentinel: VisibilityTracker<()>,
    next_element: u64,
    masonry: MasonryConfig,
    cache: MasonryCache,
    restrictions: Restrictions,
    mode: UploadMode,
    local_endpoint: String,
    settings: Box<dyn SettingsStore>,
    credentials: CloudCredentials,
    credentials_open: bool,
    notices: Vec<RejectionNotice>,
    start_error: Option<String>,
    torn_down: bool,
}

impl<M: UploadManager> UploadController<M> {
    pub fn new(manager: M, config: &AppConfig, settings: Box<dyn SettingsStore>) -> Self {
        let receiver = manager.subscribe();
        let snapshot = manager.snapshot();
        let total = snapshot.as_ref().map_or(0, |s| s.file_count());
        let credentials = CloudCredentials::load(settings.as_ref());
        let credentials_open = config.mode == UploadMode::Cloudinary && !credentials.is_complete();
        if credentials_open {
            info!("Cloudinary details missing, prompting");
        }

        let mut controller = Self {
            manager,
            receiver,
            snapshot,
            pagination: PaginationController::new(config.page_size, total),
            cards: VisibilityTracker::default(),
            sentinel: VisibilityTracker::default(),
            next_element: 0,
            masonry: MasonryConfig::default(),
            cache: MasonryCache::default(),
            restrictions: config.restrictions(),
            mode: config.mode,
            local_endpoint: config.local_endpoint.clone(),
            settings,
            credentials,
            credentials_open,
            notices: Vec::new(),
            start_error: None,
            torn_down: false,
        };
        controller.track_elements();
        controller
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    fn next_element(&mut self) -> ElementRef {
        self.next_element += 1;
        ElementRef(self.next_element)
    }

    /// Takes the newest snapshot, if any arrived. Returns whether it changed.
    pub fn sync(&mut self) -> bool {
        let Some(latest) = self.receiver.try_iter().last() else {
            return false;
        };
        self.pagination.sync_total(latest.file_count());
        self.snapshot = Some(latest);
        self.persist_thumbnail_heights();
        self.track_elements();
        true
    }

    /// Records the drawn height of every newly measured preview on its file.
    fn persist_thumbnail_heights(&self) {
        let Some(snapshot) = self.snapshot.as_deref() else {
            return;
        };
        let content_width = self.masonry.item_width - 2.0 * CARD_PADDING;
        for file in snapshot.files() {
            let Some(preview) = &file.preview else {
                continue;
            };
            let height = preview.scaled_height(content_width);
            if file.thumbnail_height() != Some(height) {
                let mut meta = Meta::new();
                meta.insert(META_THUMBNAIL_HEIGHT.to_string(), json!(height));
                self.manager.set_file_meta(&file.id, meta);
            }
        }
    }

    /// Observes cards of the visible slice that still need a preview, and
    /// keeps the sentinel attached only while there is a next page.
    fn track_elements(&mut self) {
        let pending: Vec<(FileId, bool)> = self
            .visible_files()
            .iter()
            .map(|f| (f.id.clone(), f.preview.is_some()))
            .collect();
        for (id, has_preview) in pending {
            if has_preview {
                self.cards.unobserve(&id);
            } else if !self.cards.is_observing(&id) {
                let element = self.next_element();
                self.cards.observe(element, id);
            }
        }

        let live = self.snapshot.clone();
        self.cards
            .retain(|id| live.as_ref().is_some_and(|s| s.contains(id)));

        if self.pagination.has_next_page() {
            if !self.sentinel.is_observing(&()) {
                let element = self.next_element();
                self.sentinel.observe(element, ());
            }
        } else {
            self.sentinel.unobserve(&());
        }
    }

    pub fn snapshot(&self) -> Option<&UploadSnapshot> {
        self.snapshot.as_deref()
    }

    pub fn shared_snapshot(&self) -> Option<Arc<UploadSnapshot>> {
        self.snapshot.clone()
    }

    pub fn status(&self) -> AggregatedStatus {
        AggregatedStatus::derive(self.snapshot())
    }

    pub fn progress(&self) -> UploadProgress {
        UploadProgress::derive(self.snapshot())
    }

    pub fn file_count(&self) -> usize {
        self.snapshot().map_or(0, |s| s.file_count())
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    /// The first `limit` files in insertion order.
    pub fn visible_files(&self) -> &[ManagedFile] {
        match self.snapshot() {
            Some(snapshot) => {
                let files = snapshot.files();
                let shown = self.pagination.visible_range();
                &files[shown.start.min(files.len())..shown.end.min(files.len())]
            }
            None => &[],
        }
    }

    pub fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }

    pub fn masonry(&self) -> &MasonryConfig {
        &self.masonry
    }

    pub fn layout(&mut self, container_width: f32) -> MasonryLayout {
        let columns = self.masonry.columns_for(container_width);
        let items: Vec<MasonryItem> = self
            .visible_files()
            .iter()
            .map(|f| MasonryItem {
                id: f.id.clone(),
                height: f.thumbnail_height(),
            })
            .collect();
        self.cache.layout(&self.masonry, items, columns).clone()
    }

    pub fn is_observing_card(&self, id: &FileId) -> bool {
        self.cards.is_observing(id)
    }

    pub fn report_card(&mut self, id: &FileId, visible: bool, now: Instant) {
        self.cards.report(id, visible, now);
    }

    pub fn is_observing_sentinel(&self) -> bool {
        self.sentinel.is_observing(&())
    }

    pub fn report_sentinel(&mut self, visible: bool, now: Instant) {
        self.sentinel.report(&(), visible, now);
    }

    /// Whether a debounced visibility change is still waiting to fire.
    pub fn has_pending_visibility(&self) -> bool {
        self.cards.has_pending() || self.sentinel.has_pending()
    }

    /// Whether a preview for the visible slice is waiting to be generated.
    pub fn has_queued_thumbnails(&self) -> bool {
        self.visible_files()
            .iter()
            .any(|f| self.manager.is_thumbnail_queued(&f.id))
    }

    /// Applies settled visibility changes: thumbnail requests for cards and
    /// page growth for the sentinel.
    pub fn tick(&mut self, now: Instant) {
        for change in self.cards.poll(now) {
            let has_preview = self
                .snapshot()
                .and_then(|s| s.file(&change.id))
                .is_some_and(|f| f.preview.is_some());
            if has_preview {
                self.cards.unobserve(&change.id);
            } else if change.visible {
                if !self.manager.is_thumbnail_queued(&change.id) {
                    self.manager.request_thumbnail(&change.id);
                }
            } else {
                self.manager.cancel_thumbnail(&change.id);
            }
        }

        let grow = self.sentinel.poll(now).iter().any(|change| change.visible);
        if grow {
            self.pagination.load_more_default();
            debug!(limit = self.pagination.limit(), total = self.pagination.total(), "Showing more files");
            self.track_elements();
        }
    }

    pub fn add_file(&mut self, file: NewFile) -> Option<FileId> {
        match self.manager.add_file(file) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("{}", e);
                self.notices.push(RejectionNotice {
                    name: e.file_name().to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    pub fn add_bytes(&mut self, name: &str, data: Vec<u8>) -> Option<FileId> {
        let mime = mime_for(Path::new(name));
        self.add_file(NewFile::new(name, mime, data))
    }

    pub fn add_path(&mut self, path: &Path) -> Option<FileId> {
        self.read_file(path).and_then(|file| self.add_file(file))
    }

    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        paths
            .iter()
            .filter_map(|path| self.add_path(path.as_ref()))
            .count()
    }

    /// Adds every image below `folder`, tagged with its path relative to the
    /// folder's parent.
    pub fn add_folder(&mut self, folder: &Path) -> usize {
        let root = folder.parent().unwrap_or(folder);
        let mut added = 0;
        for entry in Walk::new(folder) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error walking {}: {}", folder.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let is_image = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.restrictions.allows_name(n));
            if !path.is_file() || !is_image {
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if let Some(file) = self.read_file(path) {
                if self
                    .add_file(file.with_meta(META_RELATIVE_PATH, json!(relative)))
                    .is_some()
                {
                    added += 1;
                }
            }
        }
        info!(folder = %folder.display(), added, "Folder added");
        added
    }

    fn read_file(&mut self, path: &Path) -> Option<NewFile> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match fs::read(path) {
            Ok(data) => Some(NewFile::new(name, mime_for(path), data)),
            Err(e) => {
                warn!(path = %path.display(), "Failed to read file: {}", e);
                self.notices.push(RejectionNotice {
                    name,
                    reason: format!("Failed to read file: {}", e),
                });
                None
            }
        }
    }

    pub fn notices(&self) -> &[RejectionNotice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) {
        if index < self.notices.len() {
            self.notices.remove(index);
        }
    }

    pub fn start_error(&self) -> Option<&str> {
        self.start_error.as_deref()
    }

    pub fn remove_file(&mut self, id: &FileId) {
        self.cards.unobserve(id);
        self.manager.remove_file(id);
    }

    pub fn start_upload(&mut self) -> StartOutcome {
        match self.mode {
            UploadMode::Local => {
                self.manager
                    .set_target(UploadTarget::local(self.local_endpoint.clone()));
            }
            UploadMode::Cloudinary => {
                if !self.credentials.is_complete() {
                    self.credentials_open = true;
                    return StartOutcome::NeedsCredentials;
                }
                self.manager
                    .set_target(UploadTarget::cloudinary(&self.credentials.cloud_name));
                let mut meta = Meta::new();
                meta.insert("resource_type".to_string(), json!("auto"));
                meta.insert(
                    "upload_preset".to_string(),
                    json!(self.credentials.upload_preset),
                );
                self.manager.set_meta(meta);
            }
        }
        let result = self.manager.upload();
        self.outcome(result)
    }

    pub fn retry(&mut self) -> StartOutcome {
        let result = self.manager.retry_all();
        self.outcome(result)
    }

    fn outcome(&mut self, result: std::result::Result<BatchId, UploadError>) -> StartOutcome {
        match result {
            Ok(batch) => {
                self.start_error = None;
                StartOutcome::Started(batch)
            }
            Err(e) => {
                warn!("Upload did not start: {}", e);
                self.start_error = Some(e.to_string());
                StartOutcome::Failed(e)
            }
        }
    }

    /// Stops everything and empties the set.
    pub fn cancel(&mut self) {
        self.manager.cancel_all();
        self.manager.clear();
        self.start_error = None;
    }

    /// Dismisses a finished upload.
    pub fn done(&mut self) {
        self.manager.clear();
        self.start_error = None;
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn credentials(&self) -> &CloudCredentials {
        &self.credentials
    }

    pub fn is_credentials_open(&self) -> bool {
        self.credentials_open
    }

    pub fn open_credentials(&mut self) {
        self.credentials_open = true;
    }

    pub fn close_credentials(&mut self) {
        self.credentials_open = false;
    }

    /// Saves and applies the credentials when both values are non-blank.
    pub fn save_credentials(&mut self, cloud_name: &str, upload_preset: &str) -> Result<bool> {
        let credentials = CloudCredentials::new(cloud_name, upload_preset);
        if !credentials.save(self.settings.as_ref())? {
            return Ok(false);
        }
        info!(cloud = %credentials.cloud_name, "Cloudinary details saved");
        self.credentials = credentials;
        self.credentials_open = false;
        Ok(true)
    }

    /// Releases observers and the uploader. Only the first call does work.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.cards.disconnect();
        self.sentinel.disconnect();
        self.manager.destroy()
    }
}

impl<M: UploadManager> Drop for UploadController<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdmissionError;
    use crate::settings::MemorySettingsStore;
    use crate::upload::{png_bytes, MockTransport, Uploader, UploaderOptions};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Real uploader whose preview requests stay queued until cancelled.
    struct HeldThumbnails {
        uploader: Uploader<MockTransport>,
        queued: RefCell<HashSet<FileId>>,
        requests: RefCell<Vec<FileId>>,
    }

    impl UploadManager for HeldThumbnails {
        fn add_file(&self, file: NewFile) -> std::result::Result<FileId, AdmissionError> {
            self.uploader.add_file(file)
        }
        fn remove_file(&self, id: &FileId) {
            self.uploader.remove_file(id)
        }
        fn clear(&self) {
            self.uploader.clear()
        }
        fn cancel_all(&self) {
            self.uploader.cancel_all()
        }
        fn upload(&self) -> std::result::Result<BatchId, UploadError> {
            self.uploader.upload()
        }
        fn retry_all(&self) -> std::result::Result<BatchId, UploadError> {
            self.uploader.retry_all()
        }
        fn set_file_meta(&self, id: &FileId, meta: Meta) {
            self.uploader.set_file_meta(id, meta)
        }
        fn set_meta(&self, meta: Meta) {
            self.uploader.set_meta(meta)
        }
        fn set_target(&self, target: UploadTarget) {
            self.uploader.set_target(target)
        }
        fn request_thumbnail(&self, id: &FileId) {
            self.requests.borrow_mut().push(id.clone());
            self.queued.borrow_mut().insert(id.clone());
        }
        fn cancel_thumbnail(&self, id: &FileId) {
            self.queued.borrow_mut().remove(id);
        }
        fn is_thumbnail_queued(&self, id: &FileId) -> bool {
            self.queued.borrow().contains(id)
        }
        fn subscribe(&self) -> Receiver<Arc<UploadSnapshot>> {
            self.uploader.subscribe()
        }
        fn snapshot(&self) -> Option<Arc<UploadSnapshot>> {
            self.uploader.snapshot()
        }
        fn destroy(&self) -> bool {
            self.uploader.destroy()
        }
    }

    type Controller = UploadController<Uploader<MockTransport>>;

    fn controller(mode: UploadMode) -> Controller {
        let config = AppConfig {
            mode,
            ..AppConfig::default()
        };
        let uploader = Uploader::new(config_options(&config), MockTransport::default());
        UploadController::new(uploader, &config, Box::new(MemorySettingsStore::default()))
    }

    fn config_options(config: &AppConfig) -> UploaderOptions {
        UploaderOptions {
            restrictions: config.restrictions(),
            ..UploaderOptions::default()
        }
    }

    fn after_debounce(start: Instant) -> Instant {
        start + Duration::from_millis(200)
    }

    fn wait_until(controller: &mut Controller, done: impl Fn(&Controller) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&*controller) {
            assert!(Instant::now() < deadline, "timed out waiting for uploader");
            controller.sync();
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn sentinel_grows_the_page_and_stops_at_the_total() {
        let mut controller = controller(UploadMode::Local);
        for i in 0..50 {
            controller.add_bytes(&format!("img-{i}.png"), vec![0u8; i + 1]);
        }
        controller.sync();
        assert_eq!(controller.visible_files().len(), 20);
        assert!(controller.is_observing_sentinel());

        let start = Instant::now();
        controller.report_sentinel(true, start);
        controller.tick(after_debounce(start));
        assert_eq!(controller.pagination().limit(), 40);

        let later = after_debounce(start);
        controller.report_sentinel(false, later);
        controller.tick(after_debounce(later));
        let again = after_debounce(later);
        controller.report_sentinel(true, again);
        controller.tick(after_debounce(again));

        assert_eq!(controller.pagination().limit(), 50);
        assert_eq!(controller.visible_files().len(), 50);
        assert!(!controller.is_observing_sentinel());
    }

    #[test]
    fn flickering_sentinel_does_not_grow() {
        let mut controller = controller(UploadMode::Local);
        for i in 0..30 {
            controller.add_bytes(&format!("img-{i}.png"), vec![1u8; i + 1]);
        }
        controller.sync();

        let start = Instant::now();
        controller.report_sentinel(true, start);
        controller.report_sentinel(false, start + Duration::from_millis(50));
        controller.tick(after_debounce(start));
        assert_eq!(controller.pagination().limit(), 20);
    }

    #[test]
    fn rejected_files_become_notices() {
        let mut controller = controller(UploadMode::Local);
        controller.add_bytes("ok.png", vec![0u8; 10]);
        controller.add_bytes("huge.png", vec![0u8; 20 * 1024 * 1024]);
        controller.add_bytes("notes.txt", vec![0u8; 1]);
        controller.sync();

        assert_eq!(controller.file_count(), 1);
        let names: Vec<&str> = controller.notices().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["huge.png", "notes.txt"]);
        assert!(controller.notices()[0].reason.contains("exceeds maximum allowed size"));

        controller.dismiss_notice(0);
        assert_eq!(controller.notices().len(), 1);
    }

    #[test]
    fn folder_intake_records_relative_paths() {
        let dir = tempdir().expect("failed to create temp dir");
        let folder = dir.path().join("photos");
        fs::create_dir_all(folder.join("trip")).expect("mkdir");
        fs::write(folder.join("trip").join("beach.png"), png_bytes(4, 4)).expect("write");
        fs::write(folder.join("readme.md"), "hi").expect("write");

        let mut controller = controller(UploadMode::Local);
        assert_eq!(controller.add_folder(&folder), 1);
        controller.sync();

        let file = &controller.visible_files()[0];
        assert_eq!(file.name, "beach.png");
        assert_eq!(file.mime, "image/png");
        assert_eq!(
            file.meta.get(META_RELATIVE_PATH),
            Some(&json!("photos/trip/beach.png"))
        );
        assert!(controller.notices().is_empty());
    }

    #[test]
    fn missing_paths_are_reported() {
        let mut controller = controller(UploadMode::Local);
        assert_eq!(controller.add_paths(&["/definitely/not/here.png"]), 0);
        assert_eq!(controller.notices()[0].name, "here.png");
    }

    #[test]
    fn cloudinary_upload_waits_for_credentials() {
        let mut controller = controller(UploadMode::Cloudinary);
        assert!(controller.is_credentials_open());
        controller.close_credentials();
        controller.add_bytes("a.png", vec![0u8; 8]);

        assert_eq!(controller.start_upload(), StartOutcome::NeedsCredentials);
        assert!(controller.is_credentials_open());

        assert!(!controller.save_credentials("demo", "  ").expect("save"));
        assert!(controller.is_credentials_open());
        assert!(controller.save_credentials(" demo ", "unsigned").expect("save"));
        assert!(!controller.is_credentials_open());

        assert!(matches!(controller.start_upload(), StartOutcome::Started(_)));
        assert_eq!(
            controller.manager().target().map(|t| t.endpoint),
            Some("https://api.cloudinary.com/v1_1/demo/upload".to_string())
        );
        wait_until(&mut controller, |c| c.status().is_completed());
        let file = &controller.visible_files()[0];
        assert_eq!(file.meta.get("upload_preset"), Some(&json!("unsigned")));
        assert_eq!(file.meta.get("resource_type"), Some(&json!("auto")));
    }

    #[test]
    fn local_upload_completes_and_done_clears() {
        let mut controller = controller(UploadMode::Local);
        assert!(!controller.is_credentials_open());
        controller.add_bytes("a.png", vec![0u8; 8]);
        controller.add_bytes("b.png", vec![0u8; 16]);

        assert!(matches!(controller.start_upload(), StartOutcome::Started(_)));
        wait_until(&mut controller, |c| c.status().is_completed());
        assert_eq!(controller.snapshot().map(|s| s.total_progress), Some(100));

        controller.done();
        wait_until(&mut controller, |c| c.file_count() == 0);
        assert_eq!(controller.status(), AggregatedStatus::Idle);
    }

    #[test]
    fn starting_without_files_surfaces_an_error() {
        let mut controller = controller(UploadMode::Local);
        assert_eq!(
            controller.start_upload(),
            StartOutcome::Failed(UploadError::NothingToUpload)
        );
        assert_eq!(controller.start_error(), Some("No files to upload"));
    }

    #[test]
    fn visible_cards_request_previews_and_heights_are_persisted() {
        let mut controller = controller(UploadMode::Local);
        let id = controller
            .add_bytes("wide.png", png_bytes(512, 128))
            .expect("admitted");
        controller.sync();
        assert!(controller.is_observing_card(&id));

        let start = Instant::now();
        controller.report_card(&id, true, start);
        controller.tick(after_debounce(start));

        wait_until(&mut controller, |c| {
            c.visible_files()
                .first()
                .is_some_and(|f| f.thumbnail_height().is_some())
        });
        assert_eq!(controller.visible_files()[0].thumbnail_height(), Some(56.0));
        assert!(!controller.is_observing_card(&id));

        let layout = controller.layout(1000.0);
        assert_eq!(layout.columns, 3);
        assert_eq!(layout.container_height, 56.0 + 80.0 + 16.0);
    }

    #[test]
    fn card_leaving_the_viewport_cancels_its_preview() {
        let config = AppConfig {
            mode: UploadMode::Local,
            ..AppConfig::default()
        };
        let manager = HeldThumbnails {
            uploader: Uploader::new(config_options(&config), MockTransport::default()),
            queued: RefCell::default(),
            requests: RefCell::default(),
        };
        let mut controller =
            UploadController::new(manager, &config, Box::new(MemorySettingsStore::default()));
        let id = controller
            .add_bytes("a.png", png_bytes(8, 8))
            .expect("admitted");
        controller.sync();
        assert!(!controller.has_queued_thumbnails());

        let start = Instant::now();
        controller.report_card(&id, true, start);
        controller.tick(after_debounce(start));
        assert!(controller.manager().is_thumbnail_queued(&id));
        assert!(controller.has_queued_thumbnails());

        let later = after_debounce(start);
        controller.report_card(&id, false, later);
        controller.tick(after_debounce(later));
        assert!(!controller.manager().is_thumbnail_queued(&id));
        assert!(!controller.has_queued_thumbnails());
        assert!(controller.is_observing_card(&id));

        let again = after_debounce(later);
        controller.report_card(&id, true, again);
        controller.tick(after_debounce(again));
        assert_eq!(*controller.manager().requests.borrow(), vec![id.clone(), id]);
    }

    #[test]
    fn removing_a_card_stops_observing_it() {
        let mut controller = controller(UploadMode::Local);
        let id = controller.add_bytes("a.png", vec![0u8; 4]).expect("admitted");
        controller.sync();
        controller.remove_file(&id);
        assert!(!controller.is_observing_card(&id));
        controller.sync();
        assert_eq!(controller.file_count(), 0);
    }

    #[test]
    fn teardown_runs_once() {
        let mut controller = controller(UploadMode::Local);
        assert!(controller.teardown());
        assert!(!controller.teardown());
        assert!(controller.add_bytes("a.png", vec![0u8; 4]).is_none());
    }

    #[test]
    fn mime_follows_the_extension() {
        assert_eq!(mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for(Path::new("a")), "application/octet-stream");
    }
}
