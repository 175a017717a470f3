use super::manager::{UploadManager, UploaderOptions};
use super::store::SnapshotStore;
use super::thumbnail::ThumbnailWorker;
use super::transport::{ProgressFn, Transport, UploadRequest, UploadTarget};
use super::types::{
    BatchId, CandidateFile, FileId, FileProgress, ManagedFile, Meta, NewFile, UploadBatch,
    UploadSnapshot,
};
use crate::error::{AdmissionError, UploadError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// In-process upload manager: admission, state store, upload and preview
/// workers.
pub struct Uploader<T: Transport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    options: UploaderOptions,
    store: Arc<SnapshotStore>,
    transport: T,
    target: Mutex<Option<UploadTarget>>,
    next_batch: AtomicU64,
    cancels: Mutex<HashMap<BatchId, Arc<AtomicBool>>>,
    thumbnails: ThumbnailWorker,
    destroyed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> Uploader<T> {
    pub fn new(options: UploaderOptions, transport: T) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let preview_store = Arc::clone(&store);
        let thumbnails = ThumbnailWorker::spawn(move |id, preview| {
            preview_store.update(|snapshot| {
                if let Some(file) = snapshot.file_mut(&id) {
                    file.preview = Some(Arc::new(preview));
                }
            });
        });

        Self {
            inner: Arc::new(Inner {
                options,
                store,
                transport,
                target: Mutex::new(None),
                next_batch: AtomicU64::new(1),
                cancels: Mutex::new(HashMap::new()),
                thumbnails,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn target(&self) -> Option<UploadTarget> {
        lock(&self.inner.target).clone()
    }

    fn start_batch(&self, file_ids: Vec<FileId>, batch_id: BatchId) {
        let Some(target) = self.target() else {
            return;
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.inner.cancels).insert(batch_id, Arc::clone(&cancelled));

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("upload-batch-{batch_id}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start upload runtime: {}", e);
                        inner.fail_batch(batch_id, &file_ids, UploadError::Runtime(e.to_string()));
                        return;
                    }
                };
                runtime.block_on(inner.run_batch(batch_id, file_ids, target, cancelled));
            });

        if let Err(e) = spawned {
            error!("Failed to spawn upload thread: {}", e);
        }
    }

    fn open_batch(&self, snapshot: &mut UploadSnapshot, file_ids: Vec<FileId>) -> BatchId {
        let batch_id = self.inner.next_batch.fetch_add(1, Ordering::SeqCst);
        snapshot
            .current_uploads
            .insert(batch_id, UploadBatch { file_ids });
        snapshot.total_progress = 0;
        snapshot.error = None;
        batch_id
    }

    fn abort_batches(&self) {
        for (batch_id, cancelled) in lock(&self.inner.cancels).drain() {
            debug!(batch = batch_id, "Cancelling batch");
            cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn ensure_target(&self) -> Result<(), UploadError> {
        if self.target().is_some() {
            Ok(())
        } else {
            Err(UploadError::TargetNotConfigured)
        }
    }
}

impl<T: Transport> Inner<T> {
    async fn run_batch(
        &self,
        batch_id: BatchId,
        file_ids: Vec<FileId>,
        target: UploadTarget,
        cancelled: Arc<AtomicBool>,
    ) {
        info!(batch = batch_id, files = file_ids.len(), endpoint = %target.endpoint, "Uploading batch");

        for id in &file_ids {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let request = self.store.try_update(|snapshot| {
                let Some(file) = snapshot.file_mut(id) else {
                    return Err(());
                };
                file.progress = FileProgress {
                    upload_started: true,
                    bytes_uploaded: 0,
                    upload_complete: false,
                };
                file.error = None;
                Ok(UploadRequest {
                    file_name: file.name.clone(),
                    mime: file.mime.clone(),
                    data: Arc::clone(&file.data),
                    fields: target.form_fields(&file.meta),
                })
            });
            let Ok(request) = request else {
                debug!(file = %id, "File removed before upload, skipping");
                continue;
            };

            let size = request.data.len() as u64;
            let progress = self.progress_reporter(batch_id, id, size, Arc::clone(&cancelled));
            let result = self.transport.send(&target, request, progress).await;
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            self.store.update(|snapshot| {
                if let Some(file) = snapshot.file_mut(id) {
                    match result {
                        Ok(response) => {
                            info!(file = %file.name, status = response.status, "Upload complete");
                            file.progress.bytes_uploaded = file.size;
                            file.progress.upload_complete = true;
                            file.response = Some(response);
                        }
                        Err(e) => {
                            warn!(file = %file.name, "Upload failed: {}", e);
                            file.error = Some(e.to_string());
                        }
                    }
                }
                snapshot.total_progress = batch_progress(snapshot, batch_id);
            });
        }

        self.finish_batch(batch_id);
    }

    /// Publishes in-flight byte counts for one file, at most once per
    /// percent of its size.
    fn progress_reporter(
        &self,
        batch_id: BatchId,
        id: &FileId,
        size: u64,
        cancelled: Arc<AtomicBool>,
    ) -> ProgressFn {
        let store = Arc::clone(&self.store);
        let id = id.clone();
        let step = (size / 100).max(1);
        let reported = AtomicU64::new(0);
        Arc::new(move |sent| {
            let sent = sent.min(size);
            let previous = reported.load(Ordering::Relaxed);
            if sent <= previous || (sent < size && sent - previous < step) {
                return;
            }
            reported.store(sent, Ordering::Relaxed);
            let _: Result<(), ()> = store.try_update(|snapshot| {
                if cancelled.load(Ordering::SeqCst) {
                    return Err(());
                }
                let file = match snapshot.file_mut(&id) {
                    Some(file) if !file.progress.upload_complete && file.error.is_none() => file,
                    _ => return Err(()),
                };
                file.progress.bytes_uploaded = sent;
                snapshot.total_progress = batch_progress(snapshot, batch_id);
                Ok(())
            });
        })
    }

    fn finish_batch(&self, batch_id: BatchId) {
        lock(&self.cancels).remove(&batch_id);
        self.store.update(|snapshot| {
            let Some(batch) = snapshot.current_uploads.remove(&batch_id) else {
                return;
            };
            let failed = batch
                .file_ids
                .iter()
                .filter(|id| snapshot.file(id).is_some_and(|f| f.error.is_some()))
                .count();
            if failed > 0 {
                warn!(batch = batch_id, failed, "Batch finished with failures");
                snapshot.error = Some(format!("Failed to upload {failed} file(s)"));
            } else {
                info!(batch = batch_id, "Batch finished");
                if snapshot.current_uploads.is_empty() {
                    snapshot.total_progress = 100;
                }
            }
        });
    }

    fn fail_batch(&self, batch_id: BatchId, file_ids: &[FileId], reason: UploadError) {
        self.store.update(|snapshot| {
            for id in file_ids {
                if let Some(file) = snapshot.file_mut(id) {
                    file.progress.upload_started = true;
                    file.error = Some(reason.to_string());
                }
            }
        });
        self.finish_batch(batch_id);
    }
}

impl<T: Transport> Drop for Uploader<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Share of the batch's bytes that finished uploading, as a percentage.
fn batch_progress(snapshot: &UploadSnapshot, batch_id: BatchId) -> u8 {
    let Some(batch) = snapshot.current_uploads.get(&batch_id) else {
        return snapshot.total_progress;
    };
    let files: Vec<&ManagedFile> = batch
        .file_ids
        .iter()
        .filter_map(|id| snapshot.file(id))
        .collect();
    let total: u64 = files.iter().map(|f| f.size).sum();
    if total == 0 {
        let all_done = files.iter().all(|f| f.progress.upload_complete);
        return if all_done && !files.is_empty() { 100 } else { 0 };
    }
    let uploaded: u64 = files.iter().map(|f| f.progress.bytes_uploaded).sum();
    ((uploaded as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

impl<T: Transport> UploadManager for Uploader<T> {
    fn add_file(&self, file: NewFile) -> Result<FileId, AdmissionError> {
        let size = file.data.len() as u64;
        let mut candidate = CandidateFile {
            id: FileId::generate(&file.name, &file.mime, size),
            name: file.name.clone(),
            mime: file.mime.clone(),
            size,
        };

        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(AdmissionError::Rejected {
                name: candidate.name,
            });
        }
        self.inner.options.restrictions.check(&candidate)?;

        let gatekeeper = self.inner.options.on_before_file_added.as_ref();
        let id = self.inner.store.try_update(|snapshot| {
            if let Some(gate) = gatekeeper {
                if !gate(&mut candidate, snapshot) {
                    return Err(AdmissionError::Rejected {
                        name: candidate.name.clone(),
                    });
                }
            }
            if snapshot.contains(&candidate.id) {
                return Err(AdmissionError::Duplicate {
                    name: candidate.name.clone(),
                });
            }

            let mut meta = snapshot.meta.clone();
            meta.extend(file.meta);
            meta.insert("name".to_string(), json!(file.name));
            meta.insert("type".to_string(), json!(file.mime));
            snapshot.push_file(ManagedFile {
                id: candidate.id.clone(),
                name: file.name,
                mime: file.mime,
                size,
                data: file.data,
                source: file.source,
                meta,
                preview: None,
                progress: FileProgress::default(),
                error: None,
                response: None,
            });
            Ok(candidate.id.clone())
        })?;

        debug!(file = %id, size, "File added");
        if self.inner.options.auto_proceed {
            if let Err(e) = self.upload() {
                warn!("Automatic upload did not start: {}", e);
            }
        }
        Ok(id)
    }

    fn remove_file(&self, id: &FileId) {
        self.inner.thumbnails.cancel(id);
        self.inner.store.update(|snapshot| {
            if snapshot.remove_file(id).is_none() {
                return;
            }
            for batch in snapshot.current_uploads.values_mut() {
                batch.file_ids.retain(|queued| queued != id);
            }
            snapshot
                .current_uploads
                .retain(|_, batch| !batch.file_ids.is_empty());
        });
        debug!(file = %id, "File removed");
    }

    fn clear(&self) {
        self.abort_batches();
        self.inner.store.update(|snapshot| {
            snapshot.clear_files();
            snapshot.current_uploads.clear();
            snapshot.total_progress = 0;
            snapshot.error = None;
        });
        info!("Cleared all files");
    }

    fn cancel_all(&self) {
        self.abort_batches();
        self.inner.store.update(|snapshot| {
            snapshot.current_uploads.clear();
            for file in snapshot.files_mut() {
                if !file.progress.upload_complete {
                    file.progress = FileProgress::default();
                    file.error = None;
                }
            }
            snapshot.total_progress = 0;
            snapshot.error = None;
        });
        info!("Cancelled all uploads");
    }

    fn upload(&self) -> Result<BatchId, UploadError> {
        self.ensure_target()?;
        let (batch_id, file_ids) = self.inner.store.try_update(|snapshot| {
            let file_ids: Vec<FileId> = snapshot
                .files()
                .iter()
                .filter(|f| !f.progress.upload_started && !f.progress.upload_complete)
                .filter(|f| {
                    !snapshot
                        .current_uploads
                        .values()
                        .any(|batch| batch.file_ids.contains(&f.id))
                })
                .map(|f| f.id.clone())
                .collect();
            if file_ids.is_empty() {
                return Err(UploadError::NothingToUpload);
            }
            let batch_id = self.open_batch(snapshot, file_ids.clone());
            Ok((batch_id, file_ids))
        })?;

        self.start_batch(file_ids, batch_id);
        Ok(batch_id)
    }

    fn retry_all(&self) -> Result<BatchId, UploadError> {
        self.ensure_target()?;
        let (batch_id, file_ids) = self.inner.store.try_update(|snapshot| {
            let mut file_ids = Vec::new();
            for file in snapshot.files_mut() {
                if file.error.is_some() {
                    file.error = None;
                    file.progress = FileProgress::default();
                    file.response = None;
                    file_ids.push(file.id.clone());
                }
            }
            if file_ids.is_empty() {
                return Err(UploadError::NothingToUpload);
            }
            let batch_id = self.open_batch(snapshot, file_ids.clone());
            Ok((batch_id, file_ids))
        })?;

        info!(batch = batch_id, files = file_ids.len(), "Retrying failed uploads");
        self.start_batch(file_ids, batch_id);
        Ok(batch_id)
    }

    fn set_file_meta(&self, id: &FileId, meta: Meta) {
        self.inner.store.update(|snapshot| {
            if let Some(file) = snapshot.file_mut(id) {
                file.meta.extend(meta);
            }
        });
    }

    fn set_meta(&self, meta: Meta) {
        self.inner.store.update(|snapshot| {
            snapshot.meta.extend(meta.clone());
            for file in snapshot.files_mut() {
                file.meta.extend(meta.clone());
            }
        });
    }

    fn set_target(&self, target: UploadTarget) {
        debug!(endpoint = %target.endpoint, "Upload target set");
        *lock(&self.inner.target) = Some(target);
    }

    fn request_thumbnail(&self, id: &FileId) {
        let data = self.inner.store.read(|snapshot| {
            snapshot
                .file(id)
                .filter(|f| f.preview.is_none())
                .map(|f| Arc::clone(&f.data))
        });
        if let Some(data) = data {
            self.inner.thumbnails.request(id.clone(), data);
        }
    }

    fn cancel_thumbnail(&self, id: &FileId) {
        self.inner.thumbnails.cancel(id);
    }

    fn is_thumbnail_queued(&self, id: &FileId) -> bool {
        self.inner.thumbnails.is_queued(id)
    }

    fn subscribe(&self) -> Receiver<Arc<UploadSnapshot>> {
        self.inner.store.subscribe()
    }

    fn snapshot(&self) -> Option<Arc<UploadSnapshot>> {
        self.inner.store.get()
    }

    fn destroy(&self) -> bool {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.abort_batches();
        self.inner.thumbnails.shutdown();
        self.inner.store.close();
        info!("Uploader destroyed");
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::upload::manager::{Gatekeeper, Restrictions};
    use crate::upload::status::{AggregatedStatus, CardStatus, UploadProgress};
    use crate::upload::thumbnail::png_bytes;
    use crate::upload::types::UploadResponse;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Reports the body in quarters and answers instantly; files whose name
    /// is listed fail with a 500.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        failing: Mutex<HashSet<String>>,
        pub(crate) sent: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl MockTransport {
        pub(crate) fn failing(names: &[&str]) -> Self {
            Self {
                failing: Mutex::new(names.iter().map(|s| s.to_string()).collect()),
                ..Self::default()
            }
        }

        /// Waits `delay` between quarters, leaving time to cancel mid-file.
        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        fn heal(&self) {
            lock(&self.failing).clear();
        }
    }

    impl Transport for MockTransport {
        async fn send(
            &self,
            _target: &UploadTarget,
            request: UploadRequest,
            progress: ProgressFn,
        ) -> Result<UploadResponse, UploadError> {
            lock(&self.sent).push(request.file_name.clone());
            let len = request.data.len() as u64;
            for quarter in 1..=4 {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                progress(len * quarter / 4);
            }
            if lock(&self.failing).contains(&request.file_name) {
                return Err(UploadError::Status(500));
            }
            Ok(UploadResponse {
                status: 200,
                url: Some(format!("https://cdn.test/{}", request.file_name)),
            })
        }
    }

    pub(crate) fn uploader(transport: MockTransport) -> Uploader<MockTransport> {
        let uploader = Uploader::new(UploaderOptions::default(), transport);
        uploader.set_target(UploadTarget::local("http://localhost:3000/api/upload"));
        uploader
    }

    pub(crate) fn image(name: &str, size: usize) -> NewFile {
        NewFile::new(name, "image/png", vec![0u8; size])
    }

    /// Collects snapshots until one satisfies `done`.
    pub(crate) fn collect_until(
        receiver: &Receiver<Arc<UploadSnapshot>>,
        done: impl Fn(&UploadSnapshot) -> bool,
    ) -> Vec<Arc<UploadSnapshot>> {
        let mut seen = Vec::new();
        loop {
            let snapshot = receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("uploader stopped emitting");
            let finished = done(&*snapshot);
            seen.push(snapshot);
            if finished {
                return seen;
            }
        }
    }

    fn dedup<V: PartialEq>(values: impl Iterator<Item = V>) -> Vec<V> {
        let mut out: Vec<V> = Vec::new();
        for value in values {
            if out.last() != Some(&value) {
                out.push(value);
            }
        }
        out
    }

    fn status(snapshot: &UploadSnapshot) -> AggregatedStatus {
        AggregatedStatus::derive(Some(snapshot))
    }

    #[test]
    fn oversized_file_is_rejected_and_the_rest_upload() {
        let uploader = uploader(MockTransport::default());
        let receiver = uploader.subscribe();

        let results: Vec<_> = [
            image("small.png", 100 * 1024),
            image("medium.png", 5 * 1024 * 1024),
            image("huge.png", 20 * 1024 * 1024),
        ]
        .into_iter()
        .map(|file| uploader.add_file(file))
        .collect();

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        let rejection = results[2].clone().expect_err("20MB exceeds the limit");
        assert!(matches!(rejection, AdmissionError::TooLarge { .. }));
        assert_eq!(rejection.file_name(), "huge.png");

        let before = uploader.snapshot().expect("files were added");
        assert_eq!(before.file_count(), 2);
        assert_eq!(status(&before), AggregatedStatus::Idle);

        uploader.upload().expect("upload starts");
        let seen = collect_until(&receiver, |s| status(s).is_completed());

        let statuses = dedup(seen.iter().map(|s| status(s)));
        assert_eq!(
            statuses,
            vec![
                AggregatedStatus::Idle,
                AggregatedStatus::Uploading,
                AggregatedStatus::Completed
            ]
        );

        let uploading: Vec<UploadProgress> = seen
            .iter()
            .filter(|s| status(s).is_uploading())
            .map(|s| UploadProgress::derive(Some(&**s)))
            .collect();
        assert!(uploading.iter().all(|p| p.total_upload_files_count == 2));
        assert_eq!(
            dedup(uploading.iter().map(|p| p.current_uploaded_files_count)),
            vec![0, 1, 2]
        );

        let done = seen.last().expect("at least one snapshot");
        assert!(done.files().iter().all(|f| f.progress.upload_complete));
        assert_eq!(done.total_progress, 100);
        assert_eq!(
            done.files()[0].response.as_ref().and_then(|r| r.url.as_deref()),
            Some("https://cdn.test/small.png")
        );
    }

    #[test]
    fn bytes_are_reported_while_a_file_is_in_flight() {
        let uploader = uploader(MockTransport::default());
        let receiver = uploader.subscribe();
        let id = uploader
            .add_file(image("big.png", 5 * 1024 * 1024))
            .expect("admitted");

        uploader.upload().expect("upload starts");
        let seen = collect_until(&receiver, |s| status(s).is_completed());

        let in_flight: Vec<(u64, u8)> = seen
            .iter()
            .filter_map(|s| {
                let file = s.file(&id)?;
                let moving = file.progress.upload_started && !file.progress.upload_complete;
                moving.then_some((file.progress.bytes_uploaded, s.total_progress))
            })
            .collect();
        let quarter = 5 * 1024 * 1024 / 4;
        assert_eq!(
            dedup(in_flight.into_iter()),
            vec![(0, 0), (quarter, 25), (2 * quarter, 50), (3 * quarter, 75), (4 * quarter, 100)]
        );

        let last_in_flight = seen
            .iter()
            .filter_map(|s| s.file(&id))
            .filter(|f| !f.progress.upload_complete)
            .last()
            .expect("file was in flight");
        assert_eq!(
            CardStatus::of(last_in_flight),
            CardStatus::Uploading {
                bytes_uploaded: 4 * quarter,
                size: 4 * quarter
            }
        );
    }

    #[test]
    fn cancelling_mid_file_stops_progress_and_resets_the_file() {
        let uploader = uploader(MockTransport::slow(Duration::from_millis(50)));
        let receiver = uploader.subscribe();
        let id = uploader.add_file(image("a.png", 1000)).expect("admitted");

        uploader.upload().expect("upload starts");
        collect_until(&receiver, |s| {
            s.file(&id).is_some_and(|f| f.progress.bytes_uploaded > 0)
        });
        uploader.cancel_all();

        let cancelled = uploader.snapshot().expect("snapshot");
        assert_eq!(status(&cancelled), AggregatedStatus::Idle);
        assert_eq!(cancelled.files()[0].progress, FileProgress::default());

        thread::sleep(Duration::from_millis(400));
        let later = uploader.snapshot().expect("snapshot");
        assert_eq!(later.files()[0].progress, FileProgress::default());
        assert_eq!(later.total_progress, 0);
        assert!(later.current_uploads.is_empty());
    }

    #[test]
    fn failures_surface_and_retry_resubmits_only_them() {
        let uploader = uploader(MockTransport::failing(&["bad.png"]));
        let receiver = uploader.subscribe();
        uploader.add_file(image("good.png", 10)).expect("admitted");
        uploader.add_file(image("bad.png", 10)).expect("admitted");

        uploader.upload().expect("upload starts");
        let seen = collect_until(&receiver, |s| status(s).is_errored());
        let errored = seen.last().expect("snapshot");
        assert_eq!(errored.error.as_deref(), Some("Failed to upload 1 file(s)"));
        let bad = &errored.files()[1];
        assert_eq!(bad.error.as_deref(), Some("Upload failed with status: 500"));
        assert!(errored.files()[0].progress.upload_complete);

        uploader.inner.transport.heal();
        lock(&uploader.inner.transport.sent).clear();
        uploader.retry_all().expect("retry starts");
        collect_until(&receiver, |s| status(s).is_completed());

        assert_eq!(*lock(&uploader.inner.transport.sent), vec!["bad.png".to_string()]);
        assert_eq!(uploader.retry_all(), Err(UploadError::NothingToUpload));
    }

    #[test]
    fn upload_requires_a_target_and_files() {
        let uploader = Uploader::new(UploaderOptions::default(), MockTransport::default());
        assert_eq!(uploader.upload(), Err(UploadError::TargetNotConfigured));
        uploader.set_target(UploadTarget::cloudinary("demo"));
        assert_eq!(uploader.upload(), Err(UploadError::NothingToUpload));
    }

    #[test]
    fn duplicate_files_get_distinct_ids() {
        let uploader = uploader(MockTransport::default());
        let first = uploader.add_file(image("a.png", 3)).expect("admitted");
        let second = uploader.add_file(image("a.png", 3)).expect("admitted");
        assert_ne!(first, second);
        assert_eq!(uploader.snapshot().map(|s| s.file_count()), Some(2));
    }

    #[test]
    fn gatekeeper_can_reject_or_leave_duplicates() {
        let reject_all: Gatekeeper = Box::new(|_, _| false);
        let strict = Uploader::new(
            UploaderOptions {
                restrictions: Restrictions::default(),
                auto_proceed: false,
                on_before_file_added: Some(reject_all),
            },
            MockTransport::default(),
        );
        assert!(matches!(
            strict.add_file(image("a.png", 1)),
            Err(AdmissionError::Rejected { .. })
        ));
        assert!(strict.snapshot().is_none());

        let plain = Uploader::new(
            UploaderOptions {
                on_before_file_added: None,
                ..UploaderOptions::default()
            },
            MockTransport::default(),
        );
        plain.add_file(image("a.png", 1)).expect("admitted");
        assert!(matches!(
            plain.add_file(image("a.png", 1)),
            Err(AdmissionError::Duplicate { .. })
        ));
    }

    #[test]
    fn disallowed_type_is_refused() {
        let uploader = uploader(MockTransport::default());
        let error = uploader
            .add_file(NewFile::new("notes.txt", "text/plain", vec![1u8]))
            .expect_err("not an image");
        assert!(matches!(error, AdmissionError::DisallowedType { .. }));
    }

    #[test]
    fn auto_proceed_uploads_on_admission() {
        let uploader = Uploader::new(
            UploaderOptions {
                auto_proceed: true,
                ..UploaderOptions::default()
            },
            MockTransport::default(),
        );
        uploader.set_target(UploadTarget::local("http://localhost/upload"));
        let receiver = uploader.subscribe();
        uploader.add_file(image("a.png", 4)).expect("admitted");
        collect_until(&receiver, |s| status(s).is_completed());
    }

    #[test]
    fn cancel_all_resets_and_clear_removes_everything() {
        let uploader = uploader(MockTransport::failing(&["a.png"]));
        let receiver = uploader.subscribe();
        uploader.add_file(image("a.png", 4)).expect("admitted");
        uploader.upload().expect("upload starts");
        collect_until(&receiver, |s| status(s).is_errored());

        uploader.cancel_all();
        let snapshot = uploader.snapshot().expect("snapshot");
        assert_eq!(status(&snapshot), AggregatedStatus::Idle);
        assert_eq!(snapshot.files()[0].progress, FileProgress::default());
        assert!(snapshot.files()[0].error.is_none());

        uploader.clear();
        let snapshot = uploader.snapshot().expect("snapshot");
        assert_eq!(snapshot.file_count(), 0);
        assert!(snapshot.current_uploads.is_empty());
    }

    #[test]
    fn metadata_merges_into_files() {
        let uploader = uploader(MockTransport::default());
        let id = uploader.add_file(image("a.png", 4)).expect("admitted");

        let mut batch = Meta::new();
        batch.insert("upload_preset".into(), json!("unsigned"));
        uploader.set_meta(batch);
        let mut own = Meta::new();
        own.insert("thumbnailHeight".into(), json!(144));
        uploader.set_file_meta(&id, own);

        let snapshot = uploader.snapshot().expect("snapshot");
        let file = snapshot.file(&id).expect("file");
        assert_eq!(file.meta.get("upload_preset"), Some(&json!("unsigned")));
        assert_eq!(file.meta.get("name"), Some(&json!("a.png")));
        assert_eq!(file.thumbnail_height(), Some(144.0));

        let later = uploader.add_file(image("b.png", 4)).expect("admitted");
        let snapshot = uploader.snapshot().expect("snapshot");
        assert_eq!(
            snapshot.file(&later).and_then(|f| f.meta.get("upload_preset")),
            Some(&json!("unsigned"))
        );
    }

    #[test]
    fn removing_a_file_drops_it_from_the_set() {
        let uploader = uploader(MockTransport::default());
        let id = uploader.add_file(image("a.png", 4)).expect("admitted");
        uploader.remove_file(&id);
        assert_eq!(uploader.snapshot().map(|s| s.file_count()), Some(0));
    }

    #[test]
    fn requested_thumbnail_lands_on_the_file() {
        let uploader = uploader(MockTransport::default());
        let receiver = uploader.subscribe();
        let id = uploader
            .add_file(NewFile::new("wide.png", "image/png", png_bytes(512, 128)))
            .expect("admitted");

        uploader.request_thumbnail(&id);
        let seen = collect_until(&receiver, |s| {
            s.file(&id).is_some_and(|f| f.preview.is_some())
        });
        let preview = seen
            .last()
            .and_then(|s| s.file(&id))
            .and_then(|f| f.preview.clone())
            .expect("preview");
        assert_eq!((preview.width, preview.height), (256, 64));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while uploader.is_thumbnail_queued(&id) {
            assert!(std::time::Instant::now() < deadline, "queued flag never cleared");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn destroy_runs_once() {
        let uploader = uploader(MockTransport::default());
        let receiver = uploader.subscribe();
        assert!(uploader.destroy());
        assert!(!uploader.destroy());
        assert!(receiver.recv().is_err());
        assert!(matches!(
            uploader.add_file(image("a.png", 1)),
            Err(AdmissionError::Rejected { .. })
        ));
    }
}
