/// Gallery Sync Engine
///
/// The only place that issues requests against a user's image collection.
/// Each operation has two halves, matching the host's event loop:
///
/// 1. *dispatch* (`&mut self`): validate, set guards, stamp a [`Ticket`]
///    and hand back a `Send + 'static` future that performs the request
/// 2. *apply* (`&mut self`): take the [`SyncOutcome`] that future produced
///    and mutate the store only if the server confirmed
///
/// No gallery state is borrowed while a request is in flight, so the host
/// stays interactive, and every application runs to completion before the
/// next one starts.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::intent::Intent;
use super::upload;
use super::workflow::{ImageActivity, Workflow};
use crate::error::{GalleryError, Operation};
use crate::net::transport::{GalleryTransport, TransportError};
use crate::state::data::{FileHandle, ImageId, ImageRecord, SessionContext, UserId};
use crate::state::store::ImageStore;
use crate::state::viewer::Viewer;

/// A request in flight, ready to be awaited by the host
pub type PendingSync = Pin<Box<dyn Future<Output = SyncOutcome> + Send + 'static>>;

/// Loading phase of the gallery screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Initial fetch in flight
    Loading,
    /// Store holds server state, mutations allowed
    Ready,
    /// Initial fetch failed, retry needed
    LoadFailed,
}

/// Identifies the gallery state a request was issued against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    version: u64,
    owner_id: UserId,
}

/// Result of a request, handed back to [`SyncEngine::apply`]
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Fetched {
        ticket: Ticket,
        /// Dispatch order among fetches of this epoch
        seq: u64,
        result: Result<Vec<ImageRecord>, TransportError>,
    },
    Uploaded {
        ticket: Ticket,
        file_count: usize,
        result: Result<Vec<ImageRecord>, TransportError>,
    },
    Deleted {
        ticket: Ticket,
        image_id: ImageId,
        result: Result<(), TransportError>,
    },
    ProfilePictureSet {
        ticket: Ticket,
        image_id: ImageId,
        result: Result<(), TransportError>,
    },
}

impl SyncOutcome {
    fn ticket(&self) -> Ticket {
        match self {
            SyncOutcome::Fetched { ticket, .. }
            | SyncOutcome::Uploaded { ticket, .. }
            | SyncOutcome::Deleted { ticket, .. }
            | SyncOutcome::ProfilePictureSet { ticket, .. } => *ticket,
        }
    }
}

/// A server-confirmed change that was applied to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Loaded { count: usize },
    Uploaded { added: usize, requested: usize },
    Deleted { image_id: ImageId, was_profile_picture: bool },
    ProfilePictureSet { image_id: ImageId },
}

impl Applied {
    /// Success message for the host
    pub fn intent(&self) -> Option<Intent> {
        match self {
            Applied::Loaded { .. } => None,
            Applied::Uploaded { .. } => Some(Intent::notify("Images uploaded successfully!")),
            Applied::Deleted { .. } => Some(Intent::notify("Image deleted successfully!")),
            Applied::ProfilePictureSet { .. } => {
                Some(Intent::notify("Profile picture updated successfully!"))
            }
        }
    }

    /// The store may not match the server after this change: an upload
    /// came back short, or the server may have picked a new profile picture
    pub fn needs_resync(&self) -> bool {
        match self {
            Applied::Uploaded { added, requested } => added < requested,
            Applied::Deleted {
                was_profile_picture, ..
            } => *was_profile_picture,
            _ => false,
        }
    }
}

/// Whether the store is known to differ from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resync {
    Idle,
    /// Settled only by a snapshot dispatched after fetch number `raised_at`
    Wanted { raised_at: u64 },
    /// The resync fetch failed; waits for a manual retry
    Failed { raised_at: u64 },
}

impl Resync {
    fn settled_by(self, seq: u64) -> bool {
        match self {
            Resync::Idle => true,
            Resync::Wanted { raised_at } | Resync::Failed { raised_at } => seq > raised_at,
        }
    }
}

/// Per-screen gallery state, rebuilt every time the screen gains focus
#[derive(Debug)]
struct GalleryState {
    store: ImageStore,
    viewer: Viewer,
    workflow: Workflow,
    pending_upload: bool,
    /// Bumped on every applied mutation
    version: u64,
    phase: Phase,
    alive: bool,
    resync: Resync,
    fetches_sent: u64,
    fetches_in_flight: usize,
}

impl GalleryState {
    fn new(capacity: usize) -> Self {
        Self {
            store: ImageStore::with_capacity(capacity),
            viewer: Viewer::new(),
            workflow: Workflow::default(),
            pending_upload: false,
            version: 0,
            phase: Phase::Loading,
            alive: false,
            resync: Resync::Idle,
            fetches_sent: 0,
            fetches_in_flight: 0,
        }
    }

    /// Run a store mutation, then restore the derived state
    fn mutate<R>(
        &mut self,
        change: impl FnOnce(&mut ImageStore) -> Result<R, GalleryError>,
    ) -> Result<R, GalleryError> {
        let result = change(&mut self.store)?;
        self.version += 1;
        self.viewer.revalidate(&self.store);
        self.workflow.retain_present(&self.store);
        Ok(result)
    }
}

/// Reconciles one user's gallery with the backend
pub struct SyncEngine<T: GalleryTransport> {
    transport: Arc<T>,
    capacity: usize,
    owner_id: Option<UserId>,
    /// Bumped by every `initialize`; older responses are ignored
    epoch: u64,
    batches: u64,
    state: GalleryState,
}

impl<T: GalleryTransport> SyncEngine<T> {
    pub fn new(transport: T, capacity: usize) -> Self {
        Self::with_shared(Arc::new(transport), capacity)
    }

    pub fn with_shared(transport: Arc<T>, capacity: usize) -> Self {
        Self {
            transport,
            capacity,
            owner_id: None,
            epoch: 0,
            batches: 0,
            state: GalleryState::new(capacity),
        }
    }

    // ========== Lifecycle ==========

    /// Start (or restart) the gallery for `session` and fetch its images
    pub fn initialize(&mut self, session: &SessionContext) -> PendingSync {
        self.epoch += 1;
        self.owner_id = Some(session.owner_id);
        self.state = GalleryState::new(self.capacity);
        self.state.alive = true;

        info!("🖼️  Gallery opened for user {}", session.owner_id);
        self.dispatch_fetch(session)
    }

    /// Discard the gallery; responses still in flight become no-ops
    pub fn teardown(&mut self) {
        if self.state.alive {
            debug!("Gallery torn down (epoch {})", self.epoch);
        }
        self.state.alive = false;
        self.state.viewer.close();
        self.owner_id = None;
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive
    }

    // ========== Queries ==========

    pub fn store(&self) -> &ImageStore {
        &self.state.store
    }

    pub fn viewer(&self) -> &Viewer {
        &self.state.viewer
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn is_uploading(&self) -> bool {
        self.state.pending_upload
    }

    /// The store diverged from the server and no fetch is in flight to fix it.
    /// The host answers with [`SyncEngine::fetch_all`].
    pub fn needs_resync(&self) -> bool {
        self.state.alive
            && self.state.phase == Phase::Ready
            && self.state.fetches_in_flight == 0
            && matches!(self.state.resync, Resync::Wanted { .. })
    }

    /// A resync fetch failed and the store may still be out of date
    pub fn resync_failed(&self) -> bool {
        matches!(self.state.resync, Resync::Failed { .. })
    }

    pub fn activity(&self, id: ImageId) -> Option<ImageActivity> {
        self.state.workflow.activity(id)
    }

    /// The add button is usable only when there is room and no upload running
    pub fn can_add(&self) -> bool {
        self.state.phase == Phase::Ready && !self.state.pending_upload && !self.state.store.is_full()
    }

    /// "Photos (n/6)"
    pub fn count_text(&self) -> String {
        format!("Photos ({}/{})", self.state.store.count(), self.state.store.capacity())
    }

    pub fn remaining_text(&self) -> String {
        if self.state.store.is_empty() {
            "Add photos to make your profile stand out".to_string()
        } else {
            format!("You can add {} more photos", self.state.store.remaining_capacity())
        }
    }

    // ========== Viewer ==========

    pub fn open_viewer(&mut self, at_index: usize) -> Result<(), GalleryError> {
        self.state.viewer.open(at_index, &self.state.store)
    }

    pub fn swipe_viewer(&mut self, new_index: isize) -> Option<usize> {
        self.state.viewer.on_swipe(new_index, &self.state.store)
    }

    pub fn close_viewer(&mut self) {
        self.state.viewer.close();
    }

    // ========== Dispatch ==========

    /// Re-read the whole collection (retry after a failed load, or resync)
    pub fn fetch_all(&mut self, session: &SessionContext) -> Result<PendingSync, GalleryError> {
        self.check_session(session)?;
        if self.state.phase == Phase::LoadFailed {
            self.state.phase = Phase::Loading;
        }
        Ok(self.dispatch_fetch(session))
    }

    /// Upload a user selection, whole or not at all
    /// Returns None for an empty selection
    pub fn upload_batch(
        &mut self,
        session: &SessionContext,
        files: Vec<FileHandle>,
    ) -> Result<Option<PendingSync>, GalleryError> {
        self.check_ready(session)?;

        if self.state.pending_upload {
            return Err(GalleryError::ConcurrentUploadRejected);
        }
        if files.is_empty() {
            return Ok(None);
        }
        upload::check_capacity(files.len(), &self.state.store)?;

        self.batches += 1;
        let uploads = upload::name_batch(files, self.batches);
        let file_count = uploads.len();
        self.state.pending_upload = true;

        info!("📤 Upload batch {} dispatched ({} files)", self.batches, file_count);

        let ticket = self.ticket(session.owner_id);
        let transport = Arc::clone(&self.transport);
        let session = session.clone();
        Ok(Some(Box::pin(async move {
            let result = transport.upload_images(&session, &uploads).await;
            SyncOutcome::Uploaded {
                ticket,
                file_count,
                result,
            }
        })))
    }

    /// First phase of deletion: ask the host to confirm
    pub fn request_delete(&mut self, image_id: ImageId) -> Result<Intent, GalleryError> {
        if self.state.phase != Phase::Ready || !self.state.alive {
            return Err(GalleryError::NotReady);
        }
        if self.state.store.find(image_id).is_none() {
            self.want_resync();
            return Err(GalleryError::NotFound(image_id));
        }
        self.state.workflow.request_delete(image_id)?;
        Ok(Intent::ConfirmDeletion { image_id })
    }

    /// User dismissed the confirmation; nothing is sent
    pub fn cancel_delete(&mut self, image_id: ImageId) -> bool {
        self.state.workflow.cancel_delete(image_id)
    }

    /// Second phase of deletion: the user confirmed
    pub fn confirm_delete(
        &mut self,
        session: &SessionContext,
        image_id: ImageId,
    ) -> Result<PendingSync, GalleryError> {
        self.check_ready(session)?;
        self.state.workflow.begin_delete(image_id)?;

        info!("🗑️  Deleting image {}", image_id);

        let ticket = self.ticket(session.owner_id);
        let transport = Arc::clone(&self.transport);
        let session = session.clone();
        Ok(Box::pin(async move {
            let result = transport.delete_image(&session, image_id).await;
            SyncOutcome::Deleted {
                ticket,
                image_id,
                result,
            }
        }))
    }

    /// Ask the server to make `image_id` the profile picture
    /// Returns None when it already is
    pub fn set_profile_picture(
        &mut self,
        session: &SessionContext,
        image_id: ImageId,
    ) -> Result<Option<PendingSync>, GalleryError> {
        self.check_ready(session)?;

        let Some(image) = self.state.store.find(image_id) else {
            self.want_resync();
            return Err(GalleryError::NotFound(image_id));
        };
        if image.is_profile_picture {
            debug!("Image {} is already the profile picture", image_id);
            return Ok(None);
        }
        self.state.workflow.begin_promote(image_id)?;

        info!("⭐ Promoting image {} to profile picture", image_id);

        let ticket = self.ticket(session.owner_id);
        let transport = Arc::clone(&self.transport);
        let session = session.clone();
        Ok(Some(Box::pin(async move {
            let result = transport.set_profile_picture(&session, image_id).await;
            SyncOutcome::ProfilePictureSet {
                ticket,
                image_id,
                result,
            }
        })))
    }

    // ========== Apply ==========

    /// Fold a finished request back into the gallery
    pub fn apply(&mut self, outcome: SyncOutcome) -> Result<Applied, GalleryError> {
        let ticket = outcome.ticket();
        if !self.state.alive || ticket.epoch != self.epoch {
            debug!("Discarding response for a closed gallery (epoch {})", ticket.epoch);
            return Err(GalleryError::StaleResponse);
        }

        let applied = match outcome {
            SyncOutcome::Fetched {
                ticket,
                seq,
                result,
            } => self.apply_fetch(ticket, seq, result),
            SyncOutcome::Uploaded {
                file_count, result, ..
            } => self.apply_upload(ticket.owner_id, file_count, result),
            SyncOutcome::Deleted {
                ticket,
                image_id,
                result,
            } => self.apply_delete(ticket, image_id, result),
            SyncOutcome::ProfilePictureSet {
                image_id, result, ..
            } => self.apply_promote(image_id, result),
        };

        let diverged = match &applied {
            Ok(applied) => applied.needs_resync(),
            Err(e) => e.needs_resync(),
        };
        if diverged {
            self.want_resync();
        }
        applied
    }

    fn apply_fetch(
        &mut self,
        ticket: Ticket,
        seq: u64,
        result: Result<Vec<ImageRecord>, TransportError>,
    ) -> Result<Applied, GalleryError> {
        self.state.fetches_in_flight = self.state.fetches_in_flight.saturating_sub(1);

        // The resync stays outstanding, needs_resync() reports it again
        if ticket.version < self.state.version {
            debug!(
                "Discarding stale snapshot (version {} < {})",
                ticket.version, self.state.version
            );
            return Err(GalleryError::StaleResponse);
        }

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!("⚠️  Failed to load images: {}", e);
                if self.state.phase == Phase::Loading {
                    self.state.phase = Phase::LoadFailed;
                }
                if let Resync::Wanted { raised_at } = self.state.resync {
                    if seq > raised_at {
                        self.state.resync = Resync::Failed { raised_at };
                    }
                }
                return Err(GalleryError::request_failed(Operation::FetchAll, e));
            }
        };

        let records = only_owned_by(records, ticket.owner_id);
        self.state.mutate(|store| {
            store.replace_all(records);
            Ok(())
        })?;
        self.state.phase = Phase::Ready;
        if self.state.resync.settled_by(seq) {
            self.state.resync = Resync::Idle;
        }

        let count = self.state.store.count();
        info!("✅ Gallery loaded with {} images", count);
        Ok(Applied::Loaded { count })
    }

    fn apply_upload(
        &mut self,
        owner_id: UserId,
        file_count: usize,
        result: Result<Vec<ImageRecord>, TransportError>,
    ) -> Result<Applied, GalleryError> {
        // Released on every path
        self.state.pending_upload = false;

        let records = result.map_err(|e| {
            warn!("⚠️  Upload failed: {}", e);
            GalleryError::request_failed(Operation::UploadBatch, e)
        })?;

        let records = only_owned_by(records, owner_id);
        let added = self
            .state
            .mutate(|store| store.upsert_many(records))
            .map_err(|e| match e {
                // Already stored by the server; a newer snapshot left no room locally
                GalleryError::CapacityExceeded { .. } => {
                    warn!("⚠️  Confirmed upload does not fit the local gallery: {}", e);
                    GalleryError::Diverged {
                        operation: Operation::UploadBatch,
                    }
                }
                other => other,
            })?;

        info!("✅ Upload complete: {} of {} images added", added, file_count);
        Ok(Applied::Uploaded {
            added,
            requested: file_count,
        })
    }

    fn apply_delete(
        &mut self,
        ticket: Ticket,
        image_id: ImageId,
        result: Result<(), TransportError>,
    ) -> Result<Applied, GalleryError> {
        self.state.workflow.finish(image_id);

        result.map_err(|e| {
            warn!("⚠️  Delete of image {} failed: {}", image_id, e);
            GalleryError::request_failed(Operation::DeleteOne, e)
        })?;

        // A snapshot applied since dispatch may already reflect the deletion
        if self.state.store.find(image_id).is_none() && ticket.version < self.state.version {
            debug!("Image {} already absent after newer snapshot", image_id);
            return Ok(Applied::Deleted {
                image_id,
                was_profile_picture: false,
            });
        }

        let removed = self.state.mutate(|store| store.remove(image_id))?;

        if removed.is_profile_picture {
            info!("Profile picture {} deleted, reloading to pick up a reassignment", image_id);
        }
        Ok(Applied::Deleted {
            image_id,
            was_profile_picture: removed.is_profile_picture,
        })
    }

    fn apply_promote(
        &mut self,
        image_id: ImageId,
        result: Result<(), TransportError>,
    ) -> Result<Applied, GalleryError> {
        self.state.workflow.finish(image_id);

        result.map_err(|e| {
            warn!("⚠️  Setting profile picture {} failed: {}", image_id, e);
            GalleryError::request_failed(Operation::SetProfilePicture, e)
        })?;

        self.state
            .mutate(|store| store.mark_profile_picture(image_id))?;
        Ok(Applied::ProfilePictureSet { image_id })
    }

    // ========== Helpers ==========

    fn dispatch_fetch(&mut self, session: &SessionContext) -> PendingSync {
        self.state.fetches_sent += 1;
        self.state.fetches_in_flight += 1;

        let ticket = self.ticket(session.owner_id);
        let seq = self.state.fetches_sent;
        let transport = Arc::clone(&self.transport);
        let session = session.clone();
        Box::pin(async move {
            let result = transport.fetch_images(&session).await;
            SyncOutcome::Fetched {
                ticket,
                seq,
                result,
            }
        })
    }

    fn want_resync(&mut self) {
        if !matches!(self.state.resync, Resync::Wanted { .. }) {
            debug!("Gallery diverged from the server, resync wanted");
        }
        self.state.resync = Resync::Wanted {
            raised_at: self.state.fetches_sent,
        };
    }

    fn ticket(&self, owner_id: UserId) -> Ticket {
        Ticket {
            epoch: self.epoch,
            version: self.state.version,
            owner_id,
        }
    }

    fn check_session(&self, session: &SessionContext) -> Result<(), GalleryError> {
        let expected = match self.owner_id {
            Some(owner) if self.state.alive => owner,
            _ => return Err(GalleryError::NotReady),
        };
        if session.owner_id != expected {
            return Err(GalleryError::SessionMismatch {
                expected,
                got: session.owner_id,
            });
        }
        Ok(())
    }

    fn check_ready(&self, session: &SessionContext) -> Result<(), GalleryError> {
        self.check_session(session)?;
        if self.state.phase != Phase::Ready {
            return Err(GalleryError::NotReady);
        }
        Ok(())
    }
}

fn only_owned_by(records: Vec<ImageRecord>, owner_id: UserId) -> Vec<ImageRecord> {
    let total = records.len();
    let owned: Vec<ImageRecord> = records
        .into_iter()
        .filter(|record| record.owner_id == owner_id)
        .collect();
    if owned.len() != total {
        warn!("⚠️  Ignored {} images belonging to another user", total - owned.len());
    }
    owned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Fetch = Result<Vec<ImageRecord>, TransportError>;
    type Ack = Result<(), TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        fetches: Mutex<VecDeque<Fetch>>,
        uploads: Mutex<VecDeque<Fetch>>,
        deletes: Mutex<VecDeque<Ack>>,
        promotions: Mutex<VecDeque<Ack>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedTransport {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn next<R>(queue: &Mutex<VecDeque<Result<R, TransportError>>>) -> Result<R, TransportError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted reply".to_string())))
    }

    impl GalleryTransport for ScriptedTransport {
        async fn fetch_images(&self, _session: &SessionContext) -> Fetch {
            self.record("fetch");
            next(&self.fetches)
        }

        async fn upload_images(
            &self,
            _session: &SessionContext,
            _files: &[crate::state::data::NamedUpload],
        ) -> Fetch {
            self.record("upload");
            next(&self.uploads)
        }

        async fn delete_image(&self, _session: &SessionContext, _image_id: ImageId) -> Ack {
            self.record("delete");
            next(&self.deletes)
        }

        async fn set_profile_picture(&self, _session: &SessionContext, _image_id: ImageId) -> Ack {
            self.record("promote");
            next(&self.promotions)
        }
    }

    fn session() -> SessionContext {
        SessionContext::new(UserId(1), "token")
    }

    fn record(id: i64, profile: bool) -> ImageRecord {
        ImageRecord::new(id, format!("uploads/{}.jpg", id), profile, UserId(1))
    }

    fn files(n: usize) -> Vec<FileHandle> {
        (0..n).map(|i| FileHandle::new(format!("/picked/{}.jpg", i))).collect()
    }

    async fn loaded(transport: ScriptedTransport, images: Vec<ImageRecord>) -> (SyncEngine<ScriptedTransport>, Arc<ScriptedTransport>) {
        transport.fetches.lock().unwrap().push_back(Ok(images));
        let transport = Arc::new(transport);
        let mut engine = SyncEngine::with_shared(Arc::clone(&transport), 6);
        let outcome = engine.initialize(&session()).await;
        engine.apply(outcome).unwrap();
        (engine, transport)
    }

    #[tokio::test]
    async fn test_initialize_loads_sorted() {
        let (engine, _) = loaded(
            ScriptedTransport::default(),
            vec![record(1, false), record(2, true)],
        )
        .await;

        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.store().images()[0].id, ImageId(2));
        assert_eq!(engine.count_text(), "Photos (2/6)");
        assert_eq!(engine.remaining_text(), "You can add 4 more photos");
    }

    #[tokio::test]
    async fn test_failed_initial_load_blocks_mutations() {
        let transport = ScriptedTransport::default();
        transport
            .fetches
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Network("offline".to_string())));
        let mut engine = SyncEngine::new(transport, 6);

        let outcome = engine.initialize(&session()).await;
        let err = engine.apply(outcome).unwrap_err();

        assert!(matches!(err, GalleryError::RequestFailed { operation: Operation::FetchAll, .. }));
        assert_eq!(engine.phase(), Phase::LoadFailed);
        assert!(matches!(
            engine.upload_batch(&session(), files(1)),
            Err(GalleryError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_second_upload_rejected_while_pending() {
        let transport = ScriptedTransport::default();
        transport.uploads.lock().unwrap().push_back(Ok(vec![record(3, false)]));
        let (mut engine, transport) = loaded(transport, vec![record(1, true)]).await;

        let first = engine.upload_batch(&session(), files(1)).unwrap().unwrap();
        assert!(engine.is_uploading());
        assert!(!engine.can_add());

        assert!(matches!(
            engine.upload_batch(&session(), files(1)),
            Err(GalleryError::ConcurrentUploadRejected)
        ));

        let applied = engine.apply(first.await).unwrap();
        assert_eq!(applied, Applied::Uploaded { added: 1, requested: 1 });
        assert!(!engine.is_uploading());
        assert_eq!(transport.calls(), vec!["fetch", "upload"]);
    }

    #[tokio::test]
    async fn test_failed_upload_releases_guard_and_keeps_store() {
        let transport = ScriptedTransport::default();
        transport
            .uploads
            .lock()
            .unwrap()
            .push_back(Err(TransportError::rejected("Image too large")));
        let (mut engine, _) = loaded(transport, vec![record(1, true)]).await;
        let before = engine.store().clone();

        let pending = engine.upload_batch(&session(), files(2)).unwrap().unwrap();
        let err = engine.apply(pending.await).unwrap_err();

        assert_eq!(err.to_string(), "Failed to upload images: Image too large");
        assert!(!engine.is_uploading());
        assert_eq!(engine.store(), &before);
    }

    #[tokio::test]
    async fn test_over_capacity_never_reaches_network() {
        let (mut engine, transport) = loaded(
            ScriptedTransport::default(),
            (1..=4).map(|id| record(id, id == 1)).collect(),
        )
        .await;

        let err = engine.upload_batch(&session(), files(3)).err().unwrap();

        assert_eq!(err, GalleryError::CapacityExceeded { capacity: 6, remaining: 2 });
        assert!(!engine.is_uploading());
        assert_eq!(transport.calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_wrong_owner_fails_fast() {
        let (mut engine, transport) = loaded(ScriptedTransport::default(), vec![record(1, true)]).await;
        let stranger = SessionContext::new(UserId(99), "token");

        assert_eq!(
            engine.set_profile_picture(&stranger, ImageId(1)).err(),
            Some(GalleryError::SessionMismatch {
                expected: UserId(1),
                got: UserId(99),
            })
        );
        assert!(engine.fetch_all(&stranger).is_err());
        assert_eq!(transport.calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_delete_is_pessimistic() {
        let transport = ScriptedTransport::default();
        transport
            .deletes
            .lock()
            .unwrap()
            .push_back(Err(TransportError::rejected("Not allowed")));
        transport.deletes.lock().unwrap().push_back(Ok(()));
        let (mut engine, _) = loaded(transport, vec![record(1, true), record(2, false)]).await;

        assert_eq!(
            engine.request_delete(ImageId(1)).unwrap(),
            Intent::ConfirmDeletion { image_id: ImageId(1) }
        );
        let pending = engine.confirm_delete(&session(), ImageId(1)).unwrap();
        assert_eq!(engine.store().count(), 2);
        assert_eq!(engine.activity(ImageId(1)), Some(ImageActivity::Deleting));

        assert!(engine.apply(pending.await).is_err());
        assert_eq!(engine.store().count(), 2);
        assert_eq!(engine.activity(ImageId(1)), None);

        engine.request_delete(ImageId(1)).unwrap();
        let pending = engine.confirm_delete(&session(), ImageId(1)).unwrap();
        let applied = engine.apply(pending.await).unwrap();

        assert_eq!(
            applied,
            Applied::Deleted {
                image_id: ImageId(1),
                was_profile_picture: true,
            }
        );
        assert_eq!(engine.store().count(), 1);
        assert!(engine.store().profile_picture().is_none());
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_rejected() {
        let (mut engine, transport) = loaded(ScriptedTransport::default(), vec![record(1, true)]).await;

        assert_eq!(
            engine.confirm_delete(&session(), ImageId(1)).err(),
            Some(GalleryError::NoDeletionRequested(ImageId(1)))
        );

        engine.request_delete(ImageId(1)).unwrap();
        assert!(engine.cancel_delete(ImageId(1)));
        assert!(engine.confirm_delete(&session(), ImageId(1)).is_err());
        assert_eq!(transport.calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_promoting_profile_picture_is_noop() {
        let (mut engine, transport) = loaded(ScriptedTransport::default(), vec![record(1, true)]).await;

        assert!(engine.set_profile_picture(&session(), ImageId(1)).unwrap().is_none());
        assert_eq!(transport.calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_snapshot_older_than_mutation_is_discarded() {
        let transport = ScriptedTransport::default();
        transport.promotions.lock().unwrap().push_back(Ok(()));
        transport
            .fetches
            .lock()
            .unwrap()
            .push_back(Ok(vec![record(1, true), record(2, false)]));
        let (mut engine, _) = loaded(transport, vec![record(1, true), record(2, false)]).await;

        let refresh = engine.fetch_all(&session()).unwrap();
        let promote = engine.set_profile_picture(&session(), ImageId(2)).unwrap().unwrap();

        let promote_outcome = promote.await;
        let refresh_outcome = refresh.await;

        engine.apply(promote_outcome).unwrap();
        assert_eq!(engine.apply(refresh_outcome), Err(GalleryError::StaleResponse));
        assert_eq!(engine.store().images()[0].id, ImageId(2));
    }

    #[tokio::test]
    async fn test_response_after_teardown_is_noop() {
        let transport = ScriptedTransport::default();
        transport.uploads.lock().unwrap().push_back(Ok(vec![record(5, false)]));
        let (mut engine, _) = loaded(transport, vec![record(1, true)]).await;

        let pending = engine.upload_batch(&session(), files(1)).unwrap().unwrap();
        engine.teardown();

        assert_eq!(engine.apply(pending.await), Err(GalleryError::StaleResponse));
        assert_eq!(engine.store().count(), 1);
    }

    #[tokio::test]
    async fn test_response_from_previous_focus_is_ignored() {
        let transport = ScriptedTransport::default();
        transport.deletes.lock().unwrap().push_back(Ok(()));
        transport.fetches.lock().unwrap().push_back(Ok(vec![record(1, true), record(2, false)]));
        let (mut engine, _) = loaded(transport, vec![record(1, true), record(2, false)]).await;

        engine.request_delete(ImageId(2)).unwrap();
        let old_delete = engine.confirm_delete(&session(), ImageId(2)).unwrap();

        let reload = engine.initialize(&session());
        engine.apply(reload.await).unwrap();

        assert_eq!(engine.apply(old_delete.await), Err(GalleryError::StaleResponse));
        assert_eq!(engine.store().count(), 2);
    }

    #[tokio::test]
    async fn test_upload_without_returned_records_asks_for_resync() {
        let transport = ScriptedTransport::default();
        transport.uploads.lock().unwrap().push_back(Ok(Vec::new()));
        let (mut engine, _) = loaded(transport, Vec::new()).await;

        let pending = engine.upload_batch(&session(), files(2)).unwrap().unwrap();
        let applied = engine.apply(pending.await).unwrap();

        assert!(applied.needs_resync());
        assert!(engine.needs_resync());
    }

    #[tokio::test]
    async fn test_discarded_resync_snapshot_is_asked_for_again() {
        let transport = ScriptedTransport::default();
        transport.uploads.lock().unwrap().push_back(Ok(vec![record(3, false)]));
        let (mut engine, transport) = loaded(transport, vec![record(1, true), record(2, false)]).await;
        {
            let mut fetches = transport.fetches.lock().unwrap();
            fetches.push_back(Ok(vec![record(1, true), record(2, false)]));
            fetches.push_back(Ok(vec![record(1, true), record(2, false), record(3, false)]));
        }

        // Image 9 was removed on another device
        assert_eq!(
            engine.set_profile_picture(&session(), ImageId(9)).err(),
            Some(GalleryError::NotFound(ImageId(9)))
        );
        assert!(engine.needs_resync());

        let resync = engine.fetch_all(&session()).unwrap();
        assert!(!engine.needs_resync());

        let upload = engine.upload_batch(&session(), files(1)).unwrap().unwrap();
        engine.apply(upload.await).unwrap();
        assert_eq!(engine.apply(resync.await), Err(GalleryError::StaleResponse));
        assert!(engine.needs_resync());

        let retry = engine.fetch_all(&session()).unwrap();
        engine.apply(retry.await).unwrap();
        assert!(!engine.needs_resync());
        assert_eq!(engine.store().count(), 3);
    }

    #[tokio::test]
    async fn test_stale_snapshot_without_divergence_is_silent() {
        let transport = ScriptedTransport::default();
        transport.promotions.lock().unwrap().push_back(Ok(()));
        let (mut engine, transport) = loaded(transport, vec![record(1, true), record(2, false)]).await;
        transport
            .fetches
            .lock()
            .unwrap()
            .push_back(Ok(vec![record(1, true), record(2, false)]));

        let refresh = engine.fetch_all(&session()).unwrap();
        let promote = engine.set_profile_picture(&session(), ImageId(2)).unwrap().unwrap();
        engine.apply(promote.await).unwrap();

        assert_eq!(engine.apply(refresh.await), Err(GalleryError::StaleResponse));
        assert!(!engine.needs_resync());
    }

    #[tokio::test]
    async fn test_failed_resync_waits_for_manual_retry() {
        let (mut engine, transport) = loaded(ScriptedTransport::default(), vec![record(1, true)]).await;
        {
            let mut fetches = transport.fetches.lock().unwrap();
            fetches.push_back(Err(TransportError::Network("offline".to_string())));
            fetches.push_back(Ok(vec![record(1, true)]));
        }

        assert!(engine.request_delete(ImageId(7)).is_err());
        let resync = engine.fetch_all(&session()).unwrap();
        assert!(engine.apply(resync.await).is_err());

        assert_eq!(engine.phase(), Phase::Ready);
        assert!(!engine.needs_resync());
        assert!(engine.resync_failed());

        let retry = engine.fetch_all(&session()).unwrap();
        engine.apply(retry.await).unwrap();
        assert!(!engine.resync_failed());
    }

    #[tokio::test]
    async fn test_confirmed_upload_that_no_longer_fits_resyncs() {
        let transport = ScriptedTransport::default();
        transport
            .uploads
            .lock()
            .unwrap()
            .push_back(Ok(vec![record(7, false), record(8, false)]));
        let (mut engine, transport) =
            loaded(transport, (1..=4).map(|id| record(id, id == 1)).collect()).await;
        transport
            .fetches
            .lock()
            .unwrap()
            .push_back(Ok((1..=6).map(|id| record(id, id == 1)).collect()));

        let upload = engine.upload_batch(&session(), files(2)).unwrap().unwrap();
        let refresh = engine.fetch_all(&session()).unwrap();

        // Another device filled the gallery before this upload was confirmed
        engine.apply(refresh.await).unwrap();
        let err = engine.apply(upload.await).unwrap_err();

        assert_eq!(
            err,
            GalleryError::Diverged {
                operation: Operation::UploadBatch,
            }
        );
        assert_eq!(Intent::for_error(&err), Some(Intent::Resync));
        assert!(engine.needs_resync());
        assert!(!engine.is_uploading());
        assert_eq!(engine.store().count(), 6);
    }

    #[tokio::test]
    async fn test_viewer_closes_when_snapshot_reorders_shown_image() {
        let (mut engine, transport) = loaded(
            ScriptedTransport::default(),
            vec![record(1, true), record(2, false), record(3, false)],
        )
        .await;
        {
            let mut fetches = transport.fetches.lock().unwrap();
            fetches.push_back(Ok(vec![record(1, true), record(2, false), record(3, false)]));
            fetches.push_back(Ok(vec![record(1, false), record(2, false), record(3, true)]));
        }
        engine.open_viewer(1).unwrap();

        // Same order: the viewer stays on image 2
        let same = engine.fetch_all(&session()).unwrap();
        engine.apply(same.await).unwrap();
        assert_eq!(engine.viewer().current(engine.store()).map(|i| i.id), Some(ImageId(2)));

        // Image 3 became the profile picture elsewhere and moved to the front
        let reordered = engine.fetch_all(&session()).unwrap();
        engine.apply(reordered.await).unwrap();
        assert_eq!(engine.store().images()[1].id, ImageId(1));
        assert!(!engine.viewer().is_open());
    }

    #[tokio::test]
    async fn test_viewer_closes_when_upload_brings_profile_picture() {
        let transport = ScriptedTransport::default();
        transport.uploads.lock().unwrap().push_back(Ok(vec![record(5, true)]));
        let (mut engine, _) = loaded(transport, vec![record(1, false), record(2, false)]).await;

        engine.open_viewer(0).unwrap();
        let pending = engine.upload_batch(&session(), files(1)).unwrap().unwrap();
        assert!(engine.viewer().is_open());

        engine.apply(pending.await).unwrap();

        assert_eq!(engine.store().images()[0].id, ImageId(5));
        assert!(!engine.viewer().is_open());
    }

    #[tokio::test]
    async fn test_viewer_closes_when_shown_image_is_promoted() {
        let transport = ScriptedTransport::default();
        transport.promotions.lock().unwrap().push_back(Ok(()));
        let (mut engine, _) =
            loaded(transport, vec![record(1, true), record(2, false), record(3, false)]).await;

        engine.open_viewer(2).unwrap();
        let pending = engine.set_profile_picture(&session(), ImageId(3)).unwrap().unwrap();
        engine.apply(pending.await).unwrap();

        assert_eq!(engine.store().images()[0].id, ImageId(3));
        assert_eq!(engine.store().images()[2].id, ImageId(2));
        assert!(!engine.viewer().is_open());
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let (mut engine, transport) = loaded(ScriptedTransport::default(), Vec::new()).await;

        assert!(engine.upload_batch(&session(), Vec::new()).unwrap().is_none());
        assert!(!engine.is_uploading());
        assert_eq!(transport.calls(), vec!["fetch"]);
    }
}
