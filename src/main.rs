use std::collections::HashMap;

use iced::widget::{button, column, container, image, row, text};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::FileDialog;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use profile_gallery::state::session::SessionStore;
use profile_gallery::{
    Applied, Config, FileHandle, GalleryError, HttpTransport, ImageId, ImageRecord, Intent, Phase,
    SessionContext, SyncEngine, SyncOutcome, TransportError, UserId,
};

mod ui;

use ui::dialog::Dialog;

/// Host gallery screen
struct GalleryScreen {
    engine: SyncEngine<HttpTransport>,
    /// Shared with the engine; also downloads the pictures
    transport: HttpTransport,
    /// Downloaded pictures; None while the download runs
    pictures: HashMap<ImageId, Option<image::Handle>>,
    session: Option<SessionContext>,
    config: Config,
    /// Last status line shown under the page
    status: String,
    dialog: Option<Dialog>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// A request finished
    Synced(SyncOutcome),
    PictureLoaded(ImageId, Result<Vec<u8>, TransportError>),
    /// User asked to reload after a failed load
    Retry,
    AddPhotos,
    OpenViewer(usize),
    Swipe(isize),
    CloseViewer,
    RequestDelete(ImageId),
    ConfirmDelete(ImageId),
    CancelDelete(ImageId),
    SetProfilePicture(ImageId),
    DismissDialog,
}

impl GalleryScreen {
    fn new() -> (Self, Task<Message>) {
        let config = Config::load();

        // If this fails, we panic because the screen cannot reach the backend
        let transport = HttpTransport::new(&config)
            .expect("Failed to build HTTP client. Check TLS configuration.");
        let mut engine = SyncEngine::new(transport.clone(), config.capacity);

        let session = load_session();
        let (status, task) = match &session {
            Some(session) => {
                let pending = engine.initialize(session);
                (
                    "Loading gallery...".to_string(),
                    Task::perform(pending, Message::Synced),
                )
            }
            None => ("No saved session. Log in first.".to_string(), Task::none()),
        };

        (
            GalleryScreen {
                engine,
                transport,
                pictures: HashMap::new(),
                session,
                config,
                status,
                dialog: None,
            },
            task,
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let Some(session) = self.session.clone() else {
            return Task::none();
        };

        match message {
            Message::Synced(outcome) => {
                let presented = match self.engine.apply(outcome) {
                    Ok(applied) => self.on_applied(&session, applied),
                    Err(e) => self.on_error(&session, e),
                };
                let resync = if self.engine.needs_resync() {
                    self.present(&session, Intent::Resync)
                } else {
                    Task::none()
                };
                Task::batch([presented, resync, self.load_pictures(&session)])
            }
            Message::PictureLoaded(image_id, result) => {
                match result {
                    Ok(bytes) => {
                        if let Some(slot) = self.pictures.get_mut(&image_id) {
                            *slot = Some(image::Handle::from_bytes(bytes));
                        }
                    }
                    Err(e) => {
                        // Dropped so the next applied change retries it
                        warn!("⚠️  Could not download image {}: {}", image_id, e);
                        self.pictures.remove(&image_id);
                    }
                }
                Task::none()
            }
            Message::Retry => match self.engine.fetch_all(&session) {
                Ok(pending) => {
                    self.status = "Loading gallery...".to_string();
                    Task::perform(pending, Message::Synced)
                }
                Err(e) => self.on_error(&session, e),
            },
            Message::AddPhotos => {
                // Show the native file picker dialog
                let picked = FileDialog::new()
                    .set_title("Select Photos")
                    .add_filter("Images", &["jpg", "jpeg", "png", "heic", "webp"])
                    .pick_files();

                let Some(paths) = picked else {
                    return Task::none();
                };
                let files = paths.into_iter().map(FileHandle::new).collect();

                match self.engine.upload_batch(&session, files) {
                    Ok(Some(pending)) => {
                        self.status = "Uploading photos...".to_string();
                        Task::perform(pending, Message::Synced)
                    }
                    Ok(None) => Task::none(),
                    Err(e) => self.on_error(&session, e),
                }
            }
            Message::OpenViewer(index) => {
                if let Err(e) = self.engine.open_viewer(index) {
                    warn!("⚠️  {}", e);
                }
                Task::none()
            }
            Message::Swipe(index) => {
                self.engine.swipe_viewer(index);
                Task::none()
            }
            Message::CloseViewer => {
                self.engine.close_viewer();
                Task::none()
            }
            Message::RequestDelete(image_id) => match self.engine.request_delete(image_id) {
                Ok(intent) => self.present(&session, intent),
                Err(e) => self.on_error(&session, e),
            },
            Message::CancelDelete(image_id) => {
                self.engine.cancel_delete(image_id);
                self.dialog = None;
                Task::none()
            }
            Message::ConfirmDelete(image_id) => {
                self.dialog = None;
                match self.engine.confirm_delete(&session, image_id) {
                    Ok(pending) => Task::perform(pending, Message::Synced),
                    Err(e) => self.on_error(&session, e),
                }
            }
            Message::SetProfilePicture(image_id) => {
                match self.engine.set_profile_picture(&session, image_id) {
                    Ok(Some(pending)) => Task::perform(pending, Message::Synced),
                    Ok(None) => Task::none(),
                    Err(e) => self.on_error(&session, e),
                }
            }
            Message::DismissDialog => {
                self.dialog = None;
                Task::none()
            }
        }
    }

    fn on_applied(&mut self, session: &SessionContext, applied: Applied) -> Task<Message> {
        if let Applied::Loaded { count } = applied {
            self.status = format!("Ready. {} images in gallery.", count);
        }

        applied
            .intent()
            .map(|intent| self.present(session, intent))
            .unwrap_or_else(Task::none)
    }

    /// Start downloads for pictures not seen yet, forget removed ones
    fn load_pictures(&mut self, session: &SessionContext) -> Task<Message> {
        let store = self.engine.store();
        self.pictures.retain(|id, _| store.find(*id).is_some());

        let mut downloads = Vec::new();
        for record in store.images() {
            if self.pictures.contains_key(&record.id) {
                continue;
            }
            self.pictures.insert(record.id, None);

            let transport = self.transport.clone();
            let session = session.clone();
            let uri = record.display_uri(&self.config.base_url);
            let image_id = record.id;
            downloads.push(Task::perform(
                async move { transport.fetch_image(&session, &uri).await },
                move |result| Message::PictureLoaded(image_id, result),
            ));
        }
        Task::batch(downloads)
    }

    fn picture(&self, record: &ImageRecord) -> Option<image::Handle> {
        self.pictures.get(&record.id).cloned().flatten()
    }

    fn on_error(&mut self, session: &SessionContext, e: GalleryError) -> Task<Message> {
        match Intent::for_error(&e) {
            Some(intent) => {
                warn!("⚠️  {}", e);
                self.present(session, intent)
            }
            None => Task::none(),
        }
    }

    /// Render an intent from the gallery core
    fn present(&mut self, session: &SessionContext, intent: Intent) -> Task<Message> {
        match intent {
            Intent::ConfirmDeletion { image_id } => {
                self.dialog = Some(Dialog::ConfirmDeletion(image_id));
                Task::none()
            }
            Intent::ShowError { title, message } => {
                self.dialog = Some(Dialog::Alert { title, message });
                Task::none()
            }
            Intent::ShowRetry { message } => {
                self.status = format!("Failed to load images: {}", message);
                Task::none()
            }
            Intent::Notify { message } => {
                self.status = message;
                Task::none()
            }
            Intent::Resync => match self.engine.fetch_all(session) {
                Ok(pending) => Task::perform(pending, Message::Synced),
                Err(e) => {
                    error!("❌ Resync failed to start: {}", e);
                    Task::none()
                }
            },
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        if let Some(dialog) = &self.dialog {
            return ui::dialog::view(dialog);
        }

        match self.engine.phase() {
            Phase::Loading => return centered(column![text("Loading gallery...").size(16)]),
            Phase::LoadFailed => {
                return centered(column![
                    text(&self.status).size(16),
                    button("Retry").on_press(Message::Retry).padding(10),
                ])
            }
            Phase::Ready => {}
        }

        let store = self.engine.store();
        if let (Some(index), Some(record)) = (
            self.engine.viewer().index(),
            self.engine.viewer().current(store),
        ) {
            return ui::viewer::view(
                record,
                index,
                self.engine.viewer().counter_text(store).unwrap_or_default(),
                store.count(),
                self.picture(record),
            );
        }

        let activity = |record: &ImageRecord| self.engine.activity(record.id);
        let thumbnail = |record: &ImageRecord| self.picture(record);
        let grid = ui::grid::view(ui::grid::GridModel {
            store,
            count_text: self.engine.count_text(),
            remaining_text: self.engine.remaining_text(),
            can_add: self.engine.can_add(),
            uploading: self.engine.is_uploading(),
            activity: &activity,
            thumbnail: &thumbnail,
        });

        let mut status = row![text(&self.status).size(14)]
            .spacing(20)
            .align_y(Alignment::Center);
        if self.engine.resync_failed() {
            status = status.push(button("Reload").on_press(Message::Retry).padding(6));
        }

        column![grid, status].padding(10).into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn centered(content: iced::widget::Column<'_, Message>) -> Element<'_, Message> {
    container(content.spacing(20).padding(40).align_x(Alignment::Center))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Read the logged-in user from the local session store.
/// `GALLERY_USER_ID` / `GALLERY_TOKEN` replace the stored session when both are set.
fn load_session() -> Option<SessionContext> {
    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Could not open session store: {}", e);
            return None;
        }
    };

    let from_env = std::env::var("GALLERY_USER_ID")
        .ok()
        .and_then(|id| id.trim().parse().ok())
        .zip(std::env::var("GALLERY_TOKEN").ok())
        .map(|(id, token)| SessionContext::new(UserId(id), token));

    if let Some(session) = from_env {
        if let Err(e) = store.save(&session) {
            warn!("⚠️  Could not save session: {}", e);
        }
        return Some(session);
    }

    match store.load() {
        Ok(session) => session,
        Err(e) => {
            error!("❌ Could not read session: {}", e);
            None
        }
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🎨 Profile Gallery starting");

    iced::application("Profile Gallery", GalleryScreen::update, GalleryScreen::view)
        .theme(GalleryScreen::theme)
        .centered()
        .run_with(GalleryScreen::new)
}
