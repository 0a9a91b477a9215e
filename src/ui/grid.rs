use iced::widget::{button, column, container, image, row, text, Column, Row};
use iced::{Alignment, ContentFit, Element, Length};

use profile_gallery::gallery::workflow::ImageActivity;
use profile_gallery::state::data::ImageRecord;
use profile_gallery::state::store::ImageStore;

use crate::Message;

/// Tiles per grid row
const COLUMNS: usize = 3;
const TILE_SIZE: f32 = 140.0;

/// Everything the grid needs to render, read from the engine
pub struct GridModel<'a, 'f> {
    pub store: &'a ImageStore,
    pub count_text: String,
    pub remaining_text: String,
    pub can_add: bool,
    pub uploading: bool,
    pub activity: &'f dyn Fn(&ImageRecord) -> Option<ImageActivity>,
    /// Downloaded picture, None while it is still loading
    pub thumbnail: &'f dyn Fn(&ImageRecord) -> Option<image::Handle>,
}

/// The "My Gallery" page: header, counter and a 3-column grid of tiles
pub fn view<'a>(model: GridModel<'a, '_>) -> Element<'a, Message> {
    let add_button = button(text("+ Add Photos"))
        .on_press_maybe(model.can_add.then_some(Message::AddPhotos))
        .padding(10);

    let header = row![text("My Gallery").size(28), add_button]
        .spacing(20)
        .align_y(Alignment::Center);

    let mut content: Column<Message> = column![
        header,
        text(model.count_text).size(20),
        text(model.remaining_text).size(14),
    ]
    .spacing(12);

    if model.store.is_empty() {
        content = content.push(text("No Photos Yet").size(24));
    } else {
        for (row_index, chunk) in model.store.images().chunks(COLUMNS).enumerate() {
            let mut tiles: Row<Message> = Row::new().spacing(10);
            for (offset, record) in chunk.iter().enumerate() {
                let index = row_index * COLUMNS + offset;
                tiles = tiles.push(tile(
                    index,
                    record,
                    (model.activity)(record),
                    (model.thumbnail)(record),
                ));
            }
            content = content.push(tiles);
        }
    }

    if model.uploading {
        content = content.push(text("Uploading photos...").size(16));
    }

    container(content.padding(30))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn tile<'a>(
    index: usize,
    record: &'a ImageRecord,
    activity: Option<ImageActivity>,
    thumbnail: Option<image::Handle>,
) -> Element<'a, Message> {
    let badge = if record.is_profile_picture { "★ Profile" } else { "" };
    let status = match activity {
        Some(ImageActivity::Deleting) => "Deleting...",
        Some(ImageActivity::Promoting) => "Updating...",
        _ => "",
    };

    let picture: Element<'a, Message> = match thumbnail {
        Some(handle) => image(handle)
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Cover)
            .into(),
        None => text(file_label(&record.path)).size(12).into(),
    };

    let preview = button(column![picture, text(badge).size(12), text(status).size(12)].spacing(4))
    .on_press(Message::OpenViewer(index))
    .width(Length::Fixed(TILE_SIZE))
    .height(Length::Fixed(TILE_SIZE));

    // No second request while one is in flight for this image
    let delete = button(text("Delete").size(12))
        .on_press_maybe(activity.is_none().then_some(Message::RequestDelete(record.id)));

    column![preview, delete].spacing(4).into()
}

/// Last path segment, for a readable tile caption
pub fn file_label(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
