use iced::widget::{button, column, container, image, row, text};
use iced::{Alignment, ContentFit, Element, Length};

use profile_gallery::state::data::ImageRecord;

use super::grid::file_label;
use crate::Message;

/// Full-screen viewer page: "i of n" header, image, paging and actions
pub fn view<'a>(
    record: &'a ImageRecord,
    index: usize,
    counter: String,
    total: usize,
    picture: Option<image::Handle>,
) -> Element<'a, Message> {
    let header = row![
        text(counter).size(16),
        button(text("Close")).on_press(Message::CloseViewer),
    ]
    .spacing(20)
    .align_y(Alignment::Center);

    let paging = row![
        button(text("‹ Prev")).on_press_maybe((index > 0).then(|| Message::Swipe(index as isize - 1))),
        button(text("Next ›")).on_press_maybe((index + 1 < total).then(|| Message::Swipe(index as isize + 1))),
    ]
    .spacing(20);

    let mut actions = row![].spacing(20).align_y(Alignment::Center);
    if record.is_profile_picture {
        actions = actions.push(text("★ Profile Picture").size(14));
    } else {
        actions = actions.push(
            button(text("Set as Profile Picture")).on_press(Message::SetProfilePicture(record.id)),
        );
    }
    actions = actions.push(button(text("Delete")).on_press(Message::RequestDelete(record.id)));

    let picture: Element<'a, Message> = match picture {
        Some(handle) => image(handle)
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Contain)
            .into(),
        None => text("Loading image...").size(16).into(),
    };

    let content = column![
        header,
        container(picture)
            .width(Length::Fill)
            .height(Length::FillPortion(4))
            .center_x(Length::Fill)
            .center_y(Length::Fill),
        text(file_label(&record.path)).size(14),
        paging,
        actions,
    ]
    .spacing(20)
    .padding(40)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
