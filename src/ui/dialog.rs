use iced::widget::{button, column, container, row, text};
use iced::{Alignment, Element, Length};

use profile_gallery::state::data::ImageId;

use crate::Message;

/// A modal prompt rendered in place of the page
#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    ConfirmDeletion(ImageId),
    Alert { title: String, message: String },
}

pub fn view(dialog: &Dialog) -> Element<'_, Message> {
    let content = match dialog {
        Dialog::ConfirmDeletion(image_id) => column![
            text("Delete Image").size(24),
            text("Are you sure you want to delete this image?").size(16),
            row![
                button(text("Cancel")).on_press(Message::CancelDelete(*image_id)),
                button(text("Delete")).on_press(Message::ConfirmDelete(*image_id)),
            ]
            .spacing(20),
        ],
        Dialog::Alert { title, message } => column![
            text(title).size(24),
            text(message).size(16),
            button(text("OK")).on_press(Message::DismissDialog),
        ],
    };

    container(content.spacing(20).padding(40).align_x(Alignment::Center))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
