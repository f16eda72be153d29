use iced::alignment::Vertical;
use iced::widget::{column, container, image, stack, text, Space};
use iced::{Background, Border, Color, ContentFit, Element, Length, Theme};

use selfie_wall::color::Rgba;
use selfie_wall::engine::SlotView;
use selfie_wall::state::display::DisplayConfig;

const CORNER_RADIUS: f32 = 8.0;

/// Faint fill so empty slots still read as part of the grid
const EMPTY_FILL: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 0.03 };

pub fn to_color(rgba: Rgba) -> Color {
    Color::from_rgba(rgba.r, rgba.g, rgba.b, rgba.a)
}

/// White text at `alpha` opacity, for overlays on top of photos
pub fn dimmed_white(alpha: f32) -> Color {
    to_color(Rgba::WHITE.scale_alpha(alpha))
}

/// One cell of the wall, empty or showing a selfie
pub fn cell<'a, Message: 'a>(slot: Option<SlotView>, config: &DisplayConfig) -> Element<'a, Message> {
    let border_color = to_color(config.border());
    let border_width = config.frame_border_width;

    let content: Element<'a, Message> = match slot {
        Some(view) => occupied(view, config),
        None => Space::new(Length::Fill, Length::Fill).into(),
    };

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(border_width)
        .style(move |_theme: &Theme| container::Style {
            background: Some(Background::Color(EMPTY_FILL)),
            border: Border {
                color: border_color,
                width: border_width,
                radius: CORNER_RADIUS.into(),
            },
            ..container::Style::default()
        })
        .into()
}

fn occupied<'a, Message: 'a>(view: SlotView, config: &DisplayConfig) -> Element<'a, Message> {
    let photo: Element<'a, Message> = if is_remote(&view.image_ref) {
        // No HTTP client here; remote uploads need a local copy first
        container(text("image unavailable").size(14).color(dimmed_white(0.5)))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    } else {
        image(image::Handle::from_path(&view.image_ref))
            .content_fit(ContentFit::Cover)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    };

    match caption(&view, config) {
        Some(caption) => stack![photo, caption]
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        None => photo,
    }
}

/// Name (and optionally message) pinned to the bottom of the photo.
/// Without a display name there is no caption at all.
fn caption<'a, Message: 'a>(view: &SlotView, config: &DisplayConfig) -> Option<Element<'a, Message>> {
    if !config.show_names {
        return None;
    }
    let name = view.display_name.clone()?;

    let mut lines = column![text(name).size(18).color(Color::WHITE)].spacing(2);
    if config.show_messages {
        if let Some(message) = view.message.clone() {
            lines = lines.push(text(message).size(14).color(dimmed_white(0.8)));
        }
    }

    let overlay = Color::from_rgba(0.0, 0.0, 0.0, config.overlay_opacity);
    let band = container(lines)
        .width(Length::Fill)
        .padding([8, 12])
        .style(move |_theme: &Theme| container::Style {
            background: Some(Background::Color(overlay)),
            ..container::Style::default()
        });

    Some(
        container(band)
            .width(Length::Fill)
            .height(Length::Fill)
            .align_y(Vertical::Bottom)
            .into(),
    )
}

fn is_remote(image_ref: &str) -> bool {
    image_ref.starts_with("http://") || image_ref.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_refs_are_detected() {
        assert!(is_remote("https://cdn.example.com/a.jpg"));
        assert!(!is_remote("/srv/selfies/a.jpg"));
    }

    #[test]
    fn test_dimmed_white_scales_alpha_only() {
        assert_eq!(dimmed_white(0.8), Color::from_rgba(1.0, 1.0, 1.0, 0.8));
        assert_eq!(dimmed_white(2.0).a, 1.0);
    }

    #[test]
    fn test_color_conversion_keeps_alpha() {
        let color = to_color(Rgba { r: 1.0, g: 0.5, b: 0.0, a: 0.25 });
        assert_eq!(color, Color::from_rgba(1.0, 0.5, 0.0, 0.25));
    }
}
