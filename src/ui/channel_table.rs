//! Channel table UI component.
//!
//! Renders a scrollable table of the score's channels with columns for
//! channel number, mute toggle, sounding notes and the loudest velocity.

use iced::widget::{button, column, container, row, scrollable, text, Column};
use iced::{Background, Border, Color, Element, Length, Theme};

use crate::midi::note_name;
use crate::ui::ProgressView;

/// Column widths for consistent table layout.
const COL_CH_WIDTH: f32 = 40.0;
const COL_MUTE_WIDTH: f32 = 60.0;
const COL_NOTES_WIDTH: f32 = 250.0;
const COL_VEL_WIDTH: f32 = 50.0;
const ROW_HEIGHT: f32 = 36.0;

/// Row highlighting colors.
fn row_background(is_sounding: bool, is_muted: bool) -> Color {
    if is_muted {
        Color::from_rgb(0.08, 0.08, 0.08) // Near black
    } else if is_sounding {
        Color::from_rgb(0.15, 0.45, 0.15) // Green
    } else {
        Color::from_rgb(0.12, 0.12, 0.12) // Dark grey
    }
}

/// Header text color.
fn header_color() -> Color {
    Color::from_rgb(0.7, 0.7, 0.7)
}

/// Cell text color.
fn cell_color(is_muted: bool) -> Color {
    if is_muted {
        Color::from_rgb(0.45, 0.45, 0.45)
    } else {
        Color::from_rgb(0.9, 0.9, 0.9)
    }
}

/// Space-separated note names, e.g. `C4 E4 G4`.
pub fn notes_label(notes: &[(u8, u8)]) -> String {
    if notes.is_empty() {
        return "--".to_string();
    }
    notes
        .iter()
        .map(|(note, _)| note_name(*note))
        .collect::<Vec<_>>()
        .join(" ")
}

fn header_cell<'a, M: 'a>(label: &'a str, width: f32) -> Element<'a, M> {
    container(text(label).size(12).color(header_color()))
        .width(Length::Fixed(width))
        .padding([4, 8])
        .center_y(Length::Fixed(ROW_HEIGHT))
        .into()
}

/// Render the table header row.
fn view_table_header<'a, M: 'a>() -> Element<'a, M> {
    container(
        row![
            header_cell("CH", COL_CH_WIDTH),
            header_cell("MUTE", COL_MUTE_WIDTH),
            header_cell("NOTES", COL_NOTES_WIDTH),
            header_cell("VEL", COL_VEL_WIDTH),
        ]
        .spacing(2),
    )
    .style(|_theme: &Theme| container::Style {
        background: Some(Background::Color(Color::from_rgb(0.08, 0.08, 0.08))),
        border: Border::default().rounded(2),
        ..Default::default()
    })
    .into()
}

/// Render a single table row for a channel.
fn view_channel_row<'a, M: 'a + Clone>(
    channel: u8,
    notes: Vec<(u8, u8)>,
    is_muted: bool,
    on_toggle_mute: M,
) -> Element<'a, M> {
    let bg_color = row_background(!notes.is_empty(), is_muted);
    let txt_color = cell_color(is_muted);
    let velocity = notes
        .iter()
        .map(|(_, velocity)| *velocity)
        .max()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "--".to_string());

    let mute_btn = button(text(if is_muted { "M" } else { "-" }).size(12).color(txt_color))
        .on_press(on_toggle_mute)
        .padding([1, 8])
        .style(move |_theme, _status| button::Style {
            background: Some(Background::Color(if is_muted {
                Color::from_rgb(0.6, 0.2, 0.2)
            } else {
                Color::from_rgb(0.25, 0.25, 0.25)
            })),
            text_color: txt_color,
            border: Border::default().rounded(2),
            ..Default::default()
        });

    container(
        row![
            container(text((channel + 1).to_string()).size(14).color(txt_color))
                .width(Length::Fixed(COL_CH_WIDTH))
                .padding([4, 8])
                .center_y(Length::Fixed(ROW_HEIGHT)),
            container(mute_btn)
                .width(Length::Fixed(COL_MUTE_WIDTH))
                .padding([2, 4])
                .center_y(Length::Fixed(ROW_HEIGHT)),
            container(text(notes_label(&notes)).size(14).color(txt_color))
                .width(Length::Fixed(COL_NOTES_WIDTH))
                .padding([4, 8])
                .center_y(Length::Fixed(ROW_HEIGHT)),
            container(text(velocity).size(14).color(txt_color))
                .width(Length::Fixed(COL_VEL_WIDTH))
                .padding([4, 8])
                .center_y(Length::Fixed(ROW_HEIGHT)),
        ]
        .spacing(2),
    )
    .style(move |_theme: &Theme| container::Style {
        background: Some(Background::Color(bg_color)),
        border: Border::default().rounded(2),
        ..Default::default()
    })
    .height(Length::Fixed(ROW_HEIGHT))
    .into()
}

/// Build the scrollable channel table.
///
/// `channels` are 0-indexed and displayed 1-indexed. `on_toggle_mute` is
/// invoked with the 0-indexed channel when its mute button is clicked.
pub fn view_channel_table<'a, M: 'a + Clone>(
    channels: &[u8],
    progress: &ProgressView,
    is_muted: impl Fn(u8) -> bool,
    on_toggle_mute: impl Fn(u8) -> M + 'a + Copy,
) -> Element<'a, M> {
    let rows: Vec<Element<'a, M>> = channels
        .iter()
        .map(|&channel| {
            view_channel_row(
                channel,
                progress.notes_on(channel).collect(),
                is_muted(channel),
                on_toggle_mute(channel),
            )
        })
        .collect();

    let table_content = column![view_table_header(), Column::with_children(rows).spacing(2),]
        .spacing(4)
        .padding(8);

    scrollable(table_content)
        .height(Length::Fixed(340.0))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_label() {
        assert_eq!(notes_label(&[]), "--");
        assert_eq!(notes_label(&[(60, 100), (64, 90), (67, 80)]), "C4 E4 G4");
    }

    #[test]
    fn test_muted_row_background_wins() {
        assert_eq!(row_background(true, true), row_background(false, true));
        assert_ne!(row_background(true, false), row_background(false, false));
    }
}
