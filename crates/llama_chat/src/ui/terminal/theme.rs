// Colors and shared styles for the chat screen.

use ratatui::style::{Color, Modifier, Style};

use crate::types::Role;

pub const PURPLE: Color = Color::Rgb(0x88, 0x39, 0xef);
pub const TEAL: Color = Color::Rgb(0x00, 0xba, 0xba);
pub const CREAM: Color = Color::Rgb(0xff, 0xfd, 0xf5);
pub const GRAY: Color = Color::Rgb(0xaa, 0xaa, 0xaa);
pub const LAVENDER: Color = Color::Rgb(114, 135, 253);
pub const NOTIFICATION: Color = Color::Rgb(0xff, 0x99, 0x00);
pub const BLACK: Color = Color::Rgb(0, 0, 0);

/// Border color of an unselected bubble.
pub fn role_color(role: Role) -> Color {
    match role {
        Role::User => PURPLE,
        Role::Assistant => LAVENDER,
        Role::System => GRAY,
    }
}

/// Label tab style: bold text on the border color.
pub fn tab_style(color: Color) -> Style {
    let fg = if color == TEAL || color == NOTIFICATION {
        BLACK
    } else {
        CREAM
    };
    Style::default()
        .bg(color)
        .fg(fg)
        .add_modifier(Modifier::BOLD)
}

pub fn hint_key_style() -> Style {
    Style::default().fg(GRAY).add_modifier(Modifier::BOLD)
}

pub fn hint_text_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::DIM)
}

/// Darken a cell color toward black. Used to emulate a translucent layer
/// behind overlays. Non-RGB colors fall back to `fallback`.
pub fn dim_color(color: Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let (r, g, b) = blend((0, 0, 0), (r, g, b), 0.5);
            Color::Rgb(r, g, b)
        }
        Color::Reset => Color::Reset,
        _ => fallback,
    }
}

/// Blend `fg` over `bg` at the given alpha (0.0 = fully bg, 1.0 = fully fg).
fn blend(fg: (u8, u8, u8), bg: (u8, u8, u8), alpha: f32) -> (u8, u8, u8) {
    let r = (fg.0 as f32 * alpha + bg.0 as f32 * (1.0 - alpha)) as u8;
    let g = (fg.1 as f32 * alpha + bg.1 as f32 * (1.0 - alpha)) as u8;
    let b = (fg.2 as f32 * alpha + bg.2 as f32 * (1.0 - alpha)) as u8;
    (r, g, b)
}
