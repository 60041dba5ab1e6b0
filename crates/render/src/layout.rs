//! Width fitting and state colours shared by the renderers

use rg_status_core::constants::MAX_SECTION_WIDTH;
use rg_status_types::{Align, Color, State};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: char = '…';

/// Apply a section's width rule to `text`.
///
/// Positive `max_width` is a fixed width: longer text is truncated and
/// shorter text padded on the side `align` leaves free. Negative is a
/// maximum only. Zero leaves the text alone. Widths are display columns,
/// at most `MAX_SECTION_WIDTH`.
pub fn fit(text: &str, max_width: i64, align: Align) -> String {
    let max_width = max_width.clamp(-MAX_SECTION_WIDTH, MAX_SECTION_WIDTH);
    if max_width == 0 {
        return text.to_string();
    }
    let limit = usize::try_from(max_width.unsigned_abs()).unwrap_or(usize::MAX);
    let truncated = truncate(text, limit);
    if max_width > 0 {
        pad(truncated, limit, align)
    } else {
        truncated
    }
}

/// Cut `text` to at most `limit` columns, marking the cut with an ellipsis
pub fn truncate(text: &str, limit: usize) -> String {
    if text.width() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let budget = limit - 1;
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    out
}

fn pad(text: String, width: usize, align: Align) -> String {
    let gap = width.saturating_sub(text.width());
    if gap == 0 {
        return text;
    }
    let (left, right) = match align {
        Align::Left => (0, gap),
        Align::Right => (gap, 0),
        Align::Center => (gap / 2, gap - gap / 2),
    };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Colour used for a state when the section sets none
pub fn state_colour(state: State) -> Option<Color> {
    match state {
        State::NoState => None,
        State::Good => Some(Color::from_rgba8(0x98, 0xc3, 0x79, 0xff)),
        State::Average => Some(Color::from_rgba8(0xe5, 0xc0, 0x7b, 0xff)),
        State::Bad => Some(Color::from_rgba8(0xe0, 0x6c, 0x75, 0xff)),
        State::Unavailable => Some(Color::from_rgba8(0x7f, 0x84, 0x8e, 0xff)),
    }
}
