//! ffmpeg filter fragments for the optional watermark overlay.

use coursecast_core::job::WatermarkPosition;

const MARGIN: u32 = 10;

/// Overlay coordinates for an image watermark (`overlay=` filter variables).
pub fn overlay_coords(position: WatermarkPosition) -> String {
    match position {
        WatermarkPosition::TopLeft => format!("{MARGIN}:{MARGIN}"),
        WatermarkPosition::TopRight => format!("main_w-overlay_w-{MARGIN}:{MARGIN}"),
        WatermarkPosition::BottomLeft => format!("{MARGIN}:main_h-overlay_h-{MARGIN}"),
        WatermarkPosition::BottomRight => {
            format!("main_w-overlay_w-{MARGIN}:main_h-overlay_h-{MARGIN}")
        }
        WatermarkPosition::Center => "(main_w-overlay_w)/2:(main_h-overlay_h)/2".into(),
    }
}

/// x/y expressions for `drawtext`.
fn drawtext_coords(position: WatermarkPosition) -> String {
    match position {
        WatermarkPosition::TopLeft => format!("x={MARGIN}:y={MARGIN}"),
        WatermarkPosition::TopRight => format!("x=w-text_w-{MARGIN}:y={MARGIN}"),
        WatermarkPosition::BottomLeft => format!("x={MARGIN}:y=h-text_h-{MARGIN}"),
        WatermarkPosition::BottomRight => format!("x=w-text_w-{MARGIN}:y=h-text_h-{MARGIN}"),
        WatermarkPosition::Center => "x=(w-text_w)/2:y=(h-text_h)/2".into(),
    }
}

/// Semi-transparent text overlay filter.
pub fn drawtext_filter(text: &str, position: WatermarkPosition) -> String {
    format!(
        "drawtext=text='{}':fontcolor=white@0.5:fontsize=h/18:{}",
        escape_text(text),
        drawtext_coords(position)
    )
}

/// Escape the characters drawtext treats specially inside a quoted value.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_coords_cover_all_positions() {
        assert_eq!(overlay_coords(WatermarkPosition::TopLeft), "10:10");
        assert_eq!(
            overlay_coords(WatermarkPosition::BottomRight),
            "main_w-overlay_w-10:main_h-overlay_h-10"
        );
        assert_eq!(
            overlay_coords(WatermarkPosition::Center),
            "(main_w-overlay_w)/2:(main_h-overlay_h)/2"
        );
    }

    #[test]
    fn drawtext_filter_is_semi_transparent() {
        let f = drawtext_filter("acme academy", WatermarkPosition::BottomRight);
        assert_eq!(
            f,
            "drawtext=text='acme academy':fontcolor=white@0.5:fontsize=h/18:x=w-text_w-10:y=h-text_h-10"
        );
    }

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(escape_text("it's 50%: a\\b"), "it\\'s 50\\%\\: a\\\\b");
    }
}
