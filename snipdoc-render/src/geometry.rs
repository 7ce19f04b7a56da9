use snipdoc_core::NormalizedRect;

/// Converts a rectangle in PDF points (origin bottom-left) into page-relative
/// coordinates with the origin at the top-left. `None` for degenerate input.
pub fn normalize_rect(
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    page_width: f32,
    page_height: f32,
) -> Option<NormalizedRect> {
    if page_width <= 0.0 || page_height <= 0.0 {
        return None;
    }
    let rect = NormalizedRect {
        left: left / page_width,
        right: right / page_width,
        top: 1.0 - top / page_height,
        bottom: 1.0 - bottom / page_height,
    }
    .clamp();
    rect.is_valid().then_some(rect)
}
