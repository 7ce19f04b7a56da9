use std::io::{self, Write};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use png::{BitDepth, ColorType, Encoder};
use snipdoc_core::{MatchResult, NormalizedRect, RenderImage, ViewerState};

/// Largest base64 payload kitty accepts per escape sequence.
const KITTY_CHUNK: usize = 4096;

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Transmits `image` as PNG and places it over `params` cells, replacing
    /// the previous placement.
    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let payload = BASE64.encode(encode_png(image)?);
        let pieces: Vec<&[u8]> = payload.as_bytes().chunks(KITTY_CHUNK).collect();
        let last = pieces.len().saturating_sub(1);

        for (index, piece) in pieces.iter().enumerate() {
            let more = u8::from(index < last);
            let control = if index == 0 {
                format!(
                    "a=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={more}",
                    self.image_id, self.placement_id, params.columns, params.rows, image.width,
                    image.height,
                )
            } else {
                format!("m={more},q=2")
            };
            self.write_apc(&control, piece)?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// One graphics command: `ESC _ G <control> ; <payload> ESC \`.
    fn write_apc(&mut self, control: &str, payload: &[u8]) -> Result<()> {
        write!(self.writer, "\u{1b}_G{control}")?;
        if !payload.is_empty() {
            self.writer.write_all(b";")?;
            self.writer.write_all(payload)?;
        }
        self.writer.write_all(b"\x1b\\")?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

/// Tints every highlight rectangle of the page onto `image`.
fn encode_png(image: &RenderImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.pixels)?;
    writer.finish()?;
    Ok(buffer)
}

pub fn apply_highlights(
    image: &mut RenderImage,
    rects: &[NormalizedRect],
    color: [u8; 3],
    alpha: f32,
) {
    if image.width == 0 || image.height == 0 {
        return;
    }
    for rect in rects {
        if let Some(pixels) = to_pixel_rect(*rect, image.width, image.height) {
            fill_rect(image, pixels, color, alpha);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

fn to_pixel_rect(rect: NormalizedRect, width: u32, height: u32) -> Option<PixelRect> {
    let rect = rect.clamp();
    let x0 = (rect.left * width as f32).floor() as u32;
    let x1 = ((rect.right * width as f32).ceil() as u32).min(width);
    let y0 = (rect.top * height as f32).floor() as u32;
    let y1 = ((rect.bottom * height as f32).ceil() as u32).min(height);
    (x1 > x0 && y1 > y0).then_some(PixelRect { x0, y0, x1, y1 })
}

fn fill_rect(image: &mut RenderImage, rect: PixelRect, color: [u8; 3], alpha: f32) {
    let stride = image.width as usize * 4;
    for y in rect.y0..rect.y1 {
        let row_start = y as usize * stride;
        for x in rect.x0..rect.x1 {
            let idx = row_start + x as usize * 4;
            if let Some(pixel) = image.pixels.get_mut(idx..idx + 4) {
                blend_pixel(pixel, color, alpha);
            }
        }
    }
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, tint) in pixel.iter_mut().zip(color) {
        *channel = ((*channel as f32 * inv) + (tint as f32 * alpha))
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}

/// `page 3/12 — "matched span" (distance 2)`, or the load/render error.
pub fn format_status(state: &ViewerState, matched: Option<&MatchResult>) -> String {
    if let Some(err) = &state.load_error {
        return err.to_string();
    }

    let mut status = match state.current_page {
        Some(page) => format!("page {}/{}", page, state.total_pages),
        None => "no page".to_string(),
    };
    if let Some(matched) = matched {
        status.push_str(&format!(
            " — \"{}\" (distance {})",
            matched.matched_span, matched.distance
        ));
    }
    if let Some(err) = &state.render_error {
        status.push_str(" — ");
        status.push_str(&err.to_string());
    }
    status
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    crossterm::execute!(
        writer,
        SetAttribute(Attribute::Reverse),
        Print(label),
        SetAttribute(Attribute::Reset)
    )
}
