//! Dynamically drawn texture for the loading billboard.

use std::path::Path;

use image::{Rgba, RgbaImage};
use xr_interim_protocol::TextureRef;

use crate::config::{GateConfig, MAX_CARD_SIZE_PX, MIN_CARD_SIZE_PX};
use crate::error::Result;

const CARD_TEXTURE_ID: u32 = 1;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const MAX_DOTS: u64 = 3;

const BACKGROUND: Rgba<u8> = Rgba([12, 14, 24, 210]);
const FOREGROUND: Rgba<u8> = Rgba([236, 240, 255, 255]);
const ACCENT: Rgba<u8> = Rgba([92, 144, 250, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Logo and caption rendered into an RGBA image.
///
/// The caption is `"<text>"` followed by zero to three dots that cycle every
/// `caption_dot_period_ms`; the image is only redrawn when that text changes.
pub struct LoadingCard {
	base: String,
	dot_period_ms: u64,
	caption: String,
	image: RgbaImage,
	texture: TextureRef,
}

impl LoadingCard {
	pub fn new(config: &GateConfig) -> Self {
		let width = config.card_size_px.clamp(MIN_CARD_SIZE_PX, MAX_CARD_SIZE_PX);
		let mut card = Self {
			base: config.caption.trim_end_matches(['.', '…']).to_string(),
			dot_period_ms: config.caption_dot_period_ms.max(1),
			caption: String::new(),
			image: RgbaImage::from_pixel(width, width / 2, CLEAR),
			texture: TextureRef {
				id: CARD_TEXTURE_ID,
				version: 0,
			},
		};
		card.refresh(0.0);
		card
	}

	/// Caption to show `elapsed_ms` after the session started.
	pub fn caption_at(&self, elapsed_ms: f64) -> String {
		let dots = (elapsed_ms.max(0.0) as u64 / self.dot_period_ms) % (MAX_DOTS + 1);
		format!("{}{}", self.base, ".".repeat(dots as usize))
	}

	/// Redraws if the caption changed. Returns `true` when a new image needs
	/// uploading.
	pub fn refresh(&mut self, elapsed_ms: f64) -> bool {
		let caption = self.caption_at(elapsed_ms);
		if caption == self.caption && self.texture.version > 0 {
			return false;
		}
		self.caption = caption;
		self.draw();
		self.texture.version += 1;
		true
	}

	pub fn caption(&self) -> &str {
		&self.caption
	}

	pub fn texture(&self) -> TextureRef {
		self.texture
	}

	pub fn width(&self) -> u32 {
		self.image.width()
	}

	pub fn height(&self) -> u32 {
		self.image.height()
	}

	/// Raw RGBA8 pixels, row-major.
	pub fn pixels(&self) -> &[u8] {
		self.image.as_raw()
	}

	pub fn save_png(&self, path: &Path) -> Result<()> {
		self.image.save_with_format(path, image::ImageFormat::Png)?;
		Ok(())
	}

	fn draw(&mut self) {
		let (width, height) = self.image.dimensions();
		let corner = height / 8;
		for (x, y, pixel) in self.image.enumerate_pixels_mut() {
			*pixel = if inside_rounded_rect(x, y, width, height, corner) { BACKGROUND } else { CLEAR };
		}

		let logo_radius = height as f32 * 0.18;
		let logo_center = (width as f32 / 2.0, height as f32 * 0.33);
		draw_ring(&mut self.image, logo_center, logo_radius, logo_radius * 0.28);

		// Size glyphs for the longest caption so the text does not jump as dots cycle.
		let longest = self.base.chars().count() as u32 + MAX_DOTS as u32;
		let scale = (width * 8 / 10 / (longest * (GLYPH_WIDTH + 1)).max(1)).clamp(1, 4);
		let text_width = self.base.chars().count() as u32 * (GLYPH_WIDTH + 1) * scale;
		let origin_x = width.saturating_sub(text_width) / 2;
		let origin_y = height * 62 / 100;
		draw_text(&mut self.image, &self.caption, origin_x, origin_y, scale);
	}
}

fn inside_rounded_rect(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
	let cx = x.clamp(radius, width.saturating_sub(radius + 1));
	let cy = y.clamp(radius, height.saturating_sub(radius + 1));
	let (dx, dy) = (x.abs_diff(cx), y.abs_diff(cy));
	dx * dx + dy * dy <= radius * radius
}

fn draw_ring(image: &mut RgbaImage, (cx, cy): (f32, f32), radius: f32, thickness: f32) {
	let inner = radius - thickness;
	for (x, y, pixel) in image.enumerate_pixels_mut() {
		let distance = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
		if distance <= radius && distance >= inner {
			*pixel = ACCENT;
		}
	}
}

fn draw_text(image: &mut RgbaImage, text: &str, origin_x: u32, origin_y: u32, scale: u32) {
	let mut pen_x = origin_x;
	for ch in text.chars() {
		if let Some(rows) = glyph(ch) {
			for (row, bits) in rows.iter().enumerate() {
				for col in 0..GLYPH_WIDTH {
					if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
						continue;
					}
					fill_block(image, pen_x + col * scale, origin_y + row as u32 * scale, scale);
				}
			}
		}
		pen_x += (GLYPH_WIDTH + 1) * scale;
	}
}

fn fill_block(image: &mut RgbaImage, x: u32, y: u32, size: u32) {
	for py in y..(y + size).min(image.height()) {
		for px in x..(x + size).min(image.width()) {
			image.put_pixel(px, py, FOREGROUND);
		}
	}
}

/// 5x7 bitmap glyphs, most significant bit leftmost. Lowercase renders as
/// uppercase; anything without a glyph renders as a blank cell.
fn glyph(ch: char) -> Option<[u8; GLYPH_HEIGHT as usize]> {
	Some(match ch.to_ascii_uppercase() {
		'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
		'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
		'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
		'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
		'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
		'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
		'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
		'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
		'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
		'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
		'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
		'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
		'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
		'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
		'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
		'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
		'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
		'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
		'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
		'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
		'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
		'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
		'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
		'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
		'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
		'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
		'.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
		_ => return None,
	})
}
