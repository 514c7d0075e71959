use ab_glyph::{FontRef, PxScale};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageBuffer, ImageEncoder, Rgba};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};

use crate::config::Config;

const CARD_WIDTH: u32 = 300;
const CARD_HEIGHT: u32 = 400;

/// Outcome of a cover lookup. Only `Image` carries pixels; both failure modes
/// collapse to a placeholder whose message is display text, not a contract.
pub enum CoverArt {
  Image(DynamicImage),
  Placeholder(String),
}

impl CoverArt {
  pub fn is_placeholder(&self) -> bool {
    matches!(self, CoverArt::Placeholder(_))
  }
}

/// Conventional file name used when a catalog row has no cover path.
pub fn default_cover_name(book_id: i64) -> String {
  format!("Book{}.jpg", book_id)
}

/// All paths tried for a declared cover, in order: the path as given, the
/// path under each search directory, then lower/upper case foldings of the
/// same for media copied from case-insensitive filesystems.
pub fn candidate_paths(declared: &str, search_dirs: &[PathBuf]) -> Vec<PathBuf> {
  let mut candidates = vec![PathBuf::from(declared)];
  for dir in search_dirs {
    candidates.push(dir.join(declared));
  }
  for variant in [declared.to_lowercase(), declared.to_uppercase()] {
    if variant == declared {
      continue;
    }
    candidates.push(PathBuf::from(&variant));
    for dir in search_dirs {
      candidates.push(dir.join(&variant));
    }
  }
  candidates
}

/// First candidate that exists as a regular file, or `None`.
pub fn resolve_cover_path(declared: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
  candidate_paths(declared, search_dirs)
    .into_iter()
    .find(|path| path.is_file())
}

/// Dimensions that fit `width` x `height` inside the given bounds while
/// preserving aspect ratio: the scale factor is the smaller of the width-fit
/// and height-fit ratios, so the result is fully contained.
pub fn scale_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
  let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
  let scaled_width = ((width as f64 * scale).round() as u32).max(1);
  let scaled_height = ((height as f64 * scale).round() as u32).max(1);
  (scaled_width, scaled_height)
}

/// Resolve and load the cover for a book. `declared` is the catalog's cover
/// column; when blank the conventional `Book{id}.jpg` name is derived from
/// the identifier. Missing and undecodable files both degrade to a
/// placeholder, never an error.
pub fn load_cover(book_id: i64, declared: Option<&str>, config: &Config) -> CoverArt {
  let name = match declared.map(str::trim) {
    Some(value) if !value.is_empty() => value.to_string(),
    _ => default_cover_name(book_id),
  };

  let path = match resolve_cover_path(&name, &config.cover_dirs) {
    Some(path) => path,
    None => {
      let searched: Vec<String> = config
        .cover_dirs
        .iter()
        .map(|dir| dir.display().to_string())
        .collect();
      return CoverArt::Placeholder(format!(
        "Image not found: {} (tried the path itself and {})",
        name,
        searched.join(", ")
      ));
    }
  };

  let original = match image::open(&path) {
    Ok(value) => value,
    Err(err) => {
      log::warn!("could not decode cover {}: {}", path.display(), err);
      return CoverArt::Placeholder(format!("Invalid image file: {}", path.display()));
    }
  };

  let (width, height) = scale_to_fit(
    original.width(),
    original.height(),
    config.cover_max_width,
    config.cover_max_height,
  );
  log::info!("loaded cover {} scaled to {}x{}", path.display(), width, height);
  CoverArt::Image(original.resize_exact(width, height, image::imageops::FilterType::Triangle))
}

/// Greedy word wrap used for card text.
fn wrap_text(text: &str, max_chars_per_line: usize) -> Vec<String> {
  let mut lines: Vec<String> = Vec::new();
  let mut current_line = String::new();

  for word in text.split_whitespace() {
    if current_line.is_empty() {
      current_line = word.to_string();
    } else if current_line.len() + 1 + word.len() <= max_chars_per_line {
      current_line.push(' ');
      current_line.push_str(word);
    } else {
      lines.push(current_line);
      current_line = word.to_string();
    }
  }
  if !current_line.is_empty() {
    lines.push(current_line);
  }
  lines
}

/// Draw a bordered card with a heading at the top and wrapped body text in
/// the middle. Shared by the placeholder renderer and the sample covers.
fn render_cover_card(
  heading: &str,
  body: &str,
  background: Rgba<u8>,
) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, String> {
  let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> =
    ImageBuffer::from_pixel(CARD_WIDTH, CARD_HEIGHT, background);

  let border_color = Rgba([60u8, 50, 40, 255]);
  let border_width = 6u32;
  for x in 0..CARD_WIDTH {
    for y in 0..CARD_HEIGHT {
      if x < border_width
        || x >= CARD_WIDTH - border_width
        || y < border_width
        || y >= CARD_HEIGHT - border_width
      {
        img.put_pixel(x, y, border_color);
      }
    }
  }

  let font_data = include_bytes!("../fonts/DejaVuSans.ttf");
  let font = FontRef::try_from_slice(font_data).map_err(|e| format!("Font error: {}", e))?;

  let text_color = Rgba([30u8, 25, 20, 255]);

  let heading_scale = PxScale::from(20.0);
  let heading_display = if heading.len() > 28 {
    format!("{}...", &heading[..25])
  } else {
    heading.to_string()
  };
  draw_text_mut(&mut img, text_color, 24, 32, heading_scale, &font, &heading_display);

  let body_scale = PxScale::from(24.0);
  let mut lines = wrap_text(body, 22);
  if lines.len() > 7 {
    lines.truncate(7);
    if let Some(last) = lines.last_mut() {
      last.push_str("...");
    }
  }

  let line_height = 32i32;
  let total_height = (lines.len() as i32) * line_height;
  let start_y = ((CARD_HEIGHT as i32) - total_height) / 2;
  for (i, line) in lines.iter().enumerate() {
    let y = start_y + (i as i32) * line_height;
    draw_text_mut(&mut img, text_color, 24, y, body_scale, &font, line);
  }

  Ok(img)
}

/// Render the "no cover available" card for a message. Returns PNG bytes.
pub fn placeholder_image(message: &str) -> Result<Vec<u8>, String> {
  let img = render_cover_card("No cover", message, Rgba([250u8, 245, 235, 255]))?;
  encode_png(&img)
}

/// Generate a cover from title and author text. Returns PNG bytes.
pub fn generate_text_cover(title: &str, author: &str) -> Result<Vec<u8>, String> {
  let img = render_cover_card(author, title, Rgba([250u8, 245, 235, 255]))?;
  encode_png(&img)
}

fn encode_png(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<Vec<u8>, String> {
  let mut png_bytes: Vec<u8> = Vec::new();
  let encoder = PngEncoder::new(&mut png_bytes);
  encoder
    .write_image(img, CARD_WIDTH, CARD_HEIGHT, image::ExtendedColorType::Rgba8)
    .map_err(|e| format!("PNG encode error: {}", e))?;
  Ok(png_bytes)
}

const SAMPLE_COLORS: [Rgba<u8>; 5] = [
  Rgba([70u8, 130, 180, 255]),
  Rgba([220u8, 20, 60, 255]),
  Rgba([34u8, 139, 34, 255]),
  Rgba([255u8, 140, 0, 255]),
  Rgba([138u8, 43, 226, 255]),
];

/// Materialize `Book1.jpg` .. `Book{count}.jpg` sample covers in `dir` for a
/// fresh install. Existing files are left alone.
pub fn write_sample_covers(dir: &Path, count: u32) -> Result<Vec<PathBuf>, String> {
  std::fs::create_dir_all(dir).map_err(|err| err.to_string())?;

  let mut written = Vec::new();
  for i in 1..=count {
    let path = dir.join(default_cover_name(i as i64));
    if path.exists() {
      continue;
    }
    let background = SAMPLE_COLORS[((i - 1) as usize) % SAMPLE_COLORS.len()];
    let card = render_cover_card("Sample", &format!("Book-{}", i), background)?;
    DynamicImage::ImageRgba8(card)
      .to_rgb8()
      .save(&path)
      .map_err(|err| err.to_string())?;
    log::info!("created sample cover {}", path.display());
    written.push(path);
  }
  Ok(written)
}
