//! Turn a picture into text made of emoji shortcodes.
//!
//! Every downloaded emoji is reduced to its average color, making a [`Palette`].
//! The picture is then scaled down to a grid, and each cell is replaced by the
//! emoji of the nearest color. The grid size is chosen so that the text fits in
//! a note, see [`optimal_size`].

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;

/// The character limit of a note.
pub const DEFAULT_MAX_CHARS: usize = 3000;
/// Characters kept free below the limit when sizing the grid.
pub const SIZE_MARGIN: usize = 100;
/// The output is "close to the limit" within this many characters.
pub const NEAR_LIMIT_MARGIN: usize = 200;

const MIN_COLS: u32 = 5;
const MAX_COLS: u32 = 100;

/// An RGB color.
pub type Rgb = [u8; 3];

/// The error when a mosaic can't be made.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MosaicError {
    /// No usable emoji image was found.
    #[error("no emoji image found in {}", .0.display())]
    EmptyPalette(PathBuf),
    /// The picture has no pixels.
    #[error("the picture is empty")]
    EmptyPicture,
    /// The save directory can't be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The picture can't be decoded.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// The average color of the visible pixels, weighted by alpha.
///
/// Returns `None` if every pixel is fully transparent.
pub fn average_color(image: &DynamicImage) -> Option<Rgb> {
    let mut sum = [0u64; 3];
    let mut weight = 0u64;
    for (_, _, pixel) in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let a = u64::from(a);
        sum[0] += u64::from(r) * a;
        sum[1] += u64::from(g) * a;
        sum[2] += u64::from(b) * a;
        weight += a;
    }
    if weight == 0 {
        return None;
    }
    // each channel average is at most 255
    Some(sum.map(|channel| (channel / weight) as u8))
}

/// Euclidean distance in RGB space.
#[inline]
pub fn color_distance(a: Rgb, b: Rgb) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| (f64::from(x) - f64::from(y)).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// One emoji of a [`Palette`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swatch {
    /// The emoji name, without colons.
    pub name: String,
    /// The average color of the emoji.
    pub color: Rgb,
}

impl Swatch {
    /// The text written for this emoji, `:name:`.
    #[inline]
    pub fn shortcode(&self) -> String {
        format!(":{}:", self.name)
    }
}

/// The emojis a mosaic is made of.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    swatches: Vec<Swatch>,
}

impl Palette {
    /// Build a palette from known colors.
    pub fn new(swatches: impl Into<Vec<Swatch>>) -> Self {
        Self {
            swatches: swatches.into(),
        }
    }

    /// Build a palette from the images in `dir`, named by their file stem.
    ///
    /// Files that are not images, can't be decoded, or are fully transparent
    /// are left out. Swatches are sorted by name.
    ///
    /// # Errors
    ///
    /// If `dir` can't be read, this function will return an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut swatches = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || ImageFormat::from_path(&path).is_err() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let image = match image::open(&path) {
                Ok(image) => image,
                Err(err) => {
                    log::warn!("skip {}: {err}", path.display());
                    continue;
                }
            };
            match average_color(&image) {
                Some(color) => swatches.push(Swatch {
                    name: name.to_owned(),
                    color,
                }),
                None => log::debug!("skip fully transparent {}", path.display()),
            }
        }
        swatches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { swatches })
    }

    /// The swatches, in palette order.
    #[inline]
    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    /// No emoji to draw with.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    /// The average length of the shortcodes, `0.0` for an empty palette.
    pub fn average_shortcode_len(&self) -> f64 {
        if self.swatches.is_empty() {
            return 0.0;
        }
        let total: usize = self
            .swatches
            .iter()
            .map(|swatch| swatch.shortcode().chars().count())
            .sum();
        total as f64 / self.swatches.len() as f64
    }

    /// The swatch nearest to `color`, the first one wins a tie.
    pub fn nearest(&self, color: Rgb) -> Option<&Swatch> {
        let mut best: Option<(&Swatch, f64)> = None;
        for swatch in &self.swatches {
            let distance = color_distance(color, swatch.color);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((swatch, distance));
            }
        }
        best.map(|(swatch, _)| swatch)
    }

    /// Render `picture` as a grid sized by [`optimal_size`] for `max_chars`.
    ///
    /// # Errors
    ///
    /// If the palette or the picture is empty, this function will return an error.
    pub fn render(&self, picture: &DynamicImage, max_chars: usize) -> Result<Mosaic, MosaicError> {
        let (width, height) = picture.dimensions();
        if width == 0 || height == 0 {
            return Err(MosaicError::EmptyPicture);
        }
        if self.is_empty() {
            return Err(MosaicError::EmptyPalette(PathBuf::new()));
        }

        let size = optimal_size(width, height, self.average_shortcode_len(), max_chars);
        let cells = picture
            .resize_exact(size.cols, size.rows, FilterType::Triangle)
            .to_rgba8();

        let mut text = String::new();
        for row in cells.rows() {
            for pixel in row {
                let [r, g, b, _] = pixel.0;
                if let Some(swatch) = self.nearest([r, g, b]) {
                    text.push(':');
                    text.push_str(&swatch.name);
                    text.push(':');
                }
            }
            text.push('\n');
        }

        Ok(Mosaic {
            text,
            size,
            max_chars,
        })
    }
}

/// The grid of a mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    /// Emojis per line.
    pub cols: u32,
    /// Lines.
    pub rows: u32,
    /// The expected text length, from the average shortcode length.
    pub estimated_chars: usize,
}

#[inline]
fn rows_for(width: u32, height: u32, cols: u32) -> u32 {
    // floor(height / (width / cols)), keeping the aspect ratio of the picture
    let rows = u64::from(height) * u64::from(cols) / u64::from(width);
    u32::try_from(rows).unwrap_or(u32::MAX).max(1)
}

#[inline]
fn estimate(cols: u32, rows: u32, average_len: f64) -> f64 {
    // `+ 1` for the newline
    (f64::from(cols) * average_len + 1.0) * f64::from(rows)
}

/// The widest grid whose estimated text stays within `max_chars - SIZE_MARGIN`.
///
/// Columns are searched in `5..=100`, and rows follow the aspect ratio of a
/// `width` × `height` picture. If even 5 columns don't fit, 5 columns are used.
pub fn optimal_size(width: u32, height: u32, average_len: f64, max_chars: usize) -> GridSize {
    let budget = max_chars.saturating_sub(SIZE_MARGIN) as f64;

    let (mut low, mut high) = (MIN_COLS, MAX_COLS);
    let mut best_cols = MIN_COLS;
    while low <= high {
        let cols = (low + high) / 2;
        let rows = rows_for(width, height, cols);
        if estimate(cols, rows, average_len) <= budget {
            best_cols = cols;
            low = cols + 1;
        } else {
            high = cols - 1;
        }
    }

    let best_rows = rows_for(width, height, best_cols);
    GridSize {
        cols: best_cols,
        rows: best_rows,
        estimated_chars: estimate(best_cols, best_rows, average_len).floor() as usize,
    }
}

/// A rendered mosaic.
#[derive(Debug, Clone)]
pub struct Mosaic {
    /// Lines of shortcodes, each ending with `\n`.
    pub text: String,
    /// The grid the text was rendered at.
    pub size: GridSize,
    /// The limit the grid was sized for.
    pub max_chars: usize,
}

impl Mosaic {
    /// The length of [`Self::text`] in characters.
    #[inline]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// The text doesn't fit in the limit.
    #[inline]
    pub fn over_limit(&self) -> bool {
        self.char_count() > self.max_chars
    }

    /// The text fits, within [`NEAR_LIMIT_MARGIN`] of the limit.
    #[inline]
    pub fn near_limit(&self) -> bool {
        !self.over_limit() && self.char_count() > self.max_chars.saturating_sub(NEAR_LIMIT_MARGIN)
    }

    /// A one line summary, `cols×rows` and the length against the limit.
    pub fn status(&self) -> String {
        let GridSize { cols, rows, .. } = self.size;
        let mut status = format!(
            "{cols}x{rows} mosaic, {} / {} chars",
            self.char_count(),
            self.max_chars
        );
        if self.over_limit() {
            status.push_str(", over the limit!");
        } else if self.near_limit() {
            status.push_str(", close to the limit");
        }
        status
    }
}

/// Render the picture at `picture` with the emojis saved in `save_dir`.
///
/// # Errors
///
/// If `save_dir` can't be read or has no usable image,
/// or the picture can't be decoded, this function will return an error.
pub fn mosaic_from_dir(
    save_dir: impl AsRef<Path>,
    picture: impl AsRef<Path>,
    max_chars: usize,
) -> Result<Mosaic, MosaicError> {
    let save_dir = save_dir.as_ref();
    let palette = Palette::from_dir(save_dir)?;
    if palette.is_empty() {
        return Err(MosaicError::EmptyPalette(save_dir.to_path_buf()));
    }
    log::info!("{} emojis in the palette", palette.swatches().len());

    let picture = image::open(picture)?;
    palette.render(&picture, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    use image::{Rgba, RgbaImage};

    const RED: Rgb = [255, 0, 0];
    const GREEN: Rgb = [0, 255, 0];
    const BLUE: Rgb = [0, 0, 255];

    fn swatch(name: &str, color: Rgb) -> Swatch {
        Swatch {
            name: name.to_owned(),
            color,
        }
    }

    fn solid(width: u32, height: u32, [r, g, b]: Rgb) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]))
    }

    #[test]
    fn test_optimal_size_square() {
        // (16 * 10 + 1) * 16 = 2576 fits in 2900, (17 * 10 + 1) * 17 = 2907 doesn't
        let size = optimal_size(100, 100, 10.0, DEFAULT_MAX_CHARS);
        assert_eq!(
            size,
            GridSize {
                cols: 16,
                rows: 16,
                estimated_chars: 2576
            }
        );
    }

    #[test]
    fn test_optimal_size_wide() {
        // rows = floor(cols / 2): 24 cols -> (241) * 12 = 2892, 25 cols -> 251 * 12 = 3012
        let size = optimal_size(200, 100, 10.0, DEFAULT_MAX_CHARS);
        assert_eq!((size.cols, size.rows, size.estimated_chars), (24, 12, 2892));
    }

    #[test]
    fn test_optimal_size_bounds() {
        // short names hit the widest grid
        let size = optimal_size(100, 10, 1.0, DEFAULT_MAX_CHARS);
        assert_eq!((size.cols, size.rows), (100, 10));

        // nothing fits, fall back to the narrowest grid
        let size = optimal_size(100, 100, 50.0, 200);
        assert_eq!((size.cols, size.rows), (5, 5));
    }

    #[test]
    fn test_nearest() {
        let palette = Palette::new([swatch("red", RED), swatch("green", GREEN), swatch("blue", BLUE)]);
        assert_eq!(palette.nearest([200, 30, 30]).unwrap().name, "red");
        assert_eq!(palette.nearest([10, 20, 180]).unwrap().name, "blue");
        // equally far from red and green
        assert_eq!(palette.nearest([128, 128, 0]).unwrap().name, "red");
        assert!(Palette::default().nearest(RED).is_none());
    }

    #[test]
    fn test_color_distance() {
        assert_eq!(color_distance(RED, RED), 0.0);
        assert_eq!(color_distance([0, 0, 0], [3, 4, 0]), 5.0);
    }

    #[test]
    fn test_average_color_ignores_transparent() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        assert_eq!(average_color(&DynamicImage::ImageRgba8(image)), Some(BLUE));

        let clear = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 0]));
        assert_eq!(average_color(&DynamicImage::ImageRgba8(clear)), None);
    }

    #[test]
    fn test_palette_from_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        solid(4, 4, RED).save(dir.join("red.png")).unwrap();
        solid(4, 4, BLUE).save(dir.join("blue.png")).unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]))
            .save(dir.join("clear.png"))
            .unwrap();
        std::fs::write(dir.join("broken.png"), b"not a png").unwrap();
        std::fs::write(dir.join("notes.txt"), b"hello").unwrap();

        let palette = Palette::from_dir(dir).unwrap();
        assert_eq!(palette.swatches(), [swatch("blue", BLUE), swatch("red", RED)]);
        assert_eq!(palette.average_shortcode_len(), 5.5);
    }

    #[test]
    fn test_render() {
        let palette = Palette::new([swatch("red", RED), swatch("blue", BLUE)]);
        // left half red, right half blue
        let mut picture = solid(100, 50, RED);
        for x in 50..100 {
            for y in 0..50 {
                picture.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }

        let mosaic = palette
            .render(&DynamicImage::ImageRgba8(picture), DEFAULT_MAX_CHARS)
            .unwrap();
        let lines: Vec<_> = mosaic.text.lines().collect();
        assert_eq!(lines.len(), mosaic.size.rows as usize);
        for line in lines {
            assert!(line.starts_with(":red:"), "{line}");
            assert!(line.ends_with(":blue:"), "{line}");
        }
        assert!(mosaic.text.ends_with('\n'));
        assert!(!mosaic.over_limit(), "{}", mosaic.status());
    }

    #[test]
    fn test_render_over_limit() {
        let palette = Palette::new([swatch("a_very_long_emoji_name", GREEN)]);
        let mosaic = palette
            .render(&DynamicImage::ImageRgba8(solid(10, 10, GREEN)), 200)
            .unwrap();
        assert_eq!((mosaic.size.cols, mosaic.size.rows), (5, 5));
        assert!(mosaic.over_limit());
        assert!(mosaic.status().ends_with("over the limit!"));
    }

    #[test]
    fn test_render_empty_palette() {
        let err = Palette::default()
            .render(&DynamicImage::ImageRgba8(solid(10, 10, RED)), DEFAULT_MAX_CHARS)
            .unwrap_err();
        assert!(matches!(err, MosaicError::EmptyPalette(_)));
    }

    #[test]
    fn test_mosaic_from_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let save_dir = temp_dir.path().join("emojis");
        std::fs::create_dir(&save_dir).unwrap();
        let picture = temp_dir.path().join("picture.png");
        solid(20, 20, GREEN).save(&picture).unwrap();

        let err = mosaic_from_dir(&save_dir, &picture, DEFAULT_MAX_CHARS).unwrap_err();
        assert!(matches!(err, MosaicError::EmptyPalette(ref dir) if *dir == save_dir));

        solid(4, 4, GREEN).save(save_dir.join("leaf.png")).unwrap();
        let mosaic = mosaic_from_dir(&save_dir, &picture, DEFAULT_MAX_CHARS).unwrap();
        assert!(mosaic.text.lines().all(|line| line.split(":leaf:").all(str::is_empty)));
    }
}
