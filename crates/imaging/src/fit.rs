//! Crop-to-aspect and resize of headshots.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use team_core::{Error, Frame, Result};

/// Light grey used for quadrants without a usable photo.
const PLACEHOLDER_RGB: [u8; 3] = [0xD9, 0xD9, 0xD9];

/// Fits arbitrary photos into fixed template frames.
#[derive(Debug, Clone)]
pub struct ImageFitter {
    /// Resampling filter used for the final resize.
    filter: FilterType,

    /// Fill colour of the neutral placeholder image.
    placeholder_rgb: [u8; 3],
}

impl Default for ImageFitter {
    fn default() -> Self {
        Self {
            filter: FilterType::CatmullRom,
            placeholder_rgb: PLACEHOLDER_RGB,
        }
    }
}

impl ImageFitter {
    /// Create a fitter using bicubic (Catmull-Rom) resampling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Use a different placeholder colour.
    pub fn with_placeholder_rgb(mut self, rgb: [u8; 3]) -> Self {
        self.placeholder_rgb = rgb;
        self
    }

    /// Center-crop `bytes` to the frame's aspect ratio and resize it to the
    /// frame's pixel size. Returns PNG bytes.
    ///
    /// The same input always produces the same output.
    pub fn fit(&self, bytes: &[u8], frame: Frame) -> Result<Vec<u8>> {
        let img = image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))?;

        let (x, y, width, height) = center_crop(img.width(), img.height(), frame);
        log::debug!(
            "Cropping {}x{} photo to {}x{}+{}+{}, resizing to {}x{}",
            img.width(),
            img.height(),
            width,
            height,
            x,
            y,
            frame.width,
            frame.height
        );

        let fitted = img
            .crop_imm(x, y, width, height)
            .resize_exact(frame.width, frame.height, self.filter);

        encode_png(&fitted)
    }

    /// Fit a photo if there is a decodable one, otherwise produce the
    /// placeholder for the frame.
    pub fn fit_or_placeholder(&self, bytes: Option<&[u8]>, frame: Frame) -> Result<Vec<u8>> {
        match bytes {
            Some(bytes) => match self.fit(bytes, frame) {
                Ok(png) => Ok(png),
                Err(Error::ImageDecode(reason)) => {
                    log::warn!("Photo could not be decoded ({}), using placeholder", reason);
                    self.placeholder(frame)
                }
                Err(e) => Err(e),
            },
            None => self.placeholder(frame),
        }
    }

    /// A flat neutral image of exactly the frame's size.
    pub fn placeholder(&self, frame: Frame) -> Result<Vec<u8>> {
        solid_png(frame.width, frame.height, self.placeholder_rgb)
    }
}

/// Encode a single-colour PNG.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(width.max(1), height.max(1), Rgb(rgb));
    encode_png(&DynamicImage::ImageRgb8(img))
}

/// Largest centered region of a `src_width`×`src_height` image with the
/// frame's aspect ratio, as `(x, y, width, height)`.
fn center_crop(src_width: u32, src_height: u32, frame: Frame) -> (u32, u32, u32, u32) {
    let (sw, sh) = (u64::from(src_width), u64::from(src_height));
    let (fw, fh) = (u64::from(frame.width), u64::from(frame.height));

    if sw * fh > sh * fw {
        // Too wide: trim left and right
        let width = ((sh * fw + fh / 2) / fh).clamp(1, sw) as u32;
        ((src_width - width) / 2, 0, width, src_height)
    } else if sw * fh < sh * fw {
        // Too tall: trim top and bottom
        let height = ((sw * fh + fw / 2) / fw).clamp(1, sh) as u32;
        (0, (src_height - height) / 2, src_width, height)
    } else {
        (0, 0, src_width, src_height)
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    // PNG cannot hold every decoded colour type (e.g. float images)
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut buffer = Cursor::new(Vec::new());
    normalized
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| Error::ImageEncode(e.to_string()))?;
    Ok(buffer.into_inner())
}
