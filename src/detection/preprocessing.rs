use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::dilate;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gaussian sigma matching a square kernel of side `kernel_size`.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Apply a Gaussian blur sized by kernel side; a kernel of 1 leaves the image as is.
pub fn apply_blur(img: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma_for_kernel(kernel_size))
}

/// Remove thin print so only large shapes survive edge detection
pub fn suppress_detail(img: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return img.clone();
    }
    median_filter(img, radius, radius)
}

/// Detect edges using Canny edge detector, thickened by one pixel to close gaps
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let edges = canny(img, low_threshold, high_threshold);
    dilate(&edges, Norm::LInf, 1)
}

/// Global threshold: pixels brighter than `threshold` become white.
///
/// With `inverted` the mapping flips, so dark print becomes the white foreground.
pub fn binarize(img: &GrayImage, threshold: u8, inverted: bool) -> GrayImage {
    let (on, off) = if inverted { (0u8, 255u8) } else { (255u8, 0u8) };
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] > threshold {
            Luma([on])
        } else {
            Luma([off])
        }
    })
}

/// Unsharp mask: `amount * img + (1 - amount) * blur(img)`, saturated to u8.
pub fn unsharp_mask(img: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    let blurred = gaussian_blur_f32(img, sigma);
    let mut out = img.clone();
    for (dst, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for (c, s) in dst.0.iter_mut().zip(soft.0.iter()) {
            let v = amount * *c as f32 + (1.0 - amount) * *s as f32;
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
