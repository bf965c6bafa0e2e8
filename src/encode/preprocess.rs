//! Model-specific image preprocessing: resize, scale, per-channel normalize.

use image::RgbImage;
use image::imageops::FilterType;
use ndarray::Array3;

use super::ModelSpec;

/// Resize to the model's square input and produce a CHW tensor of
/// mean/std-normalized channel values.
#[must_use]
pub fn preprocess(img: &RgbImage, spec: &ModelSpec) -> Array3<f32> {
    let size = spec.image_size;
    let resized = image::imageops::resize(img, size, size, FilterType::CatmullRom);

    let mut tensor = Array3::<f32>::zeros((3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = f32::from(pixel.0[c]) / 255.0;
            tensor[[c, y as usize, x as usize]] = (value - spec.mean[c]) / spec.std[c];
        }
    }
    tensor
}
