//! Per-pixel spectral accumulation and development to display images.

use image::{Rgba, RgbaImage};
use lumen_core::{to_rgb, ConversionMode, Light, LightAccumulator};
use lumen_math::Vec3;
use rayon::prelude::*;

use crate::bucket::BucketResult;
use crate::tonemap::PostProcessor;

/// Image-sized grid of [`LightAccumulator`]s.
///
/// Owned by a single driver thread; workers hand their results back as
/// [`BucketResult`]s which are merged here.
#[derive(Debug, Clone)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<LightAccumulator>,
}

impl Film {
    /// Create an empty film whose pixels remember about `history` samples.
    pub fn new(width: u32, height: u32, history: u64) -> Self {
        Self {
            width,
            height,
            pixels: vec![LightAccumulator::new(history); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        pixel_index(self.width, x, y)
    }

    pub fn accumulate(&mut self, x: u32, y: u32, light: &Light) {
        let i = self.index(x, y);
        self.pixels[i].accumulate(light);
    }

    /// Fold one pass over a bucket into the film.
    pub fn merge(&mut self, result: &BucketResult) {
        for ((x, y), light) in result.bucket.pixels().zip(&result.pixels) {
            if x < self.width && y < self.height {
                self.accumulate(x, y, light);
            }
        }
    }

    /// Current estimate at pixel (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Light {
        self.pixels[self.index(x, y)].color()
    }

    /// Passes accumulated at pixel (x, y).
    pub fn sample_count(&self, x: u32, y: u32) -> u64 {
        self.pixels[self.index(x, y)].count()
    }

    /// Forget all accumulated light.
    pub fn reset(&mut self) {
        self.pixels.par_iter_mut().for_each(LightAccumulator::reset);
    }

    /// Convert every pixel to linear RGB.
    pub fn linear_rgb(&self, mode: ConversionMode) -> Vec<Vec3> {
        self.pixels
            .par_iter()
            .map(|acc| Vec3::from_array(to_rgb(acc.color().spectrum(), mode)))
            .collect()
    }

    /// Convert, post-process and quantize the film into an RGBA image.
    pub fn develop(&self, mode: ConversionMode, post: &PostProcessor) -> RgbaImage {
        let rgba: Vec<[u8; 4]> = self
            .linear_rgb(mode)
            .into_par_iter()
            .map(|rgb| post.to_rgba8(rgb))
            .collect();

        RgbaImage::from_fn(self.width, self.height, |x, y| Rgba(rgba[pixel_index(self.width, x, y)]))
    }
}

/// Row-major offset of (x, y), computed in `usize` so frames past
/// `u32::MAX` pixels index correctly.
#[inline]
fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;
    use crate::tonemap::{PostProcessorSettings, ReferenceSamples, ToneOperator};
    use lumen_core::Spectrum;

    fn flat(v: f32) -> Light {
        Light::new(Spectrum::splat(v))
    }

    #[test]
    fn test_merge_places_bucket_pixels() {
        let mut film = Film::new(4, 4, 16);
        let bucket = Bucket::new(1, 2, 2, 2, 0);
        let result = BucketResult::new(bucket, vec![flat(1.0), flat(2.0), flat(3.0), flat(4.0)]);
        film.merge(&result);

        assert_eq!(film.pixel(1, 2), flat(1.0));
        assert_eq!(film.pixel(2, 2), flat(2.0));
        assert_eq!(film.pixel(1, 3), flat(3.0));
        assert_eq!(film.pixel(2, 3), flat(4.0));
        assert!(film.pixel(0, 0).is_black());
        assert_eq!(film.sample_count(0, 0), 0);
    }

    #[test]
    fn test_pixel_index_does_not_wrap() {
        assert_eq!(pixel_index(4, 1, 3), 13);
        // 70000 x 70000 exceeds u32::MAX pixels
        let last = pixel_index(70_000, 69_999, 69_999);
        assert_eq!(last, 70_000usize * 70_000 - 1);
        assert!(last > u32::MAX as usize);
    }

    #[test]
    fn test_passes_average() {
        let mut film = Film::new(1, 1, 16);
        film.accumulate(0, 0, &flat(1.0));
        film.accumulate(0, 0, &flat(3.0));
        assert_eq!(film.pixel(0, 0), flat(2.0));
        assert_eq!(film.sample_count(0, 0), 2);

        film.reset();
        assert_eq!(film.sample_count(0, 0), 0);
    }

    #[test]
    fn test_develop_black_and_white() {
        let mut film = Film::new(2, 1, 4);
        film.accumulate(1, 0, &flat(50.0));

        let post = PostProcessorSettings {
            operator: ToneOperator::Linear,
            ..Default::default()
        }
        .build(&ReferenceSamples::default());
        let image = film.develop(ConversionMode::default(), &post);

        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }
}
