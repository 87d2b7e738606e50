//! Bucket-based tile rendering.
//!
//! The frame is cut into rectangular buckets that are rendered
//! independently, either by rayon in [`crate::render_frame`] or by the
//! long-lived workers of [`crate::RenderPool`]. A bucket is also the unit of
//! cancellation: results tagged with a stale generation are dropped whole.

use lumen_core::Light;
use rand::RngCore;

use crate::camera::Camera;
use crate::renderer::render_pixel;
use crate::scene::Scene;
use crate::tracer::TraceConfig;

/// Default bucket edge in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 32;

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position in the render order; also keys the bucket's RNG stream
    pub index: usize,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Image coordinates of every pixel, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height).flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }

    /// Twice the squared distance of the bucket's center from the point
    /// (cx, cy), also given doubled so everything stays integral.
    fn center_offset(&self, cx2: i64, cy2: i64) -> i64 {
        let dx = (2 * self.x + self.width) as i64 - cx2;
        let dy = (2 * self.y + self.height) as i64 - cy2;
        dx * dx + dy * dy
    }
}

/// Tile a `width` x `height` image, ordered from the center outward.
///
/// Edge buckets are clipped to the image. The middle of the frame is handed
/// out first so it converges first; ties keep scanline order.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let size = bucket_size.max(1);

    let mut buckets: Vec<Bucket> = (0..height)
        .step_by(size as usize)
        .flat_map(|y| {
            (0..width)
                .step_by(size as usize)
                .map(move |x| Bucket::new(x, y, size.min(width - x), size.min(height - y), 0))
        })
        .collect();

    let (cx2, cy2) = (width as i64, height as i64);
    buckets.sort_by_key(|b| b.center_offset(cx2, cy2));

    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }
    buckets
}

/// Render `samples` paths through every pixel of `bucket`.
///
/// Returns one averaged spectrum per pixel in the order of
/// [`Bucket::pixels`].
pub fn render_bucket(
    bucket: &Bucket,
    camera: &Camera,
    scene: &Scene,
    config: &TraceConfig,
    samples: u32,
    rng: &mut dyn RngCore,
) -> Vec<Light> {
    bucket
        .pixels()
        .map(|(x, y)| render_pixel(camera, scene, x, y, config, samples, rng))
        .collect()
}

/// One pass over a bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    pub bucket: Bucket,
    /// Spectra in the order of [`Bucket::pixels`]
    pub pixels: Vec<Light>,
}

impl BucketResult {
    pub fn new(bucket: Bucket, pixels: Vec<Light>) -> Self {
        Self { bucket, pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSettings;
    use crate::material::Material;
    use crate::primitive::Shape;
    use crate::scene::SceneBuilder;
    use lumen_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coverage(width: u32, height: u32, size: u32) -> Vec<u32> {
        let mut hits = vec![0; (width * height) as usize];
        for bucket in generate_buckets(width, height, size) {
            for (x, y) in bucket.pixels() {
                hits[(y * width + x) as usize] += 1;
            }
        }
        hits
    }

    #[test]
    fn test_buckets_tile_image_exactly_once() {
        assert!(coverage(96, 64, 32).iter().all(|&n| n == 1));
        // Clipped edge buckets
        assert!(coverage(100, 37, 32).iter().all(|&n| n == 1));
        assert_eq!(generate_buckets(100, 37, 32).len(), 8);
    }

    #[test]
    fn test_center_bucket_comes_first() {
        let buckets = generate_buckets(160, 96, 32);
        assert_eq!(buckets.len(), 15);
        assert_eq!((buckets[0].x, buckets[0].y), (64, 32));
        assert!(buckets.iter().enumerate().all(|(i, b)| b.index == i));

        // Corners are handed out last
        let last = buckets[buckets.len() - 1];
        assert!(last.x == 0 || last.x == 128);
        assert!(last.y == 0 || last.y == 64);
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(generate_buckets(0, 10, 8).is_empty());
        assert_eq!(generate_buckets(3, 2, 0).len(), 6);
    }

    #[test]
    fn test_render_bucket_follows_pixel_order() {
        let mut b = SceneBuilder::new();
        let root = b.primitive(
            Shape::sphere(Vec3::new(0.0, 0.0, -3.0), 1.0),
            Material::emitter(Light::white()),
        );
        let scene = b.build(root).unwrap();
        let camera = Camera::new(CameraSettings {
            image_width: 8,
            image_height: 8,
            vfov: 20.0,
            ..Default::default()
        });

        let bucket = Bucket::new(2, 2, 4, 3, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let pixels = render_bucket(&bucket, &camera, &scene, &TraceConfig::default(), 2, &mut rng);
        assert_eq!(pixels.len(), 12);

        let (x, y) = bucket.pixels().nth(5).unwrap();
        assert_eq!((x, y), (3, 3));
        // The lamp fills the middle of the frame
        assert_eq!(pixels[5], Light::white());
    }
}
