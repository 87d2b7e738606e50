//! One-shot render of the built-in box scene.
//!
//! Renders with rayon and saves a PNG next to the working directory.

use lumen_core::ConversionMode;
use lumen_renderer::{
    box_scene, render_frame, Camera, PostProcessorSettings, RenderConfig, TraceConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("Lumen - Box Scene Example");
    println!("=========================");

    let start = std::time::Instant::now();
    let built = box_scene(320, 320)?;
    println!("Scene built in {:?}", start.elapsed());

    let camera = Camera::new(built.camera);
    let config = RenderConfig {
        samples_per_pixel: 16,
        passes: 4,
        trace: TraceConfig {
            max_depth: 6,
            rig: Some(built.rig),
            ..Default::default()
        },
        ..Default::default()
    };

    let start = std::time::Instant::now();
    let film = render_frame(&camera, &built.scene, &config);
    println!("Rendered in {:?}", start.elapsed());

    // Without a calibration thread, reference the film itself: the pixel
    // under the light and a point on the back wall.
    let mode = ConversionMode::default();
    let rgb = film.linear_rgb(mode);
    let at = |x: u32, y: u32| rgb[(y * film.width() + x) as usize];
    let references = lumen_renderer::ReferenceSamples {
        white: at(film.width() / 2, film.height() / 3),
        bright: at(film.width() / 2, film.height() / 8),
    };

    let post = PostProcessorSettings::default().build(&references);
    let image = film.develop(mode, &post);
    image.save("box_render.png")?;
    println!("Saved box_render.png");

    Ok(())
}
