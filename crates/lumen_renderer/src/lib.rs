//! Lumen Renderer - spectral path tracing of signed distance fields
//!
//! Scenes are built as an arena of SDF nodes, rays are sphere-traced
//! against them, and light is carried as full spectra from
//! [`lumen_core`]. Frames can be rendered in one shot with rayon
//! ([`render_frame`]) or progressively by a [`RenderPool`] of worker
//! threads, with a [`CalibrationWorker`] measuring the references used
//! by the display transform.

pub mod bucket;
pub mod calibration;
pub mod camera;
mod error;
pub mod film;
pub mod march;
pub mod material;
pub mod pool;
pub mod primitive;
pub mod renderer;
pub mod sampling;
pub mod scene;
pub mod scenes;
pub mod tonemap;
pub mod tracer;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use calibration::{CalibrationReader, CalibrationRays, CalibrationSnapshot, CalibrationWorker};
pub use camera::{Camera, CameraSettings};
pub use error::{RenderError, RenderResult};
pub use film::Film;
pub use march::{march, Hit, EPSILON, MAX_DIST};
pub use material::{Bdf, Emission, Interior, Material, MaterialSource};
pub use pool::{Job, JobResult, RenderPool};
pub use primitive::Shape;
pub use renderer::{render_frame, render_pixel, RenderConfig};
pub use sampling::RigConfig;
pub use scene::{NodeId, Scene, SceneBuilder, SceneError};
pub use scenes::{box_scene, BoxScene};
pub use tonemap::{PostProcessor, PostProcessorSettings, ReferenceSamples, ToneMapError, ToneOperator};
pub use tracer::{trace, trace_path, TraceConfig, TraceResult};

/// Re-export Vec3 and common math types from lumen_math
pub use lumen_math::{Mat3, Ray, Vec3};
