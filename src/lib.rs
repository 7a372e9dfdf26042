//! Host-side core of an interactive progressive path tracer.
//!
//! The crate loads a triangle-mesh scene, mirrors its arrays into GPU
//! buffers and accumulates a Monte-Carlo rendered image across frames while
//! the camera orbits. The light-transport math itself lives in the WGSL
//! shaders; these modules provide the orchestration around it: the orbit
//! camera, the passive scene container, the resource binder and the
//! accumulation renderer. Windowing and input stay in the binary so the
//! library remains testable without a display.

pub mod app;
pub mod camera;
pub mod obj;
pub mod render;
pub mod scene;

pub use camera::Camera;
pub use obj::{load_scene, parse_obj, MeshError};
pub use render::{AccumulationTarget, BindSlot, Renderer, SceneBindings};
pub use scene::{Light, Material, Scene, VertexData};
