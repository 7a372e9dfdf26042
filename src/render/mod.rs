pub mod bindings;
pub mod renderer;
mod shaders;

pub use bindings::{AccumulationTarget, BindSlot, SceneBindings};
pub use renderer::Renderer;
