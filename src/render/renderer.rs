use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{UVec2, UVec4};
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::render::bindings::{
    AccumulationTarget, SceneBindings, FRAME_BINDING, HISTORY_BINDING, POST_INPUT_BINDING,
};
use crate::render::shaders::{ACCUMULATE_SHADER, POST_SHADER};
use crate::scene::Scene;

/// Progressive accumulation renderer.
///
/// Owns the GPU mirrors of the scene arrays and the accumulation target,
/// tracks the iteration count since the last reset, and per frame issues the
/// accumulate pass followed by the post/tonemap pass. Camera and resolution
/// changes must go through [`Renderer::update_camera`] and
/// [`Renderer::resize`]; both reset the accumulated image.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    scene: SceneBindings,
    frame: FrameUniform,
    frame_buffer: wgpu::Buffer,
    frame_layout: wgpu::BindGroupLayout,
    post_layout: wgpu::BindGroupLayout,
    accumulation: AccumulationTarget,
    accumulate_pipeline: wgpu::RenderPipeline,
    post_pipeline: wgpu::RenderPipeline,
    iteration_count: u32,
}

impl Renderer {
    /// Initializes the GPU session for the provided window and scene.
    ///
    /// All shader modules and pipelines are built here; a program that does
    /// not compile cannot produce a `Renderer`. The scene is uploaded once
    /// and the first camera push (with its implied reset) happens before
    /// this returns.
    pub async fn new(window: Arc<Window>, scene: &Scene, camera: &mut Camera) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        camera.resolution = UVec2::new(size.width, size.height);

        let scene = SceneBindings::new(&device, scene);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: FRAME_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<FrameUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: HISTORY_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let post_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: POST_INPUT_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let accumulate_pipeline = create_pipeline(
            &device,
            "accumulate",
            ACCUMULATE_SHADER,
            &[&frame_layout, &scene.layout],
            AccumulationTarget::FORMAT,
        );
        let post_pipeline = create_pipeline(
            &device,
            "post",
            POST_SHADER,
            &[&post_layout],
            surface_format,
        );

        let accumulation = AccumulationTarget::new(
            &device,
            camera.resolution,
            &frame_layout,
            &post_layout,
            &frame_buffer,
        );

        let frame = frame_uniform(camera, scene.index_count, scene.light_count, 0);

        let mut renderer = Self {
            window,
            surface,
            device,
            queue,
            config,
            scene,
            frame,
            frame_buffer,
            frame_layout,
            post_layout,
            accumulation,
            accumulate_pipeline,
            post_pipeline,
            iteration_count: 0,
        };
        renderer.update_camera(camera);
        Ok(renderer)
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Accumulate passes issued since the last reset.
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Current accumulation target resolution.
    pub fn resolution(&self) -> UVec2 {
        self.accumulation.resolution()
    }

    /// Runs one accumulate pass followed by the post pass and presents.
    ///
    /// The accumulate pass is recorded before the post pass on the same
    /// queue, so the post pass always reads the freshly written image.
    pub fn draw(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.frame.iteration_count = self.iteration_count;
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytes_of(&self.frame));
        self.iteration_count += 1;

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulate-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.accumulation.write_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.accumulate_pipeline);
            pass.set_bind_group(0, self.accumulation.accum_bind_group(), &[]);
            pass.set_bind_group(1, &self.scene.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("post-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.post_pipeline);
            pass.set_bind_group(0, self.accumulation.post_bind_group(), &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.accumulation.swap();
        Ok(())
    }

    /// Restarts progressive convergence: zeroes the iteration count and
    /// clears the accumulation target immediately.
    pub fn reset(&mut self) {
        self.iteration_count = 0;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("reset-encoder"),
            });
        self.accumulation.clear(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Recomputes the camera axes, pushes the camera uniforms and resets.
    ///
    /// This is the only path by which camera changes become visible; input
    /// handlers must call it after mutating the camera.
    pub fn update_camera(&mut self, camera: &mut Camera) {
        camera.update();
        self.frame = frame_uniform(camera, self.scene.index_count, self.scene.light_count, 0);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytes_of(&self.frame));
        self.reset();
    }

    /// Recreates the accumulation target and swap chain at the new size,
    /// updates the camera resolution and triggers a full reset. Geometry
    /// and material buffers are not touched.
    pub fn resize(&mut self, camera: &mut Camera, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        camera.resolution = UVec2::new(new_size.width, new_size.height);
        self.accumulation = AccumulationTarget::new(
            &self.device,
            camera.resolution,
            &self.frame_layout,
            &self.post_layout,
            &self.frame_buffer,
        );
        self.update_camera(camera);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    target_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{label}-shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label}-pipeline-layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label}-pipeline")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

/// Per-frame uniform block mirrored by the accumulate shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameUniform {
    eye: [f32; 4],
    forward: [f32; 4],
    up: [f32; 4],
    right: [f32; 4],
    resolution: [u32; 2],
    iteration_count: u32,
    index_count: u32,
    light_count: [u32; 4],
}

pub(crate) fn frame_uniform(
    camera: &Camera,
    index_count: u32,
    light_count: UVec4,
    iteration_count: u32,
) -> FrameUniform {
    FrameUniform {
        eye: camera.eye.extend(1.0).to_array(),
        forward: camera.forward.extend(0.0).to_array(),
        up: camera.up.extend(0.0).to_array(),
        right: camera.right.extend(0.0).to_array(),
        resolution: camera.resolution.to_array(),
        iteration_count,
        index_count,
        light_count: light_count.to_array(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn frame_uniform_layout() {
        // Must match the WGSL FrameUniform declaration.
        assert_eq!(std::mem::size_of::<FrameUniform>(), 96);
    }

    #[test]
    fn frame_uniform_mirrors_camera_state() {
        let mut camera = Camera::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 0.0, 9.0),
            UVec2::new(640, 480),
        );
        camera.update();
        let uniform = frame_uniform(&camera, 12, UVec4::new(2, 0, 0, 0), 7);
        assert_eq!(uniform.eye, camera.eye.extend(1.0).to_array());
        assert_eq!(uniform.forward, camera.forward.extend(0.0).to_array());
        assert_eq!(uniform.up, camera.up.extend(0.0).to_array());
        assert_eq!(uniform.right, camera.right.extend(0.0).to_array());
        assert_eq!(uniform.resolution, [640, 480]);
        assert_eq!(uniform.iteration_count, 7);
        assert_eq!(uniform.index_count, 12);
        assert_eq!(uniform.light_count, [2, 0, 0, 0]);
    }
}
