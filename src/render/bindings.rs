use bytemuck::{Pod, Zeroable};
use glam::UVec2;
use wgpu::util::DeviceExt;

use crate::scene::{Light, Material, Scene, VertexData};

/// Binding index of the per-frame uniform in the frame bind group.
pub const FRAME_BINDING: u32 = 0;
/// Binding index of the accumulation history image in the frame bind group.
pub const HISTORY_BINDING: u32 = 1;
/// Binding index of the accumulated image read by the post pass.
pub const POST_INPUT_BINDING: u32 = 0;

/// Logical binding slots for the scene arrays, shared between the host
/// bind-group layout and the `@binding` indices in the shader source. Both
/// sides must agree on these numbers; this enum is the definition site.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSlot {
    Vertices = 0,
    Indices = 1,
    VertexData = 2,
    Lights = 3,
    Materials = 4,
    MaterialMap = 5,
}

impl BindSlot {
    pub const ALL: [Self; 6] = [
        Self::Vertices,
        Self::Indices,
        Self::VertexData,
        Self::Lights,
        Self::Materials,
        Self::MaterialMap,
    ];

    pub const fn binding(self) -> u32 {
        self as u32
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GpuVertex {
    position: [f32; 3],
    _pad: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GpuVertexData {
    normal: [f32; 4],
    uv: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GpuLight {
    radiance: [f32; 4],
    transform: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GpuMaterial {
    albedo: [f32; 3],
    roughness: f32,
    metallic: f32,
    ior: f32,
    anisotropy: f32,
    transmission: f32,
}

pub(crate) fn pack_vertices(vertices: &[glam::Vec3]) -> Vec<GpuVertex> {
    vertices
        .iter()
        .map(|v| GpuVertex {
            position: v.to_array(),
            _pad: 0.0,
        })
        .collect()
}

pub(crate) fn pack_vertex_data(data: &[VertexData]) -> Vec<GpuVertexData> {
    data.iter()
        .map(|d| GpuVertexData {
            normal: d.normal.extend(0.0).to_array(),
            uv: d.uv.extend(0.0).to_array(),
        })
        .collect()
}

pub(crate) fn pack_indices(indices: &[glam::UVec4]) -> Vec<[u32; 4]> {
    indices.iter().map(|quad| quad.to_array()).collect()
}

pub(crate) fn pack_lights(lights: &[Light]) -> Vec<GpuLight> {
    lights
        .iter()
        .map(|light| GpuLight {
            radiance: light.radiance.to_array(),
            transform: light.transform.to_cols_array_2d(),
        })
        .collect()
}

pub(crate) fn pack_materials(materials: &[Material]) -> Vec<GpuMaterial> {
    materials
        .iter()
        .map(|m| GpuMaterial {
            albedo: m.albedo.to_array(),
            roughness: m.roughness,
            metallic: m.metallic,
            ior: m.ior,
            anisotropy: m.anisotropy,
            transmission: m.transmission,
        })
        .collect()
}

/// Scene arrays uploaded once into read-only storage buffers, bound at the
/// slots named by [`BindSlot`]. Static after construction; resize does not
/// touch them.
pub struct SceneBindings {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    pub index_count: u32,
    pub light_count: glam::UVec4,
}

impl SceneBindings {
    pub fn new(device: &wgpu::Device, scene: &Scene) -> Self {
        let entries = BindSlot::ALL.map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-bind-layout"),
            entries: &entries,
        });

        let vertices = storage_buffer(device, "scene-vertices", &pack_vertices(&scene.vertices));
        let indices = storage_buffer(device, "scene-indices", &pack_indices(&scene.indices));
        let vertex_data = storage_buffer(
            device,
            "scene-vertex-data",
            &pack_vertex_data(&scene.vertex_data),
        );
        let lights = storage_buffer(device, "scene-lights", &pack_lights(&scene.lights));
        let materials = storage_buffer(device, "scene-materials", &pack_materials(&scene.materials));
        let material_map = storage_buffer(device, "scene-material-map", &scene.material_map);

        let buffers = [
            (&vertices, BindSlot::Vertices),
            (&indices, BindSlot::Indices),
            (&vertex_data, BindSlot::VertexData),
            (&lights, BindSlot::Lights),
            (&materials, BindSlot::Materials),
            (&material_map, BindSlot::MaterialMap),
        ];
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene-bind-group"),
            layout: &layout,
            entries: &buffers.map(|(buffer, slot)| wgpu::BindGroupEntry {
                binding: slot.binding(),
                resource: buffer.as_entire_binding(),
            }),
        });

        Self {
            layout,
            bind_group,
            index_count: scene.indices.len() as u32,
            light_count: scene.light_count,
        }
    }
}

/// Uploads a slice into a read-only storage buffer. Storage bindings must
/// not be empty, so an empty array becomes a single zeroed element.
fn storage_buffer<T: Pod + Zeroable>(
    device: &wgpu::Device,
    label: &str,
    data: &[T],
) -> wgpu::Buffer {
    let placeholder = [T::zeroed()];
    let contents: &[T] = if data.is_empty() { &placeholder } else { data };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::STORAGE,
    })
}

/// Off-screen accumulation image pair sized exactly to the camera
/// resolution.
///
/// The accumulate pass reads the history image through exact texel loads
/// while writing the blended result into the other image; the pair is
/// swapped after each frame. Recreated wholesale on resize.
pub struct AccumulationTarget {
    resolution: UVec2,
    views: [wgpu::TextureView; 2],
    accum_groups: [wgpu::BindGroup; 2],
    post_groups: [wgpu::BindGroup; 2],
    front: usize,
}

impl AccumulationTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub fn new(
        device: &wgpu::Device,
        resolution: UVec2,
        frame_layout: &wgpu::BindGroupLayout,
        post_layout: &wgpu::BindGroupLayout,
        frame_buffer: &wgpu::Buffer,
    ) -> Self {
        let views = [0, 1].map(|index| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("accumulation-{index}")),
                size: wgpu::Extent3d {
                    width: resolution.x.max(1),
                    height: resolution.y.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        });

        let accum_groups = [0, 1].map(|index| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame-bind-group"),
                layout: frame_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: FRAME_BINDING,
                        resource: frame_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: HISTORY_BINDING,
                        resource: wgpu::BindingResource::TextureView(&views[index]),
                    },
                ],
            })
        });

        let post_groups = [0, 1].map(|index| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("post-bind-group"),
                layout: post_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: POST_INPUT_BINDING,
                    resource: wgpu::BindingResource::TextureView(&views[index]),
                }],
            })
        });

        Self {
            resolution,
            views,
            accum_groups,
            post_groups,
            front: 0,
        }
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    /// View receiving this frame's blended output.
    pub fn write_view(&self) -> &wgpu::TextureView {
        &self.views[1 - self.front]
    }

    /// Frame bind group exposing the history image for the accumulate pass.
    pub fn accum_bind_group(&self) -> &wgpu::BindGroup {
        &self.accum_groups[self.front]
    }

    /// Post bind group exposing the image written this frame.
    pub fn post_bind_group(&self) -> &wgpu::BindGroup {
        &self.post_groups[1 - self.front]
    }

    /// Makes the freshly written image the history for the next frame.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    /// Clears both images so stale samples never blend into a new pose.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        for view in &self.views {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulation-clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
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
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, UVec4, Vec3, Vec4};

    #[test]
    fn bind_slots_are_stable() {
        assert_eq!(
            BindSlot::ALL.map(BindSlot::binding),
            [0, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn packed_buffers_match_element_byte_length() {
        let scene = Scene::default();
        let vertices = pack_vertices(&scene.vertices);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&vertices).len(),
            std::mem::size_of::<GpuVertex>() * scene.vertices.len()
        );
        let lights = pack_lights(&scene.lights);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&lights).len(),
            std::mem::size_of::<GpuLight>() * scene.lights.len()
        );
    }

    #[test]
    fn gpu_struct_layouts() {
        // Strides the shader-side array declarations rely on.
        assert_eq!(std::mem::size_of::<GpuVertex>(), 16);
        assert_eq!(std::mem::size_of::<GpuVertexData>(), 32);
        assert_eq!(std::mem::size_of::<GpuLight>(), 80);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 32);
    }

    #[test]
    fn packing_preserves_values() {
        let light = crate::scene::Light {
            radiance: Vec4::new(1.0, 2.0, 3.0, 4.0),
            transform: Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0)),
        };
        let packed = pack_lights(&[light]);
        assert_eq!(packed[0].radiance, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(packed[0].transform[3], [5.0, 6.0, 7.0, 1.0]);

        let quads = pack_indices(&[UVec4::new(9, 8, 7, 3)]);
        assert_eq!(quads[0], [9, 8, 7, 3]);
    }
}
