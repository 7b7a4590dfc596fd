use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use modelview_render::Camera;
use modelview_scene::{DrawItem, Light, Mesh, MeshId, SceneGraph};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    ambient: [f32; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
}

impl Uniforms {
    /// Fold the scene lights into one ambient term and one directional term.
    fn new(view_proj: Mat4, lights: &[Light]) -> Self {
        let mut ambient = Vec3::ZERO;
        let mut light_color = Vec3::ZERO;
        let mut light_dir = Vec3::Y;
        for light in lights {
            match *light {
                Light::Ambient { color, intensity } => {
                    ambient += Vec3::from(color) * intensity;
                }
                Light::Directional {
                    color, intensity, ..
                } => {
                    // Only one directional light is lit; extra ones are ignored.
                    if light_color == Vec3::ZERO {
                        light_color = Vec3::from(color) * intensity;
                        light_dir = light.direction_to_light().unwrap_or(Vec3::Y);
                    }
                }
            }
        }
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            ambient: ambient.extend(1.0).to_array(),
            light_dir: light_dir.extend(0.0).to_array(),
            light_color: light_color.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    normal_0: [f32; 4],
    normal_1: [f32; 4],
    normal_2: [f32; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(item: &DrawItem<'_>) -> Self {
        let cols = item.world.to_cols_array_2d();
        let normal = normal_matrix(item.world);
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            normal_0: normal.x_axis.extend(0.0).to_array(),
            normal_1: normal.y_axis.extend(0.0).to_array(),
            normal_2: normal.z_axis.extend(0.0).to_array(),
            color: item.mesh.base_color(),
        }
    }
}

/// Inverse-transpose of the upper 3x3, so normals stay perpendicular under
/// non-uniform scale. Singular matrices fall back to the plain 3x3.
fn normal_matrix(world: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(world);
    if linear.determinant().abs() <= f32::EPSILON {
        linear
    } else {
        linear.inverse().transpose()
    }
}

/// Rasterizer state a draw needs: culling and winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    double_sided: bool,
    mirrored: bool,
}

impl PipelineKey {
    const ALL: [PipelineKey; 4] = [
        PipelineKey { double_sided: false, mirrored: false },
        PipelineKey { double_sided: false, mirrored: true },
        PipelineKey { double_sided: true, mirrored: false },
        PipelineKey { double_sided: true, mirrored: true },
    ];

    /// A negative determinant flips the winding of every triangle.
    fn for_item(item: &DrawItem<'_>) -> Self {
        Self {
            double_sided: item.mesh.is_double_sided(),
            mirrored: item.world.determinant() < 0.0,
        }
    }

    fn primitive_state(self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: if self.mirrored {
                wgpu::FrontFace::Cw
            } else {
                wgpu::FrontFace::Ccw
            },
            cull_mode: if self.double_sided {
                None
            } else {
                Some(wgpu::Face::Back)
            },
            ..Default::default()
        }
    }

    fn label(self) -> &'static str {
        match (self.double_sided, self.mirrored) {
            (false, false) => "model_pipeline",
            (false, true) => "model_pipeline_mirrored",
            (true, false) => "model_pipeline_double_sided",
            (true, true) => "model_pipeline_double_sided_mirrored",
        }
    }
}

/// Draw items with geometry to rasterize.
fn drawable<'a>(items: Vec<DrawItem<'a>>) -> Vec<DrawItem<'a>> {
    items
        .into_iter()
        .filter(|item| !item.mesh.positions().is_empty() && !item.mesh.indices().is_empty())
        .collect()
}

fn vertices(mesh: &Mesh) -> Vec<Vertex> {
    mesh.positions()
        .iter()
        .zip(mesh.normals())
        .map(|(p, n)| Vertex {
            position: p.to_array(),
            normal: n.to_array(),
        })
        .collect()
}

/// Geometry of one mesh resident on the GPU.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertex_buffer"),
            contents: bytemuck::cast_slice(&vertices(mesh)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_index_buffer"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices().len() as u32,
        }
    }
}

const INITIAL_INSTANCES: u32 = 64;

/// wgpu-based scene renderer.
pub struct WgpuRenderer {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    meshes: HashMap<MeshId, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    max_instances: u32,
    depth_texture: wgpu::TextureView,
    clear_color: wgpu::Color,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        background: [f64; 4],
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms::new(Mat4::IDENTITY, &[])),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("model_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::MODEL_SHADER.into()),
        });

        let pipelines = PipelineKey::ALL
            .into_iter()
            .map(|key| {
                let pipeline =
                    Self::create_pipeline(device, &pipeline_layout, &shader, surface_format, key);
                (key, pipeline)
            })
            .collect();

        let [r, g, b, a] = background;
        Self {
            pipelines,
            uniform_buffer,
            uniform_bind_group,
            meshes: HashMap::new(),
            instance_buffer: Self::create_instance_buffer(device, INITIAL_INSTANCES),
            max_instances: INITIAL_INSTANCES,
            depth_texture: Self::create_depth_texture(device, width, height),
            clear_color: wgpu::Color { r, g, b, a },
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    /// Drop every GPU buffer this renderer owns.
    pub fn release(&mut self) {
        for mesh in self.meshes.values() {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
        self.meshes.clear();
        self.instance_buffer.destroy();
        self.uniform_buffer.destroy();
    }

    /// Render one frame: clear, then every mesh of the model.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        scene: &SceneGraph,
        camera: &Camera,
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms::new(camera.view_projection(), scene.lights())),
        );

        let items = drawable(scene.draw_list());
        for item in &items {
            self.meshes
                .entry(item.mesh.id())
                .or_insert_with(|| GpuMesh::upload(device, item.mesh));
        }

        let instances: Vec<InstanceData> = items.iter().map(InstanceData::new).collect();
        if instances.len() > self.max_instances as usize {
            self.max_instances = (instances.len() as u32).next_power_of_two();
            self.instance_buffer.destroy();
            self.instance_buffer = Self::create_instance_buffer(device, self.max_instances);
            tracing::debug!(capacity = self.max_instances, "instance buffer grown");
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            let mut bound = None;
            for (i, item) in items.iter().enumerate() {
                let Some(mesh) = self.meshes.get(&item.mesh.id()) else {
                    continue;
                };
                if mesh.index_count == 0 {
                    continue;
                }
                let key = PipelineKey::for_item(item);
                if bound != Some(key) {
                    let Some(pipeline) = self.pipelines.get(&key) else {
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    bound = Some(key);
                }
                let instance = i as u32;
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, instance..instance + 1);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        key: PipelineKey,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(key.label()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x4,
                            7 => Float32x4,
                            8 => Float32x4,
                            9 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: key.primitive_state(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (capacity as u64) * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}
