use anyhow::{bail, Result};
use capture::Framebuffer;
use glam::Mat4;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use wgpu::util::{DeviceExt, TextureDataOrder};
use winit::dpi::PhysicalSize;

use crate::layout::SceneLayout;

use super::context::GpuContext;
use super::pipeline::{QuadInstance, QuadPipelines, DESKTOP_FORMAT};

const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;
const INITIAL_INSTANCE_CAPACITY: usize = 32;

/// GPU copy of the captured desktop, recreated whenever the framebuffer is.
struct DesktopTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
    generation: Option<u64>,
}

impl DesktopTexture {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        size: (u32, u32),
        generation: Option<u64>,
        initial: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("desktop texture"),
                size: wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DESKTOP_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            initial,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("desktop bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            texture,
            bind_group,
            size,
            generation,
        }
    }
}

pub(crate) struct GpuState {
    context: GpuContext,
    pipelines: QuadPipelines,
    sampler: wgpu::Sampler,
    desktop: DesktopTexture,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instances: Vec<QuadInstance>,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, size: PhysicalSize<u32>, vsync: bool) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, vsync)?;
        let pipelines = QuadPipelines::new(&context.device, context.surface_format);
        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("desktop sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        // 1x1 black stand-in until the first capture arrives.
        let desktop = DesktopTexture::new(
            &context.device,
            &context.queue,
            &pipelines.texture_layout,
            &sampler,
            (1, 1),
            None,
            &[0, 0, 0, 0xff],
        );
        let instance_buffer = create_instance_buffer(&context.device, INITIAL_INSTANCE_CAPACITY);

        Ok(Self {
            context,
            pipelines,
            sampler,
            desktop,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            instances: Vec::with_capacity(INITIAL_INSTANCE_CAPACITY),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Copies the captured desktop into the GPU texture, recreating the texture
    /// when the framebuffer was reallocated.
    pub(crate) fn upload(&mut self, framebuffer: &Framebuffer) -> Result<()> {
        let (width, height) = framebuffer.size();
        if width == 0 || height == 0 {
            return Ok(());
        }
        let bytes: &[u8] = bytemuck::cast_slice(framebuffer.pixels());

        if self.desktop.generation != Some(framebuffer.generation())
            || self.desktop.size != (width, height)
        {
            let max = self.context.max_texture_dimension;
            if width > max || height > max {
                bail!("virtual screen {width}x{height} exceeds the GPU texture limit of {max}");
            }
            self.desktop = DesktopTexture::new(
                &self.context.device,
                &self.context.queue,
                &self.pipelines.texture_layout,
                &self.sampler,
                (width, height),
                Some(framebuffer.generation()),
                bytes,
            );
            debug!(width, height, "recreated desktop texture");
            return Ok(());
        }

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.desktop.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Draws the scene quads depth-tested, then the centre marker on top.
    pub(crate) fn render(
        &mut self,
        scene: &SceneLayout,
        view_projection: Mat4,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;

        self.instances.clear();
        self.instances.extend(
            scene
                .quads
                .iter()
                .map(|quad| QuadInstance::textured(view_projection * quad.model, quad.uv.to_array())),
        );
        let scene_count = self.instances.len() as u32;
        if let Some(marker) = scene.center_marker {
            let size = self.context.size;
            self.instances.push(QuadInstance::solid(
                marker.transform(size.width, size.height),
                marker.color,
            ));
        }
        let total = self.instances.len();
        self.ensure_instance_capacity(total);
        if total > 0 {
            self.context.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&self.instances),
            );
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.context.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_bind_group(0, &self.desktop.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));

            if scene_count > 0 {
                render_pass.set_pipeline(&self.pipelines.scene);
                render_pass.draw(0..6, 0..scene_count);
            }
            if total as u32 > scene_count {
                render_pass.set_pipeline(&self.pipelines.overlay);
                render_pass.draw(0..6, scene_count..total as u32);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn ensure_instance_capacity(&mut self, needed: usize) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        self.instance_buffer = create_instance_buffer(&self.context.device, capacity);
        self.instance_capacity = capacity;
        debug!(capacity, "grew quad instance buffer");
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("quad instances"),
        size: (capacity * std::mem::size_of::<QuadInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
