// renderer.rs — 核心渲染器 (Ray Casting 全景球 / Fullscreen Triangle)

use house_tour::{FrameParams, TextureCatalog, TextureHandle, TourError, TransitionKind};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PanoUniform {
    inv_view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    center_radius: [f32; 4], // xyz = 球心, w = 半径
    mix_ratio: f32,
    aux: f32,
    style: u32, // 0=None, 1=Warp, 2=Stretch
    visible: u32,
    ambient: f32,
    pad1: f32,
    pad2: f32,
    pad3: f32,
}

impl PanoUniform {
    fn zeroed_with_ambient() -> Self {
        Self {
            ambient: 1.0,
            ..<Self as bytemuck::Zeroable>::zeroed()
        }
    }

    fn from_frame(frame: &FrameParams) -> Self {
        let c = frame.sphere_center;
        Self {
            inv_view_proj: frame.inv_view_proj.to_cols_array_2d(),
            eye: frame.eye.extend(1.0).to_array(),
            center_radius: [c.x, c.y, c.z, frame.sphere_radius],
            mix_ratio: frame.transition.blend_factor.clamp(0.0, 1.0),
            aux: frame.transition.aux,
            style: match frame.transition.kind {
                TransitionKind::None => 0,
                TransitionKind::Warp => 1,
                TransitionKind::Stretch => 2,
            },
            visible: frame.show_sphere as u32,
            ambient: frame.ambient,
            pad1: 0.0,
            pad2: 0.0,
            pad3: 0.0,
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

type BoundPair = (Option<TextureHandle>, Option<TextureHandle>);

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,

    // 纹理资源: 按 TextureHandle 下标存放
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    bound: Option<BoundPair>,
    placeholder: GpuTexture,
    textures: Vec<Option<GpuTexture>>,
    sampler: wgpu::Sampler,

    uniform_buffer: wgpu::Buffer,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

fn gpu_err(e: impl std::fmt::Display) -> TourError {
    TourError::Gpu(e.to_string())
}

impl Renderer {
    pub async fn new(window: std::sync::Arc<Window>) -> Result<Self, TourError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }.map_err(gpu_err)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| TourError::Gpu("no compatible adapter".into()))?;
        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .map_err(gpu_err)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| TourError::Gpu("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync on
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        // --- 1. Texture Setup (占位: 1x1 灰) ---
        let placeholder = upload_rgba(
            &device,
            &queue,
            &RgbaImage::from_pixel(1, 1, image::Rgba([40, 40, 40, 255])),
            "placeholder_texture",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat, // 全景图水平循环
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // --- 2. Uniform Setup ---
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Pano Uniform Buffer"),
            contents: bytemuck::cast_slice(&[PanoUniform::zeroed_with_ambient()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1), // from
                texture_entry(2), // to
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("pano_bind_group_layout"),
        });

        let bind_group = create_bind_group(
            &device,
            &bind_group_layout,
            &uniform_buffer,
            &placeholder.view,
            &placeholder.view,
            &sampler,
        );

        // --- 3. Pipeline Setup ---
        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_pano.wgsl"));
        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Panorama Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[], // 无顶点缓冲，Shader 自生成
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        // --- 4. Egui Setup ---
        let egui_ctx = egui::Context::default();
        let mut egui_state = egui_winit::State::new(window.as_ref());
        // 高 DPI
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            bind_group_layout,
            bind_group,
            bound: None,
            placeholder,
            textures: Vec::new(),
            sampler,
            uniform_buffer,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigures the surface after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Uploads every image in the catalog, replacing whatever was resident.
    pub fn upload_catalog(&mut self, catalog: &TextureCatalog) {
        self.textures.clear();
        for handle in catalog.handles() {
            let Some(img) = catalog.image(handle) else {
                continue;
            };
            let idx = handle.0 as usize;
            if self.textures.len() <= idx {
                self.textures.resize_with(idx + 1, || None);
            }
            let label = catalog.name(handle).unwrap_or("panorama_texture");
            self.textures[idx] = Some(self.upload_scaled(img, label));
        }
        self.bound = None;
        log::info!("uploaded {} textures", catalog.len());
    }

    fn upload_scaled(&self, img: &RgbaImage, label: &str) -> GpuTexture {
        // GPU 纹理尺寸限制
        let max_dim = self.device.limits().max_texture_dimension_2d;
        let (src_w, src_h) = img.dimensions();
        if src_w <= max_dim && src_h <= max_dim {
            return upload_rgba(&self.device, &self.queue, img, label);
        }
        let scale = (max_dim as f32 / src_w.max(src_h) as f32).min(1.0);
        let new_w = ((src_w as f32 * scale) as u32).max(1);
        let new_h = ((src_h as f32 * scale) as u32).max(1);
        log::warn!(
            "{label}: {src_w}x{src_h} exceeds GPU limit {max_dim}, scaled to {new_w}x{new_h}"
        );
        let scaled =
            image::imageops::resize(img, new_w, new_h, image::imageops::FilterType::Lanczos3);
        upload_rgba(&self.device, &self.queue, &scaled, label)
    }

    fn view_for(&self, handle: Option<TextureHandle>) -> &wgpu::TextureView {
        handle
            .and_then(|h| self.textures.get(h.0 as usize))
            .and_then(Option::as_ref)
            .map_or(&self.placeholder.view, |t| &t.view)
    }

    /// Writes the frame uniform and rebinds when the texture pair changed.
    pub fn update_frame(&mut self, frame: &FrameParams) {
        let uniform = PanoUniform::from_frame(frame);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        // to 为空时两个槽都绑 from
        let from = frame.transition.from;
        let to = frame.transition.to.or(from);
        let pair = (from, to);
        if self.bound == Some(pair) {
            return;
        }
        let bind_group = create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            self.view_for(from),
            self.view_for(to),
            &self.sampler,
        );
        self.bind_group = bind_group;
        self.bound = Some(pair);
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. Render Scene (Fullscreen Triangle)
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Panorama Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        // 2. Render UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn upload_rgba(device: &wgpu::Device, queue: &wgpu::Queue, img: &RgbaImage, label: &str) -> GpuTexture {
    let (width, height) = img.dimensions();
    let texture_size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: texture_size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some(label),
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        img.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        texture_size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    from: &wgpu::TextureView,
    to: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: uniform.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(from) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(to) },
            wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
        label: Some("pano_bind_group"),
    })
}
