use std::{mem, process, sync::Arc};

use anyhow::bail;
use bytemuck::NoUninit;
use wgpu::{
    Adapter, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, BlendState,
    Buffer, BufferBindingType, BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoder, Device, DeviceDescriptor, FragmentState, InstanceDescriptor, LoadOp,
    MemoryHints, MultisampleState, Operations, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PrimitiveState, PrimitiveTopology, Queue, RenderPass,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceError, SurfaceTarget, TextureView, VertexState,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::{
    canvas::{Canvas, Color},
    config::Config,
    draw::{Frame, Shape},
    input::{Key, Pointer},
    math::{vec2, Vec2f},
};

pub struct App {
    instance: wgpu::Instance,
    config: Config,
    win: Option<Win>,
}

struct Gpu {
    device: Device,
    queue: Queue,
    /// Surface configuration at the window's creation size.
    surface_config: SurfaceConfiguration,

    render_pipeline: RenderPipeline,

    uniforms_bgl: BindGroupLayout,
    instances_bgl: BindGroupLayout,
}

impl Gpu {
    fn new(
        instance: &wgpu::Instance,
        surface: &Surface<'_>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            compatible_surface: Some(surface),
            ..Default::default()
        }));
        let adapter = match adapter {
            Ok(adapter) => adapter,
            Err(e) => bail!("failed to find a supported graphics adapter: {e}"),
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            memory_hints: MemoryHints::MemoryUsage,
            ..Default::default()
        }))?;

        let surface_config = Self::surface_config(&adapter, surface, width, height)?;

        // Shader
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        // BGLs
        let uniforms_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("uniforms"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                count: None,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            }],
        });
        let instances_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("instances"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                count: None,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            }],
        });

        // Pipeline.
        let render_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("main_render_pipeline"),
            layout: Some(&device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("main_render_pipeline"),
                bind_group_layouts: &[&uniforms_bgl, &instances_bgl],
                ..Default::default()
            })),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vertex"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fragment"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format: surface_config.format,
                    blend: Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: ColorWrites::all(),
                })],
            }),
            multiview: None,
            cache: None,
        });

        Ok(Gpu {
            device,
            queue,
            surface_config,
            render_pipeline,
            uniforms_bgl,
            instances_bgl,
        })
    }

    /// Picks a non-sRGB surface format, so that color values reach the screen unchanged.
    fn surface_config(
        adapter: &Adapter,
        surface: &Surface<'_>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<SurfaceConfiguration> {
        let Some(mut config) = surface.get_default_config(adapter, width, height) else {
            bail!("graphics adapter does not support the window surface");
        };
        let caps = surface.get_capabilities(adapter);
        if let Some(format) = caps.formats.iter().copied().find(|f| !f.is_srgb()) {
            config.format = format;
        }
        Ok(config)
    }
}

struct Win {
    window: Arc<Window>,
    surface: Surface<'static>,
    gpu: Gpu,

    shapes: Drawable,
    frame: Frame,
    instances: Vec<Instance>,

    canvas: Canvas,
    pointer: Pointer,
}

impl Win {
    fn recreate_swapchain(&self) {
        let res = self.window.inner_size();

        let mut config = self.gpu.surface_config.clone();
        config.width = res.width.max(1);
        config.height = res.height.max(1);

        log::debug!(
            "configuring window surface for {}x{} (format: {:?}, present mode: {:?}, alpha mode: {:?})",
            config.width,
            config.height,
            config.format,
            config.present_mode,
            config.alpha_mode,
        );

        self.surface.configure(&self.gpu.device, &config);
    }

    fn redraw(&mut self) {
        let st = match self.surface.get_current_texture() {
            Ok(st) => st,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.recreate_swapchain();
                match self.surface.get_current_texture() {
                    Ok(st) => st,
                    Err(e) => {
                        log::warn!("failed to acquire frame after recreating swapchain: {}", e);
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("failed to acquire frame: {}", e);
                return;
            }
        };

        self.frame.reset();
        self.canvas.render(&mut self.frame);

        self.instances.clear();
        self.instances
            .extend(self.frame.shapes().iter().map(Instance::from_shape));
        self.shapes.set_instances(&self.gpu, &self.instances);

        let mut enc = self.gpu.device.create_command_encoder(&Default::default());

        let view = st.texture.create_view(&Default::default());
        let size = vec2(st.texture.width() as f32, st.texture.height() as f32);
        let mut pass = Pass::new(&self.gpu, &mut enc, &view, size, self.frame.background());
        self.shapes.draw(&mut pass);
        drop(pass);

        self.gpu.queue.submit([enc.finish()]);
        self.window.pre_present_notify();
        st.present();
    }

    fn handle_input(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.position = vec2(position.x as f32, position.y as f32);
                self.canvas
                    .on_pointer_move(self.pointer.position, self.pointer.primary_down);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer.update_button(button, state);
                match state {
                    ElementState::Pressed => self.canvas.on_pointer_press(
                        button,
                        self.pointer.modifiers,
                        self.pointer.position,
                    ),
                    ElementState::Released => self.canvas.on_pointer_release(button),
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.pointer.modifiers = modifiers.state();
                return;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                // Repeats only resync the palette.
                let key = if event.repeat {
                    None
                } else {
                    Key::from_logical(&event.logical_key)
                };
                self.canvas.on_key_press(key);
            }
            _ => return,
        }

        self.window.request_redraw();
    }
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Ok(Self {
            instance: wgpu::Instance::new(&InstanceDescriptor {
                backends: Backends::PRIMARY,
                ..Default::default()
            }),
            config,
            win: None,
        })
    }

    fn create_win(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Win> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
                    .with_resizable(false)
                    .with_title(&self.config.title),
            )?,
        );

        let surface = self
            .instance
            .create_surface(SurfaceTarget::from(window.clone()))?;
        let size = window.inner_size();
        let gpu = Gpu::new(&self.instance, &surface, size.width, size.height)?;

        log::debug!(
            "created window at {}x{}, format={:?}",
            size.width,
            size.height,
            gpu.surface_config.format
        );

        let shapes = Drawable::new(&gpu);
        let canvas = Canvas::setup(size.width, size.height, &self.config);

        let win = Win {
            window,
            surface,
            gpu,
            shapes,
            frame: Frame::new(),
            instances: Vec::new(),
            canvas,
            pointer: Pointer::default(),
        };
        win.recreate_swapchain();
        win.window.request_redraw();
        Ok(win)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.win.is_none() {
            let win = match self.create_win(event_loop) {
                Ok(win) => win,
                Err(e) => {
                    eprintln!("could not create window: {e}");
                    process::exit(1);
                }
            };
            self.win = Some(win);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(win) = &mut self.win else { return };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => win.redraw(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                win.recreate_swapchain();
                win.window.request_redraw();
            }
            event => win.handle_input(event),
        }
    }
}

#[derive(Clone, Copy, NoUninit)]
#[repr(C)]
struct Uniforms {
    render_target_size: Vec2f,
    _padding: [f32; 2],
}

const KIND_CIRCLE: u32 = 0;
const KIND_LINE: u32 = 1;
const KIND_RECT: u32 = 2;

/// One shape, as laid out in the shader's instance storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
#[repr(C)]
struct Instance {
    /// Premultiplied RGBA.
    color: [f32; 4],
    a: Vec2f,
    b: Vec2f,
    radius: f32,
    kind: u32,
    _padding: [f32; 2],
}

impl Instance {
    fn from_shape(shape: &Shape) -> Self {
        let (kind, a, b, radius, paint) = match *shape {
            Shape::Circle {
                center,
                radius,
                paint,
            } => (KIND_CIRCLE, center, center, radius, paint),
            Shape::Line {
                start,
                end,
                width,
                paint,
            } => (KIND_LINE, start, end, width * 0.5, paint),
            Shape::Rect {
                center,
                size,
                paint,
            } => (KIND_RECT, center, size * 0.5, 0.0, paint),
        };
        Self {
            color: premultiply(paint.color, paint.alpha),
            a,
            b,
            radius,
            kind,
            _padding: [0.0; 2],
        }
    }
}

fn premultiply(color: Color, alpha: f32) -> [f32; 4] {
    [color.r * alpha, color.g * alpha, color.b * alpha, alpha]
}

fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r.into(),
        g: color.g.into(),
        b: color.b.into(),
        a: 1.0,
    }
}

struct Pass<'a> {
    gpu: &'a Gpu,
    pass: RenderPass<'a>,
    render_target_size: Vec2f,
}

impl<'a> Pass<'a> {
    fn new(
        gpu: &'a Gpu,
        enc: &'a mut CommandEncoder,
        target: &TextureView,
        render_target_size: Vec2f,
        clear: Color,
    ) -> Self {
        let pass = enc.begin_render_pass(&RenderPassDescriptor {
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(clear_color(clear)),
                    store: StoreOp::Store,
                },
            })],
            ..Default::default()
        });

        Self {
            gpu,
            pass,
            render_target_size,
        }
    }
}

/// GPU buffers holding the instances drawn by one draw call.
struct Drawable {
    uniform_buf: Buffer,
    instance_buf: Buffer,
    uniforms_bg: BindGroup,
    instances_bg: BindGroup,
    instance_count: u32,
}

impl Drawable {
    fn new(gpu: &Gpu) -> Self {
        let uniform_buf = gpu.device.create_buffer(&BufferDescriptor {
            label: Some("uniforms"),
            size: mem::size_of::<Uniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instance_buf = Self::create_instance_buf(gpu, 1); // 1 instance preallocated
        let uniforms_bg = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("uniforms"),
            layout: &gpu.uniforms_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(uniform_buf.as_entire_buffer_binding()),
            }],
        });
        let instances_bg = Self::create_instances_bg(gpu, &instance_buf);

        Self {
            uniform_buf,
            instance_buf,
            uniforms_bg,
            instances_bg,
            instance_count: 0,
        }
    }

    fn create_instance_buf(gpu: &Gpu, capacity: usize) -> Buffer {
        gpu.device.create_buffer(&BufferDescriptor {
            label: Some("instances"),
            size: (mem::size_of::<Instance>() * capacity) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_instances_bg(gpu: &Gpu, instance_buf: &Buffer) -> BindGroup {
        gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("instances"),
            layout: &gpu.instances_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(instance_buf.as_entire_buffer_binding()),
            }],
        })
    }

    fn set_instances(&mut self, gpu: &Gpu, instances: &[Instance]) {
        let size = (mem::size_of::<Instance>() * instances.len()) as u64;
        if self.instance_buf.size() < size {
            // Grow geometrically, the stroke history only ever gets longer.
            let capacity = instances.len().next_power_of_two();
            log::debug!("growing instance buffer to {capacity} instances");
            self.instance_buf = Self::create_instance_buf(gpu, capacity);
            self.instances_bg = Self::create_instances_bg(gpu, &self.instance_buf);
        }
        if !instances.is_empty() {
            gpu.queue
                .write_buffer(&self.instance_buf, 0, bytemuck::cast_slice(instances));
        }
        self.instance_count = instances.len() as u32;
    }

    fn draw(&self, p: &mut Pass<'_>) {
        if self.instance_count == 0 {
            return;
        }

        let uniforms = Uniforms {
            render_target_size: p.render_target_size,
            _padding: [0.0; 2],
        };
        p.gpu
            .queue
            .write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniforms));

        p.pass.set_pipeline(&p.gpu.render_pipeline);
        p.pass.set_bind_group(0, &self.uniforms_bg, &[]);
        p.pass.set_bind_group(1, &self.instances_bg, &[]);
        p.pass.draw(0..4, 0..self.instance_count);
    }
}
