//! GPU vector backend over `vello` and `wgpu`, rendering to a texture and
//! reading the frame back through a padded-row staging buffer.

use kurbo::Affine;

use crate::error::{VetraError, VetraResult};
use crate::geometry::MultiBezier;
use crate::model::{Bitmap, Color, FillRule, LineCap, LineJoin};
use crate::render::{ClipOp, Fill, LayerTracker, Paint, Renderer, Stroke};

pub struct GpuRenderer {
    width: u32,
    height: u32,
    device: vello::wgpu::Device,
    queue: vello::wgpu::Queue,
    renderer: vello::Renderer,
    scene: vello::Scene,
    texture: vello::wgpu::Texture,
    view: vello::wgpu::TextureView,
    readback: vello::wgpu::Buffer,
    readback_bytes_per_row: u32,
    frame: Vec<u8>,
    background: Option<Color>,
    transform: Affine,
    fill: Option<Fill>,
    stroke: Option<Stroke>,
    next_opacity: f64,
    layers: LayerTracker,
    clip_scopes: Vec<usize>,
}

impl GpuRenderer {
    /// Acquires an adapter, device and render target. Failing to bind any
    /// of them is an error the caller can use to fall back to software.
    pub fn new(width: u32, height: u32) -> VetraResult<Self> {
        if width == 0 || height == 0 {
            return Err(VetraError::render("render target must not be empty"));
        }

        let instance = vello::wgpu::Instance::new(&vello::wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(
            &vello::wgpu::RequestAdapterOptions {
                power_preference: vello::wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| match e {
            vello::wgpu::RequestAdapterError::NotFound { .. } => {
                VetraError::render("no gpu adapter available")
            }
            other => VetraError::render(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&vello::wgpu::DeviceDescriptor {
                label: None,
                required_features: vello::wgpu::Features::empty(),
                required_limits: vello::wgpu::Limits::default(),
                experimental_features: vello::wgpu::ExperimentalFeatures::default(),
                memory_hints: vello::wgpu::MemoryHints::Performance,
                trace: vello::wgpu::Trace::Off,
            }))
            .map_err(|e| VetraError::render(format!("wgpu request_device failed: {e:?}")))?;

        let renderer = vello::Renderer::new(&device, vello::RendererOptions::default())
            .map_err(|e| VetraError::render(format!("vello renderer init failed: {e:?}")))?;

        let texture = device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("vetra_target"),
            size: vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::TEXTURE_BINDING
                | vello::wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

        let tight_row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| VetraError::render("render target width overflow"))?;
        let bytes_per_row = align_to(
            tight_row_bytes,
            vello::wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let buffer_size = u64::from(bytes_per_row)
            .checked_mul(u64::from(height))
            .ok_or_else(|| VetraError::render("readback buffer size overflow"))?;
        let readback = device.create_buffer(&vello::wgpu::BufferDescriptor {
            label: Some("vetra_readback"),
            size: buffer_size,
            usage: vello::wgpu::BufferUsages::MAP_READ | vello::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            width,
            height,
            device,
            queue,
            renderer,
            scene: vello::Scene::new(),
            texture,
            view,
            readback,
            readback_bytes_per_row: bytes_per_row,
            frame: Vec::new(),
            background: None,
            transform: Affine::IDENTITY,
            fill: None,
            stroke: None,
            next_opacity: 1.0,
            layers: LayerTracker::default(),
            clip_scopes: vec![0],
        })
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
    }

    /// Premultiplied RGBA8 pixels of the last finished frame.
    pub fn pixels(&self) -> &[u8] {
        &self.frame
    }

    fn canvas_rect(&self) -> kurbo::Rect {
        kurbo::Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    fn readback_frame(&mut self) -> VetraResult<()> {
        let mut encoder =
            self.device
                .create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                    label: Some("vetra_readback_encoder"),
                });
        encoder.copy_texture_to_buffer(
            vello::wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: vello::wgpu::Origin3d::ZERO,
                aspect: vello::wgpu::TextureAspect::All,
            },
            vello::wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: vello::wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.readback_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            vello::wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(vello::wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(vello::wgpu::PollType::wait_indefinitely())
            .map_err(|e| VetraError::render(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| VetraError::render("readback channel closed"))?
            .map_err(|e| VetraError::render(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = self.width as usize * 4;
        let row_stride = self.readback_bytes_per_row as usize;
        self.frame.clear();
        self.frame.reserve(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let offset = row * row_stride;
            self.frame.extend_from_slice(&mapped[offset..offset + row_bytes]);
        }
        drop(mapped);
        self.readback.unmap();
        Ok(())
    }
}

impl Renderer for GpuRenderer {
    fn render_start(&mut self) -> VetraResult<()> {
        self.scene.reset();
        self.transform = Affine::IDENTITY;
        self.fill = None;
        self.stroke = None;
        self.next_opacity = 1.0;
        self.layers.reset();
        self.clip_scopes.clear();
        self.clip_scopes.push(0);

        if let Some(bg) = self.background {
            self.scene.fill(
                vello::peniko::Fill::NonZero,
                Affine::IDENTITY,
                color_to_gpu(bg, 1.0),
                None,
                &self.canvas_rect(),
            );
        }
        Ok(())
    }

    fn render_end(&mut self) -> VetraResult<()> {
        self.layers.finish()?;
        for _ in 0..self.clip_scopes.pop().unwrap_or(0) {
            self.scene.pop_layer();
        }

        self.renderer
            .render_to_texture(
                &self.device,
                &self.queue,
                &self.scene,
                &self.view,
                &vello::RenderParams {
                    base_color: vello::peniko::Color::from_rgba8(0, 0, 0, 0),
                    width: self.width,
                    height: self.height,
                    antialiasing_method: vello::AaConfig::Area,
                },
            )
            .map_err(|e| VetraError::render(format!("vello render failed: {e:?}")))?;
        self.readback_frame()
    }

    fn set_fill(&mut self, fill: Fill) {
        self.fill = Some(fill);
    }

    fn set_stroke(&mut self, stroke: Stroke) {
        self.stroke = Some(stroke);
    }

    fn draw_path(&mut self, path: &MultiBezier) -> VetraResult<()> {
        let path = path.to_bez_path();
        if let Some(fill) = self.fill.take() {
            let brush = paint_to_brush(&fill.paint, fill.opacity);
            self.scene.fill(
                match fill.rule {
                    FillRule::NonZero => vello::peniko::Fill::NonZero,
                    FillRule::EvenOdd => vello::peniko::Fill::EvenOdd,
                },
                self.transform,
                &brush,
                None,
                &path,
            );
        }
        if let Some(stroke) = self.stroke.take() {
            let brush = paint_to_brush(&stroke.paint, stroke.opacity);
            self.scene
                .stroke(&stroke_to_gpu(&stroke), self.transform, &brush, None, &path);
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &Bitmap, opacity: f64) -> VetraResult<()> {
        if image.rgba.is_empty() {
            return Ok(());
        }
        let data = vello::peniko::Blob::from(image.rgba.clone());
        let image_data = vello::peniko::ImageData {
            data,
            format: vello::peniko::ImageFormat::Rgba8,
            alpha_type: vello::peniko::ImageAlphaType::Alpha,
            width: image.width,
            height: image.height,
        };

        let opaque = opacity >= 1.0;
        if !opaque {
            self.scene.push_layer(
                vello::peniko::Fill::NonZero,
                vello::peniko::BlendMode::default(),
                opacity as f32,
                Affine::IDENTITY,
                &self.canvas_rect(),
            );
        }
        self.scene.draw_image(&image_data, self.transform);
        if !opaque {
            self.scene.pop_layer();
        }
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.next_opacity = opacity.clamp(0.0, 1.0);
    }

    fn layer_start(&mut self) -> VetraResult<()> {
        let opacity = std::mem::replace(&mut self.next_opacity, 1.0);
        self.scene.push_layer(
            vello::peniko::Fill::NonZero,
            vello::peniko::BlendMode::default(),
            opacity as f32,
            Affine::IDENTITY,
            &self.canvas_rect(),
        );
        self.layers.push();
        self.clip_scopes.push(0);
        Ok(())
    }

    fn layer_end(&mut self) -> VetraResult<()> {
        self.layers.pop()?;
        for _ in 0..self.clip_scopes.pop().unwrap_or(0) {
            self.scene.pop_layer();
        }
        self.scene.pop_layer();
        Ok(())
    }

    fn clip_rect(&mut self, rect: kurbo::Rect, op: ClipOp) -> VetraResult<()> {
        let path = MultiBezier::from_bez_path(&kurbo::Shape::to_path(&rect, 1e-9));
        self.clip_path(&path, op)
    }

    fn clip_path(&mut self, path: &MultiBezier, op: ClipOp) -> VetraResult<()> {
        if op == ClipOp::Replace
            && let Some(count) = self.clip_scopes.last_mut()
        {
            for _ in 0..*count {
                self.scene.pop_layer();
            }
            *count = 0;
        }
        self.scene.push_layer(
            vello::peniko::Fill::NonZero,
            vello::peniko::BlendMode::default(),
            1.0,
            self.transform,
            &path.to_bez_path(),
        );
        if let Some(count) = self.clip_scopes.last_mut() {
            *count += 1;
        }
        Ok(())
    }

    fn set_transform(&mut self, affine: Affine) {
        self.transform = affine;
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }
}

fn color_to_gpu(c: Color, alpha: f64) -> vello::peniko::Color {
    let a = (f64::from(c.a) * alpha.clamp(0.0, 1.0)).round() as u8;
    vello::peniko::Color::from_rgba8(c.r, c.g, c.b, a)
}

fn stops_to_gpu(
    stops: &[crate::model::GradientStop],
    alpha: f64,
) -> Vec<(f32, vello::peniko::Color)> {
    stops
        .iter()
        .map(|s| (s.offset as f32, color_to_gpu(s.color, alpha)))
        .collect()
}

fn paint_to_brush(paint: &Paint, alpha: f64) -> vello::peniko::Brush {
    match paint {
        Paint::Color(c) => vello::peniko::Brush::Solid(color_to_gpu(*c, alpha)),
        Paint::LinearGradient { start, end, stops } => vello::peniko::Brush::Gradient(
            vello::peniko::Gradient::new_linear(*start, *end)
                .with_stops(stops_to_gpu(stops, alpha).as_slice()),
        ),
        Paint::RadialGradient {
            center,
            radius,
            highlight,
            stops,
        } => vello::peniko::Brush::Gradient(
            vello::peniko::Gradient::new_two_point_radial(
                *highlight,
                0.0,
                *center,
                *radius as f32,
            )
            .with_stops(stops_to_gpu(stops, alpha).as_slice()),
        ),
    }
}

fn stroke_to_gpu(stroke: &Stroke) -> kurbo::Stroke {
    let mut out = kurbo::Stroke::new(stroke.width)
        .with_caps(match stroke.cap {
            LineCap::Butt => kurbo::Cap::Butt,
            LineCap::Round => kurbo::Cap::Round,
            LineCap::Square => kurbo::Cap::Square,
        })
        .with_join(match stroke.join {
            LineJoin::Miter => kurbo::Join::Miter,
            LineJoin::Round => kurbo::Join::Round,
            LineJoin::Bevel => kurbo::Join::Bevel,
        })
        .with_miter_limit(stroke.miter_limit);
    if !stroke.dashes.is_empty() {
        out = out.with_dashes(stroke.dash_offset, stroke.dashes.iter().copied());
    }
    out
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
