//! CPU backend for tests and tooling
//!
//! Buffers live in host memory, submitted frames are recorded, and point
//! markers are rasterized into a small framebuffer so picking can run
//! without a GPU. Other programs only clear the framebuffer; tests paint
//! pixels explicitly to stand in for geometry drawn over a marker.

use crate::backend::{BufferHandle, BufferUsage, Frame, GraphicsBackend, Program, SceneUniforms};
use bytemuck::Pod;
use devview_core::{Color3, Error, PixelSource, Result};
use nalgebra::{Matrix4, Vector4};

#[derive(Debug)]
struct HostBuffer {
    label: String,
    usage: BufferUsage,
    data: Vec<u8>,
    writes: usize,
}

/// In-memory [`GraphicsBackend`]
#[derive(Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    buffers: Vec<HostBuffer>,
    uniforms: SceneUniforms,
    last_frame: Option<Frame>,
    frame_count: usize,
    /// Row 0 is the bottom row
    framebuffer: Vec<Color3>,
    painted: Vec<(u32, u32, Color3)>,
    pixel_reads: usize,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffers: Vec::new(),
            uniforms: SceneUniforms::default(),
            last_frame: None,
            frame_count: 0,
            framebuffer: vec![[0.0; 3]; (width * height) as usize],
            painted: Vec::new(),
            pixel_reads: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw contents of a buffer
    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(handle.0 as usize).map(|b| b.data.as_slice())
    }

    /// Buffer contents reinterpreted as `T`
    pub fn buffer_as<T: Pod>(&self, handle: BufferHandle) -> Vec<T> {
        self.buffer_bytes(handle)
            .map(|bytes| {
                bytes
                    .chunks_exact(std::mem::size_of::<T>())
                    .map(bytemuck::pod_read_unaligned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn buffer_label(&self, handle: BufferHandle) -> Option<&str> {
        self.buffers.get(handle.0 as usize).map(|b| b.label.as_str())
    }

    /// Number of writes into a buffer so far
    pub fn buffer_writes(&self, handle: BufferHandle) -> usize {
        self.buffers.get(handle.0 as usize).map_or(0, |b| b.writes)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn uniforms(&self) -> &SceneUniforms {
        &self.uniforms
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn pixel_reads(&self) -> usize {
        self.pixel_reads
    }

    /// Overwrite a pixel (bottom-left origin) in this and every later frame
    pub fn paint(&mut self, x: u32, y: u32, color: Color3) {
        self.painted.push((x, y, color));
        self.put(x, y, color);
    }

    pub fn clear_paint(&mut self) {
        self.painted.clear();
    }

    fn put(&mut self, x: u32, y: u32, color: Color3) {
        if x < self.width && y < self.height {
            self.framebuffer[(y * self.width + x) as usize] = color;
        }
    }

    fn host(&self, handle: BufferHandle) -> Result<&HostBuffer> {
        self.buffers
            .get(handle.0 as usize)
            .ok_or_else(|| Error::Gpu(format!("Unknown buffer {:?}", handle)))
    }

    /// Window coordinates (bottom-left origin) of a model-space point
    fn to_window(&self, mvp: &Matrix4<f32>, p: [f32; 3]) -> Option<[f32; 2]> {
        let clip = mvp * Vector4::new(p[0], p[1], p[2], 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        Some([
            (ndc.x + 1.0) * 0.5 * self.width as f32,
            (ndc.y + 1.0) * 0.5 * self.height as f32,
        ])
    }

    fn rasterize_points(&mut self, positions: &[[f32; 3]], flags: &[u32]) {
        let u = self.uniforms;
        let mvp = Matrix4::from(u.proj) * Matrix4::from(u.view) * Matrix4::from(u.model);

        for (p, &flag) in positions.iter().zip(flags) {
            let Some([cx, cy]) = self.to_window(&mvp, *p) else {
                continue;
            };
            let (mut radius, mut fill) = (u.point_size, u.fill_color);
            if flag & 1 != 0 {
                radius = u.important_size;
                fill = u.important_color;
            }
            if flag & 2 != 0 {
                radius = u.selected_size;
                fill = u.selected_color;
            }

            let x0 = (cx - radius).floor().max(0.0) as u32;
            let y0 = (cy - radius).floor().max(0.0) as u32;
            let x1 = (cx + radius).ceil().max(0.0) as u32;
            let y1 = (cy + radius).ceil().max(0.0) as u32;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
                    if d > radius {
                        continue;
                    }
                    let color = if d > radius - 1.5 { u.outline_color } else { fill };
                    self.put(x, y, color);
                }
            }
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn create_buffer(&mut self, label: &str, usage: BufferUsage) -> Result<BufferHandle> {
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(HostBuffer {
            label: label.to_string(),
            usage,
            data: Vec::new(),
            writes: 0,
        });
        Ok(handle)
    }

    fn allocate_buffer(&mut self, handle: BufferHandle, size: u64) -> Result<()> {
        self.host(handle)?;
        let buffer = &mut self.buffers[handle.0 as usize];
        // keeps the logical size so tests can read back exactly what was uploaded
        buffer.data.resize(size as usize, 0);
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.host(handle)?;
        let buffer = &mut self.buffers[handle.0 as usize];
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            return Err(Error::Gpu(format!(
                "Write of {}..{} exceeds {} ({} bytes)",
                start,
                end,
                buffer.label,
                buffer.data.len()
            )));
        }
        buffer.data[start..end].copy_from_slice(data);
        buffer.writes += 1;
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &SceneUniforms) -> Result<()> {
        self.uniforms = *uniforms;
        Ok(())
    }

    fn submit_frame(&mut self, frame: &Frame) -> Result<()> {
        self.framebuffer.fill(frame.clear_color);

        for draw in &frame.draws {
            if draw.program != Program::Points {
                continue;
            }
            let [positions, flags] = draw.vertex_buffers[..] else {
                return Err(Error::Gpu("Point draws need positions and flags".to_string()));
            };
            if self.host(positions)?.usage != BufferUsage::Vertex {
                return Err(Error::Gpu("Point positions must be a vertex buffer".to_string()));
            }
            let positions: Vec<[f32; 3]> = self.buffer_as(positions);
            let flags: Vec<u32> = self.buffer_as(flags);
            let end = (draw.instances.end as usize).min(positions.len()).min(flags.len());
            let start = (draw.instances.start as usize).min(end);
            self.rasterize_points(&positions[start..end], &flags[start..end]);
        }

        for (x, y, color) in self.painted.clone() {
            self.put(x, y, color);
        }
        self.last_frame = Some(frame.clone());
        self.frame_count += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.width = width;
        self.height = height;
        self.framebuffer = vec![[0.0; 3]; (width * height) as usize];
        Ok(())
    }
}

impl PixelSource for HeadlessBackend {
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<Color3> {
        if x >= self.width || y >= self.height {
            return Err(Error::InvalidInput(format!(
                "Pixel ({}, {}) is outside the {}x{} target",
                x, y, self.width, self.height
            )));
        }
        self.pixel_reads += 1;
        Ok(self.framebuffer[(y * self.width + x) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrawCall, POINT_QUAD_VERTICES};

    #[test]
    fn test_upload_and_read_back() {
        let mut backend = HeadlessBackend::new(4, 4);
        let h = backend.create_buffer("values", BufferUsage::Vertex).unwrap();
        backend.upload(h, bytemuck::cast_slice(&[1.0f32, 2.0, 3.0])).unwrap();
        assert_eq!(backend.buffer_as::<f32>(h), vec![1.0, 2.0, 3.0]);

        backend.write_buffer(h, 4, bytemuck::cast_slice(&[5.0f32])).unwrap();
        assert_eq!(backend.buffer_as::<f32>(h), vec![1.0, 5.0, 3.0]);
        assert!(backend.write_buffer(h, 8, bytemuck::cast_slice(&[0.0f32, 0.0])).is_err());
    }

    #[test]
    fn test_point_markers_rasterize_with_outline() {
        let mut backend = HeadlessBackend::new(32, 32);
        let uniforms = SceneUniforms {
            fill_color: [1.0, 1.0, 0.0],
            outline_color: [0.0, 0.0, 0.0],
            point_size: 6.0,
            ..SceneUniforms::default()
        };
        backend.write_uniforms(&uniforms).unwrap();

        let positions = backend.create_buffer("points", BufferUsage::Vertex).unwrap();
        let flags = backend.create_buffer("flags", BufferUsage::Vertex).unwrap();
        backend.upload(positions, bytemuck::cast_slice(&[[0.0f32, 0.0, 0.0]])).unwrap();
        backend.upload(flags, bytemuck::cast_slice(&[0u32])).unwrap();

        let frame = Frame {
            clear_color: [0.5, 0.5, 0.5],
            draws: vec![DrawCall::arrays(
                Program::Points,
                vec![positions, flags],
                0..POINT_QUAD_VERTICES,
                0..1,
            )],
        };
        backend.submit_frame(&frame).unwrap();

        assert_eq!(backend.read_pixel(16, 16).unwrap(), [1.0, 1.0, 0.0]);
        assert_eq!(backend.read_pixel(21, 16).unwrap(), [0.0, 0.0, 0.0]);
        assert_eq!(backend.read_pixel(0, 0).unwrap(), [0.5, 0.5, 0.5]);

        backend.paint(16, 16, [0.2, 0.2, 0.2]);
        backend.submit_frame(&frame).unwrap();
        assert_eq!(backend.read_pixel(16, 16).unwrap(), [0.2, 0.2, 0.2]);
        assert_eq!(backend.frame_count(), 2);
    }
}
