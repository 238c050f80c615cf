// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use oberon_core::Result;
use oberon_math::{rotate, Mat4, Vec3};
use oberon_render::VertexType;

use crate::barriers;
use crate::device::{BufferHandle, GraphicsDevice, MemoryHint};

/// Model matrix, composed by post-multiplication.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ModelTransform(Mat4);

impl ModelTransform {
    /// transform ← transform · R(radians, axis)
    fn rotate(&mut self, radians: f32, axis: Vec3) {
        self.0 = rotate(self.0, radians, axis);
    }
}

/// Vertex data in a staging buffer and a device-local copy, plus a model
/// transform. Vertices are immutable, so the copy is recorded once on the
/// first draw. The transform travels as a push constant and never touches
/// either buffer.
pub struct Mesh {
    device: Arc<GraphicsDevice>,
    vertex_type: VertexType,
    vertex_count: u32,
    byte_size: vk::DeviceSize,
    transform: ModelTransform,
    staging: BufferHandle,
    resident: BufferHandle,
    dirty: bool,
}

impl Mesh {
    /// `bytes` must hold a whole, non-zero number of `vertex_type` vertices.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        vertex_type: VertexType,
        bytes: &[u8],
    ) -> Result<Self> {
        let vertex_count = vertex_type.vertex_count(bytes.len())?;
        let byte_size = bytes.len() as vk::DeviceSize;

        let staging = device.create_buffer(
            byte_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryHint::HostVisible,
            "mesh staging",
        )?;
        if let Err(e) = device.write_buffer(staging, 0, bytes) {
            device.destroy_buffer(staging);
            return Err(e);
        }
        let resident = match device.create_buffer(
            byte_size,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryHint::DeviceLocal,
            "mesh resident",
        ) {
            Ok(b) => b,
            Err(e) => {
                device.destroy_buffer(staging);
                return Err(e);
            }
        };

        Ok(Self {
            device: Arc::clone(device),
            vertex_type,
            vertex_count,
            byte_size,
            transform: ModelTransform(Mat4::IDENTITY),
            staging,
            resident,
            dirty: true,
        })
    }

    pub fn from_vertices<T: bytemuck::Pod>(
        device: &Arc<GraphicsDevice>,
        vertex_type: VertexType,
        vertices: &[T],
    ) -> Result<Self> {
        Self::new(device, vertex_type, bytemuck::cast_slice(vertices))
    }

    /// transform ← transform · R(radians, axis)
    pub fn rotate(&mut self, radians: f32, axis: Vec3) {
        self.transform.rotate(radians, axis);
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = ModelTransform(transform);
    }

    pub fn transform(&self) -> Mat4 {
        self.transform.0
    }

    pub fn vertex_type(&self) -> VertexType {
        self.vertex_type
    }

    /// Vertex count.
    pub fn size(&self) -> u32 {
        self.vertex_count
    }

    /// True until the first draw has recorded the vertex copy.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn resident_buffer(&self) -> Result<vk::Buffer> {
        self.device.buffer(self.resident)
    }

    /// # Safety
    /// `cmd` must be recording on this mesh's device, outside a rendering
    /// scope, and must be submitted.
    pub(crate) unsafe fn record_upload(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let src = self.device.buffer(self.staging)?;
        let dst = self.device.buffer(self.resident)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: self.byte_size,
        };
        let device = self.device.raw();
        unsafe {
            device.cmd_copy_buffer(cmd, src, dst, std::slice::from_ref(&region));
            barriers::record(
                device,
                cmd,
                &[],
                &[barriers::after_transfer_write(
                    dst,
                    vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
                    vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
                )],
            );
        }
        self.dirty = false;
        Ok(())
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::warn!("mesh teardown: wait idle failed: {e}");
        }
        self.device.destroy_buffer(self.resident);
        self.device.destroy_buffer(self.staging);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use oberon_math::approx_eq;

    use super::*;

    #[test]
    fn rotations_about_one_axis_compose() {
        let mut twice = ModelTransform(Mat4::IDENTITY);
        twice.rotate(0.3, Vec3::Y);
        twice.rotate(0.3, Vec3::Y);
        let mut once = ModelTransform(Mat4::IDENTITY);
        once.rotate(0.6, Vec3::Y);
        assert!(approx_eq(&twice.0, &once.0, 1e-5));
    }

    #[test]
    fn rotation_applies_in_model_space() {
        let offset = Vec3::new(1.0, 2.0, 3.0);
        let mut t = ModelTransform(Mat4::from_translation(offset));
        t.rotate(FRAC_PI_2, Vec3::Y);
        assert!(t.0.transform_point3(Vec3::ZERO).abs_diff_eq(offset, 1e-5));
        let x = t.0.transform_point3(Vec3::X);
        assert!(x.abs_diff_eq(offset + Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn degenerate_axis_leaves_transform_alone() {
        let mut t = ModelTransform(Mat4::from_translation(Vec3::X));
        let before = t;
        t.rotate(1.0, Vec3::ZERO);
        assert_eq!(t, before);
    }
}
