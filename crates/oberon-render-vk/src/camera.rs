// SPDX-License-Identifier: CEPL-1.0
//! View and projection matrices with a device-local copy.
//!
//! Staging and resident buffers hold one block per frame slot. A slot's
//! block is written while recording that slot, after its fence has been
//! waited, so a mutation never touches memory another slot's copy reads.
//!
//! Windows bind a camera through a [`CameraToken`]. The camera owns the arena
//! of bindings; a token only holds a weak reference to it, so dropping the
//! camera unbinds every window and dropping a token frees its slot.

use std::sync::{Arc, Mutex, Weak};

use ash::vk;
use oberon_core::{Error, Result};
use oberon_math::{look_at, Mat4, Vec3, UP};
use oberon_platform::winit::window::WindowId;

use crate::barriers;
use crate::device::{lock, BufferHandle, GraphicsDevice, MemoryHint};
use crate::renderer::FRAME_COUNT;

const VIEW_OFFSET: vk::DeviceSize = 0;
const PROJECTION_OFFSET: vk::DeviceSize = 64;
const CAMERA_BYTES: vk::DeviceSize = 128;
const CAMERA_BUFFER_BYTES: vk::DeviceSize = CAMERA_BYTES * FRAME_COUNT as vk::DeviceSize;

/// Frame slots whose block is out of date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DirtySlots(u32);

const _: () = assert!(FRAME_COUNT < u32::BITS as usize);

impl DirtySlots {
    fn all() -> Self {
        Self((1u32 << FRAME_COUNT) - 1)
    }

    fn mark_all(&mut self) {
        *self = Self::all();
    }

    fn contains(self, slot: usize) -> bool {
        self.0 & (1 << slot) != 0
    }

    /// Clears `slot` and reports whether it was set.
    fn take(&mut self, slot: usize) -> bool {
        let was = self.contains(slot);
        self.0 &= !(1 << slot);
        was
    }

    fn any(self) -> bool {
        self.0 != 0
    }
}

type Arena = Mutex<Vec<Option<WindowId>>>;

pub struct CameraToken {
    arena: Weak<Arena>,
    index: usize,
}

impl CameraToken {
    /// False once the camera is gone.
    pub fn is_bound(&self) -> bool {
        self.window().is_some()
    }

    pub fn window(&self) -> Option<WindowId> {
        let arena = self.arena.upgrade()?;
        let slots = lock(&arena);
        slots.get(self.index).copied().flatten()
    }
}

impl Drop for CameraToken {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.upgrade() {
            if let Some(slot) = lock(&arena).get_mut(self.index) {
                *slot = None;
            }
        }
    }
}

impl std::fmt::Debug for CameraToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraToken")
            .field("index", &self.index)
            .field("window", &self.window())
            .finish()
    }
}

/// Reuses the first free slot.
fn bind(arena: &Arc<Arena>, window: WindowId) -> CameraToken {
    let mut slots = lock(arena);
    let index = match slots.iter().position(Option::is_none) {
        Some(i) => {
            slots[i] = Some(window);
            i
        }
        None => {
            slots.push(Some(window));
            slots.len() - 1
        }
    };
    CameraToken {
        arena: Arc::downgrade(arena),
        index,
    }
}

pub struct Camera {
    device: Arc<GraphicsDevice>,
    view: Mat4,
    projection: Mat4,
    staging: BufferHandle,
    resident: BufferHandle,
    windows: Arc<Arena>,
    dirty: DirtySlots,
}

impl Camera {
    /// Looks from `position` at the origin.
    pub fn new(device: &Arc<GraphicsDevice>, projection: Mat4, position: Vec3) -> Result<Self> {
        let staging = device.create_buffer(
            CAMERA_BUFFER_BYTES,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryHint::HostVisible,
            "camera staging",
        )?;
        let resident = match device.create_buffer(
            CAMERA_BUFFER_BYTES,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryHint::DeviceLocal,
            "camera resident",
        ) {
            Ok(b) => b,
            Err(e) => {
                device.destroy_buffer(staging);
                return Err(e);
            }
        };
        Ok(Self {
            device: Arc::clone(device),
            view: look_at(position, Vec3::ZERO, UP),
            projection,
            staging,
            resident,
            windows: Arc::new(Mutex::new(Vec::new())),
            dirty: DirtySlots::all(),
        })
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.view = look_at(position, target, UP);
        self.dirty.mark_all();
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.dirty.mark_all();
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// True while some frame slot still holds stale matrices.
    pub fn is_dirty(&self) -> bool {
        self.dirty.any()
    }

    pub fn attach_window(&self, window: WindowId) -> CameraToken {
        bind(&self.windows, window)
    }

    pub fn detach_window(&self, token: CameraToken) {
        drop(token);
    }

    /// Stamps the matrices into `slot`'s staging block and copies it into
    /// the matching resident block, when that slot is stale.
    ///
    /// # Safety
    /// `cmd` must be recording on this camera's device for frame `slot`,
    /// outside a rendering scope, after `slot`'s fence has been waited, and
    /// must be submitted.
    pub(crate) unsafe fn record_upload(
        &mut self,
        cmd: vk::CommandBuffer,
        slot: usize,
    ) -> Result<()> {
        if slot >= FRAME_COUNT {
            return Err(Error::invalid(format!("frame slot {slot} out of range")));
        }
        if !self.dirty.contains(slot) {
            return Ok(());
        }
        let src = self.device.buffer(self.staging)?;
        let dst = self.device.buffer(self.resident)?;
        let base = block_offset(slot);
        self.device
            .write_buffer(self.staging, base + VIEW_OFFSET, bytemuck::bytes_of(&self.view))?;
        self.device.write_buffer(
            self.staging,
            base + PROJECTION_OFFSET,
            bytemuck::bytes_of(&self.projection),
        )?;
        let region = vk::BufferCopy {
            src_offset: base,
            dst_offset: base,
            size: CAMERA_BYTES,
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
                    vk::PipelineStageFlags2::VERTEX_SHADER,
                    vk::AccessFlags2::UNIFORM_READ,
                )],
            );
        }
        self.dirty.take(slot);
        Ok(())
    }
}

fn block_offset(slot: usize) -> vk::DeviceSize {
    slot as vk::DeviceSize * CAMERA_BYTES
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::warn!("camera teardown: wait idle failed: {e}");
        }
        self.device.destroy_buffer(self.resident);
        self.device.destroy_buffer(self.staging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> WindowId {
        WindowId::from(n)
    }

    #[test]
    fn tokens_bind_and_release_slots() {
        let arena: Arc<Arena> = Arc::new(Mutex::new(Vec::new()));
        let a = bind(&arena, id(1));
        let b = bind(&arena, id(2));
        assert_eq!(a.window(), Some(id(1)));
        assert_eq!(b.window(), Some(id(2)));
        drop(a);
        assert_eq!(lock(&arena).iter().flatten().count(), 1);
        let c = bind(&arena, id(3));
        assert_eq!(c.index, 0);
        assert!(b.is_bound() && c.is_bound());
    }

    #[test]
    fn dropping_the_arena_unbinds_every_token() {
        let arena: Arc<Arena> = Arc::new(Mutex::new(Vec::new()));
        let a = bind(&arena, id(1));
        let b = bind(&arena, id(2));
        drop(arena);
        assert!(!a.is_bound());
        assert!(!b.is_bound());
        assert_eq!(a.window(), None);
    }

    #[test]
    fn camera_block_layout() {
        assert_eq!(PROJECTION_OFFSET as usize, std::mem::size_of::<Mat4>());
        assert_eq!(CAMERA_BYTES as usize, 2 * std::mem::size_of::<Mat4>());
    }

    #[test]
    fn slot_blocks_do_not_overlap() {
        for slot in 1..FRAME_COUNT {
            assert_eq!(block_offset(slot), block_offset(slot - 1) + CAMERA_BYTES);
        }
        assert_eq!(block_offset(FRAME_COUNT - 1) + CAMERA_BYTES, CAMERA_BUFFER_BYTES);
    }

    #[test]
    fn each_slot_uploads_once_per_mutation() {
        let mut dirty = DirtySlots::all();
        assert!(dirty.contains(0));
        assert!(dirty.take(0));
        assert!(!dirty.take(0));
        assert!(!dirty.contains(0));
        assert!(dirty.any());
        assert!(dirty.take(1));
        assert!(!dirty.any());

        dirty.mark_all();
        assert!((0..FRAME_COUNT).all(|slot| dirty.take(slot)));
        assert_eq!(dirty, DirtySlots::default());
    }
}
