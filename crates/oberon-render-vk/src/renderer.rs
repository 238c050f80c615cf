// SPDX-License-Identifier: CEPL-1.0
//! Frame ring and the begin/end protocol.
//!
//! Two frames alternate. A frame handed out by [`Renderer::begin_frame`] is a
//! [`FrameGuard`] that borrows the renderer until [`FrameGuard::end_frame`]
//! consumes it.

use std::sync::Arc;

use ash::vk;
use oberon_core::{Error, Extent2d, Result};
use oberon_render::SampleCount;
use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::device::GraphicsDevice;
use crate::frame::{Frame, TransferTarget};
use crate::mesh::Mesh;
use crate::pipelines::PipelineSet;
use crate::render_window::{RenderWindow, DEPTH_STENCIL_CANDIDATES};

pub const FRAME_COUNT: usize = 2;
const _: () = assert!(FRAME_COUNT.is_power_of_two());

pub const COLOR_CANDIDATES: [vk::Format; 2] =
    [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB];

pub fn advance(cursor: usize) -> usize {
    (cursor + 1) & (FRAME_COUNT - 1)
}

/// Surface format first when there is one.
pub fn color_candidates(surface: Option<vk::Format>) -> Vec<vk::Format> {
    let mut out: Vec<vk::Format> = surface.into_iter().collect();
    out.extend(COLOR_CANDIDATES.iter().filter(|f| Some(**f) != surface));
    out
}

pub struct Renderer {
    device: Arc<GraphicsDevice>,
    pipelines: PipelineSet,
    frames: Vec<Frame>,
    /// Per slot; waited by that slot's copy batch.
    acquire: Vec<vk::Semaphore>,
    cursor: usize,
}

impl Renderer {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        extent: Extent2d,
        samples: SampleCount,
    ) -> Result<Self> {
        Self::with_color_candidates(device, extent, samples, &color_candidates(None))
    }

    /// Frames sized to the window's current swapchain, preferring its format.
    pub fn for_window(
        device: &Arc<GraphicsDevice>,
        window: &RenderWindow,
        samples: SampleCount,
    ) -> Result<Self> {
        Self::with_color_candidates(
            device,
            window.extent(),
            samples,
            &color_candidates(Some(window.surface_format())),
        )
    }

    fn with_color_candidates(
        device: &Arc<GraphicsDevice>,
        extent: Extent2d,
        samples: SampleCount,
        candidates: &[vk::Format],
    ) -> Result<Self> {
        let color_format = device.select_image_format(
            candidates,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::COLOR_ATTACHMENT
                | vk::FormatFeatureFlags::TRANSFER_SRC
                | vk::FormatFeatureFlags::BLIT_SRC,
        )?;
        let depth_stencil_format = device.select_image_format(
            &DEPTH_STENCIL_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let clamped = device.clamp_samples(samples);
        if clamped != samples {
            warn!("{samples:?} unsupported, using {clamped:?}");
        }

        let pipelines = PipelineSet::new(device, color_format, depth_stencil_format, clamped)?;
        let mut renderer = Self {
            device: Arc::clone(device),
            pipelines,
            frames: Vec::with_capacity(FRAME_COUNT),
            acquire: Vec::with_capacity(FRAME_COUNT),
            cursor: FRAME_COUNT - 1,
        };
        for slot in 0..FRAME_COUNT {
            renderer.frames.push(Frame::new(
                device,
                slot,
                color_format,
                depth_stencil_format,
                extent,
                clamped,
            )?);
            renderer.acquire.push(device.create_semaphore()?);
        }
        info!(
            "renderer: {}x{} color={color_format:?} depth_stencil={depth_stencil_format:?} samples={clamped:?}",
            extent.width, extent.height
        );
        Ok(renderer)
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn extent(&self) -> Extent2d {
        self.frames
            .first()
            .map(Frame::extent)
            .unwrap_or_default()
    }

    pub fn wait_all(&mut self) -> Result<()> {
        for f in &mut self.frames {
            f.wait_for_availability()?;
        }
        Ok(())
    }

    /// Recreates every frame's attachments at `extent`.
    pub fn resize(&mut self, extent: Extent2d) -> Result<()> {
        self.wait_all()?;
        for f in &mut self.frames {
            f.resize(extent)?;
        }
        debug!("frames resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Advances to the next slot and opens it for recording. Presents nothing
    /// by itself; use [`FrameGuard::end_offscreen`] or
    /// [`FrameGuard::end_frame`] to submit.
    pub fn next_frame(&mut self) -> Result<FrameGuard<'_>> {
        self.cursor = advance(self.cursor);
        let acquired = self.acquire[self.cursor];
        let frame = &mut self.frames[self.cursor];
        frame.wait_for_availability()?;
        frame.begin_rendering()?;
        frame.set_target_acquired(acquired);
        Ok(FrameGuard {
            renderer: self,
            submitted: false,
        })
    }

    /// Waits on `semaphore` with an empty batch so it is unsignaled again.
    fn consume_acquire(&self, semaphore: vk::Semaphore) -> Result<()> {
        let wait = vk::SemaphoreSubmitInfo {
            s_type: vk::StructureType::SEMAPHORE_SUBMIT_INFO,
            semaphore,
            stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
            ..Default::default()
        };
        let submit = vk::SubmitInfo2 {
            s_type: vk::StructureType::SUBMIT_INFO_2,
            wait_semaphore_info_count: 1,
            p_wait_semaphore_infos: &wait,
            ..Default::default()
        };
        self.device
            .submit(std::slice::from_ref(&submit), vk::Fence::null())
    }

    /// Rebuilds the window's swapchain when it is dirty. `None` without
    /// advancing when the window cannot be drawn to.
    pub fn begin_frame(&mut self, window: &mut RenderWindow) -> Result<Option<FrameGuard<'_>>> {
        if window.needs_rebuild() {
            self.wait_all()?;
            window.rebuild_swapchain()?;
        }
        if !window.is_drawable() {
            return Ok(None);
        }
        self.next_frame().map(Some)
    }
}

// STRICT TEARDOWN ORDER:
// - Frames (each waits on its own fence)
// - Acquire semaphores
// - Pipelines (field drop)
impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.wait_all() {
            warn!("renderer teardown: {e}");
        }
        self.frames.clear();
        for s in self.acquire.drain(..) {
            unsafe { self.device.raw().destroy_semaphore(s, None) };
        }
    }
}

/// The frame currently recording. Dropping it unsubmitted submits an empty
/// frame so the slot becomes available again.
pub struct FrameGuard<'a> {
    renderer: &'a mut Renderer,
    submitted: bool,
}

impl FrameGuard<'_> {
    fn frame(&mut self) -> &mut Frame {
        let slot = self.renderer.cursor;
        &mut self.renderer.frames[slot]
    }

    pub fn slot(&self) -> usize {
        self.renderer.cursor
    }

    pub fn draw_test_image(&mut self) -> Result<()> {
        let r = &mut *self.renderer;
        r.frames[r.cursor].draw_test_image(&r.pipelines)
    }

    pub fn draw(&mut self, camera: &mut Camera, mesh: &mut Mesh) -> Result<()> {
        let r = &mut *self.renderer;
        r.frames[r.cursor].draw(&r.pipelines, camera, mesh)
    }

    /// Submits without a target.
    pub fn end_offscreen(mut self) -> Result<()> {
        self.frame().end_rendering(None, None)?;
        self.submitted = true;
        Ok(())
    }

    /// Acquires an image from `window`, copies or blits the frame into it and
    /// presents. An out-of-date swapchain still submits (without a target) so
    /// the slot's fence signals.
    pub fn end_frame(mut self, window: &mut RenderWindow) -> Result<()> {
        let acquired = self.frame().target_acquired();
        let Some(index) = window.acquire_next_image(acquired)? else {
            debug!("swapchain out of date at acquire, frame submitted offscreen");
            return self.end_offscreen();
        };
        let Some(image) = window.image(index) else {
            self.submit_acquired(window, None, acquired)?;
            window.invalidate_swapchain();
            return Err(Error::assertion(format!(
                "acquired image {index} out of range"
            )));
        };
        let target = TransferTarget {
            image,
            format: window.surface_format(),
            extent: window.extent(),
            layout: vk::ImageLayout::PRESENT_SRC_KHR,
        };
        self.submit_acquired(window, Some(target), acquired)?;
        let finished = self.frame().copy_blit_finished();
        window.present_image(index, finished)
    }

    /// Ends the frame waiting on `acquired`. A failed end leaves the slot
    /// reusable but the semaphore signaled with no waiter, so an empty batch
    /// consumes it and the swapchain is rebuilt before the next acquire.
    fn submit_acquired(
        &mut self,
        window: &mut RenderWindow,
        target: Option<TransferTarget>,
        acquired: vk::Semaphore,
    ) -> Result<()> {
        match self.frame().end_rendering(target, Some(acquired)) {
            Ok(()) => {
                self.submitted = true;
                Ok(())
            }
            Err(e) => {
                window.invalidate_swapchain();
                if let Err(inner) = self.renderer.consume_acquire(acquired) {
                    warn!("acquire semaphore left signaled: {inner}");
                }
                Err(e)
            }
        }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.submitted {
            return;
        }
        let frame = self.frame();
        if frame.is_recording() {
            if let Err(e) = frame.end_rendering(None, None) {
                warn!("abandoned frame submit failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_alternates() {
        let mut c = FRAME_COUNT - 1;
        let mut seen = Vec::new();
        for _ in 0..5 {
            c = advance(c);
            seen.push(c);
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn surface_format_is_tried_first() {
        assert_eq!(
            color_candidates(Some(vk::Format::R8G8B8A8_SRGB)),
            vec![vk::Format::R8G8B8A8_SRGB, vk::Format::B8G8R8A8_SRGB]
        );
        assert_eq!(
            color_candidates(Some(vk::Format::A2B10G10R10_UNORM_PACK32)),
            vec![
                vk::Format::A2B10G10R10_UNORM_PACK32,
                vk::Format::B8G8R8A8_SRGB,
                vk::Format::R8G8B8A8_SRGB
            ]
        );
        assert_eq!(color_candidates(None), COLOR_CANDIDATES.to_vec());
    }
}
