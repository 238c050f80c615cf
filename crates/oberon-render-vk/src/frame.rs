// SPDX-License-Identifier: CEPL-1.0
//! One in-flight frame: multisampled attachments, command buffers and the
//! synchronization that hands the resolved image to a presentable target.
//!
//! Recording is split into dynamic-rendering segments. The first segment
//! clears and suspends, every draw resumes and suspends again, and
//! `end_rendering` closes the instance with a final resuming segment. Uploads
//! go into a separate command buffer that is submitted ahead of the render
//! buffer in the same batch, so no transfer ever sits between two segments.
//!
//! Submission order within a frame:
//!   1. upload + render (signals render-finished when there is a target)
//!   2. copy/blit (waits target-acquired when an image was acquired and
//!      render-finished when there is a target, both at TRANSFER; signals
//!      copy-blit-finished when there is a target)
//!
//! The frame fence is passed to the same submit call and signals once both
//! batches retire.

use std::sync::Arc;

use ash::vk;
use oberon_core::{Error, Extent2d, Result};
use oberon_render::{
    PipelineKind, SampleCount, UnlitPushConstants, VertexType, CAMERA_OFFSET, MODEL_OFFSET,
};
use tracing::warn;

use crate::barriers::{self, image_transition};
use crate::camera::Camera;
use crate::device::{sample_flags, GraphicsDevice, ImageAllocation};
use crate::mesh::Mesh;
use crate::pipelines::PipelineSet;
use crate::result::{map_vk, VkResultExt};

/// 0.2 in linear space on every channel, opaque.
pub const CLEAR_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
pub const CLEAR_DEPTH: f32 = 1.0;
pub const CLEAR_STENCIL: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Blit,
}

/// Exact copies need matching formats and extents; anything else is scaled.
pub fn transfer_kind(
    src_format: vk::Format,
    src_extent: Extent2d,
    dst_format: vk::Format,
    dst_extent: Extent2d,
) -> TransferKind {
    if src_format == dst_format && src_extent == dst_extent {
        TransferKind::Copy
    } else {
        TransferKind::Blit
    }
}

pub fn segment_flags(first: bool, last: bool) -> vk::RenderingFlags {
    match (first, last) {
        (true, true) => vk::RenderingFlags::empty(),
        (true, false) => vk::RenderingFlags::SUSPENDING,
        (false, false) => vk::RenderingFlags::RESUMING | vk::RenderingFlags::SUSPENDING,
        (false, true) => vk::RenderingFlags::RESUMING,
    }
}

/// Where `end_rendering` delivers the resolved image.
#[derive(Clone, Copy, Debug)]
pub struct TransferTarget {
    pub image: vk::Image,
    pub format: vk::Format,
    pub extent: Extent2d,
    /// Layout the target is left in.
    pub layout: vk::ImageLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    Available,
    Recording,
    InFlight,
    /// A failed submit left the fence unsignaled and it could not be replaced.
    Lost,
}

/// How far `end_rendering` got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndStage {
    Recording,
    /// The fence was (or may have been) reset and nothing was queued to signal it.
    FenceReset,
    Submitted,
}

/// State once `end_rendering` returns, and whether the fence has to be
/// replaced by a signaled one so the next wait on this slot returns.
fn state_after_end(stage: EndStage) -> (FrameState, bool) {
    match stage {
        EndStage::Recording => (FrameState::Available, false),
        EndStage::FenceReset => (FrameState::Available, true),
        EndStage::Submitted => (FrameState::InFlight, false),
    }
}

struct Attachments {
    color: ImageAllocation,
    /// Unused at one sample.
    resolve: ImageAllocation,
    depth_stencil: ImageAllocation,
    color_view: vk::ImageView,
    resolve_view: vk::ImageView,
    depth_stencil_view: vk::ImageView,
}

fn attachment_image(
    format: vk::Format,
    extent: Extent2d,
    samples: SampleCount,
    usage: vk::ImageUsageFlags,
) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: sample_flags(samples),
        tiling: vk::ImageTiling::OPTIMAL,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    }
}

const DEPTH_STENCIL_ASPECT: vk::ImageAspectFlags = vk::ImageAspectFlags::from_raw(
    vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw(),
);

impl Attachments {
    fn new(
        device: &GraphicsDevice,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
        extent: Extent2d,
        samples: SampleCount,
    ) -> Result<Self> {
        let color_usage =
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC;
        let mut made: Vec<ImageAllocation> = Vec::with_capacity(3);
        let specs = [
            (
                attachment_image(color_format, extent, samples, color_usage),
                "frame color",
            ),
            (
                attachment_image(color_format, extent, SampleCount::X1, color_usage),
                "frame resolve",
            ),
            (
                attachment_image(
                    depth_stencil_format,
                    extent,
                    samples,
                    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                ),
                "frame depth-stencil",
            ),
        ];
        for (ci, name) in &specs {
            match device.create_image(ci, name) {
                Ok(img) => made.push(img),
                Err(e) => {
                    made.into_iter().for_each(|i| device.destroy_image(i));
                    return Err(e);
                }
            }
        }

        let aspects = [
            (color_format, vk::ImageAspectFlags::COLOR),
            (color_format, vk::ImageAspectFlags::COLOR),
            (depth_stencil_format, DEPTH_STENCIL_ASPECT),
        ];
        let mut views = Vec::with_capacity(3);
        for (img, (format, aspect)) in made.iter().zip(aspects) {
            match device.create_image_view(img.image(), format, aspect) {
                Ok(v) => views.push(v),
                Err(e) => {
                    unsafe {
                        views
                            .iter()
                            .for_each(|&v| device.raw().destroy_image_view(v, None))
                    };
                    made.into_iter().for_each(|i| device.destroy_image(i));
                    return Err(e);
                }
            }
        }

        let mut made = made.into_iter();
        let (Some(color), Some(resolve), Some(depth_stencil)) = (made.next(), made.next(), made.next())
        else {
            return Err(Error::assertion("attachment count mismatch"));
        };
        Ok(Self {
            color,
            resolve,
            depth_stencil,
            color_view: views[0],
            resolve_view: views[1],
            depth_stencil_view: views[2],
        })
    }

    fn destroy(self, device: &GraphicsDevice) {
        unsafe {
            device.raw().destroy_image_view(self.color_view, None);
            device.raw().destroy_image_view(self.resolve_view, None);
            device.raw().destroy_image_view(self.depth_stencil_view, None);
        }
        device.destroy_image(self.color);
        device.destroy_image(self.resolve);
        device.destroy_image(self.depth_stencil);
    }
}

pub struct Frame {
    device: Arc<GraphicsDevice>,
    /// Position in the renderer's pool; selects per-slot upload regions.
    slot: usize,
    color_format: vk::Format,
    depth_stencil_format: vk::Format,
    extent: Extent2d,
    samples: SampleCount,
    attachments: Option<Attachments>,
    fence: vk::Fence,
    render_finished: vk::Semaphore,
    copy_blit_finished: vk::Semaphore,
    /// Assigned per cycle, owned by the renderer.
    target_acquired: vk::Semaphore,
    pool: vk::CommandPool,
    upload_cmd: vk::CommandBuffer,
    render_cmd: vk::CommandBuffer,
    copy_cmd: vk::CommandBuffer,
    state: FrameState,
    /// Segments recorded since `begin_rendering`.
    segments: u32,
}

impl Frame {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        slot: usize,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
        extent: Extent2d,
        samples: SampleCount,
    ) -> Result<Self> {
        if extent.is_empty() {
            return Err(Error::invalid("frame extent must be non-zero"));
        }
        let mut frame = Self {
            device: Arc::clone(device),
            slot,
            color_format,
            depth_stencil_format,
            extent,
            samples,
            attachments: None,
            fence: vk::Fence::null(),
            render_finished: vk::Semaphore::null(),
            copy_blit_finished: vk::Semaphore::null(),
            target_acquired: vk::Semaphore::null(),
            pool: vk::CommandPool::null(),
            upload_cmd: vk::CommandBuffer::null(),
            render_cmd: vk::CommandBuffer::null(),
            copy_cmd: vk::CommandBuffer::null(),
            state: FrameState::Available,
            segments: 0,
        };
        // Partial construction is released by Drop.
        frame.attachments = Some(Attachments::new(
            device,
            color_format,
            depth_stencil_format,
            extent,
            samples,
        )?);
        frame.fence = device.create_fence(true)?;
        frame.render_finished = device.create_semaphore()?;
        frame.copy_blit_finished = device.create_semaphore()?;

        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::TRANSIENT,
            queue_family_index: device.queue_family(),
            ..Default::default()
        };
        frame.pool = unsafe { device.raw().create_command_pool(&pool_ci, None) }
            .vk_context("vkCreateCommandPool")?;
        let alloc = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: frame.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 3,
            ..Default::default()
        };
        let cmds = unsafe { device.raw().allocate_command_buffers(&alloc) }
            .vk_context("vkAllocateCommandBuffers")?;
        frame.upload_cmd = cmds[0];
        frame.render_cmd = cmds[1];
        frame.copy_cmd = cmds[2];
        Ok(frame)
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn depth_stencil_format(&self) -> vk::Format {
        self.depth_stencil_format
    }

    pub fn fence(&self) -> vk::Fence {
        self.fence
    }

    pub fn copy_blit_finished(&self) -> vk::Semaphore {
        self.copy_blit_finished
    }

    pub fn target_acquired(&self) -> vk::Semaphore {
        self.target_acquired
    }

    pub fn set_target_acquired(&mut self, semaphore: vk::Semaphore) {
        self.target_acquired = semaphore;
    }

    pub fn is_recording(&self) -> bool {
        self.state == FrameState::Recording
    }

    /// Blocks until the last submission of this frame retires.
    pub fn wait_for_availability(&mut self) -> Result<()> {
        match self.state {
            FrameState::Available => return Ok(()),
            FrameState::Lost => return Err(Error::DeviceLost),
            FrameState::Recording | FrameState::InFlight => {}
        }
        match unsafe {
            self.device
                .raw()
                .wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX)
        } {
            Ok(()) => {}
            Err(vk::Result::TIMEOUT) => return Err(Error::DeviceLost),
            Err(e) => return Err(map_vk("vkWaitForFences", e)),
        }
        if self.state == FrameState::InFlight {
            self.state = FrameState::Available;
        }
        Ok(())
    }

    fn require(&self, state: FrameState, op: &str) -> Result<()> {
        if self.state != state {
            return Err(Error::assertion(format!(
                "{op} on a frame that is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn attachments(&self) -> Result<&Attachments> {
        self.attachments
            .as_ref()
            .ok_or_else(|| Error::assertion("frame attachments missing"))
    }

    /// Rebuilds the attachments for a new extent.
    pub fn resize(&mut self, extent: Extent2d) -> Result<()> {
        if extent.is_empty() {
            return Err(Error::invalid("frame extent must be non-zero"));
        }
        self.wait_for_availability()?;
        self.require(FrameState::Available, "resize")?;
        if extent == self.extent {
            return Ok(());
        }
        if let Some(old) = self.attachments.take() {
            old.destroy(&self.device);
        }
        self.attachments = Some(Attachments::new(
            &self.device,
            self.color_format,
            self.depth_stencil_format,
            extent,
            self.samples,
        )?);
        self.extent = extent;
        Ok(())
    }

    /// Single-sampled frames have nothing to resolve and transfer straight
    /// from the color attachment.
    fn resolves(&self) -> bool {
        self.samples != SampleCount::X1
    }

    fn rendering_info_parts(
        &self,
    ) -> Result<(vk::RenderingAttachmentInfo<'static>, vk::RenderingAttachmentInfo<'static>)>
    {
        let a = self.attachments()?;
        let (resolve_mode, resolve_image_view) = if self.resolves() {
            (vk::ResolveModeFlags::AVERAGE, a.resolve_view)
        } else {
            (vk::ResolveModeFlags::NONE, vk::ImageView::null())
        };
        let color = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view: a.color_view,
            image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            resolve_mode,
            resolve_image_view,
            resolve_image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            ..Default::default()
        };
        let depth_stencil = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view: a.depth_stencil_view,
            image_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: CLEAR_DEPTH,
                    stencil: CLEAR_STENCIL,
                },
            },
            ..Default::default()
        };
        Ok((color, depth_stencil))
    }

    /// Opens a segment with `flags`. Every segment shares the same attachment
    /// description; only the flags differ.
    unsafe fn begin_segment(&mut self, last: bool) -> Result<()> {
        let (color, depth_stencil) = self.rendering_info_parts()?;
        let info = vk::RenderingInfo {
            s_type: vk::StructureType::RENDERING_INFO,
            flags: segment_flags(self.segments == 0, last),
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: self.extent.width,
                    height: self.extent.height,
                },
            },
            layer_count: 1,
            color_attachment_count: 1,
            p_color_attachments: &color,
            p_depth_attachment: &depth_stencil,
            p_stencil_attachment: &depth_stencil,
            ..Default::default()
        };
        unsafe { self.device.raw().cmd_begin_rendering(self.render_cmd, &info) };
        self.segments += 1;
        Ok(())
    }

    unsafe fn end_segment(&self) {
        unsafe { self.device.raw().cmd_end_rendering(self.render_cmd) };
    }

    /// Resets the pool, begins every command buffer and records the clearing
    /// first segment.
    pub fn begin_rendering(&mut self) -> Result<()> {
        self.require(FrameState::Available, "begin_rendering")?;
        let device = self.device.raw();
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe {
            device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .vk_context("vkResetCommandPool")?;
            for cmd in [self.upload_cmd, self.render_cmd, self.copy_cmd] {
                device
                    .begin_command_buffer(cmd, &begin)
                    .vk_context("vkBeginCommandBuffer")?;
            }
        }

        let a = self.attachments()?;
        let to_attachment = [
            image_transition(
                a.color.image(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            image_transition(
                a.resolve.image(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            image_transition(
                a.depth_stencil.image(),
                DEPTH_STENCIL_ASPECT,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ),
        ];
        unsafe { barriers::record(device, self.render_cmd, &to_attachment, &[]) };

        self.segments = 0;
        self.state = FrameState::Recording;
        let first = unsafe { self.begin_segment(false) };
        if let Err(e) = first {
            // The fence is untouched; the pool is reset on the next begin.
            self.settle(EndStage::Recording);
            return Err(e);
        }
        unsafe {
            self.set_viewport_and_scissor();
            self.end_segment();
        }
        Ok(())
    }

    /// Applies [`state_after_end`], replacing the fence when needed.
    fn settle(&mut self, stage: EndStage) {
        let (state, replace_fence) = state_after_end(stage);
        self.state = state;
        if !replace_fence {
            return;
        }
        match self.device.create_fence(true) {
            Ok(fence) => {
                unsafe { self.device.raw().destroy_fence(self.fence, None) };
                self.fence = fence;
            }
            Err(e) => {
                warn!("frame fence could not be replaced: {e}");
                self.state = FrameState::Lost;
            }
        }
    }

    /// Negative-height viewport so +Y is up in clip space.
    unsafe fn set_viewport_and_scissor(&self) {
        let (w, h) = (self.extent.width as f32, self.extent.height as f32);
        let viewport = vk::Viewport {
            x: 0.0,
            y: h,
            width: w,
            height: -h,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: self.extent.width,
                height: self.extent.height,
            },
        };
        let device = self.device.raw();
        unsafe {
            device.cmd_set_viewport(self.render_cmd, 0, std::slice::from_ref(&viewport));
            device.cmd_set_scissor(self.render_cmd, 0, std::slice::from_ref(&scissor));
        }
    }

    pub fn draw_test_image(&mut self, pipelines: &PipelineSet) -> Result<()> {
        self.require(FrameState::Recording, "draw_test_image")?;
        let owner = Arc::clone(&self.device);
        let device = owner.raw();
        unsafe {
            self.begin_segment(false)?;
            device.cmd_bind_pipeline(
                self.render_cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipelines.pipeline(PipelineKind::TestImage),
            );
            self.set_viewport_and_scissor();
            device.cmd_draw(self.render_cmd, 3, 1, 0, 0);
            self.end_segment();
        }
        Ok(())
    }

    /// Uploads whatever is dirty, then draws `mesh` as seen by `camera`.
    pub fn draw(
        &mut self,
        pipelines: &PipelineSet,
        camera: &mut Camera,
        mesh: &mut Mesh,
    ) -> Result<()> {
        self.require(FrameState::Recording, "draw")?;
        if mesh.vertex_type() != VertexType::PositionColor {
            return Err(Error::invalid(format!(
                "{:?} meshes have no pipeline",
                mesh.vertex_type()
            )));
        }
        unsafe {
            camera.record_upload(self.upload_cmd, self.slot)?;
            mesh.record_upload(self.upload_cmd)?;
        }

        let constants = UnlitPushConstants {
            model: mesh.transform().to_cols_array_2d(),
            view: camera.view().to_cols_array_2d(),
            proj: camera.projection().to_cols_array_2d(),
        };
        let bytes = bytemuck::bytes_of(&constants);
        let (model_bytes, camera_bytes) = bytes.split_at(CAMERA_OFFSET as usize);
        let vertex_buffer = mesh.resident_buffer()?;
        let layout = pipelines.layout(PipelineKind::UnlitPc);
        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;

        let owner = Arc::clone(&self.device);
        let device = owner.raw();
        unsafe {
            self.begin_segment(false)?;
            device.cmd_bind_pipeline(
                self.render_cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipelines.pipeline(PipelineKind::UnlitPc),
            );
            self.set_viewport_and_scissor();
            device.cmd_push_constants(self.render_cmd, layout, stages, MODEL_OFFSET, model_bytes);
            device.cmd_push_constants(self.render_cmd, layout, stages, CAMERA_OFFSET, camera_bytes);
            device.cmd_bind_vertex_buffers(self.render_cmd, 0, &[vertex_buffer], &[0]);
            device.cmd_draw(self.render_cmd, mesh.size(), 1, 0, 0);
            self.end_segment();
        }
        Ok(())
    }

    /// Closes rendering, resolves into `target` (when there is one) and
    /// submits. `acquired` is waited on before the copy batch runs, with or
    /// without a target.
    ///
    /// On failure the slot is still reusable: the frame returns to
    /// `Available` with a signaled fence.
    pub fn end_rendering(
        &mut self,
        target: Option<TransferTarget>,
        acquired: Option<vk::Semaphore>,
    ) -> Result<()> {
        self.require(FrameState::Recording, "end_rendering")?;
        let mut stage = EndStage::Recording;
        let result = self.record_and_submit(target, acquired, &mut stage);
        self.settle(stage);
        result
    }

    fn record_and_submit(
        &mut self,
        target: Option<TransferTarget>,
        acquired: Option<vk::Semaphore>,
        stage: &mut EndStage,
    ) -> Result<()> {
        let owner = Arc::clone(&self.device);
        let device = owner.raw();
        let (resolve_image, color_format, extent) = {
            let a = self.attachments()?;
            let source = if self.resolves() { &a.resolve } else { &a.color };
            (source.image(), self.color_format, self.extent)
        };

        unsafe {
            self.begin_segment(true)?;
            self.end_segment();
            barriers::record(
                device,
                self.render_cmd,
                &[image_transition(
                    resolve_image,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                )],
                &[],
            );
        }

        if let Some(t) = target {
            let mut to_dst = image_transition(
                t.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            // Chains with the semaphore waits at TRANSFER.
            to_dst.src_stage_mask = vk::PipelineStageFlags2::ALL_TRANSFER;
            let to_final = image_transition(
                t.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                t.layout,
            );
            let layers = vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            };
            unsafe {
                barriers::record(device, self.copy_cmd, &[to_dst], &[]);
                match transfer_kind(color_format, extent, t.format, t.extent) {
                    TransferKind::Copy => {
                        let region = vk::ImageCopy {
                            src_subresource: layers,
                            src_offset: vk::Offset3D::default(),
                            dst_subresource: layers,
                            dst_offset: vk::Offset3D::default(),
                            extent: vk::Extent3D {
                                width: extent.width,
                                height: extent.height,
                                depth: 1,
                            },
                        };
                        device.cmd_copy_image(
                            self.copy_cmd,
                            resolve_image,
                            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                            t.image,
                            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                            std::slice::from_ref(&region),
                        );
                    }
                    TransferKind::Blit => {
                        let corner = |e: Extent2d| vk::Offset3D {
                            x: e.width as i32,
                            y: e.height as i32,
                            z: 1,
                        };
                        let region = vk::ImageBlit {
                            src_subresource: layers,
                            src_offsets: [vk::Offset3D::default(), corner(extent)],
                            dst_subresource: layers,
                            dst_offsets: [vk::Offset3D::default(), corner(t.extent)],
                        };
                        device.cmd_blit_image(
                            self.copy_cmd,
                            resolve_image,
                            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                            t.image,
                            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                            std::slice::from_ref(&region),
                            vk::Filter::NEAREST,
                        );
                    }
                }
                barriers::record(device, self.copy_cmd, &[to_final], &[]);
            }
        }

        unsafe {
            for cmd in [self.upload_cmd, self.render_cmd, self.copy_cmd] {
                device
                    .end_command_buffer(cmd)
                    .vk_context("vkEndCommandBuffer")?;
            }
        }

        let semaphore = |semaphore: vk::Semaphore, stage_mask: vk::PipelineStageFlags2| vk::SemaphoreSubmitInfo {
            s_type: vk::StructureType::SEMAPHORE_SUBMIT_INFO,
            semaphore,
            stage_mask,
            ..Default::default()
        };
        let command = |command_buffer: vk::CommandBuffer| vk::CommandBufferSubmitInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_SUBMIT_INFO,
            command_buffer,
            ..Default::default()
        };
        let render_cmds = [command(self.upload_cmd), command(self.render_cmd)];
        let copy_cmds = [command(self.copy_cmd)];

        // Without a target nothing is presented, so nothing may be left
        // signaled and unwaited. An acquired image is waited on either way.
        let mut render_signals = Vec::new();
        let mut copy_waits = Vec::new();
        let mut copy_signals = Vec::new();
        if let Some(acq) = acquired {
            copy_waits.push(semaphore(acq, vk::PipelineStageFlags2::ALL_TRANSFER));
        }
        if target.is_some() {
            render_signals.push(semaphore(
                self.render_finished,
                vk::PipelineStageFlags2::ALL_COMMANDS,
            ));
            copy_waits.push(semaphore(
                self.render_finished,
                vk::PipelineStageFlags2::ALL_TRANSFER,
            ));
            copy_signals.push(semaphore(
                self.copy_blit_finished,
                vk::PipelineStageFlags2::ALL_COMMANDS,
            ));
        }

        let submits = [
            vk::SubmitInfo2 {
                s_type: vk::StructureType::SUBMIT_INFO_2,
                command_buffer_info_count: render_cmds.len() as u32,
                p_command_buffer_infos: render_cmds.as_ptr(),
                signal_semaphore_info_count: render_signals.len() as u32,
                p_signal_semaphore_infos: render_signals.as_ptr(),
                ..Default::default()
            },
            vk::SubmitInfo2 {
                s_type: vk::StructureType::SUBMIT_INFO_2,
                wait_semaphore_info_count: copy_waits.len() as u32,
                p_wait_semaphore_infos: copy_waits.as_ptr(),
                command_buffer_info_count: copy_cmds.len() as u32,
                p_command_buffer_infos: copy_cmds.as_ptr(),
                signal_semaphore_info_count: copy_signals.len() as u32,
                p_signal_semaphore_infos: copy_signals.as_ptr(),
                ..Default::default()
            },
        ];
        *stage = EndStage::FenceReset;
        unsafe {
            device
                .reset_fences(std::slice::from_ref(&self.fence))
                .vk_context("vkResetFences")?;
        }
        self.device.submit(&submits, self.fence)?;
        *stage = EndStage::Submitted;
        Ok(())
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_availability() {
            warn!("frame teardown: {e}");
        }
        if let Some(a) = self.attachments.take() {
            a.destroy(&self.device);
        }
        let device = self.device.raw();
        unsafe {
            if self.pool != vk::CommandPool::null() {
                let cmds: Vec<_> = [self.upload_cmd, self.render_cmd, self.copy_cmd]
                    .into_iter()
                    .filter(|c| *c != vk::CommandBuffer::null())
                    .collect();
                if !cmds.is_empty() {
                    device.free_command_buffers(self.pool, &cmds);
                }
                device.destroy_command_pool(self.pool, None);
            }
            for s in [self.render_finished, self.copy_blit_finished] {
                if s != vk::Semaphore::null() {
                    device.destroy_semaphore(s, None);
                }
            }
            if self.fence != vk::Fence::null() {
                device.destroy_fence(self.fence, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_targets_are_copied() {
        let e = Extent2d::new(1280, 720);
        assert_eq!(
            transfer_kind(vk::Format::B8G8R8A8_SRGB, e, vk::Format::B8G8R8A8_SRGB, e),
            TransferKind::Copy
        );
    }

    #[test]
    fn mismatched_targets_are_blitted() {
        let e = Extent2d::new(1280, 720);
        assert_eq!(
            transfer_kind(
                vk::Format::B8G8R8A8_SRGB,
                e,
                vk::Format::R8G8B8A8_SRGB,
                e
            ),
            TransferKind::Blit
        );
        assert_eq!(
            transfer_kind(
                vk::Format::B8G8R8A8_SRGB,
                e,
                vk::Format::B8G8R8A8_SRGB,
                Extent2d::new(640, 360)
            ),
            TransferKind::Blit
        );
    }

    #[test]
    fn segment_flag_sequence() {
        // begin, two draws, end
        let flags: Vec<_> = [(true, false), (false, false), (false, false), (false, true)]
            .into_iter()
            .map(|(first, last)| segment_flags(first, last))
            .collect();
        assert_eq!(flags[0], vk::RenderingFlags::SUSPENDING);
        assert_eq!(
            flags[1],
            vk::RenderingFlags::RESUMING | vk::RenderingFlags::SUSPENDING
        );
        assert_eq!(flags[2], flags[1]);
        assert_eq!(flags[3], vk::RenderingFlags::RESUMING);
        assert_eq!(segment_flags(true, true), vk::RenderingFlags::empty());
    }

    #[test]
    fn failure_before_fence_reset_keeps_the_fence() {
        assert_eq!(
            state_after_end(EndStage::Recording),
            (FrameState::Available, false)
        );
    }

    #[test]
    fn failure_after_fence_reset_replaces_the_fence() {
        // An unsignaled fence with no queued signal would block the next wait
        // on this slot forever.
        assert_eq!(
            state_after_end(EndStage::FenceReset),
            (FrameState::Available, true)
        );
    }

    #[test]
    fn successful_submit_is_in_flight() {
        assert_eq!(
            state_after_end(EndStage::Submitted),
            (FrameState::InFlight, false)
        );
    }

    #[test]
    fn clear_values() {
        assert_eq!(CLEAR_COLOR, [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(CLEAR_DEPTH, 1.0);
        assert_eq!(CLEAR_STENCIL, 0);
    }
}
