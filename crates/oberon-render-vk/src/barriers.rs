// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

pub fn subresource(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Stages and accesses that touch an image while it sits in `layout`.
pub fn layout_scope(layout: vk::ImageLayout) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    match layout {
        vk::ImageLayout::UNDEFINED => {
            (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE)
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (
            vk::PipelineStageFlags2::ALL_TRANSFER,
            vk::AccessFlags2::TRANSFER_READ,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::PipelineStageFlags2::ALL_TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE)
        }
        _ => (
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
        ),
    }
}

/// Layout transition with scopes derived from both layouts. Callers widen the
/// source stage when the image arrives through a semaphore wait.
pub fn image_transition(
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> vk::ImageMemoryBarrier2<'static> {
    let (src_stage_mask, src_access_mask) = layout_scope(old_layout);
    let (dst_stage_mask, dst_access_mask) = layout_scope(new_layout);
    vk::ImageMemoryBarrier2 {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
        src_stage_mask,
        src_access_mask,
        dst_stage_mask,
        dst_access_mask,
        old_layout,
        new_layout,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: subresource(aspect_mask),
        ..Default::default()
    }
}

/// Whole-buffer hazard after a transfer write.
pub fn after_transfer_write(
    buffer: vk::Buffer,
    dst_stage_mask: vk::PipelineStageFlags2,
    dst_access_mask: vk::AccessFlags2,
) -> vk::BufferMemoryBarrier2<'static> {
    vk::BufferMemoryBarrier2 {
        s_type: vk::StructureType::BUFFER_MEMORY_BARRIER_2,
        src_stage_mask: vk::PipelineStageFlags2::ALL_TRANSFER,
        src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
        dst_stage_mask,
        dst_access_mask,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        buffer,
        offset: 0,
        size: vk::WHOLE_SIZE,
        ..Default::default()
    }
}

/// # Safety
/// `cmd` must be recording on `device`.
pub unsafe fn record(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    images: &[vk::ImageMemoryBarrier2],
    buffers: &[vk::BufferMemoryBarrier2],
) {
    if images.is_empty() && buffers.is_empty() {
        return;
    }
    let dep = vk::DependencyInfo {
        s_type: vk::StructureType::DEPENDENCY_INFO,
        image_memory_barrier_count: images.len() as u32,
        p_image_memory_barriers: images.as_ptr(),
        buffer_memory_barrier_count: buffers.len() as u32,
        p_buffer_memory_barriers: buffers.as_ptr(),
        ..Default::default()
    };
    unsafe { device.cmd_pipeline_barrier2(cmd, &dep) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_transition_scopes() {
        let b = image_transition(
            vk::Image::null(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        assert_eq!(b.src_stage_mask, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(b.src_access_mask, vk::AccessFlags2::NONE);
        assert_eq!(b.dst_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert!(b
            .dst_access_mask
            .contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn resolve_to_transfer_source() {
        let b = image_transition(
            vk::Image::null(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        assert!(b
            .src_access_mask
            .contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));
        assert_eq!(b.dst_stage_mask, vk::PipelineStageFlags2::ALL_TRANSFER);
        assert_eq!(b.dst_access_mask, vk::AccessFlags2::TRANSFER_READ);
        assert_eq!(b.subresource_range.layer_count, 1);
    }

    #[test]
    fn present_has_no_access() {
        let (stage, access) = layout_scope(vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(stage, vk::PipelineStageFlags2::BOTTOM_OF_PIPE);
        assert_eq!(access, vk::AccessFlags2::NONE);
    }
}
