// SPDX-License-Identifier: CEPL-1.0
//! Logical device: one queue, one allocator, one pipeline cache.
//!
//! Buffers live in a per-device slot map addressed by [`BufferHandle`]; images
//! are returned as [`ImageAllocation`] values owned by their caller. Both go
//! through the same `gpu-allocator` instance and the same live-allocation
//! counter, which must read zero once every owner is gone.

use std::ffi::{CStr, CString};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::prelude::VkResult;
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use oberon_core::{Error, Result};
use oberon_render::SampleCount;
use portable_atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::loader::DeviceDispatch;
use crate::physical::{format_uuid, missing_core_feature, PhysicalGraphicsDevice};
use crate::pipeline_cache::{
    create_or_load_pipeline_cache, pipeline_cache_path, save_pipeline_cache,
};
use crate::result::VkResultExt;

#[derive(Clone, Debug, Default)]
pub struct DeviceInfo {
    pub requested_extensions: Vec<CString>,
    /// Directory for the pipeline cache blob. `None` keeps it in memory only.
    pub pipeline_cache_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryHint {
    /// Host-visible and persistently mapped.
    HostVisible,
    DeviceLocal,
}

impl MemoryHint {
    fn location(self) -> MemoryLocation {
        match self {
            MemoryHint::HostVisible => MemoryLocation::CpuToGpu,
            MemoryHint::DeviceLocal => MemoryLocation::GpuOnly,
        }
    }
}

struct BufferAllocation {
    buffer: vk::Buffer,
    allocation: Allocation,
    size: vk::DeviceSize,
}

pub struct ImageAllocation {
    image: vk::Image,
    allocation: Allocation,
}

impl ImageAllocation {
    pub fn image(&self) -> vk::Image {
        self.image
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn out_of_memory(what: &str, e: impl std::fmt::Display) -> Error {
    warn!("{what} allocation failed: {e}");
    Error::GpuCommandFailed {
        call: "allocate",
        result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.as_raw(),
    }
}

/// Core 1.3 commands every frame records. Drivers that advertise the
/// features but fail to export these are rejected at creation.
const REQUIRED_DEVICE_COMMANDS: [&CStr; 4] = [
    c"vkCmdBeginRendering",
    c"vkCmdEndRendering",
    c"vkQueueSubmit2",
    c"vkCmdPipelineBarrier2",
];

/// First required command that `resolve` cannot find.
fn missing_device_command(
    resolve: impl Fn(&CStr) -> vk::PFN_vkVoidFunction,
) -> Option<&'static CStr> {
    REQUIRED_DEVICE_COMMANDS
        .into_iter()
        .find(|name| resolve(name).is_none())
}

/// First candidate whose tiling features contain all of `features`.
pub fn first_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    props: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&f| {
            let p = props(f);
            let have = if tiling == vk::ImageTiling::LINEAR {
                p.linear_tiling_features
            } else {
                p.optimal_tiling_features
            };
            have.contains(features)
        })
        .ok_or(Error::UnsupportedFormat)
}

/// Highest supported count not above `requested`.
pub fn clamp_sample_count(requested: SampleCount, supported: vk::SampleCountFlags) -> SampleCount {
    SampleCount::ALL
        .into_iter()
        .rev()
        .filter(|s| *s <= requested)
        .find(|s| supported.contains(sample_flags(*s)))
        .unwrap_or(SampleCount::X1)
}

pub fn sample_flags(s: SampleCount) -> vk::SampleCountFlags {
    vk::SampleCountFlags::from_raw(s.count())
}

/// Atom-aligned flush window inside an allocation, in memory-object offsets.
pub fn flush_range(
    alloc_offset: vk::DeviceSize,
    alloc_size: vk::DeviceSize,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    atom: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let atom = atom.max(1);
    let start = (alloc_offset + offset) / atom * atom;
    let end = (alloc_offset + offset + size)
        .div_ceil(atom)
        .saturating_mul(atom)
        .min(alloc_offset + alloc_size);
    (start, end - start)
}

pub struct GraphicsDevice {
    physical: PhysicalGraphicsDevice,
    dispatch: DeviceDispatch,
    queue: Mutex<vk::Queue>,
    allocator: Option<Mutex<Allocator>>,
    buffers: Mutex<Vec<Option<BufferAllocation>>>,
    live_allocations: AtomicUsize,
    pipeline_cache: vk::PipelineCache,
    pipeline_cache_path: Option<PathBuf>,
    extensions: Vec<CString>,
}

impl GraphicsDevice {
    pub fn new(physical: PhysicalGraphicsDevice, info: &DeviceInfo) -> Result<Arc<Self>> {
        let instance = physical.context().instance();
        let queue_family = physical.queue_family();

        let extensions = physical
            .vendor()
            .select_extensions(physical.extensions(), &info.requested_extensions)?;
        let ext_ptrs: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();

        let priorities = [1.0_f32];
        let qinfo = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };

        // STRICT ORDER (feature pNext chain): feats2 -> feats11 -> feats12 -> feats13.
        // Everything the device reports is enabled as-is.
        let mut feats13 = vk::PhysicalDeviceVulkan13Features {
            s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
            ..Default::default()
        };
        let mut feats12 = vk::PhysicalDeviceVulkan12Features {
            s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES,
            p_next: (&mut feats13) as *mut _ as *mut _,
            ..Default::default()
        };
        let mut feats11 = vk::PhysicalDeviceVulkan11Features {
            s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_1_FEATURES,
            p_next: (&mut feats12) as *mut _ as *mut _,
            ..Default::default()
        };
        let mut feats2 = vk::PhysicalDeviceFeatures2 {
            s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
            p_next: (&mut feats11) as *mut _ as *mut _,
            ..Default::default()
        };
        unsafe { instance.get_physical_device_features2(physical.handle(), &mut feats2) };
        if let Some(feature) = missing_core_feature(&feats13) {
            return Err(Error::init(format!("{feature} is required")));
        }

        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            p_next: (&mut feats2) as *mut _ as *const _,
            queue_create_info_count: 1,
            p_queue_create_infos: &qinfo,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };
        let dispatch = unsafe {
            physical
                .context()
                .dispatch()
                .load_device(physical.handle(), &dinfo)
        }?;
        let instance = physical.context().dispatch();
        if let Some(missing) = missing_device_command(|name| dispatch.proc_addr(instance, name)) {
            unsafe { dispatch.destroy() };
            return Err(Error::init(format!(
                "{missing:?} is not exported by the device"
            )));
        }
        let queue = unsafe { dispatch.device.get_device_queue(queue_family, 0) };

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: dispatch.device.clone(),
            physical_device: physical.handle(),
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(a) => a,
            Err(e) => {
                unsafe { dispatch.destroy() };
                return Err(Error::init(format!("memory allocator: {e}")));
            }
        };

        let cache_path = info
            .pipeline_cache_dir
            .as_deref()
            .map(|dir| pipeline_cache_path(dir, physical.properties()));
        let pipeline_cache = match cache_path.as_deref() {
            Some(path) => unsafe { create_or_load_pipeline_cache(&dispatch.device, path) },
            None => {
                let ci = vk::PipelineCacheCreateInfo {
                    s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
                    ..Default::default()
                };
                unsafe { dispatch.device.create_pipeline_cache(&ci, None) }
                    .vk_context("vkCreatePipelineCache")
            }
        };
        let pipeline_cache = match pipeline_cache {
            Ok(c) => c,
            Err(e) => {
                drop(allocator);
                unsafe { dispatch.destroy() };
                return Err(e);
            }
        };

        info!(
            "GPU: {} ({:?}, {} {}, uuid {}), queue family {}, {} device extensions",
            physical.name(),
            physical.device_type(),
            physical.driver_name(),
            physical.driver_info(),
            format_uuid(physical.uuid()),
            queue_family,
            extensions.len()
        );

        Ok(Arc::new(Self {
            physical,
            dispatch,
            queue: Mutex::new(queue),
            allocator: Some(Mutex::new(allocator)),
            buffers: Mutex::new(Vec::new()),
            live_allocations: AtomicUsize::new(0),
            pipeline_cache,
            pipeline_cache_path: cache_path,
            extensions,
        }))
    }

    pub fn physical(&self) -> &PhysicalGraphicsDevice {
        &self.physical
    }

    pub fn raw(&self) -> &ash::Device {
        &self.dispatch.device
    }

    pub fn dispatch(&self) -> &DeviceDispatch {
        &self.dispatch
    }

    pub fn queue_family(&self) -> u32 {
        self.physical.queue_family()
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn extensions(&self) -> &[CString] {
        &self.extensions
    }

    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Acquire)
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let Some(allocator) = self.allocator.as_ref() else {
            return Err(Error::assertion("allocator used after teardown"));
        };
        let allocation = lock(allocator)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| out_of_memory(name, e))?;
        self.live_allocations.fetch_add(1, Ordering::AcqRel);
        Ok(allocation)
    }

    fn free(&self, allocation: Allocation) {
        if let Some(allocator) = self.allocator.as_ref() {
            if let Err(e) = lock(allocator).free(allocation) {
                warn!("failed to free GPU allocation: {e}");
            }
            self.live_allocations.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        hint: MemoryHint,
        name: &str,
    ) -> Result<BufferHandle> {
        if size == 0 {
            return Err(Error::invalid(format!("{name}: zero-sized buffer")));
        }
        let ci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let device = self.raw();
        let buffer = unsafe { device.create_buffer(&ci, None) }.vk_context("vkCreateBuffer")?;

        let mut reqs = unsafe { device.get_buffer_memory_requirements(buffer) };
        if hint == MemoryHint::HostVisible {
            // Flush ranges round to the atom; keep them inside this allocation.
            let atom = self.physical.limits().non_coherent_atom_size.max(1);
            reqs.alignment = reqs.alignment.max(atom);
            reqs.size = reqs.size.div_ceil(atom) * atom;
        }

        let allocation = match self.allocate(name, reqs, hint.location(), true) {
            Ok(a) => a,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        if let Err(e) =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
        {
            self.free(allocation);
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(crate::result::map_vk("vkBindBufferMemory", e));
        }

        let entry = BufferAllocation {
            buffer,
            allocation,
            size,
        };
        let mut slots = lock(&self.buffers);
        let index = match slots.iter().position(Option::is_none) {
            Some(i) => {
                slots[i] = Some(entry);
                i
            }
            None => {
                slots.push(Some(entry));
                slots.len() - 1
            }
        };
        debug!("buffer {name}: {size} bytes, {hint:?}, slot {index}");
        Ok(BufferHandle(index))
    }

    pub fn buffer(&self, handle: BufferHandle) -> Result<vk::Buffer> {
        lock(&self.buffers)
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|b| b.buffer)
            .ok_or_else(|| Error::invalid(format!("stale buffer handle {handle:?}")))
    }

    /// Copies `bytes` into a host-visible buffer at `offset` and flushes.
    pub fn write_buffer(
        &self,
        handle: BufferHandle,
        offset: vk::DeviceSize,
        bytes: &[u8],
    ) -> Result<()> {
        {
            let mut slots = lock(&self.buffers);
            let entry = slots
                .get_mut(handle.0)
                .and_then(Option::as_mut)
                .ok_or_else(|| Error::invalid(format!("stale buffer handle {handle:?}")))?;
            let end = offset + bytes.len() as vk::DeviceSize;
            if end > entry.size {
                return Err(Error::invalid(format!(
                    "write of {} bytes at {offset} overruns {}-byte buffer",
                    bytes.len(),
                    entry.size
                )));
            }
            let mapped = entry
                .allocation
                .mapped_slice_mut()
                .ok_or_else(|| Error::invalid("buffer is not host-visible"))?;
            mapped[offset as usize..end as usize].copy_from_slice(bytes);
        }
        self.flush_buffer(handle, offset, bytes.len() as vk::DeviceSize)
    }

    /// No-op for coherent memory.
    pub fn flush_buffer(
        &self,
        handle: BufferHandle,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let slots = lock(&self.buffers);
        let entry = slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::invalid(format!("stale buffer handle {handle:?}")))?;
        let a = &entry.allocation;
        if a.mapped_ptr().is_none() {
            return Err(Error::invalid("buffer is not host-visible"));
        }
        if a.memory_properties().contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            return Ok(());
        }
        let atom = self.physical.limits().non_coherent_atom_size;
        let (start, len) = flush_range(a.offset(), a.size(), offset, size, atom);
        let range = vk::MappedMemoryRange {
            s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
            memory: unsafe { a.memory() },
            offset: start,
            size: len,
            ..Default::default()
        };
        unsafe { self.raw().flush_mapped_memory_ranges(std::slice::from_ref(&range)) }
            .vk_context("vkFlushMappedMemoryRanges")
    }

    /// Callers guarantee the GPU no longer uses the buffer.
    pub fn destroy_buffer(&self, handle: BufferHandle) {
        let entry = lock(&self.buffers).get_mut(handle.0).and_then(Option::take);
        match entry {
            Some(b) => {
                unsafe { self.raw().destroy_buffer(b.buffer, None) };
                self.free(b.allocation);
            }
            None => warn!("destroy of stale buffer handle {handle:?}"),
        }
    }

    pub fn create_image(&self, ci: &vk::ImageCreateInfo, name: &str) -> Result<ImageAllocation> {
        let device = self.raw();
        let image = unsafe { device.create_image(ci, None) }.vk_context("vkCreateImage")?;
        let reqs = unsafe { device.get_image_memory_requirements(image) };
        let linear = ci.tiling == vk::ImageTiling::LINEAR;
        let allocation = match self.allocate(name, reqs, MemoryLocation::GpuOnly, linear) {
            Ok(a) => a,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };
        if let Err(e) =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            self.free(allocation);
            unsafe { device.destroy_image(image, None) };
            return Err(crate::result::map_vk("vkBindImageMemory", e));
        }
        Ok(ImageAllocation { image, allocation })
    }

    /// Callers guarantee the GPU no longer uses the image or its views.
    pub fn destroy_image(&self, image: ImageAllocation) {
        unsafe { self.raw().destroy_image(image.image, None) };
        self.free(image.allocation);
    }

    pub fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let ci = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.raw().create_image_view(&ci, None) }.vk_context("vkCreateImageView")
    }

    pub fn select_image_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        first_supported_format(candidates, tiling, features, |f| {
            self.physical.format_properties(f)
        })
    }

    pub fn clamp_samples(&self, requested: SampleCount) -> SampleCount {
        clamp_sample_count(requested, self.physical.attachment_sample_counts())
    }

    pub fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.raw().create_semaphore(&ci, None) }.vk_context("vkCreateSemaphore")
    }

    pub fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.raw().create_fence(&ci, None) }.vk_context("vkCreateFence")
    }

    pub fn submit(&self, submits: &[vk::SubmitInfo2], fence: vk::Fence) -> Result<()> {
        let queue = lock(&self.queue);
        unsafe { self.raw().queue_submit2(*queue, submits, fence) }.vk_context("vkQueueSubmit2")
    }

    /// Raw result; callers fold suboptimal and out-of-date into their own state.
    pub fn present(&self, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        let queue = lock(&self.queue);
        unsafe { self.dispatch.swapchain.queue_present(*queue, info) }
    }

    pub fn wait_idle(&self) -> Result<()> {
        let _queue = lock(&self.queue);
        unsafe { self.raw().device_wait_idle() }.vk_context("vkDeviceWaitIdle")
    }
}

// STRICT TEARDOWN ORDER:
// - Idle
// - Pipeline cache (saved first)
// - Leftover buffers, then the allocator
// - Device
impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            warn!("device teardown: wait idle failed: {e}");
        }
        unsafe {
            if let Some(path) = &self.pipeline_cache_path {
                save_pipeline_cache(self.raw(), self.pipeline_cache, path);
            }
            self.raw().destroy_pipeline_cache(self.pipeline_cache, None);
        }

        let leftovers: Vec<_> = lock(&self.buffers).drain(..).flatten().collect();
        if !leftovers.is_empty() {
            warn!("device teardown: {} buffer(s) still alive", leftovers.len());
        }
        for b in leftovers {
            unsafe { self.raw().destroy_buffer(b.buffer, None) };
            self.free(b.allocation);
        }
        let live = self.live_allocations();
        if live != 0 {
            warn!("device teardown: {live} allocation(s) leaked");
        }

        self.allocator = None;
        unsafe { self.dispatch.destroy() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(
        optimal: vk::FormatFeatureFlags,
        linear: vk::FormatFeatureFlags,
    ) -> vk::FormatProperties {
        vk::FormatProperties {
            linear_tiling_features: linear,
            optimal_tiling_features: optimal,
            buffer_features: vk::FormatFeatureFlags::empty(),
        }
    }

    #[test]
    fn format_selection_takes_first_match() {
        let want = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        let got = first_supported_format(
            &[
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
                vk::Format::D16_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            want,
            |f| {
                if f == vk::Format::D32_SFLOAT_S8_UINT {
                    props(vk::FormatFeatureFlags::empty(), want)
                } else {
                    props(want, vk::FormatFeatureFlags::empty())
                }
            },
        )
        .unwrap();
        assert_eq!(got, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn format_selection_needs_every_feature() {
        let have = vk::FormatFeatureFlags::COLOR_ATTACHMENT | vk::FormatFeatureFlags::TRANSFER_SRC;
        let err = first_supported_format(
            &[vk::Format::B8G8R8A8_SRGB],
            vk::ImageTiling::OPTIMAL,
            have | vk::FormatFeatureFlags::BLIT_SRC,
            |_| props(have, have),
        );
        assert!(matches!(err, Err(Error::UnsupportedFormat)));
    }

    #[test]
    fn device_commands_must_all_resolve() {
        unsafe extern "system" fn stub() {}
        let found: vk::PFN_vkVoidFunction = Some(stub as unsafe extern "system" fn());
        assert_eq!(missing_device_command(|_| found), None);
        assert_eq!(
            missing_device_command(|name| if name == c"vkQueueSubmit2" { None } else { found }),
            Some(c"vkQueueSubmit2")
        );
        assert_eq!(missing_device_command(|_| None), Some(c"vkCmdBeginRendering"));
    }

    #[test]
    fn sample_clamp() {
        let s = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_8;
        assert_eq!(clamp_sample_count(SampleCount::X4, s), SampleCount::X2);
        assert_eq!(clamp_sample_count(SampleCount::X64, s), SampleCount::X8);
        assert_eq!(clamp_sample_count(SampleCount::X8, s), SampleCount::X8);
        assert_eq!(
            clamp_sample_count(SampleCount::X4, vk::SampleCountFlags::empty()),
            SampleCount::X1
        );
        assert_eq!(sample_flags(SampleCount::X4), vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn flush_ranges_are_atom_aligned_and_bounded() {
        assert_eq!(flush_range(256, 512, 10, 20, 64), (256, 64));
        assert_eq!(flush_range(256, 512, 60, 10, 64), (256, 128));
        // never past the allocation
        assert_eq!(flush_range(0, 100, 90, 10, 64), (64, 36));
        assert_eq!(flush_range(0, 128, 0, 128, 0), (0, 128));
    }
}
