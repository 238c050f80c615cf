// SPDX-License-Identifier: CEPL-1.0
//! A winit window bound to a Vulkan surface and swapchain.
//!
//! The swapchain is rebuilt lazily: anything that invalidates it (resize,
//! configure mismatch, present-mode or display-style change, suboptimal or
//! out-of-date results) only sets the dirty bit in the window's event core.
//! The renderer calls [`RenderWindow::rebuild_swapchain`] once every frame it
//! owns is idle.

use std::sync::Arc;

use ash::vk;
use oberon_core::{Error, Extent2d, Offset2d, Rect2d, Result};
use oberon_platform::winit::dpi::{PhysicalPosition, PhysicalSize};
use oberon_platform::winit::event::WindowEvent;
use oberon_platform::winit::window::{Window, WindowId};
use oberon_platform::winit_glue::{apply_display_style, translate, window_rect};
use oberon_platform::{DisplayStyle, Event, VisibilityFlags, WindowEventCore, WmRequest};
use oberon_render::PresentationMode;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, trace, warn};

use crate::camera::{Camera, CameraToken};
use crate::device::{GraphicsDevice, ImageAllocation};
use crate::result::{map_vk, VkResultExt};
use crate::swapchain::{
    choose_surface_format, clamp_image_count, composite_alpha, extent_from_caps,
    pre_transform, present_mode_from_vk, present_mode_to_vk, PresentModes, DEFAULT_IMAGE_COUNT,
};

pub const DEPTH_STENCIL_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
];

const DEPTH_STENCIL_ASPECT: vk::ImageAspectFlags = vk::ImageAspectFlags::from_raw(
    vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw(),
);

pub struct RenderWindow {
    device: Arc<GraphicsDevice>,
    window: Arc<Window>,
    events: WindowEventCore,
    title: String,
    display_style: DisplayStyle,

    surface: vk::SurfaceKHR,
    surface_format: vk::SurfaceFormatKHR,
    depth_stencil_format: vk::Format,
    modes: PresentModes,
    requested_image_count: u32,

    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth_stencil: Vec<(ImageAllocation, vk::ImageView)>,
    extent: Extent2d,

    camera: Option<CameraToken>,
}

impl RenderWindow {
    pub fn new(device: &Arc<GraphicsDevice>, window: Arc<Window>) -> Result<Self> {
        let physical = device.physical();
        let context = physical.context();
        let display = window
            .display_handle()
            .map_err(|e| Error::init(format!("display handle: {e}")))?
            .as_raw();
        let raw_window = window
            .window_handle()
            .map_err(|e| Error::init(format!("window handle: {e}")))?
            .as_raw();
        let surface = unsafe {
            ash_window::create_surface(
                context.loader().entry(),
                context.instance(),
                display,
                raw_window,
                None,
            )
        }
        .vk_context("vkCreateSurfaceKHR")?;

        let surface_d = &context.dispatch().surface;
        let destroy_surface = |e: Error| {
            unsafe { surface_d.destroy_surface(surface, None) };
            e
        };

        let supported = unsafe {
            surface_d.get_physical_device_surface_support(
                physical.handle(),
                device.queue_family(),
                surface,
            )
        }
        .vk_context("vkGetPhysicalDeviceSurfaceSupportKHR")
        .map_err(destroy_surface)?;
        if !supported {
            return Err(destroy_surface(Error::SurfaceIncompatible {
                queue_family: device.queue_family(),
            }));
        }

        let formats = unsafe {
            surface_d.get_physical_device_surface_formats(physical.handle(), surface)
        }
        .vk_context("vkGetPhysicalDeviceSurfaceFormatsKHR")
        .map_err(destroy_surface)?;
        let surface_format = choose_surface_format(&formats)
            .ok_or(Error::UnsupportedFormat)
            .map_err(destroy_surface)?;

        let present_modes: Vec<PresentationMode> = unsafe {
            surface_d.get_physical_device_surface_present_modes(physical.handle(), surface)
        }
        .vk_context("vkGetPhysicalDeviceSurfacePresentModesKHR")
        .map_err(destroy_surface)?
        .into_iter()
        .filter_map(present_mode_from_vk)
        .collect();

        let depth_stencil_format = device
            .select_image_format(
                &DEPTH_STENCIL_CANDIDATES,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .map_err(destroy_surface)?;

        info!(
            "surface: format={:?} color_space={:?} depth_stencil={:?} modes={:?}",
            surface_format.format, surface_format.color_space, depth_stencil_format, present_modes
        );

        let mut out = Self {
            device: Arc::clone(device),
            title: window.title(),
            events: WindowEventCore::new(window_rect(&window)),
            window,
            display_style: DisplayStyle::Windowed,
            surface,
            surface_format,
            depth_stencil_format,
            modes: PresentModes::new(present_modes),
            requested_image_count: DEFAULT_IMAGE_COUNT,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            depth_stencil: Vec::new(),
            extent: Extent2d::default(),
            camera: None,
        };
        if out.window.is_visible().unwrap_or(true) {
            out.events.set_visibility(VisibilityFlags::MAPPED);
        }
        // Drop owns the surface from here on.
        out.rebuild_swapchain()?;
        Ok(out)
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn events(&self) -> &WindowEventCore {
        &self.events
    }

    // ---- events ----

    /// Queues a winit event for this window. State changes when the event is
    /// drained with [`Self::poll_events`].
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if let Some(ev) = translate(event, self.events.rect()) {
            self.events.push(ev);
        }
    }

    pub fn poll_events(&mut self) -> Event {
        let ev = self.events.poll_events();
        for req in self.events.take_wm_requests() {
            match req {
                WmRequest::PingReply { target, timestamp } => {
                    trace!("ping reply to {target:?} at {timestamp}, answered by winit");
                }
            }
        }
        ev
    }

    // ---- window manager ----

    pub fn show(&mut self) {
        self.window.set_visible(true);
        self.events.set_visibility(VisibilityFlags::MAPPED);
    }

    pub fn hide(&mut self) {
        self.window.set_visible(false);
        self.events.set_visibility(VisibilityFlags::empty());
    }

    pub fn is_shown(&self) -> bool {
        self.events.is_shown()
    }

    pub fn is_minimized(&self) -> bool {
        self.events.is_minimized() || self.window.is_minimized().unwrap_or(false)
    }

    pub fn change_display_style(&mut self, style: DisplayStyle) {
        if style == self.display_style {
            return;
        }
        apply_display_style(&self.window, style);
        self.display_style = style;
        self.events.mark_swapchain_dirty();
        debug!("display style -> {style:?}");
    }

    pub fn current_display_style(&self) -> DisplayStyle {
        self.display_style
    }

    /// Asks for a new client size. The swapchain follows on the next configure.
    pub fn resize(&mut self, extent: Extent2d) {
        if let Some(now) = self
            .window
            .request_inner_size(PhysicalSize::new(extent.width, extent.height))
        {
            self.events.push(Event::GeometryReconfigure {
                rect: Rect2d::new(self.events.rect().offset, Extent2d::new(now.width, now.height)),
            });
        }
    }

    pub fn move_to(&mut self, offset: Offset2d) {
        self.window
            .set_outer_position(PhysicalPosition::new(offset.x, offset.y));
    }

    /// Client area at the origin. Follows configure events as they are
    /// drained, ahead of the swapchain rebuild.
    pub fn current_drawable_rect(&self) -> Rect2d {
        self.events.drawable_rect()
    }

    pub fn current_rect(&self) -> Rect2d {
        self.events.rect()
    }

    pub fn change_title(&mut self, title: &str) {
        self.window.set_title(title);
        self.title = title.to_owned();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    // ---- presentation ----

    pub fn available_presentation_modes(&self) -> &[PresentationMode] {
        self.modes.available()
    }

    pub fn request_presentation_mode(&mut self, mode: PresentationMode) {
        if self.modes.request(mode) {
            self.events.mark_swapchain_dirty();
        }
    }

    pub fn current_presentation_mode(&self) -> PresentationMode {
        self.modes.current()
    }

    /// Takes effect on the next rebuild.
    pub fn request_image_count(&mut self, count: u32) {
        self.requested_image_count = count;
        self.events.mark_swapchain_dirty();
    }

    pub fn surface_format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn depth_stencil_format(&self) -> vk::Format {
        self.depth_stencil_format
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: u32) -> Option<vk::Image> {
        self.images.get(index as usize).copied()
    }

    pub fn image_view(&self, index: u32) -> Option<vk::ImageView> {
        self.views.get(index as usize).copied()
    }

    pub fn depth_stencil_view(&self, index: u32) -> Option<vk::ImageView> {
        self.depth_stencil.get(index as usize).map(|(_, v)| *v)
    }

    /// Forces a rebuild before the next frame.
    pub fn invalidate_swapchain(&mut self) {
        self.events.mark_swapchain_dirty();
    }

    pub fn needs_rebuild(&self) -> bool {
        self.events.is_swapchain_dirty() || self.swapchain == vk::SwapchainKHR::null()
    }

    pub fn is_drawable(&self) -> bool {
        self.swapchain != vk::SwapchainKHR::null()
            && !self.extent.is_empty()
            && !self.is_minimized()
    }

    fn destroy_image_resources(&mut self) {
        let device = self.device.raw();
        for (image, view) in self.depth_stencil.drain(..) {
            unsafe { device.destroy_image_view(view, None) };
            self.device.destroy_image(image);
        }
        for view in self.views.drain(..) {
            unsafe { device.destroy_image_view(view, None) };
        }
        self.images.clear();
    }

    fn create_image_resources(&mut self) -> Result<()> {
        let images = unsafe {
            self.device
                .dispatch()
                .swapchain
                .get_swapchain_images(self.swapchain)
        }
        .vk_context("vkGetSwapchainImagesKHR")?;
        self.images = images;
        for i in 0..self.images.len() {
            let view = self.device.create_image_view(
                self.images[i],
                self.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            self.views.push(view);

            let ci = vk::ImageCreateInfo {
                s_type: vk::StructureType::IMAGE_CREATE_INFO,
                image_type: vk::ImageType::TYPE_2D,
                format: self.depth_stencil_format,
                extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            };
            let image = self.device.create_image(&ci, "swapchain depth-stencil")?;
            match self.device.create_image_view(
                image.image(),
                self.depth_stencil_format,
                DEPTH_STENCIL_ASPECT,
            ) {
                Ok(v) => self.depth_stencil.push((image, v)),
                Err(e) => {
                    self.device.destroy_image(image);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Rebuilds the swapchain for the current surface size. Returns `false`
    /// and keeps the old swapchain when the surface has zero area.
    ///
    /// Callers must ensure no submitted work still references the swapchain
    /// images.
    pub fn rebuild_swapchain(&mut self) -> Result<bool> {
        let physical = self.device.physical();
        let surface_d = &physical.context().dispatch().surface;
        let caps = unsafe {
            surface_d.get_physical_device_surface_capabilities(physical.handle(), self.surface)
        }
        .vk_context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let want = oberon_platform::winit_glue::extent_of(self.window.inner_size());
        let extent = extent_from_caps(&caps, want);
        if extent.is_empty() {
            debug!("surface has zero area, swapchain rebuild deferred");
            self.extent = Extent2d::default();
            return Ok(false);
        }

        self.device.wait_idle()?;
        self.destroy_image_resources();

        let mode = self.modes.resolve();
        if mode != self.modes.requested() {
            warn!(
                "present mode {:?} unavailable, using {mode:?}",
                self.modes.requested()
            );
        }
        let image_count = clamp_image_count(self.requested_image_count, &caps);

        let old = self.swapchain;
        let ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.surface,
            min_image_count: image_count,
            image_format: self.surface_format.format,
            image_color_space: self.surface_format.color_space,
            image_extent: vk::Extent2D {
                width: extent.width,
                height: extent.height,
            },
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::TRANSFER_SRC,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: pre_transform(&caps),
            composite_alpha: composite_alpha(&caps),
            present_mode: present_mode_to_vk(mode),
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        let swapchain_d = &self.device.dispatch().swapchain;
        let created = unsafe { swapchain_d.create_swapchain(&ci, None) };
        if old != vk::SwapchainKHR::null() {
            unsafe { swapchain_d.destroy_swapchain(old, None) };
        }
        // The old handle is gone even when creation failed.
        self.swapchain = vk::SwapchainKHR::null();
        self.swapchain = created.vk_context("vkCreateSwapchainKHR")?;
        self.extent = extent;
        self.modes.applied(mode);
        self.create_image_resources()?;
        self.events.swapchain_rebuilt(extent);

        info!(
            "swapchain: {}x{} images={} mode={mode:?}",
            extent.width,
            extent.height,
            self.images.len()
        );
        Ok(true)
    }

    /// `None` when the swapchain is out of date; the dirty bit is set and the
    /// semaphore stays unsignaled.
    pub fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> Result<Option<u32>> {
        let r = unsafe {
            self.device.dispatch().swapchain.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match r {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.events.mark_swapchain_dirty();
                }
                Ok(Some(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.events.mark_swapchain_dirty();
                Ok(None)
            }
            Err(e) => Err(map_vk("vkAcquireNextImageKHR", e)),
        }
    }

    pub fn present_image(&mut self, index: u32, wait: vk::Semaphore) -> Result<()> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &self.swapchain,
            p_image_indices: &index,
            ..Default::default()
        };
        match self.device.present(&info) {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.events.mark_swapchain_dirty();
                Ok(())
            }
            Err(e) => Err(map_vk("vkQueuePresentKHR", e)),
        }
    }

    // ---- camera ----

    pub fn bind_camera(&mut self, camera: &Camera) {
        self.camera = Some(camera.attach_window(self.id()));
    }

    pub fn unbind_camera(&mut self) {
        self.camera = None;
    }

    /// False once the bound camera is dropped.
    pub fn is_camera_bound(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraToken::is_bound)
    }
}

// STRICT TEARDOWN ORDER:
// - Idle
// - Depth-stencil images, swapchain views
// - Swapchain
// - Surface
impl Drop for RenderWindow {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("render window teardown: {e}");
        }
        self.camera = None;
        self.destroy_image_resources();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.device
                    .dispatch()
                    .swapchain
                    .destroy_swapchain(self.swapchain, None);
            }
            self.device
                .physical()
                .context()
                .dispatch()
                .surface
                .destroy_surface(self.surface, None);
        }
    }
}
