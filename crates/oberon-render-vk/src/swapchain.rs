// SPDX-License-Identifier: CEPL-1.0
//! Swapchain configuration policy. Pure functions over surface queries.

use ash::vk;
use oberon_core::Extent2d;
use oberon_render::PresentationMode;

pub const DEFAULT_IMAGE_COUNT: u32 = 3;

pub fn present_mode_to_vk(m: PresentationMode) -> vk::PresentModeKHR {
    match m {
        PresentationMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentationMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentationMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentationMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        PresentationMode::SharedDemandRefresh => vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
        PresentationMode::SharedContinuousRefresh => {
            vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH
        }
    }
}

/// Modes a swapchain on this device can use. The shared-image modes need
/// `VK_KHR_shared_presentable_image`, which is never enabled, so a surface
/// advertising them does not make them available.
pub fn present_mode_from_vk(m: vk::PresentModeKHR) -> Option<PresentationMode> {
    Some(match m {
        vk::PresentModeKHR::IMMEDIATE => PresentationMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentationMode::Mailbox,
        vk::PresentModeKHR::FIFO => PresentationMode::Fifo,
        vk::PresentModeKHR::FIFO_RELAXED => PresentationMode::FifoRelaxed,
        _ => return None,
    })
}

/// The requested mode when the surface offers it, else FIFO (always present).
pub fn choose_present_mode(
    available: &[PresentationMode],
    requested: PresentationMode,
) -> PresentationMode {
    if available.contains(&requested) {
        requested
    } else {
        PresentationMode::Fifo
    }
}

/// Requested and in-effect presentation mode of one swapchain.
#[derive(Clone, Debug)]
pub struct PresentModes {
    available: Vec<PresentationMode>,
    requested: PresentationMode,
    current: PresentationMode,
}

impl PresentModes {
    pub fn new(available: Vec<PresentationMode>) -> Self {
        Self {
            available,
            requested: PresentationMode::Fifo,
            current: PresentationMode::Fifo,
        }
    }

    pub fn available(&self) -> &[PresentationMode] {
        &self.available
    }

    /// True when the swapchain has to be rebuilt for `mode` to take effect.
    pub fn request(&mut self, mode: PresentationMode) -> bool {
        self.requested = mode;
        mode != self.current
    }

    pub fn requested(&self) -> PresentationMode {
        self.requested
    }

    pub fn current(&self) -> PresentationMode {
        self.current
    }

    /// Mode for the next swapchain.
    pub fn resolve(&self) -> PresentationMode {
        choose_present_mode(&self.available, self.requested)
    }

    /// Records the mode a rebuilt swapchain was created with.
    pub fn applied(&mut self, mode: PresentationMode) {
        self.current = mode;
    }
}

/// sRGB 8-bit BGRA or RGBA with the non-linear color space, else whatever the
/// driver lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB]
        .into_iter()
        .find_map(|want| {
            formats.iter().copied().find(|f| {
                f.format == want && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

/// Zero asks for the minimum. A maximum of zero means unbounded.
pub fn clamp_image_count(requested: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if requested == 0 {
        return caps.min_image_count;
    }
    let n = requested.max(caps.min_image_count);
    if caps.max_image_count == 0 {
        n
    } else {
        n.min(caps.max_image_count)
    }
}

/// The surface's extent, or `want` clamped to its bounds when the surface
/// leaves the size to the window. An empty `want` (minimized window) stays
/// empty instead of being raised to the minimum extent.
pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: Extent2d) -> Extent2d {
    if caps.current_extent.width != u32::MAX {
        Extent2d::new(caps.current_extent.width, caps.current_extent.height)
    } else if want.is_empty() {
        Extent2d::default()
    } else {
        Extent2d::new(
            want.width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            want.height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        )
    }
}

pub fn pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub fn composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|a| caps.supported_composite_alpha.contains(*a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn image_count_clamp() {
        assert_eq!(clamp_image_count(3, &caps(2, 8)), 3);
        assert_eq!(clamp_image_count(3, &caps(4, 8)), 4);
        assert_eq!(clamp_image_count(3, &caps(1, 2)), 2);
        assert_eq!(clamp_image_count(16, &caps(2, 0)), 16);
        assert_eq!(clamp_image_count(0, &caps(2, 8)), 2);
    }

    #[test]
    fn extent_follows_surface_unless_sentinel() {
        let mut c = caps(2, 3);
        assert_eq!(
            extent_from_caps(&c, Extent2d::new(8000, 5000)),
            Extent2d::new(4096, 2048)
        );
        assert!(extent_from_caps(&c, Extent2d::new(8000, 0)).is_empty());
        assert!(extent_from_caps(&c, Extent2d::default()).is_empty());
        c.current_extent = vk::Extent2D {
            width: 640,
            height: 360,
        };
        assert_eq!(
            extent_from_caps(&c, Extent2d::new(1280, 720)),
            Extent2d::new(640, 360)
        );
        c.current_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert!(extent_from_caps(&c, Extent2d::new(1280, 720)).is_empty());
    }

    #[test]
    fn unavailable_present_mode_falls_back_to_fifo() {
        let available = [PresentationMode::Fifo, PresentationMode::Immediate];
        assert_eq!(
            choose_present_mode(&available, PresentationMode::Immediate),
            PresentationMode::Immediate
        );
        assert_eq!(
            choose_present_mode(&available, PresentationMode::Mailbox),
            PresentationMode::Fifo
        );
    }

    #[test]
    fn present_mode_conversion_round_trips_usable_modes() {
        for m in [
            PresentationMode::Immediate,
            PresentationMode::Mailbox,
            PresentationMode::Fifo,
            PresentationMode::FifoRelaxed,
        ] {
            assert_eq!(present_mode_from_vk(present_mode_to_vk(m)), Some(m));
        }
        assert_eq!(present_mode_from_vk(vk::PresentModeKHR::from_raw(12345)), None);
    }

    #[test]
    fn shared_image_modes_are_never_available() {
        let advertised = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
            vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH,
        ];
        let available: Vec<_> = advertised
            .into_iter()
            .filter_map(present_mode_from_vk)
            .collect();
        assert_eq!(available, vec![PresentationMode::Fifo]);

        let mut modes = PresentModes::new(available);
        assert!(modes.request(PresentationMode::SharedDemandRefresh));
        assert_eq!(modes.resolve(), PresentationMode::Fifo);
    }

    #[test]
    fn requested_mode_takes_effect_after_rebuild() {
        let mut modes = PresentModes::new(vec![PresentationMode::Fifo, PresentationMode::Mailbox]);
        assert_eq!(modes.current(), PresentationMode::Fifo);
        assert!(!modes.request(PresentationMode::Fifo));

        assert!(modes.request(PresentationMode::Mailbox));
        assert_eq!(modes.current(), PresentationMode::Fifo);
        let chosen = modes.resolve();
        modes.applied(chosen);
        assert_eq!(modes.current(), PresentationMode::Mailbox);

        assert!(modes.request(PresentationMode::Immediate));
        let chosen = modes.resolve();
        modes.applied(chosen);
        assert_eq!(modes.current(), PresentationMode::Fifo);
        assert_eq!(modes.requested(), PresentationMode::Immediate);
    }

    #[test]
    fn surface_format_preference() {
        let f = |format, color_space| vk::SurfaceFormatKHR {
            format,
            color_space,
        };
        let list = [
            f(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            f(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            f(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            choose_surface_format(&list).map(|s| s.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
        assert_eq!(
            choose_surface_format(&list[..2]).map(|s| s.format),
            Some(vk::Format::R8G8B8A8_SRGB)
        );
        assert_eq!(
            choose_surface_format(&list[..1]).map(|s| s.format),
            Some(vk::Format::A2B10G10R10_UNORM_PACK32)
        );
        assert_eq!(choose_surface_format(&[]), None);
    }
}
