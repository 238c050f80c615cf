// SPDX-License-Identifier: CEPL-1.0
//! Physical device discovery, vendor queue policy and device extension policy.

use std::collections::BTreeSet;
use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use oberon_core::{Error, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::context::GraphicsContext;
use crate::result::VkResultExt;

pub const DEVICE_UUID_ENV: &str = "OBERON_DEVICE_UUID";
pub const RENDERDOC_UUID_ENV: &str = "RENDERDOC_DEVICE_UUID";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceVendor {
    Amd,
    Nvidia,
    Intel,
    Other(u32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

impl QueueFamilySupport {
    fn usable(self) -> bool {
        self.graphics && self.present
    }
}

impl DeviceVendor {
    pub fn from_id(vendor_id: u32) -> Self {
        match vendor_id {
            0x1002 => DeviceVendor::Amd,
            0x10de => DeviceVendor::Nvidia,
            0x8086 => DeviceVendor::Intel,
            other => DeviceVendor::Other(other),
        }
    }

    /// One family serves graphics, transfer and present.
    pub fn select_queue_family(self, families: &[QueueFamilySupport]) -> Option<u32> {
        let known = !matches!(self, DeviceVendor::Other(_));
        if known && families.first().is_some_and(|f| f.usable()) {
            return Some(0);
        }
        families.iter().rposition(|f| f.usable()).map(|i| i as u32)
    }

    pub fn select_extensions(
        self,
        available: &BTreeSet<CString>,
        requested: &[CString],
    ) -> Result<Vec<CString>> {
        let swapchain = ash::khr::swapchain::NAME;
        if !available.iter().any(|e| e.as_c_str() == swapchain) {
            return Err(Error::init(format!(
                "required device extension {} is not available",
                swapchain.to_string_lossy()
            )));
        }
        let has_khr_bda = available
            .iter()
            .any(|e| e.as_c_str() == ash::khr::buffer_device_address::NAME);

        let mut out = vec![swapchain.to_owned()];
        for r in requested {
            let name = r.as_c_str();
            if name == ash::amd::negative_viewport_height::NAME {
                debug!("{:?} is never enabled", r);
                continue;
            }
            if name == ash::ext::buffer_device_address::NAME && has_khr_bda {
                debug!("{:?} superseded by the KHR variant", r);
                continue;
            }
            if !available.contains(r) {
                debug!("device extension {:?} unavailable, skipped", r);
                continue;
            }
            if !out.contains(r) {
                out.push(r.clone());
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceFilter {
    #[default]
    Any,
    Uuid([u8; vk::UUID_SIZE]),
}

impl DeviceFilter {
    /// Configured UUID first, then the environment. Unparseable values are
    /// ignored.
    pub fn resolve(configured: Option<&str>) -> Self {
        let from_env = || {
            [DEVICE_UUID_ENV, RENDERDOC_UUID_ENV]
                .iter()
                .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
        };
        let text = configured
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
            .or_else(from_env);
        match text.as_deref().map(parse_uuid) {
            Some(Some(uuid)) => DeviceFilter::Uuid(uuid),
            Some(None) => {
                debug!("ignoring malformed device uuid {:?}", text);
                DeviceFilter::Any
            }
            None => DeviceFilter::Any,
        }
    }

    fn accepts(&self, uuid: &[u8; vk::UUID_SIZE]) -> bool {
        match self {
            DeviceFilter::Any => true,
            DeviceFilter::Uuid(want) => want == uuid,
        }
    }
}

/// 32 hex digits, hyphens anywhere.
pub fn parse_uuid(s: &str) -> Option<[u8; vk::UUID_SIZE]> {
    let digits: Vec<u8> = s
        .trim()
        .bytes()
        .filter(|&b| b != b'-')
        .map(|b| (b as char).to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;
    if digits.len() != vk::UUID_SIZE * 2 {
        return None;
    }
    let mut out = [0u8; vk::UUID_SIZE];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    Some(out)
}

pub fn format_uuid(uuid: &[u8; vk::UUID_SIZE]) -> String {
    let hex: String = uuid.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// First discrete GPU, else the first device.
pub fn preferred_index(types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    types
        .iter()
        .position(|t| *t == vk::PhysicalDeviceType::DISCRETE_GPU)
        .or_else(|| (!types.is_empty()).then_some(0))
}

pub struct PhysicalGraphicsDevice {
    context: Arc<GraphicsContext>,
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    device_uuid: [u8; vk::UUID_SIZE],
    driver_name: String,
    driver_info: String,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: Vec<vk::QueueFamilyProperties>,
    extensions: BTreeSet<CString>,
    features: vk::PhysicalDeviceFeatures,
    vendor: DeviceVendor,
    queue_family: u32,
}

/// First 1.3 feature every frame depends on that `feats` lacks.
pub(crate) fn missing_core_feature(
    feats: &vk::PhysicalDeviceVulkan13Features,
) -> Option<&'static str> {
    [
        (feats.dynamic_rendering, "dynamic rendering"),
        (feats.synchronization2, "synchronization2"),
    ]
    .into_iter()
    .find_map(|(enabled, name)| (enabled != vk::TRUE).then_some(name))
}

impl PhysicalGraphicsDevice {
    /// Devices able to render to `window`, in driver order.
    pub fn enumerate<W>(
        context: &Arc<GraphicsContext>,
        window: &W,
        filter: DeviceFilter,
    ) -> Result<Vec<Self>>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
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

        let out = Self::enumerate_for_surface(context, surface, filter);
        unsafe { context.dispatch().surface.destroy_surface(surface, None) };
        out
    }

    fn enumerate_for_surface(
        context: &Arc<GraphicsContext>,
        surface: vk::SurfaceKHR,
        filter: DeviceFilter,
    ) -> Result<Vec<Self>> {
        let instance = context.instance();
        let handles = unsafe { instance.enumerate_physical_devices() }
            .vk_context("vkEnumeratePhysicalDevices")?;

        let mut out = Vec::new();
        for handle in handles {
            let properties = unsafe { instance.get_physical_device_properties(handle) };
            let name = properties
                .device_name_as_c_str()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            // 1.1+ structs may only be chained on 1.3 devices.
            if properties.api_version < vk::API_VERSION_1_3 {
                debug!(
                    "{name}: API {}.{} below 1.3, skipped",
                    vk::api_version_major(properties.api_version),
                    vk::api_version_minor(properties.api_version)
                );
                continue;
            }

            let mut props11 = vk::PhysicalDeviceVulkan11Properties {
                s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_1_PROPERTIES,
                ..Default::default()
            };
            let mut props12 = vk::PhysicalDeviceVulkan12Properties {
                s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_PROPERTIES,
                ..Default::default()
            };
            props11.p_next = (&mut props12) as *mut _ as *mut _;
            let mut props2 = vk::PhysicalDeviceProperties2 {
                s_type: vk::StructureType::PHYSICAL_DEVICE_PROPERTIES_2,
                p_next: (&mut props11) as *mut _ as *mut _,
                ..Default::default()
            };
            unsafe { instance.get_physical_device_properties2(handle, &mut props2) };

            let mut feats13 = vk::PhysicalDeviceVulkan13Features {
                s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
                ..Default::default()
            };
            let mut feats2 = vk::PhysicalDeviceFeatures2 {
                s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
                p_next: (&mut feats13) as *mut _ as *mut _,
                ..Default::default()
            };
            unsafe { instance.get_physical_device_features2(handle, &mut feats2) };
            if let Some(feature) = missing_core_feature(&feats13) {
                debug!("{name}: no {feature}, skipped");
                continue;
            }

            let device_uuid = props11.device_uuid;
            if !filter.accepts(&device_uuid) {
                debug!("{name}: uuid {} filtered out", format_uuid(&device_uuid));
                continue;
            }

            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(handle) };
            let mut support = Vec::with_capacity(queue_families.len());
            for (i, qf) in queue_families.iter().enumerate() {
                let present = unsafe {
                    context.dispatch().surface.get_physical_device_surface_support(
                        handle,
                        i as u32,
                        surface,
                    )
                }
                .vk_context("vkGetPhysicalDeviceSurfaceSupportKHR")?;
                support.push(QueueFamilySupport {
                    graphics: qf.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                    present,
                });
            }
            let vendor = DeviceVendor::from_id(properties.vendor_id);
            let Some(queue_family) = vendor.select_queue_family(&support) else {
                debug!("{name}: no graphics+present queue family, skipped");
                continue;
            };

            let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }
                .vk_context("vkEnumerateDeviceExtensionProperties")?
                .iter()
                .filter_map(|e| e.extension_name_as_c_str().ok().map(|s| s.to_owned()))
                .collect();

            let driver_name = props12
                .driver_name_as_c_str()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let driver_info = props12
                .driver_info_as_c_str()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            out.push(Self {
                context: Arc::clone(context),
                handle,
                properties,
                device_uuid,
                driver_name,
                driver_info,
                memory_properties: unsafe {
                    instance.get_physical_device_memory_properties(handle)
                },
                queue_families,
                extensions,
                features: feats2.features,
                vendor,
                queue_family,
            });
        }

        info!("{} usable physical device(s)", out.len());
        Ok(out)
    }

    pub fn preferred(devices: &[Self]) -> Option<&Self> {
        let types: Vec<_> = devices.iter().map(|d| d.properties.device_type).collect();
        preferred_index(&types).map(|i| &devices[i])
    }

    pub fn into_preferred(mut devices: Vec<Self>) -> Option<Self> {
        let types: Vec<_> = devices.iter().map(|d| d.properties.device_type).collect();
        preferred_index(&types).map(|i| devices.swap_remove(i))
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    pub fn uuid(&self) -> &[u8; vk::UUID_SIZE] {
        &self.device_uuid
    }

    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    pub fn driver_info(&self) -> &str {
        &self.driver_info
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn extensions(&self) -> &BTreeSet<CString> {
        &self.extensions
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn vendor(&self) -> DeviceVendor {
        self.vendor
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Sample counts usable for both color and depth attachments.
    pub fn attachment_sample_counts(&self) -> vk::SampleCountFlags {
        self.properties.limits.framebuffer_color_sample_counts
            & self.properties.limits.framebuffer_depth_sample_counts
            & self.properties.limits.framebuffer_stencil_sample_counts
    }

    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.context
                .instance()
                .get_physical_device_format_properties(self.handle, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devices_need_both_core_features() {
        let feats = |dynamic_rendering, synchronization2| vk::PhysicalDeviceVulkan13Features {
            dynamic_rendering,
            synchronization2,
            ..Default::default()
        };
        assert_eq!(missing_core_feature(&feats(vk::TRUE, vk::TRUE)), None);
        assert_eq!(
            missing_core_feature(&feats(vk::TRUE, vk::FALSE)),
            Some("synchronization2")
        );
        assert_eq!(
            missing_core_feature(&feats(vk::FALSE, vk::TRUE)),
            Some("dynamic rendering")
        );
    }

    const GP: QueueFamilySupport = QueueFamilySupport {
        graphics: true,
        present: true,
    };
    const G: QueueFamilySupport = QueueFamilySupport {
        graphics: true,
        present: false,
    };
    const NONE: QueueFamilySupport = QueueFamilySupport {
        graphics: false,
        present: false,
    };

    #[test]
    fn vendor_ids() {
        assert_eq!(DeviceVendor::from_id(0x1002), DeviceVendor::Amd);
        assert_eq!(DeviceVendor::from_id(0x10de), DeviceVendor::Nvidia);
        assert_eq!(DeviceVendor::from_id(0x8086), DeviceVendor::Intel);
        assert_eq!(DeviceVendor::from_id(0x13b5), DeviceVendor::Other(0x13b5));
    }

    #[test]
    fn known_vendors_prefer_family_zero() {
        for v in [DeviceVendor::Amd, DeviceVendor::Nvidia, DeviceVendor::Intel] {
            assert_eq!(v.select_queue_family(&[GP, NONE, GP]), Some(0));
        }
    }

    #[test]
    fn fallback_is_last_usable_family() {
        assert_eq!(
            DeviceVendor::Other(1).select_queue_family(&[GP, GP, NONE]),
            Some(1)
        );
        assert_eq!(
            DeviceVendor::Nvidia.select_queue_family(&[G, GP, NONE, GP, G]),
            Some(3)
        );
        assert_eq!(DeviceVendor::Amd.select_queue_family(&[G, NONE]), None);
        assert_eq!(DeviceVendor::Intel.select_queue_family(&[]), None);
    }

    fn set(names: &[&std::ffi::CStr]) -> BTreeSet<CString> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn swapchain_extension_is_required() {
        let err = DeviceVendor::Amd
            .select_extensions(&BTreeSet::new(), &[])
            .unwrap_err();
        assert!(err.to_string().contains("VK_KHR_swapchain"));
    }

    #[test]
    fn extension_policy() {
        let available = set(&[
            ash::khr::swapchain::NAME,
            ash::amd::negative_viewport_height::NAME,
            ash::khr::buffer_device_address::NAME,
            ash::ext::buffer_device_address::NAME,
        ]);
        let requested = vec![
            ash::amd::negative_viewport_height::NAME.to_owned(),
            ash::ext::buffer_device_address::NAME.to_owned(),
            ash::khr::buffer_device_address::NAME.to_owned(),
            ash::ext::hdr_metadata::NAME.to_owned(),
        ];
        let got = DeviceVendor::Amd
            .select_extensions(&available, &requested)
            .unwrap();
        assert_eq!(
            got,
            vec![
                ash::khr::swapchain::NAME.to_owned(),
                ash::khr::buffer_device_address::NAME.to_owned()
            ]
        );
    }

    #[test]
    fn ext_buffer_device_address_kept_without_khr() {
        let available = set(&[
            ash::khr::swapchain::NAME,
            ash::ext::buffer_device_address::NAME,
        ]);
        let got = DeviceVendor::Other(0)
            .select_extensions(&available, &[ash::ext::buffer_device_address::NAME.to_owned()])
            .unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn uuid_parsing() {
        let bare = parse_uuid("00112233445566778899aabbccddeeff").unwrap();
        let dashed = parse_uuid("00112233-4455-6677-8899-AABBCCDDEEFF").unwrap();
        assert_eq!(bare, dashed);
        assert_eq!(bare[0], 0x00);
        assert_eq!(bare[15], 0xff);
        assert_eq!(format_uuid(&bare), "00112233-4455-6677-8899-aabbccddeeff");
        assert!(parse_uuid("0011").is_none());
        assert!(parse_uuid("zz112233445566778899aabbccddeeff").is_none());
    }

    #[test]
    fn configured_uuid_wins() {
        let f = DeviceFilter::resolve(Some("00112233445566778899aabbccddeeff"));
        assert!(matches!(f, DeviceFilter::Uuid(u) if u[1] == 0x11));
        assert!(f.accepts(&parse_uuid("00112233445566778899aabbccddeeff").unwrap()));
        assert!(!f.accepts(&[0; 16]));
        assert!(DeviceFilter::Any.accepts(&[0; 16]));
    }

    #[test]
    fn discrete_preferred() {
        use vk::PhysicalDeviceType as T;
        assert_eq!(
            preferred_index(&[T::INTEGRATED_GPU, T::DISCRETE_GPU, T::DISCRETE_GPU]),
            Some(1)
        );
        assert_eq!(preferred_index(&[T::CPU, T::INTEGRATED_GPU]), Some(0));
        assert_eq!(preferred_index(&[]), None);
    }
}
