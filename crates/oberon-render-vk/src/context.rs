// SPDX-License-Identifier: CEPL-1.0
use std::collections::BTreeSet;
use std::ffi::{c_void, CStr, CString};
use std::sync::Arc;

use ash::vk;
use oberon_core::{Error, Result};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};

use crate::loader::{DispatchLoader, InstanceDispatch};
use crate::result::VkResultExt;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Debug)]
pub struct ContextInfo {
    pub application_name: String,
    pub application_version: u32,
    pub requested_layers: Vec<CString>,
    pub required_extensions: Vec<CString>,
    pub requested_extensions: Vec<CString>,
    /// Validation layer and a debug messenger that logs through tracing.
    pub diagnostics: bool,
}

impl Default for ContextInfo {
    fn default() -> Self {
        Self {
            application_name: "oberon".into(),
            application_version: 0,
            requested_layers: Vec::new(),
            required_extensions: Vec::new(),
            requested_extensions: Vec::new(),
            diagnostics: cfg!(debug_assertions),
        }
    }
}

/// Requested layers the loader offers, in request order.
pub fn select_layers(available: &[CString], requested: &[CString]) -> Vec<CString> {
    let mut out: Vec<CString> = Vec::new();
    for r in requested {
        if available.contains(r) && !out.contains(r) {
            out.push(r.clone());
        } else if !available.contains(r) {
            debug!("layer {:?} unavailable, skipped", r);
        }
    }
    out
}

/// Required extensions must all be present. Requested ones are kept when
/// available.
pub fn select_extensions(
    available: &BTreeSet<CString>,
    required: &[CString],
    requested: &[CString],
) -> Result<Vec<CString>> {
    let mut out: Vec<CString> = Vec::new();
    for r in required {
        if !available.contains(r) {
            return Err(Error::init(format!(
                "required extension {} is not available",
                r.to_string_lossy()
            )));
        }
        if !out.contains(r) {
            out.push(r.clone());
        }
    }
    for r in requested {
        if available.contains(r) {
            if !out.contains(r) {
                out.push(r.clone());
            }
        } else {
            debug!("extension {:?} unavailable, skipped", r);
        }
    }
    Ok(out)
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan {:?}] {}", types, msg);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan {:?}] {}", types, msg);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!("[vulkan {:?}] {}", types, msg);
    } else {
        trace!("[vulkan {:?}] {}", types, msg);
    }
    vk::FALSE
}

fn names<T>(props: &[T], name: impl Fn(&T) -> Option<&CStr>) -> Vec<CString> {
    props.iter().filter_map(|p| name(p).map(CStr::to_owned)).collect()
}

/// One instance per process, plus the diagnostic messenger when enabled.
pub struct GraphicsContext {
    loader: DispatchLoader,
    dispatch: InstanceDispatch,
    messenger: vk::DebugUtilsMessengerEXT,
    layers: Vec<CString>,
    extensions: Vec<CString>,
}

impl GraphicsContext {
    pub fn new(info: &ContextInfo, display: RawDisplayHandle) -> Result<Arc<Self>> {
        let loader = DispatchLoader::new();
        let entry = loader.entry();

        let version = loader.instance_version()?;
        if version < vk::API_VERSION_1_3 {
            return Err(Error::init(format!(
                "Vulkan 1.3 required, loader reports {}.{}",
                vk::api_version_major(version),
                vk::api_version_minor(version)
            )));
        }

        let mut requested_layers = info.requested_layers.clone();
        let mut required = info.required_extensions.clone();
        let mut requested = info.requested_extensions.clone();
        if info.diagnostics {
            requested_layers.push(VALIDATION_LAYER.to_owned());
            required.push(ash::ext::debug_utils::NAME.to_owned());
            requested.push(ash::ext::validation_features::NAME.to_owned());
        }

        // Window-system surface extensions are always required.
        let wsi = ash_window::enumerate_required_extensions(display)
            .vk_context("ash_window::enumerate_required_extensions")?;
        for &p in wsi {
            required.push(unsafe { CStr::from_ptr(p) }.to_owned());
        }

        let available_layers = unsafe { entry.enumerate_instance_layer_properties() }
            .vk_context("vkEnumerateInstanceLayerProperties")?;
        let available_layers = names(&available_layers, |l| l.layer_name_as_c_str().ok());
        let layers = select_layers(&available_layers, &requested_layers);

        let mut available_exts: BTreeSet<CString> = BTreeSet::new();
        let implementation = unsafe { entry.enumerate_instance_extension_properties(None) }
            .vk_context("vkEnumerateInstanceExtensionProperties")?;
        available_exts.extend(names(&implementation, |e| e.extension_name_as_c_str().ok()));
        for layer in &layers {
            let exts = unsafe { entry.enumerate_instance_extension_properties(Some(layer)) }
                .vk_context("vkEnumerateInstanceExtensionProperties")?;
            available_exts.extend(names(&exts, |e| e.extension_name_as_c_str().ok()));
        }
        let extensions = select_extensions(&available_exts, &required, &requested)?;

        let app_name = CString::new(info.application_name.as_str())
            .map_err(|_| Error::invalid("application name contains NUL"))?;
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app_name.as_ptr(),
            application_version: info.application_version,
            p_engine_name: c"oberon".as_ptr(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_3,
            ..Default::default()
        };
        let layer_ptrs: Vec<_> = layers.iter().map(|l| l.as_ptr()).collect();
        let ext_ptrs: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };

        let debug_enabled = extensions
            .iter()
            .any(|e| e.as_c_str() == ash::ext::debug_utils::NAME);
        let dispatch = unsafe { loader.load_instance(&create_info, debug_enabled) }?;

        let messenger_fn = c"vkCreateDebugUtilsMessengerEXT";
        let messenger = match (&dispatch.debug_utils, info.diagnostics) {
            (Some(_), true) if dispatch.proc_addr(&loader, messenger_fn).is_none() => {
                warn!("debug utils enabled but {messenger_fn:?} is not exported; no messenger");
                vk::DebugUtilsMessengerEXT::null()
            }
            (Some(du), true) => {
                let ci = vk::DebugUtilsMessengerCreateInfoEXT {
                    s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
                    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                    message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    pfn_user_callback: Some(debug_callback),
                    ..Default::default()
                };
                match unsafe { du.create_debug_utils_messenger(&ci, None) } {
                    Ok(m) => m,
                    Err(e) => {
                        unsafe { dispatch.destroy() };
                        return Err(crate::result::map_vk("vkCreateDebugUtilsMessengerEXT", e));
                    }
                }
            }
            _ => vk::DebugUtilsMessengerEXT::null(),
        };

        info!(
            "Vulkan instance ready (loader {}.{}.{}, {} layers, {} extensions)",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
            layers.len(),
            extensions.len()
        );

        Ok(Arc::new(Self {
            loader,
            dispatch,
            messenger,
            layers,
            extensions,
        }))
    }

    pub fn loader(&self) -> &DispatchLoader {
        &self.loader
    }

    pub fn dispatch(&self) -> &InstanceDispatch {
        &self.dispatch
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.dispatch.instance
    }

    pub fn layers(&self) -> &[CString] {
        &self.layers
    }

    pub fn extensions(&self) -> &[CString] {
        &self.extensions
    }

    pub fn has_diagnostics(&self) -> bool {
        self.messenger != vk::DebugUtilsMessengerEXT::null()
    }
}

// STRICT TEARDOWN ORDER:
// - Messenger before instance
// - Instance last; every device and surface is gone by now (they hold Arcs)
impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            if let Some(du) = &self.dispatch.debug_utils {
                if self.messenger != vk::DebugUtilsMessengerEXT::null() {
                    du.destroy_debug_utils_messenger(self.messenger, None);
                }
            }
            self.dispatch.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn layers_are_intersected_in_request_order() {
        let available = vec![c("VK_LAYER_A"), c("VK_LAYER_KHRONOS_validation")];
        let requested = vec![
            c("VK_LAYER_KHRONOS_validation"),
            c("VK_LAYER_MISSING"),
            c("VK_LAYER_A"),
            c("VK_LAYER_A"),
        ];
        assert_eq!(
            select_layers(&available, &requested),
            vec![c("VK_LAYER_KHRONOS_validation"), c("VK_LAYER_A")]
        );
    }

    #[test]
    fn missing_required_extension_fails() {
        let available: BTreeSet<_> = [c("VK_KHR_surface")].into_iter().collect();
        let err = select_extensions(&available, &[c("VK_KHR_xcb_surface")], &[]).unwrap_err();
        assert!(err.to_string().contains("VK_KHR_xcb_surface"));
    }

    #[test]
    fn requested_extensions_are_optional() {
        let available: BTreeSet<_> = [c("VK_KHR_surface"), c("VK_EXT_debug_utils")]
            .into_iter()
            .collect();
        let got = select_extensions(
            &available,
            &[c("VK_KHR_surface")],
            &[c("VK_EXT_validation_features"), c("VK_EXT_debug_utils"), c("VK_KHR_surface")],
        )
        .unwrap();
        assert_eq!(got, vec![c("VK_KHR_surface"), c("VK_EXT_debug_utils")]);
    }
}
