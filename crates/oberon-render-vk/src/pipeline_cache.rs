// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};

use ash::vk;
use oberon_core::Result;
use tracing::{debug, warn};

use crate::result::VkResultExt;

fn hex_bytes(b: &[u8]) -> String {
    let mut s = String::with_capacity(b.len() * 2);
    for x in b {
        use std::fmt::Write as _;
        let _ = write!(&mut s, "{:02x}", x);
    }
    s
}

/// Keyed by vendor, device, driver version and the driver's cache UUID.
pub fn pipeline_cache_path(dir: &Path, props: &vk::PhysicalDeviceProperties) -> PathBuf {
    dir.join(format!(
        "oberon_pipeline_cache_{:04x}_{:04x}_{:08x}_{}.bin",
        props.vendor_id,
        props.device_id,
        props.driver_version,
        hex_bytes(&props.pipeline_cache_uuid)
    ))
}

/// Seeds the cache from `path` when it can be read.
///
/// # Safety
/// `device` must be a live device.
pub unsafe fn create_or_load_pipeline_cache(
    device: &ash::Device,
    path: &Path,
) -> Result<vk::PipelineCache> {
    let data = match fs::read(path) {
        Ok(bytes) => {
            debug!("pipeline cache: {} bytes from {}", bytes.len(), path.display());
            Some(bytes)
        }
        Err(e) => {
            debug!("pipeline cache: starting empty ({}: {e})", path.display());
            None
        }
    };
    let (p_initial_data, initial_size) = match &data {
        Some(bytes) => (bytes.as_ptr() as *const std::ffi::c_void, bytes.len()),
        None => (std::ptr::null(), 0),
    };

    let ci = vk::PipelineCacheCreateInfo {
        s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
        initial_data_size: initial_size,
        p_initial_data,
        ..Default::default()
    };
    match unsafe { device.create_pipeline_cache(&ci, None) } {
        Ok(cache) => Ok(cache),
        // A corrupt blob is not fatal; retry empty.
        Err(e) if data.is_some() => {
            warn!("pipeline cache rejected ({e}); starting empty");
            let empty = vk::PipelineCacheCreateInfo {
                s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
                ..Default::default()
            };
            unsafe { device.create_pipeline_cache(&empty, None) }
                .vk_context("vkCreatePipelineCache")
        }
        Err(e) => Err(crate::result::map_vk("vkCreatePipelineCache", e)),
    }
}

/// Write failures are logged and ignored.
///
/// # Safety
/// `cache` must belong to `device`.
pub unsafe fn save_pipeline_cache(device: &ash::Device, cache: vk::PipelineCache, path: &Path) {
    match unsafe { device.get_pipeline_cache_data(cache) } {
        Ok(bytes) => {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            match fs::write(path, &bytes) {
                Ok(()) => debug!("pipeline cache: wrote {} bytes", bytes.len()),
                Err(e) => warn!("pipeline cache: write {} failed: {e}", path.display()),
            }
        }
        Err(e) => {
            // some drivers fail on an empty cache or a lost device
            debug!("pipeline cache: no data ({e})");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_keyed_by_device_and_driver() {
        let props = vk::PhysicalDeviceProperties {
            vendor_id: 0x10de,
            device_id: 0x2684,
            driver_version: 0x0abc_0001,
            pipeline_cache_uuid: [0xab; vk::UUID_SIZE],
            ..Default::default()
        };
        let p = pipeline_cache_path(Path::new("cache"), &props);
        assert_eq!(
            p,
            Path::new("cache").join(format!(
                "oberon_pipeline_cache_10de_2684_0abc0001_{}.bin",
                "ab".repeat(16)
            ))
        );
    }
}
