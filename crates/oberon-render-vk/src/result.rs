// SPDX-License-Identifier: CEPL-1.0
use ash::prelude::VkResult;
use ash::vk;
use oberon_core::{Error, Result};

/// Folds a driver result into the shared error taxonomy.
pub fn map_vk(call: &'static str, r: vk::Result) -> Error {
    match r {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
        vk::Result::ERROR_OUT_OF_DATE_KHR => Error::OutOfDate,
        vk::Result::ERROR_SURFACE_LOST_KHR => Error::PresentationLost,
        other => Error::GpuCommandFailed {
            call,
            result: other.as_raw(),
        },
    }
}

pub trait VkResultExt<T> {
    fn vk_context(self, call: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn vk_context(self, call: &'static str) -> Result<T> {
        self.map_err(|r| map_vk(call, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping() {
        assert!(matches!(
            map_vk("vkQueueSubmit", vk::Result::ERROR_DEVICE_LOST),
            Error::DeviceLost
        ));
        assert!(matches!(
            map_vk("vkQueuePresentKHR", vk::Result::ERROR_OUT_OF_DATE_KHR),
            Error::OutOfDate
        ));
        assert!(matches!(
            map_vk("vkAcquireNextImageKHR", vk::Result::ERROR_SURFACE_LOST_KHR),
            Error::PresentationLost
        ));
        match map_vk("vkCreateImage", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) {
            Error::GpuCommandFailed { call, result } => {
                assert_eq!(call, "vkCreateImage");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.as_raw());
            }
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn ext_passes_values_through() {
        let ok: VkResult<u32> = Ok(7);
        assert_eq!(ok.vk_context("x").ok(), Some(7));
    }
}
