// SPDX-License-Identifier: CEPL-1.0
//! Driver entry points at instance and device scope.
//!
//! The entry table comes from the linked loader. Instance and device tables are
//! resolved once when their handle is created and are immutable afterwards, so
//! concurrent reads need no locking. Destroying a scope's handle invalidates
//! every table resolved at that scope; owners call `destroy` last.

use std::ffi::CStr;

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use oberon_core::Result;

use crate::result::VkResultExt;

pub struct DispatchLoader {
    entry: Entry,
}

impl DispatchLoader {
    pub fn new() -> Self {
        Self {
            entry: Entry::linked(),
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Loader API version. Loaders predating 1.1 report 1.0.
    pub fn instance_version(&self) -> Result<u32> {
        let v = unsafe { self.entry.try_enumerate_instance_version() }
            .vk_context("vkEnumerateInstanceVersion")?;
        Ok(v.unwrap_or(vk::API_VERSION_1_0))
    }

    /// # Safety
    /// `info` and everything it points to must be valid for the call.
    pub unsafe fn load_instance(
        &self,
        info: &vk::InstanceCreateInfo,
        debug_utils_enabled: bool,
    ) -> Result<InstanceDispatch> {
        let instance =
            unsafe { self.entry.create_instance(info, None) }.vk_context("vkCreateInstance")?;
        let surface = surface::Instance::new(&self.entry, &instance);
        let debug_utils =
            debug_utils_enabled.then(|| debug_utils::Instance::new(&self.entry, &instance));
        Ok(InstanceDispatch {
            instance,
            surface,
            debug_utils,
        })
    }
}

impl Default for DispatchLoader {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InstanceDispatch {
    pub instance: ash::Instance,
    pub surface: surface::Instance,
    pub debug_utils: Option<debug_utils::Instance>,
}

impl InstanceDispatch {
    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }

    /// Resolves an instance-level command by name.
    pub fn proc_addr(&self, loader: &DispatchLoader, name: &CStr) -> vk::PFN_vkVoidFunction {
        unsafe { loader.entry.get_instance_proc_addr(self.handle(), name.as_ptr()) }
    }

    /// # Safety
    /// `info` and everything it points to must be valid for the call.
    pub unsafe fn load_device(
        &self,
        physical: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> Result<DeviceDispatch> {
        let device = unsafe { self.instance.create_device(physical, info, None) }
            .vk_context("vkCreateDevice")?;
        let swapchain = swapchain::Device::new(&self.instance, &device);
        Ok(DeviceDispatch { device, swapchain })
    }

    /// # Safety
    /// Every child object must already be destroyed. The tables are dead
    /// afterwards.
    pub unsafe fn destroy(&self) {
        unsafe { self.instance.destroy_instance(None) };
    }
}

pub struct DeviceDispatch {
    pub device: ash::Device,
    pub swapchain: swapchain::Device,
}

impl DeviceDispatch {
    pub fn handle(&self) -> vk::Device {
        self.device.handle()
    }

    /// Resolves a device-level command by name.
    pub fn proc_addr(&self, instance: &InstanceDispatch, name: &CStr) -> vk::PFN_vkVoidFunction {
        unsafe { (instance.instance.fp_v1_0().get_device_proc_addr)(self.handle(), name.as_ptr()) }
    }

    /// # Safety
    /// The device must be idle and every child object destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.device.destroy_device(None) };
    }
}
