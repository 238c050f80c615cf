// SPDX-License-Identifier: CEPL-1.0
//! Vulkan 1.3 backend: context, device, windows, frames and the renderer.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod barriers;
pub mod camera;
pub mod context;
pub mod device;
pub mod frame;
pub mod loader;
pub mod mesh;
pub mod physical;
pub mod pipeline_cache;
pub mod pipelines;
pub mod render_window;
pub mod renderer;
pub mod result;
pub mod swapchain;

pub use ash::vk;
pub use camera::{Camera, CameraToken};
pub use context::{ContextInfo, GraphicsContext};
pub use device::{BufferHandle, DeviceInfo, GraphicsDevice, ImageAllocation, MemoryHint};
pub use frame::{Frame, TransferTarget};
pub use mesh::Mesh;
pub use physical::{DeviceFilter, DeviceVendor, PhysicalGraphicsDevice};
pub use pipelines::PipelineSet;
pub use render_window::RenderWindow;
pub use renderer::{FrameGuard, Renderer, FRAME_COUNT};
