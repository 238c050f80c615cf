// SPDX-License-Identifier: CEPL-1.0
//! Error taxonomy shared by every oberon crate.
//!
//! Driver results are folded into these variants by the backend. Suboptimal and
//! out-of-date swapchains are normally recovered where they occur and only reach
//! callers through [`Error::OutOfDate`] when recovery is impossible.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Instance, device, surface or swapchain creation failed, or a required
    /// layer/extension/feature is missing.
    #[error("initialization failed: {0}")]
    InitializationFailure(String),

    /// A driver call returned a non-success code outside the recoverable set.
    #[error("{call} failed (VkResult {result})")]
    GpuCommandFailed { call: &'static str, result: i32 },

    #[error("device lost")]
    DeviceLost,

    #[error("swapchain is out of date")]
    OutOfDate,

    #[error("presentation surface lost")]
    PresentationLost,

    #[error("no candidate format supports the requested features")]
    UnsupportedFormat,

    #[error("queue family {queue_family} cannot present to this surface")]
    SurfaceIncompatible { queue_family: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal assertion failed: {0}")]
    AssertionFailure(String),
}

impl Error {
    /// Debug builds stop at the broken invariant; release builds report it.
    #[track_caller]
    pub fn assertion(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        debug_assert!(false, "{msg}");
        Error::AssertionFailure(msg)
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn init(msg: impl Into<String>) -> Self {
        Error::InitializationFailure(msg.into())
    }

    /// Swapchain conditions that the next frame repairs by rebuilding.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OutOfDate | Error::PresentationLost)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_and_fatal_classes() {
        assert!(Error::OutOfDate.is_recoverable());
        assert!(Error::PresentationLost.is_recoverable());
        assert!(!Error::DeviceLost.is_recoverable());
        assert!(Error::DeviceLost.is_fatal());
        assert!(!Error::UnsupportedFormat.is_fatal());
    }

    #[test]
    fn messages_name_the_failing_call() {
        let e = Error::GpuCommandFailed {
            call: "vkCreateImage",
            result: -2,
        };
        assert_eq!(e.to_string(), "vkCreateImage failed (VkResult -2)");
        let e = Error::SurfaceIncompatible { queue_family: 3 };
        assert!(e.to_string().contains("queue family 3"));
    }
}
