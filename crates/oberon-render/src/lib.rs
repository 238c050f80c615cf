// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral rendering vocabulary: vertex layouts, pipelines,
//! presentation modes and sample counts.

use bytemuck::{Pod, Zeroable};
use oberon_core::{Error, Result};
use serde::Deserialize;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionColor {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionNormalTexcoord {
    pub position: [f32; 4],
    pub normal: [f32; 4],
    pub texcoord: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexType {
    PositionColor,
    PositionNormalTexcoord,
}

impl VertexType {
    pub const fn size(self) -> usize {
        match self {
            VertexType::PositionColor => std::mem::size_of::<PositionColor>(),
            VertexType::PositionNormalTexcoord => std::mem::size_of::<PositionNormalTexcoord>(),
        }
    }

    /// Number of whole vertices in `bytes`. Rejects empty and ragged buffers.
    pub fn vertex_count(self, bytes: usize) -> Result<u32> {
        let size = self.size();
        if bytes == 0 || bytes % size != 0 {
            return Err(Error::invalid(format!(
                "{bytes} bytes is not a whole number of {size}-byte {self:?} vertices"
            )));
        }
        u32::try_from(bytes / size)
            .map_err(|_| Error::invalid(format!("{bytes} bytes of vertices overflows a draw")))
    }
}

/// Built-in graphics pipelines. The set is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    TestImage,
    UnlitPc,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 2] = [PipelineKind::TestImage, PipelineKind::UnlitPc];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Push-constant block for [`PipelineKind::UnlitPc`]: model, view, projection.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UnlitPushConstants {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

pub const MODEL_OFFSET: u32 = 0;
pub const CAMERA_OFFSET: u32 = 64;
pub const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<UnlitPushConstants>() as u32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
    SharedDemandRefresh,
    SharedContinuousRefresh,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleCount {
    X1,
    X2,
    #[default]
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    pub const ALL: [SampleCount; 7] = [
        SampleCount::X1,
        SampleCount::X2,
        SampleCount::X4,
        SampleCount::X8,
        SampleCount::X16,
        SampleCount::X32,
        SampleCount::X64,
    ];

    pub fn count(self) -> u32 {
        1 << self as u32
    }

    /// Exact power-of-two counts only.
    pub fn from_count(n: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.count() == n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layouts_are_vec4_packed() {
        assert_eq!(VertexType::PositionColor.size(), 32);
        assert_eq!(VertexType::PositionNormalTexcoord.size(), 48);
    }

    #[test]
    fn vertex_count_rejects_ragged_data() {
        assert_eq!(VertexType::PositionColor.vertex_count(36 * 32).ok(), Some(36));
        assert!(VertexType::PositionColor.vertex_count(0).is_err());
        assert!(VertexType::PositionColor.vertex_count(33).is_err());
    }

    #[test]
    fn push_constant_block_layout() {
        assert_eq!(PUSH_CONSTANT_SIZE, 192);
        assert_eq!(CAMERA_OFFSET, 64);
    }

    #[test]
    fn sample_counts() {
        assert_eq!(SampleCount::X1.count(), 1);
        assert_eq!(SampleCount::X64.count(), 64);
        assert_eq!(SampleCount::from_count(8), Some(SampleCount::X8));
        assert_eq!(SampleCount::from_count(3), None);
        assert_eq!(SampleCount::default(), SampleCount::X4);
    }
}
