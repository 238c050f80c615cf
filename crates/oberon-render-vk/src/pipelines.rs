// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::sync::Arc;

use ash::util::read_spv;
use ash::vk;
use oberon_core::{Error, Result};
use oberon_render::{PipelineKind, PositionColor, SampleCount, PUSH_CONSTANT_SIZE};
use tracing::debug;

use crate::device::{sample_flags, GraphicsDevice};
use crate::result::VkResultExt;

const TEST_IMAGE_VS: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/test_image.vert.spv"));
const TEST_IMAGE_FS: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/test_image.frag.spv"));
const UNLIT_PC_VS: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/unlit_pc.vert.spv"));
const UNLIT_PC_FS: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/unlit_pc.frag.spv"));

fn shader_bytes(kind: PipelineKind) -> (&'static [u8], &'static [u8]) {
    match kind {
        PipelineKind::TestImage => (TEST_IMAGE_VS, TEST_IMAGE_FS),
        PipelineKind::UnlitPc => (UNLIT_PC_VS, UNLIT_PC_FS),
    }
}

pub fn push_constant_ranges(kind: PipelineKind) -> Vec<vk::PushConstantRange> {
    match kind {
        PipelineKind::TestImage => Vec::new(),
        PipelineKind::UnlitPc => vec![vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: PUSH_CONSTANT_SIZE,
        }],
    }
}

/// Binding and attributes, or nothing for pipelines that generate vertices.
pub fn vertex_layout(
    kind: PipelineKind,
) -> Option<(vk::VertexInputBindingDescription, [vk::VertexInputAttributeDescription; 2])> {
    match kind {
        PipelineKind::TestImage => None,
        PipelineKind::UnlitPc => Some((
            vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<PositionColor>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            },
            [
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32B32A32_SFLOAT,
                    offset: 0,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32A32_SFLOAT,
                    offset: std::mem::size_of::<[f32; 4]>() as u32,
                },
            ],
        )),
    }
}

unsafe fn shader_module(device: &ash::Device, bytes: &[u8]) -> Result<vk::ShaderModule> {
    let code = read_spv(&mut Cursor::new(bytes))
        .map_err(|e| Error::init(format!("invalid SPIR-V: {e}")))?;
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    unsafe { device.create_shader_module(&ci, None) }.vk_context("vkCreateShaderModule")
}

/// Every built-in pipeline, built against one attachment configuration.
pub struct PipelineSet {
    device: Arc<GraphicsDevice>,
    layouts: Vec<vk::PipelineLayout>,
    pipelines: Vec<vk::Pipeline>,
    samples: SampleCount,
}

impl PipelineSet {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
        samples: SampleCount,
    ) -> Result<Self> {
        let mut set = Self {
            device: Arc::clone(device),
            layouts: Vec::with_capacity(PipelineKind::ALL.len()),
            pipelines: Vec::with_capacity(PipelineKind::ALL.len()),
            samples,
        };
        // Partially built sets are torn down by Drop.
        for kind in PipelineKind::ALL {
            let pipeline = unsafe {
                create_pipeline(
                    device,
                    kind,
                    color_format,
                    depth_stencil_format,
                    samples,
                    &mut set.layouts,
                )
            }?;
            set.pipelines.push(pipeline);
            debug!("pipeline {kind:?} built ({} samples)", samples.count());
        }
        Ok(set)
    }

    pub fn pipeline(&self, kind: PipelineKind) -> vk::Pipeline {
        self.pipelines[kind.index()]
    }

    pub fn layout(&self, kind: PipelineKind) -> vk::PipelineLayout {
        self.layouts[kind.index()]
    }

    pub fn samples(&self) -> SampleCount {
        self.samples
    }
}

impl Drop for PipelineSet {
    fn drop(&mut self) {
        let device = self.device.raw();
        unsafe {
            for &p in &self.pipelines {
                device.destroy_pipeline(p, None);
            }
            for &l in &self.layouts {
                device.destroy_pipeline_layout(l, None);
            }
        }
    }
}

/// Pushes the layout into `layouts` as soon as it exists so a failed pipeline
/// build still releases it.
unsafe fn create_pipeline(
    device: &GraphicsDevice,
    kind: PipelineKind,
    color_format: vk::Format,
    depth_stencil_format: vk::Format,
    samples: SampleCount,
    layouts: &mut Vec<vk::PipelineLayout>,
) -> Result<vk::Pipeline> {
    // STRICT: attachment formats and sample count MUST match the frame
    // attachments the pipeline renders into.
    let raw = device.raw();

    let ranges = push_constant_ranges(kind);
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        push_constant_range_count: ranges.len() as u32,
        p_push_constant_ranges: ranges.as_ptr(),
        ..Default::default()
    };
    let layout = unsafe { raw.create_pipeline_layout(&layout_info, None) }
        .vk_context("vkCreatePipelineLayout")?;
    layouts.push(layout);

    // --- Shader modules (destroyed before return) ---
    let (vs_bytes, fs_bytes) = shader_bytes(kind);
    let vs = unsafe { shader_module(raw, vs_bytes) }?;
    let fs = match unsafe { shader_module(raw, fs_bytes) } {
        Ok(m) => m,
        Err(e) => {
            unsafe { raw.destroy_shader_module(vs, None) };
            return Err(e);
        }
    };
    let entry = c"main";
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // --- Fixed-function state ---
    let layout_desc = vertex_layout(kind);
    let vertex_input = match &layout_desc {
        Some((binding, attributes)) => vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        },
        None => vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            ..Default::default()
        },
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: sample_flags(samples),
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: vk::TRUE,
        depth_write_enable: vk::TRUE,
        depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::TRUE,
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let rendering = vk::PipelineRenderingCreateInfo {
        s_type: vk::StructureType::PIPELINE_RENDERING_CREATE_INFO,
        color_attachment_count: 1,
        p_color_attachment_formats: &color_format,
        depth_attachment_format: depth_stencil_format,
        stencil_attachment_format: depth_stencil_format,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        p_next: (&rendering as *const _) as *const _,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        ..Default::default()
    };

    let created = unsafe {
        raw.create_graphics_pipelines(
            device.pipeline_cache(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
    };
    unsafe {
        raw.destroy_shader_module(vs, None);
        raw.destroy_shader_module(fs, None);
    }
    match created {
        Ok(p) => Ok(p[0]),
        Err((_, err)) => Err(crate::result::map_vk("vkCreateGraphicsPipelines", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_has_no_inputs() {
        assert!(vertex_layout(PipelineKind::TestImage).is_none());
        assert!(push_constant_ranges(PipelineKind::TestImage).is_empty());
    }

    #[test]
    fn unlit_layout_matches_position_color() {
        let (binding, attrs) = vertex_layout(PipelineKind::UnlitPc).unwrap();
        assert_eq!(binding.stride, 32);
        assert_eq!(attrs[1].offset, 16);
        let ranges = push_constant_ranges(PipelineKind::UnlitPc);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].size, 192);
    }
}
