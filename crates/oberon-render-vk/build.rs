use std::{env, fs, path::PathBuf};

// Test image: three vertices hard-coded in the shader, no vertex input.
const TEST_IMAGE_VS: &str = r#"
#version 450
layout(location = 0) out vec4 vColor;

const vec2 POSITIONS[3] = vec2[](
    vec2(0.0, -0.5),
    vec2(-0.5, 0.5),
    vec2(0.5, 0.5)
);

const vec3 COLORS[3] = vec3[](
    vec3(1.0, 0.0, 0.0),
    vec3(0.0, 1.0, 0.0),
    vec3(0.0, 0.0, 1.0)
);

void main() {
    gl_Position = vec4(POSITIONS[gl_VertexIndex], 0.0, 1.0);
    vColor = vec4(COLORS[gl_VertexIndex], 1.0);
}
"#;

const PASS_COLOR_FS: &str = r#"
#version 450
layout(location = 0) in vec4 vColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vColor;
}
"#;

// Unlit, push constants only. Layout must match UnlitPushConstants:
//   offset 0: model, offset 64: view, offset 128: proj
//   binding 0, location 0: vec4 position, location 1: vec4 color (stride 32)
const UNLIT_PC_VS: &str = r#"
#version 450
layout(push_constant) uniform Transforms {
    mat4 model;
    mat4 view;
    mat4 proj;
} pc;

layout(location = 0) in vec4 inPosition;
layout(location = 1) in vec4 inColor;

layout(location = 0) out vec4 vColor;

void main() {
    gl_Position = pc.proj * pc.view * pc.model * inPosition;
    vColor = inColor;
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_3 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let shaders = [
        ("test_image.vert", TEST_IMAGE_VS, shaderc::ShaderKind::Vertex),
        ("test_image.frag", PASS_COLOR_FS, shaderc::ShaderKind::Fragment),
        ("unlit_pc.vert", UNLIT_PC_VS, shaderc::ShaderKind::Vertex),
        ("unlit_pc.frag", PASS_COLOR_FS, shaderc::ShaderKind::Fragment),
    ];

    for (name, src, kind) in shaders {
        let spv = comp
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
    }

    // Re-run if this file changes (inline sources live here)
    println!("cargo:rerun-if-changed=build.rs");
}
