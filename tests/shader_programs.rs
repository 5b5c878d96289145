//! Integration tests for compiling and linking the shader programs.
//!
//! Interface checks run without a GPU. Tests that create pipelines ask for a
//! headless device and return early when none is available.

mod common;

use compute_particles::gpu::program::resolve_interface;
use compute_particles::gpu::render::{build_draw_program, FRAGMENT_SHADER, VERTEX_SHADER};
use compute_particles::gpu::{
    build_simulation_program, compile_stage, link_program, simulation_shader, ProgramRole,
    RenderTarget, StageKind,
};
use compute_particles::{Particle, ShaderError, WORKGROUP_SIZE};

const SMALL_BUFFER: u64 = 1 << 20;

const VERTEX_WITH_COLOR_OUTPUT: &str = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(position, 0.0, 1.0);
    out.color = vec4<f32>(1.0, 1.0, 1.0, 1.0);
    return out;
}
"#;

const FRAGMENT_READING_LOCATION_1: &str = r#"
@fragment
fn fs_main(@location(1) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;

fn draw_target_layouts() -> [wgpu::VertexBufferLayout<'static>; 1] {
    [Particle::vertex_layout()]
}

// ============================================================================
// Generated sources
// ============================================================================

#[test]
fn test_generated_shaders_validate() {
    common::validate_wgsl(&simulation_shader()).expect("simulation shader should be valid");
    common::validate_wgsl(VERTEX_SHADER).expect("vertex shader should be valid");
    common::validate_wgsl(FRAGMENT_SHADER).expect("fragment shader should be valid");
}

#[test]
fn test_compute_workgroup_matches_constant() {
    let module = common::validate_wgsl(&simulation_shader()).unwrap();
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Compute)
        .expect("compute entry point");
    assert_eq!(entry.workgroup_size, [WORKGROUP_SIZE, 1, 1]);
}

#[test]
fn test_uniform_reflection_covers_every_written_field() {
    let compute = compile_stage(StageKind::Compute, &simulation_shader()).unwrap();
    let interface = resolve_interface(ProgramRole::Simulation, &[compute]).unwrap();
    let layout = interface.uniforms.expect("simulation uniforms");
    let mut names: Vec<&str> = layout.names().collect();
    names.sort_unstable();
    assert_eq!(names, ["attract", "attract_to", "dt", "repulse", "repulse_from", "screen_size"]);

    let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).unwrap();
    let fragment = compile_stage(StageKind::Fragment, FRAGMENT_SHADER).unwrap();
    let interface = resolve_interface(ProgramRole::Draw, &[vertex, fragment]).unwrap();
    let layout = interface.uniforms.expect("draw uniforms");
    let mut names: Vec<&str> = layout.names().collect();
    names.sort_unstable();
    assert_eq!(names, ["color", "projection"]);
}

// ============================================================================
// Compile failures
// ============================================================================

#[test]
fn test_invalid_source_reports_diagnostic() {
    let source = "@compute @workgroup_size(1024) fn main() { let x = ; }";
    let err = compile_stage(StageKind::Compute, source).unwrap_err();
    match &err {
        ShaderError::Compile { stage, log } => {
            assert_eq!(*stage, StageKind::Compute);
            assert!(!log.is_empty());
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
}

#[test]
fn test_missing_entry_point_is_a_compile_error() {
    let err = compile_stage(StageKind::Fragment, VERTEX_SHADER).unwrap_err();
    assert!(matches!(err, ShaderError::Compile { stage: StageKind::Fragment, .. }));
}

// ============================================================================
// Link interface checks
// ============================================================================

#[test]
fn test_fragment_input_not_written_by_vertex() {
    let vertex = compile_stage(StageKind::Vertex, VERTEX_WITH_COLOR_OUTPUT).unwrap();
    let fragment = compile_stage(StageKind::Fragment, FRAGMENT_READING_LOCATION_1).unwrap();
    let err = resolve_interface(ProgramRole::Draw, &[vertex, fragment]).unwrap_err();
    assert!(err.contains("@location(1)"), "{}", err);
}

#[test]
fn test_conflicting_uniform_blocks() {
    let fragment = r#"
struct DrawParams {
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> draw_params: DrawParams;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return draw_params.color;
}
"#;
    let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).unwrap();
    let fragment = compile_stage(StageKind::Fragment, fragment).unwrap();
    let err = resolve_interface(ProgramRole::Draw, &[vertex, fragment]).unwrap_err();
    assert!(err.contains("does not match"), "{}", err);
}

#[test]
fn test_draw_program_needs_both_stages() {
    let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).unwrap();
    assert!(resolve_interface(ProgramRole::Draw, &[vertex]).is_err());
}

// ============================================================================
// Linking on a device
// ============================================================================

#[test]
fn test_building_twice_gives_independent_programs() {
    let Some((device, _queue)) = common::headless_device(SMALL_BUFFER) else {
        return;
    };

    let first = build_simulation_program(&device).expect("first build");
    let second = build_simulation_program(&device).expect("second build");
    assert_eq!(first.role(), ProgramRole::Simulation);
    assert_eq!(second.role(), ProgramRole::Simulation);
    assert_eq!(first.uniforms(), second.uniforms());
    assert_eq!(first.workgroup_size(), Some([WORKGROUP_SIZE, 1, 1]));

    // Dropping one program leaves the other usable.
    drop(first);
    let _layout = second.bind_group_layout(0);
}

#[test]
fn test_draw_program_links() {
    let Some((device, _queue)) = common::headless_device(SMALL_BUFFER) else {
        return;
    };

    let program =
        build_draw_program(&device, wgpu::TextureFormat::Rgba8Unorm).expect("draw program");
    assert_eq!(program.role(), ProgramRole::Draw);
    assert!(program.workgroup_size().is_none());
}

#[test]
fn test_link_rejects_mismatched_varyings() {
    let Some((device, _queue)) = common::headless_device(SMALL_BUFFER) else {
        return;
    };

    let vertex = compile_stage(StageKind::Vertex, VERTEX_WITH_COLOR_OUTPUT).unwrap();
    let fragment = compile_stage(StageKind::Fragment, FRAGMENT_READING_LOCATION_1).unwrap();
    let layouts = draw_target_layouts();
    let result = link_program(
        &device,
        ProgramRole::Draw,
        vec![vertex, fragment],
        Some(RenderTarget {
            vertex_buffers: &layouts,
            color_target: wgpu::ColorTargetState::from(wgpu::TextureFormat::Rgba8Unorm),
            topology: wgpu::PrimitiveTopology::PointList,
        }),
    );

    match result {
        Err(ShaderError::Link { program, log }) => {
            assert_eq!(program, "Draw");
            assert!(!log.is_empty());
        }
        Err(other) => panic!("expected a link error, got {:?}", other),
        Ok(_) => panic!("mismatched varyings should not link"),
    }
}

#[test]
fn test_link_without_render_target_fails() {
    let Some((device, _queue)) = common::headless_device(SMALL_BUFFER) else {
        return;
    };

    let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).unwrap();
    let fragment = compile_stage(StageKind::Fragment, FRAGMENT_SHADER).unwrap();
    assert!(matches!(
        link_program(&device, ProgramRole::Draw, vec![vertex, fragment], None),
        Err(ShaderError::Link { .. })
    ));
}
