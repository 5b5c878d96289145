//! Shader program builder.
//!
//! Building a program is split in two steps:
//!
//! 1. [`compile_stage`] turns WGSL source for one stage into a [`CompiledStage`],
//!    using naga to parse and validate it and to find the stage's entry point.
//! 2. [`link_program`] consumes the stages, checks that they fit together
//!    (stage combination, vertex outputs against fragment inputs, a shared
//!    uniform block) and creates the wgpu pipeline inside a validation error
//!    scope.
//!
//! Every failure is logged with its diagnostic and returned as a
//! [`ShaderError`]. Stages handed to [`link_program`] are dropped whether or not
//! linking succeeds, so nothing from a failed build outlives the call.

use std::collections::BTreeSet;
use std::fmt;

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::uniforms::UniformLayout;
use crate::error::ShaderError;

/// The pipeline stage a piece of WGSL is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
            StageKind::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// Which of the two programs the application runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramRole {
    /// Compute program integrating the particles.
    Simulation,
    /// Vertex + fragment program drawing them as points.
    Draw,
}

impl fmt::Display for ProgramRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramRole::Simulation => f.write_str("Simulation"),
            ProgramRole::Draw => f.write_str("Draw"),
        }
    }
}

/// One successfully compiled stage, waiting to be linked.
#[derive(Debug)]
pub struct CompiledStage {
    kind: StageKind,
    source: String,
    module: naga::Module,
    entry_point: String,
}

impl CompiledStage {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.stage == self.kind.naga_stage())
    }

    /// `@workgroup_size` of a compute entry point.
    pub fn workgroup_size(&self) -> Option<[u32; 3]> {
        match self.kind {
            StageKind::Compute => self.entry().map(|ep| ep.workgroup_size),
            _ => None,
        }
    }
}

/// Compile one shader stage from WGSL source.
pub fn compile_stage(kind: StageKind, source: &str) -> Result<CompiledStage, ShaderError> {
    compile_module(kind, source).map_err(|log| {
        log::error!("Shader compilation failed ({} stage): {}", kind, log);
        ShaderError::Compile { stage: kind, log }
    })
}

fn compile_module(kind: StageKind, source: &str) -> Result<CompiledStage, String> {
    let module = wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator.validate(&module).map_err(|err| format!("{}", err))?;

    let entries: Vec<&str> = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == kind.naga_stage())
        .map(|ep| ep.name.as_str())
        .collect();
    let entry_point = match entries.as_slice() {
        [name] => name.to_string(),
        [] => return Err(format!("no @{} entry point found", kind)),
        many => {
            return Err(format!(
                "expected one @{} entry point, found {}: {}",
                kind,
                many.len(),
                many.join(", ")
            ))
        }
    };

    Ok(CompiledStage {
        kind,
        source: source.to_string(),
        module,
        entry_point,
    })
}

/// What a set of stages exposes once linked, resolved without touching the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInterface {
    pub uniforms: Option<UniformLayout>,
    pub workgroup_size: Option<[u32; 3]>,
}

fn stage_of(stages: &[CompiledStage], kind: StageKind) -> Option<&CompiledStage> {
    stages.iter().find(|stage| stage.kind == kind)
}

/// Check that `stages` form a valid program for `role` and resolve its interface.
pub fn resolve_interface(
    role: ProgramRole,
    stages: &[CompiledStage],
) -> Result<ProgramInterface, String> {
    let mut kinds: Vec<StageKind> = stages.iter().map(|s| s.kind).collect();
    kinds.sort_by_key(|k| *k as u8);
    let expected: &[StageKind] = match role {
        ProgramRole::Simulation => &[StageKind::Compute],
        ProgramRole::Draw => &[StageKind::Vertex, StageKind::Fragment],
    };
    if kinds != expected {
        let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        return Err(format!(
            "{} program needs stages [{}], got [{}]",
            role,
            expected.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", "),
            names.join(", ")
        ));
    }

    let vertex = stage_of(stages, StageKind::Vertex);
    let fragment = stage_of(stages, StageKind::Fragment);
    if let (Some(vertex), Some(fragment)) = (vertex, fragment) {
        let outputs = vertex
            .entry()
            .map(|ep| vertex_outputs(&vertex.module, ep))
            .unwrap_or_default();
        let inputs = fragment
            .entry()
            .map(|ep| fragment_inputs(&fragment.module, ep))
            .unwrap_or_default();
        if let Some(missing) = inputs.difference(&outputs).next() {
            return Err(format!(
                "fragment input @location({}) is not written by the vertex stage",
                missing
            ));
        }
    }

    let mut uniforms: Option<(StageKind, UniformLayout)> = None;
    for stage in stages {
        let reflected = UniformLayout::reflect(&stage.module)
            .map_err(|e| format!("{} stage: {}", stage.kind, e))?;
        let Some(layout) = reflected else {
            continue;
        };
        if let Some((first, existing)) = &uniforms {
            if *existing != layout {
                return Err(format!(
                    "uniform block in the {} stage does not match the one in the {} stage",
                    stage.kind, first
                ));
            }
        } else {
            uniforms = Some((stage.kind, layout));
        }
    }

    Ok(ProgramInterface {
        uniforms: uniforms.map(|(_, layout)| layout),
        workgroup_size: stage_of(stages, StageKind::Compute)
            .and_then(CompiledStage::workgroup_size),
    })
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn vertex_outputs(module: &naga::Module, entry: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn fragment_inputs(module: &naga::Module, entry: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    for arg in &entry.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

/// Fixed-function state a draw program is linked against.
pub struct RenderTarget<'a> {
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub color_target: wgpu::ColorTargetState,
    pub topology: wgpu::PrimitiveTopology,
}

pub(crate) enum Pipeline {
    Compute(wgpu::ComputePipeline),
    Render(wgpu::RenderPipeline),
}

/// A linked program. Only successfully linked programs exist as values.
pub struct Program {
    pub(crate) role: ProgramRole,
    pub(crate) pipeline: Pipeline,
    pub(crate) interface: ProgramInterface,
}

impl Program {
    pub fn role(&self) -> ProgramRole {
        self.role
    }

    /// Uniform block layout, resolved and cached at link time.
    pub fn uniforms(&self) -> Option<&UniformLayout> {
        self.interface.uniforms.as_ref()
    }

    pub fn workgroup_size(&self) -> Option<[u32; 3]> {
        self.interface.workgroup_size
    }

    /// Bind group layout derived from the program's shaders.
    pub fn bind_group_layout(&self, index: u32) -> wgpu::BindGroupLayout {
        match &self.pipeline {
            Pipeline::Compute(p) => p.get_bind_group_layout(index),
            Pipeline::Render(p) => p.get_bind_group_layout(index),
        }
    }
}

/// Link compiled stages into a program for `role`.
///
/// `target` is required for [`ProgramRole::Draw`] and ignored for compute programs.
pub fn link_program(
    device: &wgpu::Device,
    role: ProgramRole,
    stages: Vec<CompiledStage>,
    target: Option<RenderTarget<'_>>,
) -> Result<Program, ShaderError> {
    let fail = |log: String| {
        log::error!("Program linking failed ({}): {}", role, log);
        ShaderError::Link {
            program: role.to_string(),
            log,
        }
    };

    let interface = resolve_interface(role, &stages).map_err(fail)?;
    if role == ProgramRole::Draw && target.is_none() {
        return Err(fail("draw program linked without a render target".to_string()));
    }

    let label = format!("{} Program", role);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let modules: Vec<(StageKind, &str, wgpu::ShaderModule)> = stages
        .iter()
        .map(|stage| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} {} Shader", role, stage.kind)),
                source: wgpu::ShaderSource::Wgsl(stage.source.as_str().into()),
            });
            (stage.kind, stage.entry_point.as_str(), module)
        })
        .collect();
    let module_for = |kind: StageKind| {
        modules
            .iter()
            .find(|(k, _, _)| *k == kind)
            .map(|(_, entry, module)| (*entry, module))
    };

    let pipeline = match (role, target) {
        (ProgramRole::Draw, Some(target)) => {
            match (module_for(StageKind::Vertex), module_for(StageKind::Fragment)) {
                (Some((vs_entry, vs)), Some((fs_entry, fs))) => {
                    let descriptor = wgpu::RenderPipelineDescriptor {
                        label: Some(&label),
                        layout: None,
                        vertex: wgpu::VertexState {
                            module: vs,
                            entry_point: Some(vs_entry),
                            buffers: target.vertex_buffers,
                            compilation_options: Default::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: fs,
                            entry_point: Some(fs_entry),
                            targets: &[Some(target.color_target)],
                            compilation_options: Default::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: target.topology,
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample: wgpu::MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    };
                    Some(Pipeline::Render(device.create_render_pipeline(&descriptor)))
                }
                _ => None,
            }
        }
        (ProgramRole::Simulation, _) => module_for(StageKind::Compute).map(|(entry, cs)| {
            Pipeline::Compute(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&label),
                layout: None,
                module: cs,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            }))
        }),
        (ProgramRole::Draw, None) => None,
    };

    let scope_error = pollster::block_on(device.pop_error_scope());

    // Stages and shader modules are released here on every path; only the
    // pipeline survives a successful link.
    drop(modules);
    drop(stages);

    match (pipeline, scope_error) {
        (Some(pipeline), None) => {
            log::info!("Linked {} program", role);
            Ok(Program {
                role,
                pipeline,
                interface,
            })
        }
        (_, Some(err)) => Err(fail(err.to_string())),
        (None, None) => Err(fail("missing stage for pipeline".to_string())),
    }
}
