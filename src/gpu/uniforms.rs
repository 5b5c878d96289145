//! Uniform blocks resolved by name.
//!
//! A linked program exposes the layout of its single uniform block, reflected
//! from the shader module at link time. Stages write values into a
//! [`UniformBlock`] by field name and upload the bytes once per frame; names are
//! looked up in the cached layout, never re-resolved against the shader.

use std::collections::HashMap;
use std::fmt;

use glam::{Mat4, Vec2, Vec4};

/// Supported uniform value types.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    U32(u32),
    Vec2(Vec2),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    /// The field kind this value can be written to.
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::U32(_) => UniformKind::U32,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            UniformValue::F32(v) => bytemuck::bytes_of(v),
            UniformValue::U32(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::U32(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::U32(v as u32)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Type of a uniform block field as declared in WGSL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    U32,
    I32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// Anything the block writer cannot fill (arrays, nested structs, ...).
    Other,
}

impl UniformKind {
    fn from_naga(inner: &naga::TypeInner) -> Self {
        use naga::{Scalar, ScalarKind, TypeInner, VectorSize};

        match *inner {
            TypeInner::Scalar(Scalar { kind: ScalarKind::Float, width: 4 }) => UniformKind::F32,
            TypeInner::Scalar(Scalar { kind: ScalarKind::Uint, width: 4 }) => UniformKind::U32,
            TypeInner::Scalar(Scalar { kind: ScalarKind::Sint, width: 4 }) => UniformKind::I32,
            TypeInner::Vector {
                size,
                scalar: Scalar { kind: ScalarKind::Float, width: 4 },
            } => match size {
                VectorSize::Bi => UniformKind::Vec2,
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
            },
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar: Scalar { kind: ScalarKind::Float, width: 4 },
            } => UniformKind::Mat4,
            _ => UniformKind::Other,
        }
    }

    fn byte_size(self) -> u32 {
        match self {
            UniformKind::F32 | UniformKind::U32 | UniformKind::I32 => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::Other => 0,
        }
    }
}

/// Cached location of one field inside the uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Layout of a program's uniform block: its binding and every named field.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformLayout {
    group: u32,
    binding: u32,
    size: u32,
    fields: HashMap<String, UniformLocation>,
}

impl UniformLayout {
    /// Reflects the uniform block declared by a module.
    ///
    /// Returns `Ok(None)` when the module declares no uniforms and an error when
    /// it declares more than one block.
    pub fn reflect(module: &naga::Module) -> Result<Option<Self>, String> {
        let uniforms: Vec<&naga::GlobalVariable> = module
            .global_variables
            .iter()
            .map(|(_, var)| var)
            .filter(|var| var.space == naga::AddressSpace::Uniform)
            .collect();

        let var = match uniforms.as_slice() {
            [] => return Ok(None),
            [var] => *var,
            many => {
                return Err(format!(
                    "{} uniform blocks declared, only one is supported per program",
                    many.len()
                ))
            }
        };

        let name = var.name.clone().unwrap_or_default();
        let binding = var
            .binding
            .as_ref()
            .ok_or_else(|| format!("uniform `{}` has no @group/@binding", name))?;

        let mut fields = HashMap::new();
        let size = match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span } => {
                for member in members {
                    if let Some(member_name) = &member.name {
                        let kind = UniformKind::from_naga(&module.types[member.ty].inner);
                        fields.insert(
                            member_name.clone(),
                            UniformLocation {
                                offset: member.offset,
                                kind,
                            },
                        );
                    }
                }
                *span
            }
            inner => {
                let kind = UniformKind::from_naga(inner);
                fields.insert(name, UniformLocation { offset: 0, kind });
                kind.byte_size()
            }
        };

        Ok(Some(Self {
            group: binding.group,
            binding: binding.binding,
            size,
            fields,
        }))
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Size of the GPU buffer backing this block, rounded up to 16 bytes.
    pub fn buffer_size(&self) -> u64 {
        ((self.size as u64) + 15) & !15
    }

    /// Resolves a field by name.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.fields.get(name).copied()
    }

    /// Iterate over field names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Why a uniform write was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformError {
    /// No field with that name in the block.
    UnknownName(String),
    /// The field exists but has a different type.
    TypeMismatch {
        name: String,
        declared: UniformKind,
        given: UniformKind,
    },
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformError::UnknownName(name) => write!(f, "no uniform named `{}`", name),
            UniformError::TypeMismatch { name, declared, given } => write!(
                f,
                "uniform `{}` is declared as {:?} but was given {:?}",
                name, declared, given
            ),
        }
    }
}

impl std::error::Error for UniformError {}

/// Host-side copy of a uniform block, written by name and uploaded as a whole.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.buffer_size() as usize];
        Self { layout, bytes }
    }

    /// Write a value into the named field.
    pub fn set<V: Into<UniformValue>>(&mut self, name: &str, value: V) -> Result<(), UniformError> {
        let value = value.into();
        let location = self
            .layout
            .location(name)
            .ok_or_else(|| UniformError::UnknownName(name.to_string()))?;
        if location.kind != value.kind() {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                declared: location.kind,
                given: value.kind(),
            });
        }

        let src = value.bytes();
        let start = location.offset as usize;
        match self.bytes.get_mut(start..start + src.len()) {
            Some(dst) => {
                dst.copy_from_slice(src);
                Ok(())
            }
            None => Err(UniformError::UnknownName(name.to_string())),
        }
    }

    /// Write a value, logging instead of failing. A bad name leaves the field unchanged.
    pub fn set_or_log<V: Into<UniformValue>>(&mut self, name: &str, value: V) {
        if let Err(err) = self.set(name, value) {
            log::error!("Uniform write failed: {}", err);
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
struct Params {
    screen_size: vec2<f32>,
    dt: f32,
    enabled: u32,
    color: vec4<f32>,
    projection: mat4x4<f32>,
}

@group(0) @binding(3)
var<uniform> params: Params;

@compute @workgroup_size(1)
fn main() {
    let x = params.dt;
}
"#;

    fn layout() -> UniformLayout {
        let module = naga::front::wgsl::parse_str(SOURCE).unwrap();
        UniformLayout::reflect(&module).unwrap().unwrap()
    }

    #[test]
    fn test_reflect_offsets() {
        let layout = layout();
        assert_eq!(layout.binding(), 3);
        assert_eq!(layout.group(), 0);
        assert_eq!(layout.location("screen_size").unwrap().offset, 0);
        assert_eq!(
            layout.location("dt").unwrap(),
            UniformLocation {
                offset: 8,
                kind: UniformKind::F32
            }
        );
        assert_eq!(layout.location("enabled").unwrap().kind, UniformKind::U32);
        assert_eq!(layout.location("color").unwrap().offset, 16);
        assert_eq!(
            layout.location("projection").unwrap(),
            UniformLocation {
                offset: 32,
                kind: UniformKind::Mat4
            }
        );
        assert_eq!(layout.size, 96);
        assert_eq!(layout.buffer_size(), 96);
        assert!(layout.location("missing").is_none());
    }

    #[test]
    fn test_no_uniforms() {
        let module =
            naga::front::wgsl::parse_str("@compute @workgroup_size(1) fn main() {}").unwrap();
        assert!(UniformLayout::reflect(&module).unwrap().is_none());
    }

    #[test]
    fn test_two_blocks_rejected() {
        let source = r#"
@group(0) @binding(0) var<uniform> a: vec4<f32>;
@group(0) @binding(1) var<uniform> b: vec4<f32>;
@compute @workgroup_size(1) fn main() {}
"#;
        let module = naga::front::wgsl::parse_str(source).unwrap();
        assert!(UniformLayout::reflect(&module).is_err());
    }

    #[test]
    fn test_block_writes_at_offsets() {
        let mut block = UniformBlock::new(layout());
        block.set("dt", 0.5f32).unwrap();
        block.set("enabled", true).unwrap();
        block.set("color", Vec4::new(1.0, 2.0, 3.0, 4.0)).unwrap();

        let bytes = block.bytes();
        let read_f32 = |at: usize| {
            f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        assert_eq!(read_f32(8), 0.5);
        assert_eq!(bytes[12..16], 1u32.to_le_bytes());
        assert_eq!([read_f32(16), read_f32(20), read_f32(24), read_f32(28)], [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_block_rejects_bad_writes() {
        let mut block = UniformBlock::new(layout());
        assert_eq!(
            block.set("nope", 1.0f32),
            Err(UniformError::UnknownName("nope".to_string()))
        );
        assert!(matches!(
            block.set("dt", Vec2::ONE),
            Err(UniformError::TypeMismatch { .. })
        ));
        // Logged, not fatal.
        block.set_or_log("nope", 1.0f32);
        assert!(block.bytes().iter().all(|b| *b == 0));
    }
}
