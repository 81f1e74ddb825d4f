//! Uniform blocks and named uniform contracts for the post-process shaders.
//!
//! Each shader declares a [`UniformContract`]: the names, kinds and byte offsets of its uniform
//! block fields plus the texture slots it samples. Passes bind values by name through a
//! [`UniformTable`], which is validated and packed against the contract before upload.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

/// Fixed loop bound of the depth-of-field and Gaussian shaders.
pub const MAX_BLUR_SAMPLES: u32 = 50;
/// Fixed loop bound of the contact-shadow occlusion shader.
pub const MAX_SHADOW_SAMPLES: u32 = 100;
/// Fixed loop bound of the contact-shadow denoise shader.
pub const MAX_DENOISE_SAMPLES: u32 = 50;

/// Depth-of-field / Gaussian blur parameters, matching `BlurParams` in dof.wgsl and
/// gaussian_blur.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurParams {
    /// Logical surface size in pixels.
    pub size: [f32; 2],
    pub intensity: f32,
    /// Width of the in-focus band around `target_z`.
    pub dof: f32,
    /// Linear distance of the focus plane.
    pub target_z: f32,
    pub near: f32,
    pub far: f32,
    pub num_samples: i32,
    /// 0 = horizontal, 1 = vertical. Ignored by the depth-of-field shader.
    pub direction: i32,
    pub _pad: [f32; 3],
}

impl BlurParams {
    pub fn to_table(&self) -> UniformTable {
        UniformTable::new()
            .with("size", UniformValue::Vec2(self.size))
            .with("intensity", UniformValue::Float(self.intensity))
            .with("dof", UniformValue::Float(self.dof))
            .with("target_z", UniformValue::Float(self.target_z))
            .with("near", UniformValue::Float(self.near))
            .with("far", UniformValue::Float(self.far))
            .with("num_samples", UniformValue::Int(self.num_samples))
            .with("direction", UniformValue::Int(self.direction))
    }
}

/// Contact-shadow parameters, matching `ContactShadowParams` in contact_shadow.wgsl and
/// contact_shadow_denoise.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ContactShadowParams {
    pub proj_info: [f32; 4],
    pub size: [f32; 2],
    pub near: f32,
    pub far: f32,
    pub search_radius: f32,
    pub intensity: f32,
    pub exponent: f32,
    pub bias: f32,
    pub num_samples: i32,
    /// Denoise disk radius in pixels.
    pub blur_radius: f32,
    pub num_blur_samples: i32,
    pub _pad: f32,
}

impl ContactShadowParams {
    pub fn to_table(&self) -> UniformTable {
        UniformTable::new()
            .with("proj_info", UniformValue::Vec4(self.proj_info))
            .with("size", UniformValue::Vec2(self.size))
            .with("near", UniformValue::Float(self.near))
            .with("far", UniformValue::Float(self.far))
            .with("search_radius", UniformValue::Float(self.search_radius))
            .with("intensity", UniformValue::Float(self.intensity))
            .with("exponent", UniformValue::Float(self.exponent))
            .with("bias", UniformValue::Float(self.bias))
            .with("num_samples", UniformValue::Int(self.num_samples))
            .with("blur_radius", UniformValue::Float(self.blur_radius))
            .with("num_blur_samples", UniformValue::Int(self.num_blur_samples))
    }
}

// ============================================================
// Named uniform tables
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec4,
}

impl UniformKind {
    pub const fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
        }
    }

    fn write(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
        }
    }
}

/// Ordered name → value mapping. Setting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformTable {
    entries: Vec<(&'static str, UniformValue)>,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: UniformValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: UniformValue) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================
// Shader contracts
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: UniformKind,
    pub offset: usize,
}

const fn field(name: &'static str, kind: UniformKind, offset: usize) -> UniformField {
    UniformField { name, kind, offset }
}

/// How a texture slot is declared in WGSL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// `texture_2d<f32>`, sampled with the linear sampler.
    Color,
    /// `texture_depth_2d`, sampled with the nearest sampler.
    Depth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: &'static str,
    pub kind: TextureKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("{contract}: no uniform named `{name}`")]
    UnknownUniform {
        contract: &'static str,
        name: String,
    },
    #[error("{contract}: uniform `{name}` expects {expected:?}, got {found:?}")]
    TypeMismatch {
        contract: &'static str,
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },
    #[error("{contract}: required uniform `{name}` was not supplied")]
    MissingUniform {
        contract: &'static str,
        name: &'static str,
    },
    #[error("{contract}: no texture slot named `{name}`")]
    UnknownTexture {
        contract: &'static str,
        name: String,
    },
    #[error("{contract}: texture slot `{name}` was not bound")]
    MissingTexture {
        contract: &'static str,
        name: &'static str,
    },
}

/// Declared interface of one fragment shader.
#[derive(Debug, PartialEq, Eq)]
pub struct UniformContract {
    pub label: &'static str,
    /// Byte size of the uniform block, including trailing padding.
    pub block_size: usize,
    pub fields: &'static [UniformField],
    /// Texture slots in binding order, starting at binding 1.
    pub textures: &'static [TextureSlot],
}

impl UniformContract {
    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate `table` and lay it out as the shader's uniform block.
    pub fn pack(&self, table: &UniformTable) -> Result<Vec<u8>, ContractError> {
        let mut block = vec![0u8; self.block_size];
        for (name, value) in table.iter() {
            let field = self.field(name).ok_or_else(|| ContractError::UnknownUniform {
                contract: self.label,
                name: name.to_string(),
            })?;
            if field.kind != value.kind() {
                return Err(ContractError::TypeMismatch {
                    contract: self.label,
                    name: name.to_string(),
                    expected: field.kind,
                    found: value.kind(),
                });
            }
            value.write(&mut block[field.offset..field.offset + field.kind.size()]);
        }

        if let Some(missing) = self.fields.iter().find(|f| table.get(f.name).is_none()) {
            return Err(ContractError::MissingUniform {
                contract: self.label,
                name: missing.name,
            });
        }
        Ok(block)
    }

    /// Order `names` by slot; every slot must be bound exactly by name.
    pub fn texture_order(&self, names: &[&str]) -> Result<Vec<usize>, ContractError> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.textures.iter().any(|slot| slot.name == **n))
        {
            return Err(ContractError::UnknownTexture {
                contract: self.label,
                name: unknown.to_string(),
            });
        }
        self.textures
            .iter()
            .map(|slot| {
                names
                    .iter()
                    .position(|n| *n == slot.name)
                    .ok_or(ContractError::MissingTexture {
                        contract: self.label,
                        name: slot.name,
                    })
            })
            .collect()
    }
}

const BLUR_FIELDS: &[UniformField] = &[
    field("size", UniformKind::Vec2, 0),
    field("intensity", UniformKind::Float, 8),
    field("dof", UniformKind::Float, 12),
    field("target_z", UniformKind::Float, 16),
    field("near", UniformKind::Float, 20),
    field("far", UniformKind::Float, 24),
    field("num_samples", UniformKind::Int, 28),
    field("direction", UniformKind::Int, 32),
];

const CONTACT_SHADOW_FIELDS: &[UniformField] = &[
    field("proj_info", UniformKind::Vec4, 0),
    field("size", UniformKind::Vec2, 16),
    field("near", UniformKind::Float, 24),
    field("far", UniformKind::Float, 28),
    field("search_radius", UniformKind::Float, 32),
    field("intensity", UniformKind::Float, 36),
    field("exponent", UniformKind::Float, 40),
    field("bias", UniformKind::Float, 44),
    field("num_samples", UniformKind::Int, 48),
    field("blur_radius", UniformKind::Float, 52),
    field("num_blur_samples", UniformKind::Int, 56),
];

pub const DOF_CONTRACT: UniformContract = UniformContract {
    label: "Depth of Field",
    block_size: std::mem::size_of::<BlurParams>(),
    fields: BLUR_FIELDS,
    textures: &[
        TextureSlot { name: "color", kind: TextureKind::Color },
        TextureSlot { name: "depth", kind: TextureKind::Depth },
    ],
};

pub const GAUSSIAN_CONTRACT: UniformContract = UniformContract {
    label: "Gaussian Blur",
    block_size: std::mem::size_of::<BlurParams>(),
    fields: BLUR_FIELDS,
    textures: &[
        TextureSlot { name: "color", kind: TextureKind::Color },
        TextureSlot { name: "depth", kind: TextureKind::Depth },
    ],
};

pub const CONTACT_SHADOW_CONTRACT: UniformContract = UniformContract {
    label: "Contact Shadow Occlusion",
    block_size: std::mem::size_of::<ContactShadowParams>(),
    fields: CONTACT_SHADOW_FIELDS,
    textures: &[TextureSlot { name: "depth", kind: TextureKind::Depth }],
};

pub const CONTACT_SHADOW_DENOISE_CONTRACT: UniformContract = UniformContract {
    label: "Contact Shadow Denoise",
    block_size: std::mem::size_of::<ContactShadowParams>(),
    fields: CONTACT_SHADOW_FIELDS,
    textures: &[
        TextureSlot { name: "color", kind: TextureKind::Color },
        TextureSlot { name: "depth", kind: TextureKind::Depth },
        TextureSlot { name: "occlusion", kind: TextureKind::Color },
    ],
};
