use wgpu::naga;
use naga::{AddressSpace, ArraySize, Binding, Handle, Module, Scalar, Type, TypeInner, VectorSize};

use crate::error::EngineError;

use super::compile::CompiledStage;

/// Bind group of the uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Binding slot of the uniform block.
pub const UNIFORM_BINDING: u32 = 0;

/// Byte offset of a scalar or vector member inside the uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlot {
    pub offset: u32,
}

/// Fixed-length array member holding one position per element (`xy`).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ArraySlot {
    pub offset: u32,
    pub stride: u32,
    pub len: u32,
}

/// How the shader declared `pointer_count`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CountRepr {
    Sint,
    Uint,
    Float,
}

/// Uniform locations resolved at link time.
///
/// Every field is required; a table is either complete or not produced.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformLocations {
    pub resolution: UniformSlot,
    pub time: UniformSlot,
    pub movement: UniformSlot,
    pub touch: UniformSlot,
    pub pointer_count: UniformSlot,
    pub count_repr: CountRepr,
    pub pointers: ArraySlot,

    /// Size of the whole block in bytes.
    pub block_size: u32,
}

/// Largest uniform block a device created with default limits can bind.
pub fn default_max_block_size() -> u32 {
    wgpu::Limits::default().max_uniform_buffer_binding_size
}

/// Checks that two compiled stages form a usable program and resolves the
/// uniform table from the fragment stage.
///
/// `max_block_size` is the device's uniform binding limit in bytes.
pub fn link_stages(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
    max_block_size: u32,
) -> Result<UniformLocations, EngineError> {
    let link = |msg: String| EngineError::Link(msg);

    let vs = vertex.entry_point().ok_or_else(|| {
        link(format!(
            "vertex stage has no `{}` entry point",
            vertex.stage().entry_point()
        ))
    })?;
    let fs = fragment.entry_point().ok_or_else(|| {
        link(format!(
            "fragment stage has no `{}` entry point",
            fragment.stage().entry_point()
        ))
    })?;

    check_resources(vertex.module(), false)?;
    let block = check_resources(fragment.module(), true)?
        .ok_or_else(|| link("fragment stage declares no uniform block".to_string()))?;

    // Varyings: every fragment input location must be produced by the vertex
    // stage with an identical type and interpolation.
    let mut produced = Vec::new();
    if let Some(result) = &vs.function.result {
        collect_locations(vertex.module(), result.ty, result.binding.as_ref(), &mut produced);
    }
    let mut consumed = Vec::new();
    for arg in &fs.function.arguments {
        collect_locations(fragment.module(), arg.ty, arg.binding.as_ref(), &mut consumed);
    }
    for (binding, inner) in &consumed {
        let Binding::Location { location, .. } = binding else { continue };
        let matched = produced.iter().any(|(b, i)| b == binding && i == inner);
        if !matched {
            return Err(link(format!(
                "fragment input @location({location}) is not produced by the vertex stage"
            )));
        }
    }

    let mut outputs = Vec::new();
    if let Some(result) = &fs.function.result {
        collect_locations(fragment.module(), result.ty, result.binding.as_ref(), &mut outputs);
    }
    // The color target has four float channels.
    match outputs.as_slice() {
        [(Binding::Location { location: 0, .. }, inner)] if is_vector(inner, VectorSize::Quad) => {}
        _ => {
            return Err(link(
                "fragment stage must write a single vec4<f32> to @location(0)".to_string(),
            ));
        }
    }

    let locations = resolve_locations(fragment.module(), block)?;
    if locations.block_size > max_block_size {
        return Err(link(format!(
            "uniform block is {} bytes; the device binds at most {max_block_size}",
            locations.block_size
        )));
    }
    Ok(locations)
}

/// Only one resource is supported: the uniform block at
/// `@group(0) @binding(0)`. Returns its type when present.
fn check_resources(
    module: &Module,
    allow_block: bool,
) -> Result<Option<Handle<Type>>, EngineError> {
    let mut block = None;

    for (_, var) in module.global_variables.iter() {
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        match var.space {
            AddressSpace::Uniform => {
                let at_slot = var
                    .binding
                    .as_ref()
                    .is_some_and(|rb| rb.group == UNIFORM_GROUP && rb.binding == UNIFORM_BINDING);
                if !allow_block || !at_slot || block.is_some() {
                    return Err(EngineError::Link(format!(
                        "uniform `{name}` must be the only one and live at \
                         @group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING})"
                    )));
                }
                block = Some(var.ty);
            }
            AddressSpace::Handle | AddressSpace::Storage { .. } => {
                return Err(EngineError::Link(format!(
                    "resource `{name}` is not supported; only the uniform block is bound"
                )));
            }
            _ => {}
        }
    }

    Ok(block)
}

fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<(Binding, TypeInner)>,
) {
    match binding {
        Some(b @ Binding::Location { .. }) => {
            out.push((b.clone(), module.types[ty].inner.clone()));
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn resolve_locations(
    module: &Module,
    block: Handle<Type>,
) -> Result<UniformLocations, EngineError> {
    let TypeInner::Struct { members, span } = &module.types[block].inner else {
        return Err(EngineError::Link("uniform block must be a struct".to_string()));
    };

    let member = |name: &str| {
        members
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .map(|m| (m.offset, &module.types[m.ty].inner))
            .ok_or_else(|| EngineError::Link(format!("uniform `{name}` is missing")))
    };
    let wrong_type = |name: &str, expected: &str| {
        EngineError::Link(format!("uniform `{name}` must be {expected}"))
    };

    let vec2_slot = |name: &str| -> Result<UniformSlot, EngineError> {
        let (offset, inner) = member(name)?;
        if is_vector(inner, VectorSize::Bi) {
            Ok(UniformSlot { offset })
        } else {
            Err(wrong_type(name, "vec2<f32>"))
        }
    };

    let resolution = vec2_slot("resolution")?;
    let movement = vec2_slot("movement")?;
    let touch = vec2_slot("touch")?;

    let time = match member("time")? {
        (offset, TypeInner::Scalar(s)) if *s == Scalar::F32 => UniformSlot { offset },
        _ => return Err(wrong_type("time", "f32")),
    };

    let (offset, inner) = member("pointer_count")?;
    let count_repr = match inner {
        TypeInner::Scalar(s) if *s == Scalar::I32 => CountRepr::Sint,
        TypeInner::Scalar(s) if *s == Scalar::U32 => CountRepr::Uint,
        TypeInner::Scalar(s) if *s == Scalar::F32 => CountRepr::Float,
        _ => return Err(wrong_type("pointer_count", "i32, u32 or f32")),
    };
    let pointer_count = UniformSlot { offset };

    // Uniform arrays have a 16-byte stride, so only vec4 elements qualify.
    let pointers = match member("pointers")? {
        (
            offset,
            TypeInner::Array {
                base,
                size: ArraySize::Constant(len),
                stride,
            },
        ) if is_vector(&module.types[*base].inner, VectorSize::Quad) => ArraySlot {
            offset,
            stride: *stride,
            len: len.get(),
        },
        _ => return Err(wrong_type("pointers", "a fixed-size array of vec4<f32>")),
    };

    Ok(UniformLocations {
        resolution,
        time,
        movement,
        touch,
        pointer_count,
        count_repr,
        pointers,
        block_size: *span,
    })
}

fn is_vector(inner: &TypeInner, size: VectorSize) -> bool {
    matches!(inner, TypeInner::Vector { size: s, scalar } if *s == size && *scalar == Scalar::F32)
}
