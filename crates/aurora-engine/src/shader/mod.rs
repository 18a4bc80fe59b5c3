//! Shader program lifecycle.
//!
//! Stages are compiled and validated on the CPU with naga; linking checks the
//! stage interface and resolves the uniform table by reflection. GPU objects
//! are only created once both steps succeeded. Device-side creation runs in
//! a validation error scope, so anything the device still rejects becomes a
//! link error instead of a panic.

mod compile;
mod link;
mod program;
mod source;

pub use compile::{compile_stage, test_compile, test_compile_with_limit, CompiledStage, ShaderStage};
pub use link::{
    default_max_block_size, link_stages, ArraySlot, CountRepr, UniformLocations, UniformSlot,
    UNIFORM_BINDING, UNIFORM_GROUP,
};
pub use program::ShaderProgram;
pub use source::{DEFAULT_FRAGMENT_SOURCE, FRAGMENT_ENTRY, VERTEX_ENTRY, VERTEX_SOURCE};
