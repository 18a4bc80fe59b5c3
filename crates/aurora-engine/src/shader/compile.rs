use std::fmt;

use wgpu::naga;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::EngineError;

use super::link::{default_max_block_size, link_stages};
use super::source::{FRAGMENT_ENTRY, VERTEX_ENTRY, VERTEX_SOURCE};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point name every source for this stage must define.
    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => VERTEX_ENTRY,
            ShaderStage::Fragment => FRAGMENT_ENTRY,
        }
    }

    pub(crate) fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A stage that parsed and validated.
///
/// Keeps the IR for reflection at link time and the source text for the GPU
/// module.
#[derive(Debug)]
pub struct CompiledStage {
    stage: ShaderStage,
    source: String,
    module: naga::Module,
}

impl CompiledStage {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn entry_point(&self) -> Option<&naga::EntryPoint> {
        let stage = self.stage.naga_stage();
        let name = self.stage.entry_point();
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.stage == stage && ep.name == name)
    }
}

/// Parses and validates one stage.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, EngineError> {
    let compile_error = |diagnostic: String| EngineError::Compile { stage, diagnostic };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| compile_error(err.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| compile_error(error_chain(err.as_inner())))?;

    let compiled = CompiledStage {
        stage,
        source: source.to_owned(),
        module,
    };

    if compiled.entry_point().is_none() {
        return Err(compile_error(format!(
            "missing @{stage} entry point `{}`",
            stage.entry_point()
        )));
    }

    Ok(compiled)
}

/// Validates a candidate fragment source in isolation.
///
/// The candidate is compiled into a throwaway stage and link-checked against
/// the built-in vertex stage, then dropped. Returns `None` when the source
/// would link on a device with default limits, the diagnostic otherwise.
pub fn test_compile(fragment_source: &str) -> Option<String> {
    test_compile_with_limit(fragment_source, default_max_block_size())
}

/// Like [`test_compile`] for a device that binds at most `max_block_size`
/// uniform bytes.
pub fn test_compile_with_limit(fragment_source: &str, max_block_size: u32) -> Option<String> {
    let checked = compile_stage(ShaderStage::Vertex, VERTEX_SOURCE).and_then(|vertex| {
        let candidate = compile_stage(ShaderStage::Fragment, fragment_source)?;
        link_stages(&vertex, &candidate, max_block_size)
    });
    checked.err().map(|err| err.to_string())
}

/// Renders an error and its sources, one per line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
