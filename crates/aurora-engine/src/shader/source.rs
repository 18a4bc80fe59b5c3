/// Built-in vertex stage: passes the full-screen quad through untouched.
pub const VERTEX_SOURCE: &str = include_str!("shaders/fullscreen.wgsl");

/// Default fragment stage installed at setup.
pub const DEFAULT_FRAGMENT_SOURCE: &str = include_str!("shaders/aurora.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
