use crate::coords::SurfaceState;
use crate::input::PointerSnapshot;
use crate::shader::{CountRepr, UniformLocations, UniformSlot};

/// Values uploaded for one frame. Built fresh every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    /// Viewport in physical pixels.
    pub resolution: [f32; 2],
    /// Seconds.
    pub time: f32,
    pub movement: [f32; 2],
    /// Primary pointer in GPU pixel space.
    pub touch: [f32; 2],
    pub pointer_count: u32,
    /// Flattened `[x0, y0, x1, y1, ...]`.
    pub positions: Vec<f32>,
}

impl FrameUniforms {
    pub fn new(surface: &SurfaceState, time: f32, pointers: &PointerSnapshot) -> Self {
        let (w, h) = surface.physical_size();
        Self {
            resolution: [w as f32, h as f32],
            time,
            movement: pointers.movement.to_array(),
            touch: pointers.first.to_array(),
            pointer_count: u32::try_from(pointers.count).unwrap_or(u32::MAX),
            positions: pointers.positions.clone(),
        }
    }

    /// Packs the values into `block` at the resolved offsets.
    ///
    /// `block` is zeroed first. Positions beyond the shader's array length are
    /// dropped and the uploaded count is clamped to match.
    pub fn write_into(&self, locations: &UniformLocations, block: &mut [u8]) {
        block.fill(0);

        put(block, locations.resolution, bytemuck::bytes_of(&self.resolution));
        put(block, locations.time, bytemuck::bytes_of(&self.time));
        put(block, locations.movement, bytemuck::bytes_of(&self.movement));
        put(block, locations.touch, bytemuck::bytes_of(&self.touch));

        let slots = locations.pointers;
        let count = self.pointer_count.min(slots.len);
        let count_slot = locations.pointer_count;
        match locations.count_repr {
            CountRepr::Sint => put(block, count_slot, bytemuck::bytes_of(&(count as i32))),
            CountRepr::Uint => put(block, count_slot, bytemuck::bytes_of(&count)),
            CountRepr::Float => put(block, count_slot, bytemuck::bytes_of(&(count as f32))),
        }

        for (i, pair) in self.positions.chunks_exact(2).take(slots.len as usize).enumerate() {
            let offset = slots.offset + i as u32 * slots.stride;
            put(block, UniformSlot { offset }, bytemuck::cast_slice(pair));
        }
    }
}

fn put(block: &mut [u8], slot: UniformSlot, bytes: &[u8]) {
    let start = slot.offset as usize;
    if let Some(dst) = block.get_mut(start..start + bytes.len()) {
        dst.copy_from_slice(bytes);
    } else {
        log::warn!("uniform write at offset {start} overruns a {} byte block", block.len());
    }
}

/// Converts frame timestamps to shader time, never letting it decrease.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderTime {
    last: f32,
}

impl ShaderTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// `timestamp_ms / 1000`, clamped to the previous value. Non-finite
    /// timestamps repeat the previous value.
    pub fn advance(&mut self, timestamp_ms: f64) -> f32 {
        let t = (timestamp_ms / 1000.0) as f32;
        if t.is_finite() {
            self.last = self.last.max(t);
        }
        self.last
    }

    pub fn current(&self) -> f32 {
        self.last
    }
}
