use bevy_ecs::prelude::Resource;

/// Simulation clock advanced once per tick by the host loop. Watchdog
/// deadlines are expressed against this clock, not wall time, so timer
/// behavior is reproducible under test.
#[derive(Resource)]
pub struct TickClock {
    tick: u64,
    elapsed: f64,
}

impl TickClock {
    pub fn new() -> Self {
        Self { tick: 0, elapsed: 0.0 }
    }
    pub fn advance(&mut self, dt: f32) {
        self.tick += 1;
        self.elapsed += dt.max(0.0) as f64;
    }
    pub fn tick(&self) -> u64 {
        self.tick
    }
    pub fn seconds(&self) -> f64 {
        self.elapsed
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
