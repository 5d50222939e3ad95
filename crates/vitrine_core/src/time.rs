use std::time::Duration;

/// Fixed-timestep accumulator for the physics step.
#[derive(Debug, Clone)]
pub struct PhysicsTime {
    pub accumulator: f32,
    pub fixed_dt: f32,
    /// Upper bound on catch-up steps per frame, so a long stall cannot spiral.
    pub max_steps: u32,
}

impl Default for PhysicsTime {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

impl PhysicsTime {
    pub fn new(fixed_dt: f32) -> Self {
        Self {
            accumulator: 0.0,
            fixed_dt,
            max_steps: 5,
        }
    }

    /// Feeds a frame delta and returns how many fixed steps are due.
    pub fn steps_for(&mut self, delta: Duration) -> u32 {
        self.accumulator += delta.as_secs_f32();
        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < self.max_steps {
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }
        if steps == self.max_steps {
            // drop the backlog instead of carrying it into the next frame
            self.accumulator = self.accumulator.min(self.fixed_dt);
        }
        steps
    }
}
