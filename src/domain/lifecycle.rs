//! Generic start/update/end lifecycle that the container specializes.

use std::io::{Read, Write};

use tracing::debug;

use crate::domain::behavior::Blackboard;
use crate::domain::codec::{BinaryReader, BinaryWriter};
use crate::domain::error::PersistResult;
use crate::domain::outcome::TickResult;

/// Base state shared by every lifecycle owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleState {
    running: bool,
    ticks: u64,
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ticks since the most recent start or load; never persisted.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn begin(&mut self) {
        self.running = true;
        self.ticks = 0;
    }

    fn finish(&mut self) {
        self.running = false;
    }

    fn next_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// Base save hook. The base contributes no bytes to the session layout.
    pub fn on_saved<W: Write>(&self, _w: &mut BinaryWriter<W>) -> PersistResult<()> {
        Ok(())
    }

    /// Base load hook: back to idle with a fresh tick counter.
    pub fn on_loaded<R: Read>(&mut self, _r: &mut BinaryReader<R>) -> PersistResult<()> {
        *self = Self::default();
        Ok(())
    }

    /// Marks a restored owner as mid-run without invoking any start hook.
    /// The tick counter stays at the zero `on_loaded` left it at.
    pub fn resume(&mut self) {
        self.running = true;
    }
}

/// Start/update/end protocol.
///
/// Implementors supply the hooks; the provided methods keep the base state
/// and the hooks in a fixed order: `start` runs `on_start` before the base
/// flips to running, `end` flips the base to idle before `on_end`.
pub trait Lifecycle {
    fn state(&self) -> &LifecycleState;

    fn state_mut(&mut self) -> &mut LifecycleState;

    fn on_start(&mut self) {}

    fn on_update(&mut self, blackboard: &mut Blackboard) -> TickResult;

    fn on_end(&mut self) {}

    fn is_active(&self) -> bool {
        self.state().is_running()
    }

    /// No-op when already running.
    fn start(&mut self) {
        if self.is_active() {
            debug!("start ignored: already running");
            return;
        }
        self.on_start();
        self.state_mut().begin();
    }

    /// One update, without any implicit start or end.
    fn tick(&mut self, blackboard: &mut Blackboard) -> TickResult {
        let tick = self.state_mut().next_tick();
        let result = self.on_update(blackboard);
        debug!(tick, %result, "tick");
        result
    }

    /// No-op when idle.
    fn end(&mut self) {
        if !self.is_active() {
            debug!("end ignored: not running");
            return;
        }
        self.state_mut().finish();
        self.on_end();
    }

    /// Host-loop convenience: start when idle, tick once, end on a terminal result.
    fn step(&mut self, blackboard: &mut Blackboard) -> TickResult {
        if !self.is_active() {
            self.start();
        }
        let result = self.tick(blackboard);
        if result.is_terminal() {
            self.end();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Countdown {
        state: LifecycleState,
        remaining: u32,
        log: Vec<&'static str>,
    }

    impl Lifecycle for Countdown {
        fn state(&self) -> &LifecycleState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut LifecycleState {
            &mut self.state
        }

        fn on_start(&mut self) {
            self.log.push("start");
        }

        fn on_update(&mut self, _blackboard: &mut Blackboard) -> TickResult {
            self.log.push("update");
            if self.remaining == 0 {
                return TickResult::Success;
            }
            self.remaining -= 1;
            TickResult::Running
        }

        fn on_end(&mut self) {
            self.log.push("end");
        }
    }

    #[test]
    fn given_idle_owner_when_stepping_to_completion_then_hooks_run_in_order() {
        let mut owner = Countdown {
            remaining: 1,
            ..Default::default()
        };
        let mut bb = Blackboard::new();

        assert_eq!(owner.step(&mut bb), TickResult::Running);
        assert!(owner.is_active());
        assert_eq!(owner.step(&mut bb), TickResult::Success);
        assert!(!owner.is_active());
        assert_eq!(owner.log, vec!["start", "update", "update", "end"]);
    }

    #[test]
    fn given_running_owner_when_starting_again_then_start_hook_not_repeated() {
        let mut owner = Countdown::default();
        owner.start();
        owner.start();
        assert_eq!(owner.log, vec!["start"]);
    }

    #[test]
    fn given_idle_owner_when_ending_then_end_hook_skipped() {
        let mut owner = Countdown::default();
        owner.end();
        assert!(owner.log.is_empty());
    }

    #[test]
    fn given_started_owner_when_ticking_then_counter_advances_and_resets_on_restart() {
        let mut owner = Countdown {
            remaining: 5,
            ..Default::default()
        };
        let mut bb = Blackboard::new();
        owner.start();
        owner.tick(&mut bb);
        owner.tick(&mut bb);
        assert_eq!(owner.state().ticks(), 2);
        owner.end();
        owner.start();
        assert_eq!(owner.state().ticks(), 0);
    }
}
