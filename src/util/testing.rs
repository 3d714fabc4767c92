//! Test support: logging setup and a scripted behavior whose outcomes are
//! queued by the test.

use std::collections::VecDeque;
use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{
    Behavior, Blackboard, NodeRegistry, PayloadReader, PayloadWriter, PersistError,
    PersistResult, TickContext, TickResult,
};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

pub const SCRIPTED_TAG: &str = "scripted";

/// Returns queued outcomes in order, then `fallback` forever.
///
/// Every advance bumps `advanced:<node id>` on the blackboard so tests can
/// see which nodes ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scripted {
    pub outcomes: VecDeque<TickResult>,
    pub fallback: TickResult,
}

impl Default for Scripted {
    fn default() -> Self {
        Self::always(TickResult::Running)
    }
}

impl Scripted {
    pub fn new(outcomes: impl IntoIterator<Item = TickResult>, fallback: TickResult) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            fallback,
        }
    }

    pub fn always(result: TickResult) -> Self {
        Self::new(std::iter::empty(), result)
    }
}

fn result_code(result: TickResult) -> i32 {
    match result {
        TickResult::Success => 0,
        TickResult::Failed => 1,
        TickResult::Running => 2,
    }
}

fn result_from_code(code: i32) -> PersistResult<TickResult> {
    match code {
        0 => Ok(TickResult::Success),
        1 => Ok(TickResult::Failed),
        2 => Ok(TickResult::Running),
        other => Err(PersistError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bad scripted outcome {}", other),
        ))),
    }
}

impl Behavior for Scripted {
    fn type_tag(&self) -> &str {
        SCRIPTED_TAG
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        *ctx.blackboard.entry(advanced_key(ctx.node)).or_insert(0) += 1;
        self.outcomes.pop_front().unwrap_or(self.fallback)
    }

    fn save(&self, w: &mut PayloadWriter) -> PersistResult<()> {
        w.write_i32(result_code(self.fallback))?;
        w.write_len(self.outcomes.len())?;
        for &outcome in &self.outcomes {
            w.write_i32(result_code(outcome))?;
        }
        Ok(())
    }

    fn load(&mut self, r: &mut PayloadReader<'_>) -> PersistResult<()> {
        self.fallback = result_from_code(r.read_i32()?)?;
        let count = r.read_len()?;
        self.outcomes.clear();
        for _ in 0..count {
            self.outcomes.push_back(result_from_code(r.read_i32()?)?);
        }
        Ok(())
    }
}

fn advanced_key(id: i32) -> String {
    format!("advanced:{}", id)
}

/// How often node `id` was advanced.
pub fn advances(blackboard: &Blackboard, id: i32) -> i32 {
    blackboard.get(&advanced_key(id)).copied().unwrap_or(0)
}

/// Built-ins plus [`Scripted`].
pub fn testing_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    registry.register(SCRIPTED_TAG, || Box::new(Scripted::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
    }

    #[test]
    fn given_queued_outcomes_when_advancing_then_fallback_after_queue() {
        let mut bb = Blackboard::new();
        let mut scripted = Scripted::new([TickResult::Failed], TickResult::Success);
        let mut ctx = TickContext {
            tick: 1,
            node: 7,
            blackboard: &mut bb,
        };
        assert_eq!(scripted.advance(&mut ctx), TickResult::Failed);
        assert_eq!(scripted.advance(&mut ctx), TickResult::Success);
        assert_eq!(advances(&bb, 7), 2);
    }
}
