//! Session service
//!
//! Persists containers to session files and drives saved sessions forward.
//! The blackboard is not part of the session layout; it lives next to the
//! session file as `<session>.board.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, StoryScript};
use crate::domain::{
    BinaryReader, BinaryWriter, Blackboard, Container, Lifecycle, LoadReport, NodeId,
    NodeRegistry, TickResult,
};
use crate::infrastructure::traits::FileSystem;
use crate::tree_traits::TreeNodeConvert;

/// Result of [`SessionService::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks actually performed
    pub ticks: u64,
    /// Result of the last tick, `None` if no tick ran
    pub last: Option<TickResult>,
    /// True when the session was ended during this run
    pub finished: bool,
    pub active_ids: Vec<NodeId>,
    pub load: LoadReport,
}

/// Read-only view of a saved session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub was_running: bool,
    /// Rendered topology (snapshot while running)
    pub tree: String,
    pub active_ids: Vec<NodeId>,
    pub load: LoadReport,
}

/// Service for saving, loading and advancing session files.
pub struct SessionService {
    fs: Arc<dyn FileSystem>,
    registry: Arc<NodeRegistry>,
}

impl SessionService {
    /// Create a new session service.
    pub fn new(fs: Arc<dyn FileSystem>, registry: Arc<NodeRegistry>) -> Self {
        Self { fs, registry }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Sidecar file holding the blackboard of a session.
    pub fn blackboard_path(session: &Path) -> PathBuf {
        session.with_extension("board.toml")
    }

    /// Serializes a container into the session layout.
    pub fn encode(container: &Container) -> ApplicationResult<Vec<u8>> {
        let mut w = BinaryWriter::buffer();
        container.save(&mut w)?;
        Ok(w.into_inner())
    }

    /// Restores a container from session bytes.
    pub fn decode(&self, bytes: &[u8]) -> ApplicationResult<(Container, LoadReport)> {
        let mut container = Container::new();
        let report = container.load(&mut BinaryReader::new(bytes), &self.registry)?;
        Ok((container, report))
    }

    #[instrument(level = "debug", skip(self, container))]
    pub fn save(&self, path: &Path, container: &Container) -> ApplicationResult<()> {
        let bytes = Self::encode(container)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create session directory", path)?;
        self.fs
            .write(path, &bytes)
            .with_path_context("write session", path)?;
        debug!("save: {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<(Container, LoadReport)> {
        if !self.fs.exists(path) {
            return Err(ApplicationError::SessionNotFound(path.to_path_buf()));
        }
        let bytes = self.fs.read(path).with_path_context("read session", path)?;
        self.decode(&bytes)
    }

    /// Builds a fresh idle session from a story script.
    ///
    /// Refuses to replace an existing session unless `force` is set; a stale
    /// blackboard from a previous session is discarded.
    #[instrument(level = "debug", skip(self, script))]
    pub fn create(&self, path: &Path, script: &StoryScript, force: bool) -> ApplicationResult<usize> {
        if self.fs.exists(path) && !force {
            return Err(ApplicationError::SessionExists(path.to_path_buf()));
        }
        let container = script.build(&self.registry)?;
        self.save(path, &container)?;

        let board = Self::blackboard_path(path);
        if self.fs.exists(&board) {
            self.fs
                .remove_file(&board)
                .with_path_context("remove blackboard", &board)?;
        }
        info!(roots = container.len(), "session created: {}", path.display());
        Ok(container.len())
    }

    /// Loads the blackboard sidecar; an absent file is an empty board.
    pub fn load_blackboard(&self, session: &Path) -> ApplicationResult<Blackboard> {
        let path = Self::blackboard_path(session);
        if !self.fs.exists(&path) {
            return Ok(Blackboard::new());
        }
        let bytes = self.fs.read(&path).with_path_context("read blackboard", &path)?;
        let text = String::from_utf8(bytes).map_err(|e| ApplicationError::OperationFailed {
            context: format!("decode blackboard {}", path.display()),
            source: Box::new(e),
        })?;
        toml::from_str(&text).map_err(|e| ApplicationError::OperationFailed {
            context: format!("parse blackboard {}", path.display()),
            source: Box::new(e),
        })
    }

    pub fn save_blackboard(&self, session: &Path, blackboard: &Blackboard) -> ApplicationResult<()> {
        let path = Self::blackboard_path(session);
        let text = toml::to_string(blackboard).map_err(|e| ApplicationError::OperationFailed {
            context: format!("serialize blackboard {}", path.display()),
            source: Box::new(e),
        })?;
        self.fs
            .ensure_parent(&path)
            .with_path_context("create session directory", &path)?;
        self.fs
            .write(&path, text.as_bytes())
            .with_path_context("write blackboard", &path)
    }

    /// Loads a session, starts it if idle, ticks up to `max_ticks` times and
    /// saves it back together with its blackboard.
    ///
    /// With `stop_when_empty`, a tick reporting `Success` ends the session
    /// (restoring its pre-run topology) and stops the loop.
    #[instrument(level = "debug", skip(self))]
    pub fn run(
        &self,
        path: &Path,
        max_ticks: u64,
        stop_when_empty: bool,
    ) -> ApplicationResult<RunSummary> {
        let (mut container, load) = self.load(path)?;
        let mut blackboard = self.load_blackboard(path)?;

        if !container.is_active() {
            container.start();
        }

        let mut ticks = 0;
        let mut last = None;
        let mut finished = false;
        while ticks < max_ticks {
            let result = container.tick(&mut blackboard);
            ticks += 1;
            last = Some(result);
            if result == TickResult::Success && stop_when_empty {
                container.end();
                finished = true;
                break;
            }
        }
        info!(ticks, finished, active = container.len(), "run complete");

        self.save(path, &container)?;
        self.save_blackboard(path, &blackboard)?;

        Ok(RunSummary {
            ticks,
            last,
            finished,
            active_ids: container.active_ids(),
            load,
        })
    }

    /// Ends a running session, restoring its pre-run topology.
    ///
    /// Returns `false` (and writes nothing) if the session was not running.
    #[instrument(level = "debug", skip(self))]
    pub fn stop(&self, path: &Path) -> ApplicationResult<bool> {
        let (mut container, _) = self.load(path)?;
        if !container.is_active() {
            return Ok(false);
        }
        container.end();
        self.save(path, &container)?;
        Ok(true)
    }

    pub fn inspect(&self, path: &Path) -> ApplicationResult<SessionView> {
        let (container, load) = self.load(path)?;
        Ok(SessionView {
            was_running: load.was_running,
            tree: container.to_tree_string().to_string(),
            active_ids: container.active_ids(),
            load,
        })
    }
}
