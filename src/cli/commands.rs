//! Command dispatch: one handler per subcommand.

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, IoResultExt, SessionService, StoryScript};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::NodeRegistry;
use crate::infrastructure::{FileSystem, RealFileSystem};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(?settings, "effective settings");
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let service = SessionService::new(fs.clone(), Arc::new(NodeRegistry::with_builtins()));

    match command {
        Commands::New {
            session,
            script,
            force,
        } => cmd_new(&service, fs.as_ref(), &settings, session, script, *force),
        Commands::Run {
            session,
            ticks,
            keep_running,
        } => cmd_run(&service, &settings, session, *ticks, *keep_running),
        Commands::Stop { session } => cmd_stop(&service, &settings, session),
        Commands::Inspect { session } => cmd_inspect(&service, &settings, session),
        Commands::Config { command } => cmd_config(&settings, cli.config.as_deref(), command),
        Commands::Completion { .. } => Ok(()),
    }
}

#[instrument(skip(service, fs, settings))]
fn cmd_new(
    service: &SessionService,
    fs: &dyn FileSystem,
    settings: &Settings,
    session: &str,
    script: &Path,
    force: bool,
) -> CliResult<()> {
    let path = settings.resolve_save_path(session);
    let bytes = fs.read(script).with_path_context("read story script", script)?;
    let text = String::from_utf8(bytes).map_err(|e| ApplicationError::InvalidScript {
        message: format!("{}: {}", script.display(), e),
    })?;
    let script = StoryScript::parse(&text)?;
    let roots = service.create(&path, &script, force)?;
    output::action("Created", &format!("{} ({} root nodes)", path.display(), roots));
    Ok(())
}

#[instrument(skip(service, settings))]
fn cmd_run(
    service: &SessionService,
    settings: &Settings,
    session: &str,
    ticks: Option<u64>,
    keep_running: bool,
) -> CliResult<()> {
    let ticks = ticks.unwrap_or(settings.max_ticks);
    if ticks == 0 {
        return Err(CliError::InvalidArgs("--ticks must be at least 1".into()));
    }
    let path = settings.resolve_save_path(session);
    let summary = service.run(&path, ticks, settings.stop_when_empty && !keep_running)?;

    if summary.load.placeholders > 0 {
        output::warning(&format!(
            "{} node(s) of unknown type were loaded as placeholders",
            summary.load.placeholders
        ));
    }
    if !summary.load.dropped_ids.is_empty() {
        output::warning(&format!(
            "running node ids not found in the story: {:?}",
            summary.load.dropped_ids
        ));
    }

    let last = summary
        .last
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".into());
    if summary.finished {
        output::success(&format!("story finished after {} tick(s)", summary.ticks));
    } else {
        output::action(
            "Ran",
            &format!("{} tick(s), last result: {}", summary.ticks, last),
        );
        output::detail(&format!("active: {:?}", summary.active_ids));
    }
    Ok(())
}

#[instrument(skip(service, settings))]
fn cmd_stop(service: &SessionService, settings: &Settings, session: &str) -> CliResult<()> {
    let path = settings.resolve_save_path(session);
    if service.stop(&path)? {
        output::action("Stopped", &path.display());
    } else {
        output::warning(&format!("session is not running: {}", path.display()));
    }
    Ok(())
}

#[instrument(skip(service, settings))]
fn cmd_inspect(service: &SessionService, settings: &Settings, session: &str) -> CliResult<()> {
    let path = settings.resolve_save_path(session);
    let view = service.inspect(&path)?;
    output::header(&path.display());
    output::info(&view.tree);
    if view.load.placeholders > 0 {
        output::warning(&format!("{} placeholder node(s)", view.load.placeholders));
    }
    Ok(())
}

fn cmd_config(
    settings: &Settings,
    explicit: Option<&Path>,
    command: &ConfigCommands,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into());
            output::detail(&format!("global:   {}", global));
            if let Some(path) = explicit {
                output::detail(&format!("explicit: {}", path.display()));
            }
            output::detail(&format!("save_dir: {}", settings.save_dir.display()));
        }
    }
    Ok(())
}
