use crate::config::{Catalog, CatalogError, load_catalog, save_catalog};
use crate::domain::{AppPaths, Snippet};
use crate::exec::run_shell_command;
use crate::history::{
    DEFAULT_BUFFER_MULTIPLIER, DEFAULT_HISTORY_BUFFER_SIZE, HISTORY_ENV_VAR, HistoryEnv, HistoryPipeline, history_file_path,
};
use crate::search::{filter, order_for_menu};
use crate::shell::{ShellKind, bash_wrapper_snippet, zsh_wrapper_snippet};
use crate::store::StateStore;
use crate::template::{parse_var, resolve_command};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, FuzzySelect, Input, Select};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

/// How many history entries the add flow offers by default.
const HISTORY_DISPLAY_COUNT: usize = 30;

#[derive(Parser, Debug)]
#[command(
    name = "qpq",
    version,
    about = "Quick launcher for frequently used shell commands"
)]
pub struct Cli {
    /// Directory holding commands.toml and state.sqlite
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Print debug diagnostics to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pick a command interactively and run it (the default)
    Pick(PickArgs),

    /// Run a command by name or alias
    Run(RunArgs),

    /// List saved commands
    List(ListArgs),

    /// Save a new command, optionally taken from shell history
    Add(AddArgs),

    /// Delete a saved command
    Remove(RemoveArgs),

    /// Toggle a command as favorite
    Fav(NameArgs),

    /// Print recent distinct shell commands, newest first
    History(HistoryArgs),

    /// Print the shell wrapper that hands in-memory history to qpq
    Shell(ShellArgs),

    /// Show where qpq keeps its files
    Paths,
}

#[derive(Parser, Debug, Default)]
pub struct PickArgs {
    /// Initial filter over name, description, tags and aliases
    pub query: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Command name or alias
    pub name: String,

    /// Placeholder value, e.g. --var branch=main (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Print the resolved command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Substring filter over name, description, tags and aliases
    pub query: Option<String>,

    /// Only commands carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Choose the command text from recent shell history
    #[arg(long)]
    pub from_history: bool,

    /// Take the Nth history entry (1 = newest) instead of prompting
    #[arg(long, requires = "from_history")]
    pub pick: Option<usize>,

    /// How many history entries to offer
    #[arg(long, default_value_t = HISTORY_DISPLAY_COUNT)]
    pub count: usize,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "from_history")]
    pub command: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Comma-separated tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct NameArgs {
    /// Command name or alias
    pub name: String,
}

#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Command name or alias
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Maximum number of commands to print
    #[arg(long, short = 'n', default_value_t = HISTORY_DISPLAY_COUNT)]
    pub count: usize,

    /// Over-fetch factor applied before removing duplicates
    #[arg(long, default_value_t = DEFAULT_BUFFER_MULTIPLIER)]
    pub multiplier: f64,

    /// Read history for this shell instead of detecting it
    #[arg(long, value_enum)]
    pub shell: Option<ShellKind>,

    /// Give up on the `history` subprocess after this many milliseconds
    /// (defaults to `history_timeout_ms` in commands.toml)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ShellArgs {
    /// Print bash integration
    #[arg(long)]
    pub bash: bool,

    /// Print zsh integration
    #[arg(long)]
    pub zsh: bool,

    /// How many history entries the wrapper hands over
    #[arg(long, default_value_t = DEFAULT_HISTORY_BUFFER_SIZE)]
    pub count: usize,
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    let paths = AppPaths {
        dir: cli.dir.unwrap_or_else(AppPaths::default_dir),
    };

    match cli.command.unwrap_or(Commands::Pick(PickArgs::default())) {
        Commands::Pick(args) => cmd_pick(&paths, args),
        Commands::Run(args) => cmd_run(&paths, args),
        Commands::List(args) => cmd_list(&paths, args),
        Commands::Add(args) => cmd_add(&paths, args),
        Commands::Remove(args) => cmd_remove(&paths, args),
        Commands::Fav(args) => cmd_fav(&paths, args),
        Commands::History(args) => cmd_history(&paths, args),
        Commands::Shell(args) => cmd_shell(args),
        Commands::Paths => cmd_paths(&paths),
    }
}

fn interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr)
}

fn cmd_pick(paths: &AppPaths, args: PickArgs) -> Result<ExitCode> {
    if !interactive() {
        anyhow::bail!("picking needs an interactive terminal; use `qpq run <name>` instead");
    }

    let catalog = load_catalog(&paths.catalog())?;
    let mut store = StateStore::open(&paths.state_db())?;
    let favorites = store.favorites()?;
    let recent: Vec<String> = store.recent()?.into_iter().map(|(name, _)| name).collect();

    let matching = filter(&catalog.commands, args.query.as_deref().unwrap_or(""));
    let ordered = order_for_menu(&matching, &favorites, &recent);
    if ordered.is_empty() {
        eprintln!("No commands match; add one with `qpq add`");
        return Ok(ExitCode::SUCCESS);
    }

    let width = ordered.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let items: Vec<String> = ordered
        .iter()
        .map(|s| {
            let mark = if favorites.contains(&s.name) { '*' } else { ' ' };
            format!("{mark} {name:<width$}  {cmd}", name = s.name, cmd = s.command)
        })
        .collect();

    let Some(choice) = FuzzySelect::new()
        .with_prompt("Run")
        .items(&items)
        .default(0)
        .interact_opt()?
    else {
        return Ok(ExitCode::SUCCESS);
    };

    launch(&mut store, ordered[choice], &HashMap::new(), false)
}

fn cmd_run(paths: &AppPaths, args: RunArgs) -> Result<ExitCode> {
    let catalog = load_catalog(&paths.catalog())?;
    let snippet = catalog
        .find(&args.name)
        .ok_or_else(|| CatalogError::NotFound(args.name.clone()))?;

    let mut store = StateStore::open(&paths.state_db())?;
    let vars: HashMap<String, String> = args.vars.into_iter().collect();
    launch(&mut store, snippet, &vars, args.dry_run)
}

fn launch(
    store: &mut StateStore,
    snippet: &Snippet,
    vars: &HashMap<String, String>,
    dry_run: bool,
) -> Result<ExitCode> {
    let resolved = resolve_command(&snippet.command, vars, interactive())?;
    if dry_run {
        println!("{resolved}");
        return Ok(ExitCode::SUCCESS);
    }

    store.record_recent(&snippet.name)?;
    eprintln!("> {resolved}");
    let code = run_shell_command(&resolved)?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn cmd_list(paths: &AppPaths, args: ListArgs) -> Result<ExitCode> {
    let catalog = load_catalog(&paths.catalog())?;
    let store = StateStore::open(&paths.state_db())?;
    let favorites = store.favorites()?;

    let mut matching = filter(&catalog.commands, args.query.as_deref().unwrap_or(""));
    if let Some(tag) = &args.tag {
        matching.retain(|s| s.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)));
    }

    let max_width = terminal_size::terminal_size().map(|(w, _)| w.0 as usize);
    for s in matching {
        let mark = if favorites.contains(&s.name) { '*' } else { ' ' };
        let last = match store.last_run(&s.name)? {
            Some(epoch) => format_epoch(epoch),
            None => String::new(),
        };
        let tags = if s.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", s.tags.join(", "))
        };
        let line = format!(
            "{mark}{id:>4} | {name} | {cmd}{tags}{sep}{last}",
            id = s.id,
            name = s.name,
            cmd = s.command,
            sep = if last.is_empty() { "" } else { " | " },
        );
        println!("{}", truncate(&line, max_width));
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_add(paths: &AppPaths, args: AddArgs) -> Result<ExitCode> {
    let catalog_path = paths.catalog();
    let mut catalog = load_catalog(&catalog_path)?;

    let mut command = args.command.clone();
    if args.from_history {
        command = choose_from_history(&catalog, &args)?;
    }
    let command = match command {
        Some(c) => c,
        None => prompt("Command")?,
    };

    let name = match args.name {
        Some(n) => n,
        None => prompt("Name")?,
    };

    let description = match args.description {
        Some(d) => Some(d),
        None if interactive() => Some(
            Input::<String>::new()
                .with_prompt("Description")
                .allow_empty(true)
                .interact_text()?,
        ),
        None => None,
    }
    .filter(|d| !d.trim().is_empty());

    let mut snippet = Snippet::new(name, command).with_tags(
        args.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty()),
    );
    snippet.description = description;

    let added = catalog.add(snippet)?.clone();
    save_catalog(&catalog_path, &catalog)?;
    println!("Added '{}': {}", added.name, added.command);
    Ok(ExitCode::SUCCESS)
}

/// Offer recent shell commands; `None` means "type it in instead".
fn choose_from_history(catalog: &Catalog, args: &AddArgs) -> Result<Option<String>> {
    let pipeline = HistoryPipeline::from_process().with_timeout(catalog.history_timeout());
    let count = args.count.min(catalog.history_buffer_size.max(1));
    let history = pipeline.last_commands(count);

    if history.is_empty() {
        eprintln!("No command history found");
        return Ok(None);
    }

    if let Some(n) = args.pick {
        let chosen = n
            .checked_sub(1)
            .and_then(|i| history.get(i))
            .with_context(|| format!("--pick {n} is out of range (1-{})", history.len()))?;
        return Ok(Some(chosen.clone()));
    }

    if !interactive() {
        anyhow::bail!("choosing from history needs an interactive terminal; pass --pick N");
    }

    let choice = Select::new()
        .with_prompt("Recent commands (Esc to type one instead)")
        .items(&history)
        .default(0)
        .interact_opt()?;
    Ok(choice.map(|i| history[i].clone()))
}

fn prompt(label: &str) -> Result<String> {
    if !interactive() {
        anyhow::bail!("--{} is required when not running in a terminal", label.to_lowercase());
    }
    Ok(Input::<String>::new().with_prompt(label).interact_text()?)
}

fn cmd_remove(paths: &AppPaths, args: RemoveArgs) -> Result<ExitCode> {
    let catalog_path = paths.catalog();
    let mut catalog = load_catalog(&catalog_path)?;
    let (name, command) = catalog
        .find(&args.name)
        .map(|s| (s.name.clone(), s.command.clone()))
        .ok_or_else(|| CatalogError::NotFound(args.name.clone()))?;

    if !args.yes && interactive() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{name}' ({command})?"))
            .default(true)
            .interact()?;
        if !confirmed {
            println!("Kept '{name}'");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let removed = catalog.remove(&name)?;
    save_catalog(&catalog_path, &catalog)?;

    let mut store = StateStore::open(&paths.state_db())?;
    store.forget(&removed.name)?;
    println!("Removed '{}'", removed.name);
    Ok(ExitCode::SUCCESS)
}

fn cmd_fav(paths: &AppPaths, args: NameArgs) -> Result<ExitCode> {
    let catalog = load_catalog(&paths.catalog())?;
    let snippet = catalog
        .find(&args.name)
        .ok_or_else(|| CatalogError::NotFound(args.name.clone()))?;

    let mut store = StateStore::open(&paths.state_db())?;
    if store.toggle_favorite(&snippet.name)? {
        println!("'{}' is now a favorite", snippet.name);
    } else {
        println!("'{}' is no longer a favorite", snippet.name);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_history(paths: &AppPaths, args: HistoryArgs) -> Result<ExitCode> {
    let catalog = load_catalog(&paths.catalog())?;
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| catalog.history_timeout());
    let mut pipeline = HistoryPipeline::from_process().with_timeout(timeout);
    if let Some(shell) = args.shell {
        pipeline = pipeline.with_shell(shell);
    }
    tracing::debug!(
        "reading {} history, subprocess timeout {} ms",
        pipeline.shell(),
        timeout.as_millis()
    );

    let commands = pipeline.last_commands_buffered(args.count, args.multiplier);
    if commands.is_empty() {
        eprintln!("No command history found");
    }
    for cmd in commands {
        println!("{cmd}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_shell(args: ShellArgs) -> Result<ExitCode> {
    // Default: print both if neither specified
    let want_bash = args.bash || !args.zsh;
    let want_zsh = args.zsh || !args.bash;

    if want_bash {
        println!("{}", bash_wrapper_snippet(args.count));
    }
    if want_zsh {
        println!("{}", zsh_wrapper_snippet(args.count));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_paths(paths: &AppPaths) -> Result<ExitCode> {
    let env = HistoryEnv::from_process();
    let shell = env.shell();

    println!("Configuration paths:");
    println!("  State directory: {}", paths.dir.display());
    println!("  Commands file: {}", paths.catalog().display());
    println!("  State database: {}", paths.state_db().display());
    println!("Shell history:");
    println!("  Detected shell: {shell}");
    match history_file_path(shell, &env) {
        Some(p) => println!("  History file: {}", p.display()),
        None => println!("  History file: (none for {shell})"),
    }
    let handed_off = env.env_history.as_deref().is_some_and(|v| !v.is_empty());
    println!(
        "  {HISTORY_ENV_VAR}: {}",
        if handed_off { "set" } else { "not set" }
    );
    Ok(ExitCode::SUCCESS)
}

fn format_epoch(epoch: i64) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp(epoch)
        .ok()
        .and_then(|dt| dt.format(&fmt).ok())
        .unwrap_or_default()
}

fn truncate(line: &str, max_width: Option<usize>) -> String {
    match max_width {
        Some(w) if w > 1 && line.chars().count() > w => {
            let mut out: String = line.chars().take(w - 1).collect();
            out.push('…');
            out
        }
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_terminal_width() {
        assert_eq!(truncate("abcdef", Some(4)), "abc…");
        assert_eq!(truncate("abc", Some(4)), "abc");
        assert_eq!(truncate("abcdef", None), "abcdef");
    }

    #[test]
    fn format_epoch_is_utc_minutes() {
        assert_eq!(format_epoch(1_700_000_000), "2023-11-14 22:13");
    }

    #[test]
    fn cli_parses_run_vars() {
        let cli = Cli::parse_from(["qpq", "run", "Git Push", "--var", "branch=main"]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.name, "Git Push");
                assert_eq!(args.vars, vec![("branch".to_string(), "main".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_remove_confirmation_flag() {
        let cli = Cli::parse_from(["qpq", "remove", "Disk Usage", "-y"]);
        match cli.command {
            Some(Commands::Remove(args)) => {
                assert_eq!(args.name, "Disk Usage");
                assert!(args.yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_defaults_to_picker() {
        let cli = Cli::parse_from(["qpq"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn history_args_defaults() {
        let cli = Cli::parse_from(["qpq", "history", "--shell", "pwsh"]);
        match cli.command {
            Some(Commands::History(args)) => {
                assert_eq!(args.count, HISTORY_DISPLAY_COUNT);
                assert_eq!(args.multiplier, DEFAULT_BUFFER_MULTIPLIER);
                assert_eq!(args.shell, Some(ShellKind::PowerShell));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
