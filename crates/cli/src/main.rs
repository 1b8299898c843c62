use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use trainconf::{
    global_store, save_node, Composer, ConfigFormat, ConfigNode, ConfigStore, Override, SetMode,
    TrainerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "trainconf", about = "Compose and inspect trainer configurations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered configs as group/name.
    List(ListArgs),
    /// Print the composed config.
    Show(ShowArgs),
    /// Write the default trainer config to a file.
    Init(InitArgs),
    /// Compose and instantiate the trainer config, reporting any error.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Only list entries of this group.
    #[arg(long)]
    group: Option<String>,
}

/// Layers shared by `show` and `check`.
#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Extra group selection, `group=name` (repeatable).
    #[arg(long = "select")]
    selects: Vec<String>,
    /// YAML/JSON file merged over the defaults (repeatable, applied in order).
    #[arg(long)]
    config: Vec<PathBuf>,
    /// Overrides: `key=value`, `+key=value`, `++key=value`, `~key`, `group=name`.
    overrides: Vec<String>,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    #[command(flatten)]
    compose: ComposeArgs,
    #[arg(long, default_value = "yaml", value_parser = ["yaml", "json"])]
    format: String,
    /// Only print keys that differ from the registered defaults.
    #[arg(long)]
    diff: bool,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Output file; `.yaml`, `.yml` or `.json`.
    #[arg(long, default_value = "trainer.yaml")]
    output: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    #[command(flatten)]
    compose: ComposeArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = global_store().map_err(|e| anyhow::anyhow!("build config registry: {e}"))?;
    match cli.command {
        Command::List(args) => cmd_list(store, args),
        Command::Show(args) => cmd_show(store, args),
        Command::Init(args) => cmd_init(store, args),
        Command::Check(args) => cmd_check(store, args),
    }
}

// ── Command implementations ────────────────────────────────────────────────────

fn composer<'a>(store: &'a ConfigStore, args: &ComposeArgs) -> Result<Composer<'a>> {
    let mut composer = Composer::new(store).select("trainer", "trainer");
    for sel in &args.selects {
        let (group, name) = sel
            .split_once('=')
            .with_context(|| format!("--select expects group=name, got '{sel}'"))?;
        composer = composer.select(group, name);
    }
    for path in &args.config {
        composer = composer.with_file(path);
    }
    Ok(composer.with_overrides(&args.overrides)?)
}

fn cmd_list(store: &ConfigStore, args: ListArgs) -> Result<()> {
    for entry in store.entries() {
        if args.group.as_deref().is_some_and(|g| g != entry.group) {
            continue;
        }
        match entry.type_name {
            Some(ty) => println!("{}/{}\t{}", entry.group, entry.name, ty),
            None => println!("{}/{}", entry.group, entry.name),
        }
    }
    Ok(())
}

fn cmd_show(store: &ConfigStore, args: ShowArgs) -> Result<()> {
    let composer = composer(store, &args.compose)?;
    let composed = composer.compose()?;

    if args.diff {
        for ov in diff_overrides(&composer.defaults()?, &composed) {
            println!("{ov}");
        }
        return Ok(());
    }

    let format = ConfigFormat::from_name(&args.format).unwrap_or(ConfigFormat::Yaml);
    print!("{}", format.render(&composed)?);
    if format == ConfigFormat::Json {
        println!();
    }
    Ok(())
}

/// Overrides that turn `defaults` into `composed`, printable as command-line text.
fn diff_overrides(defaults: &ConfigNode, composed: &ConfigNode) -> Vec<Override> {
    defaults
        .diff(composed)
        .into_iter()
        .map(|key| match (defaults.contains(&key), composed.get(&key)) {
            (_, None) => Override::Delete {
                key,
                expected: None,
            },
            (existed, Some(value)) => Override::Set {
                key,
                value: value.clone(),
                mode: if existed {
                    SetMode::Existing
                } else {
                    SetMode::New
                },
            },
        })
        .collect()
}

fn cmd_init(store: &ConfigStore, args: InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            args.output.display()
        );
    }
    let defaults = Composer::new(store)
        .select("trainer", "trainer")
        .defaults()?;
    save_node(&defaults, &args.output)
        .with_context(|| format!("write default config to {}", args.output.display()))?;
    eprintln!("Created default config at {}", args.output.display());
    Ok(())
}

fn cmd_check(store: &ConfigStore, args: CheckArgs) -> Result<()> {
    let config: TrainerConfig = composer(store, &args.compose)?
        .instantiate()
        .context("trainer config does not fit the schema")?;
    if let Some(max_time) = &config.max_time {
        let limit = max_time.to_duration()?;
        tracing::debug!(secs = limit.as_secs(), "max_time parsed");
    }

    let changed = config.changed_fields()?;
    println!(
        "ok: max_epochs={} max_steps={} precision={:?} ({} field(s) changed)",
        config.max_epochs,
        config
            .max_steps
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string()),
        config.precision,
        changed.len()
    );
    for field in changed {
        println!("  {field}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trainconf::default_store;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("trainconf").chain(args.iter().copied())).unwrap()
    }

    fn show_diff(args: &[&str]) -> Vec<String> {
        let store = default_store().unwrap();
        let Command::Show(show) = parse(args).command else {
            panic!("expected show");
        };
        assert!(show.diff);
        let composer = composer(&store, &show.compose).unwrap();
        diff_overrides(&composer.defaults().unwrap(), &composer.compose().unwrap())
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn diff_prints_pasteable_overrides() {
        let lines = show_diff(&[
            "show",
            "--diff",
            "trainer.max_steps=500",
            "trainer.precision=bf16",
            "~trainer.ipus",
        ]);
        assert_eq!(
            lines,
            vec![
                "~trainer.ipus",
                "trainer.max_steps=500",
                "trainer.precision=bf16",
            ]
        );

        let store = default_store().unwrap();
        let replayed = Composer::new(&store)
            .select("trainer", "trainer")
            .with_overrides(&lines)
            .unwrap()
            .compose()
            .unwrap();
        let direct = Composer::new(&store)
            .select("trainer", "trainer")
            .with_overrides(["trainer.max_steps=500", "trainer.precision=bf16", "~trainer.ipus"])
            .unwrap()
            .compose()
            .unwrap();
        assert_eq!(replayed, direct);
    }

    #[test]
    fn diff_of_defaults_is_empty() {
        assert!(show_diff(&["show", "--diff"]).is_empty());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let store = default_store().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("trainer.yaml");
        let init = |force: bool| {
            let mut args = vec!["init", "--output", output.to_str().unwrap()];
            if force {
                args.push("--force");
            }
            let Command::Init(init) = parse(&args).command else {
                panic!("expected init");
            };
            cmd_init(&store, init)
        };

        init(false).unwrap();
        let config: TrainerConfig = Composer::new(&store)
            .select("trainer", "trainer")
            .with_file(&output)
            .instantiate()
            .unwrap();
        assert_eq!(config, TrainerConfig::default());

        std::fs::write(&output, "trainer:\n  max_epochs: 7\n").unwrap();
        let err = init(false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(std::fs::read_to_string(&output).unwrap().contains("max_epochs: 7"));

        init(true).unwrap();
        assert!(!std::fs::read_to_string(&output).unwrap().contains("max_epochs: 7"));
    }

    #[test]
    fn check_reports_bad_overrides() {
        let store = default_store().unwrap();
        let check = |args: &[&str]| {
            let Command::Check(check) = parse(args).command else {
                panic!("expected check");
            };
            cmd_check(&store, check)
        };
        check(&["check", "trainer.max_epochs=20", "trainer.max_time=00:12:00:00"]).unwrap();
        assert!(check(&["check", "trainer.max_epoch=20"]).is_err());
        assert!(check(&["check", "trainer.max_epochs=many"]).is_err());
        assert!(check(&["check", "trainer.max_time=12h"]).is_err());
    }

    #[test]
    fn select_requires_group_and_name() {
        let store = default_store().unwrap();
        let Command::Check(check) = parse(&["check", "--select", "trainer"]).command else {
            panic!("expected check");
        };
        assert!(composer(&store, &check.compose).is_err());
    }
}
