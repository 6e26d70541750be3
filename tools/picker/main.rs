//! Command line front end for loading and calling plugins.
//!
//! ```text
//! picker list plugins.yaml --arity 2
//! picker call plugins.yaml sum 1 2
//! picker --no-safe-wrap call plugins.toml greet '"world"'
//! ```
//!
//! Every plugin in a file must share one arity. `call` derives it from the
//! number of arguments; `list` takes it from `--arity`. Arguments are parsed
//! as JSON, falling back to plain strings.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use rhai::Dynamic;
use script_picker::{Options, Picker, PluginError, Settings, Signature};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type Out = Result<Dynamic, PluginError>;

#[derive(Parser, Debug)]
#[command(name = "picker", version, about = "Load and call Rhai plugins")]
struct Cli {
    /// Settings file (TOML). `PICKER_*` environment variables override it.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Let plugin faults abort the process instead of reporting them.
    #[arg(long, global = true)]
    no_safe_wrap: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List plugin names in load order.
    List {
        /// Plugin file (.yaml, .yml, .json or .toml).
        file: PathBuf,
        /// Parameter count every plugin takes.
        #[arg(long, default_value_t = 1)]
        arity: usize,
    },
    /// Call one plugin and print its result as JSON.
    Call {
        /// Plugin file (.yaml, .yml, .json or .toml).
        file: PathBuf,
        /// Plugin name.
        name: String,
        /// Arguments, one per plugin parameter.
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if cli.no_safe_wrap {
        settings.safe_wrap = false;
    }
    let options = Options::new().with_settings(settings);

    match cli.command {
        Command::List { file, arity } => {
            let names = match arity {
                0 => names::<fn() -> Out>(&file, options)?,
                1 => names::<fn(Dynamic) -> Out>(&file, options)?,
                2 => names::<fn(Dynamic, Dynamic) -> Out>(&file, options)?,
                3 => names::<fn(Dynamic, Dynamic, Dynamic) -> Out>(&file, options)?,
                n => bail!("unsupported arity {n}, expected 0 to 3"),
            };
            for name in names {
                println!("{name}");
            }
        }
        Command::Call { file, name, args } => {
            let args = args
                .iter()
                .map(|raw| parse_arg(raw))
                .collect::<Result<Vec<_>>>()?;

            let result = match args.as_slice() {
                [] => load::<fn() -> Out>(&file, options)?.get(&name)?(),
                [a] => load::<fn(Dynamic) -> Out>(&file, options)?.get(&name)?(a.clone()),
                [a, b] => {
                    let call = load::<fn(Dynamic, Dynamic) -> Out>(&file, options)?.get(&name)?;
                    call(a.clone(), b.clone())
                }
                [a, b, c] => {
                    let call = load::<fn(Dynamic, Dynamic, Dynamic) -> Out>(&file, options)?.get(&name)?;
                    call(a.clone(), b.clone(), c.clone())
                }
                _ => bail!("unsupported argument count {}, expected 0 to 3", args.len()),
            }?;
            println!("{}", render(&result));
        }
    }
    Ok(())
}

fn load<S: Signature>(file: &Path, options: Options) -> Result<Picker<S>> {
    Picker::<S>::parse_file(file, options).with_context(|| format!("loading {}", file.display()))
}

fn names<S: Signature>(file: &Path, options: Options) -> Result<Vec<String>> {
    Ok(load::<S>(file, options)?.list().to_vec())
}

fn parse_arg(raw: &str) -> Result<Dynamic> {
    let value = serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    rhai::serde::to_dynamic(value).map_err(|e| anyhow::anyhow!("argument {raw:?}: {e}"))
}

fn render(value: &Dynamic) -> String {
    rhai::serde::from_dynamic::<serde_json::Value>(value)
        .map(|json| json.to_string())
        .unwrap_or_else(|_| value.to_string())
}
