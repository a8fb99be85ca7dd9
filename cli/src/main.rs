//! hsmod - command-line front end for the ghc-mod session backend.
//!
//! Starts one interactive session for the target project, runs a
//! single operation and prints the results to stdout: diagnostics as
//! `path:line:col: level: message` lines, symbol results as JSON
//! lines, `langs`/`flags` as plain lines. Logging goes to stderr so
//! stdout stays machine-readable.
//!
//! ```text
//! hsmod [options] check <file>...
//! hsmod [options] lint <file>...
//! hsmod [options] browse <module>
//! hsmod [options] modules [lookup]
//! hsmod [options] langs
//! hsmod [options] flags
//! ```

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use hsmod_backend::{BackendConfig, GhcModBackend, SearchType};

const USAGE: &str = "\
usage: hsmod [options] <operation> [args]

operations:
  check <file>...     type-check files and print diagnostics
  lint <file>...      lint files via hlint and print hints
  browse <module>     list the declarations of a module (dotted name)
  modules [lookup]    list modules in scope, filtered by lookup
  langs               list known language extensions
  flags               list known GHC flags

options:
  --project-dir <dir>   project root (default: current directory)
  --ghc-opt <opt>       extra GHC option, repeatable
  --sandbox <dir>       cabal sandbox directory to scan for package dbs
  --path <dir>          extra executable search directory, repeatable
  --match <kind>        lookup matching for modules:
                        exact|prefix|suffix|infix|regex (default: prefix)
";

enum Operation {
    Check(Vec<PathBuf>),
    Lint(Vec<PathBuf>),
    Browse(String),
    Modules { lookup: String, search: SearchType },
    Langs,
    Flags,
}

struct Cli {
    project_dir: PathBuf,
    config: BackendConfig,
    operation: Operation,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_search_type(raw: &str) -> Result<SearchType> {
    Ok(match raw {
        "exact" => SearchType::Exact,
        "prefix" => SearchType::Prefix,
        "suffix" => SearchType::Suffix,
        "infix" => SearchType::Infix,
        "regex" => SearchType::Regex,
        other => bail!("unknown match kind '{other}'"),
    })
}

fn parse_args(args: Vec<String>) -> Result<Cli> {
    let mut project_dir = None;
    let mut ghc_opts = Vec::new();
    let mut sandbox = None;
    let mut add_to_path = Vec::new();
    let mut search = SearchType::Prefix;
    let mut positional = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value_of = |flag: &str| {
            iter.next()
                .with_context(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--project-dir" => project_dir = Some(PathBuf::from(value_of("--project-dir")?)),
            "--ghc-opt" => ghc_opts.push(value_of("--ghc-opt")?),
            "--sandbox" => sandbox = Some(PathBuf::from(value_of("--sandbox")?)),
            "--path" => add_to_path.push(PathBuf::from(value_of("--path")?)),
            "--match" => search = parse_search_type(&value_of("--match")?)?,
            "--help" | "-h" => bail!("{USAGE}"),
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{USAGE}"),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(operation) = positional.next() else {
        bail!("no operation given\n\n{USAGE}");
    };
    let rest: Vec<String> = positional.collect();

    let operation = match operation.as_str() {
        "check" | "lint" => {
            if rest.is_empty() {
                bail!("{operation} requires at least one file");
            }
            let files = rest.iter().map(PathBuf::from).collect();
            if operation == "check" {
                Operation::Check(files)
            } else {
                Operation::Lint(files)
            }
        }
        "browse" => match rest.as_slice() {
            [module] => Operation::Browse(module.clone()),
            _ => bail!("browse requires exactly one module name"),
        },
        "modules" => Operation::Modules {
            lookup: rest.first().cloned().unwrap_or_default(),
            search,
        },
        "langs" => Operation::Langs,
        "flags" => Operation::Flags,
        other => bail!("unknown operation '{other}'\n\n{USAGE}"),
    };

    let project_dir = match project_dir {
        Some(dir) => dir,
        None => env::current_dir().context("cannot determine current directory")?,
    };

    Ok(Cli {
        project_dir,
        config: BackendConfig {
            add_to_path,
            add_standard_dirs: true,
            ghc_opts,
            sandbox,
        },
        operation,
    })
}

/// Project identifier shown in logs and used as the registry key.
fn project_name(dir: &std::path::Path) -> String {
    dir.file_name()
        .map_or_else(|| "project".to_string(), |name| name.to_string_lossy().into_owned())
}

fn print_json<T: serde::Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<bool> {
    let backend = GhcModBackend::new(cli.config);
    let project = project_name(&cli.project_dir);

    let mut found_errors = false;
    match cli.operation {
        Operation::Check(files) => {
            for file in &files {
                backend
                    .add_project_file(file, &project, &cli.project_dir)
                    .await?;
            }
            let mut records = Vec::new();
            backend
                .check(&files, &HashMap::new(), |found| records = found)
                .await;
            found_errors = records.iter().any(|rec| rec.level().is_error());
            for rec in &records {
                println!("{}", rec.display_line());
            }
        }
        Operation::Lint(files) => {
            for file in &files {
                backend
                    .add_project_file(file, &project, &cli.project_dir)
                    .await?;
            }
            let mut records = Vec::new();
            backend
                .lint(&files, &HashMap::new(), |found| records = found)
                .await;
            for rec in &records {
                println!("{}", rec.display_line());
            }
        }
        Operation::Browse(module) => {
            backend.ensure_project(&project, &cli.project_dir).await?;
            let mut modules = Vec::new();
            backend
                .module(&project, &module, |found| modules = found)
                .await;
            print_json(&modules)?;
        }
        Operation::Modules { lookup, search } => {
            backend.ensure_project(&project, &cli.project_dir).await?;
            let mut modules = Vec::new();
            backend
                .scope_modules(&project, &lookup, search, |found| modules = found)
                .await;
            print_json(&modules)?;
        }
        Operation::Langs => {
            backend.ensure_project(&project, &cli.project_dir).await?;
            let mut lines = Vec::new();
            backend.langs(&project, |found| lines = found).await;
            for line in lines {
                println!("{line}");
            }
        }
        Operation::Flags => {
            backend.ensure_project(&project, &cli.project_dir).await?;
            let mut lines = Vec::new();
            backend.flags(&project, |found| lines = found).await;
            for line in lines {
                println!("{line}");
            }
        }
    }

    backend.shutdown().await;
    Ok(found_errors)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = match parse_args(env::args().skip(1).collect()) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(true) => ExitCode::FAILURE,
        Ok(false) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
