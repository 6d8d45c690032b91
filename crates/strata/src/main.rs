//! Strata command-line tool: resolve, check, and scaffold layered
//! settings files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use strata_core::{
    resolve, Declarations, Dialect, Document, FileSpec, Options, Placeholder, Prompt,
};

mod prompt;
mod writeback;

use prompt::ConsolePrompt;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Resolve layered settings files")]
#[command(version)]
struct Cli {
    /// Accept strict JSON values only (no comments, trailing commas,
    /// bare dates, or extended numbers)
    #[arg(long, global = true)]
    strict: bool,

    /// Load environment variables from this file before resolving
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a settings file chain and print the result as JSON
    Resolve {
        /// Settings file, optionally with a section: local.cfg#prod
        file: String,

        /// Section to resolve (overrides the #section in FILE)
        #[arg(short, long)]
        section: Option<String>,

        /// Paths that must end up set, e.g. DATABASES.default.PASSWORD;
        /// missing ones are prompted for on a TTY
        #[arg(short, long = "require", value_name = "PATH")]
        require: Vec<String>,

        /// Compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Check that a settings file chain composes and interpolates
    Check {
        /// Settings file, optionally with a section: local.cfg#prod
        file: String,

        /// Section to check (overrides the #section in FILE)
        #[arg(short, long)]
        section: Option<String>,

        /// Paths that must end up set; missing ones are prompted for on
        /// a TTY and written back to the file
        #[arg(short, long = "require", value_name = "PATH")]
        require: Vec<String>,
    },

    /// Create a new settings file for an environment
    Init {
        /// Environment name (for example dev or prod)
        env: String,

        /// File to write (default: local.<env>.cfg)
        #[arg(short, long)]
        file_name: Option<PathBuf>,

        /// Base file (and optional section) to extend: base.cfg#common
        #[arg(short, long)]
        extends: Option<String>,

        /// Overwrite the file if it already exists
        #[arg(short, long)]
        overwrite: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("loading env file {}", path.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let dialect = if cli.strict {
        Dialect::Strict
    } else {
        Dialect::Extended
    };

    match cli.command {
        Commands::Resolve {
            file,
            section,
            require,
            compact,
        } => cmd_resolve(&file, section, &require, dialect, compact),
        Commands::Check {
            file,
            section,
            require,
        } => cmd_check(&file, section, &require, dialect),
        Commands::Init {
            env,
            file_name,
            extends,
            overwrite,
        } => cmd_init(&env, file_name, extends.as_deref(), overwrite),
    }
}

struct Resolution {
    document: Document,
    prompted: Vec<(String, String)>,
    spec: FileSpec,
}

fn run(
    file: &str,
    section: Option<String>,
    require: &[String],
    dialect: Dialect,
) -> Result<Resolution, strata_core::Error> {
    let spec = FileSpec::parse(file);
    let mut declarations = Declarations::new();
    for path in require {
        declarations.declare(path, Placeholder::local())?;
    }

    let env: HashMap<String, String> = std::env::vars().collect();
    let options = Options {
        dialect,
        section,
        max_prompt_attempts: None,
    };

    let mut console = ConsolePrompt::new();
    let interactive =
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    let prompter: Option<&mut dyn Prompt> = if interactive {
        Some(&mut console)
    } else {
        None
    };

    let document = resolve(&declarations, Some(&spec), &env, prompter, &options)?;
    Ok(Resolution {
        document,
        prompted: console.collected().to_vec(),
        spec,
    })
}

fn cmd_resolve(
    file: &str,
    section: Option<String>,
    require: &[String],
    dialect: Dialect,
    compact: bool,
) -> Result<()> {
    let resolution = run(file, section, require, dialect).map_err(report)?;
    let json = resolution.document.to_json();
    if compact {
        println!("{}", serde_json::to_string(&json)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}

fn cmd_check(
    file: &str,
    section: Option<String>,
    require: &[String],
    dialect: Dialect,
) -> Result<()> {
    let resolution = run(file, section.clone(), require, dialect).map_err(report)?;
    if !resolution.prompted.is_empty() {
        let section = section.or(resolution.spec.section.clone());
        writeback::append_settings(
            &resolution.spec.path,
            section.as_deref(),
            &resolution.prompted,
        )?;
        for (path, _) in &resolution.prompted {
            println!(
                "{} saved `{path}` to {}",
                "wrote:".green().bold(),
                resolution.spec.path.display()
            );
        }
    }
    println!(
        "{} {} ({} top-level settings)",
        "ok:".green().bold(),
        file,
        resolution.document.root().len()
    );
    Ok(())
}

fn cmd_init(
    env: &str,
    file_name: Option<PathBuf>,
    extends: Option<&str>,
    overwrite: bool,
) -> Result<()> {
    let path = file_name.unwrap_or_else(|| PathBuf::from(format!("local.{env}.cfg")));
    if path.exists() && !overwrite {
        anyhow::bail!(
            "{} already exists (use --overwrite to replace it)",
            path.display()
        );
    }
    let mut contents = String::new();
    if let Some(base) = extends {
        contents.push_str(&format!("extends = \"{base}\"\n\n"));
    }
    contents.push_str(&format!("[{env}]\n"));
    std::fs::write(&path, contents)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} {}", "created".green().bold(), path.display());
    Ok(())
}

fn report(error: strata_core::Error) -> anyhow::Error {
    eprintln!("{} {error}", "error:".red().bold());
    anyhow::anyhow!("settings resolution failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn init_writes_extends_and_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("local.prod.cfg");
        cmd_init(
            "prod",
            Some(path.clone()),
            Some("base.cfg#common"),
            false,
        )
        .expect("init");
        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "extends = \"base.cfg#common\"\n\n[prod]\n");
    }

    #[test]
    fn init_refuses_to_clobber() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("local.dev.cfg");
        std::fs::write(&path, "[dev]\n").expect("write");
        assert!(cmd_init("dev", Some(path.clone()), None, false).is_err());
        cmd_init("dev", Some(path), None, true).expect("overwrite");
    }
}
