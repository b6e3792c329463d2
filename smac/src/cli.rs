use crate::config::Config;

use smac_lib::{
    error::RequestError,
    settings::{default_jobs, Settings},
    CompileRequest,
};

use anyhow::Context;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use codespan_reporting::term::termcolor::ColorChoice;
use is_terminal::IsTerminal;

use std::{num::NonZeroUsize, path::PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto if std::io::stderr().is_terminal() => ColorChoice::Auto,
            ColorMode::Auto | ColorMode::Never => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// When to use colors.
    #[arg(long, value_name = "WHEN", value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// Also print the compiler's informational lines.
    #[arg(long, global = true)]
    pub echo: bool,

    /// More logging, repeat for even more.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a single plugin
    Compile(CompileArgs),
    /// Compile every plugin in a directory
    Build(BuildArgs),
}

#[derive(Debug, ClapArgs)]
pub struct CompileArgs {
    /// The source file to compile.
    pub source: PathBuf,

    /// Path to the compiler executable.
    #[arg(short, long, value_name = "PATH")]
    pub compiler: PathBuf,

    /// The directory the plugin is written to.
    #[arg(short, long, value_name = "DIR")]
    pub dest: PathBuf,

    /// Zero or more include directories
    #[arg(short = 'i', long = "include", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,
}

#[derive(Debug, Default, ClapArgs)]
pub struct BuildArgs {
    /// Config file, `smac.toml` in the working directory is used if it exists.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the compiler executable.
    #[arg(short, long, value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// The directory searched for sources. Defaults to the working directory.
    #[arg(short, long, value_name = "DIR")]
    pub src: Option<PathBuf>,

    /// The directory plugins are written to.
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Zero or more include directories, replacing the configured ones.
    #[arg(short = 'i', long = "include", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Mirror the source's sub directories in the destination.
    #[arg(long)]
    pub keep_sub_dirs: bool,

    /// Keep going after a plugin fails to compile.
    #[arg(long)]
    pub ignore_errors: bool,

    /// How many compilers may run at once. Defaults to the number of CPUs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<NonZeroUsize>,
}

pub fn extract_request(args: &CompileArgs) -> Result<CompileRequest, RequestError> {
    CompileRequest::builder()
        .compiler(&args.compiler)
        .source(&args.source)
        .include_dirs(&args.include_dirs)
        .dest_dir(&args.dest)
        .build()
}

/// Merges the flags over `config`, returning the settings and the source directory.
pub fn extract_build_settings(
    args: &BuildArgs,
    config: Config,
) -> anyhow::Result<(Settings, PathBuf)> {
    let include_dirs = if args.include_dirs.is_empty() {
        config.include_dirs()
    } else {
        args.include_dirs.clone()
    };

    let compiler = args
        .compiler
        .clone()
        .or(config.compiler)
        .context("No compiler given, use `--compiler` or set `compiler` in the config")?;
    let dest = args
        .dest
        .clone()
        .or(config.dest)
        .context("No destination given, use `--dest` or set `dest` in the config")?;
    let src = args
        .src
        .clone()
        .or(config.src)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = Settings::new(compiler, dest);
    settings.include_dirs = include_dirs;
    settings.ignore_sub_dirs = !args.keep_sub_dirs && config.ignore_sub_dirs.unwrap_or(true);
    settings.ignore_errors = args.ignore_errors || config.ignore_errors.unwrap_or(false);
    settings.jobs = args.jobs.or(config.jobs).unwrap_or_else(default_jobs);

    Ok((settings, src))
}
