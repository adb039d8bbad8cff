//! Arbor CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use arbor::interp::{Interpreter, Value};
use arbor::ir::Module;
use arbor::passes::PassRunner;
use arbor::Config;

#[derive(Parser)]
#[command(name = "arbor", version, about = "Arbor - block merging optimizer for structured tree IR")]
struct Cli {
    /// Log every function the optimizer visits
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize a module and print the result
    Opt {
        /// Source file to optimize
        file: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Assume loads, stores, division and truncation never trap
        #[arg(long)]
        ignore_implicit_traps: bool,
        /// Cap on fixed-point iterations per function
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Print optimization statistics as JSON to stderr
        #[arg(long)]
        stats: bool,
    },
    /// Parse and dump S-expressions (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Run a function in the reference interpreter
    Run {
        /// Source file containing the function
        file: PathBuf,
        /// Function to call
        func: String,
        /// Arguments, parsed by the parameter types
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
        /// Optimize the module before running it
        #[arg(long)]
        optimize: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Opt {
            file,
            config,
            ignore_implicit_traps,
            max_iterations,
            stats,
        } => optimize_file(&file, config.as_deref(), ignore_implicit_traps, max_iterations, stats),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
        Command::Run {
            file,
            func,
            args,
            optimize,
        } => run_file(&file, &func, &args, optimize),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("ARBOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a module, rendering source errors with ariadne
fn load_module(path: &Path) -> Result<Module, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    arbor::ir::read::read_module(&source).map_err(|e| {
        arbor::error::report_error(&filename, &source, &e);
        format!("could not read {filename}").into()
    })
}

fn optimize_file(
    path: &Path,
    config_path: Option<&Path>,
    ignore_implicit_traps: bool,
    max_iterations: Option<usize>,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(config_path) => Config::load(config_path)?,
        None => Config::default(),
    };
    if ignore_implicit_traps {
        config.options.ignore_implicit_traps = true;
    }
    if let Some(n) = max_iterations {
        config.max_iterations = n;
    }

    let mut module = load_module(path)?;
    let stats = PassRunner::from_config(&config).run(&mut module);

    print!("{}", arbor::ir::print::print_module(&module));
    if show_stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let document = arbor::parser::parse_source(&source).map_err(|e| {
        arbor::error::report_error(&filename, &source, &e);
        Box::<dyn std::error::Error>::from(format!("could not parse {filename}"))
    })?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = arbor::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}

fn run_file(path: &Path, name: &str, raw_args: &[String], optimize: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut module = load_module(path)?;
    if optimize {
        PassRunner::default().run(&mut module);
    }

    let Some(func) = module.function(name) else {
        return Err(format!("no function `${name}` in {}", path.display()).into());
    };
    if raw_args.len() != func.params.len() {
        return Err(format!("`${name}` takes {} argument(s), got {}", func.params.len(), raw_args.len()).into());
    }
    let args = raw_args
        .iter()
        .zip(&func.params)
        .map(|(text, ty)| Value::parse(text, *ty).ok_or_else(|| format!("`{text}` is not a valid {ty}")))
        .collect::<Result<Vec<_>, _>>()?;

    let mut interp = Interpreter::new(&module);
    let result = interp.call(name, &args);
    for record in interp.trace() {
        let args: Vec<String> = record.args.iter().map(|v| v.to_string()).collect();
        println!("call ${}({})", record.name, args.join(", "));
    }

    match result? {
        Some(value) => println!("result: {value}"),
        None => println!("result: none"),
    }
    Ok(())
}
