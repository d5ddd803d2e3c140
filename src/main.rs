use std::io::{BufWriter, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use avm::diagnostic::{Diagnostic, ansi::AnsiRenderer, json, registry};
use avm::listing::{ListMode, Listing};
use avm::{Addr, Config, Context, loader};

#[derive(Parser)]
#[command(name = "avm", version, about = "Load and inspect avm program images")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalOpts {
    /// JSON config file with context sizes
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Zeroed heap cells past the program image
    #[arg(long, global = true, value_name = "CELLS")]
    heap_slack: Option<Addr>,

    /// Initial operand stack capacity
    #[arg(long, global = true, value_name = "CELLS")]
    stack_capacity: Option<Addr>,

    /// Reserved call frames
    #[arg(long, global = true, value_name = "FRAMES")]
    call_stack_capacity: Option<Addr>,

    /// Print diagnostics as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program image and build a context from it
    Check {
        /// Program image; stdin when absent or `-`
        file: Option<PathBuf>,
    },
    /// Print heap cells of a freshly initialized context
    List {
        /// Program image; stdin when absent or `-`
        file: Option<PathBuf>,
        /// First address to print
        #[arg(long, default_value_t = 0)]
        start: Addr,
        /// Number of cells (default: the loaded image)
        #[arg(long)]
        count: Option<Addr>,
        /// Values only, on one line
        #[arg(long)]
        dense: bool,
    },
    /// Explain an error code, e.g. AVM-R005; list all codes when none is given
    Explain { code: Option<String> },
}

fn main() -> ExitCode {
    avm::logging::init("warn");
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(d) => {
            report(&cli.opts, &d);
            ExitCode::FAILURE
        }
    }
}

fn report(opts: &GlobalOpts, d: &Diagnostic) {
    if opts.json {
        eprintln!("{}", json::render(d));
    } else {
        let renderer = AnsiRenderer { use_color: !opts.no_color && std::io::stderr().is_terminal() };
        eprint!("{}", renderer.render(d));
    }
}

fn run(cli: &Cli) -> Result<(), Diagnostic> {
    match &cli.command {
        Command::Check { file } => {
            let config = resolve_config(&cli.opts)?;
            let program = load_program(file.as_deref())?;
            let ctx = Context::new(&program, &config).map_err(|e| Diagnostic::from(&e))?;
            println!("cells: {}", program.len());
            println!("heap: {}", ctx.heap().size());
            println!("stack: {}", ctx.stack().capacity());
            println!("call stack: {}", ctx.call_stack().capacity());
            Ok(())
        }
        Command::List { file, start, count, dense } => {
            let config = resolve_config(&cli.opts)?;
            let program = load_program(file.as_deref())?;
            let ctx = Context::new(&program, &config).map_err(|e| Diagnostic::from(&e))?;
            // the loader caps images below the address space, so this fits
            let count = count.unwrap_or(program.len() as Addr);
            let mode = if *dense { ListMode::Dense } else { ListMode::Expanded };
            let listing = Listing::new(&ctx, *start, count, mode).map_err(|e| Diagnostic::from(&e))?;
            print_listing(&listing, mode == ListMode::Dense)
                .map_err(|e| Diagnostic::error(format!("unable to write listing: {e}")))
        }
        Command::Explain { code: None } => {
            for entry in registry::REGISTRY {
                println!("{}  {}", entry.code, entry.short);
            }
            Ok(())
        }
        Command::Explain { code: Some(code) } => match registry::lookup(code) {
            Some(entry) => {
                print!("{}", entry.long);
                Ok(())
            }
            None => Err(Diagnostic::error(format!("unknown error code '{code}'"))
                .with_suggestion("run `avm explain` to list every code")),
        },
    }
}

fn print_listing(listing: &Listing<'_>, newline: bool) -> std::io::Result<()> {
    let mut out = BufWriter::new(std::io::stdout().lock());
    write!(out, "{listing}")?;
    if newline {
        writeln!(out)?;
    }
    out.flush()
}

fn resolve_config(opts: &GlobalOpts) -> Result<Config, Diagnostic> {
    let mut config = match &opts.config {
        Some(path) => Config::load(path).map_err(|e| Diagnostic::from(&e))?,
        None => Config::default(),
    };
    if let Some(n) = opts.heap_slack {
        config.heap_slack = n;
    }
    if let Some(n) = opts.stack_capacity {
        config.stack_capacity = n;
    }
    if let Some(n) = opts.call_stack_capacity {
        config.call_stack_capacity = n;
    }
    config.validate().map_err(|e| Diagnostic::from(&e))?;
    Ok(config)
}

fn load_program(file: Option<&Path>) -> Result<Vec<avm::Word>, Diagnostic> {
    let source = match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(format!("unable to open file {}: {e}", path.display()))
        })?,
        _ => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .map_err(|e| Diagnostic::error(format!("unable to read input: {e}")))?;
            s
        }
    };

    let program = loader::load(&source).map_err(|e| Diagnostic::from(&e).with_source(source.clone()))?;
    info!(cells = program.len(), "loaded program image");
    Ok(program)
}
