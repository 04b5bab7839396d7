use clap::{Parser, Subcommand};
use colored::Colorize;
use puggy::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "puggy")]
#[command(about = "Compile indentation-based templates into reactive HTML pages", long_about = None)]
#[command(version)]
struct Cli {
    /// Print debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new puggy site
    Init {
        /// Name of the project directory
        name: String,
    },
    /// Compile a .pug file or a project to HTML
    /// A single file is printed to stdout unless --output is given
    Compile {
        /// Path to project directory or .pug file (defaults to current directory)
        #[arg(default_value = ".")]
        target: String,
        /// Output file (single file) or output directory (project)
        #[arg(short, long)]
        output: Option<String>,
        /// Override a variable's startup value: --set name=expression
        #[arg(long = "set", value_name = "NAME=EXPR")]
        set: Vec<String>,
        /// Indent the generated markup
        #[arg(long)]
        pretty: bool,
        /// Remove the output directory before building a project
        #[arg(long)]
        clean: bool,
        /// Keep running and recompile on changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Parse and rewrite templates without writing output
    Check {
        /// Path to project directory or .pug file (defaults to current directory)
        #[arg(default_value = ".")]
        target: String,
    },
    /// Watch for changes and recompile automatically
    Watch {
        /// Path to project directory or .pug file (defaults to current directory)
        #[arg(default_value = ".")]
        target: String,
        /// Output file (single file) or output directory (project)
        #[arg(short, long)]
        output: Option<String>,
        /// Override a variable's startup value: --set name=expression
        #[arg(long = "set", value_name = "NAME=EXPR")]
        set: Vec<String>,
        /// Indent the generated markup
        #[arg(long)]
        pretty: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "puggy=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { name } => {
            commands::init::execute(&name)
        }
        Commands::Compile { target, output, set, pretty, clean, watch } => {
            commands::compile::execute(&target, output.as_deref(), &set, pretty, clean, watch)
        }
        Commands::Check { target } => {
            commands::check::execute(&target)
        }
        Commands::Watch { target, output, set, pretty } => {
            commands::compile::execute(&target, output.as_deref(), &set, pretty, false, true)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
