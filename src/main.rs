use clap::{Parser as ClapParser, Subcommand};
use divkit_expr::{
    EvaluatorConfig,
    cli::{self, CheckOptions, CliError, EvalOptions},
    logging,
};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

#[derive(ClapParser)]
#[command(name = "divx")]
#[command(about = "Evaluate and inspect DivKit card expressions")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// JSON file with evaluator limits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// The expression source (reads from stdin if not provided)
        expression: Option<String>,

        /// Variables file: card declarations or a flat JSON object
        #[arg(long)]
        vars: Option<PathBuf>,

        /// Set a variable, e.g. --set count=3
        #[arg(long = "set", value_name = "NAME=VALUE")]
        assignments: Vec<String>,

        /// Pretty-print the result as JSON
        #[arg(short, long)]
        pretty: bool,

        /// Print the variables read by the evaluation to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Only validate syntax and list referenced variables
    Check {
        /// The expression source (reads from stdin if not provided)
        expression: Option<String>,
    },

    /// List built-in functions and methods
    Functions {
        /// Only show names containing this text
        filter: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    let result = load_config(cli.config).and_then(|config| match cli.command {
        Commands::Eval {
            expression,
            vars,
            assignments,
            pretty,
            trace,
        } => run_eval(expression, vars, assignments, pretty, trace, config),
        Commands::Check { expression } => run_check(expression, config),
        Commands::Functions { filter } => {
            for listing in cli::list_functions(filter.as_deref()) {
                println!("{:<8} {}", listing.kind, listing.signature);
            }
            Ok(())
        }
    });

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EvaluatorConfig, CliError> {
    match path {
        Some(path) => Ok(EvaluatorConfig::load(path)?),
        None => Ok(EvaluatorConfig::default()),
    }
}

fn read_expression(expression: Option<String>) -> Result<String, CliError> {
    match expression {
        Some(s) => Ok(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
        }
        None => Err(CliError::NoInput),
    }
}

fn run_eval(
    expression: Option<String>,
    vars: Option<PathBuf>,
    assignments: Vec<String>,
    pretty: bool,
    trace: bool,
    config: EvaluatorConfig,
) -> Result<(), CliError> {
    let options = EvalOptions {
        expression: read_expression(expression)?,
        variables: vars.map(fs::read_to_string).transpose()?,
        assignments,
        config,
    };

    let output = cli::execute_eval(&options)?;

    for warning in &output.warnings {
        eprintln!("warning: {}", warning);
    }
    if trace {
        for read in &output.reads {
            match read.scope {
                Some(scope) => eprintln!("read {} from {}", read.name, scope),
                None => eprintln!("read {} (undefined)", read.name),
            }
        }
    }

    if pretty {
        println!("{}", serde_json::to_string_pretty(&output.value.to_json())?);
    } else {
        println!("{}", output.value);
    }
    Ok(())
}

fn run_check(expression: Option<String>, config: EvaluatorConfig) -> Result<(), CliError> {
    let options = CheckOptions {
        expression: read_expression(expression)?,
        config,
    };

    let result = cli::execute_check(&options)?;
    if result.constant {
        println!("Syntax is valid (constant)");
    } else {
        println!("Syntax is valid");
        for name in &result.variables {
            println!("  {}", name);
        }
    }
    Ok(())
}
