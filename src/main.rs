use clap::Parser;
use std::fs;
use std::process::ExitCode;
use wasmexec::runtime::Vm;
use wasmexec::wat;

#[derive(Parser)]
#[command(name = "wasmexec")]
#[command(about = "Execute a function exported by a WebAssembly text module")]
struct Cli {
    /// Name of the exported function to run
    #[arg(long, value_name = "NAME", default_value = "main")]
    invoke: String,

    /// Print the lowered module instead of executing it
    #[arg(long)]
    dump: bool,

    /// Path to the module source (.wat)
    file: String,
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read {}: {}", cli.file, e);
            return ExitCode::FAILURE;
        }
    };

    let module = match wat::parse(&source) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("error: failed to decode {}: {}", cli.file, e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump {
        print!("{}", module);
        return ExitCode::SUCCESS;
    }

    let mut vm = Vm::new(&module);
    match vm.exec_func(&cli.invoke, None) {
        Ok(results) => {
            for result in results {
                println!("{}", result);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Stderr logging, filterable through `RUST_LOG`; off by default.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
