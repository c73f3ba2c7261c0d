use std::process;

use tinylisp::interpreter::{Interpreter, InterpreterConfig, TRACE_VAR};
use tinylisp::{repl, source};

struct Options {
    file: Option<String>,
    keep_repl: bool,
    config: InterpreterConfig,
}

fn print_usage() {
    println!("Usage: tinylisp [FILE] [OPTIONS]");
    println!();
    println!("Runs FILE if given, otherwise starts the interactive prompt.");
    println!();
    println!("Options:");
    println!("  --keep-repl       Start the prompt after running FILE");
    println!("  --no-default-io   Do not install display, newline, read and clear");
    println!("  --no-builtins     Do not import the builtins module");
    println!("  -h, --help        Show this help message");
    println!();
    println!("Environment variables:");
    println!("  {}=1  Trace every evaluation and import to stderr", TRACE_VAR);
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        file: None,
        keep_repl: false,
        config: InterpreterConfig::from_env(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--keep-repl" => options.keep_repl = true,
            "--no-default-io" => options.config.default_io = false,
            "--no-builtins" => options.config.host_builtins = false,
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Use --help for usage information");
                process::exit(1);
            }
            path => {
                if options.file.is_some() {
                    eprintln!("Only one file may be given, found extra: {}", path);
                    process::exit(1);
                }
                options.file = Some(path.to_string());
            }
        }
        i += 1;
    }
    options
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args);
    let interpreter = Interpreter::with_config(options.config);

    if let Some(path) = &options.file {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("Error reading {}: {}", path, err);
                process::exit(1);
            }
        };
        // Errors are reported per chunk and do not stop the run
        for chunk in source::chunks(&text) {
            repl::eval_chunk(&interpreter, path, chunk);
        }
        if !options.keep_repl {
            return;
        }
    }

    if let Err(err) = repl::run(&interpreter) {
        eprintln!("Readline Error: {:?}", err);
        process::exit(1);
    }
}
