//! Grammar compiler CLI.

use std::path::Path;

use gramc::args::parse_compile_args;
use gramc::commands::{check_file, compile_file, dump_file};

fn main() {
    gramc::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "compile" => {
            let parsed = match parse_compile_args(&args[2..]) {
                Ok(parsed) => parsed,
                Err(err) => {
                    eprintln!("error: {err}");
                    print_compile_usage();
                    std::process::exit(1);
                }
            };
            let output = parsed.output_path();
            match compile_file(&parsed.input, &output, parsed.options) {
                Ok(stats) => println!(
                    "{}: {} rules, {} arcs, {} words",
                    output.display(),
                    stats.rules,
                    stats.arcs,
                    stats.words
                ),
                Err(err) => fail(&err),
            }
        }
        "check" => {
            let parsed = match parse_compile_args(&args[2..]) {
                Ok(parsed) if parsed.output.is_none() => parsed,
                Ok(_) => {
                    eprintln!("error: `check` writes no output");
                    std::process::exit(1);
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    eprintln!("Usage: gramc check <grammar.json> [--max-nodes N]");
                    std::process::exit(1);
                }
            };
            match check_file(&parsed.input, parsed.options) {
                Ok(report) => println!("{report}"),
                Err(err) => fail(&err),
            }
        }
        "dump" => {
            if args.len() < 3 {
                eprintln!("Usage: gramc dump <grammar.cfg>");
                std::process::exit(1);
            }
            match dump_file(Path::new(&args[2])) {
                Ok(text) => print!("{text}"),
                Err(err) => fail(&err),
            }
        }
        "help" | "--help" | "-h" => print_usage(),
        "version" | "--version" | "-V" => {
            println!("gramc {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn fail(err: &gramc::DriverError) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

fn print_compile_usage() {
    eprintln!("Usage: gramc compile <grammar.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o <path>              Output file (default: input with .cfg extension)");
    eprintln!("  --max-nodes <n>        Fail if more than n grammar nodes are lowered");
    eprintln!("  --first-rule-id <n>    Number rules starting at n");
}

fn print_usage() {
    println!("Gram Grammar Compiler");
    println!();
    println!("Usage: gramc <command> [options]");
    println!();
    println!("Commands:");
    println!("  compile <file>   Compile a JSON grammar to a binary CFG");
    println!("  check <file>     Validate a grammar and report table sizes");
    println!("  dump <file>      Print a compiled grammar");
    println!("  help             Show this help");
    println!("  version          Show version");
    println!();
    println!("Set RUST_LOG=debug for compiler tracing.");
}
