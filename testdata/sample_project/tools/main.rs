use std::env;
use std::process;

/// Exit status for bad arguments.
const USAGE: i32 = 2;

struct Args {
    verbose: bool,
    files: Vec<String>,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Option<Args> {
        let mut verbose = false;
        let mut files = Vec::new();
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "-v" | "--verbose" => verbose = true,
                _ if arg.starts_with('-') => return None,
                _ => files.push(arg),
            }
        }
        Some(Args { verbose, files })
    }
}

fn main() {
    // XXX: no help text yet
    let Some(args) = Args::parse() else {
        process::exit(USAGE);
    };
    for file in &args.files {
        if args.verbose {
            eprintln!("reading {}", file);
        }
    }
}
