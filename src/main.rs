use clap::Parser;
use sortling::cli::{Args, run_cli};

fn main() {
    let args = Args::parse();

    println!("Welcome to sortling - type 'help' for commands.");

    let mut stdin = std::io::stdin().lock();
    if let Err(e) = run_cli(&args, &mut stdin) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
