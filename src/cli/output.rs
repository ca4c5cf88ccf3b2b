// Output formatting for CLI

use colored::*;

/// Print a success message to stdout
pub fn print_success(message: &str) {
    println!("{}", format!("✓ {}", message).green().bold());
}

/// Print an error message to stderr
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), message);
}
