use shd::cli::{output, Cli, FAILURE_EXIT_CODE};

fn main() {
    match Cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(FAILURE_EXIT_CODE);
        }
    }
}
