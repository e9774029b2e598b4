use colored::Colorize;

fn main() {
    if let Err(e) = definer_cli::run() {
        eprintln!("{} {}", "✗".red(), e.to_string().red());
        std::process::exit(1);
    }
}
