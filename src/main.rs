use clap::Parser;

use embervine::cli::Cli;
use embervine::config;
use embervine::server::Server;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let servers = match config::load_file(&cli.config_path) {
        Ok(servers) => servers,
        Err(errors) => {
            let source = std::fs::read_to_string(&cli.config_path).unwrap_or_default();
            eprint!("{}", config::render_errors(&errors, &source));
            std::process::exit(1);
        }
    };

    let mut server = match Server::bind(servers) {
        Ok(server) => server,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = server.run() {
        log::error!("{e}");
        std::process::exit(2);
    }
}
