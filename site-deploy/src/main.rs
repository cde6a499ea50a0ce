use site_deploy::{cli, logging};

fn main() {
    logging::init();
    std::process::exit(cli::main_exit_code());
}
