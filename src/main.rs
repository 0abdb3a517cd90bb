use clap::Parser;
use crypttool::cli::{commands, load_settings, logging, output, Cli, Commands};
use crypttool::errors::Result;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    if let Err(e) = run(&cli) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Generate {
            private_key_file,
            public_key_file,
        } => commands::generate::execute(private_key_file, public_key_file),
        Commands::Completions { shell } => commands::completions::execute(*shell),
        Commands::Encrypt {
            public_key_file,
            paas,
            data_file,
        } => commands::encrypt::execute(
            &load_settings(cli)?,
            public_key_file.as_deref(),
            paas,
            data_file.as_deref(),
        ),
        Commands::Decrypt {
            private_key_files,
            paas,
            data_file,
        } => commands::decrypt::execute(
            &load_settings(cli)?,
            private_key_files,
            paas,
            data_file.as_deref(),
        ),
        Commands::Reencrypt {
            private_key_files,
            public_key_file,
            files,
        } => commands::reencrypt::execute(
            &load_settings(cli)?,
            private_key_files,
            public_key_file.as_deref(),
            files,
        ),
        Commands::CheckPaas {
            private_key_files,
            output: format,
            files,
        } => commands::check_paas::execute(&load_settings(cli)?, private_key_files, *format, files),
    }
}
