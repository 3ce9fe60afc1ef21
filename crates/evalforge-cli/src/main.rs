use clap::Parser;

mod cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evalforge=info".into()),
        )
        .init();

    let args = cli::args::Cli::parse();
    match cli::commands::dispatch(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(cli::commands::exit_codes::FAILED);
        }
    }
}
