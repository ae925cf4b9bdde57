// Galleria CLI entry point

use galleria_cli::{output, router::CommandRouter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = CommandRouter::route().await {
        output::print_error(&e.user_message());
        if tracing::enabled!(tracing::Level::DEBUG) {
            eprintln!("{}", e.technical_details());
        }
        std::process::exit(1);
    }
    Ok(())
}
