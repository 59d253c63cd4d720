//! Thin entrypoint for the `tally` binary.

#[tokio::main]
async fn main() {
    let exit_code = tally_cli::run().await;
    std::process::exit(exit_code);
}
