use std::process;

#[tokio::main]
async fn main() {
    let code = keeplist_cli::run().await;
    process::exit(code);
}
