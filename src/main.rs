use anyhow::Result;
use imptech::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
