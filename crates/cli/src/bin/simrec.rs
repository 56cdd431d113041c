use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    simrec_cli::main_entry().await
}
