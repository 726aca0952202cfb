#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = ctrls_rust::run().await {
        eprintln!("ctrls-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
