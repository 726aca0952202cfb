#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = ctrls_rust::run_worker().await {
        eprintln!("ctrls-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
