#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exammaster_rust::run().await {
        eprintln!("exammaster-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
