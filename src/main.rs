#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moneybook::server::run().await
}
