#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ladybug_server::run().await
}
