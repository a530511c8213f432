#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scribed::run().await
}
