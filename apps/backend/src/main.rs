#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jlpt_trainer_backend::run().await
}
