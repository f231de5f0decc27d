use clap::Parser;
use repostats_app::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    repostats_app::run(args).await
}
