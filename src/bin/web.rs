use eventeye::{AppConfig, app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    log::info!(
        "Starting EventEye on {} (data in {})",
        config.bind_addr,
        config.data_dir.display()
    );
    app::run(config).await
}
