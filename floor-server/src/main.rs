use floor_server::sessions::ActivityLog;
use floor_server::{SessionsManager, StoreConfig, logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::init_logger();

    let config = StoreConfig::from_env();
    std::fs::create_dir_all(&config.work_dir)?;
    let db_path = std::path::Path::new(&config.work_dir).join("sessions.redb");

    let mut manager = SessionsManager::new(&db_path, config)?;
    manager.set_activity_log(ActivityLog::spawn());
    tracing::info!(epoch = %manager.epoch(), db = %db_path.display(), "Floor server ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
