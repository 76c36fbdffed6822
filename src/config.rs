use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub ml_service_url: String,
    pub ml_service_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./splitbench.db".to_string())
            .into();

        let uploads_dir = std::env::var("UPLOADS_DIR")
            .unwrap_or_else(|_| "./uploads".to_string())
            .into();

        let ml_service_url = std::env::var("ML_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let ml_service_timeout_secs = std::env::var("ML_SERVICE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .unwrap_or(120);

        Ok(Self {
            database_path,
            uploads_dir,
            ml_service_url,
            ml_service_timeout_secs,
        })
    }
}
