use std::error::Error;
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "sql-grid";

pub struct AppPaths;

impl AppPaths {
    pub fn data_dir() -> Result<PathBuf, Box<dyn Error>> {
        let data_dir = dirs::data_dir()
            .ok_or("Cannot determine data directory")?
            .join(APP_DIR);

        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn config_file() -> Result<PathBuf, Box<dyn Error>> {
        let config_dir = dirs::config_dir().ok_or("Cannot determine config directory")?;
        Ok(config_dir.join(APP_DIR).join("config.toml"))
    }

    pub fn column_config_dir() -> Result<PathBuf, Box<dyn Error>> {
        let dir = Self::data_dir()?.join("views");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
