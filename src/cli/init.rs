use std::path::PathBuf;

use crate::categories::CategoryBook;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::settings::{db_path, load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        // First run: prompt for data dir
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok();
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;

    let mut kv = SqliteStore::open(&db_path(&settings))?;
    let categories = CategoryBook::load(&kv)?;
    categories.save(&mut kv)?;

    println!("Initialized pocketbook at {}", resolved.display());
    Ok(())
}
