//! `issola init`: write a default config and create the data directory.

use issola_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Issola — First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created data directory: {}", config_dir.display());
    } else {
        println!("  Data directory exists: {}", config_dir.display());
    }

    let storage = AppConfig::default().storage;
    let workspace_dir = storage.resolve(&storage.workspace);
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("Created workspace directory: {}", workspace_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set ISSOLA_API_KEY (or add api_key to the config)");
        println!("   2. Set ISSOLA_SEARCH_API_KEY for the google command");
        println!("   3. Run: issola --goal \"...\"\n");
    }

    Ok(())
}
