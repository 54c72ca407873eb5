use permitwalk_core::{Config, Paths};

/// Show the current configuration as pretty-printed JSON.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(&config)?;

    println!();
    println!("📋 Current Configuration");
    println!("  File: {}", paths.config_file().display());
    if !paths.config_file().exists() {
        println!("  (not written yet, showing defaults)");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Write the default configuration and create the output directory.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    write_default(&paths, force)
}

fn write_default(paths: &Paths, force: bool) -> anyhow::Result<()> {
    let config_path = paths.config_file();
    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    paths.ensure_dirs()?;
    Config::default().save(&config_path)?;
    println!("✓ Config written: {}", config_path.display());
    println!("✓ Output directory: {}", paths.output_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_respects_force() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().join("home"));

        write_default(&paths, false).unwrap();
        assert!(paths.config_file().exists());
        assert!(paths.output_dir().is_dir());

        std::fs::write(paths.config_file(), "{\"crawl\": {\"concurrency\": 9}}").unwrap();
        write_default(&paths, false).unwrap();
        assert_eq!(Config::load(&paths.config_file()).unwrap().crawl.concurrency, 9);

        write_default(&paths, true).unwrap();
        assert_eq!(Config::load(&paths.config_file()).unwrap().crawl.concurrency, 4);
    }
}
