use permitwalk_core::{Config, Paths};
use permitwalk_protocol::{TabNavigator, WalkOutcome};

/// Walk one permit and print its record as pretty JSON.
pub async fn run(permit: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let navigator = TabNavigator::http(&config)?;

    match navigator.walk(permit).await? {
        WalkOutcome::Found(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        WalkOutcome::NotFound => {
            println!("No matching permit: {}", permit.trim());
        }
    }
    Ok(())
}
