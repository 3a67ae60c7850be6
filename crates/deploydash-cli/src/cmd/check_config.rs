use anyhow::{Context, Result};
use deploydash_core::config::AuthConfig;
use deploydash_core::settings::Settings;

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let path = &settings.config_path;
    let config = AuthConfig::load(path)
        .with_context(|| format!("failed to load auth config {}", path.display()))?;

    let users: Vec<&str> = config
        .credentials
        .usernames
        .keys()
        .map(String::as_str)
        .collect();

    if json {
        let out = serde_json::json!({
            "path": path,
            "cookie": config.cookie.name,
            "expiry_days": config.cookie.expiry_days,
            "users": users,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}: ok", path.display());
        println!("  cookie: {} ({} days)", config.cookie.name, config.cookie.expiry_days);
        println!("  users:  {}", users.join(", "));
    }
    Ok(())
}
