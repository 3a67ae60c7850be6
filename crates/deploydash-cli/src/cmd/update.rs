use anyhow::Result;
use deploydash_core::settings::Settings;
use deploydash_core::updater;

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let report = updater::update(&settings.tooling_repo, &settings.base_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in &report.installed {
            println!("installed {}", path.display());
        }
        println!("deploy tooling updated; permissions set to 755");
    }
    Ok(())
}
