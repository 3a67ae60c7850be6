use anyhow::Result;
use deploydash_core::branches::BranchLister;
use deploydash_core::settings::Settings;

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let lister = BranchLister::from_settings(settings)?;
    let rt = tokio::runtime::Runtime::new()?;
    let listing = rt.block_on(lister.list_branches());

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    if let Some(err) = &listing.error {
        eprintln!("warning: failed to list branches: {err}");
    }
    for branch in &listing.branches {
        println!("{branch}");
    }
    Ok(())
}
