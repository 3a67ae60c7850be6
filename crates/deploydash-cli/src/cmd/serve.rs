use anyhow::{Context, Result};
use deploydash_core::config::AuthConfig;
use deploydash_core::settings::Settings;
use deploydash_server::AppState;
use std::time::Duration;

/// Load the auth config (fatal on any problem), then serve until Ctrl-C.
pub fn run(settings: Settings, host: &str, port: u16, open_browser: bool) -> Result<()> {
    let auth = AuthConfig::load(&settings.config_path).with_context(|| {
        format!(
            "failed to load auth config {}",
            settings.config_path.display()
        )
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        let app = AppState::new(settings, auth)?;

        println!("deploy dashboard → http://localhost:{actual_port}");

        tokio::select! {
            res = deploydash_server::serve_on(app, listener, open_browser) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    });
    // Output readers of a still-running script would otherwise hold shutdown.
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}
