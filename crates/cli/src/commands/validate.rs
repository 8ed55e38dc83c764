//! `webpilot validate` - Load the configuration and report what it sets up.

use std::path::Path;
use webpilot_config::AppConfig;

use crate::stack;

pub async fn run(config: Option<&Path>) -> anyhow::Result<()> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("Validating {}", path.display());

    let config = match stack::load_config(Some(&path)) {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e:#}");
            return Err(e);
        }
    };
    println!("   Config parsed successfully");

    let mut warnings = Vec::new();
    if config.web.start_url.is_none() {
        warnings.push("No web.start_url set; the browser starts on a blank page");
    }
    if config.remote.url.is_some() && !config.has_api_key() {
        warnings.push("remote.url is set but no credential (set WEBPILOT_API_KEY)");
    }
    if config.retry.provider.retries == 0 {
        warnings.push("Provider retries are disabled");
    }
    for w in &warnings {
        println!("   Warning: {w}");
    }

    println!();
    println!("   Max steps:    {}", config.agent.max_steps);
    match config.agent.max_duration_secs {
        Some(secs) => println!("   Time budget:  {secs}s"),
        None => println!("   Time budget:  none"),
    }
    println!("   Thoughts:     last {}", config.agent.thought_limit);
    println!(
        "   Retries:      provider {}, driver {}",
        config.retry.provider.retries, config.retry.driver.retries
    );
    if let Some((width, height)) = config.web.virtual_screen() {
        println!("   Screen:       {width}x{height} (virtual)");
    }
    println!(
        "   Desktop:      {}",
        if config.desktop.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
