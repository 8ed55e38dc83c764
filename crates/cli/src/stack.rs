//! Wiring shared by the commands: config in, connectors and options out.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use webpilot_agent::AgentOptions;
use webpilot_config::AppConfig;
use webpilot_connectors::{DesktopConnector, DesktopOptions, WebConnector, WebOptions};
use webpilot_core::{Connector, DriverHandle};

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path, |key| std::env::var(key).ok()),
        None => AppConfig::load(),
    };
    config.context("Failed to load config")
}

/// The surface connectors enabled by `config`, sharing one driver.
pub fn connectors(
    config: &AppConfig,
    driver: Arc<DriverHandle>,
) -> anyhow::Result<Vec<Arc<dyn Connector>>> {
    let web = WebConnector::new(
        Arc::clone(&driver),
        WebOptions {
            start_url: config.web.start_url.clone(),
            virtual_screen: config.web.virtual_screen(),
            retry: config.retry.driver.clone(),
        },
    )?;
    let mut connectors: Vec<Arc<dyn Connector>> = vec![Arc::new(web)];

    if config.desktop.enabled {
        let desktop = DesktopConnector::new(
            driver,
            DesktopOptions {
                min_screenshots: config.desktop.min_screenshots,
                virtual_screen: None,
                retry: config.retry.driver.clone(),
            },
        )?;
        connectors.push(Arc::new(desktop));
    }
    Ok(connectors)
}

pub fn agent_options(config: &AppConfig) -> AgentOptions {
    AgentOptions {
        max_steps: Some(config.agent.max_steps),
        max_duration: config.agent.max_duration(),
        thought_limit: config.agent.thought_limit,
        provider_retry: config.retry.provider.clone(),
        task_actions: true,
    }
}

/// Parse a `Title=URL` tab argument.
pub fn parse_tab(arg: &str) -> anyhow::Result<(String, String)> {
    let (title, url) = arg
        .split_once('=')
        .with_context(|| format!("Tab '{arg}' is not in Title=URL form"))?;
    anyhow::ensure!(!url.trim().is_empty(), "Tab '{arg}' has an empty URL");
    Ok((title.trim().to_string(), url.trim().to_string()))
}

/// Parse a `KEY=VALUE` test data argument. The value may be empty.
pub fn parse_data(arg: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = arg
        .split_once('=')
        .with_context(|| format!("Data '{arg}' is not in KEY=VALUE form"))?;
    anyhow::ensure!(!key.trim().is_empty(), "Data '{arg}' has an empty key");
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use webpilot_connectors::RecordingDriver;

    #[test]
    fn tab_arguments_parse() {
        assert_eq!(
            parse_tab("Docs=https://docs.test").unwrap(),
            ("Docs".to_string(), "https://docs.test".to_string())
        );
        assert!(parse_tab("no-separator").is_err());
        assert!(parse_tab("Empty=").is_err());
    }

    #[test]
    fn data_arguments_parse() {
        assert_eq!(
            parse_data("email=ada@shop.test").unwrap(),
            ("email".to_string(), "ada@shop.test".to_string())
        );
        assert_eq!(parse_data("note=").unwrap().1, "");
        assert_eq!(parse_data("query=a=b").unwrap().1, "a=b");
        assert!(parse_data("=value").is_err());
        assert!(parse_data("bare").is_err());
    }

    #[test]
    fn desktop_connector_follows_config() {
        let driver = Arc::new(RecordingDriver::new().handle());
        let mut config = AppConfig::default();
        assert_eq!(connectors(&config, Arc::clone(&driver)).unwrap().len(), 1);

        config.desktop.enabled = true;
        let ids: Vec<String> = connectors(&config, driver)
            .unwrap()
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ids, vec!["web", "desktop"]);
    }

    #[test]
    fn options_carry_budgets() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 9;
        config.agent.max_duration_secs = Some(60);
        let options = agent_options(&config);
        assert_eq!(options.max_steps, Some(9));
        assert_eq!(options.max_duration, Some(Duration::from_secs(60)));
    }
}
