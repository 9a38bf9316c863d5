//! Provider status listing for `scout providers` and `GET /api/providers`.

use anyhow::Result;
use serde::Serialize;

use crate::config::{Config, WebProviderConfig};

/// Configuration status of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub enabled: bool,
    /// Endpoint or file the provider reads from, or why it is unusable.
    pub detail: String,
}

/// Status of every provider named in the config, in registration order.
pub fn provider_statuses(config: &Config) -> Vec<ProviderStatus> {
    let mut out = Vec::new();

    let web = [
        ("edx", &config.providers.edx),
        ("gfg", &config.providers.gfg),
        ("swayam", &config.providers.swayam),
    ];
    for (name, cfg) in web {
        out.push(web_status(name, cfg.as_ref()));
    }

    for (name, cfg) in &config.providers.catalog {
        let (enabled, detail) = if cfg.path.exists() {
            (true, cfg.path.display().to_string())
        } else {
            (false, format!("missing file: {}", cfg.path.display()))
        };
        out.push(ProviderStatus {
            name: name.clone(),
            provider_type: "catalog".to_string(),
            enabled,
            detail,
        });
    }

    out
}

fn web_status(name: &str, cfg: Option<&WebProviderConfig>) -> ProviderStatus {
    let (enabled, detail) = match cfg {
        Some(c) if c.enabled => {
            let endpoint = c
                .search_url
                .clone()
                .or_else(|| c.base_url.clone())
                .unwrap_or_else(|| "default endpoint".to_string());
            (true, endpoint)
        }
        Some(_) => (false, "disabled".to_string()),
        None => (false, "not configured".to_string()),
    };
    ProviderStatus {
        name: name.to_string(),
        provider_type: name.to_string(),
        enabled,
        detail,
    }
}

pub fn list_providers(config: &Config) -> Result<()> {
    println!("{:<16} {:<10} {:<8} DETAIL", "PROVIDER", "TYPE", "ENABLED");
    for s in provider_statuses(config) {
        println!(
            "{:<16} {:<10} {:<8} {}",
            s.name, s.provider_type, s.enabled, s.detail
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogProviderConfig;

    #[test]
    fn test_statuses_cover_all_web_providers() {
        let mut cfg = Config::minimal("x.sqlite");
        cfg.providers.edx = Some(WebProviderConfig {
            enabled: true,
            base_url: None,
            search_url: Some("http://localhost/api?q={query}".to_string()),
        });
        cfg.providers.gfg = Some(WebProviderConfig {
            enabled: false,
            base_url: None,
            search_url: None,
        });
        cfg.providers.catalog.insert(
            "local".to_string(),
            CatalogProviderConfig {
                path: "/nonexistent/courses.json".into(),
            },
        );

        let statuses = provider_statuses(&cfg);
        let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["edx", "gfg", "swayam", "local"]);
        assert!(statuses[0].enabled);
        assert_eq!(statuses[1].detail, "disabled");
        assert_eq!(statuses[2].detail, "not configured");
        assert!(!statuses[3].enabled);
    }
}
