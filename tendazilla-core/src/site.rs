//! Tender portals to discover from

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// A tender portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Human-readable name, copied onto every record as `source_site`
    pub name: String,
    /// Listing page url
    pub url: String,
    /// Known API endpoint, probed before the conventional suffixes
    #[serde(default)]
    pub api_url: Option<String>,
    /// RSS or Atom feed of new notices, read before anything else
    #[serde(default)]
    pub rss_url: Option<String>,
}

impl Site {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            api_url: None,
            rss_url: None,
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = Some(api_url.to_string());
        self
    }

    pub fn with_rss_url(mut self, rss_url: &str) -> Self {
        self.rss_url = Some(rss_url.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Site("name must not be empty".to_string()));
        }
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ModelError::Site(format!(
                "{}: url must be absolute http(s), got {:?}",
                self.name, self.url
            )));
        }
        for (field, value) in [("api_url", &self.api_url), ("rss_url", &self.rss_url)] {
            if let Some(value) = value {
                let value = value.trim();
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(ModelError::Site(format!(
                        "{}: {} must be absolute http(s), got {:?}",
                        self.name, field, value
                    )));
                }
            }
        }
        Ok(())
    }
}
