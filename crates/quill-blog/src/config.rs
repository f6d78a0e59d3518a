use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BlogError, BlogResult};

/// Gas charged by `check` for each message kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    pub create_user: u64,
    pub create_blog: u64,
    pub change_blog_owner: u64,
    /// Charged once per full `article_cost_unit` bytes of content.
    pub create_article: u64,
    pub article_cost_unit: u64,
    pub create_comment: u64,
    pub create_like: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            create_user: 1,
            create_blog: 10,
            change_blog_owner: 5,
            create_article: 1,
            article_cost_unit: 1000,
            create_comment: 1,
            create_like: 1,
        }
    }
}

impl GasSchedule {
    /// Gas for an article with `content_len` bytes of content.
    pub fn article(&self, content_len: usize) -> u64 {
        let unit = self.article_cost_unit.max(1);
        (content_len as u64).saturating_mul(self.create_article) / unit
    }
}

/// Configuration for the blog application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub gas: GasSchedule,
    /// Index entries fetched per store scan.
    pub scan_page_size: usize,
    /// Upper bound on scheduled tasks fired per block.
    pub max_tasks_per_tick: usize,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            gas: GasSchedule::default(),
            scan_page_size: quill_store::iter::DEFAULT_PAGE_SIZE,
            max_tasks_per_tick: quill_cron::DEFAULT_MAX_TASKS_PER_TICK,
        }
    }
}

impl BlogConfig {
    /// Parse from TOML. Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> BlogResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| BlogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> BlogResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BlogError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> BlogResult<String> {
        toml::to_string(self).map_err(|e| BlogError::Config(e.to_string()))
    }

    fn validate(&self) -> BlogResult<()> {
        if self.scan_page_size == 0 {
            return Err(BlogError::Config("scan_page_size must be at least 1".into()));
        }
        if self.max_tasks_per_tick == 0 {
            return Err(BlogError::Config("max_tasks_per_tick must be at least 1".into()));
        }
        if self.gas.article_cost_unit == 0 {
            return Err(BlogError::Config("gas.article_cost_unit must be at least 1".into()));
        }
        Ok(())
    }
}
