use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use serde_derive::Deserialize;
use tracing::error;

use crate::error::ChanError;
use crate::model::{Board, Loadable};
use crate::site::{Site, SiteEndpoints, SiteKind};

pub const BUILTIN_SITES_TOML: &str = include_str!("builtin_sites.toml");
pub const SITES_CONFIG_FILENAME: &str = "sites.toml";
pub const CONFIG_DIR: &str = "yotsuba";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteDef {
    /// Regexes recognizing this site's page URLs. Capture group 1 is the
    /// board code; group 2, when present, is the thread number.
    pub url_regexes: Vec<String>,
    pub kind: SiteKind,
    #[serde(default)]
    pub archives: bool,
    pub endpoints: SiteEndpoints,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SitesConfig {
    #[serde(default = "default_include_builtin_sites")]
    pub include_builtin_sites: bool,
    pub sites: HashMap<String, SiteDef>,
}

/// Used to specify serde default value for the "include_builtin_sites" field.
fn default_include_builtin_sites() -> bool {
    true
}

impl SitesConfig {
    pub fn from_file(path: &Path) -> Result<Self, ChanError> {
        let toml_str = std::fs::read_to_string(path).map_err(ChanError::ReadConfig)?;

        toml_str.parse()
    }

    pub fn load_builtin() -> Result<Self, ChanError> {
        BUILTIN_SITES_TOML.parse()
    }

    pub fn merge_from(&mut self, other: Self) {
        self.sites.extend(other.sites);
    }

    pub fn site(&self, name: &str) -> Option<Site> {
        self.sites.get(name).map(|def| Site {
            name: name.to_owned(),
            kind: def.kind,
            archives: def.archives,
            endpoints: def.endpoints.clone(),
        })
    }

    /// Match a pasted page URL against every site's URL regexes, resolving it
    /// into the site and the Loadable it points at.
    pub fn resolve_url(&self, url: &str) -> Result<Option<(Site, Loadable)>, ChanError> {
        for (name, def) in self.sites.iter() {
            for pattern in def.url_regexes.iter() {
                let regex = Regex::new(pattern)
                    .map_err(|err| ChanError::ParseConfig(Cow::Owned(format!("invalid url regex: {}", err))))?;

                let Some(caps) = regex.captures(url) else {
                    continue;
                };

                let Some(board_code) = caps.get(1) else {
                    continue;
                };

                let board = Board::new(name.clone(), board_code.as_str());

                let loadable = match caps.get(2).map(|no| no.as_str().parse::<u64>()) {
                    Some(Ok(no)) => Loadable::thread(board, no),
                    Some(Err(_)) => continue,
                    None => Loadable::catalog(board),
                };

                let site = Site {
                    name: name.clone(),
                    kind: def.kind,
                    archives: def.archives,
                    endpoints: def.endpoints.clone(),
                };

                return Ok(Some((site, loadable)));
            }
        }

        Ok(None)
    }
}

impl FromStr for SitesConfig {
    type Err = ChanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s).map_err(|err| ChanError::ParseConfig(Cow::Owned(err.to_string())))?;

        Ok(config)
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    let config_path = dirs::config_dir().map(|p| p.join(CONFIG_DIR));

    if config_path.is_none() {
        error!("Could not get configuration path!");
    }

    config_path
}

/// Load the sites configuration: the user file merged over the built-in set,
/// or the built-in set alone when no user file exists.
pub fn load_sites_config(path: Option<&Path>) -> Result<SitesConfig, ChanError> {
    let config_file_path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => get_config_path().map(|p| p.join(SITES_CONFIG_FILENAME)),
    };

    if let Some(config_file_path) = config_file_path {
        if config_file_path.exists() {
            let mut config = SitesConfig::load_builtin()?;
            let user_config = SitesConfig::from_file(&config_file_path)?;

            if user_config.include_builtin_sites {
                config.merge_from(user_config);
                return Ok(config);
            }

            return Ok(user_config);
        }
    }

    SitesConfig::load_builtin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoadableMode;

    #[test]
    fn builtin_sites_parse() {
        let config = SitesConfig::load_builtin().unwrap();

        assert!(config.site("4chan").is_some());
    }

    #[test]
    fn resolves_thread_and_catalog_urls() {
        let config = SitesConfig::load_builtin().unwrap();

        let (site, loadable) = config
            .resolve_url("https://boards.4chan.org/g/thread/123456")
            .unwrap()
            .unwrap();

        assert_eq!(site.name, "4chan");
        assert_eq!(loadable.mode, LoadableMode::Thread);
        assert_eq!(loadable.board.code, "g");
        assert_eq!(loadable.no, 123456);

        let (_, loadable) = config
            .resolve_url("https://boards.4channel.org/g/catalog")
            .unwrap()
            .unwrap();

        assert_eq!(loadable.mode, LoadableMode::Catalog);
        assert_eq!(loadable.no, 0);

        assert!(config.resolve_url("https://example.com/not/a/board").unwrap().is_none());
    }

    #[test]
    fn user_sites_merge_over_builtin() {
        let mut config = SitesConfig::load_builtin().unwrap();

        let user: SitesConfig = r#"
            [sites.testchan]
            kind = "imageboard"
            url-regexes = ['^https?://testchan\.example/(\w+)/res/(\d+)']

            [sites.testchan.endpoints]
            thread = "https://testchan.example/{board}/res/{no}.json"
            catalog = "https://testchan.example/{board}/catalog.json"
            image = "https://testchan.example/{board}/src/{tim}.{ext}"
            thumbnail = "https://testchan.example/{board}/thumb/{tim}s.jpg"
        "#
        .parse()
        .unwrap();

        config.merge_from(user);

        assert!(config.site("testchan").is_some());
        assert!(config.site("4chan").is_some());
    }
}
