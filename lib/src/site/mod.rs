use serde_derive::Deserialize;

use crate::model::Board;

/// How a site serves content. Archive sites hold dead threads from other
/// sites and change how cross-thread links are classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    Imageboard,
    Archive,
}

/// URL templates for a site's API and media endpoints.
///
/// Placeholders `{board}`, `{no}`, `{tim}`, `{ext}` and `{country}` are
/// expanded as pure functions of board and post fields.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteEndpoints {
    pub thread: String,
    pub catalog: String,
    pub image: String,
    pub thumbnail: String,
    #[serde(default)]
    pub flag: Option<String>,
}

impl SiteEndpoints {
    pub fn thread_url(&self, board: &Board, no: u64) -> String {
        expand(&self.thread, &[("board", &board.code), ("no", &no.to_string())])
    }

    pub fn catalog_url(&self, board: &Board) -> String {
        expand(&self.catalog, &[("board", &board.code)])
    }

    /// Full image URL. `ext` is the extension without the leading dot.
    pub fn image_url(&self, board: &Board, tim: &str, ext: &str) -> String {
        expand(&self.image, &[("board", &board.code), ("tim", tim), ("ext", ext)])
    }

    pub fn thumbnail_url(&self, board: &Board, tim: &str) -> String {
        expand(&self.thumbnail, &[("board", &board.code), ("tim", tim)])
    }

    pub fn flag_url(&self, country: &str) -> Option<String> {
        self.flag
            .as_ref()
            .map(|template| expand(template, &[("country", &country.to_lowercase())]))
    }
}

fn expand(template: &str, args: &[(&str, &str)]) -> String {
    let mut result = template.to_owned();

    for (key, value) in args {
        result = result.replace(&format!("{{{}}}", key), value);
    }

    result
}

/// Static description of a site, built from the sites configuration.
#[derive(Clone, Debug)]
pub struct Site {
    pub name: String,
    pub kind: SiteKind,
    /// Whether third-party archives exist for this site's boards; drives dead
    /// link resolution.
    pub archives: bool,
    pub endpoints: SiteEndpoints,
}

impl Site {
    pub fn is_archive(&self) -> bool {
        self.kind == SiteKind::Archive
    }
}
