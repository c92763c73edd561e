use std::fmt;

/// A board on a specific site, identified by site name and board code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Board {
    pub site: String,
    pub code: String,
}

impl Board {
    pub fn new(site: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}/", self.code)
    }
}
