mod styled;
mod theme;

pub use self::styled::*;
pub use self::theme::*;
