mod board;
mod filter;
mod loadable;
mod post;

pub use self::board::*;
pub use self::filter::*;
pub use self::loadable::*;
pub use self::post::*;
