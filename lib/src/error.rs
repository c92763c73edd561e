use std::borrow::Cow;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error {code}: {description}")]
    Http { code: u16, description: Cow<'static, str> },
    #[error("Network error: {0}")]
    Network(Cow<'static, str>),
    #[error("Transport error: {0}")]
    Other(Cow<'static, str>),
}

#[derive(Debug, Error)]
pub enum ChanError {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("Response contained no posts")]
    EmptyResponse,
    #[error("Malformed post: {0}")]
    MalformedPost(Cow<'static, str>),
    #[error("Error parsing response structure: {0}")]
    StructuralParse(Cow<'static, str>),
    #[error("Error parsing comment HTML: {0}")]
    HtmlParse(Cow<'static, str>),
    #[error("Error reading config: {0}")]
    ReadConfig(io::Error),
    #[error("Error parsing config: {0}")]
    ParseConfig(Cow<'static, str>),
    #[error("Configuration error: {0}")]
    Config(Cow<'static, str>),
    #[error("{0}")]
    Other(Cow<'static, str>),
}
