use std::borrow::Cow;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

mod catalog;
mod thread;
mod watch;

pub use catalog::*;
pub use thread::*;
pub use watch::*;

use yotsuba::config::load_sites_config;
use yotsuba::loader::{ChanLoader, ChanLoaderListener, ThreadSnapshot};
use yotsuba::model::Loadable;
use yotsuba::reader::FourchanReader;
use yotsuba::site::Site;
use yotsuba::store::MemoryUserData;
use yotsuba::text::Theme;
use yotsuba::transport::HttpTransport;
use yotsuba::ChanError;

use crate::{ColorMode, GeneralOptions};

#[derive(Debug)]
pub enum CommandErrorKind {
    Arguments,
    Config,
    Other,
}

impl CommandErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments => 1,
            Self::Config => 2,
            Self::Other => 101,
        }
    }
}

#[derive(Debug)]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub description: Cow<'static, str>,
}

impl CommandError {
    pub fn new<S: Into<Cow<'static, str>>>(kind: CommandErrorKind, description: S) -> CommandError {
        CommandError {
            kind,
            description: description.into(),
        }
    }
}

impl From<ChanError> for CommandError {
    fn from(error: ChanError) -> Self {
        match error {
            ChanError::ReadConfig(err) => {
                CommandError::new(CommandErrorKind::Config, format!("Error reading config file: {err}"))
            }
            ChanError::ParseConfig(err) => {
                CommandError::new(CommandErrorKind::Config, format!("Error parsing configuration: {err}"))
            }
            ChanError::Config(err) => {
                CommandError::new(CommandErrorKind::Config, format!("Configuration error: {err}"))
            }
            err => CommandError::new(CommandErrorKind::Other, err.to_string()),
        }
    }
}

/// Resolve a pasted page URL into its site and Loadable.
pub(crate) fn resolve_url(url: &str, options: &GeneralOptions) -> Result<(Site, Loadable), CommandError> {
    let config = load_sites_config(options.config.as_deref())?;

    config.resolve_url(url)?.ok_or_else(|| {
        CommandError::new(
            CommandErrorKind::Arguments,
            format!("URL not recognized by any configured site: {url}"),
        )
    })
}

pub(crate) fn use_color(options: &GeneralOptions) -> bool {
    use std::io::IsTerminal;

    match options.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}

pub(crate) fn build_loader(site: Site, loadable: Loadable) -> Result<ChanLoader, CommandError> {
    let site = Arc::new(site);
    let transport = HttpTransport::new().map_err(ChanError::from)?;

    Ok(ChanLoader::new(
        loadable,
        Arc::clone(&site),
        Arc::new(FourchanReader::new(site)),
        Arc::new(transport),
        Arc::new(MemoryUserData::new()),
        Theme::default(),
    ))
}

pub(crate) enum LoaderEvent {
    Data(Arc<ThreadSnapshot>),
    Error(ChanError),
}

pub(crate) struct ChannelListener {
    tx: Mutex<mpsc::Sender<LoaderEvent>>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<LoaderEvent>) {
        let (tx, rx) = mpsc::channel();

        (Arc::new(Self { tx: Mutex::new(tx) }), rx)
    }
}

impl ChanLoaderListener for ChannelListener {
    fn on_data(&self, snapshot: &Arc<ThreadSnapshot>) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(LoaderEvent::Data(Arc::clone(snapshot)));
        }
    }

    fn on_error(&self, error: &ChanError) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(LoaderEvent::Error(ChanError::Other(Cow::Owned(error.to_string()))));
        }
    }
}

/// One-shot load: wait for the first data or error event.
pub(crate) fn load_once(site: Site, loadable: Loadable) -> Result<Arc<ThreadSnapshot>, CommandError> {
    let loader = build_loader(site, loadable)?;

    let (listener, rx) = ChannelListener::new();
    loader.add_listener(listener);

    loader.request_data();

    match rx.recv_timeout(Duration::from_secs(60)) {
        Ok(LoaderEvent::Data(snapshot)) => Ok(snapshot),
        Ok(LoaderEvent::Error(err)) => Err(err.into()),
        Err(_) => Err(CommandError::new(CommandErrorKind::Other, "Load timed out")),
    }
}

pub(crate) fn cancelled(cancel: &AtomicBool) -> bool {
    cancel.load(std::sync::atomic::Ordering::SeqCst)
}
