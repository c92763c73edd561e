use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use tracing::info;

use crate::render::Renderer;
use crate::GeneralOptions;

use super::*;

static WAITING_BAR_STYLE: Lazy<ProgressStyle> =
    Lazy::new(|| ProgressStyle::default_bar().template(" {prefix} {pos} {wide_msg}").expect("invalid template"));

const POLL_TICK: Duration = Duration::from_millis(250);
const RETRY_SECONDS: u64 = 60;

pub fn watch(url: &str, options: &GeneralOptions, cancel: &AtomicBool) -> Result<(), CommandError> {
    let (site, loadable) = resolve_url(url, options)?;

    if !loadable.is_thread_mode() {
        return Err(CommandError::new(
            CommandErrorKind::Arguments,
            format!("Not a thread URL: {url}"),
        ));
    }

    let loader = build_loader(site, loadable)?;

    let (listener, rx) = ChannelListener::new();
    loader.add_listener(listener);

    loader.request_data();

    let renderer = Renderer::new(use_color(options));

    // Print posts only once, in arrival order.
    let mut last_printed_no: u64 = 0;

    'watch: loop {
        if cancelled(cancel) {
            break 'watch;
        }

        match rx.recv_timeout(POLL_TICK) {
            Ok(LoaderEvent::Data(snapshot)) => {
                let threshold = last_printed_no;

                for post in snapshot.posts.iter().filter(|post| post.no > threshold) {
                    last_printed_no = post.no;

                    println!("{}", renderer.post_header(post));

                    for line in renderer.comment(&post.styled_comment).lines() {
                        println!("  {}", line);
                    }

                    println!();
                }

                if snapshot.archived || snapshot.closed {
                    let status = if snapshot.archived { "archived" } else { "closed" };
                    eprintln!("Thread is {}.", status);

                    break 'watch;
                }

                // The next poll is scheduled; show the countdown while the
                // channel stays quiet.
                if !countdown(&loader, cancel, "seconds until update...") {
                    break 'watch;
                }
            }
            Ok(LoaderEvent::Error(err)) => {
                eprintln!("Load failed: {}", err);

                // The scheduler stops on failure; wait, then retry manually.
                if !waiting_bar(RETRY_SECONDS, "seconds until retry...", cancel) {
                    break 'watch;
                }

                loader.request_more_data_and_reset_timer();
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                break 'watch;
            }
        }
    }

    info!("Watch stopped.");

    Ok(())
}

/// Tick down until the loader's next scheduled poll starts, or the user
/// cancels. Returns false on cancellation.
fn countdown(loader: &yotsuba::loader::ChanLoader, cancel: &AtomicBool, message: &str) -> bool {
    let remaining_secs = |millis: i64| (millis as u64).div_ceil(1000);

    let remaining = loader.time_until_load_more();
    if remaining <= 0 {
        return true;
    }

    let waiting_bar = ProgressBar::new(remaining_secs(remaining))
        .with_style((*WAITING_BAR_STYLE).clone())
        .with_prefix("Waiting")
        .with_message(message.to_owned())
        .with_position(remaining_secs(remaining));

    // Draw initial bar.
    waiting_bar.tick();

    loop {
        if cancelled(cancel) {
            return false;
        }

        let remaining = loader.time_until_load_more();
        if remaining <= 0 {
            break;
        }

        waiting_bar.set_position(remaining_secs(remaining));
        std::thread::sleep(POLL_TICK);
    }

    waiting_bar.finish_and_clear();

    true
}

/// Wait a fixed time with a progress indicator. Returns false on cancellation.
fn waiting_bar(wait_seconds: u64, message: &str, cancel: &AtomicBool) -> bool {
    let mut seconds_passed: u64 = 0;

    let waiting_bar = ProgressBar::new(wait_seconds)
        .with_style((*WAITING_BAR_STYLE).clone())
        .with_prefix("Waiting")
        .with_message(message.to_owned())
        .with_position(wait_seconds);

    // Draw initial bar.
    waiting_bar.tick();

    while seconds_passed < wait_seconds {
        if cancelled(cancel) {
            return false;
        }

        std::thread::sleep(Duration::from_secs(1));

        seconds_passed += 1;
        waiting_bar.set_position(wait_seconds - seconds_passed);
    }

    waiting_bar.finish_and_clear();

    true
}
