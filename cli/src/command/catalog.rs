use yotsuba::model::{Board, Post};

use crate::GeneralOptions;

use super::*;

pub fn catalog(board: &str, options: &GeneralOptions) -> Result<(), CommandError> {
    let (site, loadable) = if board.contains("://") {
        let (site, loadable) = resolve_url(board, options)?;

        if !loadable.is_catalog_mode() {
            return Err(CommandError::new(
                CommandErrorKind::Arguments,
                format!("Not a catalog URL: {board}"),
            ));
        }

        (site, loadable)
    } else {
        resolve_shorthand(board, options)?
    };

    let snapshot = load_once(site, loadable)?;

    for post in &snapshot.posts {
        let summary = post
            .subject
            .clone()
            .filter(|subject| !subject.trim().is_empty())
            .unwrap_or_else(|| excerpt(post));

        println!(
            "No.{} [{}R/{}I] {}",
            post.no, post.reply_count, post.image_count, summary
        );
    }

    Ok(())
}

/// `site/board` shorthand, e.g. `4chan/g`.
fn resolve_shorthand(board: &str, options: &GeneralOptions) -> Result<(Site, Loadable), CommandError> {
    let config = load_sites_config(options.config.as_deref())?;

    let Some((site_name, board_code)) = board.split_once('/') else {
        return Err(CommandError::new(
            CommandErrorKind::Arguments,
            format!("Expected a catalog URL or site/board shorthand, got: {board}"),
        ));
    };

    let site = config.site(site_name).ok_or_else(|| {
        CommandError::new(CommandErrorKind::Arguments, format!("Unknown site: {site_name}"))
    })?;

    let loadable = Loadable::catalog(Board::new(site_name, board_code));

    Ok((site, loadable))
}

fn excerpt(post: &Post) -> String {
    let line = post.styled_comment.text().lines().next().unwrap_or_default();

    line.chars().take(80).collect()
}
