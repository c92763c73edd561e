use crate::render::Renderer;
use crate::GeneralOptions;

use super::*;

pub fn thread(url: &str, options: &GeneralOptions) -> Result<(), CommandError> {
    let (site, loadable) = resolve_url(url, options)?;

    if !loadable.is_thread_mode() {
        return Err(CommandError::new(
            CommandErrorKind::Arguments,
            format!("Not a thread URL: {url}"),
        ));
    }

    let snapshot = load_once(site, loadable)?;
    let renderer = Renderer::new(use_color(options));

    if let Some(title) = snapshot.loadable.title.as_deref() {
        println!("=== {} ===", title);
        println!();
    }

    for post in &snapshot.posts {
        println!("{}", renderer.post_header(post));

        let comment = renderer.comment(&post.styled_comment);
        if !comment.is_empty() {
            for line in comment.lines() {
                println!("  {}", line);
            }
        }

        for image in &post.images {
            println!("  [file: {}.{} {}x{}]", image.filename, image.extension, image.width, image.height);
        }

        println!();
    }

    Ok(())
}
