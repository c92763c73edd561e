use std::borrow::Cow;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_derive::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ChanError;
use crate::loader::ProcessingQueue;
use crate::model::{Board, OpMeta, PostBuilder, PostImage};
use crate::site::Site;

use super::ChanReader;

/// Reader for the 4chan JSON API and compatible (vichan-style) sites.
pub struct FourchanReader {
    site: Arc<Site>,
}

impl FourchanReader {
    pub fn new(site: Arc<Site>) -> Self {
        Self { site }
    }

    fn sieve(&self, queue: &mut ProcessingQueue, wire: WirePost) -> Result<(), ChanError> {
        let com = wire.com.clone().unwrap_or_default();

        // Reuse the cached post when the wire comment is byte-identical.
        // Comments do change in place (ban messages), so the number alone is
        // not enough.
        if let Some(cached) = queue.cached_post(wire.no) {
            if cached.raw_comment == com {
                let cached = Arc::clone(cached);
                queue.add_for_reuse(cached);

                return Ok(());
            }
        }

        let board = queue.loadable().board.clone();
        let builder = self.builder_from_wire(&board, wire)?;

        queue.add_for_parse(builder);

        Ok(())
    }

    fn builder_from_wire(&self, board: &Board, wire: WirePost) -> Result<PostBuilder, ChanError> {
        if wire.no == 0 {
            return Err(ChanError::MalformedPost(Cow::Borrowed("post without a post number")));
        }

        let op = wire.resto == 0;

        let mut builder = PostBuilder {
            no: wire.no,
            op,
            op_id: wire.resto,
            board: Some(board.clone()),
            subject: wire.sub,
            name: wire.name,
            tripcode: wire.trip,
            poster_id: wire.id,
            capcode: wire.capcode,
            country_code: wire.country,
            country_name: wire.country_name,
            timestamp: wire.time.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            raw_comment: wire.com.unwrap_or_default(),
            op_meta: OpMeta {
                sticky: wire.sticky == 1,
                closed: wire.closed == 1,
                archived: wire.archived == 1,
                reply_count: wire.replies.unwrap_or(0),
                image_count: wire.images.unwrap_or(0),
                unique_ips: wire.unique_ips.unwrap_or(0),
            },
            ..Default::default()
        };

        if let Some(image) = self.image_from_wire(board, &wire.file) {
            builder.add_image(image);
        }

        for extra in wire.extra_files {
            if let Some(image) = self.image_from_wire(board, &extra) {
                builder.add_image(image);
            }
        }

        Ok(builder)
    }

    fn image_from_wire(&self, board: &Board, file: &WireFile) -> Option<PostImage> {
        let tim = file.tim?.to_string();
        let ext = file.ext.as_deref()?.trim_start_matches('.');

        Some(PostImage {
            url: self.site.endpoints.image_url(board, &tim, ext),
            thumbnail_url: self.site.endpoints.thumbnail_url(board, &tim),
            filename: file.filename.clone().unwrap_or_else(|| tim.clone()),
            extension: ext.to_owned(),
            width: file.w.unwrap_or(0),
            height: file.h.unwrap_or(0),
            size: file.fsize.unwrap_or(0),
            spoiler: file.spoiler == Some(1),
            file_hash: file.md5.clone(),
            deleted: file.filedeleted == Some(1),
        })
    }
}

impl ChanReader for FourchanReader {
    /// Thread envelope: `{"posts": [...]}` with the OP first. A structurally
    /// valid body of any other shape yields zero posts; only invalid JSON is
    /// an error.
    fn load_thread(&self, body: &str, queue: &mut ProcessingQueue) -> Result<(), ChanError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| ChanError::StructuralParse(Cow::Owned(format!("invalid thread JSON: {}", err))))?;

        let Some(posts) = value.get("posts").and_then(Value::as_array) else {
            return Ok(());
        };

        for raw in posts {
            let wire: WirePost = match serde_json::from_value(raw.clone()) {
                Ok(wire) => wire,
                Err(err) => {
                    warn!("Skipping undecodable post: {}", err);
                    continue;
                }
            };

            if wire.resto == 0 {
                queue.set_op(OpMeta {
                    sticky: wire.sticky == 1,
                    closed: wire.closed == 1,
                    archived: wire.archived == 1,
                    reply_count: wire.replies.unwrap_or(0),
                    image_count: wire.images.unwrap_or(0),
                    unique_ips: wire.unique_ips.unwrap_or(0),
                });
            }

            if let Err(err) = self.sieve(queue, wire) {
                warn!("Skipping malformed post: {}", err);
            }
        }

        Ok(())
    }

    /// Catalog envelope: `[{"page": n, "threads": [...]}, ...]` where every
    /// entry is a thread root.
    fn load_catalog(&self, body: &str, queue: &mut ProcessingQueue) -> Result<(), ChanError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| ChanError::StructuralParse(Cow::Owned(format!("invalid catalog JSON: {}", err))))?;

        let Some(pages) = value.as_array() else {
            return Ok(());
        };

        for page in pages {
            let Some(threads) = page.get("threads").and_then(Value::as_array) else {
                continue;
            };

            for raw in threads {
                let mut wire: WirePost = match serde_json::from_value(raw.clone()) {
                    Ok(wire) => wire,
                    Err(err) => {
                        warn!("Skipping undecodable catalog entry: {}", err);
                        continue;
                    }
                };

                // Catalog entries are thread roots regardless of their fields.
                wire.resto = 0;

                if let Err(err) = self.sieve(queue, wire) {
                    warn!("Skipping malformed catalog entry: {}", err);
                }
            }
        }

        Ok(())
    }
}

/// File fields of a wire post. 4chan inlines them in the post object; the
/// vichan `extra_files` array reuses the same shape.
#[derive(Clone, Debug, Default, Deserialize)]
struct WireFile {
    tim: Option<u64>,
    ext: Option<String>,
    filename: Option<String>,
    w: Option<u32>,
    h: Option<u32>,
    fsize: Option<u64>,
    spoiler: Option<u8>,
    filedeleted: Option<u8>,
    md5: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct WirePost {
    no: u64,
    #[serde(default)]
    resto: u64,
    #[serde(default)]
    sticky: u8,
    #[serde(default)]
    closed: u8,
    #[serde(default)]
    archived: u8,
    sub: Option<String>,
    com: Option<String>,
    name: Option<String>,
    trip: Option<String>,
    id: Option<String>,
    capcode: Option<String>,
    country: Option<String>,
    country_name: Option<String>,
    time: Option<i64>,
    replies: Option<u32>,
    images: Option<u32>,
    unique_ips: Option<u32>,
    #[serde(flatten)]
    file: WireFile,
    #[serde(default)]
    extra_files: Vec<WireFile>,
}

#[cfg(test)]
mod tests {
    use crate::model::Loadable;
    use crate::site::{SiteEndpoints, SiteKind};

    use super::*;

    const THREAD_BODY: &str = r#"{
        "posts": [
            {"no": 100, "resto": 0, "sticky": 1, "closed": 0, "time": 1700000000,
             "sub": "Test thread", "com": "op comment", "name": "Anonymous",
             "replies": 2, "images": 1, "unique_ips": 3,
             "tim": 1700000000123, "ext": ".png", "filename": "image",
             "w": 640, "h": 480, "fsize": 12345, "md5": "aGFzaA=="},
            {"no": 101, "resto": 100, "com": "first reply", "name": "Anonymous"},
            {"no": 102, "resto": 100, "com": "second reply", "name": "Anonymous"}
        ]
    }"#;

    fn reader() -> FourchanReader {
        FourchanReader::new(Arc::new(Site {
            name: "testchan".to_owned(),
            kind: SiteKind::Imageboard,
            archives: false,
            endpoints: SiteEndpoints {
                thread: "https://a.example.org/{board}/thread/{no}.json".to_owned(),
                catalog: "https://a.example.org/{board}/catalog.json".to_owned(),
                image: "https://i.example.org/{board}/{tim}.{ext}".to_owned(),
                thumbnail: "https://i.example.org/{board}/{tim}s.jpg".to_owned(),
                flag: None,
            },
        }))
    }

    fn thread_queue() -> ProcessingQueue {
        ProcessingQueue::new(Loadable::thread(Board::new("testchan", "g"), 100), &[])
    }

    #[test]
    fn decodes_thread_envelope() {
        let mut queue = thread_queue();
        reader().load_thread(THREAD_BODY, &mut queue).unwrap();

        let parts = queue.into_parts();
        assert_eq!(parts.to_parse.len(), 3);
        assert!(parts.reused.is_empty());

        let op = parts.op.expect("root object meta");
        assert!(op.sticky);
        assert_eq!(op.reply_count, 2);
        assert_eq!(op.unique_ips, 3);

        let op_builder = &parts.to_parse[0];
        assert!(op_builder.op);
        assert_eq!(op_builder.subject.as_deref(), Some("Test thread"));
        assert_eq!(op_builder.images.len(), 1);

        let image = &op_builder.images[0];
        assert_eq!(image.url, "https://i.example.org/g/1700000000123.png");
        assert_eq!(image.thumbnail_url, "https://i.example.org/g/1700000000123s.jpg");
        assert_eq!(image.extension, "png");
        assert_eq!(image.file_hash.as_deref(), Some("aGFzaA=="));
    }

    #[test]
    fn reuses_cached_posts_with_unchanged_comments() {
        let mut queue = thread_queue();
        reader().load_thread(THREAD_BODY, &mut queue).unwrap();

        let first: Vec<Arc<_>> = queue
            .into_parts()
            .to_parse
            .into_iter()
            .map(|b| Arc::new(b.build().unwrap()))
            .collect();

        let mut queue = ProcessingQueue::new(Loadable::thread(Board::new("testchan", "g"), 100), &first);
        reader().load_thread(THREAD_BODY, &mut queue).unwrap();

        let parts = queue.into_parts();
        assert_eq!(parts.reused.len(), 3);
        assert!(parts.to_parse.is_empty());
    }

    #[test]
    fn edited_comment_goes_back_through_the_parser() {
        let mut queue = thread_queue();
        reader().load_thread(THREAD_BODY, &mut queue).unwrap();

        let first: Vec<Arc<_>> = queue
            .into_parts()
            .to_parse
            .into_iter()
            .map(|b| Arc::new(b.build().unwrap()))
            .collect();

        let edited = THREAD_BODY.replace("first reply", "first reply (USER WAS BANNED)");

        let mut queue = ProcessingQueue::new(Loadable::thread(Board::new("testchan", "g"), 100), &first);
        reader().load_thread(&edited, &mut queue).unwrap();

        let parts = queue.into_parts();
        assert_eq!(parts.reused.len(), 2);
        assert_eq!(parts.to_parse.len(), 1);
        assert_eq!(parts.to_parse[0].no, 101);
    }

    #[test]
    fn wrong_shape_envelope_yields_zero_posts() {
        let mut queue = thread_queue();
        reader().load_thread(r#"{"threads": []}"#, &mut queue).unwrap();
        assert!(queue.is_empty());

        let mut queue = thread_queue();
        reader().load_thread("[1, 2, 3]", &mut queue).unwrap();
        assert!(queue.is_empty());

        let mut queue = thread_queue();
        assert!(reader().load_thread("{not json", &mut queue).is_err());
    }

    #[test]
    fn decodes_catalog_envelope() {
        const CATALOG_BODY: &str = r#"[
            {"page": 1, "threads": [
                {"no": 100, "sub": "First", "com": "a", "replies": 5, "images": 2},
                {"no": 200, "sub": "Second", "com": "b", "replies": 1, "images": 0}
            ]},
            {"page": 2, "threads": [
                {"no": 300, "com": "c"}
            ]}
        ]"#;

        let mut queue = ProcessingQueue::new(Loadable::catalog(Board::new("testchan", "g")), &[]);
        reader().load_catalog(CATALOG_BODY, &mut queue).unwrap();

        let parts = queue.into_parts();
        assert_eq!(parts.to_parse.len(), 3);
        assert!(parts.to_parse.iter().all(|b| b.op));
        assert_eq!(parts.to_parse[0].op_meta.reply_count, 5);
        // The root-object meta slot is thread-mode only.
        assert!(parts.op.is_none());
    }
}
