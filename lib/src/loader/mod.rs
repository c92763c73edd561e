mod pool;
mod queue;
mod watch;

pub use self::pool::*;
pub use self::queue::*;
pub use self::watch::*;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ChanError;
use crate::model::{Board, Loadable, OpMeta, Post};
use crate::parser::{ParseCallback, PostParser};
use crate::reader::ChanReader;
use crate::site::Site;
use crate::store::UserData;
use crate::text::Theme;
use crate::transport::Transport;

/// Immutable result of one successful reconciliation.
///
/// Replaced wholesale on every load; listeners holding an old snapshot keep
/// seeing a consistent post list.
pub struct ThreadSnapshot {
    pub loadable: Loadable,
    pub posts: Vec<Arc<Post>>,
    pub closed: bool,
    pub archived: bool,
}

pub trait ChanLoaderListener: Send + Sync {
    fn on_data(&self, snapshot: &Arc<ThreadSnapshot>);
    fn on_error(&self, error: &ChanError);
}

enum Msg {
    RequestData,
    RequestMoreData { reset_schedule: bool },
    QuickLoad,
    TimerFired { seq: u64 },
    LoadCompleted { generation: u64, result: Result<LoadOutcome, ChanError> },
    Shutdown,
}

/// What a load worker hands back to the dispatch thread.
struct LoadOutcome {
    reused: Vec<Arc<Post>>,
    parsed: Vec<Arc<Post>>,
    op: Option<OpMeta>,
}

struct State {
    snapshot: Option<Arc<ThreadSnapshot>>,
    listeners: Vec<(u64, Arc<dyn ChanLoaderListener>)>,
    next_listener_id: u64,
    /// Bumped when a new load starts; stale completions are dropped.
    generation: u64,
    loading: bool,
    cancel: Option<Arc<AtomicBool>>,
    schedule: BackoffSchedule,
    last_load_time: Option<Instant>,
    timer: Option<WatchTimer>,
    timer_seq: u64,
}

impl State {
    fn clear_timer(&mut self) {
        self.timer_seq += 1;
        self.timer = None;
    }

    fn cancel_in_flight(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }

        self.generation += 1;
        self.loading = false;
    }
}

struct Shared {
    loadable: Loadable,
    site: Arc<Site>,
    reader: Arc<dyn ChanReader>,
    transport: Arc<dyn Transport>,
    user_data: Arc<dyn UserData>,
    parser: Arc<PostParser>,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("loader state lock poisoned")
    }

    fn listeners(&self) -> Vec<Arc<dyn ChanLoaderListener>> {
        self.lock().listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn notify_data(&self, snapshot: &Arc<ThreadSnapshot>) {
        for listener in self.listeners() {
            listener.on_data(snapshot);
        }
    }

    fn notify_error(&self, error: &ChanError) {
        for listener in self.listeners() {
            listener.on_error(error);
        }
    }
}

/// Drives loading, reconciliation and the watch schedule for one [`Loadable`].
///
/// All reconciliation and listener notification happens on a single dispatch
/// thread owned by the loader, so two reconciliations of the same Loadable
/// can never interleave. Network and parsing run on worker threads.
pub struct ChanLoader {
    shared: Arc<Shared>,
    tx: mpsc::Sender<Msg>,
    dispatch: Option<thread::JoinHandle<()>>,
}

impl ChanLoader {
    pub fn new(
        loadable: Loadable,
        site: Arc<Site>,
        reader: Arc<dyn ChanReader>,
        transport: Arc<dyn Transport>,
        user_data: Arc<dyn UserData>,
        theme: Theme,
    ) -> Self {
        let parser = Arc::new(PostParser::new(Arc::clone(&site), theme));

        let shared = Arc::new(Shared {
            loadable,
            site,
            reader,
            transport,
            user_data,
            parser,
            state: Mutex::new(State {
                snapshot: None,
                listeners: Vec::new(),
                next_listener_id: 0,
                generation: 0,
                loading: false,
                cancel: None,
                schedule: BackoffSchedule::new(),
                last_load_time: None,
                timer: None,
                timer_seq: 0,
            }),
        });

        let (tx, rx) = mpsc::channel();

        let dispatch = {
            let shared = Arc::clone(&shared);
            let tx = tx.clone();

            thread::spawn(move || dispatch_loop(shared, tx, rx))
        };

        Self {
            shared,
            tx,
            dispatch: Some(dispatch),
        }
    }

    pub fn loadable(&self) -> &Loadable {
        &self.shared.loadable
    }

    pub fn snapshot(&self) -> Option<Arc<ThreadSnapshot>> {
        self.shared.lock().snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// Milliseconds until the next scheduled poll; zero while a load is in
    /// flight or nothing is scheduled.
    pub fn time_until_load_more(&self) -> i64 {
        let state = self.shared.lock();

        if state.loading {
            return 0;
        }

        let (Some(last), Some(delay)) = (state.last_load_time, state.schedule.current_delay()) else {
            return 0;
        };

        let deadline = last + Duration::from_secs(delay);
        let now = Instant::now();

        if deadline <= now {
            0
        } else {
            (deadline - now).as_millis() as i64
        }
    }

    /// Full (re)load: forgets the cached snapshot and the watch schedule.
    pub fn request_data(&self) {
        let _ = self.tx.send(Msg::RequestData);
    }

    /// Incremental poll against the cached snapshot. No-op while a load is
    /// already in flight.
    pub fn request_more_data(&self) {
        let _ = self.tx.send(Msg::RequestMoreData { reset_schedule: false });
    }

    /// The pull-to-refresh path: cancel the pending timer, snap the schedule
    /// back to eager, then poll.
    pub fn request_more_data_and_reset_timer(&self) {
        let _ = self.tx.send(Msg::RequestMoreData { reset_schedule: true });
    }

    /// Replay the held snapshot to listeners, then poll for changes. Calling
    /// this without a snapshot is a caller bug.
    ///
    /// The replay goes through the dispatch thread like every other
    /// notification, so it cannot interleave with a completing load.
    pub fn quick_load(&self) -> Result<(), ChanError> {
        if self.snapshot().is_none() {
            return Err(ChanError::Other(Cow::Borrowed(
                "quick_load called before any load completed",
            )));
        }

        let _ = self.tx.send(Msg::QuickLoad);

        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn ChanLoaderListener>) -> u64 {
        let mut state = self.shared.lock();

        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((id, listener));

        id
    }

    /// Removing the last listener stops the watch: the pending timer is
    /// cleared, the schedule forgotten and any in-flight request cancelled.
    pub fn remove_listener(&self, id: u64) {
        let mut state = self.shared.lock();

        state.listeners.retain(|(listener_id, _)| *listener_id != id);

        if state.listeners.is_empty() {
            state.clear_timer();
            state.schedule.reset();
            state.cancel_in_flight();
        }
    }
}

impl Drop for ChanLoader {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);

        if let Some(handle) = self.dispatch.take() {
            let _ = handle.join();
        }
    }
}

fn dispatch_loop(shared: Arc<Shared>, tx: mpsc::Sender<Msg>, rx: mpsc::Receiver<Msg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Msg::RequestData => {
                let mut state = shared.lock();

                state.cancel_in_flight();
                state.clear_timer();
                state.schedule.reset();
                state.snapshot = None;

                start_load(&shared, &mut state, &tx);
            }
            Msg::RequestMoreData { reset_schedule } => {
                let mut state = shared.lock();

                if state.loading {
                    continue;
                }

                state.clear_timer();

                if reset_schedule {
                    state.schedule.reset();
                }

                state.generation += 1;

                start_load(&shared, &mut state, &tx);
            }
            Msg::QuickLoad => {
                let snapshot = shared.lock().snapshot.clone();

                if let Some(snapshot) = snapshot {
                    shared.notify_data(&snapshot);
                }

                let mut state = shared.lock();

                if state.loading {
                    continue;
                }

                state.clear_timer();
                state.generation += 1;

                start_load(&shared, &mut state, &tx);
            }
            Msg::TimerFired { seq } => {
                let mut state = shared.lock();

                if seq != state.timer_seq || state.loading {
                    continue;
                }

                state.timer = None;
                state.generation += 1;

                start_load(&shared, &mut state, &tx);
            }
            Msg::LoadCompleted { generation, result } => {
                handle_completion(&shared, &tx, generation, result);
            }
            Msg::Shutdown => {
                let mut state = shared.lock();
                state.cancel_in_flight();
                state.clear_timer();

                break;
            }
        }
    }
}

fn start_load(shared: &Arc<Shared>, state: &mut State, tx: &mpsc::Sender<Msg>) {
    let generation = state.generation;
    let cached: Vec<Arc<Post>> = state
        .snapshot
        .as_ref()
        .map(|snapshot| snapshot.posts.clone())
        .unwrap_or_default();

    let cancel = Arc::new(AtomicBool::new(false));
    state.cancel = Some(Arc::clone(&cancel));
    state.loading = true;

    let shared = Arc::clone(shared);
    let tx = tx.clone();

    thread::spawn(move || {
        let result = run_load_cycle(&shared, &cached, &cancel);

        if cancel.load(Ordering::Relaxed) {
            debug!("Dropping result of cancelled load");
            return;
        }

        let _ = tx.send(Msg::LoadCompleted { generation, result });
    });
}

fn run_load_cycle(shared: &Shared, cached: &[Arc<Post>], cancel: &AtomicBool) -> Result<LoadOutcome, ChanError> {
    let loadable = &shared.loadable;
    let board = &loadable.board;

    let url = if loadable.is_thread_mode() {
        shared.site.endpoints.thread_url(board, loadable.no)
    } else {
        shared.site.endpoints.catalog_url(board)
    };

    debug!(%url, "Loading");

    let body = shared.transport.fetch(&url)?;

    if cancel.load(Ordering::Relaxed) {
        return Err(ChanError::Other(Cow::Borrowed("load cancelled")));
    }

    let mut queue = ProcessingQueue::new(loadable.clone(), cached);

    if loadable.is_thread_mode() {
        shared.reader.load_thread(&body, &mut queue)?;
    } else {
        shared.reader.load_catalog(&body, &mut queue)?;
    }

    let parts = queue.into_parts();

    let callback = LoadCallback {
        board: board.clone(),
        internal_nos: parts.internal_nos,
        user_data: Arc::clone(&shared.user_data),
    };

    let filters = shared.user_data.filters_for(board);
    let parsed = parse_posts(&shared.parser, &filters, &callback, parts.to_parse);

    Ok(LoadOutcome {
        reused: parts.reused,
        parsed,
        op: parts.op,
    })
}

enum Publication {
    Data(Arc<ThreadSnapshot>),
    Error(ChanError),
}

fn handle_completion(
    shared: &Arc<Shared>,
    tx: &mpsc::Sender<Msg>,
    generation: u64,
    result: Result<LoadOutcome, ChanError>,
) {
    let publication = {
        let mut state = shared.lock();

        if generation != state.generation {
            debug!("Dropping stale load completion");
            return;
        }

        state.loading = false;
        state.cancel = None;
        state.last_load_time = Some(Instant::now());

        let reconciled = result.and_then(|outcome| {
            let mut new_posts = outcome.reused;
            new_posts.extend(outcome.parsed);

            reconcile(state.snapshot.as_deref(), &shared.loadable, new_posts, outcome.op)
        });

        match reconciled {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(Arc::clone(&snapshot));

                let watchable = shared.loadable.is_thread_mode()
                    && !snapshot.archived
                    && !snapshot.closed
                    && !state.listeners.is_empty();

                if watchable {
                    let delay = state.schedule.next_delay(snapshot.posts.len());
                    state.timer_seq += 1;
                    let seq = state.timer_seq;

                    let timer_tx = tx.clone();
                    state.timer = Some(WatchTimer::start(Duration::from_secs(delay), move || {
                        let _ = timer_tx.send(Msg::TimerFired { seq });
                    }));

                    debug!(delay, "Next poll scheduled");
                } else {
                    state.clear_timer();
                    state.schedule.reset();
                }

                Publication::Data(snapshot)
            }
            Err(err) => {
                // Failures keep the previous snapshot and stop the watch;
                // retrying is up to the caller.
                state.clear_timer();
                state.schedule.reset();

                Publication::Error(err)
            }
        }
    };

    match publication {
        Publication::Data(snapshot) => shared.notify_data(&snapshot),
        Publication::Error(err) => {
            warn!("Load failed: {}", err);
            shared.notify_error(&err);
        }
    }
}

struct LoadCallback {
    board: Board,
    internal_nos: BTreeSet<u64>,
    user_data: Arc<dyn UserData>,
}

impl ParseCallback for LoadCallback {
    fn is_internal(&self, no: u64) -> bool {
        self.internal_nos.contains(&no)
    }

    fn is_saved(&self, no: u64) -> bool {
        self.user_data.is_saved_reply(&self.board, no)
    }
}

/// Merge a freshly loaded post list over the previous snapshot.
///
/// Thread mode keeps every previously seen post, flagging the ones absent
/// from the response as deleted; catalog mode takes the response as the new
/// listing, ordered by post number. `replies_from` is recomputed from
/// scratch over the merged set either way.
fn reconcile(
    prev: Option<&ThreadSnapshot>,
    loadable: &Loadable,
    new_posts: Vec<Arc<Post>>,
    op: Option<OpMeta>,
) -> Result<ThreadSnapshot, ChanError> {
    if new_posts.is_empty() {
        return Err(ChanError::EmptyResponse);
    }

    let mut by_no: BTreeMap<u64, Arc<Post>> = new_posts.iter().map(|post| (post.no, Arc::clone(post))).collect();

    // Root-object fields win over whatever the root post carries, without
    // mutating the shared original.
    if let Some(meta) = &op {
        let root_no = new_posts.iter().find(|post| post.is_op()).map(|post| post.no);

        if let Some(root) = root_no.and_then(|no| by_no.get(&no)) {
            let changed = root.sticky != meta.sticky
                || root.closed != meta.closed
                || root.archived != meta.archived
                || root.reply_count != meta.reply_count
                || root.image_count != meta.image_count
                || root.unique_ips != meta.unique_ips;

            if changed {
                let merged = Arc::new(root.with_op_meta(meta));
                by_no.insert(merged.no, merged);
            }
        }
    }

    let mut merged: Vec<Arc<Post>> = Vec::with_capacity(new_posts.len());
    let mut prev_nos: BTreeSet<u64> = BTreeSet::new();

    if let Some(prev) = prev {
        for post in &prev.posts {
            prev_nos.insert(post.no);

            match by_no.get(&post.no) {
                Some(new_post) => {
                    // Reappearing posts lose their deleted flag.
                    new_post.set_deleted(false);
                    merged.push(Arc::clone(new_post));
                }
                None if loadable.is_thread_mode() => {
                    post.set_deleted(true);
                    merged.push(Arc::clone(post));
                }
                // Catalog listings are naturally incomplete; absence means
                // the thread left the listing, not that it was deleted.
                None => {}
            }
        }
    }

    for post in &new_posts {
        if !prev_nos.contains(&post.no) {
            let post = by_no.get(&post.no).unwrap_or(post);
            merged.push(Arc::clone(post));
        }
    }

    if loadable.is_catalog_mode() {
        merged.sort_by_key(|post| post.no);
        merged.dedup_by_key(|post| post.no);
    }

    // Full transpose of replies_to over the merged set; quote targets outside
    // the set are skipped.
    let nos: BTreeSet<u64> = merged.iter().map(|post| post.no).collect();
    let mut inverted: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();

    for post in &merged {
        for &target in &post.replies_to {
            if nos.contains(&target) {
                inverted.entry(target).or_default().insert(post.no);
            }
        }
    }

    for post in &merged {
        post.set_replies_from(inverted.remove(&post.no).unwrap_or_default());
    }

    let root = merged.iter().find(|post| post.is_op());
    let (closed, archived) = root
        .map(|root| (root.closed, root.archived))
        .unwrap_or((false, false));

    let mut loadable = loadable.clone();
    if loadable.is_thread_mode() && loadable.title.is_none() {
        loadable.title = root.map(|root| derive_title(root));
    }

    Ok(ThreadSnapshot {
        loadable,
        posts: merged,
        closed,
        archived,
    })
}

/// Display title for a thread: OP subject, else the leading plain text of
/// the OP comment, else "/board/no".
fn derive_title(root: &Post) -> String {
    if let Some(subject) = root.subject.as_deref() {
        if !subject.trim().is_empty() {
            return subject.trim().to_owned();
        }
    }

    let comment = root.styled_comment.text().trim();
    if !comment.is_empty() {
        return comment.chars().take(200).collect();
    }

    format!("{}{}", root.board, root.no)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use crate::model::PostBuilder;
    use crate::reader::FourchanReader;
    use crate::site::{SiteEndpoints, SiteKind};
    use crate::store::MemoryUserData;
    use crate::transport::Transport;
    use crate::TransportError;

    use super::*;

    fn board() -> Board {
        Board::new("testchan", "g")
    }

    fn post(no: u64, op_id: u64, replies_to: &[u64]) -> Arc<Post> {
        let builder = PostBuilder {
            no,
            op: no == op_id,
            op_id,
            board: Some(board()),
            replies_to: replies_to.iter().copied().collect(),
            ..Default::default()
        };

        Arc::new(builder.build().unwrap())
    }

    fn thread_loadable() -> Loadable {
        Loadable::thread(board(), 1)
    }

    #[test]
    fn empty_response_is_an_error() {
        let result = reconcile(None, &thread_loadable(), Vec::new(), None);

        assert!(matches!(result, Err(ChanError::EmptyResponse)));
    }

    #[test]
    fn replies_from_is_the_transpose_of_replies_to() {
        let posts = vec![
            post(1, 1, &[]),
            post(2, 1, &[1]),
            post(3, 1, &[1, 2, 999]), // 999 is a ghost
        ];

        let snapshot = reconcile(None, &thread_loadable(), posts, None).unwrap();

        assert_eq!(snapshot.posts[0].replies_from(), [2, 3].into_iter().collect());
        assert_eq!(snapshot.posts[1].replies_from(), [3].into_iter().collect());
        assert!(snapshot.posts[2].replies_from().is_empty());
    }

    #[test]
    fn absent_posts_are_flagged_deleted_in_thread_mode_only() {
        let loadable = thread_loadable();

        let first = reconcile(None, &loadable, vec![post(1, 1, &[]), post(2, 1, &[1])], None).unwrap();

        // Post 2 is gone from the next response.
        let second = reconcile(Some(&first), &loadable, vec![Arc::clone(&first.posts[0])], None).unwrap();

        assert_eq!(second.posts.len(), 2);
        assert!(!second.posts[0].deleted());
        assert!(second.posts[1].deleted());

        // Same sequence in catalog mode: absence just drops the entry.
        let catalog = Loadable::catalog(board());
        let first = reconcile(None, &catalog, vec![post(1, 1, &[]), post(2, 2, &[])], None).unwrap();
        let second = reconcile(Some(&first), &catalog, vec![Arc::clone(&first.posts[0])], None).unwrap();

        assert_eq!(second.posts.len(), 1);
        assert!(!second.posts[0].deleted());
    }

    #[test]
    fn reappearing_post_loses_its_deleted_flag() {
        let loadable = thread_loadable();

        let first = reconcile(None, &loadable, vec![post(1, 1, &[]), post(2, 1, &[])], None).unwrap();
        let second = reconcile(Some(&first), &loadable, vec![Arc::clone(&first.posts[0])], None).unwrap();
        assert!(second.posts[1].deleted());

        let third = reconcile(
            Some(&second),
            &loadable,
            vec![Arc::clone(&second.posts[0]), Arc::clone(&second.posts[1])],
            None,
        )
        .unwrap();

        assert!(!third.posts[1].deleted());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let loadable = thread_loadable();
        let response = vec![post(1, 1, &[]), post(2, 1, &[1])];

        let first = reconcile(None, &loadable, response.clone(), None).unwrap();
        let second = reconcile(Some(&first), &loadable, response, None).unwrap();

        assert_eq!(first.posts.len(), second.posts.len());

        for (a, b) in first.posts.iter().zip(second.posts.iter()) {
            assert_eq!(a.no, b.no);
            assert_eq!(a.deleted(), b.deleted());
            assert_eq!(a.replies_from(), b.replies_from());
        }
    }

    #[test]
    fn root_object_meta_overwrites_the_root_post() {
        let loadable = thread_loadable();

        let meta = OpMeta {
            closed: true,
            reply_count: 7,
            ..Default::default()
        };

        let snapshot = reconcile(None, &loadable, vec![post(1, 1, &[]), post(2, 1, &[])], Some(meta)).unwrap();

        assert!(snapshot.closed);
        assert!(snapshot.posts[0].closed);
        assert_eq!(snapshot.posts[0].reply_count, 7);
        // The reply stays untouched.
        assert!(!snapshot.posts[1].closed);
    }

    #[test]
    fn derives_a_title_for_the_thread() {
        let loadable = thread_loadable();

        let mut builder = PostBuilder {
            no: 1,
            op: true,
            op_id: 1,
            board: Some(board()),
            ..Default::default()
        };
        builder.subject = Some("Sticky general".to_owned());

        let snapshot = reconcile(None, &loadable, vec![Arc::new(builder.build().unwrap())], None).unwrap();
        assert_eq!(snapshot.loadable.title.as_deref(), Some("Sticky general"));

        // No subject, no comment: fall back to the post address.
        let snapshot = reconcile(None, &loadable, vec![post(1, 1, &[])], None).unwrap();
        assert_eq!(snapshot.loadable.title.as_deref(), Some("/g/1"));
    }

    // Full cycle against a canned transport.

    struct CannedTransport {
        bodies: Mutex<Vec<Result<String, u16>>>,
    }

    impl CannedTransport {
        fn new(bodies: Vec<Result<String, u16>>) -> Self {
            Self {
                bodies: Mutex::new(bodies),
            }
        }
    }

    impl Transport for CannedTransport {
        fn fetch(&self, _url: &str) -> Result<String, TransportError> {
            let mut bodies = self.bodies.lock().unwrap();

            match bodies.remove(0) {
                Ok(body) => Ok(body),
                Err(code) => Err(TransportError::Http {
                    code,
                    description: "canned".into(),
                }),
            }
        }
    }

    /// Transport that holds each fetch until the test releases it.
    struct GatedTransport {
        release: Mutex<mpsc::Receiver<()>>,
        bodies: Mutex<Vec<Result<String, u16>>>,
    }

    impl Transport for GatedTransport {
        fn fetch(&self, _url: &str) -> Result<String, TransportError> {
            let _ = self.release.lock().unwrap().recv();

            let mut bodies = self.bodies.lock().unwrap();

            match bodies.remove(0) {
                Ok(body) => Ok(body),
                Err(code) => Err(TransportError::Http {
                    code,
                    description: "canned".into(),
                }),
            }
        }
    }

    enum Event {
        Data(Arc<ThreadSnapshot>),
        Error(String),
    }

    struct ChannelListener {
        tx: Mutex<mpsc::Sender<Event>>,
    }

    impl ChanLoaderListener for ChannelListener {
        fn on_data(&self, snapshot: &Arc<ThreadSnapshot>) {
            let _ = self.tx.lock().unwrap().send(Event::Data(Arc::clone(snapshot)));
        }

        fn on_error(&self, error: &ChanError) {
            let _ = self.tx.lock().unwrap().send(Event::Error(error.to_string()));
        }
    }

    fn test_site() -> Arc<Site> {
        Arc::new(Site {
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
        })
    }

    fn loader_with(bodies: Vec<Result<String, u16>>) -> (ChanLoader, mpsc::Receiver<Event>) {
        let site = test_site();

        let loader = ChanLoader::new(
            Loadable::thread(board(), 100),
            Arc::clone(&site),
            Arc::new(FourchanReader::new(Arc::clone(&site))),
            Arc::new(CannedTransport::new(bodies)),
            Arc::new(MemoryUserData::new()),
            Theme::default(),
        );

        let (tx, rx) = mpsc::channel();
        loader.add_listener(Arc::new(ChannelListener { tx: Mutex::new(tx) }));

        (loader, rx)
    }

    const THREAD_BODY: &str = r##"{
        "posts": [
            {"no": 100, "resto": 0, "com": "op", "replies": 1},
            {"no": 101, "resto": 100, "com": "<a href=\"#p100\">&gt;&gt;100</a> nice"}
        ]
    }"##;

    fn recv(rx: &mpsc::Receiver<Event>) -> Event {
        rx.recv_timeout(Duration::from_secs(5)).expect("listener event")
    }

    #[test]
    fn full_load_cycle_delivers_a_reconciled_snapshot() {
        let (loader, rx) = loader_with(vec![Ok(THREAD_BODY.to_owned())]);

        loader.request_data();

        let Event::Data(snapshot) = recv(&rx) else {
            panic!("expected data");
        };

        assert_eq!(snapshot.posts.len(), 2);
        assert_eq!(snapshot.posts[0].replies_from(), [101].into_iter().collect());
        assert_eq!(snapshot.posts[1].styled_comment.text(), ">>100 (OP) nice");
        assert!(!loader.is_loading());
        assert!(loader.snapshot().is_some());

        // A poll is now pending for the watched thread.
        assert!(loader.time_until_load_more() > 0);
    }

    #[test]
    fn transport_failure_reaches_the_error_listener() {
        let (loader, rx) = loader_with(vec![Err(404)]);

        loader.request_data();

        let Event::Error(message) = recv(&rx) else {
            panic!("expected error");
        };

        assert!(message.contains("404"));
        assert!(loader.snapshot().is_none());
        assert_eq!(loader.time_until_load_more(), 0);
    }

    #[test]
    fn wrong_shape_envelope_surfaces_empty_response() {
        let (loader, rx) = loader_with(vec![Ok(r#"{"threads": []}"#.to_owned())]);

        loader.request_data();

        let Event::Error(message) = recv(&rx) else {
            panic!("expected error");
        };

        assert_eq!(message, ChanError::EmptyResponse.to_string());
    }

    #[test]
    fn superseded_load_never_reaches_listeners() {
        let (release_tx, release_rx) = mpsc::channel();

        let site = test_site();
        let loader = ChanLoader::new(
            Loadable::thread(board(), 100),
            Arc::clone(&site),
            Arc::new(FourchanReader::new(Arc::clone(&site))),
            Arc::new(GatedTransport {
                release: Mutex::new(release_rx),
                bodies: Mutex::new(vec![Ok(THREAD_BODY.to_owned()), Ok(THREAD_BODY.to_owned())]),
            }),
            Arc::new(MemoryUserData::new()),
            Theme::default(),
        );

        let (tx, rx) = mpsc::channel();
        loader.add_listener(Arc::new(ChannelListener { tx: Mutex::new(tx) }));

        // The second request cancels the first while its fetch is still held
        // by the gate.
        loader.request_data();
        loader.request_data();

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        // Exactly one snapshot arrives: the superseding load's. The cancelled
        // load's result is suppressed by the cancel flag and the generation
        // check, never partially delivered.
        let Event::Data(snapshot) = recv(&rx) else {
            panic!("expected data");
        };
        assert_eq!(snapshot.posts.len(), 2);

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn quick_load_replays_the_snapshot() {
        let (loader, rx) = loader_with(vec![Ok(THREAD_BODY.to_owned()), Ok(THREAD_BODY.to_owned())]);

        assert!(loader.quick_load().is_err());

        loader.request_data();
        let Event::Data(_) = recv(&rx) else {
            panic!("expected data");
        };

        loader.quick_load().unwrap();

        // The cached snapshot arrives first, then the fresh poll result.
        let Event::Data(cached) = recv(&rx) else {
            panic!("expected cached data");
        };
        assert_eq!(cached.posts.len(), 2);

        let Event::Data(fresh) = recv(&rx) else {
            panic!("expected fresh data");
        };
        assert_eq!(fresh.posts.len(), 2);
    }
}
