use chrono::{Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use task_feed_lib::{
    open_feed, translate, CompanyProfile, Database, FeedConfig, FeedController, FeedPhase, FeedQuery,
    FeedState, FilterSpec, MemoryStore, Post, PostStatus, PostStore, PostWithCompany, SortColumn, SortKey,
    SortPreset, SortSpec, StoreFuture,
};
use tokio::sync::{mpsc, oneshot};

/// Memory store that counts queries and can park the next one until released.
struct HeldStore {
    inner: MemoryStore,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    entered: mpsc::UnboundedSender<()>,
    calls: AtomicUsize,
}

impl HeldStore {
    fn new(rows: Vec<PostWithCompany>) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let store = Arc::new(Self {
            inner: MemoryStore::new(rows),
            hold: Mutex::new(None),
            entered,
            calls: AtomicUsize::new(0),
        });
        (store, entered_rx)
    }

    fn arm(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.hold.lock().expect("hold lock") = Some(gate);
        release
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PostStore for HeldStore {
    fn name(&self) -> &'static str {
        "held"
    }

    fn query<'a>(&'a self, query: &'a FeedQuery) -> StoreFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.hold.lock().expect("hold lock").take();
            if let Some(gate) = gate {
                let _ = self.entered.send(());
                let _ = gate.await;
            }
            self.inner.select(query)
        })
    }
}

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
}

fn post(id: &str, company_id: &str, reward: i64, status: PostStatus, minute: i64) -> PostWithCompany {
    PostWithCompany {
        post: Post {
            id: id.to_string(),
            company_id: company_id.to_string(),
            title: format!("Task {}", id),
            description: "Help wanted".to_string(),
            reward,
            status,
            created_at: base_time() + Duration::minutes(minute),
        },
        company: None,
    }
}

/// Rewards 100..=1900 in steps of 100, every other one OPEN.
fn reward_ladder() -> Vec<PostWithCompany> {
    (1..=19)
        .map(|step| {
            let status = if step % 2 == 0 { PostStatus::Open } else { PostStatus::Closed };
            post(&format!("r{:02}", step), "acme", step * 100, status, step)
        })
        .collect()
}

/// Rows with heavy ties on every sortable column.
fn tied_rows() -> Vec<PostWithCompany> {
    let statuses = [
        PostStatus::Open,
        PostStatus::ClosingSoon,
        PostStatus::Closed,
        PostStatus::UnderReview,
    ];
    (0..40)
        .map(|index: i64| {
            let company = if index % 3 == 0 { "globex" } else { "acme" };
            post(
                &format!("t{:02}", index),
                company,
                (index * 37 % 7) * 100,
                statuses[(index % 4) as usize],
                index * 13 % 17,
            )
        })
        .collect()
}

fn by_reward_desc() -> SortSpec {
    SortSpec::new(vec![SortKey::desc(SortColumn::Reward)]).expect("sort")
}

fn controller_for(store: Arc<dyn PostStore>, filter: FilterSpec, sort: SortSpec, page_size: u32) -> FeedController {
    FeedController::with_state(store, FeedState::new(filter, sort, page_size).expect("feed state"))
}

fn rewards(items: &[PostWithCompany]) -> Vec<i64> {
    items.iter().map(|item| item.post.reward).collect()
}

fn ids(items: &[PostWithCompany]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}

#[tokio::test]
async fn reward_ladder_pages_nine_at_a_time() {
    let (store, _entered) = HeldStore::new(reward_ladder());
    let controller = controller_for(store.clone(), FilterSpec::default(), by_reward_desc(), 9);

    let first = controller.load_more().await;
    assert_eq!(rewards(&first.items), (11..=19).rev().map(|step| step * 100).collect::<Vec<i64>>());
    assert!(!first.is_exhausted);
    assert_eq!(first.phase, FeedPhase::Ready);

    let second = controller.load_more().await;
    assert_eq!(second.items.len(), 18);
    assert_eq!(rewards(&second.items[9..]), (2..=10).rev().map(|step| step * 100).collect::<Vec<i64>>());
    assert!(!second.is_exhausted);

    let third = controller.load_more().await;
    assert_eq!(third.items.len(), 19);
    assert_eq!(third.items[18].post.reward, 100);
    assert!(third.is_exhausted);
    assert_eq!(store.calls(), 3);

    let fourth = controller.load_more().await;
    assert_eq!(fourth.items.len(), 19);
    assert_eq!(store.calls(), 3, "exhausted feed must not query again");
}

#[tokio::test]
async fn exact_multiple_of_page_size_costs_one_empty_request() {
    let rows: Vec<PostWithCompany> = reward_ladder().into_iter().take(18).collect();
    let (store, _entered) = HeldStore::new(rows);
    let controller = controller_for(store.clone(), FilterSpec::default(), by_reward_desc(), 9);

    controller.load_more().await;
    let second = controller.load_more().await;
    assert_eq!(second.items.len(), 18);
    assert!(!second.is_exhausted);

    let third = controller.load_more().await;
    assert_eq!(third.items.len(), 18);
    assert!(third.is_exhausted);
    assert!(third.empty_state.is_none());
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn paginated_order_matches_unpaginated_order() {
    let rows = tied_rows();
    let store = Arc::new(MemoryStore::new(rows));
    let filters = vec![
        FilterSpec::default(),
        FilterSpec::default().with_statuses([PostStatus::Open, PostStatus::Closed]),
        FilterSpec {
            min_reward: 200,
            max_reward: 500,
            ..FilterSpec::default()
        },
        FilterSpec {
            company_id: Some("globex".to_string()),
            ..FilterSpec::default()
        },
    ];

    for preset in SortPreset::all() {
        for filter in &filters {
            let sort = preset.spec();
            let full = store
                .select(&translate(filter, &sort, None, 1_000, Utc::now()).expect("translate"))
                .expect("full query");

            let controller = controller_for(store.clone(), filter.clone(), sort, 4);
            let mut snapshot = controller.load_more().await;
            while !snapshot.is_exhausted {
                snapshot = controller.load_more().await;
                assert!(!snapshot.has_error);
            }

            let unique: HashSet<String> = ids(&snapshot.items).into_iter().collect();
            assert_eq!(unique.len(), snapshot.items.len(), "duplicate ids for {:?}", preset);
            assert_eq!(ids(&snapshot.items), ids(&full), "order mismatch for {:?} / {:?}", preset, filter);
        }
    }
}

#[tokio::test]
async fn status_filter_mid_scroll_restarts_from_the_top() {
    let (store, _entered) = HeldStore::new(reward_ladder());
    let controller = controller_for(store.clone(), FilterSpec::default(), by_reward_desc(), 4);
    controller.load_more().await;
    let before = controller.load_more().await;
    assert_eq!(before.items.len(), 8);

    let snapshot = controller
        .apply_filter(FilterSpec::default().with_statuses([PostStatus::Open]))
        .await
        .expect("apply filter");
    assert_eq!(rewards(&snapshot.items), vec![1800, 1600, 1400, 1200]);
    assert!(snapshot
        .items
        .iter()
        .all(|item| item.post.status == PostStatus::Open));
    assert_eq!(snapshot.pages_loaded, 1);
    assert_eq!(snapshot.first_item_id.as_deref(), Some("r18"));
}

#[tokio::test]
async fn restart_clears_items_before_its_page_arrives() {
    let (store, mut entered) = HeldStore::new(reward_ladder());
    let controller = controller_for(store.clone(), FilterSpec::default(), by_reward_desc(), 9);
    controller.load_more().await;

    let release = store.arm();
    let pending = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .apply_filter(FilterSpec::default().with_statuses([PostStatus::Open]))
                .await
        }
    });
    entered.recv().await.expect("restart fetch started");

    let during = controller.snapshot().await;
    assert!(during.items.is_empty());
    assert!(during.next_cursor.is_none());
    assert!(during.is_loading);
    assert_eq!(during.phase, FeedPhase::LoadingInitial);

    release.send(()).expect("release restart");
    let after = pending.await.expect("join").expect("apply filter");
    assert_eq!(after.items.len(), 9);
}

#[tokio::test]
async fn continue_in_flight_during_sort_change_is_dropped() {
    let (store, mut entered) = HeldStore::new(reward_ladder());
    let controller = controller_for(store.clone(), FilterSpec::default(), by_reward_desc(), 9);
    controller.load_more().await;

    let release = store.arm();
    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_more().await }
    });
    entered.recv().await.expect("continue fetch started");

    let ignored = controller.load_more().await;
    assert_eq!(ignored.phase, FeedPhase::LoadingMore);

    let restarted = controller
        .apply_preset(SortPreset::LowestReward)
        .await
        .expect("apply sort");
    assert_eq!(
        rewards(&restarted.items),
        (1..=9).map(|step| step * 100).collect::<Vec<i64>>()
    );

    release.send(()).expect("release continue");
    let after_stale = pending.await.expect("join");
    assert_eq!(ids(&after_stale.items), ids(&restarted.items));
    assert_eq!(after_stale.sort_preset, Some(SortPreset::LowestReward));
    assert_eq!(after_stale.pages_loaded, 1);
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn sqlite_feed_attaches_companies_and_honours_company_scope() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = FeedConfig {
        database_path: Some(dir.path().join("feed.sqlite")),
        page_size: 5,
        ..FeedConfig::default()
    };

    let db = Database::new(config.database_path.as_deref().expect("path")).expect("db");
    for (id, name) in [("acme", "Acme"), ("globex", "Globex")] {
        db.insert_company(&CompanyProfile {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("team@{}.test", id),
            avatar_url: None,
            website: None,
            legal_business_name: Some(format!("{} LLC", name)),
            phone_number: None,
            created_at: base_time(),
        })
        .expect("company");
    }
    for row in tied_rows() {
        db.insert_post(&row.post).expect("post");
    }
    drop(db);

    let controller = open_feed(&config).expect("open feed");
    let first = controller.mount().await;
    assert_eq!(first.items.len(), 5);
    assert!(first
        .items
        .iter()
        .all(|item| item.company.as_ref().map(|company| company.id.as_str()) == Some(item.post.company_id.as_str())));

    let mut snapshot = controller
        .apply_filter(FilterSpec {
            company_id: Some("globex".to_string()),
            ..FilterSpec::default()
        })
        .await
        .expect("company scope");
    while !snapshot.is_exhausted {
        snapshot = controller.load_more().await;
    }
    let expected = tied_rows()
        .into_iter()
        .filter(|row| row.post.company_id == "globex")
        .count();
    assert_eq!(snapshot.items.len(), expected);
    assert!(snapshot.items.iter().all(|item| item.post.company_id == "globex"));
}

#[test]
fn open_feed_requires_a_database_path() {
    let error = match open_feed(&FeedConfig::default()) {
        Ok(_) => panic!("missing database path must be rejected"),
        Err(error) => error,
    };
    assert!(error.to_string().starts_with("CONFIG_INVALID"));
    assert!(error.to_string().contains("databasePath"));
}
