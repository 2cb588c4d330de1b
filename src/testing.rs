// Instrumented test doubles for the engine.
use crate::model::{ExtractionError, PageSnapshot, Product, ScrapeError, Target};
use crate::scraper::FetchStrategy;
use crate::session::{SessionBackend, SubSession};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    created: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
}

pub struct MockBackend {
    counters: Arc<Counters>,
    fail_open: bool,
    open_delay: Duration,
    open: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            fail_open: false,
            open_delay: Duration::ZERO,
            open: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self { fail_open: true, ..Self::new() }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn sub_sessions_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn live_sub_sessions(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn peak_sub_sessions(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBackend for MockBackend {
    async fn open(&self) -> Result<(), ScrapeError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.open_delay).await;
        if self.fail_open {
            return Err(ScrapeError::BackendUnavailable("mock launch failure".into()));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn new_sub_session(&self) -> Result<Box<dyn SubSession>, ExtractionError> {
        let id = self.counters.created.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        if !self.open.load(Ordering::SeqCst) {
            return Err(ExtractionError::SessionClosed(id));
        }
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(MockSubSession {
            id,
            counters: self.counters.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSubSession {
    id: u64,
    counters: Arc<Counters>,
    closed: AtomicBool,
}

#[async_trait]
impl SubSession for MockSubSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn goto(&self, url: &str) -> Result<PageSnapshot, ExtractionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExtractionError::SessionClosed(self.id));
        }
        Ok(PageSnapshot {
            url: url.to_string(),
            status: 200,
            html: format!("<html><body><h1>{}</h1></body></html>", url),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Strategy whose per-target behavior is scripted by id.
pub struct ScriptedStrategy {
    urls: Vec<String>,
    failing: HashSet<u64>,
    panicking: HashSet<u64>,
    hanging: HashSet<u64>,
    hanging_listing: bool,
    delay: Duration,
    random_delay_ms: Option<u64>,
    extractions: AtomicUsize,
}

impl ScriptedStrategy {
    pub fn new(count: usize) -> Self {
        Self {
            urls: (1..=count).map(|i| format!("https://shop.test/item/{}", i)).collect(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            hanging: HashSet::new(),
            hanging_listing: false,
            delay: Duration::from_millis(5),
            random_delay_ms: None,
            extractions: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, ids: &[u64]) -> Self {
        self.failing.extend(ids);
        self
    }

    pub fn panicking(mut self, ids: &[u64]) -> Self {
        self.panicking.extend(ids);
        self
    }

    pub fn hanging(mut self, ids: &[u64]) -> Self {
        self.hanging.extend(ids);
        self
    }

    pub fn hanging_listing(mut self) -> Self {
        self.hanging_listing = true;
        self
    }

    pub fn with_random_delay(mut self, max_ms: u64) -> Self {
        self.random_delay_ms = Some(max_ms);
        self
    }

    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

pub fn sample_product(id: u64, name: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        image_url: format!("https://img.test/{}.jpg", id),
        description: format!("Description of {}", name),
        price: format!("${}.99", 100 + id).into(),
        rating: Some(4.5.into()),
        specifications: BTreeMap::from([("brand".to_string(), serde_json::json!("Acme"))]),
        source_url: Some(format!("https://shop.test/item/{}", id)),
    }
}

#[async_trait]
impl FetchStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_targets(&self) -> Vec<String> {
        if self.hanging_listing {
            std::future::pending::<()>().await;
        }
        self.urls.clone()
    }

    async fn extract(
        &self,
        session: &dyn SubSession,
        target: &Target,
    ) -> Result<Product, ExtractionError> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        let delay = match self.random_delay_ms {
            Some(max) => Duration::from_millis(rand::rng().random_range(0..=max)),
            None => self.delay,
        };
        tokio::time::sleep(delay).await;

        if self.hanging.contains(&target.id) {
            std::future::pending::<()>().await;
        }
        let page = session.goto(&target.url).await?;
        if self.panicking.contains(&target.id) {
            panic!("scripted panic for target {}", target.id);
        }
        if self.failing.contains(&target.id) {
            return Err(ExtractionError::Parse(format!("scripted failure for {}", page.url)));
        }
        Ok(sample_product(target.id, &format!("Product {}", target.id)))
    }
}
