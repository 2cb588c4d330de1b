// reqwest-backed session backend: one pooled client shared by the run,
// one cookie jar per sub-session.
use crate::config::ScraperConfig;
use crate::model::{ExtractionError, PageSnapshot, ScrapeError};
use crate::session::{SessionBackend, SubSession};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

type Registry = Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>;

pub struct HttpBackend {
    config: ScraperConfig,
    client: Mutex<Option<Client>>,
    sessions: Registry,
    next_id: AtomicU64,
}

impl HttpBackend {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn shared_client(&self) -> Option<Client> {
        self.client.lock().ok().and_then(|guard| guard.clone())
    }

    #[cfg(test)]
    pub fn open_sub_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SessionBackend for HttpBackend {
    async fn open(&self) -> Result<(), ScrapeError> {
        if self.shared_client().is_some() {
            return Err(ScrapeError::BackendUnavailable("backend is already open".into()));
        }

        info!("Launching HTTP session backend...");
        let client = Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .timeout(self.config.task_timeout())
            .build()
            .map_err(|e| ScrapeError::BackendUnavailable(e.to_string()))?;

        if let Some(probe) = &self.config.health_check_url {
            let response = client
                .get(probe)
                .send()
                .await
                .map_err(|e| ScrapeError::BackendUnavailable(format!("{}: {}", probe, e)))?;
            if !response.status().is_success() {
                return Err(ScrapeError::BackendUnavailable(format!(
                    "{} answered with HTTP {}",
                    probe,
                    response.status()
                )));
            }
        }

        let mut guard = self
            .client
            .lock()
            .map_err(|_| ScrapeError::BackendUnavailable("client lock poisoned".into()))?;
        *guard = Some(client);
        info!("HTTP session backend ready");
        Ok(())
    }

    async fn new_sub_session(&self) -> Result<Box<dyn SubSession>, ExtractionError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let client = self.shared_client().ok_or(ExtractionError::SessionClosed(id))?;

        let closed = Arc::new(AtomicBool::new(false));
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id, closed.clone());
        }
        debug!("Opened sub-session {}", id);

        Ok(Box::new(HttpSubSession {
            id,
            client,
            timeout: self.config.task_timeout(),
            jar: Arc::new(Jar::default()),
            closed,
            registry: self.sessions.clone(),
        }))
    }

    async fn close(&self) {
        let dangling: Vec<(u64, Arc<AtomicBool>)> = match self.sessions.lock() {
            Ok(mut sessions) => sessions.drain().collect(),
            Err(_) => Vec::new(),
        };
        if !dangling.is_empty() {
            warn!("Force-closing {} sub-session(s) still open", dangling.len());
        }
        for (_, flag) in dangling {
            flag.store(true, Ordering::SeqCst);
        }

        if let Ok(mut guard) = self.client.lock() {
            guard.take();
        }
        info!("HTTP session backend closed");
    }
}

pub struct HttpSubSession {
    id: u64,
    client: Client,
    timeout: Duration,
    jar: Arc<Jar>,
    closed: Arc<AtomicBool>,
    registry: Registry,
}

#[async_trait]
impl SubSession for HttpSubSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn goto(&self, url: &str) -> Result<PageSnapshot, ExtractionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExtractionError::SessionClosed(self.id));
        }

        let parsed = Url::parse(url).map_err(|e| ExtractionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut request = self.client.get(parsed.clone());
        if let Some(cookies) = self.jar.cookies(&parsed) {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout(self.timeout)
            } else {
                ExtractionError::Navigation { url: url.to_string(), reason: e.to_string() }
            }
        })?;

        let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
        self.jar.set_cookies(&mut set_cookies, &parsed);

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus { url: url.to_string(), status: status.as_u16() });
        }

        let html = response.text().await.map_err(|e| ExtractionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(PageSnapshot { url: final_url, status: status.as_u16(), html })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut sessions) = self.registry.lock() {
            sessions.remove(&self.id);
        }
    }
}
