use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Raw HTML of one listing page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Index into the configured sources.
    pub source: usize,
    pub url: String,
    pub html: String,
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retries: u32,
    backoff: Duration,
    delay: Duration,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Fetcher {
            client,
            retries: cfg.retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
            delay: Duration::from_millis(cfg.delay_ms),
            concurrency: cfg.concurrency.max(1),
        })
    }

    /// Fetch one URL, retrying timeouts, 429 and 5xx with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let err = match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            if !is_transient(&err) || attempt >= self.retries {
                return Err(err);
            }
            let backoff = self.backoff_for(attempt);
            warn!(
                "Retrying {} (attempt {}/{}) in {:.1}s: {}",
                url,
                attempt + 1,
                self.retries,
                backoff.as_secs_f64(),
                err
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Exponential backoff, saturating instead of overflowing for large attempt counts.
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(request_err)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetch every `(source, url)` target. Pages come back in target order.
    /// Any page that still fails after retries aborts the whole batch.
    pub async fn fetch_all(&self, targets: Vec<(usize, String)>) -> Result<Vec<Page>, FetchError> {
        let total = targets.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<(usize, Result<Page, FetchError>)>(self.concurrency * 2);

        for (i, (source, url)) in targets.into_iter().enumerate() {
            let fetcher = self.clone();
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                let result = fetcher.fetch(&url).await.map(|html| Page { source, url, html });
                // hold the permit through the delay so the server sees a gap
                tokio::time::sleep(fetcher.delay).await;
                let _ = tx.send((i, result)).await;
            });
        }
        drop(tx);

        let mut pages: Vec<Option<Page>> = (0..total).map(|_| None).collect();
        while let Some((i, result)) = rx.recv().await {
            match result {
                Ok(page) => pages[i] = Some(page),
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        let pages: Vec<Page> = pages.into_iter().flatten().collect();
        info!("Fetched {} pages", pages.len());
        Ok(pages)
    }
}

fn is_transient(err: &FetchError) -> bool {
    match err {
        FetchError::Request { source, .. } => source.is_timeout() || source.is_connect(),
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        FetchError::BadUrl { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses() {
        let status = |s| FetchError::Status {
            url: "https://example.com".into(),
            status: s,
        };
        assert!(is_transient(&status(429)));
        assert!(is_transient(&status(503)));
        assert!(!is_transient(&status(404)));
        assert!(!is_transient(&FetchError::BadUrl {
            url: "x".into(),
            reason: "relative".into()
        }));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        assert_eq!(fetcher.backoff_for(0), Duration::from_millis(2000));
        assert_eq!(fetcher.backoff_for(2), Duration::from_millis(8000));
        assert_eq!(fetcher.backoff_for(40), Duration::from_millis(2000) * u32::MAX);

        let huge = Fetcher::new(&FetchConfig {
            backoff_ms: u64::MAX,
            ..FetchConfig::default()
        })
        .unwrap();
        assert_eq!(huge.backoff_for(3), Duration::MAX);
    }

    #[tokio::test]
    async fn empty_target_list() {
        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let pages = fetcher.fetch_all(Vec::new()).await.unwrap();
        assert!(pages.is_empty());
    }
}
