//! Lazy paginated statement sequences.
//!
//! A query result is a finite, non-restartable stream: each element is
//! fetched from the backend on demand, never cached, and dropping the
//! stream cancels any remaining pagination.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use learnlrs_xapi::Statement;

use crate::error::Result;

/// Pinned, boxed stream of statements or errors.
pub type StatementStream = Pin<Box<dyn Stream<Item = Result<Statement>> + Send>>;

/// One backend page plus the continuation cursor, mirroring the xAPI
/// `more` member.
#[derive(Debug, Clone, Default)]
pub struct StatementPage {
    pub statements: Vec<Statement>,
    pub more: Option<String>,
}

/// Fetches one page of statements. `cursor` is `None` for the first
/// page and the backend's `more` value afterwards.
#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    async fn fetch(&self, cursor: Option<&str>) -> Result<StatementPage>;
}

struct PageState {
    fetcher: Arc<dyn PageFetcher>,
    cursor: Option<String>,
    buffer: VecDeque<Statement>,
    yielded: usize,
    limit: usize,
    exhausted: bool,
    failed: bool,
}

/// Drive a fetcher into a statement stream, stopping after `limit`
/// statements or when the backend signals no more pages. An error from
/// a page fetch is yielded once and ends the stream.
pub fn paginate(fetcher: Arc<dyn PageFetcher>, limit: usize) -> StatementStream {
    let state = PageState {
        fetcher,
        cursor: None,
        buffer: VecDeque::new(),
        yielded: 0,
        limit,
        exhausted: false,
        failed: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        if state.failed || state.yielded >= state.limit {
            return None;
        }
        loop {
            if let Some(statement) = state.buffer.pop_front() {
                state.yielded += 1;
                return Some((Ok(statement), state));
            }
            if state.exhausted {
                return None;
            }
            match state.fetcher.fetch(state.cursor.as_deref()).await {
                Ok(page) => {
                    state.cursor = page.more.filter(|more| !more.is_empty());
                    state.exhausted = state.cursor.is_none();
                    state.buffer = page.statements.into();
                    if state.buffer.is_empty() && state.exhausted {
                        return None;
                    }
                }
                Err(e) => {
                    state.failed = true;
                    return Some((Err(e), state));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use futures_util::StreamExt;
    use learnlrs_xapi::{Activity, Actor, Statement, Verb};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn statement(n: usize) -> Statement {
        Statement {
            id: uuid::Uuid::new_v4(),
            actor: Actor::new("https://lrs.example.com", "a1"),
            verb: Verb::new("http://adlnet.gov/expapi/verbs/practiced", "practiced"),
            object: Activity::new(format!("https://example.org/activities/{n}")),
            result: None,
            context: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Serves `total` statements in pages of `page_size`, counting
    /// fetches.
    struct PagedFetcher {
        total: usize,
        page_size: usize,
        fetches: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl PagedFetcher {
        fn new(total: usize, page_size: usize) -> Self {
            Self {
                total,
                page_size,
                fetches: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl PageFetcher for PagedFetcher {
        async fn fetch(&self, cursor: Option<&str>) -> Result<StatementPage> {
            let fetch = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(fetch) {
                return Err(TransportError::Exhausted {
                    attempts: 3,
                    last: "status 503".to_string(),
                }
                .into());
            }
            let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (offset + self.page_size).min(self.total);
            let statements = (offset..end).map(statement).collect();
            let more = (end < self.total).then(|| end.to_string());
            Ok(StatementPage { statements, more })
        }
    }

    #[tokio::test]
    async fn limit_five_over_pages_of_two_makes_three_fetches() {
        let fetcher = Arc::new(PagedFetcher::new(10, 2));
        let stream = paginate(fetcher.clone(), 5);
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 5);
        assert!(items.iter().all(Result::is_ok));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fewer_statements_than_limit_ends_early() {
        let fetcher = Arc::new(PagedFetcher::new(3, 2));
        let items: Vec<_> = paginate(fetcher.clone(), 10).collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pages_are_fetched_only_when_advanced() {
        let fetcher = Arc::new(PagedFetcher::new(10, 2));
        let mut stream = paginate(fetcher.clone(), 10);

        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);

        stream.next().await.unwrap().unwrap();
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_pagination() {
        let fetcher = Arc::new(PagedFetcher::new(100, 2));
        {
            let mut stream = paginate(fetcher.clone(), 100);
            stream.next().await.unwrap().unwrap();
        }
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_error_is_yielded_once_and_ends_the_stream() {
        let fetcher = Arc::new(PagedFetcher {
            fail_on: Some(2),
            ..PagedFetcher::new(10, 2)
        });
        let mut stream = paginate(fetcher, 10);

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_backend_yields_nothing() {
        let fetcher = Arc::new(PagedFetcher::new(0, 2));
        let items: Vec<_> = paginate(fetcher, 10).collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_fetches_nothing() {
        let fetcher = Arc::new(PagedFetcher::new(10, 2));
        let items: Vec<_> = paginate(fetcher.clone(), 0).collect().await;
        assert!(items.is_empty());
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    }
}
