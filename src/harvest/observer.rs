use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Selector;
use tokio::sync::watch;
use tracing::warn;

use super::page::{element_text, is_visible, Document, PageSource};
use crate::model::BasicCategory;

static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3, h4").unwrap());

/// First visible heading that names a BASIC category.
pub fn active_heading(doc: &Document) -> Option<String> {
    doc.html()
        .select(&HEADING_SEL)
        .filter(|h| is_visible(*h))
        .map(element_text)
        .find(|t| BasicCategory::from_heading(t).is_some())
}

/// Active heading of a markup snapshot.
pub fn heading_in(markup: &str) -> Option<String> {
    active_heading(&Document::parse(markup))
}

/// Tells the capture loop when the page's active category heading moves.
///
/// Read failures are not surfaced; a page that cannot be read has simply
/// not changed yet.
#[async_trait]
pub trait HeadingObserver: Send {
    async fn active_heading(&mut self) -> Option<String>;

    /// Resolves with the first heading that differs from `baseline`.
    async fn next_change(&mut self, baseline: Option<&str>) -> Option<String>;
}

/// Re-reads the page source at a fixed interval.
pub struct PollingObserver<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: PageSource> PollingObserver<S> {
    pub fn new(source: Arc<S>, interval: Duration) -> Self {
        Self { source, interval }
    }

    async fn read(&self) -> Option<String> {
        match self.source.markup().await {
            Ok(markup) => heading_in(&markup),
            Err(e) => {
                warn!(error = %e, "page read failed while polling");
                None
            }
        }
    }
}

#[async_trait]
impl<S: PageSource + 'static> HeadingObserver for PollingObserver<S> {
    async fn active_heading(&mut self) -> Option<String> {
        self.read().await
    }

    async fn next_change(&mut self, baseline: Option<&str>) -> Option<String> {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let current = self.read().await;
            if current.is_some() && current.as_deref() != baseline {
                return current;
            }
        }
    }
}

/// Heading changes pushed by an embedding bridge over a `watch` channel.
pub struct WatchObserver {
    rx: watch::Receiver<Option<String>>,
}

impl WatchObserver {
    pub fn new(rx: watch::Receiver<Option<String>>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl HeadingObserver for WatchObserver {
    async fn active_heading(&mut self) -> Option<String> {
        self.rx.borrow().clone()
    }

    async fn next_change(&mut self, baseline: Option<&str>) -> Option<String> {
        loop {
            {
                let current = self.rx.borrow_and_update();
                if current.is_some() && current.as_deref() != baseline {
                    return current.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                // sender gone: no further changes will ever arrive
                std::future::pending::<()>().await;
            }
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::page::StaticPage;

    #[test]
    fn hidden_headings_are_ignored() {
        let doc = Document::parse(
            r#"<body><h2 style="display:none">Unsafe Driving</h2><h3>Summary</h3><h4>HOS Compliance</h4></body>"#,
        );
        assert_eq!(active_heading(&doc).as_deref(), Some("HOS Compliance"));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_observer_sees_replaced_page() {
        let page = Arc::new(StaticPage::new("<h3>Unsafe Driving</h3>"));
        let mut observer = PollingObserver::new(page.clone(), Duration::from_millis(150));
        assert_eq!(observer.active_heading().await.as_deref(), Some("Unsafe Driving"));

        let swap = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            swap.replace("<h3>Vehicle Maintenance</h3>");
        });
        let changed = observer.next_change(Some("Unsafe Driving")).await;
        assert_eq!(changed.as_deref(), Some("Vehicle Maintenance"));
    }

    #[tokio::test]
    async fn watch_observer_follows_sender() {
        let (tx, rx) = watch::channel(Some("Unsafe Driving".to_string()));
        let mut observer = WatchObserver::new(rx);
        tx.send(Some("Driver Fitness".into())).unwrap();
        let changed = observer.next_change(Some("Unsafe Driving")).await;
        assert_eq!(changed.as_deref(), Some("Driver Fitness"));
    }
}
