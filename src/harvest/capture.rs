//! Operator-guided capture of the five BASIC panels.
//!
//! The carrier page renders one safety category at a time and only after the
//! operator opens it, with no completion signal. A [`CaptureSession`] walks the
//! categories in order: it waits for the active heading to move to the
//! expected category (or for a manual advance), reads the panel within a
//! bounded window, and records the result before moving on.

use std::future;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tracing::{info, warn};

use super::locator::{self, LocatorStrategy};
use super::observer::{active_heading, HeadingObserver, PollingObserver};
use super::page::{Document, PageSource};
use crate::config::CaptureSettings;
use crate::model::{BasicCategory, BasicMeasure, SafetyBlock};

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    AwaitingUserAction,
    Extracting,
    /// `None` when the category was attempted and nothing could be read
    Captured(Option<BasicMeasure>),
    /// Heading detection gave up; a manual advance still proceeds.
    TimedOut,
}

impl CaptureState {
    pub fn awaiting_operator(&self) -> bool {
        matches!(self, CaptureState::AwaitingUserAction | CaptureState::TimedOut)
    }
}

// ── Progress ──

/// Receives every state transition of a session.
pub trait ProgressSink: Send {
    fn transition(&mut self, category: BasicCategory, state: &CaptureState);
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn transition(&mut self, category: BasicCategory, state: &CaptureState) {
        info!(category = %category, state = ?state, "capture state");
    }
}

/// Terminal progress bar for an operator at the keyboard.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BasicCategory::ALL.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn transition(&mut self, category: BasicCategory, state: &CaptureState) {
        match state {
            CaptureState::AwaitingUserAction => {
                self.bar.set_message(format!("open {category} (Enter reads the current panel)"))
            }
            CaptureState::TimedOut => {
                self.bar.set_message(format!("{category} not detected, press Enter to read the current panel"))
            }
            CaptureState::Extracting => self.bar.set_message(format!("reading {category}")),
            CaptureState::Captured(_) => {
                self.bar.inc(1);
                if Some(self.bar.position()) == self.bar.length() {
                    self.bar.finish_and_clear();
                }
            }
        }
    }
}

// ── Manual advance ──

/// Handle the operator uses to move past the current category.
#[derive(Debug, Clone)]
pub struct ManualAdvance {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualAdvance {
    /// `false` once the session is gone.
    pub fn advance(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

enum Trigger {
    Detected,
    Manual,
    /// Timed out with every advance handle dropped.
    Abandoned,
}

enum WaitEvent {
    Press(bool),
    Heading(Option<String>),
    Deadline,
}

// ── Session ──

pub struct CaptureSession<S, O> {
    source: Arc<S>,
    observer: O,
    settings: CaptureSettings,
    manual: mpsc::UnboundedReceiver<()>,
    manual_open: bool,
    locators: Vec<Box<dyn LocatorStrategy>>,
    progress: Box<dyn ProgressSink>,
}

impl<S: PageSource + 'static> CaptureSession<S, PollingObserver<S>> {
    /// Session that detects heading changes by re-reading `source`.
    pub fn polling(source: Arc<S>, settings: CaptureSettings) -> (Self, ManualAdvance) {
        let observer = PollingObserver::new(source.clone(), settings.poll_interval());
        Self::new(source, observer, settings)
    }
}

impl<S: PageSource + 'static, O: HeadingObserver> CaptureSession<S, O> {
    pub fn new(source: Arc<S>, observer: O, settings: CaptureSettings) -> (Self, ManualAdvance) {
        let (tx, manual) = mpsc::unbounded_channel();
        let session = Self {
            source,
            observer,
            settings,
            manual,
            manual_open: true,
            locators: locator::default_cascade(),
            progress: Box::new(LogProgress),
        };
        (session, ManualAdvance { tx })
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(sink);
        self
    }

    pub fn with_locators(mut self, locators: Vec<Box<dyn LocatorStrategy>>) -> Self {
        self.locators = locators;
        self
    }

    /// Walk all five categories. Each one ends up in the block, `None` when
    /// nothing could be read.
    pub async fn run(&mut self) -> SafetyBlock {
        let mut block = SafetyBlock::default();
        let mut baseline: Option<String> = None;

        for (step, category) in BasicCategory::ALL.into_iter().enumerate() {
            self.transition(category, CaptureState::AwaitingUserAction);
            // presses made while the previous panel was being read are stale
            while self.manual.try_recv().is_ok() {}

            let trigger = if step == 0 {
                // the first category is the page's default view
                sleep(self.settings.first_step_delay()).await;
                Trigger::Detected
            } else {
                self.await_trigger(category, &mut baseline).await
            };

            let value = match trigger {
                Trigger::Abandoned => None,
                Trigger::Detected | Trigger::Manual => {
                    // a panel switch during extraction must still count as a change
                    baseline = self.observer.active_heading().await;
                    self.transition(category, CaptureState::Extracting);
                    self.extract(category, matches!(trigger, Trigger::Manual)).await
                }
            };
            block.set(category, value);
            self.transition(category, CaptureState::Captured(value));
        }

        info!(
            captured = BasicCategory::ALL.iter().filter(|c| block.get(**c).is_some()).count(),
            "guided capture complete"
        );
        block
    }

    fn transition(&mut self, category: BasicCategory, state: CaptureState) {
        self.progress.transition(category, &state);
    }

    /// Wait for the heading to move to `expected`, or for a manual advance.
    async fn await_trigger(&mut self, expected: BasicCategory, baseline: &mut Option<String>) -> Trigger {
        let deadline = Instant::now() + self.settings.detect_timeout();
        let mut timed_out = false;

        loop {
            let event = {
                let observer = &mut self.observer;
                let manual = &mut self.manual;
                let current = baseline.as_deref();
                let watch = async {
                    if timed_out {
                        future::pending::<Option<String>>().await
                    } else {
                        observer.next_change(current).await
                    }
                };
                tokio::select! {
                    press = manual.recv(), if self.manual_open => WaitEvent::Press(press.is_some()),
                    heading = watch => WaitEvent::Heading(heading),
                    _ = sleep_until(deadline), if !timed_out => WaitEvent::Deadline,
                }
            };

            match event {
                WaitEvent::Press(true) => {
                    info!(category = %expected, "manual advance");
                    return Trigger::Manual;
                }
                WaitEvent::Press(false) => {
                    self.manual_open = false;
                    if timed_out {
                        warn!(category = %expected, "no operator left to advance");
                        return Trigger::Abandoned;
                    }
                }
                WaitEvent::Heading(Some(heading)) if expected.matches_heading(&heading) => {
                    info!(category = %expected, heading = %heading, "heading change detected");
                    return Trigger::Detected;
                }
                WaitEvent::Heading(Some(heading)) => {
                    warn!(expected = %expected, heading = %heading, "out-of-order heading, still waiting");
                    *baseline = Some(heading);
                }
                WaitEvent::Heading(None) => {}
                WaitEvent::Deadline => {
                    timed_out = true;
                    warn!(
                        category = %expected,
                        secs = self.settings.detect_timeout().as_secs(),
                        "heading not detected, waiting for manual advance"
                    );
                    self.transition(expected, CaptureState::TimedOut);
                    if !self.manual_open {
                        return Trigger::Abandoned;
                    }
                }
            }
        }
    }

    /// Poll the panel until both values are read or the window closes.
    async fn extract(&mut self, category: BasicCategory, manual: bool) -> Option<BasicMeasure> {
        sleep(self.settings.settle_delay()).await;
        let deadline = Instant::now() + self.settings.extract_window();
        let mut found = BasicMeasure::default();
        let mut warned = false;

        loop {
            match self.source.markup().await {
                Ok(markup) => {
                    let (heading, m) = read_panel(&markup, &self.locators);
                    if manual && !warned {
                        if let Some(h) = heading.filter(|h| !category.matches_heading(h)) {
                            warn!(category = %category, heading = %h, "recording the active panel under a different category");
                            warned = true;
                        }
                    }
                    found.percentile = found.percentile.or(m.percentile);
                    found.score = found.score.or(m.score);
                }
                Err(e) => warn!(error = %e, "page read failed during extraction"),
            }
            if (found.percentile.is_some() && found.score.is_some()) || Instant::now() >= deadline {
                break;
            }
            sleep(self.settings.poll_interval()).await;
        }

        let value = found.validated();
        if value.is_none() {
            warn!(category = %category, "no values found within the extraction window");
        }
        value
    }
}

fn read_panel(markup: &str, locators: &[Box<dyn LocatorStrategy>]) -> (Option<String>, BasicMeasure) {
    let doc = Document::parse(markup);
    (active_heading(&doc), locator::locate(locators, &doc))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::harvest::page::StaticPage;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(BasicCategory, CaptureState)>>>);

    impl ProgressSink for Recorder {
        fn transition(&mut self, category: BasicCategory, state: &CaptureState) {
            self.0.lock().unwrap().push((category, state.clone()));
        }
    }

    impl Recorder {
        fn last(&self, category: BasicCategory) -> Option<CaptureState> {
            let log = self.0.lock().unwrap();
            log.iter().rev().find(|(c, _)| *c == category).map(|(_, s)| s.clone())
        }

        async fn wait_for(&self, category: BasicCategory, done: impl Fn(&CaptureState) -> bool) {
            while !self.last(category).is_some_and(|s| done(&s)) {
                sleep(Duration::from_millis(50)).await;
            }
        }
    }

    fn captured(s: &CaptureState) -> bool {
        matches!(s, CaptureState::Captured(_))
    }

    fn panel(heading: &str, percentile: &str, score: &str) -> String {
        format!(
            r#"<html><body>
            <div class="panel"><h3>{heading}</h3>
              <div><div>CSA Percentile Equivalent</div><div class="text-yellow-500">{percentile}%</div></div>
              <div><div>BASIC Score</div><div class="text-yellow-500">{score}</div></div>
            </div>
            <div style="display:none"><h3>Driver Fitness</h3>
              <div><div>CSA Percentile Equivalent</div><div class="text-yellow-500">99%</div></div>
            </div>
            </body></html>"#
        )
    }

    fn measure(percentile: f64, score: f64) -> Option<BasicMeasure> {
        Some(BasicMeasure { percentile: Some(percentile), score: Some(score) })
    }

    fn start(page: &Arc<StaticPage>) -> (Recorder, ManualAdvance, tokio::task::JoinHandle<SafetyBlock>) {
        let recorder = Recorder::default();
        let (session, advance) = CaptureSession::polling(page.clone(), CaptureSettings::default());
        let mut session = session.with_progress(recorder.clone());
        let handle = tokio::spawn(async move { session.run().await });
        (recorder, advance, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn detected_headings_drive_all_five_steps() {
        let page = Arc::new(StaticPage::new(panel("Unsafe Driving", "45", "3.2")));
        let (recorder, _advance, handle) = start(&page);

        let steps = [
            (BasicCategory::HoursOfService, panel("HOS Compliance", "12", "1.1")),
            (BasicCategory::VehicleMaintenance, panel("Vehicle Maintenance", "61", "4.5")),
            (BasicCategory::ControlledSubstances, panel("Controlled Substances and Alcohol", "0", "0.5")),
            (BasicCategory::DriverFitness, panel("Driver Fitness", "7.5", "2")),
        ];
        recorder.wait_for(BasicCategory::UnsafeDriving, captured).await;
        for (category, markup) in steps {
            page.replace(markup);
            recorder.wait_for(category, captured).await;
        }

        let block = handle.await.unwrap();
        assert_eq!(block.unsafe_driving, measure(45.0, 3.2));
        assert_eq!(block.hours_of_service, measure(12.0, 1.1));
        assert_eq!(block.vehicle_maintenance, measure(61.0, 4.5));
        assert_eq!(block.controlled_substances, measure(0.0, 0.5));
        assert_eq!(block.driver_fitness, measure(7.5, 2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_heading_waits_for_manual_advance() {
        let page = Arc::new(StaticPage::new(panel("Unsafe Driving", "45", "3.2")));
        let (recorder, advance, handle) = start(&page);
        recorder.wait_for(BasicCategory::UnsafeDriving, captured).await;
        let started = Instant::now();

        recorder.wait_for(BasicCategory::HoursOfService, |s| *s == CaptureState::TimedOut).await;
        assert!(started.elapsed() >= Duration::from_secs(119));

        // still waiting well after the timeout
        sleep(Duration::from_secs(300)).await;
        let state = recorder.last(BasicCategory::HoursOfService).unwrap();
        assert_eq!(state, CaptureState::TimedOut);
        assert!(state.awaiting_operator());

        assert!(advance.advance());
        recorder.wait_for(BasicCategory::HoursOfService, captured).await;
        // the panel still on screen is what gets read
        assert_eq!(
            recorder.last(BasicCategory::HoursOfService),
            Some(CaptureState::Captured(measure(45.0, 3.2)))
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_heading_does_not_advance() {
        let page = Arc::new(StaticPage::new(panel("Unsafe Driving", "45", "3.2")));
        let (recorder, _advance, handle) = start(&page);
        recorder.wait_for(BasicCategory::UnsafeDriving, captured).await;

        page.replace(panel("Vehicle Maintenance", "61", "4.5"));
        sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.last(BasicCategory::HoursOfService), Some(CaptureState::AwaitingUserAction));

        page.replace(panel("Hours-of-Service Compliance", "12", "1.1"));
        recorder.wait_for(BasicCategory::HoursOfService, captured).await;
        assert_eq!(
            recorder.last(BasicCategory::HoursOfService),
            Some(CaptureState::Captured(measure(12.0, 1.1)))
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn panel_switched_during_extraction_is_detected() {
        let page = Arc::new(StaticPage::new("<html><body><h3>Unsafe Driving</h3><p>No data</p></body></html>"));
        let (recorder, _advance, handle) = start(&page);
        recorder.wait_for(BasicCategory::UnsafeDriving, |s| *s == CaptureState::Extracting).await;

        page.replace(panel("HOS Compliance", "12", "1.1"));
        let switched = Instant::now();
        recorder.wait_for(BasicCategory::HoursOfService, captured).await;
        assert!(switched.elapsed() < Duration::from_secs(30));
        assert_eq!(
            recorder.last(BasicCategory::HoursOfService),
            Some(CaptureState::Captured(measure(12.0, 1.1)))
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_panel_is_recorded_as_attempted() {
        let page = Arc::new(StaticPage::new("<html><body><h3>Unsafe Driving</h3><p>No data</p></body></html>"));
        let (recorder, _advance, handle) = start(&page);
        recorder.wait_for(BasicCategory::UnsafeDriving, captured).await;
        assert_eq!(recorder.last(BasicCategory::UnsafeDriving), Some(CaptureState::Captured(None)));
        handle.abort();
    }
}
