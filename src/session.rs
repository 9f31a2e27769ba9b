/*!
 * Interactive locator session
 *
 * Owns the current dataset snapshot and sequences load, filter and render
 * cycles. Filter passes are debounced and tagged with a generation number;
 * a pass that is overtaken by a newer one (or by a reload) is dropped
 * instead of racing it to the map.
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::config::LocatorConfig;
use crate::data_types::{FilterCriteria, ProviderRecord};
use crate::dataset::ProviderDataset;
use crate::fetch::ProviderSource;
use crate::filter::FilterEngine;
use crate::geo::Coordinates;
use crate::geocode::GeocodeResolver;
use crate::render::{MarkerRenderer, RenderResult};
use crate::Result;

/// How a status line should be styled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Info,
    Success,
    Error,
}

/// The single user-visible status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Loading,
    Showing(usize),
    /// More records matched than the marker cap allows
    Capped { displayed: usize, supplied: usize },
    Error(String),
}

impl StatusMessage {
    /// Status line for a finished render
    pub fn for_render(result: &RenderResult) -> Self {
        if result.was_capped() {
            StatusMessage::Capped {
                displayed: result.displayed(),
                supplied: result.supplied,
            }
        } else {
            StatusMessage::Showing(result.displayed())
        }
    }

    pub fn text(&self) -> String {
        match self {
            StatusMessage::Loading => "Loading physicians...".to_string(),
            StatusMessage::Showing(count) => format!("Showing {} physician(s).", count),
            StatusMessage::Capped { displayed, supplied } => format!(
                "Showing {} physician(s) (limited from {} for performance).",
                displayed, supplied
            ),
            StatusMessage::Error(message) => format!("Error loading data: {}", message),
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            StatusMessage::Loading => StatusTone::Info,
            StatusMessage::Showing(_) | StatusMessage::Capped { .. } => StatusTone::Success,
            StatusMessage::Error(_) => StatusTone::Error,
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Records that survived one filter pass
#[derive(Debug, Clone)]
pub struct FilterPass {
    pub generation: u64,
    pub criteria: FilterCriteria,
    /// Resolved zip centroid, when the distance stage ran
    pub origin: Option<Coordinates>,
    pub records: Vec<ProviderRecord>,
    /// Size of the dataset the pass ran against
    pub total_loaded: usize,
}

/// Result of a filter request
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    Applied(FilterPass),
    /// A newer request (or a reload) arrived first; nothing to draw
    Superseded,
}

impl FilterOutcome {
    pub fn into_pass(self) -> Option<FilterPass> {
        match self {
            FilterOutcome::Applied(pass) => Some(pass),
            FilterOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, FilterOutcome::Superseded)
    }
}

/// Load/filter/render coordinator over one replaceable dataset
pub struct Session {
    dataset: RwLock<Arc<ProviderDataset>>,
    generation: AtomicU64,
    debounce: Duration,
    geocoder: Arc<dyn GeocodeResolver>,
    renderer: MarkerRenderer,
    status: Mutex<StatusMessage>,
}

impl Session {
    pub fn new(geocoder: Arc<dyn GeocodeResolver>, config: &LocatorConfig) -> Self {
        Self {
            dataset: RwLock::new(Arc::new(ProviderDataset::default())),
            generation: AtomicU64::new(0),
            debounce: Duration::from_millis(config.debounce_ms),
            geocoder,
            renderer: MarkerRenderer::from_config(config),
            status: Mutex::new(StatusMessage::Loading),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn renderer(&self) -> &MarkerRenderer {
        &self.renderer
    }

    /// Current dataset; stays valid even if a reload replaces it
    pub fn snapshot(&self) -> Arc<ProviderDataset> {
        let guard = self.dataset.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn status(&self) -> StatusMessage {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_status(&self, status: StatusMessage) {
        tracing::debug!(status = %status, "status changed");
        *self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    /// Replace the dataset wholesale and invalidate pending filter passes
    pub fn install(&self, dataset: Arc<ProviderDataset>) {
        *self.dataset.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = dataset;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Run one load cycle and draw everything that was fetched
    ///
    /// On failure the previous dataset stays in place and the status line
    /// carries the error.
    pub async fn load(&self, source: &dyn ProviderSource) -> Result<Arc<ProviderDataset>> {
        self.set_status(StatusMessage::Loading);

        match ProviderDataset::load(source).await {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                self.install(Arc::clone(&dataset));
                self.render_all();
                Ok(dataset)
            }
            Err(e) => {
                tracing::error!(source = %source.describe(), error = %e, "load cycle failed");
                self.set_status(StatusMessage::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Whether `generation` is still the most recent request
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Debounced, generation-checked filter pass
    pub async fn filter(&self, criteria: FilterCriteria) -> FilterOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_current(generation) {
            tracing::debug!(generation, "filter request superseded during debounce");
            return FilterOutcome::Superseded;
        }

        let dataset = self.snapshot();
        let narrowed = dataset.filter_engine().apply_facets(dataset.records(), &criteria);

        let origin = match FilterEngine::distance_zip(&narrowed, &criteria) {
            Some(zip) => {
                let resolved = self.geocoder.resolve(&zip).await;
                if !self.is_current(generation) {
                    tracing::debug!(generation, %zip, "discarding stale geocode result");
                    return FilterOutcome::Superseded;
                }
                resolved
            }
            None => None,
        };
        let survivors = FilterEngine::apply_origin(narrowed, &criteria, origin.as_ref());

        tracing::debug!(generation, matched = survivors.len(), "filter pass complete");
        FilterOutcome::Applied(FilterPass {
            generation,
            origin,
            records: survivors.into_iter().cloned().collect(),
            total_loaded: dataset.len(),
            criteria,
        })
    }

    /// Render a filter pass and update the status line
    pub fn render(&self, pass: &FilterPass) -> RenderResult {
        let result = self.renderer.render(&pass.records, pass.total_loaded);
        self.set_status(StatusMessage::for_render(&result));
        result
    }

    /// Render the whole dataset, as after a load
    pub fn render_all(&self) -> RenderResult {
        let dataset = self.snapshot();
        let result = dataset.render_all(&self.renderer);
        self.set_status(StatusMessage::for_render(&result));
        result
    }

    /// Cancel pending filter passes and redraw everything
    pub fn reset(&self) -> RenderResult {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.render_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    use crate::data_types::ZipCode;
    use crate::fetch::StaticProviderSource;
    use crate::geocode::StaticGeocoder;
    use crate::LocatorError;

    fn providers() -> Vec<ProviderRecord> {
        vec![
            ProviderRecord::new()
                .with("Name", "Dr. A")
                .with("Specialty", "Cardiology")
                .with("Latitude", 29.7604)
                .with("Longitude", -95.3698),
            ProviderRecord::new()
                .with("Name", "Dr. B")
                .with("Specialty", "Neurology")
                .with("Latitude", 30.2672)
                .with("Longitude", -97.7431),
        ]
    }

    fn houston() -> StaticGeocoder {
        StaticGeocoder::new().with("77002", Coordinates::new(29.7604, -95.3698))
    }

    struct FailingSource;

    #[async_trait]
    impl ProviderSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
            Err(LocatorError::http_status(500))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    struct SlowGeocoder {
        delay: Duration,
        inner: StaticGeocoder,
    }

    #[async_trait]
    impl GeocodeResolver for SlowGeocoder {
        async fn resolve(&self, zip: &ZipCode) -> Option<Coordinates> {
            tokio::time::sleep(self.delay).await;
            self.inner.resolve(zip).await
        }
    }

    struct CountingGeocoder {
        inner: StaticGeocoder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeResolver for CountingGeocoder {
        async fn resolve(&self, zip: &ZipCode) -> Option<Coordinates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(zip).await
        }
    }

    fn many_providers(count: usize) -> Vec<ProviderRecord> {
        (0..count)
            .map(|i| {
                ProviderRecord::new()
                    .with("Name", format!("Dr. {}", i))
                    .with("Specialty", "Family Medicine")
                    .with("Latitude", 29.0 + i as f64 * 0.001)
                    .with("Longitude", -95.0)
            })
            .collect()
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(StatusMessage::Loading.text(), "Loading physicians...");
        assert_eq!(StatusMessage::Showing(3).text(), "Showing 3 physician(s).");
        let err = StatusMessage::Error("HTTP error! status: 404".to_string());
        assert_eq!(err.text(), "Error loading data: HTTP error! status: 404");
        assert_eq!(err.tone(), StatusTone::Error);
        assert_eq!(StatusMessage::Showing(0).tone(), StatusTone::Success);

        let capped = StatusMessage::Capped { displayed: 500, supplied: 600 };
        assert_eq!(
            capped.text(),
            "Showing 500 physician(s) (limited from 600 for performance)."
        );
        assert_eq!(capped.tone(), StatusTone::Success);
    }

    #[tokio::test]
    async fn test_load_shows_every_record() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default());
        assert_eq!(session.status(), StatusMessage::Loading);

        session.load(&StaticProviderSource::new(providers())).await.unwrap();
        assert_eq!(session.status(), StatusMessage::Showing(2));
        assert_eq!(session.status().text(), "Showing 2 physician(s).");
    }

    #[tokio::test]
    async fn test_capped_render_keeps_limit_note() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default())
            .with_debounce(Duration::ZERO);
        session.load(&StaticProviderSource::new(many_providers(600))).await.unwrap();

        let expected = "Showing 500 physician(s) (limited from 600 for performance).";
        assert_eq!(session.status().text(), expected);

        let pass = session
            .filter(FilterCriteria::new().specialty("family"))
            .await
            .into_pass()
            .unwrap();
        let result = session.render(&pass);
        assert_eq!(session.status().text(), result.summary());
        assert_eq!(session.status().text(), expected);

        session.reset();
        assert_eq!(session.status().text(), expected);
    }

    #[tokio::test]
    async fn test_empty_facet_result_skips_geocoding() {
        let geocoder = Arc::new(CountingGeocoder {
            inner: houston(),
            calls: AtomicUsize::new(0),
        });
        let session = Session::new(geocoder.clone(), &LocatorConfig::default())
            .with_debounce(Duration::ZERO);
        session.load(&StaticProviderSource::new(providers())).await.unwrap();

        let pass = session
            .filter(FilterCriteria::new().specialty("derm").within("77002", 5.0))
            .await
            .into_pass()
            .unwrap();
        assert!(pass.records.is_empty());
        assert_eq!(pass.origin, None);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);

        let pass = session
            .filter(FilterCriteria::new().specialty("cardio").within("77002", 5.0))
            .await
            .into_pass()
            .unwrap();
        assert_eq!(pass.records.len(), 1);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_dataset() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default());
        session.load(&StaticProviderSource::new(providers())).await.unwrap();
        assert_eq!(session.render_all().displayed(), 2);

        let err = session.load(&FailingSource).await.unwrap_err();
        assert!(err.is_load_failure());
        assert_eq!(session.snapshot().len(), 2);
        assert_eq!(session.status().text(), "Error loading data: HTTP error! status: 500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keeps_only_last_request() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default());
        session.load(&StaticProviderSource::new(providers())).await.unwrap();

        let (first, second) = tokio::join!(
            session.filter(FilterCriteria::new().specialty("cardio")),
            session.filter(FilterCriteria::new().specialty("neuro")),
        );

        assert!(first.is_superseded());
        let pass = second.into_pass().unwrap();
        assert_eq!(pass.records.len(), 1);
        assert_eq!(pass.records[0].display_name(), "Dr. B");

        let result = session.render(&pass);
        assert_eq!(result.displayed(), 1);
        assert_eq!(session.status(), StatusMessage::Showing(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_geocode_result_is_discarded() {
        let geocoder = SlowGeocoder {
            delay: Duration::from_secs(1),
            inner: houston(),
        };
        let session = Session::new(Arc::new(geocoder), &LocatorConfig::default())
            .with_debounce(Duration::ZERO);
        session.load(&StaticProviderSource::new(providers())).await.unwrap();

        let (slow, fast) = tokio::join!(
            session.filter(FilterCriteria::new().within("77002", 5.0)),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                session.filter(FilterCriteria::new().specialty("neuro")).await
            },
        );

        assert!(slow.is_superseded());
        assert_eq!(fast.into_pass().unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn test_distance_pass_records_origin() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default())
            .with_debounce(Duration::ZERO);
        session.load(&StaticProviderSource::new(providers())).await.unwrap();

        let pass = session
            .filter(FilterCriteria::new().within("77002", 5.0))
            .await
            .into_pass()
            .unwrap();
        assert_eq!(pass.origin, Some(Coordinates::new(29.7604, -95.3698)));
        assert_eq!(pass.records.len(), 1);
        assert_eq!(pass.total_loaded, 2);
    }

    #[tokio::test]
    async fn test_reload_supersedes_pending_pass() {
        let session = Session::new(Arc::new(houston()), &LocatorConfig::default())
            .with_debounce(Duration::ZERO);
        session.load(&StaticProviderSource::new(providers())).await.unwrap();

        let pass = session.filter(FilterCriteria::new()).await.into_pass().unwrap();
        assert!(session.is_current(pass.generation));

        session.reset();
        assert!(!session.is_current(pass.generation));
    }
}
