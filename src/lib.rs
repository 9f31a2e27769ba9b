/*!
 * # Physician Map
 *
 * A Rust library for loading a provider directory, narrowing it with facet
 * and distance filters, and laying the result out as map markers.
 *
 * ## Pipeline
 *
 * - **Load**: fetch `{ "physicians": [...] }` from the directory endpoint (or a file),
 *   trim keys and values, and index the facet values present in the fetch
 * - **Filter**: occupation, specialty, subspecialty and language substring stages,
 *   then an optional distance stage around a geocoded zip code
 * - **Render**: cap the marker count, spread co-located providers on a small
 *   circle, and decide whether the map viewport should move
 *
 * ## Quick Start
 *
 * ```no_run
 * use physician_map::prelude::*;
 *
 * # async fn run() -> Result<()> {
 * let config = LocatorConfig::load(None)?;
 * let source = HttpProviderSource::with_config("https://example.com/exec", &config)?;
 * let dataset = ProviderDataset::load(&source).await?;
 *
 * println!("Specialties: {:?}", dataset.facets().specialties());
 *
 * let geocoder = HttpGeocoder::with_config(config.geocode_base_url.clone(), &config)?;
 * let criteria = FilterCriteria::new().specialty("cardio").within("77002", 5.0);
 * let matches = dataset.filter(&criteria, &geocoder).await;
 *
 * let result = dataset.render(&MarkerRenderer::from_config(&config), &matches);
 * println!("{}", result.summary());
 * # Ok(())
 * # }
 * ```
 *
 * ## Interactive Sessions
 *
 * A [`session::Session`] keeps the current dataset behind an `Arc` and
 * debounces filter requests. Only the newest request is rendered; older ones
 * come back as [`session::FilterOutcome::Superseded`].
 *
 * ```no_run
 * # use physician_map::prelude::*;
 * # use std::sync::Arc;
 * # async fn run() -> Result<()> {
 * let config = LocatorConfig::default();
 * let session = Session::new(Arc::new(StaticGeocoder::new()), &config);
 * session.load(&FileProviderSource::new("providers.json")).await?;
 *
 * if let FilterOutcome::Applied(pass) = session.filter(FilterCriteria::new().language("spanish")).await {
 *     let result = session.render(&pass);
 *     println!("{}", session.status());
 *     println!("{} markers", result.displayed());
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * Settings are layered: built-in defaults, then `config.toml` from the
 * platform config directory (or an explicit path), then `PHYSMAP_*`
 * environment variables such as `PHYSMAP_MARKER_CAP=300`.
 *
 * ```no_run
 * # use physician_map::prelude::*;
 * # fn main() -> Result<()> {
 * let config = ConfigBuilder::new()
 *     .endpoint_url("https://example.com/exec")
 *     .marker_cap(250)
 *     .debounce_ms(150)
 *     .build()?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Exporting
 *
 * ```no_run
 * # use physician_map::prelude::*;
 * # fn main() -> Result<()> {
 * # let dataset = ProviderDataset::default();
 * dataset.export_json("providers.json")?;
 * dataset.export_subset(
 *     "spanish.csv",
 *     |p| p.languages().is_some_and(|l| l.to_lowercase().contains("spanish")),
 *     ExportFormat::Csv,
 * )?;
 * # Ok(())
 * # }
 * ```
 */

// Re-export error types from root
pub use error::{ExportFormat, LocatorError, Result};

// Public modules
pub mod config;
pub mod data_types;
pub mod dataset;
pub mod error;
pub mod export;
pub mod facets;
pub mod fetch;
pub mod filter;
pub mod geo;
pub mod geocode;
pub mod reader;
pub mod render;
pub mod session;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use physician_map::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigBuilder, LocatorConfig};
    pub use crate::data_types::*;
    pub use crate::dataset::{DatasetStatistics, ProviderDataset};
    pub use crate::error::{LocatorError, Result};
    pub use crate::export::{CsvExporter, JsonExporter, ResultExporter};
    pub use crate::facets::FacetIndex;
    pub use crate::fetch::{HttpProviderSource, ProviderSource, StaticProviderSource};
    pub use crate::filter::FilterEngine;
    pub use crate::geo::{Bounds, Coordinates};
    pub use crate::geocode::{GeocodeResolver, HttpGeocoder, StaticGeocoder};
    pub use crate::reader::{FileProviderSource, ProviderReader};
    pub use crate::render::{MapWidget, Marker, MarkerRenderer, RenderResult, ViewportAction};
    pub use crate::session::{FilterOutcome, FilterPass, Session, StatusMessage};
    pub use crate::ExportFormat;
}

/// Rendering and filtering defaults
pub mod constants {
    /// Markers drawn per render before the rest are dropped
    pub const MARKER_CAP: usize = 500;

    /// Below this many markers the map zooms to fit them
    pub const FIT_BOUNDS_THRESHOLD: usize = 200;

    /// Degrees between co-located markers and their shared point
    pub const MARKER_OFFSET_RADIUS: f64 = 0.0001;

    /// Fraction of the marker span added around fitted bounds
    pub const BOUNDS_PADDING: f64 = 0.1;

    /// Quiet period before a filter request runs
    pub const DEBOUNCE_MS: u64 = 300;

    /// Search radius when none was chosen
    pub const DEFAULT_DISTANCE_MILES: f64 = 10.0;

    /// Downtown Houston
    pub const DEFAULT_CENTER: (f64, f64) = (29.7604, -95.3698);

    pub const DEFAULT_ZOOM: u8 = 10;

    /// Zip lookup service, queried as `<base>/<zip>`
    pub const GEOCODE_BASE_URL: &str = "https://api.zippopotam.us/us";
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::prelude::*;
    use std::collections::BTreeMap;

    /// Providers whose practice name or display name contains `query`
    ///
    /// # Example
    /// ```no_run
    /// # use physician_map::prelude::*;
    /// # use physician_map::cookbook::find_by_partial_name;
    /// # let dataset = ProviderDataset::default();
    /// let hits = find_by_partial_name(&dataset, "memorial");
    /// ```
    pub fn find_by_partial_name<'a>(dataset: &'a ProviderDataset, query: &str) -> Vec<&'a ProviderRecord> {
        let query = query.to_lowercase();
        dataset
            .records()
            .iter()
            .filter(|p| {
                p.display_name().to_lowercase().contains(&query)
                    || p.practice_name()
                        .is_some_and(|name| name.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Provider counts per primary specialty
    pub fn specialty_distribution(dataset: &ProviderDataset) -> BTreeMap<String, usize> {
        let mut distribution = BTreeMap::new();
        for provider in dataset.records() {
            if let Some(specialty) = provider.primary_specialty() {
                *distribution.entry(specialty.into_owned()).or_insert(0) += 1;
            }
        }
        distribution
    }

    /// Each specialty paired with the subspecialties seen under it
    pub fn specialty_tree(dataset: &ProviderDataset) -> Vec<(String, Vec<String>)> {
        let facets = dataset.facets();
        facets
            .specialties()
            .iter()
            .map(|specialty| (specialty.clone(), facets.subspecialties_for(specialty)))
            .collect()
    }
}
