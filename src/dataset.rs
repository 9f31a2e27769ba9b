/*!
 * Per-fetch dataset snapshot
 *
 * A `ProviderDataset` bundles the normalized records of one fetch with the
 * facet index derived from them. It is built once and never mutated; a new
 * fetch produces a new dataset that replaces the old one whole.
 */

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data_types::{FilterCriteria, ProviderRecord};
use crate::facets::FacetIndex;
use crate::fetch::ProviderSource;
use crate::filter::FilterEngine;
use crate::geocode::GeocodeResolver;
use crate::reader::normalize_records;
use crate::render::{MarkerRenderer, RenderResult};
use crate::Result;

/// Normalized records plus their facet index
#[derive(Debug, Clone)]
pub struct ProviderDataset {
    records: Vec<ProviderRecord>,
    facets: FacetIndex,
    fetched_at: DateTime<Utc>,
}

impl Default for ProviderDataset {
    fn default() -> Self {
        Self::from_raw(&[])
    }
}

impl ProviderDataset {
    /// Normalize raw records and index their facets
    pub fn from_raw(raw: &[ProviderRecord]) -> Self {
        let records = normalize_records(raw);
        let facets = FacetIndex::build(&records);
        Self {
            records,
            facets,
            fetched_at: Utc::now(),
        }
    }

    /// Fetch from a source and build a dataset from the result
    pub async fn load(source: &dyn ProviderSource) -> Result<Self> {
        let raw = source.fetch().await?;
        let dataset = Self::from_raw(&raw);
        tracing::info!(
            source = %source.describe(),
            records = dataset.len(),
            specialties = dataset.facets.specialties().len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn records(&self) -> &[ProviderRecord] {
        &self.records
    }

    pub fn facets(&self) -> &FacetIndex {
        &self.facets
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Total records fetched, including those without coordinates
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Filter engine bound to this fetch's subspecialty field
    pub fn filter_engine(&self) -> FilterEngine<'_> {
        FilterEngine::new(&self.facets)
    }

    /// Run the full filter chain over this dataset
    pub async fn filter(
        &self,
        criteria: &FilterCriteria,
        geocoder: &dyn GeocodeResolver,
    ) -> Vec<&ProviderRecord> {
        self.filter_engine().apply(&self.records, criteria, geocoder).await
    }

    /// Render a subset (or all) of this dataset's records
    pub fn render<R: std::borrow::Borrow<ProviderRecord>>(
        &self,
        renderer: &MarkerRenderer,
        records: &[R],
    ) -> RenderResult {
        renderer.render(records, self.len())
    }

    /// Render every record, as on first load or after a reset
    pub fn render_all(&self, renderer: &MarkerRenderer) -> RenderResult {
        renderer.render(&self.records, self.len())
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics::from_dataset(self)
    }
}

/// Dataset statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatistics {
    pub total_providers: usize,
    pub with_coordinates: usize,
    pub invalid_coordinates: usize,
    pub with_profile_url: usize,
    pub occupations: usize,
    pub specialties: usize,
    pub subspecialties: usize,
    pub languages: usize,
    pub subspecialty_field: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl DatasetStatistics {
    /// Calculate statistics from a dataset
    pub fn from_dataset(dataset: &ProviderDataset) -> Self {
        let with_coordinates = dataset
            .records
            .iter()
            .filter(|r| r.coordinates().is_some())
            .count();
        let with_profile_url = dataset
            .records
            .iter()
            .filter(|r| r.profile_url().is_some())
            .count();

        Self {
            total_providers: dataset.len(),
            with_coordinates,
            invalid_coordinates: dataset.len() - with_coordinates,
            with_profile_url,
            occupations: dataset.facets.occupations().len(),
            specialties: dataset.facets.specialties().len(),
            subspecialties: dataset.facets.all_subspecialties().len(),
            languages: dataset.facets.languages().len(),
            subspecialty_field: dataset.facets.subspecialty_field().map(str::to_string),
            fetched_at: dataset.fetched_at,
        }
    }

    /// Print a formatted summary of the statistics
    pub fn print_summary(&self) {
        println!("=== Provider Directory Statistics ===");
        println!("Fetched: {}", self.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Total Providers: {}", self.total_providers);
        if self.total_providers > 0 {
            println!(
                "  Mappable: {} ({:.1}%)",
                self.with_coordinates,
                (self.with_coordinates as f64 / self.total_providers as f64) * 100.0
            );
        }
        if self.invalid_coordinates > 0 {
            println!("  Missing/invalid coordinates: {}", self.invalid_coordinates);
        }
        println!("  With profile link: {}", self.with_profile_url);
        println!("Occupations: {}", self.occupations);
        println!("Specialties: {}", self.specialties);
        match &self.subspecialty_field {
            Some(field) => println!("Subspecialties: {} (field '{}')", self.subspecialties, field),
            None => println!("Subspecialties: not present in data"),
        }
        println!("Languages: {}", self.languages);
    }
}
