/*!
 * Filter engine: an ordered, short-circuiting chain of predicate stages
 *
 * Stages run in a fixed order (occupation, specialty, subspecialty, language,
 * distance), each over the survivors of the previous one. Once a stage leaves
 * nothing, the remaining stages are skipped, so an empty facet match never
 * pays for a geocode round-trip.
 *
 * Facet stages are case-insensitive, unanchored substring matches: a filter
 * value of "Cardio" also matches "Pediatric Cardiology".
 */

use std::fmt;

use crate::data_types::{FilterCriteria, ProviderRecord, ZipCode};
use crate::facets::FacetIndex;
use crate::geo::Coordinates;
use crate::geocode::GeocodeResolver;

/// Facet stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Occupation,
    Specialty,
    Subspecialty,
    Language,
}

impl FilterStage {
    pub const ORDER: [FilterStage; 4] = [
        FilterStage::Occupation,
        FilterStage::Specialty,
        FilterStage::Subspecialty,
        FilterStage::Language,
    ];

    /// The criteria value this stage filters on
    fn selection<'c>(&self, criteria: &'c FilterCriteria) -> &'c str {
        match self {
            FilterStage::Occupation => &criteria.occupation,
            FilterStage::Specialty => &criteria.specialty,
            FilterStage::Subspecialty => &criteria.subspecialty,
            FilterStage::Language => &criteria.language,
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterStage::Occupation => "occupation",
            FilterStage::Specialty => "specialty",
            FilterStage::Subspecialty => "subspecialty",
            FilterStage::Language => "language",
        };
        write!(f, "{}", name)
    }
}

/// Applies filter criteria to one fetch's records
#[derive(Debug, Clone, Copy)]
pub struct FilterEngine<'f> {
    subspecialty_field: Option<&'f str>,
}

impl<'f> FilterEngine<'f> {
    /// Engine bound to the subspecialty key detected for this fetch
    pub fn new(facets: &'f FacetIndex) -> Self {
        Self {
            subspecialty_field: facets.subspecialty_field(),
        }
    }

    pub fn with_subspecialty_field(subspecialty_field: Option<&'f str>) -> Self {
        Self { subspecialty_field }
    }

    /// Run the occupation, specialty, subspecialty, and language stages
    pub fn apply_facets<'r>(
        &self,
        records: &'r [ProviderRecord],
        criteria: &FilterCriteria,
    ) -> Vec<&'r ProviderRecord> {
        let mut current: Vec<&'r ProviderRecord> = records.iter().collect();

        for stage in FilterStage::ORDER {
            if current.is_empty() {
                tracing::debug!(%stage, "no candidates left, skipping remaining stages");
                break;
            }

            let selection = stage.selection(criteria);
            if selection.is_empty() {
                continue;
            }

            let needle = selection.to_lowercase();
            let before = current.len();
            current = match stage {
                FilterStage::Occupation => {
                    retain_matching(current, |r| matches_lowercase(r.occupation().as_deref(), &needle))
                }
                FilterStage::Specialty => {
                    retain_matching(current, |r| matches_lowercase(r.primary_specialty().as_deref(), &needle))
                }
                FilterStage::Subspecialty => match self.subspecialty_field {
                    Some(field) => {
                        retain_matching(current, |r| matches_lowercase(r.text(field).as_deref(), &needle))
                    }
                    None => {
                        tracing::debug!("no subspecialty field in this fetch, stage disabled");
                        current
                    }
                },
                FilterStage::Language => {
                    retain_matching(current, |r| matches_lowercase(r.languages().as_deref(), &needle))
                }
            };
            tracing::debug!(%stage, selection, before, after = current.len(), "filter stage applied");
        }

        current
    }

    /// Keep records with valid coordinates within `max_miles` of `origin`
    pub fn apply_distance<'r>(
        records: Vec<&'r ProviderRecord>,
        origin: &Coordinates,
        max_miles: f64,
    ) -> Vec<&'r ProviderRecord> {
        retain_matching(records, |r| {
            r.coordinates()
                .map(|c| c.distance_miles(origin) <= max_miles)
                .unwrap_or(false)
        })
    }

    /// Zip code the distance stage needs resolved, if it runs at all
    ///
    /// `None` when the facet stages left nothing or the criteria carry no
    /// valid zip code.
    pub fn distance_zip(
        narrowed: &[&ProviderRecord],
        criteria: &FilterCriteria,
    ) -> Option<ZipCode> {
        if narrowed.is_empty() {
            return None;
        }
        criteria.zip_code()
    }

    /// Finish a pass once the zip code has been resolved (or not)
    ///
    /// A failed resolution leaves the facet-filtered set untouched.
    pub fn apply_origin<'r>(
        narrowed: Vec<&'r ProviderRecord>,
        criteria: &FilterCriteria,
        origin: Option<&Coordinates>,
    ) -> Vec<&'r ProviderRecord> {
        match origin {
            Some(origin) => Self::apply_distance(narrowed, origin, criteria.max_distance_miles),
            None => narrowed,
        }
    }

    /// Run the full chain, resolving the zip code only if it is needed
    pub async fn apply<'r>(
        &self,
        records: &'r [ProviderRecord],
        criteria: &FilterCriteria,
        geocoder: &dyn GeocodeResolver,
    ) -> Vec<&'r ProviderRecord> {
        let narrowed = self.apply_facets(records, criteria);
        let origin = match Self::distance_zip(&narrowed, criteria) {
            Some(zip) => geocoder.resolve(&zip).await,
            None => None,
        };
        Self::apply_origin(narrowed, criteria, origin.as_ref())
    }
}

fn matches_lowercase(value: Option<&str>, needle: &str) -> bool {
    value
        .map(|v| v.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Order-preserving filter over record references
fn retain_matching<'r, F>(records: Vec<&'r ProviderRecord>, predicate: F) -> Vec<&'r ProviderRecord>
where
    F: Fn(&ProviderRecord) -> bool + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        records.into_par_iter().filter(|record| predicate(*record)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        records.into_iter().filter(|record| predicate(*record)).collect()
    }
}
