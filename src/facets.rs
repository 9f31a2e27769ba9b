/*!
 * Facet index: the filterable values present in one fetch
 *
 * Built once per fetch in a single pass and never mutated afterwards. Every
 * exposed facet list is deduplicated and sorted ascending.
 */

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data_types::{contains_ignore_case, ProviderRecord};

/// Sentinel some sheets use for "no subspecialty"
pub const NOT_APPLICABLE: &str = "N/A";

/// Filterable values derived from a normalized record set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetIndex {
    occupations: Vec<String>,
    specialties: Vec<String>,
    languages: Vec<String>,
    subspecialties: Vec<String>,
    specialty_subspecialties: BTreeMap<String, BTreeSet<String>>,
    subspecialty_field: Option<String>,
}

/// Find the subspecialty key by probing the first record's keys
///
/// This is a one-shot heuristic: if the first record has no key containing
/// "subspecialty" (case-insensitively), subspecialty support is off for the
/// whole fetch.
pub fn detect_subspecialty_field(records: &[ProviderRecord]) -> Option<String> {
    records
        .first()?
        .keys()
        .find(|key| key.to_lowercase().contains("subspecialty"))
        .map(str::to_string)
}

impl FacetIndex {
    /// Scan normalized records and collect every facet
    pub fn build(records: &[ProviderRecord]) -> Self {
        let subspecialty_field = detect_subspecialty_field(records);

        let mut occupations = BTreeSet::new();
        let mut specialties = BTreeSet::new();
        let mut languages = BTreeSet::new();
        let mut subspecialties = BTreeSet::new();
        let mut specialty_subspecialties: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for record in records {
            if let Some(occupation) = record.occupation() {
                occupations.insert(occupation.into_owned());
            }

            let specialty = record.primary_specialty();
            if let Some(specialty) = &specialty {
                specialties.insert(specialty.to_string());
            }

            languages.extend(record.language_tokens());

            let subspecialty = subspecialty_field
                .as_deref()
                .and_then(|field| record.text(field))
                .filter(|s| &**s != NOT_APPLICABLE);

            if let Some(subspecialty) = subspecialty {
                subspecialties.insert(subspecialty.to_string());
                if let Some(specialty) = specialty {
                    specialty_subspecialties
                        .entry(specialty.into_owned())
                        .or_default()
                        .insert(subspecialty.into_owned());
                }
            }
        }

        tracing::debug!(
            occupations = occupations.len(),
            specialties = specialties.len(),
            languages = languages.len(),
            subspecialty_field = subspecialty_field.as_deref().unwrap_or("-"),
            "built facet index"
        );

        Self {
            occupations: occupations.into_iter().collect(),
            specialties: specialties.into_iter().collect(),
            languages: languages.into_iter().collect(),
            subspecialties: subspecialties.into_iter().collect(),
            specialty_subspecialties,
            subspecialty_field,
        }
    }

    pub fn occupations(&self) -> &[String] {
        &self.occupations
    }

    pub fn specialties(&self) -> &[String] {
        &self.specialties
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Every subspecialty seen in the fetch
    pub fn all_subspecialties(&self) -> &[String] {
        &self.subspecialties
    }

    /// The raw key holding subspecialties, if one was detected
    pub fn subspecialty_field(&self) -> Option<&str> {
        self.subspecialty_field.as_deref()
    }

    pub fn supports_subspecialty(&self) -> bool {
        self.subspecialty_field.is_some()
    }

    /// Subspecialties available under a specialty selection
    ///
    /// Gathers from every specialty that contains `specialty` as a
    /// case-insensitive substring. An empty selection returns the full set.
    pub fn subspecialties_for(&self, specialty: &str) -> Vec<String> {
        if specialty.is_empty() {
            return self.subspecialties.clone();
        }

        self.specialty_subspecialties
            .iter()
            .filter(|(key, _)| contains_ignore_case(key, specialty))
            .flat_map(|(_, subs)| subs.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
