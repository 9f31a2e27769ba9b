/*!
 * Data type definitions for provider directory records
 *
 * Raw directory rows arrive as loosely-typed key/value maps whose key names
 * drift between data sources ("Full Name" vs "Name", "Lat" vs "Latitude").
 * Records therefore stay map-shaped, and every logical field is read through
 * [`Field`], which owns the ordered alias list for that field.
 */

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DISTANCE_MILES;
use crate::geo::Coordinates;
use crate::{LocatorError, Result};

/// A single field value: directory sheets carry either text or numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Text form of the value; numbers print without a trailing `.0`
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s.as_str()),
            FieldValue::Number(n) => Cow::Owned(format_number(*n)),
        }
    }

    /// Numeric form of the value, if it is (or parses as) a finite number
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Empty or whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Logical provider fields and the raw key names each may appear under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Occupation,
    /// The primary specialty; falls back to subspecialty keys when no specialty is present
    Specialty,
    PracticeName,
    Address,
    LanguagesSpoken,
    Latitude,
    Longitude,
    ProfileUrl,
}

impl Field {
    /// Raw key names for this field, highest priority first
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Name => &["Name", "Full Name", "name", "full name"],
            Field::Occupation => &["Occupation", "occupation"],
            Field::Specialty => &["Specialty", "specialty", "Subspecialty", "subspecialty"],
            Field::PracticeName => &["PracticeName", "Practice Name", "practiceName"],
            Field::Address => &["Address", "address", "Practice Address"],
            Field::LanguagesSpoken => &["LanguagesSpoken", "Languages Spoken", "Languages", "languages"],
            Field::Latitude => &["Latitude", "latitude", "Lat", "lat"],
            Field::Longitude => &["Longitude", "longitude", "Lng", "lng", "Long"],
            Field::ProfileUrl => &["ProfileURL", "Profile URL", "ProfileUrl", "profileUrl"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.aliases()[0])
    }
}

/// One practitioner entry from the directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ProviderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for constructing fixtures
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Non-blank text stored under exactly `key`
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.fields
            .get(key)
            .filter(|v| !v.is_blank())
            .map(FieldValue::as_text)
    }

    /// First non-blank value among the field's aliases
    pub fn value(&self, field: Field) -> Option<&FieldValue> {
        field
            .aliases()
            .iter()
            .filter_map(|alias| self.fields.get(*alias))
            .find(|v| !v.is_blank())
    }

    /// Text of the first non-blank alias of `field`
    pub fn resolve(&self, field: Field) -> Option<Cow<'_, str>> {
        self.value(field).map(FieldValue::as_text)
    }

    pub fn name(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::Name)
    }

    pub fn occupation(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::Occupation)
    }

    /// See [`Field::Specialty`] for the fallback order
    pub fn primary_specialty(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::Specialty)
    }

    pub fn practice_name(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::PracticeName)
    }

    pub fn address(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::Address)
    }

    /// The raw, comma-separated languages field
    pub fn languages(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::LanguagesSpoken)
    }

    /// Individual language names, trimmed, empty tokens dropped
    pub fn language_tokens(&self) -> Vec<String> {
        self.languages()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Profile link, only if it looks like an absolute http(s) URL
    pub fn profile_url(&self) -> Option<Cow<'_, str>> {
        self.resolve(Field::ProfileUrl).filter(|url| url.starts_with("http"))
    }

    /// Coordinates, if both latitude and longitude are finite numbers
    pub fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.value(Field::Latitude)?.as_number()?;
        let longitude = self.value(Field::Longitude)?.as_number()?;
        Some(Coordinates::new(latitude, longitude))
    }

    /// Label for log lines and marker titles
    pub fn display_name(&self) -> String {
        self.name()
            .map(Cow::into_owned)
            .unwrap_or_else(|| "Unknown provider".to_string())
    }
}

impl FromIterator<(String, FieldValue)> for ProviderRecord {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Case-insensitive, unanchored substring test
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A validated 5-digit US zip code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZipCode(String);

impl ZipCode {
    /// Validate a zip code, trimming surrounding whitespace first
    pub fn new(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.len() != 5 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(LocatorError::invalid_zip(trimmed));
        }
        Ok(ZipCode(trimmed.to_string()))
    }

    /// `Some` only for exactly five ASCII digits
    pub fn parse(value: &str) -> Option<Self> {
        Self::new(value).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-selected filter values for one filter pass
///
/// Empty strings mean "unconstrained". Distance filtering only activates when
/// `postal_code` is exactly five digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub occupation: String,
    pub specialty: String,
    pub subspecialty: String,
    pub language: String,
    pub postal_code: String,
    pub max_distance_miles: f64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            occupation: String::new(),
            specialty: String::new(),
            subspecialty: String::new(),
            language: String::new(),
            postal_code: String::new(),
            max_distance_miles: DEFAULT_DISTANCE_MILES,
        }
    }
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupation(mut self, occupation: impl Into<String>) -> Self {
        self.occupation = occupation.into();
        self
    }

    pub fn specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = specialty.into();
        self
    }

    pub fn subspecialty(mut self, subspecialty: impl Into<String>) -> Self {
        self.subspecialty = subspecialty.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Restrict to providers within `miles` of the zip code's centroid
    pub fn within(mut self, postal_code: impl Into<String>, miles: f64) -> Self {
        self.postal_code = postal_code.into();
        self.max_distance_miles = miles;
        self
    }

    /// The zip code, if it is valid enough to activate distance filtering
    pub fn zip_code(&self) -> Option<ZipCode> {
        ZipCode::parse(&self.postal_code)
    }

    /// No facet selected and no usable zip code
    pub fn is_unconstrained(&self) -> bool {
        self.occupation.is_empty()
            && self.specialty.is_empty()
            && self.subspecialty.is_empty()
            && self.language.is_empty()
            && self.zip_code().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(FieldValue::Number(77002.0).as_text(), "77002");
        assert_eq!(FieldValue::Number(29.7).as_text(), "29.7");
        assert_eq!(FieldValue::Text("29.7".into()).as_number(), Some(29.7));
        assert_eq!(FieldValue::Text("".into()).as_number(), None);
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn test_alias_priority() {
        let record = ProviderRecord::new()
            .with("Full Name", "Dr. Alias")
            .with("Name", "  ")
            .with("subspecialty", "Pediatric Cardiology");

        // Blank "Name" does not shadow "Full Name"
        assert_eq!(record.name().as_deref(), Some("Dr. Alias"));
        // No specialty key at all, so the subspecialty fallback wins
        assert_eq!(record.primary_specialty().as_deref(), Some("Pediatric Cardiology"));

        let record = record.with("specialty", "Pediatrics").with("Specialty", "Internal Medicine");
        assert_eq!(record.primary_specialty().as_deref(), Some("Internal Medicine"));
    }

    #[test]
    fn test_coordinates() {
        let record = ProviderRecord::new().with("Latitude", 29.7).with("Longitude", "-95.3");
        assert_eq!(record.coordinates(), Some(Coordinates::new(29.7, -95.3)));

        let record = ProviderRecord::new().with("Latitude", f64::NAN).with("Longitude", -95.4);
        assert_eq!(record.coordinates(), None);

        let record = ProviderRecord::new().with("Lat", "abc").with("Lng", -95.4);
        assert_eq!(record.coordinates(), None);
    }

    #[test]
    fn test_profile_url_requires_http() {
        let record = ProviderRecord::new().with("ProfileURL", "www.example.com/dr");
        assert!(record.profile_url().is_none());
        let record = ProviderRecord::new().with("ProfileURL", "https://example.com/dr");
        assert_eq!(record.profile_url().as_deref(), Some("https://example.com/dr"));
    }

    #[test]
    fn test_language_tokens() {
        let record = ProviderRecord::new().with("LanguagesSpoken", "English, Spanish,, Vietnamese ");
        assert_eq!(record.language_tokens(), vec!["English", "Spanish", "Vietnamese"]);
        assert!(ProviderRecord::new().language_tokens().is_empty());
    }

    #[test]
    fn test_zip_code_validation() {
        assert!(ZipCode::new(" 77002 ").is_ok());
        assert!(ZipCode::new("7700").is_err());
        assert!(ZipCode::new("77002-1234").is_err());
        assert!(ZipCode::new("7700a").is_err());
        assert!(ZipCode::parse("").is_none());
    }

    #[test]
    fn test_criteria_defaults() {
        let criteria = FilterCriteria::new();
        assert_eq!(criteria.max_distance_miles, DEFAULT_DISTANCE_MILES);
        assert!(criteria.is_unconstrained());

        let criteria = criteria.within("7700", 5.0);
        assert!(criteria.is_unconstrained());
        assert!(!FilterCriteria::new().specialty("cardio").is_unconstrained());
    }
}
