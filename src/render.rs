/*!
 * Marker rendering: grouping, de-overlap, capping, and viewport fitting
 *
 * The renderer is pure: it turns a result set into markers plus a viewport
 * decision, and [`RenderResult::apply_to`] hands both to whatever map widget
 * the presentation layer owns. Popup content is not built here; call
 * [`render_detail`] when a marker is actually opened.
 */

use std::borrow::Borrow;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::config::LocatorConfig;
use crate::data_types::{Field, ProviderRecord};
use crate::geo::{Bounds, Coordinates};

/// The external map collaborator
pub trait MapWidget {
    /// Remove every pin currently shown
    fn clear_markers(&mut self);

    /// Show pins for the given markers
    fn show_markers(&mut self, markers: &[Marker]);

    /// Fit the viewport to a bounding box
    fn fit_bounds(&mut self, bounds: Bounds);

    /// Center the viewport at a fixed zoom level
    fn set_view(&mut self, center: Coordinates, zoom: u8);
}

/// Key under which co-located providers are grouped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum LocationKey {
    /// Trimmed address text
    Address(String),
    /// Coordinates in millionths of a degree, used when the address is blank
    Rounded(i64, i64),
}

impl LocationKey {
    fn for_record(record: &ProviderRecord, coordinates: &Coordinates) -> Self {
        match record.address() {
            Some(address) if !address.trim().is_empty() => LocationKey::Address(address.trim().to_string()),
            _ => LocationKey::Rounded(
                (coordinates.latitude * 1e6).round() as i64,
                (coordinates.longitude * 1e6).round() as i64,
            ),
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationKey::Address(address) => write!(f, "{}", address),
            LocationKey::Rounded(lat, lng) => write!(f, "{:.6},{:.6}", *lat as f64 / 1e6, *lng as f64 / 1e6),
        }
    }
}

/// Where a marker sits within its location group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupContext {
    pub key: LocationKey,
    /// Number of displayed providers sharing the location
    pub size: usize,
    /// Zero-based position within the group; position 0 keeps the exact coordinate
    pub position: usize,
}

impl GroupContext {
    /// How many other providers share this location
    pub fn others(&self) -> usize {
        self.size.saturating_sub(1)
    }
}

/// One pin handed to the map widget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Coordinates,
    pub label: String,
    /// Index into the record slice that was rendered
    pub record_index: usize,
    pub group: GroupContext,
}

/// What the map should do with its viewport after a render
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ViewportAction {
    /// Fit to the (already padded) bounds of the markers
    FitBounds(Bounds),
    /// Return to the configured default center and zoom
    ResetDefault { center: Coordinates, zoom: u8 },
    /// Leave the viewport where the user has it
    Keep,
}

/// Outcome of one render pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderResult {
    pub markers: Vec<Marker>,
    /// Records supplied to the renderer, before capping
    pub supplied: usize,
    /// Records considered after capping
    pub considered: usize,
    /// Considered records dropped for missing or non-numeric coordinates
    pub skipped_invalid: usize,
    pub viewport: ViewportAction,
}

impl RenderResult {
    /// Number of markers actually shown
    pub fn displayed(&self) -> usize {
        self.markers.len()
    }

    pub fn was_capped(&self) -> bool {
        self.supplied > self.considered
    }

    /// Result-count text, noting the original count when capped
    pub fn summary(&self) -> String {
        if self.was_capped() {
            format!(
                "Showing {} physician(s) (limited from {} for performance).",
                self.displayed(),
                self.supplied
            )
        } else {
            format!("Showing {} physician(s).", self.displayed())
        }
    }

    /// Popup content for one marker, built on demand
    pub fn detail<R: Borrow<ProviderRecord>>(
        &self,
        records: &[R],
        marker_index: usize,
        subspecialty_field: Option<&str>,
    ) -> Option<MarkerDetail> {
        let marker = self.markers.get(marker_index)?;
        let record = records.get(marker.record_index)?;
        Some(render_detail(record.borrow(), &marker.group, subspecialty_field))
    }

    /// Redraw the widget: clear, add pins, then adjust the viewport
    pub fn apply_to(&self, widget: &mut dyn MapWidget) {
        widget.clear_markers();
        widget.show_markers(&self.markers);
        match self.viewport {
            ViewportAction::FitBounds(bounds) => widget.fit_bounds(bounds),
            ViewportAction::ResetDefault { center, zoom } => widget.set_view(center, zoom),
            ViewportAction::Keep => {}
        }
    }
}

/// Popup content for a single provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDetail {
    pub name: String,
    pub occupation: Option<String>,
    pub specialty: Option<String>,
    pub subspecialty: Option<String>,
    pub practice: Option<String>,
    pub address: Option<String>,
    pub languages: Option<String>,
    pub profile_url: Option<String>,
    pub others_at_location: usize,
}

impl fmt::Display for MarkerDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        let rows = [
            ("Occupation", &self.occupation),
            ("Specialty", &self.specialty),
            ("Subspecialty", &self.subspecialty),
            ("Practice", &self.practice),
            ("Address", &self.address),
            ("Languages", &self.languages),
            ("Profile", &self.profile_url),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                writeln!(f, "  {}: {}", label, value)?;
            }
        }
        if self.others_at_location > 0 {
            writeln!(f, "  ({} others at this location)", self.others_at_location)?;
        }
        Ok(())
    }
}

/// Build popup content for one record; pure and side-effect free
pub fn render_detail(
    record: &ProviderRecord,
    group: &GroupContext,
    subspecialty_field: Option<&str>,
) -> MarkerDetail {
    MarkerDetail {
        name: record.display_name(),
        occupation: record.occupation().map(Into::into),
        specialty: record.primary_specialty().map(Into::into),
        subspecialty: subspecialty_field
            .and_then(|field| record.text(field))
            .map(Into::into),
        practice: record.practice_name().map(Into::into),
        address: record.address().map(Into::into),
        languages: record.languages().map(Into::into),
        profile_url: record.profile_url().map(Into::into),
        others_at_location: group.others(),
    }
}

/// Renderer tuning, normally taken from [`LocatorConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRenderer {
    pub marker_cap: usize,
    pub fit_bounds_threshold: usize,
    pub offset_radius: f64,
    pub bounds_padding: f64,
    pub default_center: Coordinates,
    pub default_zoom: u8,
}

impl Default for MarkerRenderer {
    fn default() -> Self {
        Self::from_config(&LocatorConfig::default())
    }
}

struct Group {
    key: LocationKey,
    base: Coordinates,
    size: usize,
}

impl MarkerRenderer {
    pub fn from_config(config: &LocatorConfig) -> Self {
        Self {
            marker_cap: config.marker_cap,
            fit_bounds_threshold: config.fit_bounds_threshold,
            offset_radius: config.marker_offset_radius,
            bounds_padding: config.bounds_padding,
            default_center: config.default_center,
            default_zoom: config.default_zoom,
        }
    }

    /// Render a result set
    ///
    /// `total_loaded` is the size of the whole fetch; it decides whether an
    /// empty result resets the viewport.
    pub fn render<R: Borrow<ProviderRecord>>(&self, records: &[R], total_loaded: usize) -> RenderResult {
        let supplied = records.len();
        let considered = supplied.min(self.marker_cap);
        if supplied > considered {
            tracing::info!(supplied, cap = self.marker_cap, "limiting markers for performance");
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut group_ids: HashMap<LocationKey, usize> = HashMap::new();
        let mut placed: Vec<(usize, usize, usize)> = Vec::with_capacity(considered);
        let mut skipped_invalid = 0;

        for (index, record) in records[..considered].iter().enumerate() {
            let record = record.borrow();
            let Some(coordinates) = record.coordinates() else {
                skipped_invalid += 1;
                tracing::warn!(
                    name = %record.display_name(),
                    latitude = ?record.value(Field::Latitude),
                    longitude = ?record.value(Field::Longitude),
                    "skipping provider with invalid coordinates"
                );
                continue;
            };

            let key = LocationKey::for_record(record, &coordinates);
            let group_id = *group_ids.entry(key.clone()).or_insert_with(|| {
                groups.push(Group {
                    key,
                    base: coordinates,
                    size: 0,
                });
                groups.len() - 1
            });
            let position = groups[group_id].size;
            groups[group_id].size += 1;
            placed.push((index, group_id, position));
        }

        let markers: Vec<Marker> = placed
            .into_iter()
            .map(|(index, group_id, position)| {
                let group = &groups[group_id];
                Marker {
                    position: self.offset_position(group.base, position, group.size),
                    label: records[index].borrow().display_name(),
                    record_index: index,
                    group: GroupContext {
                        key: group.key.clone(),
                        size: group.size,
                        position,
                    },
                }
            })
            .collect();

        let viewport = self.viewport_for(&markers, total_loaded);

        RenderResult {
            markers,
            supplied,
            considered,
            skipped_invalid,
            viewport,
        }
    }

    /// Spread group members on a small circle around the base coordinate
    fn offset_position(&self, base: Coordinates, position: usize, size: usize) -> Coordinates {
        if size <= 1 || position == 0 {
            return base;
        }
        let angle = position as f64 * 2.0 * PI / size as f64;
        Coordinates::new(
            base.latitude + self.offset_radius * angle.cos(),
            base.longitude + self.offset_radius * angle.sin(),
        )
    }

    fn viewport_for(&self, markers: &[Marker], total_loaded: usize) -> ViewportAction {
        let reset = ViewportAction::ResetDefault {
            center: self.default_center,
            zoom: self.default_zoom,
        };

        match markers.len() {
            0 if total_loaded > 0 => reset,
            0 => ViewportAction::Keep,
            n if n < self.fit_bounds_threshold => {
                match Bounds::from_points(markers.iter().map(|m| &m.position)) {
                    Some(bounds) => ViewportAction::FitBounds(bounds.pad(self.bounds_padding)),
                    None => {
                        tracing::warn!("could not compute marker bounds, resetting view");
                        reset
                    }
                }
            }
            _ => ViewportAction::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, address: &str, lat: f64, lng: f64) -> ProviderRecord {
        ProviderRecord::new()
            .with("Name", name)
            .with("Address", address)
            .with("Latitude", lat)
            .with("Longitude", lng)
    }

    #[derive(Default)]
    struct RecordingWidget {
        cleared: usize,
        pins: usize,
        fitted: Option<Bounds>,
        view: Option<(Coordinates, u8)>,
    }

    impl MapWidget for RecordingWidget {
        fn clear_markers(&mut self) {
            self.cleared += 1;
            self.pins = 0;
        }

        fn show_markers(&mut self, markers: &[Marker]) {
            self.pins += markers.len();
        }

        fn fit_bounds(&mut self, bounds: Bounds) {
            self.fitted = Some(bounds);
        }

        fn set_view(&mut self, center: Coordinates, zoom: u8) {
            self.view = Some((center, zoom));
        }
    }

    #[test]
    fn test_invalid_coordinates_are_skipped() {
        let records = vec![
            provider("Dr. A", "1 Main St", 29.7, -95.3),
            ProviderRecord::new().with("Name", "Dr. B").with("Latitude", f64::NAN).with("Longitude", -95.4),
        ];
        let result = MarkerRenderer::default().render(&records, records.len());

        assert_eq!(result.displayed(), 1);
        assert_eq!(result.skipped_invalid, 1);
        assert_eq!(result.markers[0].label, "Dr. A");
        assert!(matches!(result.viewport, ViewportAction::FitBounds(_)));
    }

    #[test]
    fn test_cap_reports_original_count() {
        let records: Vec<ProviderRecord> = (0..600)
            .map(|i| provider(&format!("Dr. {}", i), "", 29.0 + i as f64 * 0.001, -95.0))
            .collect();
        let result = MarkerRenderer::default().render(&records, records.len());

        assert_eq!(result.displayed(), 500);
        assert_eq!(result.supplied, 600);
        assert!(result.was_capped());
        assert_eq!(
            result.summary(),
            "Showing 500 physician(s) (limited from 600 for performance)."
        );
        // Too many markers to refit
        assert_eq!(result.viewport, ViewportAction::Keep);
    }

    #[test]
    fn test_shared_address_gets_offsets() {
        let records = vec![
            provider("Dr. A", "100 Main St", 29.7, -95.3),
            provider("Dr. B", " 100 Main St ", 29.7, -95.3),
            provider("Dr. C", "200 Elm St", 29.8, -95.4),
        ];
        let result = MarkerRenderer::default().render(&records, records.len());

        let a = &result.markers[0];
        let b = &result.markers[1];
        assert_eq!(a.position, Coordinates::new(29.7, -95.3));
        assert_ne!(a.position, b.position);
        assert_eq!(a.group.size, 2);
        assert_eq!(b.group.position, 1);
        assert_eq!(result.markers[2].group.others(), 0);
    }

    #[test]
    fn test_blank_address_groups_by_rounded_coordinates() {
        let records = vec![
            provider("Dr. A", "", 29.7000001, -95.3),
            provider("Dr. B", "", 29.7000002, -95.3),
        ];
        let result = MarkerRenderer::default().render(&records, records.len());
        assert_eq!(result.markers[0].group.key, LocationKey::Rounded(29_700_000, -95_300_000));
        assert_eq!(result.markers[1].group.size, 2);
    }

    #[test]
    fn test_empty_result_resets_view_only_when_data_loaded() {
        let renderer = MarkerRenderer::default();
        let empty: Vec<ProviderRecord> = Vec::new();

        let result = renderer.render(&empty, 10);
        assert!(matches!(result.viewport, ViewportAction::ResetDefault { zoom: 10, .. }));

        let result = renderer.render(&empty, 0);
        assert_eq!(result.viewport, ViewportAction::Keep);
    }

    #[test]
    fn test_apply_to_widget() {
        let records = vec![
            provider("Dr. A", "1 Main St", 29.7, -95.3),
            provider("Dr. B", "2 Main St", 29.9, -95.5),
        ];
        let result = MarkerRenderer::default().render(&records, records.len());
        let mut widget = RecordingWidget::default();
        result.apply_to(&mut widget);

        assert_eq!(widget.cleared, 1);
        assert_eq!(widget.pins, 2);
        let bounds = widget.fitted.unwrap();
        assert!(bounds.south < 29.7 && bounds.north > 29.9);
        assert!(widget.view.is_none());
    }

    #[test]
    fn test_detail_is_built_on_demand() {
        let records = vec![
            provider("Dr. A", "100 Main St", 29.7, -95.3)
                .with("Specialty", "Cardiology")
                .with("Subspecialty", "Electrophysiology")
                .with("ProfileURL", "ftp://example.com"),
            provider("Dr. B", "100 Main St", 29.7, -95.3),
        ];
        let result = MarkerRenderer::default().render(&records, records.len());
        let detail = result.detail(&records, 0, Some("Subspecialty")).unwrap();

        assert_eq!(detail.name, "Dr. A");
        assert_eq!(detail.subspecialty.as_deref(), Some("Electrophysiology"));
        assert_eq!(detail.profile_url, None);
        assert_eq!(detail.others_at_location, 1);
        assert!(detail.to_string().contains("1 others at this location"));
        assert!(result.detail(&records, 5, None).is_none());
    }
}
