/*!
 * Configuration support for the provider locator
 *
 * Provides endpoints, network timeouts, and map rendering tuning. Values are
 * layered: built-in defaults, then a TOML file, then `PHYSMAP_*` environment
 * variables.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::geo::Coordinates;
use crate::{LocatorError, Result};

/// Environment variable prefix, e.g. `PHYSMAP_MARKER_CAP=300`
pub const ENV_PREFIX: &str = "PHYSMAP";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Directory endpoint returning `{ "physicians": [...] }`
    pub endpoint_url: Option<String>,

    /// Zip lookup service; requests go to `<base>/<zip>`
    pub geocode_base_url: String,

    /// Timeout for each HTTP request
    pub request_timeout_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Map center used when the viewport is reset
    pub default_center: Coordinates,

    /// Zoom level used when the viewport is reset
    pub default_zoom: u8,

    /// Maximum number of markers drawn per render
    pub marker_cap: usize,

    /// Renders with this many markers or more keep the current viewport
    pub fit_bounds_threshold: usize,

    /// Radius, in degrees, for spreading co-located markers
    pub marker_offset_radius: f64,

    /// Fraction of the marker span added on each side when fitting
    pub bounds_padding: f64,

    /// Quiet period before a filter pass runs
    pub debounce_ms: u64,

    /// Distance used when no slider value was chosen
    pub default_distance_miles: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let (latitude, longitude) = constants::DEFAULT_CENTER;
        Self {
            endpoint_url: None,
            geocode_base_url: constants::GEOCODE_BASE_URL.to_string(),
            request_timeout_seconds: 30,
            user_agent: format!("physician-map/{}", env!("CARGO_PKG_VERSION")),
            default_center: Coordinates::new(latitude, longitude),
            default_zoom: constants::DEFAULT_ZOOM,
            marker_cap: constants::MARKER_CAP,
            fit_bounds_threshold: constants::FIT_BOUNDS_THRESHOLD,
            marker_offset_radius: constants::MARKER_OFFSET_RADIUS,
            bounds_padding: constants::BOUNDS_PADDING,
            debounce_ms: constants::DEBOUNCE_MS,
            default_distance_miles: constants::DEFAULT_DISTANCE_MILES,
        }
    }
}

impl LocatorConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file, without environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| LocatorError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| LocatorError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/physician-map/config.toml` on Unix-like systems
    /// or `%APPDATA%\physician-map\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "physician-map")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layer defaults, an optional TOML file, and `PHYSMAP_*` variables
    ///
    /// With `path` unset, the default config path is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Self::default()).map_err(config_error)?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(::config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder = builder.add_source(::config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let config: Self = settings.try_deserialize().map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer or filter engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str, suggestion: &str| {
            Err(LocatorError::Configuration {
                message: message.to_string(),
                suggestion: Some(suggestion.to_string()),
            })
        };

        if self.marker_cap == 0 {
            return invalid("marker_cap must be at least 1", "The default cap is 500");
        }
        if !(self.marker_offset_radius.is_finite() && self.marker_offset_radius > 0.0) {
            return invalid(
                "marker_offset_radius must be a positive number of degrees",
                "The default radius is 0.0001",
            );
        }
        if !(0.0..1.0).contains(&self.bounds_padding) {
            return invalid("bounds_padding must be in [0, 1)", "The default padding is 0.1");
        }
        if !self.default_center.is_valid() {
            return invalid("default_center must have finite coordinates", "Use decimal degrees");
        }
        if !(self.default_distance_miles.is_finite() && self.default_distance_miles >= 0.0) {
            return invalid("default_distance_miles must be non-negative", "The default is 10 miles");
        }
        if self.geocode_base_url.trim().is_empty() {
            return invalid("geocode_base_url cannot be empty", "Use https://api.zippopotam.us/us");
        }
        Ok(())
    }
}

fn config_error(err: ::config::ConfigError) -> LocatorError {
    LocatorError::Configuration {
        message: err.to_string(),
        suggestion: Some(format!(
            "Check the config file and any {}_* environment variables",
            ENV_PREFIX
        )),
    }
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: LocatorConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: LocatorConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Set the directory endpoint
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    /// Set the zip lookup service base URL
    pub fn geocode_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.geocode_base_url = url.into();
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.request_timeout_seconds = seconds;
        self
    }

    /// Set the default map view
    pub fn default_view(mut self, center: Coordinates, zoom: u8) -> Self {
        self.config.default_center = center;
        self.config.default_zoom = zoom;
        self
    }

    /// Set the marker cap
    pub fn marker_cap(mut self, cap: usize) -> Self {
        self.config.marker_cap = cap;
        self
    }

    /// Set the fit-bounds threshold
    pub fn fit_bounds_threshold(mut self, threshold: usize) -> Self {
        self.config.fit_bounds_threshold = threshold;
        self
    }

    /// Set the debounce window
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// Set the default search distance
    pub fn default_distance_miles(mut self, miles: f64) -> Self {
        self.config.default_distance_miles = miles;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<LocatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
