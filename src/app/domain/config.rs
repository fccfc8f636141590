use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Clamp a requested zoom factor into the supported range.
/// NaN collapses to 1.0; infinities clamp to the nearest bound.
pub fn clamp_zoom(level: f64) -> f64 {
    if level.is_nan() {
        return 1.0;
    }
    level.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Viewer configuration. Every field has a built-in default; a user file
/// only overrides the keys it carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub zoom_level: f64,
    pub font_family: String,
    pub font_size: u32,
    pub code_font: String,
    pub line_height: f64,
    /// Content column width, in characters.
    pub max_width: u32,
    pub editor: String,
    pub terminal: String,
    pub auto_reload: bool,
    pub custom_css_path: String,
    pub default_directory: String,
}

fn default_zoom_level() -> f64 {
    1.0
}

fn default_font_family() -> String {
    "system-ui, -apple-system, sans-serif".to_string()
}

fn default_font_size() -> u32 {
    16
}

fn default_code_font() -> String {
    "JetBrains Mono, Fira Code, Consolas, monospace".to_string()
}

fn default_line_height() -> f64 {
    1.7
}

fn default_max_width() -> u32 {
    52
}

fn default_editor() -> String {
    "micro".to_string()
}

fn default_terminal() -> String {
    "ghostty".to_string()
}

fn default_auto_reload() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zoom_level: default_zoom_level(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            code_font: default_code_font(),
            line_height: default_line_height(),
            max_width: default_max_width(),
            editor: default_editor(),
            terminal: default_terminal(),
            auto_reload: default_auto_reload(),
            custom_css_path: String::new(),
            default_directory: String::new(),
        }
    }
}

/// A field value that was present in the user file but could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedField {
    pub key: String,
    pub reason: String,
}

impl Config {
    /// Build a config from a parsed JSON document, keeping defaults for
    /// anything missing or malformed.
    pub fn from_json(value: &Value) -> (Self, Vec<RejectedField>) {
        let mut config = Self::default();
        let rejected = match value.as_object() {
            Some(obj) => config.overlay(obj),
            None => vec![RejectedField {
                key: "<root>".to_string(),
                reason: "expected a JSON object".to_string(),
            }],
        };
        (config, rejected)
    }

    /// Apply each known key of `obj` on top of `self`. A bad value is
    /// rejected for that key only. Unknown keys are ignored.
    pub fn overlay(&mut self, obj: &Map<String, Value>) -> Vec<RejectedField> {
        let mut rejected = Vec::new();

        for (key, value) in obj {
            let outcome = match key.as_str() {
                "zoom_level" => parse_field::<f64>(value)
                    .and_then(finite)
                    .map(|z| self.zoom_level = clamp_zoom(z)),
                "font_family" => parse_field(value).map(|v| self.font_family = v),
                "font_size" => parse_field::<u32>(value)
                    .and_then(positive)
                    .map(|v| self.font_size = v),
                "code_font" => parse_field(value).map(|v| self.code_font = v),
                "line_height" => parse_field::<f64>(value)
                    .and_then(finite)
                    .and_then(|v| {
                        if v > 0.0 {
                            Ok(v)
                        } else {
                            Err("must be greater than zero".to_string())
                        }
                    })
                    .map(|v| self.line_height = v),
                "max_width" => parse_field::<u32>(value)
                    .and_then(positive)
                    .map(|v| self.max_width = v),
                "editor" => parse_field(value).map(|v| self.editor = v),
                "terminal" => parse_field(value).map(|v| self.terminal = v),
                "auto_reload" => parse_field(value).map(|v| self.auto_reload = v),
                "custom_css_path" => parse_field(value).map(|v| self.custom_css_path = v),
                "default_directory" => parse_field(value).map(|v| self.default_directory = v),
                _ => {
                    debug!(key = %key, "ignoring unknown config key");
                    Ok(())
                }
            };

            if let Err(reason) = outcome {
                warn!(key = %key, %reason, "invalid config value, using default");
                rejected.push(RejectedField {
                    key: key.clone(),
                    reason,
                });
            }
        }

        rejected
    }

    /// The zoom level the viewer starts documents at.
    pub fn initial_zoom(&self) -> f64 {
        clamp_zoom(self.zoom_level)
    }
}

fn parse_field<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn finite(v: f64) -> Result<f64, String> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err("must be a finite number".to_string())
    }
}

fn positive(v: u32) -> Result<u32, String> {
    if v > 0 {
        Ok(v)
    } else {
        Err("must be greater than zero".to_string())
    }
}
