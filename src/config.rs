use crate::commands::keyboard::KeyBinding;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Clone, Debug, Default, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The default configuration for every presentation.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub bindings: KeyBindingsConfig,

    /// The PDF export configuration.
    #[serde(default)]
    pub export: ExportConfig,

    /// The configuration for the slide effects and input gestures.
    #[serde(default)]
    pub effects: EffectsConfig,
}

impl Config {
    /// Load the config from a path.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigLoadError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        let periods = [
            ("rotation_interval_ms", self.effects.rotation_interval_ms),
            ("typewriter_speed_ms", self.effects.typewriter_speed_ms),
        ];
        match periods.into_iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigLoadError::ZeroPeriod(name)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("config file not found")]
    NotFound,

    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_yaml::Error),

    #[error("effects.{0} must be greater than zero")]
    ZeroPeriod(&'static str),
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// The width in pixels of the viewport slides are rendered in when exporting.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// The height in pixels of the viewport slides are rendered in when exporting.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// A file to write logs into while presenting.
    pub log_file: Option<PathBuf>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { viewport_width: default_viewport_width(), viewport_height: default_viewport_height(), log_file: None }
    }
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// How long to let a slide settle before capturing it, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// The scale factor used when rasterizing slides.
    #[serde(default = "default_export_scale")]
    pub scale: f64,

    /// The background color slides are rasterized on.
    #[serde(default = "default_export_background")]
    pub background: String,

    /// The maximum time a single slide can take to be rasterized, in milliseconds.
    #[serde(default = "default_image_timeout")]
    pub image_timeout_ms: u64,

    /// The quality of the JPEG images embedded in the document, between 1 and 100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// The margin around images in every page, in millimeters.
    #[serde(default = "default_page_margin")]
    pub page_margin_mm: f64,

    /// The command used to take screenshots of slides.
    #[serde(default = "default_rasterizer_command")]
    pub rasterizer_command: String,

    /// The command used to generate PDF documents.
    #[serde(default = "default_document_command")]
    pub document_command: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            scale: default_export_scale(),
            background: default_export_background(),
            image_timeout_ms: default_image_timeout(),
            jpeg_quality: default_jpeg_quality(),
            page_margin_mm: default_page_margin(),
            rasterizer_command: default_rasterizer_command(),
            document_command: default_document_command(),
        }
    }
}

impl ExportConfig {
    pub(crate) fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub(crate) fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}

fn default_settle_delay() -> u64 {
    500
}

fn default_export_scale() -> f64 {
    2.5
}

fn default_export_background() -> String {
    "#ffffff".into()
}

fn default_image_timeout() -> u64 {
    15_000
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_page_margin() -> f64 {
    10.0
}

fn default_rasterizer_command() -> String {
    "wkhtmltoimage".into()
}

fn default_document_command() -> String {
    "weasyprint".into()
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EffectsConfig {
    /// The labels the rotating label cycles through. The first one is used when exporting.
    #[serde(default = "default_label_cycle")]
    pub label_cycle: Vec<LabelStyle>,

    /// How long to wait after a slide is shown before the rotating label starts, in milliseconds.
    #[serde(default = "default_rotation_delay")]
    pub rotation_delay_ms: u64,

    /// How often the rotating label changes, in milliseconds.
    #[serde(default = "default_rotation_interval")]
    pub rotation_interval_ms: u64,

    /// How long to wait after the first time a slide is shown before typing its text, in
    /// milliseconds.
    #[serde(default = "default_typewriter_delay")]
    pub typewriter_delay_ms: u64,

    /// The time it takes to type a single character, in milliseconds.
    #[serde(default = "default_typewriter_speed")]
    pub typewriter_speed_ms: u64,

    /// The minimum horizontal distance in pixels a drag needs to travel to count as a swipe.
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f64,

    /// How long the scroll wheel needs to stay still before it moves the presentation, in
    /// milliseconds.
    #[serde(default = "default_wheel_debounce")]
    pub wheel_debounce_ms: u64,

    /// How long notifications are visible for, in milliseconds.
    #[serde(default = "default_notification_duration")]
    pub notification_duration_ms: u64,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            label_cycle: default_label_cycle(),
            rotation_delay_ms: default_rotation_delay(),
            rotation_interval_ms: default_rotation_interval(),
            typewriter_delay_ms: default_typewriter_delay(),
            typewriter_speed_ms: default_typewriter_speed(),
            swipe_threshold: default_swipe_threshold(),
            wheel_debounce_ms: default_wheel_debounce(),
            notification_duration_ms: default_notification_duration(),
        }
    }
}

/// An entry in the rotating label cycle.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct LabelStyle {
    /// The label's text.
    pub text: String,

    /// The label's background.
    pub background: String,

    /// The color of the label's shadow.
    pub shadow: String,
}

impl LabelStyle {
    fn new(text: &str, from: &str, to: &str, shadow: &str) -> Self {
        Self {
            text: text.into(),
            background: format!("linear-gradient(135deg, {from} 0%, {to} 100%)"),
            shadow: shadow.into(),
        }
    }
}

fn default_label_cycle() -> Vec<LabelStyle> {
    vec![
        LabelStyle::new("ISO 27001", "#667eea", "#764ba2", "rgba(102, 126, 234, 0.4)"),
        LabelStyle::new("BSI C5", "#10b981", "#059669", "rgba(16, 185, 129, 0.4)"),
        LabelStyle::new("DORA", "#f59e0b", "#d97706", "rgba(245, 158, 11, 0.4)"),
        LabelStyle::new("NIS-2", "#ef4444", "#dc2626", "rgba(239, 68, 68, 0.4)"),
        LabelStyle::new("GDPR", "#8b5cf6", "#7c3aed", "rgba(139, 92, 246, 0.4)"),
        LabelStyle::new("SOC 2", "#06b6d4", "#0891b2", "rgba(6, 182, 212, 0.4)"),
        LabelStyle::new("PCI DSS", "#f97316", "#ea580c", "rgba(249, 115, 22, 0.4)"),
    ]
}

fn default_rotation_delay() -> u64 {
    1500
}

fn default_rotation_interval() -> u64 {
    3000
}

fn default_typewriter_delay() -> u64 {
    2500
}

fn default_typewriter_speed() -> u64 {
    35
}

fn default_swipe_threshold() -> f64 {
    50.0
}

fn default_wheel_debounce() -> u64 {
    50
}

fn default_notification_duration() -> u64 {
    3000
}

#[derive(Clone, Debug, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct KeyBindingsConfig {
    /// The keys that cause the presentation to move forwards.
    #[serde(default = "default_next_bindings")]
    pub(crate) next: Vec<KeyBinding>,

    /// The keys that cause the presentation to move backwards.
    #[serde(default = "default_previous_bindings")]
    pub(crate) previous: Vec<KeyBinding>,

    /// The key binding to jump to the first slide.
    #[serde(default = "default_first_slide_bindings")]
    pub(crate) first_slide: Vec<KeyBinding>,

    /// The key binding to jump to the last slide.
    #[serde(default = "default_last_slide_bindings")]
    pub(crate) last_slide: Vec<KeyBinding>,

    /// The key binding to jump to a specific slide.
    #[serde(default = "default_go_to_slide_bindings")]
    pub(crate) go_to_slide: Vec<KeyBinding>,

    /// The key binding to export the whole presentation as a PDF.
    #[serde(default = "default_export_pdf_bindings")]
    pub(crate) export_pdf: Vec<KeyBinding>,

    /// The key binding to export the current slide as a PDF.
    #[serde(default = "default_export_slide_bindings")]
    pub(crate) export_slide: Vec<KeyBinding>,

    /// The key binding to toggle fullscreen mode, which hides the navigation bar.
    #[serde(default = "default_toggle_fullscreen_bindings")]
    pub(crate) toggle_fullscreen: Vec<KeyBinding>,

    /// The key binding to close the application.
    #[serde(default = "default_exit_bindings")]
    pub(crate) exit: Vec<KeyBinding>,
}

impl Default for KeyBindingsConfig {
    fn default() -> Self {
        Self {
            next: default_next_bindings(),
            previous: default_previous_bindings(),
            first_slide: default_first_slide_bindings(),
            last_slide: default_last_slide_bindings(),
            go_to_slide: default_go_to_slide_bindings(),
            export_pdf: default_export_pdf_bindings(),
            export_slide: default_export_slide_bindings(),
            toggle_fullscreen: default_toggle_fullscreen_bindings(),
            exit: default_exit_bindings(),
        }
    }
}

fn make_keybindings<const N: usize>(raw_bindings: [&str; N]) -> Vec<KeyBinding> {
    let mut bindings = Vec::new();
    for binding in raw_bindings {
        bindings.push(binding.parse().expect("invalid binding"));
    }
    bindings
}

fn default_next_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<right>", " ", "l", "<page_down>"])
}

fn default_previous_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<left>", "h", "<page_up>"])
}

fn default_first_slide_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<home>", "gg"])
}

fn default_last_slide_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<end>", "G"])
}

fn default_go_to_slide_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<number>G"])
}

fn default_export_pdf_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<c-p>"])
}

fn default_export_slide_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<c-s>"])
}

fn default_toggle_fullscreen_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<c-f>"])
}

fn default_exit_bindings() -> Vec<KeyBinding> {
    make_keybindings(["<c-c>", "q"])
}
