//! Encoder configuration types.

use crate::error::{Error, Result};
use core::ffi::c_int;
use core::fmt;
use core::str::FromStr;
use std::sync::OnceLock;

/// Content-aware encoding presets.
///
/// A preset seeds every libwebp tuning parameter before the explicit
/// lossless/quality/method settings are applied on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Preset {
    /// Default preset, balanced for general use.
    #[default]
    Default = 0,
    /// Digital picture (portrait, indoor shot).
    Picture = 1,
    /// Outdoor photograph with natural lighting.
    Photo = 2,
    /// Hand or line drawing with high-contrast details.
    Drawing = 3,
    /// Small-sized colorful images like icons or sprites.
    Icon = 4,
    /// Text-heavy images.
    Text = 5,
}

impl Preset {
    /// Convert to libwebp preset value.
    pub(crate) fn to_libwebp(self) -> libwebp_sys::WebPPreset {
        match self {
            Preset::Default => libwebp_sys::WebPPreset::WEBP_PRESET_DEFAULT,
            Preset::Picture => libwebp_sys::WebPPreset::WEBP_PRESET_PICTURE,
            Preset::Photo => libwebp_sys::WebPPreset::WEBP_PRESET_PHOTO,
            Preset::Drawing => libwebp_sys::WebPPreset::WEBP_PRESET_DRAWING,
            Preset::Icon => libwebp_sys::WebPPreset::WEBP_PRESET_ICON,
            Preset::Text => libwebp_sys::WebPPreset::WEBP_PRESET_TEXT,
        }
    }
}

/// Content hint for the encoder's internal heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageHint {
    /// No particular content.
    #[default]
    Default,
    /// Digital picture, like portrait or inner shot.
    Picture,
    /// Outdoor photograph with natural lighting.
    Photo,
    /// Discrete tone image (graph, map-tile etc).
    Graph,
}

impl ImageHint {
    /// Parse a hint name, falling back to [`ImageHint::Default`] for
    /// anything unrecognized.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    /// Lowercase name of the hint.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ImageHint::Default => "default",
            ImageHint::Picture => "picture",
            ImageHint::Photo => "photo",
            ImageHint::Graph => "graph",
        }
    }

    pub(crate) fn to_libwebp(self) -> libwebp_sys::WebPImageHint {
        match self {
            ImageHint::Default => libwebp_sys::WebPImageHint::WEBP_HINT_DEFAULT,
            ImageHint::Picture => libwebp_sys::WebPImageHint::WEBP_HINT_PICTURE,
            ImageHint::Photo => libwebp_sys::WebPImageHint::WEBP_HINT_PHOTO,
            ImageHint::Graph => libwebp_sys::WebPImageHint::WEBP_HINT_GRAPH,
        }
    }
}

impl FromStr for ImageHint {
    type Err = Error;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ImageHint::Default),
            "picture" => Ok(ImageHint::Picture),
            "photo" => Ok(ImageHint::Photo),
            "graph" => Ok(ImageHint::Graph),
            _ => Err(Error::InvalidConfig(format!("unknown image hint: {}", s))),
        }
    }
}

impl fmt::Display for ImageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// WebP encoder configuration.
///
/// The native `WebPConfig` is derived on the first call to
/// [`materialize`](EncodeConfig::materialize) and cached. Builder calls made
/// afterwards still update the accessors, but the cached native
/// configuration, and therefore every later encode, keeps the values it
/// was first materialized with. Build the config completely before the
/// first encode.
///
/// # Example
///
/// ```rust
/// use webpx_bridge::{EncodeConfig, ImageHint};
///
/// let config = EncodeConfig::new()
///     .lossless(true)
///     .method(0)
///     .quality(100.0)
///     .hint(ImageHint::Graph);
///
/// let native = config.materialize()?;
/// assert_eq!(native.lossless, 1);
/// # Ok::<(), webpx_bridge::Error>(())
/// ```
#[derive(Clone)]
pub struct EncodeConfig {
    lossless: bool,
    method: u8,
    quality: f32,
    hint: ImageHint,
    preset: Preset,
    native: OnceLock<libwebp_sys::WebPConfig>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            lossless: false,
            method: 4,
            quality: 75.0,
            hint: ImageHint::Default,
            preset: Preset::Photo,
            native: OnceLock::new(),
        }
    }
}

impl fmt::Debug for EncodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeConfig")
            .field("lossless", &self.lossless)
            .field("method", &self.method)
            .field("quality", &self.quality)
            .field("hint", &self.hint)
            .field("preset", &self.preset)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

impl EncodeConfig {
    /// Create a configuration with default settings.
    ///
    /// Default: lossy, quality 75, method 4, photo preset, default hint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lossless configuration.
    #[must_use]
    pub fn new_lossless() -> Self {
        Self::default().lossless(true)
    }

    /// Enable or disable lossless compression.
    #[must_use]
    pub fn lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    /// Set quality/speed tradeoff (0 = fast, 6 = slower but better).
    #[must_use]
    pub fn method(mut self, method: u8) -> Self {
        self.method = method.min(6);
        self
    }

    /// Set encoding quality (0.0 = smallest, 100.0 = best).
    ///
    /// For lossy: controls size/quality tradeoff.
    /// For lossless: controls compression effort (100 = maximum compression).
    #[must_use]
    pub fn quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 100.0);
        self
    }

    /// Set the content hint.
    #[must_use]
    pub fn hint(mut self, hint: ImageHint) -> Self {
        self.hint = hint;
        self
    }

    /// Set the preset used to seed libwebp's parameters.
    #[must_use]
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Check if lossless mode is enabled.
    #[must_use]
    pub fn is_lossless(&self) -> bool {
        self.lossless
    }

    /// Get the method (quality/speed tradeoff).
    #[must_use]
    pub fn get_method(&self) -> u8 {
        self.method
    }

    /// Get the quality setting.
    #[must_use]
    pub fn get_quality(&self) -> f32 {
        self.quality
    }

    /// Get the content hint.
    #[must_use]
    pub fn get_hint(&self) -> ImageHint {
        self.hint
    }

    /// Get the preset.
    #[must_use]
    pub fn get_preset(&self) -> Preset {
        self.preset
    }

    /// Whether the native configuration has been derived already.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.native.get().is_some()
    }

    /// The native configuration, derived once and cached.
    ///
    /// A failed derivation caches nothing.
    pub fn materialize(&self) -> Result<&libwebp_sys::WebPConfig> {
        if let Some(config) = self.native.get() {
            return Ok(config);
        }
        let config = self.to_libwebp()?;
        Ok(self.native.get_or_init(|| config))
    }

    fn to_libwebp(&self) -> Result<libwebp_sys::WebPConfig> {
        let mut config =
            libwebp_sys::WebPConfig::new_with_preset(self.preset.to_libwebp(), self.quality)
                .map_err(|_| Error::ConfigFailed(0))?;

        config.lossless = self.lossless as c_int;
        config.quality = self.quality;
        config.method = self.method as c_int;
        config.image_hint = self.hint.to_libwebp();

        if unsafe { libwebp_sys::WebPValidateConfig(&config) } == 0 {
            return Err(Error::InvalidConfig("config validation failed".into()));
        }

        tracing::debug!(
            lossless = self.lossless,
            method = self.method,
            quality = self.quality,
            hint = self.hint.name(),
            "materialized encoder config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_applies_fields() {
        let config = EncodeConfig::new()
            .lossless(true)
            .method(0)
            .quality(100.0)
            .hint(ImageHint::Graph);

        let native = config.materialize().unwrap();
        assert_eq!(native.lossless, 1);
        assert_eq!(native.method, 0);
        assert_eq!(native.quality, 100.0);
        assert_eq!(native.image_hint as i32, 3);
    }

    #[test]
    fn test_materialize_is_memoized() {
        let config = EncodeConfig::new().quality(40.0).method(2);
        assert!(!config.is_materialized());

        let first_quality = config.materialize().unwrap().quality;

        // later builder calls do not reach the cached native config
        let config = config.quality(90.0).method(6).lossless(true);
        assert!(config.is_materialized());
        assert_eq!(config.get_quality(), 90.0);

        let second = config.materialize().unwrap();
        assert_eq!(second.quality, first_quality);
        assert_eq!(second.quality, 40.0);
        assert_eq!(second.method, 2);
        assert_eq!(second.lossless, 0);

        let again: *const libwebp_sys::WebPConfig = config.materialize().unwrap();
        assert!(core::ptr::eq(second, again));
    }

    #[test]
    fn test_rejected_config_is_not_cached() {
        // the builder clamps method, so go around it
        let mut config = EncodeConfig::new();
        config.method = 9;

        assert!(matches!(
            config.materialize(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(!config.is_materialized());

        config.method = 3;
        assert_eq!(config.materialize().unwrap().method, 3);
        assert!(config.is_materialized());
    }

    #[test]
    fn test_builder_clamps() {
        let config = EncodeConfig::new().method(9).quality(250.0);
        assert_eq!(config.get_method(), 6);
        assert_eq!(config.get_quality(), 100.0);

        let config = EncodeConfig::new().quality(-3.0);
        assert_eq!(config.get_quality(), 0.0);
    }

    #[test]
    fn test_every_preset_materializes() {
        for preset in [
            Preset::Default,
            Preset::Picture,
            Preset::Photo,
            Preset::Drawing,
            Preset::Icon,
            Preset::Text,
        ] {
            let config = EncodeConfig::new().preset(preset);
            assert!(config.materialize().is_ok(), "preset {:?}", preset);
        }
    }

    #[test]
    fn test_hint_parsing() {
        assert_eq!("Photo".parse::<ImageHint>().unwrap(), ImageHint::Photo);
        assert_eq!("GRAPH".parse::<ImageHint>().unwrap(), ImageHint::Graph);
        assert!("sketch".parse::<ImageHint>().is_err());
        assert_eq!(ImageHint::from_name("sketch"), ImageHint::Default);
        assert_eq!(ImageHint::from_name("picture"), ImageHint::Picture);
        assert_eq!(ImageHint::Graph.to_string(), "graph");
    }

    #[test]
    fn test_debug_shows_materialization() {
        let config = EncodeConfig::new_lossless();
        assert!(format!("{:?}", config).contains("materialized: false"));
        config.materialize().unwrap();
        assert!(format!("{:?}", config).contains("materialized: true"));
    }
}
