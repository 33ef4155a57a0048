//! Immutable engine configuration.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::Error;
use crate::types::DocUri;

/// How link paths should be written when tooling generates them.
/// Downstream features (completion, rename) consume this; the engine
/// carries it as part of the immutable configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionStyle {
    /// Match whatever style the document already uses.
    #[default]
    Auto,
    /// Always write the markdown extension.
    IncludeExtension,
    /// Always omit the markdown extension.
    RemoveExtension,
}

/// Raw settings as an embedder provides them, e.g. deserialized from
/// editor configuration. Validated into an [`EngineConfig`].
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigSettings {
    /// Glob patterns for paths whose link targets are never validated.
    pub excluded_globs: Vec<String>,
    /// Non-markdown file extensions the engine will existence-check.
    pub linked_file_extensions: Vec<String>,
    /// Recognized markdown extensions, first entry is the default used
    /// when inferring an omitted extension.
    pub markdown_extensions: Vec<String>,
    /// Preferred path style for generated links.
    pub preferred_extension_style: ExtensionStyle,
}

impl Default for ConfigSettings {
    /// Markdown-only defaults with the common image extensions linked.
    fn default() -> Self {
        return Self {
            excluded_globs: Vec::new(),
            linked_file_extensions: ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"]
                .iter()
                .map(|e| return (*e).to_string())
                .collect(),
            markdown_extensions: vec!["md".to_string()],
            preferred_extension_style: ExtensionStyle::Auto,
        };
    }
}

/// Validated, immutable configuration. Constructed once at engine setup;
/// the glob set is compiled here so per-link checks stay allocation-free.
#[derive(Debug)]
pub struct EngineConfig {
    excluded: GlobSet,
    linked_file_extensions: Vec<String>,
    markdown_extensions: Vec<String>,
    preferred_extension_style: ExtensionStyle,
}

impl EngineConfig {
    /// Compile raw settings into a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGlob` when an excluded-path pattern does not
    /// compile; a pattern the embedder wrote is never silently dropped.
    pub fn new(settings: ConfigSettings) -> Result<Self, Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &settings.excluded_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                return Error::InvalidGlob {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                };
            })?;
            builder.add(glob);
        }
        let excluded = builder.build().map_err(|e| {
            return Error::InvalidGlob {
                pattern: settings.excluded_globs.join(", "),
                reason: e.to_string(),
            };
        })?;

        let mut markdown_extensions = settings.markdown_extensions;
        if markdown_extensions.is_empty() {
            markdown_extensions.push("md".to_string());
        }

        return Ok(Self {
            excluded,
            linked_file_extensions: settings.linked_file_extensions,
            markdown_extensions,
            preferred_extension_style: settings.preferred_extension_style,
        });
    }

    /// The extension used when an extension-less link cannot be confirmed
    /// against any document on disk.
    pub fn default_markdown_extension(&self) -> &str {
        return self.markdown_extensions.first().map_or("md", |e| return e.as_str());
    }

    /// Whether link targets under this path are exempt from validation.
    pub fn is_excluded(&self, uri: &DocUri) -> bool {
        return self.excluded.is_match(uri.as_str());
    }

    /// Whether the extension names a linked-to (non-markdown) file kind
    /// the engine should existence-check.
    pub fn is_linked_file_extension(&self, ext: &str) -> bool {
        return self.linked_file_extensions.iter().any(|e| return e.eq_ignore_ascii_case(ext));
    }

    /// Whether the extension names a markdown document.
    pub fn is_markdown_extension(&self, ext: &str) -> bool {
        return self.markdown_extensions.iter().any(|e| return e.eq_ignore_ascii_case(ext));
    }

    /// Recognized markdown extensions in configured order.
    pub fn markdown_extensions(&self) -> &[String] {
        return &self.markdown_extensions;
    }

    /// Preferred path style for generated links.
    pub fn preferred_extension_style(&self) -> ExtensionStyle {
        return self.preferred_extension_style;
    }
}

impl Default for EngineConfig {
    /// Compile the default settings; infallible because the defaults
    /// contain no glob patterns.
    fn default() -> Self {
        return Self::new(ConfigSettings::default()).unwrap_or_else(|_| {
            return Self {
                excluded: GlobSet::empty(),
                linked_file_extensions: Vec::new(),
                markdown_extensions: vec!["md".to_string()],
                preferred_extension_style: ExtensionStyle::Auto,
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::types::DocUri;

    use super::{ConfigSettings, EngineConfig, ExtensionStyle};

    #[test]
    fn settings_deserialize_from_editor_json() {
        let settings: ConfigSettings = serde_json::from_str(
            r#"{
                "excludedGlobs": ["vendor/**"],
                "markdownExtensions": ["md", "markdown"],
                "preferredExtensionStyle": "removeExtension"
            }"#,
        )
        .expect("valid settings");
        assert_eq!(settings.markdown_extensions, vec!["md", "markdown"]);
        assert_eq!(settings.preferred_extension_style, ExtensionStyle::RemoveExtension);
    }

    #[test]
    fn excluded_globs_match_normalized_uris() {
        let config = EngineConfig::new(ConfigSettings {
            excluded_globs: vec!["vendor/**".to_string(), "**/generated.md".to_string()],
            ..ConfigSettings::default()
        })
        .expect("valid globs");
        assert!(config.is_excluded(&DocUri::new("vendor/dep/readme.md")));
        assert!(config.is_excluded(&DocUri::new("docs/generated.md")));
        assert!(!config.is_excluded(&DocUri::new("docs/guide.md")));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let result = EngineConfig::new(ConfigSettings {
            excluded_globs: vec!["ven[dor/**".to_string()],
            ..ConfigSettings::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn empty_markdown_extensions_fall_back_to_md() {
        let config = EngineConfig::new(ConfigSettings {
            markdown_extensions: Vec::new(),
            ..ConfigSettings::default()
        })
        .expect("valid settings");
        assert_eq!(config.default_markdown_extension(), "md");
    }
}
