//! Serializable boundary object handed to the rendering sandbox.

use std::collections::BTreeMap;

use serde::Serialize;

use super::files::VirtualFileSet;

/// Sandbox template the virtual files are laid over.
pub const TEMPLATE: &str = "react-ts";

/// npm packages the sandbox installs next to the template's own.
pub const DEPENDENCIES: [(&str, &str); 4] = [
    ("autoprefixer", "latest"),
    ("lucide-react", "latest"),
    ("postcss", "latest"),
    ("tailwindcss", "latest"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Live, hot-reloading view.
    Live,
    /// Raw code shown as text when the live view cannot be used.
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub colors: ThemeColors,
    pub syntax: SyntaxColors,
    pub font: ThemeFont,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeColors {
    pub surface1: &'static str,
    pub surface2: &'static str,
    pub accent: &'static str,
    pub error: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxColors {
    pub plain: &'static str,
    pub keyword: &'static str,
    pub tag: &'static str,
    pub string: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeFont {
    pub body: &'static str,
    pub mono: &'static str,
    pub size: &'static str,
    pub line_height: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ThemeColors {
                surface1: "#ffffff",
                surface2: "#f8fafc",
                accent: "#f97316",
                error: "#ef4444",
            },
            syntax: SyntaxColors {
                plain: "#1e293b",
                keyword: "#7c3aed",
                tag: "#dc2626",
                string: "#059669",
            },
            font: ThemeFont {
                body: "Inter, sans-serif",
                mono: "Fira Code, monospace",
                size: "13px",
                line_height: "1.4",
            },
        }
    }
}

/// Sandbox behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub show_navigator: bool,
    pub show_tabs: bool,
    pub show_line_numbers: bool,
    pub show_console: bool,
    pub editor_height: &'static str,
    pub editor_width_percentage: u8,
    pub autorun: bool,
    pub auto_reload: bool,
    pub recompile_mode: &'static str,
    /// Debounce before a hot patch recompiles, in milliseconds.
    pub recompile_delay: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_navigator: false,
            show_tabs: false,
            show_line_numbers: false,
            show_console: false,
            editor_height: "100%",
            editor_width_percentage: 0,
            autorun: true,
            auto_reload: true,
            recompile_mode: "delayed",
            recompile_delay: 300,
        }
    }
}

/// Everything a front-end needs to (re)render the preview.
///
/// A new `identity` means the sandbox must be rebuilt from scratch; the same
/// identity with new files is a debounced hot patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub template: &'static str,
    pub mode: PreviewMode,
    pub identity: u64,
    pub files: VirtualFileSet,
    pub theme: Theme,
    pub options: RenderOptions,
    pub dependencies: BTreeMap<&'static str, &'static str>,
    /// Raw text shown in static mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_code: Option<String>,
}

pub(crate) fn dependencies() -> BTreeMap<&'static str, &'static str> {
    DEPENDENCIES.into_iter().collect()
}
