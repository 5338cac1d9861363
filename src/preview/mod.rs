//! Projection of (possibly partial) generated text onto the sandbox's
//! virtual file set.

mod files;
mod render;
mod scan;

pub use files::{VirtualFile, VirtualFileSet, APP_PATH};
pub use render::{
    PreviewMode, RenderOptions, RenderPayload, SyntaxColors, Theme, ThemeColors, ThemeFont,
    DEPENDENCIES, TEMPLATE,
};
pub use scan::delimiters_balanced;

use crate::normalize::normalize_for_display;

/// Pure projection: display-safe normalization of `text` as the app entry,
/// or the placeholder when `text` is blank.
pub fn project(text: &str) -> VirtualFileSet {
    VirtualFileSet::with_app(normalize_for_display(text))
}

/// Stateful wrapper around [`project`] that only ever exposes structurally
/// loadable files.
#[derive(Debug)]
pub struct PreviewAdapter {
    files: VirtualFileSet,
    source: String,
    identity: u64,
    mode: PreviewMode,
}

impl Default for PreviewAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewAdapter {
    pub fn new() -> Self {
        Self {
            files: VirtualFileSet::placeholder(),
            source: String::new(),
            identity: 0,
            mode: PreviewMode::Live,
        }
    }

    /// Projects `text`. While the projection is not loadable (unclosed
    /// brackets, strings or comments mid-stream) the last good file set
    /// stays in place. Returns true when the exposed files changed.
    pub fn update(&mut self, text: &str) -> bool {
        self.apply(text, true)
    }

    /// Projects the final text of a finished generation. It always replaces
    /// the exposed files, balanced or not.
    pub fn update_final(&mut self, text: &str) -> bool {
        self.apply(text, false)
    }

    fn apply(&mut self, text: &str, gated: bool) -> bool {
        self.source.clear();
        self.source.push_str(text);

        let projected = project(text);
        if gated && !projected.is_placeholder() && !delimiters_balanced(projected.app()) {
            tracing::trace!(len = text.len(), "keeping previous preview; text not loadable yet");
            return false;
        }
        if projected == self.files {
            return false;
        }
        self.files = projected;
        true
    }

    /// Forces a full sandbox reload on the next render and returns the new
    /// identity token.
    pub fn refresh(&mut self) -> u64 {
        self.identity += 1;
        self.identity
    }

    /// Switches to static mode for good; the payload then carries the raw
    /// text instead of a live view.
    pub fn fall_back_to_static(&mut self) {
        if self.mode != PreviewMode::Static {
            tracing::info!("preview switched to static mode");
        }
        self.mode = PreviewMode::Static;
    }

    pub fn files(&self) -> &VirtualFileSet {
        &self.files
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn render_payload(&self) -> RenderPayload {
        RenderPayload {
            template: TEMPLATE,
            mode: self.mode,
            identity: self.identity,
            files: self.files.clone(),
            theme: Theme::default(),
            options: RenderOptions::default(),
            dependencies: render::dependencies(),
            static_code: match self.mode {
                PreviewMode::Static => Some(self.source.clone()),
                PreviewMode::Live => None,
            },
        }
    }
}
