use std::collections::BTreeMap;

use serde::Serialize;

use crate::normalize::PLACEHOLDER_COMPONENT;

/// Path of the one entry that holds the generated component.
pub const APP_PATH: &str = "/App.tsx";

const INDEX_PATH: &str = "/index.tsx";
const STYLES_PATH: &str = "/styles.css";
const TAILWIND_CONFIG_PATH: &str = "/tailwind.config.js";
const POSTCSS_CONFIG_PATH: &str = "/postcss.config.js";

const INDEX_TSX: &str = r#"import React, { StrictMode } from 'react';
import { createRoot } from 'react-dom/client';
import './styles.css';
import App from './App';

const root = createRoot(document.getElementById('root')!);
root.render(
  <StrictMode>
    <App />
  </StrictMode>
);"#;

const STYLES_CSS: &str = "@tailwind base;\n@tailwind components;\n@tailwind utilities;";

const TAILWIND_CONFIG: &str = r#"/** @type {import('tailwindcss').Config} */
module.exports = {
  content: [
    './*.{js,ts,jsx,tsx}',
    './components/*.{js,ts,jsx,tsx}',
  ],
  theme: {
    extend: {},
  },
  plugins: [],
}"#;

const POSTCSS_CONFIG: &str = r#"module.exports = {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualFile {
    pub code: String,
    /// Hidden from the sandbox's file tabs.
    pub hidden: bool,
}

/// Fixed-key file mapping handed to the rendering sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VirtualFileSet {
    files: BTreeMap<&'static str, VirtualFile>,
}

impl VirtualFileSet {
    /// The support files plus `app` as the component entry.
    pub fn with_app(app: impl Into<String>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            APP_PATH,
            VirtualFile {
                code: app.into(),
                hidden: false,
            },
        );
        for (path, code) in [
            (INDEX_PATH, INDEX_TSX),
            (STYLES_PATH, STYLES_CSS),
            (TAILWIND_CONFIG_PATH, TAILWIND_CONFIG),
            (POSTCSS_CONFIG_PATH, POSTCSS_CONFIG),
        ] {
            files.insert(
                path,
                VirtualFile {
                    code: code.to_string(),
                    hidden: true,
                },
            );
        }
        Self { files }
    }

    pub fn placeholder() -> Self {
        Self::with_app(PLACEHOLDER_COMPONENT)
    }

    pub fn app(&self) -> &str {
        self.files
            .get(APP_PATH)
            .map(|file| file.code.as_str())
            .unwrap_or(PLACEHOLDER_COMPONENT)
    }

    pub fn is_placeholder(&self) -> bool {
        self.app() == PLACEHOLDER_COMPONENT
    }

    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &VirtualFile)> + '_ {
        self.files.iter().map(|(path, file)| (*path, file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
