//! Environment configuration and the fixed generation policy.

use std::env;
use std::time::Duration;

use generation_provider::SamplingParams;

/// Maximum prompt length, counted in Unicode scalar values.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Prefix wrapped around the user's prompt to form the user instruction.
pub const USER_INSTRUCTION_PREFIX: &str = "Create a React component: ";

/// Instruction template sent with the system role on every generation.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert React developer. Generate ONLY the React component code based on the user's description.

CRITICAL RULES:
1. Return ONLY valid React/TypeScript code - no explanations, no markdown, no comments outside the code
2. Use functional components with TypeScript
3. Include proper TypeScript types and interfaces
4. Use Tailwind CSS for styling (utility classes only)
5. Make components interactive and production-ready
6. Include proper imports (React, useState, useEffect, etc.)
7. Export the component as default
8. Start directly with imports - no preamble

Example format:
import React, { useState } from 'react';

interface ComponentProps {
  // props here
}

export default function ComponentName({ }: ComponentProps) {
  // component code
  return (
    <div className="...">
      {/* JSX here */}
    </div>
  );
}"#;

/// Model identity plus sampling parameters used for every generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub model: &'static str,
    pub sampling: SamplingParams,
}

impl GenerationParams {
    pub const DEFAULT: Self = Self {
        model: "llama-3.1-8b",
        sampling: SamplingParams {
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: 65_536,
        },
    };
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which generation provider a server instance talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mock,
    CompletionApi,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "completion-api" | "completion_api" | "cerebras" => Some(Self::CompletionApi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::CompletionApi => "completion-api",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout: Option<Duration>,
    pub bind_addr: String,
    pub log: LogConfig,
}

/// Log filter and output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_LOG_FILTER: &str = "info";

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_string_opt("FORGE_PROVIDER")
                .and_then(|value| ProviderKind::parse(&value))
                .unwrap_or(ProviderKind::CompletionApi),
            api_key: env_string_opt("CEREBRAS_API_KEY"),
            base_url: env_string_opt("FORGE_BASE_URL"),
            model: env_string_opt("FORGE_MODEL")
                .unwrap_or_else(|| GenerationParams::DEFAULT.model.to_string()),
            timeout: env_positive_u64("FORGE_TIMEOUT_SEC").map(Duration::from_secs),
            bind_addr: env_string_opt("FORGE_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            log: LogConfig {
                filter: env_string_opt("FORGE_LOG")
                    .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
                json: env_flag("FORGE_LOG_JSON"),
            },
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

fn env_positive_u64(key: &str) -> Option<u64> {
    env_string_opt(key)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}
