use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use component_forge::config::EnvConfig;
use component_forge::{logging, ErrorDisplay, PreviewAdapter, SessionStatus, StreamReassembler};
use forge_client::echo::FragmentEcho;
use forge_client::export::export;
use forge_client::{GenerationClient, DEFAULT_SERVER_URL};

/// Generate a React component from a description, streaming the code as it
/// is written.
#[derive(Debug, Parser)]
#[command(name = "forge", version)]
struct Cli {
    /// What the component should do.
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,
    /// Generation server base URL.
    #[arg(long, env = "FORGE_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,
    /// Directory to write the component, its sandbox files and render payload to.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Clear partial output when generation fails.
    #[arg(long)]
    discard_partial: bool,
    /// Record a static (non-live) preview in the render payload.
    #[arg(long = "static")]
    static_preview: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&EnvConfig::from_env().log);

    let client = Arc::new(GenerationClient::new(&cli.server)?);
    tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() && client.cancel() {
                tracing::info!("cancel requested");
            }
        }
    });

    let policy = if cli.discard_partial {
        ErrorDisplay::Discard
    } else {
        ErrorDisplay::KeepPartial
    };
    let mut reassembler = StreamReassembler::new().with_error_display(policy);
    let mut preview = PreviewAdapter::new();
    let mut echo = FragmentEcho::new(std::io::stdout());

    let status = client
        .generate(&cli.prompt.join(" "), &mut reassembler, |state| {
            if state.is_active() {
                echo.show(state.accumulated());
            }
            if state.status() == SessionStatus::Completed {
                preview.update_final(state.displayed());
            } else {
                preview.update(state.displayed());
            }
        })
        .await?;
    echo.finish();

    match status {
        SessionStatus::Completed => {
            eprintln!("Component generated");
            if let Some(dir) = &cli.out {
                if cli.static_preview {
                    preview.fall_back_to_static();
                }
                let written = export(dir, reassembler.displayed(), &preview)
                    .await
                    .with_context(|| format!("failed to export to {}", dir.display()))?;
                for path in written {
                    eprintln!("wrote {}", path.display());
                }
            }
            Ok(())
        }
        SessionStatus::Cancelled => {
            eprintln!("Generation cancelled");
            Ok(())
        }
        _ => bail!(reassembler
            .error()
            .unwrap_or("Generation failed")
            .to_string()),
    }
}
