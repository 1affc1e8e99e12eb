//! Interactive live-session chat command.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use calpal::config::Config;
use calpal::live::{CapturedImage, CompressionQuality, ImageFormat, LiveClient};

pub async fn run(config_path: &str, model_override: Option<&str>) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if let Some(model) = model_override {
        config.live.model = model.to_string();
    }

    if config.live.resolve_api_key().is_none() {
        bail!(
            "No API key configured. Set `live.api_key` in {config_path} or the GEMINI_API_KEY environment variable."
        );
    }

    let (client, mut events) = LiveClient::connect(config.live.clone())
        .await
        .context("failed to connect live session")?;

    // Log lifecycle transitions and surface tool calls in the background.
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = events.state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *events.state.borrow();
                    info!(%state, "Session state");
                }
                Some(call) = events.tool_calls.recv() => {
                    println!("[tool call] {}({})", call.name, call.arguments);
                }
            }
        }
    });

    println!(
        "Chat with {} (/image <path> [caption], /quit to exit)",
        config.live.model
    );
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(input) = lines.next_line().await? else {
            println!();
            break;
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/exit" || input == "/quit" {
            break;
        }

        let result = if let Some(rest) = input.strip_prefix("/image ") {
            send_image(&client, rest.trim()).await
        } else {
            client.send_text(input).await.map_err(anyhow::Error::from)
        };

        match result {
            Ok(response) => {
                println!();
                println!("{response}");
                println!();
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    let _ = client.close().await;
    Ok(())
}

/// Send `<path> [caption...]` as an image turn.
async fn send_image(client: &LiveClient, args: &str) -> Result<String> {
    let (path, caption) = match args.split_once(' ') {
        Some((path, caption)) => (path, Some(caption.trim().to_string())),
        None => (args, None),
    };
    if path.is_empty() {
        bail!("usage: /image <path> [caption]");
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {path}"))?;
    let format = if path.ends_with(".png") {
        ImageFormat::Png
    } else {
        ImageFormat::Jpeg
    };

    client
        .send_image(
            CapturedImage::from_bytes(bytes),
            caption,
            CompressionQuality::default(),
            format,
        )
        .await
        .map_err(anyhow::Error::from)
}
