//! `docintake extract`: one image, one kind, no session.

use std::path::Path;

use anyhow::{bail, Context, Result};
use docintake_core::{DocumentKind, RawImage};
use docintake_media::{detect_mime_type, ImageValidator};
use docintake_understanding::{get_instance, loader_from_config, EngineSettings, ExtractionAdapter};
use serde_json::Value;

use crate::config;
use crate::terminal_output::{note_error, note_success, render_fields};

pub async fn run(raw: &Value, kind: DocumentKind, path: &Path, json: bool) -> Result<()> {
    let config = config::prepare(raw)?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let image = RawImage::new(data, detect_mime_type(path));

    let outcome = ImageValidator::from_config(&config.image()).validate(&image);
    if !outcome.is_accepted() {
        note_error(&format!("{}: {outcome}", path.display()));
        bail!("image rejected");
    }

    let inference = config.inference();
    let loader = loader_from_config(&inference)?;
    let engine = get_instance(loader.as_ref(), EngineSettings::from_config(&inference)).await?;
    let adapter = ExtractionAdapter::from_config(kind, &config.prompts());
    let result = adapter.extract(&engine, image).await;
    engine.release_resources().await?;
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.success {
        note_success(&format!("{} extracted from {}", kind.label(), path.display()));
        print!("{}", render_fields(&result.fields));
    } else {
        print!("{}", render_fields(&adapter.format_result(&result.raw_text)));
    }

    match result.failure {
        Some(failure) => {
            note_error(&format!("{}: {failure}", kind.label()));
            bail!("extraction failed")
        }
        None => Ok(()),
    }
}
