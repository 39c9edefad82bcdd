use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::DateTime;
use tracing::debug;

use crate::cli::{usage, Command};
use crate::codec::{decode_data_url_to_file, read_image_file, save_image_file, DataUrl};
use crate::config::OUTFIT_OPTIONS;
use crate::controller::{AppController, ControllerError, GENERATION_FAILED_MESSAGE};
use crate::history::HistoryRecord;
use crate::llm::ImageGenerator;

pub async fn run_command<G: ImageGenerator, W: Write>(
    command: Command,
    app: &mut AppController<G>,
    download_file_name: &str,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Generate { image, age, outfit } => {
            let file = read_image_file(&image).await?;
            app.upload(file)?;
            app.set_age(age)?;
            app.set_outfit(outfit)?;
            submit(app, out).await
        }
        Command::Regenerate { id, age, outfit } => {
            let record = require_record(app, id)?.clone();
            if let Err(err) = app.edit_record(&record) {
                debug!("Edit of record {} failed: {}", id, err);
                return Err(anyhow!(user_message(app, &err)));
            }
            if let Some(age) = age {
                app.set_age(age)?;
            }
            if let Some(outfit) = outfit {
                app.set_outfit(outfit)?;
            }
            submit(app, out).await
        }
        Command::List => list(app.history(), out),
        Command::View { id, original } => {
            let record = require_record(app, id)?;
            let image_url = if original {
                record.original_image.clone()
            } else {
                record.generated_image.clone()
            };
            let record = record.clone();
            app.view_record(image_url);
            let shown = describe_view(&record, app.viewing().unwrap_or_default(), original, out);
            app.close_view();
            shown
        }
        Command::Download { id, dir } => {
            let record = require_record(app, id)?;
            download(record, &dir, download_file_name, out).await
        }
        Command::Delete { id } => {
            if app.delete_record(id) {
                writeln!(out, "Deleted record {id}.")?;
            } else {
                writeln!(out, "No record with id {id}; nothing deleted.")?;
            }
            Ok(())
        }
        Command::Outfits => {
            for outfit in OUTFIT_OPTIONS {
                writeln!(out, "{outfit}")?;
            }
            Ok(())
        }
        Command::Help => {
            writeln!(out, "{}", usage())?;
            Ok(())
        }
    }
}

fn require_record<G: ImageGenerator>(app: &AppController<G>, id: i64) -> Result<&HistoryRecord> {
    app.find_record(id)
        .ok_or_else(|| anyhow!("No record with id {id}"))
}

fn user_message<G: ImageGenerator>(app: &AppController<G>, err: &ControllerError) -> String {
    app.error_message()
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.to_string())
}

async fn submit<G: ImageGenerator, W: Write>(app: &mut AppController<G>, out: &mut W) -> Result<()> {
    match app.submit().await {
        Ok(record) => {
            writeln!(out, "Created record {}.", record.id)?;
            writeln!(out, "  age:    {}", display_field(&record.age))?;
            writeln!(out, "  outfit: {}", display_field(&record.outfit))?;
            writeln!(
                out,
                "Use `download --id {}` to save the photo.",
                record.id
            )?;
            Ok(())
        }
        Err(ControllerError::Generation(err)) => {
            debug!("Generation failure cause: {}", err);
            let message = app.error_message().unwrap_or(GENERATION_FAILED_MESSAGE);
            Err(anyhow!(message.to_string()))
        }
        Err(err) => Err(anyhow!(user_message(app, &err))),
    }
}

fn display_field(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn created_at(id: i64) -> String {
    DateTime::from_timestamp_millis(id)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn list<W: Write>(history: &[HistoryRecord], out: &mut W) -> Result<()> {
    if history.is_empty() {
        writeln!(out, "No photos yet.")?;
        return Ok(());
    }
    for record in history {
        writeln!(
            out,
            "{}  {}  age={}  outfit={}",
            record.id,
            created_at(record.id),
            display_field(&record.age),
            display_field(&record.outfit)
        )?;
    }
    Ok(())
}

fn describe_view<W: Write>(
    record: &HistoryRecord,
    image_url: &str,
    original: bool,
    out: &mut W,
) -> Result<()> {
    let parsed = DataUrl::parse(image_url)?;
    let bytes = parsed.decode_payload()?;
    writeln!(out, "Record {} ({})", record.id, created_at(record.id))?;
    writeln!(
        out,
        "  image:  {} {}, {} bytes",
        if original { "original" } else { "generated" },
        parsed.mime_type,
        bytes.len()
    )?;
    writeln!(out, "  age:    {}", display_field(&record.age))?;
    writeln!(out, "  outfit: {}", display_field(&record.outfit))?;
    Ok(())
}

async fn download<W: Write>(
    record: &HistoryRecord,
    dir: &Path,
    file_name: &str,
    out: &mut W,
) -> Result<()> {
    let file = decode_data_url_to_file(&record.generated_image, file_name)?;
    let path = save_image_file(&file, dir, file_name).await?;
    writeln!(out, "Saved {}", path.display())?;
    Ok(())
}
