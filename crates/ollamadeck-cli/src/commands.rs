//! Subcommands and their handlers.
//!
//! Handlers fire an operation on the service, then drain the event
//! channel until the event they are waiting for arrives. Unrelated
//! events (follow-up refreshes and the like) are skipped silently.

use anyhow::{Result, bail};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use ollamadeck_app::AppEvent;
use ollamadeck_core::{InstalledModel, ModelTag, PullOutcome, RemoteModel, RunningModel};

use crate::bootstrap::AppContext;

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// List installed models
    Models,
    /// Show currently loaded models
    Ps {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Browse the registry catalog, optionally filtered by name
    Search { filter: Option<String> },
    /// List the downloadable tags of one model family
    Tags { family: String },
    /// Download a model (`family` or `family:tag`)
    Pull { reference: String },
    /// Remove an installed model
    Rm { name: String },
    /// Unload a running model
    Stop { name: String },
    /// Show a model's details
    Show { name: String },
    /// Delete all cached registry data
    FlushCache,
}

pub async fn models(ctx: &mut AppContext) -> Result<()> {
    ctx.service.refresh_installed();
    loop {
        match next(ctx).await? {
            AppEvent::InstalledUpdated(models) => {
                if models.is_empty() {
                    println!("No models installed.");
                } else {
                    print!("{}", render_installed(&models));
                }
                return Ok(());
            }
            AppEvent::RefreshFailed {
                resource: "installed",
                message,
            } => bail!("failed to list models: {message}"),
            _ => {}
        }
    }
}

pub async fn ps(ctx: &mut AppContext, watch: bool) -> Result<()> {
    if watch {
        return ps_watch(ctx).await;
    }
    ctx.service.refresh_running();
    loop {
        match next(ctx).await? {
            AppEvent::RunningUpdated(models) => {
                print_running(&models);
                return Ok(());
            }
            AppEvent::RefreshFailed {
                resource: "running",
                message,
            } => bail!("failed to list running models: {message}"),
            _ => {}
        }
    }
}

async fn ps_watch(ctx: &mut AppContext) -> Result<()> {
    let shutdown = CancellationToken::new();
    ctx.service.spawn_ps_poller(shutdown.clone());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                shutdown.cancel();
                return Ok(());
            }
            event = ctx.events.recv() => match event {
                Some(AppEvent::RunningUpdated(models)) => print_running(&models),
                Some(_) => {}
                None => return Ok(()),
            },
        }
    }
}

pub async fn search(ctx: &mut AppContext, filter: Option<&str>) -> Result<()> {
    ctx.service.refresh_catalog();
    loop {
        if let AppEvent::CatalogUpdated(models) = next(ctx).await? {
            if models.is_empty() {
                println!("Registry catalog is empty or unavailable; try again later.");
                return Ok(());
            }
            let hits = ctx.service.search(filter.unwrap_or(""));
            if hits.is_empty() {
                println!("No models match the filter.");
            } else {
                print!("{}", render_catalog(&hits));
            }
            return Ok(());
        }
    }
}

pub async fn tags(ctx: &mut AppContext, family: &str) -> Result<()> {
    ctx.service.fetch_tags(family);
    loop {
        if let AppEvent::TagsFetched { family: f, tags } = next(ctx).await? {
            if f != family {
                continue;
            }
            if tags.is_empty() {
                println!("No tags found for '{family}'; unknown family or registry unavailable.");
            } else {
                print!("{}", render_tags(&tags));
            }
            return Ok(());
        }
    }
}

pub async fn pull(ctx: &mut AppContext, reference: &str) -> Result<()> {
    let tag = ctx.service.start_pull(reference).await?;
    println!("Pulling {tag} (ctrl-c to cancel)");

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                ctx.service.cancel_pull().await;
                bar.set_message("cancelling...");
            }
            event = ctx.events.recv() => match event {
                Some(AppEvent::PullProgress { line, percent, .. }) => {
                    if let Some(p) = percent {
                        bar.set_position(p.round() as u64);
                    }
                    bar.set_message(line);
                }
                Some(AppEvent::PullFinished { outcome, .. }) => {
                    bar.finish_and_clear();
                    return match outcome {
                        PullOutcome::Completed => {
                            println!("Pulled {tag}.");
                            Ok(())
                        }
                        PullOutcome::Failed { message } => bail!("pull failed: {message}"),
                        PullOutcome::Cancelled => {
                            println!("Pull cancelled.");
                            Ok(())
                        }
                    };
                }
                Some(_) => {}
                None => bail!("event stream closed"),
            },
        }
    }
}

pub async fn rm(ctx: &mut AppContext, name: &str) -> Result<()> {
    ctx.service.delete(name);
    loop {
        if let AppEvent::DeleteFinished {
            success, message, ..
        } = next(ctx).await?
        {
            if success {
                println!("{message}");
                return Ok(());
            }
            bail!("{message}");
        }
    }
}

pub async fn stop(ctx: &mut AppContext, name: &str) -> Result<()> {
    ctx.service.stop(name);
    loop {
        if let AppEvent::StopFinished {
            success, message, ..
        } = next(ctx).await?
        {
            if success {
                println!("{message}");
                return Ok(());
            }
            bail!("{message}");
        }
    }
}

pub async fn show(ctx: &AppContext, name: &str) -> Result<()> {
    println!("{}", ctx.service.show_details(name).await);
    Ok(())
}

pub fn flush_cache(ctx: &AppContext) {
    ctx.service.flush_cache();
    println!("Registry cache flushed.");
}

async fn next(ctx: &mut AppContext) -> Result<AppEvent> {
    match ctx.events.recv().await {
        Some(event) => Ok(event),
        None => bail!("event stream closed unexpectedly"),
    }
}

fn print_running(models: &[RunningModel]) {
    if models.is_empty() {
        println!("No models are currently loaded.");
    } else {
        print!("{}", render_running(models));
    }
}

// ── Table rendering ────────────────────────────────────────────────

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let render_row = |cells: &[String]| -> String {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            if i + 1 == cells.len() {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{cell:<width$}", width = widths[i]));
            }
        }
        line
    };

    let headers: Vec<String> = headers.iter().map(|h| (*h).to_string()).collect();
    out.push_str(&render_row(&headers));
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

fn render_installed(models: &[InstalledModel]) -> String {
    let rows: Vec<Vec<String>> = models
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                m.id.clone(),
                m.size.clone(),
                m.modified.clone(),
            ]
        })
        .collect();
    render_table(&["NAME", "ID", "SIZE", "MODIFIED"], &rows)
}

fn render_running(models: &[RunningModel]) -> String {
    let rows: Vec<Vec<String>> = models
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                m.id.clone(),
                m.size.clone(),
                m.processor.clone(),
                m.context.clone(),
                m.until.clone(),
            ]
        })
        .collect();
    render_table(
        &["NAME", "ID", "SIZE", "PROCESSOR", "CONTEXT", "UNTIL"],
        &rows,
    )
}

fn render_catalog(models: &[RemoteModel]) -> String {
    let rows: Vec<Vec<String>> = models
        .iter()
        .map(|m| vec![m.name.clone(), m.sizes.clone(), m.description.clone()])
        .collect();
    render_table(&["NAME", "SIZES", "DESCRIPTION"], &rows)
}

fn render_tags(tags: &[ModelTag]) -> String {
    let rows: Vec<Vec<String>> = tags
        .iter()
        .map(|t| {
            vec![
                t.tag.clone(),
                t.short_label().to_string(),
                t.size.clone(),
            ]
        })
        .collect();
    render_table(&["TAG", "LABEL", "SIZE"], &rows)
}
