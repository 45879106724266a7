//! Material commands: upload, list, watch, download, delete, recategorize.

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;

use studyhub::state::{FeedStatus, MaterialView, State};
use studyhub::{Category, CategoryFilter, Material, SelectedFile, UploadRequest};

use super::App;

fn category(s: &str) -> Result<Category> {
    s.parse().map_err(anyhow::Error::msg)
}

fn print_table(view: &MaterialView) {
    let class = view.class.as_deref().unwrap_or("-");
    match &view.status {
        FeedStatus::Error(msg) => {
            println!("[{}] {}", class, msg);
            return;
        }
        FeedStatus::Loading => {
            println!("[{}] loading...", class);
            return;
        }
        _ => {}
    }
    if view.items.is_empty() {
        println!("[{}] no materials ({} total)", class, view.total);
        return;
    }
    println!(
        "{:<32}  {:<28}  {:<14}  {:<16}  {}",
        "ID", "NAME", "CATEGORY", "UPLOADED BY", "DATE"
    );
    for m in &view.items {
        println!(
            "{:<32}  {:<28}  {:<14}  {:<16}  {}",
            m.id,
            m.file_name,
            m.category.label(),
            m.uploaded_by,
            m.upload_date.format("%Y-%m-%d %H:%M")
        );
    }
    println!("[{}] {} of {} shown", class, view.items.len(), view.total);
}

fn print_json(items: &[Material]) -> Result<()> {
    let rows: Vec<_> = items
        .iter()
        .map(|m| -> Result<serde_json::Value, serde_json::Error> {
            let mut value = serde_json::to_value(m)?;
            value["id"] = serde_json::Value::String(m.id.clone());
            Ok(value)
        })
        .collect::<Result<_, _>>()?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn apply_filter(app: &App, category: Option<&str>, query: Option<&str>) -> Result<()> {
    let filter = match category {
        Some(c) => c.parse::<CategoryFilter>().map_err(anyhow::Error::msg)?,
        None => CategoryFilter::All,
    };
    app.hub.set_category(filter);
    app.hub.set_query(query.unwrap_or_default());
    Ok(())
}

pub async fn upload(app: &App, path: &Path, category_name: &str, name: Option<&str>) -> Result<()> {
    let category = category(category_name)?;
    app.require_class().await?;
    let file = SelectedFile::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let handle = app
        .hub
        .upload(UploadRequest {
            file: Some(file),
            display_name: name.map(str::to_string),
            category: Some(category),
        })
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;

    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        loop {
            let percent = *progress.borrow_and_update();
            eprint!("\rUploading... {:>3}%", percent);
            let _ = std::io::stderr().flush();
            if progress.changed().await.is_err() {
                break;
            }
        }
    });

    let cancel = handle.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = handle.wait().await;
    interrupt.abort();
    let _ = reporter.await;
    eprintln!();

    let material = result.map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    println!("Uploaded {} as {} ({}).", material.file_name, material.id, material.class);
    Ok(())
}

pub async fn list(app: &App, category: Option<&str>, query: Option<&str>, json: bool) -> Result<()> {
    app.require_class().await?;
    apply_filter(app, category, query)?;
    let view = app.hub.view();
    if let FeedStatus::Error(msg) = &view.status {
        anyhow::bail!("{}", msg);
    }
    if json {
        return print_json(&view.items);
    }
    print_table(&view);
    Ok(())
}

/// Print the list every time it changes, until interrupted.
pub async fn watch(app: &App, category: Option<&str>, query: Option<&str>) -> Result<()> {
    app.require_class().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = app.hub.store().subscribe(MaterialView::PATH, move |_, value| {
        if let Some(view) = value.downcast::<MaterialView>() {
            let _ = tx.send(view);
        }
    });
    apply_filter(app, category, query)?;
    print_table(&app.hub.view());

    let mut last = app.hub.view();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            view = rx.recv() => {
                let Some(view) = view else { break };
                if view != last {
                    println!();
                    print_table(&view);
                    last = view;
                }
            }
        }
    }
    if let Some(id) = subscription {
        app.hub.store().unsubscribe(id);
    }
    Ok(())
}

pub async fn download(app: &App, id: &str, out: Option<&Path>) -> Result<()> {
    let material = app.material(id).await?;
    let bytes = app
        .hub
        .download(&material)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    let target = match out {
        Some(p) => p.to_path_buf(),
        None => Path::new(&material.file_name)
            .file_name()
            .map(Path::new)
            .unwrap_or(Path::new("download"))
            .to_path_buf(),
    };
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    println!("Saved {} bytes to {}.", bytes.len(), target.display());
    Ok(())
}

pub async fn delete(app: &App, id: &str, yes: bool) -> Result<()> {
    let material = app.material(id).await?;
    if !app.hub.can_modify(&material) {
        anyhow::bail!("You can only change files you uploaded.");
    }
    if !yes {
        let answer = super::prompt(&format!("Delete {}? [y/N]: ", material.file_name))?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }
    app.hub
        .delete(&material)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    println!("Deleted {}.", material.file_name);
    Ok(())
}

pub async fn recategorize(app: &App, id: &str, category_name: &str) -> Result<()> {
    let category = category(category_name)?;
    let material = app.material(id).await?;
    let updated = app
        .hub
        .edit_category(&material, category)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    println!("{} is now {}.", updated.file_name, updated.category);
    Ok(())
}
