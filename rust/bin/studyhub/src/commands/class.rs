//! Class selection.

use anyhow::Result;

use studyhub::ClassUpdate;

use super::App;

pub fn list(app: &App) -> Result<()> {
    let current = app.hub.auth_state().class().map(str::to_string);
    for class in app.hub.class_catalog() {
        let marker = if current.as_deref() == Some(class.as_str()) { "*" } else { " " };
        println!("{} {}", marker, class);
    }
    if let Some(current) = current.filter(|c| !app.hub.class_catalog().contains(c)) {
        println!("* {}", current);
    }
    Ok(())
}

pub async fn set(app: &App, class: &str) -> Result<()> {
    match app
        .hub
        .set_class(class)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?
    {
        ClassUpdate::Persisted => println!("Class set to {}.", class.trim()),
        ClassUpdate::LocalOnly { reason } => {
            println!("Class set to {} for this run only ({}).", class.trim(), reason)
        }
    }
    Ok(())
}
