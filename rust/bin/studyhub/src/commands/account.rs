//! Account commands: register, login, logout, whoami, password reset.

use anyhow::Result;

use studyhub::SessionError;
use studyhub_auth::{Credentials, GoogleAccount, Registration};

use super::App;

fn fail(e: SessionError) -> anyhow::Error {
    anyhow::anyhow!("{}", e.user_message())
}

pub async fn register(app: &App, name: &str, email: &str, password: &str) -> Result<()> {
    let identity = app
        .hub
        .register(Registration {
            display_name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .map_err(fail)?;
    println!("Registered and signed in as {} <{}>.", identity.display_name, identity.email);
    Ok(())
}

pub async fn login(app: &App, email: &str, password: &str) -> Result<()> {
    let identity = app
        .hub
        .sign_in(Credentials::email_password(email, password))
        .await
        .map_err(fail)?;
    println!("Signed in as {} <{}>.", identity.display_name, identity.email);
    Ok(())
}

pub async fn login_google(app: &App, email: &str, name: &str, subject: Option<&str>) -> Result<()> {
    let identity = app
        .hub
        .sign_in(Credentials::Google(GoogleAccount {
            subject: subject.unwrap_or(email).to_string(),
            display_name: name.to_string(),
            email: email.to_string(),
            avatar_url: None,
        }))
        .await
        .map_err(fail)?;
    println!("Signed in with Google as {} <{}>.", identity.display_name, identity.email);
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    if app.hub.identity().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    app.hub.sign_out().await.map_err(fail)?;
    println!("Signed out.");
    Ok(())
}

pub fn whoami(app: &App, json: bool) -> Result<()> {
    let state = app.hub.auth_state();
    let Some(identity) = state.identity.as_ref().filter(|_| state.is_authenticated()) else {
        println!("Not signed in.");
        return Ok(());
    };
    if json {
        let out = serde_json::json!({
            "identity": identity,
            "profile": state.profile,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!("{} <{}>", identity.display_name, identity.email);
    println!("  uid:   {}", identity.id);
    println!("  class: {}", state.class().unwrap_or("(none)"));
    if state.profile.as_ref().is_some_and(|p| p.degraded) {
        println!("  (profile could not be loaded; changes stay local)");
    }
    Ok(())
}

pub async fn reset_password(app: &App, email: &str) -> Result<()> {
    app.hub.send_password_reset(email).await.map_err(fail)?;
    // No mail transport: show the code that would have been sent.
    if let Some(mail) = app.auth.outbox().last() {
        println!("Reset code for {}: {}", mail.email, mail.code);
    }
    println!("Run `studyhub confirm-reset <code>` to choose a new password.");
    Ok(())
}

pub async fn confirm_reset(app: &App, code: &str, password: &str) -> Result<()> {
    app.hub
        .confirm_password_reset(code, password)
        .await
        .map_err(fail)?;
    println!("Password changed. Sign in with `studyhub login`.");
    Ok(())
}
