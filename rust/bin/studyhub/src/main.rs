//! `studyhub`: the StudyHub command-line client.
//!
//! Sign in, pick a class, and share study materials with classmates.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::App;

/// StudyHub CLI tool.
#[derive(Parser, Debug)]
#[command(name = "studyhub", about = "StudyHub command-line client")]
struct Cli {
    /// Path to client config file (default: ~/.studyhub/config.toml).
    #[arg(long = "config", short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password; prefer the interactive prompt.
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with email and password, or with a Google account.
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Password; prefer the interactive prompt.
        #[arg(long)]
        password: Option<String>,
        /// Sign in with a Google account instead.
        #[arg(long)]
        google: bool,
        /// Display name of the Google account.
        #[arg(long, requires = "google")]
        name: Option<String>,
        /// Google account subject (default: the email).
        #[arg(long, requires = "google")]
        subject: Option<String>,
    },

    /// Sign out.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Request a password reset code.
    ResetPassword { email: String },

    /// Set a new password with a reset code.
    ConfirmReset {
        code: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Class selection.
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// Upload a file to the current class.
    Upload {
        path: PathBuf,
        /// Notes, Lab Manual, Book, Practical File or Notification.
        #[arg(long)]
        category: String,
        /// Name shown in the list (default: the file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// List materials of the current class.
    List {
        /// Category filter ("all" for every category).
        #[arg(long)]
        category: Option<String>,
        /// Search file names, uploaders and categories.
        #[arg(long, short = 'q')]
        query: Option<String>,
    },

    /// Follow the material list until interrupted.
    Watch {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, short = 'q')]
        query: Option<String>,
    },

    /// Save a material's file.
    Download {
        id: String,
        /// Output path (default: the material's name).
        #[arg(long = "out")]
        out: Option<PathBuf>,
    },

    /// Delete a material you uploaded.
    Delete {
        id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Change the category of a material you uploaded.
    Recategorize { id: String, category: String },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ClassAction {
    /// List selectable classes.
    List,
    /// Select your class.
    Set { class: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Commands::Version = cli.command {
        println!("studyhub cli v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli
        .config
        .unwrap_or_else(config::ClientConfig::default_path);
    let config = config::ClientConfig::load(&config_path)?;
    let json = cli.output == "json";

    let app = App::open(&config).await?;
    let result = run(&app, cli.command, json).await;
    app.close().await;
    result
}

async fn run(app: &App, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            let password = commands::password(password, "Choose a password: ")?;
            commands::account::register(app, &name, &email, &password).await
        }

        Commands::Login {
            email,
            password,
            google,
            name,
            subject,
        } => {
            let email = match email {
                Some(e) => e,
                None => commands::prompt("Email: ")?,
            };
            if google {
                let name = name.unwrap_or_else(|| {
                    email.split('@').next().unwrap_or_default().to_string()
                });
                commands::account::login_google(app, &email, &name, subject.as_deref()).await
            } else {
                let password = commands::password(password, "Password: ")?;
                commands::account::login(app, &email, &password).await
            }
        }

        Commands::Logout => commands::account::logout(app).await,

        Commands::Whoami => commands::account::whoami(app, json),

        Commands::ResetPassword { email } => commands::account::reset_password(app, &email).await,

        Commands::ConfirmReset { code, password } => {
            let password = commands::password(password, "New password: ")?;
            commands::account::confirm_reset(app, &code, &password).await
        }

        Commands::Class { action } => match action {
            ClassAction::List => commands::class::list(app),
            ClassAction::Set { class } => commands::class::set(app, &class).await,
        },

        Commands::Upload {
            path,
            category,
            name,
        } => commands::material::upload(app, &path, &category, name.as_deref()).await,

        Commands::List { category, query } => {
            commands::material::list(app, category.as_deref(), query.as_deref(), json).await
        }

        Commands::Watch { category, query } => {
            commands::material::watch(app, category.as_deref(), query.as_deref()).await
        }

        Commands::Download { id, out } => {
            commands::material::download(app, &id, out.as_deref()).await
        }

        Commands::Delete { id, yes } => commands::material::delete(app, &id, yes).await,

        Commands::Recategorize { id, category } => {
            commands::material::recategorize(app, &id, &category).await
        }

        Commands::Version => Ok(()),
    }
}
