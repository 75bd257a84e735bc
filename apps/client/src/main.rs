use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use applicant_client::config::Config;
use applicant_client::models::{
    Applicant, ApplicantPatch, ApplicantStatus, ApplicationForm, Attachment, Credentials,
};
use applicant_client::{
    guard, ApplicantService, FileStorage, HttpTransport, Route, RouteHistory, SessionStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "applicant-client",
    about = "Submit applications and review applicants from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in as an HR user; tokens are kept in TOKEN_FILE
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// List all applicants (HR only)
    List,
    /// Show one applicant (HR only)
    Show { id: String },
    /// Change status, notes or rating of an applicant (HR only)
    Update(UpdateArgs),
    /// Submit a public application
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: String,
    /// beworben, geprueft, vorstellungsgespräch, eingestellt or abgelehnt
    #[arg(long)]
    status: Option<ApplicantStatus>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    rating: Option<i32>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    cover_letter: Option<String>,
    #[arg(long)]
    resume_url: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    /// Resume to upload (PDF, DOCX, ...)
    #[arg(long)]
    resume: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("applicant-client v{} against {}", env!("CARGO_PKG_VERSION"), config.api_url);

    let storage = Arc::new(FileStorage::new(&config.token_file));
    let store = Arc::new(SessionStore::new(storage));
    let transport = Arc::new(HttpTransport::new(config.api_url.clone())?);
    let navigator = Arc::new(RouteHistory::default());
    let service = ApplicantService::new(store.clone(), transport, navigator);

    match cli.command {
        Command::Login { username, password } => {
            let credentials = Credentials::new(username, password);
            if !service.login(&credentials).await {
                bail!(failure(&store));
            }
            println!("Signed in as {}.", credentials.username);
        }
        Command::Logout => {
            service.logout().await;
            println!("Signed out.");
        }
        Command::List => {
            enter(&store, Route::Dashboard)?;
            service.fetch_applicants().await;
            if let Some(message) = store.last_error() {
                bail!(message);
            }
            print_list(&store.applicants());
        }
        Command::Show { id } => {
            enter(&store, Route::Detail(id.clone()))?;
            service.fetch_applicant_by_id(&id).await;
            if let Some(message) = store.last_error() {
                bail!(message);
            }
            if let Some(applicant) = store.current_applicant() {
                print_detail(&applicant)?;
            }
        }
        Command::Update(args) => {
            enter(&store, Route::Detail(args.id.clone()))?;
            let patch = ApplicantPatch {
                status: args.status,
                hr_notes: args.notes,
                hr_rating: args.rating,
            };
            if patch.is_empty() {
                bail!("nothing to update; pass --status, --notes or --rating");
            }
            if !service.save_applicant(&args.id, &patch).await {
                bail!(failure(&store));
            }
            if let Some(applicant) = store.current_applicant() {
                print_detail(&applicant)?;
            } else {
                println!("Applicant {} updated.", args.id);
            }
        }
        Command::Apply(args) => {
            let form = application_form(args).await?;
            if !service.submit_application(&form).await {
                bail!(failure(&store));
            }
            if guard(Route::Success, &store) == Route::Success {
                println!("Thank you, your application has been received.");
            }
        }
    }

    Ok(())
}

/// Runs the navigation guard for a protected command.
fn enter(store: &SessionStore, target: Route) -> Result<()> {
    let landed = guard(target.clone(), store);
    if landed != target {
        info!(requested = %target, redirected = %landed, "navigation redirected");
        bail!("not signed in; run `applicant-client login` first");
    }
    Ok(())
}

fn failure(store: &SessionStore) -> String {
    store
        .last_error()
        .unwrap_or_else(|| "request failed".to_string())
}

async fn application_form(args: ApplyArgs) -> Result<ApplicationForm> {
    let resume_file = match &args.resume {
        Some(path) => Some(read_attachment(path).await?),
        None => None,
    };

    Ok(ApplicationForm {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        cover_letter: args.cover_letter,
        resume_url: args.resume_url,
        linkedin_profile: args.linkedin,
        resume_file,
    })
}

async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read resume {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("resume path has no file name")?;
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(Attachment::new(file_name, content_type, bytes))
}

fn print_list(applicants: &[Applicant]) {
    if applicants.is_empty() {
        println!("No applicants.");
        return;
    }
    for applicant in applicants {
        let status = match applicant.status() {
            Some(status) => status.label().to_string(),
            None => applicant.raw_status().unwrap_or("-").to_string(),
        };
        println!(
            "{:>6}  {:<28}  {:<32}  {}",
            applicant.id().unwrap_or_default(),
            applicant.full_name().unwrap_or_default(),
            applicant.email().unwrap_or("-"),
            status,
        );
    }
}

fn print_detail(applicant: &Applicant) -> Result<()> {
    let rendered = serde_json::to_string_pretty(applicant.fields())?;
    println!("{rendered}");
    Ok(())
}
