//! services/client/src/bin/theses.rs

use clap::{Parser, Subcommand, ValueEnum};
use client_lib::{
    adapters::{FileTokenStore, HttpApiAdapter, TokioSleeper},
    config::Config,
    error::ClientError,
};
use reqwest::Url;
use std::process::ExitCode;
use std::sync::Arc;
use theses_core::{
    CheckoutApi, ClaimReview, ClaimType, ConfirmationParams, ConfirmationStatus, NewUser,
    PaymentConfirmation, ProfileUpdate, ReportType, SessionManager, UserRole,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

//=========================================================================================
// Command Line
//=========================================================================================

/// Command-line client for the theses catalogue.
#[derive(Parser, Debug)]
#[command(name = "theses", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "THESES_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account (does not log in).
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "THESES_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_enum, default_value = "visitor")]
        role: RoleArg,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        orcid: Option<String>,
    },
    /// Show the logged-in user's profile.
    Whoami,
    /// Forget the stored session.
    Logout,
    /// Change profile fields.
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        orcid: Option<String>,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        profile_picture: Option<String>,
    },
    /// Claim a thesis.
    Claim {
        thesis_id: String,
        #[arg(long = "type", value_enum, default_value = "ownership")]
        claim_type: ClaimArg,
        #[arg(long)]
        message: Option<String>,
    },
    /// Report a problem with a thesis.
    Report {
        thesis_id: String,
        #[arg(long = "type", value_enum)]
        report_type: ReportArg,
        #[arg(long)]
        description: String,
    },
    /// List the claims you submitted.
    MyClaims,
    /// Open a checkout for a paywalled thesis and print the payment URL.
    Checkout {
        thesis_id: String,
        #[arg(long)]
        origin_url: String,
    },
    /// Confirm a payment from the URL the processor redirected to.
    Confirm { return_url: String },
    /// List users (admin).
    Users {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// List thesis claims (admin).
    Claims {
        #[arg(long)]
        status: Option<String>,
    },
    /// Approve or reject a claim (admin).
    Review {
        claim_id: String,
        #[arg(value_enum)]
        action: ReviewArg,
    },
}

impl Command {
    /// Whether the restored token has to be validated before running.
    fn needs_profile(&self) -> bool {
        !matches!(
            self,
            Command::Logout
                | Command::Login { .. }
                | Command::Register { .. }
                | Command::Checkout { .. }
                | Command::Confirm { .. }
        )
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
    Visitor,
    Author,
    University,
    Admin,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Visitor => UserRole::Visitor,
            RoleArg::Author => UserRole::Author,
            RoleArg::University => UserRole::University,
            RoleArg::Admin => UserRole::Admin,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ClaimArg {
    Ownership,
    Correction,
    Supervisor,
}

impl From<ClaimArg> for ClaimType {
    fn from(claim: ClaimArg) -> Self {
        match claim {
            ClaimArg::Ownership => ClaimType::Ownership,
            ClaimArg::Correction => ClaimType::Correction,
            ClaimArg::Supervisor => ClaimType::Supervisor,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportArg {
    Copyright,
    MetadataError,
    InappropriateContent,
    Duplicate,
    Other,
}

impl From<ReportArg> for ReportType {
    fn from(report: ReportArg) -> Self {
        match report {
            ReportArg::Copyright => ReportType::Copyright,
            ReportArg::MetadataError => ReportType::MetadataError,
            ReportArg::InappropriateContent => ReportType::InappropriateContent,
            ReportArg::Duplicate => ReportType::Duplicate,
            ReportArg::Other => ReportType::Other,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReviewArg {
    Approve,
    Reject,
}

impl From<ReviewArg> for ClaimReview {
    fn from(action: ReviewArg) -> Self {
        match action {
            ReviewArg::Approve => ClaimReview::Approve,
            ReviewArg::Reject => ClaimReview::Reject,
        }
    }
}

//=========================================================================================
// Entry Point
//=========================================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Initialize Adapters ---
    let http = Arc::new(HttpApiAdapter::new(&config.api_url, config.http_timeout)?);
    let store = Arc::new(FileTokenStore::new(config.token_path.clone()));

    // --- 3. Restore the Session ---
    let session = SessionManager::restore(http.clone(), store).await;
    if command.needs_profile() {
        session.hydrate().await;
    }

    // --- 4. Dispatch ---
    match command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Logged in as {} ({})", user.name, user.role);
        }
        Command::Register {
            email,
            name,
            password,
            role,
            institution,
            country,
            orcid,
        } => {
            let new_user = NewUser {
                email,
                name,
                password,
                role: role.into(),
                institution,
                country,
                orcid,
            };
            let user = session.register(&new_user).await?;
            println!("Account created for {}. You can now log in.", user.email);
        }
        Command::Whoami => match session.user().await {
            Some(user) => print_json(&user)?,
            None => println!("Not logged in."),
        },
        Command::Logout => {
            session.logout().await;
            println!("Logged out.");
        }
        Command::UpdateProfile {
            name,
            orcid,
            institution,
            country,
            bio,
            website,
            profile_picture,
        } => {
            let update = ProfileUpdate {
                name,
                orcid,
                institution,
                country,
                bio,
                website,
                profile_picture,
            };
            if update.is_empty() {
                return Err(ClientError::Internal("no profile field to update".to_string()));
            }
            let user = session.update_profile(&update).await?;
            print_json(&user)?;
        }
        Command::Claim {
            thesis_id,
            claim_type,
            message,
        } => {
            let ack = session
                .claim_thesis(&thesis_id, claim_type.into(), message)
                .await?;
            println!("{}", ack.message);
        }
        Command::Report {
            thesis_id,
            report_type,
            description,
        } => {
            let ack = session
                .report_thesis(&thesis_id, report_type.into(), &description)
                .await?;
            println!("{}", ack.message);
        }
        Command::MyClaims => {
            for claim in session.my_claims().await? {
                println!("{}\t{}\t{}", claim.thesis_id, claim.claim_type, claim.status);
            }
        }
        Command::Checkout {
            thesis_id,
            origin_url,
        } => {
            let checkout = http.create_checkout(&thesis_id, &origin_url).await?;
            println!("{}", checkout.url);
        }
        Command::Confirm { return_url } => {
            confirm_payment(http, &config, &return_url).await?;
        }
        Command::Users { skip, limit } => {
            for user in session.list_users(skip, limit).await? {
                println!("{}\t{}\t{}\t{}", user.id, user.email, user.name, user.role);
            }
        }
        Command::Claims { status } => {
            for claim in session.list_claims(status.as_deref()).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    claim.id.unwrap_or_default(),
                    claim.thesis_id,
                    claim.user_id,
                    claim.status
                );
            }
        }
        Command::Review { claim_id, action } => {
            let ack = session.review_claim(&claim_id, action.into()).await?;
            println!("{}", ack.message);
        }
    }

    Ok(())
}

/// Runs the payment poller for the session named in `return_url`, printing each transition.
async fn confirm_payment(
    http: Arc<HttpApiAdapter>,
    config: &Config,
    return_url: &str,
) -> Result<(), ClientError> {
    let params = Url::parse(return_url)
        .ok()
        .and_then(|url| ConfirmationParams::from_pairs(url.query_pairs()));

    let mut confirmation =
        PaymentConfirmation::new(http, Arc::new(TokioSleeper), config.poller, params);
    println!("{}", confirmation.status().message());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut updates = confirmation.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = *updates.borrow_and_update();
            println!("{}", status.message());
        }
    });

    let outcome = confirmation.run(&cancel).await;
    drop(confirmation);
    printer
        .await
        .map_err(|e| ClientError::Internal(e.to_string()))?;

    match outcome.status {
        ConfirmationStatus::Success | ConfirmationStatus::Timeout => Ok(()),
        ConfirmationStatus::Checking => Err(ClientError::Internal(
            "payment confirmation interrupted".to_string(),
        )),
        other => Err(ClientError::Internal(format!(
            "payment confirmation ended in state '{}'",
            other
        ))),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ClientError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Internal(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("theses").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn local_commands_skip_profile_validation() {
        assert!(!parse(&["logout"]).needs_profile());
        assert!(!parse(&["login", "--email", "a@b.org", "--password", "pw"]).needs_profile());
        assert!(!parse(&["confirm", "https://x.org/?session_id=cs&thesis_id=t"]).needs_profile());
    }

    #[test]
    fn account_commands_validate_the_restored_token() {
        assert!(parse(&["whoami"]).needs_profile());
        assert!(parse(&["my-claims"]).needs_profile());
        assert!(parse(&["review", "c1", "approve"]).needs_profile());
    }
}
