use std::collections::HashMap;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ezd_inflow::config::{EzdConfig, MailboxConfig};
use ezd_inflow::ezd::EzdService;
use ezd_inflow::mailbox::{DEFAULT_FETCH_COUNT, ImapMailbox, MailboxProvider};
use ezd_inflow::models::{EmailMessage, RegistrationForm, RegistrationResult};

#[derive(Parser)]
#[command(name = "ezd-inflow", version, about = "Register inbound emails in EZD")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recent mailbox messages
    List {
        /// Number of most recent messages to fetch
        #[arg(long, default_value_t = DEFAULT_FETCH_COUNT)]
        count: usize,
    },
    /// Register messages as EZD inflow documents
    Register {
        /// Message UIDs as shown by `list`
        #[arg(required = true)]
        uids: Vec<String>,

        /// Number of most recent messages to search for the UIDs
        #[arg(long, default_value_t = DEFAULT_FETCH_COUNT)]
        count: usize,

        /// Override the document title (defaults to the subject)
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        remarks: Option<String>,

        #[arg(long)]
        delivery_method: Option<String>,

        /// Leave an attachment out of the count (repeatable)
        #[arg(long = "exclude-attachment", value_name = "NAME")]
        exclude_attachments: Vec<String>,

        /// Delete each message from the mailbox once registered
        #[arg(long)]
        delete: bool,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

/// Form overrides given on the command line.
struct Overrides {
    title: Option<String>,
    remarks: Option<String>,
    delivery_method: Option<String>,
    exclude_attachments: Vec<String>,
}

impl Overrides {
    fn apply(&self, form: &mut RegistrationForm) {
        if let Some(title) = &self.title {
            form.title = title.clone();
        }
        if let Some(remarks) = &self.remarks {
            form.remarks = remarks.clone();
        }
        if let Some(method) = &self.delivery_method {
            form.delivery_method = method.clone();
        }
        for name in &self.exclude_attachments {
            if form.set_attachment_selected(name, false) == 0 {
                warn!(uid = %form.email_unique_id, "No attachment named '{name}'");
            }
        }
    }
}

fn load_config() -> ezd_inflow::error::Result<(EzdConfig, MailboxConfig)> {
    Ok((EzdConfig::from_env()?, MailboxConfig::from_env()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let (ezd_config, mailbox_config) = load_config().context("loading configuration")?;
    let mailbox = ImapMailbox::new(mailbox_config);

    match cli.command {
        Command::List { count } => list(&mailbox, count).await,
        Command::Register {
            uids,
            count,
            title,
            remarks,
            delivery_method,
            exclude_attachments,
            delete,
            json,
        } => {
            if let Err(e) = ezd_config.validate() {
                warn!("{e}");
            }
            let overrides = Overrides {
                title,
                remarks,
                delivery_method,
                exclude_attachments,
            };
            let service = EzdService::new(ezd_config);
            let failures =
                register(&mailbox, &service, &uids, count, &overrides, delete, json).await?;
            if failures > 0 {
                anyhow::bail!("{failures} of {} registrations failed", uids.len());
            }
            Ok(())
        }
    }
}

async fn list(mailbox: &dyn MailboxProvider, count: usize) -> anyhow::Result<()> {
    let emails = mailbox
        .fetch_recent(count)
        .await
        .context("fetching messages")?;

    for email in &emails {
        println!(
            "{:>8}  {}  {:<32}  {} [{} att.]",
            email.unique_id,
            email.date.format("%Y-%m-%d %H:%M"),
            email.from_email,
            email.subject,
            email.attachments.len()
        );
    }
    info!("{} messages", emails.len());
    Ok(())
}

/// Register each requested UID; returns how many failed.
async fn register(
    mailbox: &dyn MailboxProvider,
    service: &EzdService,
    uids: &[String],
    count: usize,
    overrides: &Overrides,
    delete: bool,
    json: bool,
) -> anyhow::Result<usize> {
    let emails: HashMap<String, EmailMessage> = mailbox
        .fetch_recent(count)
        .await
        .context("fetching messages")?
        .into_iter()
        .map(|e| (e.unique_id.clone(), e))
        .collect();

    let mut failures = 0;
    for uid in uids {
        let result = match emails.get(uid) {
            Some(email) => {
                let mut form = RegistrationForm::from_email(email);
                overrides.apply(&mut form);
                service.register_inflow(email, &form).await
            }
            None => RegistrationResult::failure(format!(
                "Message {uid} not found among the {count} most recent"
            )),
        };

        report(uid, &result, json);

        if !result.is_success() {
            failures += 1;
            continue;
        }
        if delete {
            match mailbox.delete(uid).await {
                Ok(true) => info!(uid = %uid, "Source message deleted"),
                Ok(false) => warn!(uid = %uid, "Source message was not deleted"),
                Err(e) => warn!(uid = %uid, "Failed to delete source message: {e}"),
            }
        }
    }
    Ok(failures)
}

fn report(uid: &str, result: &RegistrationResult, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "uid": uid, "result": result }));
        return;
    }
    match result {
        RegistrationResult::Registered(reg) => println!("{uid}: registered as {}", reg.rpw_number),
        RegistrationResult::Failed { message } => println!("{uid}: FAILED: {message}"),
    }
}
