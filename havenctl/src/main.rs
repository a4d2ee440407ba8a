mod modules {
    pub mod client;
    pub mod admin;
    pub mod cases;
    pub mod group;
    pub mod inbox;
    pub mod incidents;
    pub mod payments;
    pub mod sessions;
}

use clap::{Args, Parser, Subcommand};

use haven::auth::Role;
use haven::model::DetectionSource;
use haven::payment::PaymentRef;

use modules::client::ApiClient;
use modules::inbox::Inbox;
use modules::sessions::parse_when;

#[derive(Parser)]
#[command(name = "havenctl", version, about = "Command line client for the Haven case lifecycle server")]
struct Cli {
    /// Server base URL
    #[arg(long, env = "HAVEN_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Bearer token (see `havenctl token`)
    #[arg(long, env = "HAVEN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the server is up
    Health,
    /// Mint a bearer token with the bootstrap key
    Token {
        #[arg(long, env = "HAVEN_BOOTSTRAP_KEY", hide_env_values = true)]
        bootstrap_key: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        role: Role,
    },
    #[command(subcommand)]
    Incident(IncidentCommand),
    #[command(subcommand)]
    Case(CaseCommand),
    #[command(subcommand)]
    Session(SessionCommand),
    #[command(subcommand)]
    Pay(PayCommand),
    #[command(subcommand)]
    Alerts(AlertCommand),
    #[command(subcommand)]
    Group(GroupCommand),
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand)]
enum IncidentCommand {
    /// Report a detection
    Report {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        phrase: String,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long, default_value = "text")]
        source: DetectionSource,
    },
    /// Show the risk queue, most urgent first
    Queue {
        /// Include incidents that were already escalated
        #[arg(long)]
        all: bool,
    },
    Escalate { incident_id: String },
}

#[derive(Subcommand)]
enum CaseCommand {
    Open { incident_id: String },
    List,
    Close { case_id: String },
}

#[derive(Args)]
struct SessionFields {
    #[arg(long)]
    topic: String,
    /// Unix seconds, RFC 3339, or "YYYY-MM-DD HH:MM" (UTC)
    #[arg(long, value_parser = parse_when)]
    at: i64,
    /// Zoom join link
    #[arg(long)]
    link: String,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum SessionCommand {
    List { case_id: String },
    Create {
        case_id: String,
        #[command(flatten)]
        fields: SessionFields,
    },
    Update {
        session_id: String,
        #[command(flatten)]
        fields: SessionFields,
    },
    Delete { session_id: String },
    Complete { session_id: String },
    /// Send the guardian a payment reminder
    Remind { session_id: String },
    Progress {
        session_id: String,
        #[arg(long)]
        plan: i32,
        #[arg(long)]
        skills: i32,
        #[arg(long)]
        goals: i32,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PaymentTarget {
    /// Emergency payment record id
    #[arg(long)]
    emergency: Option<String>,
    #[arg(long)]
    session: Option<String>,
}

impl PaymentTarget {
    fn reference(self) -> Result<PaymentRef, Box<dyn std::error::Error>> {
        match (self.emergency, self.session) {
            (Some(id), None) => Ok(PaymentRef::Emergency(id)),
            (None, Some(id)) => Ok(PaymentRef::Session(id)),
            _ => Err("pass exactly one of --emergency or --session".into()),
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct StatusTarget {
    /// Incident whose emergency fee to check
    #[arg(long)]
    incident: Option<String>,
    #[arg(long)]
    session: Option<String>,
}

#[derive(Subcommand)]
enum PayCommand {
    Checkout {
        #[command(flatten)]
        target: PaymentTarget,
    },
    /// Whether an incident's emergency fee or a session fee is paid
    Status {
        #[command(flatten)]
        target: StatusTarget,
    },
    /// Post a signed "paid" notification
    Simulate {
        #[command(flatten)]
        target: PaymentTarget,
        #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },
}

#[derive(Subcommand)]
enum AlertCommand {
    List {
        #[arg(value_enum)]
        inbox: Inbox,
    },
    Read {
        #[arg(value_enum)]
        inbox: Inbox,
        alert_id: String,
    },
}

#[derive(Args)]
struct GroupFields {
    #[arg(long)]
    topic: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_when)]
    at: i64,
    #[arg(long)]
    link: String,
}

#[derive(Subcommand)]
enum GroupCommand {
    List,
    Create {
        #[command(flatten)]
        fields: GroupFields,
    },
    Update {
        session_id: String,
        #[command(flatten)]
        fields: GroupFields,
    },
    Delete { session_id: String },
    Complete { session_id: String },
    Attend {
        session_id: String,
        #[arg(long)]
        subject: String,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    Link {
        #[arg(long)]
        guardian: String,
        #[arg(long)]
        subject: String,
    },
    Overview,
    Audit {
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {

    let mut _guard = None;

    if std::env::var("SERVER_LOG").unwrap_or_default() == "true" {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            "./logs",
            "havenctl.log"
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::writer::MakeWriterExt::and(non_blocking, std::io::stderr))
            .with_target(false)
            .with_env_filter("info")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();

        _guard = Some(guard);
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter("info")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();
    }

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server, cli.token.clone())?;

    let output = match cli.command {
        Command::Health => client.get("health").await?,
        Command::Token { bootstrap_key, subject, role } => {
            modules::admin::issue_token(&client, &bootstrap_key, &subject, role).await?
        }
        Command::Incident(cmd) => match cmd {
            IncidentCommand::Report { subject, phrase, confidence, source } => {
                modules::incidents::report(&client, &subject, &phrase, confidence, source).await?
            }
            IncidentCommand::Queue { all } => modules::incidents::queue(&client, all).await?,
            IncidentCommand::Escalate { incident_id } => modules::incidents::escalate(&client, &incident_id).await?,
        },
        Command::Case(cmd) => match cmd {
            CaseCommand::Open { incident_id } => modules::cases::open(&client, &incident_id).await?,
            CaseCommand::List => modules::cases::list(&client).await?,
            CaseCommand::Close { case_id } => modules::cases::close(&client, &case_id).await?,
        },
        Command::Session(cmd) => match cmd {
            SessionCommand::List { case_id } => modules::sessions::list(&client, &case_id).await?,
            SessionCommand::Create { case_id, fields } => {
                let draft = modules::sessions::draft(&fields.topic, fields.at, &fields.link, fields.notes.as_deref());
                modules::sessions::create(&client, &case_id, &draft).await?
            }
            SessionCommand::Update { session_id, fields } => {
                let draft = modules::sessions::draft(&fields.topic, fields.at, &fields.link, fields.notes.as_deref());
                modules::sessions::update(&client, &session_id, &draft).await?
            }
            SessionCommand::Delete { session_id } => modules::sessions::delete(&client, &session_id).await?,
            SessionCommand::Complete { session_id } => modules::sessions::complete(&client, &session_id).await?,
            SessionCommand::Remind { session_id } => modules::sessions::remind(&client, &session_id).await?,
            SessionCommand::Progress { session_id, plan, skills, goals, notes } => {
                modules::sessions::progress(&client, &session_id, (plan, skills, goals), notes.as_deref()).await?
            }
        },
        Command::Pay(cmd) => match cmd {
            PayCommand::Checkout { target } => modules::payments::checkout(&client, &target.reference()?).await?,
            PayCommand::Status { target } => match (target.incident, target.session) {
                (Some(incident_id), None) => modules::payments::status(&client, &incident_id).await?,
                (None, Some(session_id)) => modules::payments::session_status(&client, &session_id).await?,
                _ => return Err("pass exactly one of --incident or --session".into()),
            },
            PayCommand::Simulate { target, secret } => {
                modules::payments::simulate_paid(&client, target.reference()?, &secret).await?
            }
        },
        Command::Alerts(cmd) => match cmd {
            AlertCommand::List { inbox } => modules::inbox::list(&client, inbox).await?,
            AlertCommand::Read { inbox, alert_id } => modules::inbox::mark_read(&client, inbox, &alert_id).await?,
        },
        Command::Group(cmd) => match cmd {
            GroupCommand::List => modules::group::list(&client).await?,
            GroupCommand::Create { fields } => {
                let draft = modules::group::draft(&fields.topic, fields.description.as_deref(), fields.at, &fields.link);
                modules::group::create(&client, &draft).await?
            }
            GroupCommand::Update { session_id, fields } => {
                let draft = modules::group::draft(&fields.topic, fields.description.as_deref(), fields.at, &fields.link);
                modules::group::update(&client, &session_id, &draft).await?
            }
            GroupCommand::Delete { session_id } => modules::group::delete(&client, &session_id).await?,
            GroupCommand::Complete { session_id } => modules::group::complete(&client, &session_id).await?,
            GroupCommand::Attend { session_id, subject } => {
                modules::group::attend(&client, &session_id, &subject).await?
            }
        },
        Command::Admin(cmd) => match cmd {
            AdminCommand::Link { guardian, subject } => {
                modules::admin::link_guardian(&client, &guardian, &subject).await?
            }
            AdminCommand::Overview => modules::admin::overview(&client).await?,
            AdminCommand::Audit { event_type, limit } => {
                modules::admin::audit(&client, event_type.as_deref(), limit).await?
            }
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
