use serde_json::{Value, json};
use warden::application_impl::NavigationOutcome;
use warden::client::Client;
use warden::domain_model::*;
use warden::logger::*;
use warden::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let client = Client::try_new(&project_settings).await?;

    if let Some(token) = &cli.token {
        client.session.login(&Credential::new(token.as_str())).await?;
    }

    let report = match cli.command {
        Command::Login { token } => {
            let credential = Credential::new(token);
            client.session.login(&credential).await?;
            json!({ "logged_in": true, "expires_at": credential.expires_at() })
        }
        Command::Logout => {
            client.session.logout().await?;
            json!({ "logged_in": false })
        }
        Command::Status => {
            let credential = client.session.credential().await;
            let block = match client.blocks.state().await {
                BlockState::Clear => Value::Null,
                BlockState::Blocked(record) => serde_json::to_value(record)?,
            };
            json!({
                "logged_in": credential.is_some(),
                "expires_at": credential.as_ref().and_then(Credential::expires_at),
                "block": block,
            })
        }
        Command::Call {
            endpoint,
            method,
            params,
            body,
        } => {
            let method: Method = method.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let mut request = ApiRequest::new(method, endpoint);
            request.params = params;
            request.body = body
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()?;

            let outcome = client.pipeline.call::<Value>(request).await;
            outcome_json(outcome)
        }
        Command::Navigate { path } => {
            let (outcome, dispatch) = client.route_tracker.on_navigate(&path).await;
            dispatch.settled().await;
            json!({ "path": path, "blocked": outcome == NavigationOutcome::Blocked })
        }
        Command::Visit { page } => {
            let tracker = client.public_page(page.clone());
            let (outcome, dispatch) = tracker.on_mount().await;
            dispatch.settled().await;
            json!({ "page": page, "blocked": outcome == NavigationOutcome::Blocked })
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn outcome_json(outcome: RequestOutcome<Value>) -> Value {
    let kind = outcome.kind();
    match outcome {
        RequestOutcome::Success(payload) => json!({ "outcome": kind, "payload": payload }),
        RequestOutcome::AuthExpired => json!({ "outcome": kind }),
        RequestOutcome::RemoteError { status, message } => {
            json!({ "outcome": kind, "status": status, "message": message })
        }
        RequestOutcome::NetworkError { message } => json!({ "outcome": kind, "message": message }),
        RequestOutcome::Blocked(record) => json!({ "outcome": kind, "block": record }),
    }
}
