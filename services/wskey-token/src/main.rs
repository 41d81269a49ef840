//! WSKey token tool
//!
//! Command-line front end for `wskey-auth`:
//! 1. Loads the key, institutions and server settings from TOML
//! 2. Prints a login URL, requests a token, or signs a request
//! 3. Writes results to stdout and JSON logs to stderr

mod config;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wskey_auth::{AccessToken, SignOptions, expiry};

use crate::config::Config;

const USAGE: &str = "usage: wskey-token [--config PATH] <login-url | client-credentials | auth-code CODE | sign METHOD URL>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    LoginUrl,
    ClientCredentials,
    AuthCode(String),
    Sign { method: String, url: String },
}

/// Split `--config PATH` from the command and its arguments.
fn parse_args(args: &[String]) -> Result<(Option<&str>, Command)> {
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config_path = Some(path.as_str());
        } else {
            positional.push(arg.as_str());
        }
    }

    let command = match positional.as_slice() {
        ["login-url"] => Command::LoginUrl,
        ["client-credentials"] => Command::ClientCredentials,
        ["auth-code", code] => Command::AuthCode((*code).to_string()),
        ["sign", method, url] => Command::Sign {
            method: method.to_uppercase(),
            url: (*url).to_string(),
        },
        _ => bail!(USAGE),
    };
    Ok((config_path, command))
}

/// What gets printed for an issued token.
fn token_summary(token: &AccessToken) -> serde_json::Value {
    json!({
        "grant_type": token.grant_type().as_str(),
        "access_token": token.token_string(),
        "token_type": token.token_type(),
        "expires_in": token.expires_in(),
        "expires_at": token.expires_at().map(|at| expiry::format_timestamp(&at)),
        "context_institution_id": token.context_institution_id(),
        "principal_id": token.user().map(|user| user.principal_id()),
        "principal_id_ns": token.user().map(|user| user.principal_id_ns()),
        "refresh_token": token.refresh_token().is_some(),
    })
}

async fn run(config: &Config, command: Command) -> Result<String> {
    let key = config.wskey().context("invalid [key] configuration")?;
    let institution = &config.institution;

    match command {
        Command::LoginUrl => Ok(key.login_url(
            &config.server,
            Some(institution.authenticating_id),
            Some(institution.context_id),
        )?),
        Command::Sign { method, url } => {
            let principal = config.principal();
            let options = SignOptions {
                principal: principal.as_ref(),
                ..SignOptions::default()
            };
            Ok(key.hmac_signature(&method, &url, &options)?)
        }
        Command::ClientCredentials => {
            let token = AccessToken::client_credentials(
                &config.server,
                institution.authenticating_id,
                institution.context_id,
                key.services().to_vec(),
            )?;
            issue(config, token, key).await
        }
        Command::AuthCode(code) => {
            let redirect_uri = key
                .redirect_uri()
                .context("key.redirect_uri is required for auth-code")?
                .to_owned();
            let token = AccessToken::authorization_code(
                &config.server,
                code,
                institution.authenticating_id,
                institution.context_id,
                redirect_uri,
            )?;
            issue(config, token, key).await
        }
    }
}

async fn issue(config: &Config, mut token: AccessToken, key: wskey_auth::WsKey) -> Result<String> {
    if let Some(log) = config.exchange_log().context("invalid [log] format")? {
        token = token.with_log(log);
    }
    token
        .create(key, config.principal())
        .await
        .with_context(|| format!("{} exchange failed", token.grant_type()))?;
    info!(grant_type = %token.grant_type(), "token issued");
    Ok(serde_json::to_string_pretty(&token_summary(&token))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cli_config_path, command) = parse_args(&args)?;

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        key = %config.key.id,
        authorization_server = %config.server.authorization_server,
        test_server = config.server.test_server,
        ?command,
        "configuration loaded"
    );

    let output = run(&config, command).await?;
    println!("{output}");
    Ok(())
}
