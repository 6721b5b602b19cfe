//! vlagentic
//!
//! Starts the tool-using agent identity and a chat identity for the human on
//! an in-process messaging server, then relays stdin lines to the agent until
//! `exit` or Ctrl-C. Both identities are stopped in reverse start order.

mod config;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, AgentBuilder, AgentSession, ChatClient, Credentials, LlmProvider, LocalTransport};
use agent_runtime::{OllamaConfig, OllamaProvider};
use vuln_tools::{HttpClassifier, KeywordClassifier, VulnClassifier};

use crate::config::{AppConfig, Cli, Mode};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_cli(Cli::parse())?;

    // Initialize LLM provider
    let provider = Arc::new(OllamaProvider::from_config(
        OllamaConfig::default()
            .with_base_url(&config.base_url)
            .with_timeout_secs(config.provider_timeout.as_secs()),
    )?);

    // Verify Ollama connection
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!(endpoint = %provider.base_url(), "Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::debug!(model = %model.id, "Model available");
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!(endpoint = %provider.base_url(), "Ollama not available - answers will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
            tracing::warn!("  and the model is pulled: ollama pull {}", config.model);
        }
    }

    let classifier: Arc<dyn VulnClassifier> = match &config.classifier_url {
        Some(url) => Arc::new(HttpClassifier::new(url.as_str(), config.tool_timeout)?),
        None => Arc::new(KeywordClassifier::new()),
    };
    if !classifier.health_check().await {
        tracing::warn!(classifier = classifier.name(), "Classifier not available - security tools will fail");
    }

    let tools = vuln_tools::build_registry(&config.tools, classifier)?;

    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(Arc::new(tools))
        .system_prompt(config.system_prompt.clone())
        .model(config.model.clone())
        .temperature(config.temperature)
        .max_iterations(config.max_iterations)
        .provider_timeout(config.provider_timeout)
        .tool_timeout(config.tool_timeout)
        .inject_tool_descriptions(config.fenced_tools)
        .build()?;
    let agent = Arc::new(agent);

    match &config.mode {
        Mode::OneShot(message) => {
            let answer = agent.ask(message).await?;
            println!("{answer}");
            Ok(())
        }
        Mode::Console => run_console(&config, agent).await,
        Mode::Chat => run_chat(&config, agent).await,
    }
}

async fn run_console(config: &AppConfig, agent: Arc<Agent>) -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let credentials = Credentials::new(
        &config.agent_address,
        config::password("LLM agent password", "VLAGENTIC_AGENT_PASSWORD")?,
    );
    transport.register_account(&credentials);

    let mut session = AgentSession::new(credentials, agent, transport);
    session.start().await.context("starting agent session")?;
    print_banner(config);

    let stdin = forward_lines(std::io::BufReader::new(std::io::stdin()));
    let outcome = tokio::select! {
        result = session.run_interactive(stdin, tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
            Ok(())
        }
    };

    session.stop().await;
    println!("Agent stopped.");
    outcome.map_err(Into::into)
}

async fn run_chat(config: &AppConfig, agent: Arc<Agent>) -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let agent_credentials = Credentials::new(
        &config.agent_address,
        config::password("LLM agent password", "VLAGENTIC_AGENT_PASSWORD")?,
    );
    let user_credentials = Credentials::new(
        &config.user_address,
        config::password("Chat agent password", "VLAGENTIC_USER_PASSWORD")?,
    );
    transport.register_account(&agent_credentials);
    transport.register_account(&user_credentials);

    let mut session = AgentSession::new(agent_credentials, agent, transport.clone()).with_peer(&config.user_address);
    let mut client = ChatClient::new(user_credentials, &config.agent_address, transport);

    let outcome = async {
        session.start().await.context("starting agent session")?;
        client.start().await.context("starting chat client")?;
        print_banner(config);

        let stdin = forward_lines(std::io::BufReader::new(std::io::stdin()));
        tokio::select! {
            result = client.run_interactive(stdin, display_response) => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
        }
        anyhow::Ok(())
    }
    .await;

    client.stop().await;
    session.stop().await;
    println!("Agents stopped.");
    outcome
}

const FORWARD_BUFFER: usize = 64 * 1024;

/// Feed lines from a blocking `source` through a detached thread.
///
/// `tokio::io::stdin` reads on the blocking pool, where a pending read keeps
/// the runtime from shutting down until Enter is pressed. A plain thread
/// does not hold up process exit.
fn forward_lines<R>(source: R) -> BufReader<DuplexStream>
where
    R: BufRead + Send + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(FORWARD_BUFFER);
    let runtime = tokio::runtime::Handle::current();

    std::thread::spawn(move || {
        for line in source.lines() {
            let Ok(mut line) = line else { break };
            line.push('\n');
            if runtime.block_on(writer.write_all(line.as_bytes())).is_err() {
                break;
            }
        }
    });

    BufReader::new(reader)
}

fn display_response(message: &str, _sender: &str) {
    println!("\n🤖 Tool Assistant: {message}");
    println!("{}", "-".repeat(50));
}

fn print_banner(config: &AppConfig) {
    println!("Tool assistant started as {}", config.agent_address);
    println!("Available tools:");
    for kind in &config.tools {
        println!("  - {kind}");
    }
    println!("\nTry:");
    println!("  What time is it?");
    println!("  Calculate 15 * 8 + 32");
    println!("  What's the weather in Madrid?");
    println!("  What's the severity of the vulnerability described by ...?");
    println!("  Recent vulnerabilities for CWE-119");
    println!("Type 'exit' to quit\n");
}
