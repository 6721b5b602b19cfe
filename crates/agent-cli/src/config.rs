//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use vuln_tools::{DEFAULT_SYSTEM_PROMPT, ToolKind};

#[derive(Parser, Debug)]
#[command(name = "vlagentic")]
#[command(about = "Security assistant that answers over chat and calls tools when it needs facts", long_about = None)]
pub struct Cli {
    /// Model to request from the provider
    #[arg(long, env = "VLAGENTIC_MODEL", default_value = "qwen2.5:7b")]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434/v1")]
    pub base_url: String,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(long, env = "VLAGENTIC_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    /// Messaging server domain; identities are `<name>@<server>`
    #[arg(long, env = "VLAGENTIC_SERVER", default_value = "localhost")]
    pub server: String,

    /// Name of the tool-using agent identity
    #[arg(long, default_value = "tool_assistant")]
    pub agent_name: String,

    /// Name of the human chat identity
    #[arg(long, default_value = "user")]
    pub user_name: String,

    /// Read the system prompt from a file instead of using the built-in one
    #[arg(long)]
    pub system_prompt_file: Option<PathBuf>,

    /// Comma-separated tools to register (severity, cwe, cwe-lookup, weather, time, math)
    #[arg(long, value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Provider round-trips allowed per message
    #[arg(long, default_value_t = 8)]
    pub max_iterations: usize,

    #[arg(long, default_value_t = 120)]
    pub provider_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub tool_timeout_secs: u64,

    /// Describe the tools in the system prompt and accept fenced ```tool
    /// replies, for models without native tool calling
    #[arg(long, env = "VLAGENTIC_FENCED_TOOLS")]
    pub fenced_tools: bool,

    /// Classifier service URL; the offline keyword classifier is used when unset
    #[arg(long, env = "VLAGENTIC_CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Ask a single question, print the answer and exit
    #[arg(short, long, conflicts_with = "console")]
    pub message: Option<String>,

    /// Talk to the agent session directly on stdin/stdout, without the chat identity
    #[arg(long)]
    pub console: bool,
}

/// How the binary interacts with the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    OneShot(String),
    Console,
    Chat,
}

/// Everything the binary needs, validated
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub agent_address: String,
    pub user_address: String,
    pub system_prompt: String,
    pub tools: Vec<ToolKind>,
    pub max_iterations: usize,
    pub provider_timeout: Duration,
    pub tool_timeout: Duration,
    pub fenced_tools: bool,
    pub classifier_url: Option<String>,
    pub mode: Mode,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if !(0.0..=2.0).contains(&cli.temperature) {
            bail!("--temperature must be between 0.0 and 2.0, got {}", cli.temperature);
        }
        if cli.max_iterations == 0 {
            bail!("--max-iterations must be at least 1");
        }
        if cli.provider_timeout_secs == 0 || cli.tool_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }

        let system_prompt = match &cli.system_prompt_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading system prompt from {}", path.display()))?,
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        let tools = if cli.tools.is_empty() {
            ToolKind::ALL.to_vec()
        } else {
            cli.tools
                .iter()
                .filter(|name| !name.trim().is_empty())
                .map(|name| name.parse::<ToolKind>())
                .collect::<vuln_tools::Result<Vec<_>>>()
                .context("--tools")?
        };

        let mode = match (cli.message, cli.console) {
            (Some(message), _) => Mode::OneShot(message),
            (None, true) => Mode::Console,
            (None, false) => Mode::Chat,
        };

        Ok(Self {
            model: cli.model,
            base_url: cli.base_url,
            temperature: cli.temperature,
            agent_address: format!("{}@{}", cli.agent_name, cli.server),
            user_address: format!("{}@{}", cli.user_name, cli.server),
            system_prompt,
            tools,
            max_iterations: cli.max_iterations,
            provider_timeout: Duration::from_secs(cli.provider_timeout_secs),
            tool_timeout: Duration::from_secs(cli.tool_timeout_secs),
            fenced_tools: cli.fenced_tools,
            classifier_url: cli.classifier_url,
            mode,
        })
    }
}

/// Read a password from `env_var`, or prompt for it without echo.
pub fn password(prompt: &str, env_var: &str) -> Result<String> {
    if let Ok(secret) = std::env::var(env_var) {
        return Ok(secret);
    }
    dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .with_context(|| format!("reading {prompt}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<AppConfig> {
        let argv = std::iter::once("vlagentic").chain(args.iter().copied());
        AppConfig::from_cli(Cli::try_parse_from(argv)?)
    }

    #[test]
    fn identities_use_the_server_domain() {
        let config = config(&["--server", "chat.example.org"]).unwrap();
        assert_eq!(config.agent_address, "tool_assistant@chat.example.org");
        assert_eq!(config.user_address, "user@chat.example.org");
        assert_eq!(config.mode, Mode::Chat);
        assert_eq!(config.tools, ToolKind::ALL.to_vec());
        assert_eq!(config.max_iterations, 8);
        assert!(!config.fenced_tools);
    }

    #[test]
    fn tools_are_parsed_from_a_comma_list() {
        let config = config(&["--tools", "weather,math"]).unwrap();
        assert_eq!(config.tools, vec![ToolKind::Weather, ToolKind::Math]);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert!(config(&["--tools", "weather,stocks"]).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(config(&["--temperature", "3.5"]).is_err());
        assert!(config(&["--max-iterations", "0"]).is_err());
        assert!(config(&["--tool-timeout-secs", "0"]).is_err());
    }

    #[test]
    fn message_selects_one_shot_mode() {
        let config = config(&["-m", "What time is it?"]).unwrap();
        assert_eq!(config.mode, Mode::OneShot("What time is it?".into()));
        assert!(super::Cli::try_parse_from(["vlagentic", "-m", "hi", "--console"]).is_err());
    }
}
