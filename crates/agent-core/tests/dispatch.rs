//! End-to-end dispatch scenarios against a scripted provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agent_core::testing::ScriptedProvider;
use agent_core::{
    AgentBuilder, AgentSession, ChatClient, Conversation, Credentials, LocalTransport, ParamType, ParameterSchema,
    Reply, SessionState, ToolCall, ToolError, ToolRegistry, ToolSchema, ToolSpec, Turn,
};

fn weather_registry() -> ToolRegistry {
    let schema = ToolSchema::new("get_weather", "Get the current weather for a city")
        .param(ParameterSchema::required("city", ParamType::String, "City name"));
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec::from_fn(schema, |args| {
            match args.str("city")?.to_lowercase().as_str() {
                "madrid" => Ok("22°C, sunny".into()),
                "london" => Ok("15°C, cloudy".into()),
                other => Err(ToolError::Execution(format!("no weather data for {other}"))),
            }
        }))
        .unwrap();
    registry
}

fn last_tool_output(history: &[Turn]) -> String {
    history
        .iter()
        .rev()
        .find_map(|turn| match turn {
            Turn::ToolResult(result) => Some(result.output().to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn weather_question_uses_the_tool_result() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tools(vec![ToolCall::new("get_weather").arg("city", "Madrid")])
            .then_respond(|history| Reply::Final(format!("It's {} in Madrid.", last_tool_output(history)))),
    );
    let agent = AgentBuilder::new()
        .provider(provider.clone())
        .tools(Arc::new(weather_registry()))
        .build()
        .unwrap();

    let mut history = Conversation::new();
    let answer = agent
        .handle_message(&mut history, "What's the weather in Madrid?")
        .await
        .unwrap();

    assert_eq!(answer, "It's 22°C, sunny in Madrid.");
    assert_eq!(provider.calls(), 2);
    assert_eq!(provider.offered_tools()[0], vec!["get_weather"]);

    let turns = history.turns();
    assert_eq!(turns.len(), 4);
    assert!(matches!(turns[0], Turn::User(_)));
    assert!(matches!(&turns[1], Turn::ToolCall(call) if call.name == "get_weather"));
    assert!(matches!(&turns[2], Turn::ToolResult(result) if result.output() == "22°C, sunny"));
    assert_eq!(turns[3].text(), Some("It's 22°C, sunny in Madrid."));
}

#[tokio::test]
async fn unavailable_city_is_reported_back_to_the_model() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tools(vec![ToolCall::new("get_weather").arg("city", "Atlantis")])
            .then_respond(|history| Reply::Final(format!("Sorry: {}", last_tool_output(history)))),
    );
    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(Arc::new(weather_registry()))
        .build()
        .unwrap();

    let mut history = Conversation::new();
    let answer = agent.handle_message(&mut history, "Weather in Atlantis?").await.unwrap();

    assert_eq!(answer, "Sorry: no weather data for atlantis");
    assert!(matches!(&history.turns()[2], Turn::ToolResult(result) if !result.is_success()));
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_tool() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();
    let schema = ToolSchema::new("get_weather", "Get the current weather for a city")
        .param(ParameterSchema::required("city", ParamType::String, "City name"));
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec::from_fn(schema, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("unreachable".into())
        }))
        .unwrap();

    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tools(vec![ToolCall::new("get_weather").arg("city", 42)])
            .then_respond(|history| Reply::Final(last_tool_output(history))),
    );
    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(Arc::new(registry))
        .build()
        .unwrap();

    let answer = agent.ask("Weather in 42?").await.unwrap();

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(answer.contains("city"), "{answer}");
}

#[tokio::test]
async fn session_answers_a_chat_client_over_the_transport() {
    let transport = Arc::new(LocalTransport::new());
    let agent_creds = Credentials::new("tool_assistant@localhost", "agent-pw");
    let user_creds = Credentials::new("user@localhost", "user-pw");
    transport.register_account(&agent_creds);
    transport.register_account(&user_creds);

    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tools(vec![ToolCall::new("get_weather").arg("city", "London")])
            .then_respond(|history| Reply::Final(format!("London: {}", last_tool_output(history)))),
    );
    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(Arc::new(weather_registry()))
        .build()
        .unwrap();

    let mut session = AgentSession::new(agent_creds, Arc::new(agent), transport.clone()).with_peer("user@localhost");
    let mut client = ChatClient::new(user_creds, "tool_assistant@localhost", transport.clone());
    session.start().await.unwrap();
    client.start().await.unwrap();

    let reply = client.send_and_wait("How is London?").await.unwrap();
    assert_eq!(reply, "London: 15°C, cloudy");

    let history = session.history("user@localhost").await.unwrap();
    assert_eq!(history.len(), 4);

    client.stop().await;
    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!transport.is_connected("tool_assistant@localhost"));
}
