//! Wires a client, the prebuilt tools, and the transport into a terminal
//! conversation.

use crate::ModelArgs;
use anyhow::{Context, Result};
use confab_llm::{
    handle_tool_calls, run_turn, Client, HandlerMap, Provider, ReqwestTransport, ToolChoice,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn parse_provider(raw: &str) -> Result<(Provider, &'static str)> {
    match raw {
        "openai" => Ok((Provider::OpenAi, "OPENAI_API_KEY")),
        "anthropic" => Ok((Provider::Anthropic, "ANTHROPIC_API_KEY")),
        "openrouter" => Ok((Provider::OpenRouter, "OPENROUTER_API_KEY")),
        url if url.starts_with("http://") || url.starts_with("https://") => Ok((
            Provider::OpenAiCompatible {
                url: url.to_string(),
            },
            "OPENAI_API_KEY",
        )),
        other => anyhow::bail!(
            "unknown provider {other:?}; expected openai, anthropic, openrouter, or a URL"
        ),
    }
}

fn resolve_api_key(args: &ModelArgs, provider: &Provider, env_var: &str) -> Result<String> {
    if let Some(key) = &args.api_key {
        return Ok(key.clone());
    }
    match std::env::var(env_var) {
        Ok(key) => Ok(key),
        // Local OpenAI-compatible servers commonly need no key.
        Err(_) if matches!(provider, Provider::OpenAiCompatible { .. }) => Ok(String::new()),
        Err(_) => anyhow::bail!("no api key: pass --api-key or set {env_var}"),
    }
}

fn build_session(args: &ModelArgs) -> Result<(Client, HandlerMap)> {
    let (provider, env_var) = parse_provider(&args.provider)?;
    let api_key = resolve_api_key(args, &provider, env_var)?;

    let mut client = Client::new(provider, api_key, &args.model)?;
    if let Some(max_tokens) = args.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }
    if let Some(system) = &args.system {
        client = client.with_system(system.clone());
    }

    let handlers = if args.no_tools {
        HandlerMap::new()
    } else {
        let root = match &args.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("cannot resolve current directory")?,
        };
        let (schemas, handlers) = confab_tools::standard_toolbox(&root)?.into_parts();
        client = client.with_tools(schemas);
        handlers
    };
    Ok((client, handlers))
}

async fn one_exchange(
    client: &mut Client,
    handlers: &HandlerMap,
    transport: &ReqwestTransport,
    budget: u32,
    prompt: &str,
) -> Result<String> {
    client.add_user(prompt, false);
    run_turn(client, transport, ToolChoice::Auto).await?;
    handle_tool_calls(client, handlers, transport, budget).await?;
    Ok(client
        .last_message()
        .map(|m| m.content.clone())
        .unwrap_or_default())
}

pub async fn ask(args: ModelArgs, prompt: &str) -> Result<()> {
    let (mut client, handlers) = build_session(&args)?;
    let transport = ReqwestTransport::new();
    let answer = one_exchange(&mut client, &handlers, &transport, args.budget, prompt).await?;
    println!("{answer}");
    Ok(())
}

pub async fn chat(args: ModelArgs) -> Result<()> {
    let (mut client, handlers) = build_session(&args)?;
    let transport = ReqwestTransport::new();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("confab: chatting with {} (/quit to exit)", client.model);

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt == "/quit" || prompt == "/exit" {
            break;
        }

        match one_exchange(&mut client, &handlers, &transport, args.budget, prompt).await {
            Ok(answer) => println!("assistant> {answer}"),
            Err(e) => {
                tracing::error!(error = %e, "exchange failed");
                println!("error> {e}");
            }
        }
    }
    Ok(())
}
