//! Toolstream CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use toolstream::cli::demo_tools::{confirmation_result, demo_registry};
use toolstream::cli::render::render_invocation;
use toolstream::cli::{init_tracing, ChatArgs, Cli, Commands};
use toolstream::config::ClientConfig;
use toolstream::conversation::{Conversation, TurnStatus};
use toolstream::orchestrator::{ConversationEvent, ConversationEventPayload, StepOrchestrator};
use toolstream::types::{Message, Role, StreamEvent};

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load(args.config.as_deref(), args.overrides())?;
    let transport = Arc::new(config.http_transport()?);
    let registry = Arc::new(demo_registry()?);

    let sink = Arc::new(|event: ConversationEvent| match &event.payload {
        ConversationEventPayload::EventApplied {
            event: StreamEvent::TextDelta { text },
        } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        ConversationEventPayload::ToolExecutionStarted {
            tool_name,
            tool_call_id,
            ..
        } => {
            eprintln!("\n> {tool_name} ({tool_call_id})");
        }
        ConversationEventPayload::ToolExecutionFinished {
            tool_name, is_error, ..
        } => {
            eprintln!("  {tool_name} {}", if *is_error { "failed" } else { "done" });
        }
        _ => {}
    });

    let orchestrator =
        StepOrchestrator::new(transport, registry, config.orchestrator_config()?).with_event_sink(sink);

    let mut conversation = Conversation::new();
    if let Some(system) = args.system {
        conversation.push_system_message(system)?;
    }
    conversation.push_user_message(args.prompt)?;

    let abort = conversation.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let mut outcome = orchestrator.run(&mut conversation).await?;
    while outcome.is_suspended() {
        let mut resumed = None;
        for pending in &outcome.pending {
            eprintln!("\n{}", render_invocation(pending));
            let answer = read_answer().await?;
            resumed = orchestrator
                .submit_result(&mut conversation, pending.tool_call_id(), confirmation_result(&answer))
                .await?;
        }
        match resumed {
            Some(next) => outcome = next,
            None => break,
        }
    }

    println!();
    let first_new = conversation
        .messages()
        .iter()
        .rposition(|message| message.role == Role::User)
        .unwrap_or(0);
    for message in &conversation.messages()[first_new..] {
        print_tool_parts(message);
    }
    match outcome.status {
        TurnStatus::StepLimitReached => eprintln!("stopped after {} step(s)", outcome.steps),
        TurnStatus::Interrupted => eprintln!("interrupted"),
        _ => {}
    }
    Ok(())
}

fn print_tool_parts(message: &Message) {
    for invocation in message.tool_invocations() {
        eprintln!("  {}", render_invocation(invocation));
    }
}

async fn read_answer() -> Result<String, std::io::Error> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .map_err(std::io::Error::other)?
}
