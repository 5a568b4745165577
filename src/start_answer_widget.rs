//! Startup helpers for driving the conversation store from a terminal.
//!
//! Each stdin line becomes an action:
//! - `+` / `-`: positive / negative feedback
//! - `none`: none of the offered refinements helped
//! - `forum [messageId]`: forum redirect
//! - `top`, `alt`: top questions, alternative questions
//! - `#<messageId>`: pick a response option
//! - `?<messageId>`: preview the refinements of a cached answer
//! - `=<messageId>`: make a cached answer current
//! - anything else: ask a typed question

use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::conversation::{
    Action, AskQuestion, Broadcast, ConversationStore, ReferrerKind, WidgetConfig,
};

/// Run an interactive session against the configured endpoints.
///
/// # Returns
/// `ExitCode::SUCCESS` once stdin is exhausted, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting answer widget v{}", env!("CARGO_PKG_VERSION"));

    let config = WidgetConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }
    info!("Conversation endpoint: {}", config.conversation_url);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(session(config)) {
        error!("Session error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Start a conversation and feed stdin commands to the store until EOF.
///
/// # Errors
/// Returns an error if the store cannot be created or stdin cannot be read.
pub async fn session(config: WidgetConfig) -> anyhow::Result<()> {
    let store = ConversationStore::from_config(config)?;

    let mut subscription = store.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(broadcast) = subscription.recv().await {
            log_broadcast(&broadcast);
        }
    });

    let (actions, listener) = store.listen();
    actions.send(Action::ConversationStart)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(action) = parse_command(&line) {
            actions.send(action)?;
        }
    }

    // Queued actions and their network work finish before subscribers are dropped.
    drop(actions);
    listener.await?;
    store.shutdown();
    printer.await?;
    Ok(())
}

/// Map a terminal line to an action. Blank lines map to nothing.
#[must_use]
pub fn parse_command(line: &str) -> Option<Action> {
    let line = line.trim();
    let action = match line {
        "" => return None,
        "+" => Action::PositiveFeedbackGiven,
        "-" => Action::NegativeFeedbackGiven,
        "none" => Action::NoneOfTheAboveClicked,
        "top" => Action::GetTopQuestions,
        "alt" => Action::GetAlternativeQuestions,
        "forum" => Action::ForumButtonPressed(None),
        _ => parse_message_command(line),
    };
    Some(action)
}

fn parse_message_command(line: &str) -> Action {
    if let Some(id) = line.strip_prefix("forum ") {
        return Action::ForumButtonPressed(Some(id.trim().to_string()));
    }

    let mut chars = line.chars();
    match (chars.next(), chars.as_str()) {
        (Some('#'), id) => {
            let pick = AskQuestion::by_id(id).with_referrer(ReferrerKind::Refinement);
            Action::AskQuestion(pick)
        }
        (Some('?'), id) => Action::UpdateRefinementQuestions(id.to_string()),
        (Some('='), id) => Action::SetCurrentQuestion(id.to_string()),
        _ => Action::AskQuestion(AskQuestion::typed(line)),
    }
}

fn log_broadcast(broadcast: &Broadcast) {
    match broadcast {
        Broadcast::AnswerReceived(conversation) => {
            info!(message_id = %conversation.message_id, "{}", conversation.message);
        }
        Broadcast::AlternativeQuestion(conversation)
        | Broadcast::UpdateRefinementQuestions(conversation) => {
            for option in &conversation.responses {
                log_suggestion(broadcast, &option.message_id, &option.message);
            }
        }
        Broadcast::TopQuestions(questions) => {
            for question in questions {
                log_suggestion(broadcast, &question.message_id, &question.message);
            }
        }
        Broadcast::ServerError(err) => warn!("Server error: {err}"),
        other => info!(broadcast = other.name()),
    }
}

fn log_suggestion(broadcast: &Broadcast, message_id: &str, message: &str) {
    info!(broadcast = broadcast.name(), "  #{message_id} {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feedback_commands() {
        assert_eq!(parse_command("+"), Some(Action::PositiveFeedbackGiven));
        assert_eq!(parse_command(" - "), Some(Action::NegativeFeedbackGiven));
        assert_eq!(parse_command("none"), Some(Action::NoneOfTheAboveClicked));
        assert_eq!(
            parse_command("forum"),
            Some(Action::ForumButtonPressed(None))
        );
        assert_eq!(
            parse_command("forum m3"),
            Some(Action::ForumButtonPressed(Some("m3".to_string())))
        );
    }

    #[test]
    fn test_parse_message_commands() {
        let pick = AskQuestion::by_id("m2").with_referrer(ReferrerKind::Refinement);
        assert_eq!(parse_command("#m2"), Some(Action::AskQuestion(pick)));
        assert_eq!(
            parse_command("?m2"),
            Some(Action::UpdateRefinementQuestions("m2".to_string()))
        );
        assert_eq!(
            parse_command("=m2"),
            Some(Action::SetCurrentQuestion("m2".to_string()))
        );
    }

    #[test]
    fn test_parse_typed_question() {
        let question = AskQuestion::typed("how do I reset my password?");
        assert_eq!(
            parse_command("how do I reset my password?"),
            Some(Action::AskQuestion(question))
        );
        assert_eq!(parse_command("   "), None);
    }
}
