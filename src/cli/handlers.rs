//! CLI command handlers
//!
//! Each handler builds the pipeline from a transcript file and the loaded
//! config, runs one request and prints the outcome.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::commands::Commands;
use crate::cli::output::*;
use crate::llm::LlmClient;
use crate::models::ChatId;
use crate::rag::AskRequest;
use crate::rag::CommandType;
use crate::rag::ContextMode;
use crate::rag::RagService;
use crate::store::TranscriptStore;
use crate::AppConfig;
use crate::ChatRagError;
use crate::Result;

/// Dispatch a parsed command
///
/// # Errors
/// Whatever the selected handler returns.
pub async fn run_command(command: Commands, config: &AppConfig, verbose: bool) -> Result<()> {
    match command {
        Commands::Ask {
            question,
            transcript,
            participant,
            lookback_days,
            memory,
            direct,
            no_context,
            json,
        } => {
            let mut request = AskRequest::new(0, question);
            if let Some(participant) = participant {
                request = request.with_participant(participant);
            }
            if let Some(days) = lookback_days {
                request = request.with_lookback_days(days);
            }
            if let Some(memory) = memory {
                request = request.with_memory_context(memory);
            }
            if direct {
                request = request.with_command(CommandType::DirectSearch);
            }
            if no_context {
                request = request.with_context_mode(ContextMode::NoContext);
            }
            handle_ask_command(config, &transcript, request, json, verbose).await
        }
        Commands::Search {
            query,
            transcript,
            participant,
            lookback_days,
            limit,
        } => {
            let mut request = AskRequest::new(0, query);
            if let Some(participant) = participant {
                request = request.with_participant(participant);
            }
            if let Some(days) = lookback_days {
                request = request.with_lookback_days(days);
            }
            handle_search_command(config, &transcript, request, limit).await
        }
        Commands::Config => handle_config_command(config),
    }
}

fn build_service(config: &AppConfig, transcript_path: &Path) -> Result<(RagService, ChatId)> {
    let transcript = Arc::new(TranscriptStore::from_file(transcript_path)?);
    info!(
        "Loaded {} messages for chat {} from {}",
        transcript.len(),
        transcript.chat_id(),
        transcript_path.display()
    );
    let chat_id = transcript.chat_id();
    let llm = Arc::new(LlmClient::new(config)?);
    let service = RagService::new(config, transcript.clone(), transcript, llm);
    Ok((service, chat_id))
}

/// Handle ask command
///
/// Ctrl-C cancels the in-flight request.
///
/// # Errors
/// - Transcript load errors
/// - Pipeline errors
pub async fn handle_ask_command(
    config: &AppConfig,
    transcript_path: &Path,
    mut request: AskRequest,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let (service, chat_id) = build_service(config, transcript_path)?;
    request.chat_id = chat_id;

    if !json {
        print_info(&format!("🤖 Question: \"{}\"", request.question));
    }

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = service.ask_with_cancellation(request, &cancel).await;
    watcher.abort();

    let response = match result {
        Ok(response) => response,
        Err(ChatRagError::Cancelled) => {
            print_warning("Cancelled");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_answer(&response, verbose);
    }
    Ok(())
}

/// Handle search command
///
/// # Errors
/// - Transcript load errors
/// - Index errors
pub async fn handle_search_command(
    config: &AppConfig,
    transcript_path: &Path,
    mut request: AskRequest,
    limit: usize,
) -> Result<()> {
    let (service, chat_id) = build_service(config, transcript_path)?;
    request.chat_id = chat_id;

    print_search_header(&request.question, request.participant.as_deref());
    let response = service.search(&request).await?;
    print_search_results(&response, limit);
    Ok(())
}

/// Handle config command
pub fn handle_config_command(config: &AppConfig) -> Result<()> {
    print_config(config);
    Ok(())
}
