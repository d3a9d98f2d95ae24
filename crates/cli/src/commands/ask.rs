use std::sync::Arc;

use crate::commands::{current_thread_runtime, load_config, CommandResult};
use shopkeep_agent::{client_from_config, AgentRuntime, TurnContext, TurnOutcome};
use shopkeep_core::flows::TurnTermination;
use shopkeep_db::{
    connect_with_config, migrations, CatalogRepository, InMemoryCatalogRepository, SampleCatalog,
    SqlCatalogRepository,
};

/// Runs one turn end to end. A turn that ended in the apology exits 5 so
/// scripts can tell a broken model wiring from a real answer.
pub fn run(utterance: &str, in_memory: bool) -> CommandResult {
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let llm = match client_from_config(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure("ask", "runtime_init", error.to_string(), 3);
        }
    };

    let result = runtime.block_on(async {
        let catalog: Arc<dyn CatalogRepository> = if in_memory {
            let catalog: Arc<dyn CatalogRepository> = Arc::new(InMemoryCatalogRepository::default());
            SampleCatalog::load(catalog.as_ref())
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
            catalog
        } else {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;
            Arc::new(SqlCatalogRepository::new(pool))
        };

        let agent = AgentRuntime::new(llm, catalog);
        Ok::<TurnOutcome, (&'static str, String, u8)>(
            agent.handle_message(utterance, &TurnContext::new("cli-ask")).await,
        )
    });

    match result {
        Ok(outcome) => outcome_result(outcome),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

fn outcome_result(outcome: TurnOutcome) -> CommandResult {
    let details = serde_json::json!({
        "termination": outcome.termination,
        "transitions": outcome.transitions,
        "timings": outcome.timings,
    });

    match outcome.termination {
        TurnTermination::Failed => {
            CommandResult::failure_with_details("ask", "turn_failed", outcome.reply, 5, Some(details))
        }
        TurnTermination::Answered | TurnTermination::LookupFailed => {
            CommandResult::success_with_details("ask", outcome.reply, Some(details))
        }
    }
}
