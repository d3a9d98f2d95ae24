use crate::commands::{current_thread_runtime, load_config, CommandResult};
use shopkeep_db::{connect_with_config, migrations, SampleCatalog, SeedResult, SqlCatalogRepository};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlCatalogRepository::new(pool.clone());
        let seeded = SampleCatalog::load(&repository)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));

        pool.close().await;
        seeded
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_message(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_message(seeded: &SeedResult) -> String {
    if seeded.inserted.is_empty() {
        return format!(
            "catalog already holds {} product(s); sample catalog not inserted",
            seeded.skipped_existing
        );
    }

    format!(
        "sample catalog inserted ({} products): {}",
        seeded.inserted.len(),
        seeded.inserted.join(", ")
    )
}
