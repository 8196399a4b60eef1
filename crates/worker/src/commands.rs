//! Subcommand bodies, kept separate from `main` so they run against any
//! persistence port.

use anyhow::{bail, Context};

use estate_core::import_report::{ImportResult, PropertyUpdateReport};
use estate_core::importer::{BatchImporter, ImportKind};
use estate_core::persistence::PersistencePort;
use estate_core::reconciler::Reconciler;

use crate::cli::{ImportArgs, InputFormat};
use crate::config::WorkerConfig;

/// Read the export file and import it.
pub async fn import<S: PersistencePort + ?Sized>(
    store: &S,
    args: &ImportArgs,
    config: &WorkerConfig,
) -> anyhow::Result<ImportResult> {
    let Some(format) = args.resolved_format() else {
        bail!(
            "cannot infer the input format of {}; pass --format csv|json",
            args.file.display()
        );
    };
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let kind = ImportKind::from(args.kind);
    let importer = BatchImporter::new(store, kind)
        .with_options(args.import_options(config))
        .with_reconciliation(args.reconcile(config));

    tracing::info!(kind = %kind, file = %args.file.display(), ?format, "Importing file");
    let result = match format {
        InputFormat::Csv => importer.import_csv(&text).await,
        InputFormat::Json => importer.import_json(&text).await,
    }
    .with_context(|| format!("Import of {} failed", args.file.display()))?;

    Ok(result)
}

/// Run one standalone reconciliation pass.
pub async fn reconcile<S: PersistencePort + ?Sized>(store: &S) -> PropertyUpdateReport {
    Reconciler::new(store).run().await
}
