use scd::batch::ChangeBatch;
use scd::error::ScdResult;
use scd::merge::{MergeSummary, Scd1MergeEngine, Scd2MergeEngine};
use scd::snapshot::SnapshotLoader;
use scd::source::ChangeSource;
use scd::types::{AttributeColumn, AttributeType, EntitySchema};
use scd_config::shared::{ColumnType, MergeTargetConfig, MergerConfig, TablesConfig};
use scd_postgres::db::connect_to_database;
use scd_postgres::source::PostgresChangeSource;
use scd_postgres::store::PostgresScdStore;
use scd_postgres::tables::{ScdTables, create_tables};
use tracing::{info, warn};

use crate::error::MergerResult;

/// Target selection given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetArg {
    Scd1,
    Scd2,
    Both,
}

/// Returns the targets to merge, in merge order.
///
/// A command-line selection replaces the configured targets. Duplicates are dropped.
pub fn resolve_targets(
    selected: Option<TargetArg>,
    configured: &[MergeTargetConfig],
) -> Vec<MergeTargetConfig> {
    let targets: &[MergeTargetConfig] = match selected {
        Some(TargetArg::Scd1) => &[MergeTargetConfig::Scd1],
        Some(TargetArg::Scd2) => &[MergeTargetConfig::Scd2],
        Some(TargetArg::Both) => &[MergeTargetConfig::Scd1, MergeTargetConfig::Scd2],
        None => configured,
    };

    let mut resolved = Vec::with_capacity(targets.len());
    for target in targets {
        if !resolved.contains(target) {
            resolved.push(*target);
        }
    }

    resolved
}

fn attribute_type(column_type: ColumnType) -> AttributeType {
    match column_type {
        ColumnType::Text => AttributeType::Text,
        ColumnType::Integer => AttributeType::Integer,
        ColumnType::Float => AttributeType::Float,
        ColumnType::Boolean => AttributeType::Boolean,
        ColumnType::Date => AttributeType::Date,
        ColumnType::Timestamp => AttributeType::Timestamp,
    }
}

/// Builds the entity schema declared by the tables configuration.
pub fn build_entity_schema(config: &TablesConfig) -> ScdResult<EntitySchema> {
    let attributes = config
        .attributes
        .iter()
        .map(|column| AttributeColumn::new(column.name.clone(), attribute_type(column.column_type)))
        .collect();

    EntitySchema::new(config.entity_column.clone(), attributes)
}

fn build_tables(config: &TablesConfig, entity_schema: EntitySchema) -> ScdResult<ScdTables> {
    let tables = ScdTables::new(
        config.schema.clone(),
        config.stage_table.clone(),
        config.scd1_table.clone(),
        config.scd2_table.clone(),
        entity_schema,
    )?;

    Ok(match &config.snapshot_table {
        Some(snapshot_table) => tables.with_snapshot_table(snapshot_table.clone()),
        None => tables,
    })
}

/// What a merger run does besides merging the stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Create the schema and tables first.
    pub init: bool,
    /// Load the snapshot table into the selected targets before merging.
    pub load_snapshot: bool,
}

/// Runs one merge of the stage table into the selected targets.
///
/// The stage is read once and parsed into a single batch which every target merges in turn. The
/// stage is only cleared once all targets succeeded.
pub async fn start_merger_with_config(
    config: MergerConfig,
    targets: Vec<MergeTargetConfig>,
    options: RunOptions,
) -> MergerResult<Vec<MergeSummary>> {
    let entity_schema = build_entity_schema(&config.tables)?;
    let tables = build_tables(&config.tables, entity_schema.clone())?;

    let pool = connect_to_database(&config.database, config.merge.max_connections).await?;

    if options.init || config.merge.create_tables {
        create_tables(&pool, &tables).await?;
    }

    let source = PostgresChangeSource::new(pool.clone(), tables.clone());
    let store = PostgresScdStore::new(pool.clone(), tables.clone());

    if options.load_snapshot {
        let snapshot = source.read_snapshot().await?;
        let loader = SnapshotLoader::new(store.clone());
        for target in &targets {
            let summary = match target {
                MergeTargetConfig::Scd1 => loader.load_scd1(&snapshot).await?,
                MergeTargetConfig::Scd2 => loader.load_scd2(&snapshot).await?,
            };
            info!(%summary, "snapshot loaded");
        }
    }

    let batch: ChangeBatch = source.read_batch(&entity_schema).await?;
    if batch.is_empty() {
        warn!(stage = %tables.stage_table(), "stage table is empty");
    }

    let mut summaries = Vec::with_capacity(targets.len());
    for target in targets {
        let summary = match target {
            MergeTargetConfig::Scd1 => {
                Scd1MergeEngine::new(entity_schema.clone(), store.clone())
                    .merge(&batch)
                    .await?
            }
            MergeTargetConfig::Scd2 => {
                Scd2MergeEngine::new(entity_schema.clone(), store.clone())
                    .merge(&batch)
                    .await?
            }
        };
        summaries.push(summary);
    }

    if config.merge.clear_stage_after_merge {
        source.clear().await?;
    }

    pool.close().await;

    info!(targets = summaries.len(), records = batch.len(), "merger run completed");

    Ok(summaries)
}
