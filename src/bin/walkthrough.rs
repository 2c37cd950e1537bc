//! In-process walkthrough of the Data View workflow against the sample tanks.
//!
//! Run with: cargo run --bin walkthrough
//!
//! Creates a view over `dvTank*`, inspects what the query resolves to, then
//! adds fields, grouping, identification, consolidation, units and summaries,
//! printing the interpolated table after each change. Teardown is best
//! effort: every cleanup step runs even if an earlier one failed.

use std::sync::Arc;

use dataview::api::format::to_csv;
use dataview::catalog::demo::{seed_sample_tanks, SETTINGS_STREAM, TANK_STREAM_1, TANK_STREAM_2};
use dataview::catalog::InMemoryCatalog;
use dataview::data::format_millis;
use dataview::edit::{EditCommand, FieldLocator};
use dataview::engine::{CacheBehavior, EngineConfig};
use dataview::service::{BestEffort, DataRequest, DataViewService, ServiceError};
use dataview::view::{DataField, DataView, Query, SourceKind, SummaryDirection, SummaryType};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VIEW_ID: &str = "DataView_Sample";
const QUERY_ID: &str = "stream";
const RANGE_MS: i64 = 60 * 60 * 1000;

async fn show_data(
    service: &DataViewService,
    window: &DataRequest,
    token: &CancellationToken,
) -> Result<(), ServiceError> {
    let page = service.get_data_interpolated(VIEW_ID, window, token).await?;
    println!("{}", to_csv(&page, true));
    Ok(())
}

async fn edit(
    service: &DataViewService,
    commands: Vec<EditCommand>,
    token: &CancellationToken,
) -> Result<(), ServiceError> {
    service.apply_edits(VIEW_ID, &commands, token).await?;
    Ok(())
}

async fn run(
    service: &DataViewService,
    window: &DataRequest,
    token: &CancellationToken,
) -> Result<(), ServiceError> {
    tracing::info!("Step 3: Create a data view");
    let view = DataView::new(VIEW_ID)
        .with_name("DataView_Sample_Name")
        .with_description("A Sample Description that Describes that this is a Data View");
    service.create_or_update(view).await?;

    tracing::info!("Step 4: Retrieve the data view");
    let view = service.get(VIEW_ID)?;
    tracing::info!(id = %view.id, name = %view.name, description = %view.description, "Retrieved data view");

    tracing::info!("Step 5: Add a query for data items");
    edit(
        service,
        vec![EditCommand::AddQuery {
            query: Query::new(QUERY_ID, "dvTank*"),
        }],
        token,
    )
    .await?;

    tracing::info!("Step 6: View items found by the query");
    for item in service.get_data_items(VIEW_ID, QUERY_ID, token).await? {
        tracing::info!(id = %item.id, name = %item.name, "Resolved data item");
    }
    for ineligible in service.get_ineligible_data_items(VIEW_ID, QUERY_ID, token).await? {
        tracing::info!(
            id = %ineligible.item.id,
            name = %ineligible.item.name,
            reason = %ineligible.reason,
            "Ineligible data item"
        );
    }

    tracing::info!("Step 7: View fields available to include in the data view");
    for set in service.get_available_field_sets(VIEW_ID, token).await? {
        for field in &set.data_fields {
            tracing::info!(
                query_id = %set.query_id,
                source = field.source.as_str(),
                keys = ?field.keys,
                label = %field.label,
                "Available field"
            );
        }
    }

    tracing::info!("Step 8: Include the available fields");
    edit(service, vec![EditCommand::AddFieldSets], token).await?;
    show_data(service, window, token).await?;

    tracing::info!("Step 9: Group the data view");
    edit(
        service,
        vec![EditCommand::AddGroupingField {
            field: DataField::metadata(SourceKind::Id, "{IdentifyingValue} {Key}"),
        }],
        token,
    )
    .await?;
    show_data(service, window, token).await?;

    tracing::info!("Step 10: Identify data items");
    edit(
        service,
        vec![EditCommand::SetIdentifyingField {
            query_id: QUERY_ID.into(),
            field: Some(DataField::metadata(SourceKind::Id, "{IdentifyingValue} {Key}")),
        }],
        token,
    )
    .await?;
    show_data(service, window, token).await?;

    tracing::info!("Step 11: Consolidate data fields");
    edit(
        service,
        vec![EditCommand::Consolidate {
            query_id: QUERY_ID.into(),
            target_key: "Temperature".into(),
            merge_key: "AmbientTemperature".into(),
        }],
        token,
    )
    .await?;
    show_data(service, window, token).await?;

    tracing::info!("Step 12: Add units of measure columns");
    edit(
        service,
        ["Pressure", "Temperature"]
            .into_iter()
            .map(|key| EditCommand::SetIncludeUom {
                query_id: QUERY_ID.into(),
                field: FieldLocator::key(key),
                include_uom: true,
            })
            .collect(),
        token,
    )
    .await?;
    show_data(service, window, token).await?;

    tracing::info!("Step 13: Add summary columns");
    edit(
        service,
        [SummaryType::Mean, SummaryType::Total]
            .into_iter()
            .map(|summary_type| EditCommand::AddSummaryField {
                query_id: QUERY_ID.into(),
                key: "Pressure".into(),
                summary_direction: SummaryDirection::Forward,
                summary_type,
            })
            .collect(),
        token,
    )
    .await?;
    show_data(service, window, token).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walkthrough=info,dataview=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Step 2: Create types, streams and data");
    let end = chrono::Utc::now().timestamp_millis();
    let catalog = Arc::new(InMemoryCatalog::new());
    let events = seed_sample_tanks(&catalog, end, RANGE_MS, &mut rand::thread_rng())?;
    tracing::info!(items = catalog.item_count(), events, "Seeded sample tanks");

    let service = DataViewService::new(catalog.clone(), EngineConfig::default());
    let token = CancellationToken::new();
    let mut window = DataRequest::new(format_millis(end - RANGE_MS), format_millis(end), "00:20:00");
    window.cache = CacheBehavior::Refresh;

    let outcome = run(&service, &window, &token).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Walkthrough failed");
    }

    tracing::info!("Step 14: Delete sample objects");
    let mut cleanup = BestEffort::new();
    cleanup
        .step_async("delete data view", service.delete(VIEW_ID))
        .await;
    if service.get(VIEW_ID).is_ok() {
        tracing::warn!(view_id = VIEW_ID, "Data view still present after delete");
    }
    for id in [TANK_STREAM_1, TANK_STREAM_2, SETTINGS_STREAM] {
        let removed = catalog.remove_item(id);
        cleanup.step(
            &format!("delete stream '{id}'"),
            if removed {
                Ok(())
            } else {
                Err(format!("stream '{id}' was not registered"))
            },
        );
    }
    let report = cleanup.finish();
    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        "Cleanup finished"
    );

    outcome?;
    match report.first_failure {
        Some(failure) => Err(format!("{}: {}", failure.step, failure.error).into()),
        None => Ok(()),
    }
}
