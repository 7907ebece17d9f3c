//! `detect` subcommand: runs the detection pipeline over a map image.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rtumap_core::{AppConfig, Coordinates, DetectionResult, LeadScore};
use rtumap_engine::{
    CapturePipeline, DraftField, HeadlessSurface, MapEvent, MapSession, SessionUpdate, Viewport,
};

use crate::geocode;

pub(crate) struct DetectOptions {
    pub(crate) image: PathBuf,
    pub(crate) lat: f64,
    pub(crate) lng: f64,
    pub(crate) building_name: Option<String>,
    pub(crate) save: bool,
}

/// Loads `options.image` as the map backdrop centered at the given
/// coordinate, submits it for detection, and optionally saves the result.
///
/// # Errors
///
/// Returns an error if the image cannot be read, any pipeline step fails,
/// or the save is rejected.
pub(crate) async fn run_detect(config: &AppConfig, options: DetectOptions) -> anyhow::Result<()> {
    let center = Coordinates::new(options.lat, options.lng)?;
    let backdrop = image::open(&options.image)
        .with_context(|| format!("failed to read image {}", options.image.display()))?
        .to_rgba8();

    let surface = Arc::new(HeadlessSurface::with_backdrop(
        Viewport {
            center,
            zoom: config.default_zoom,
        },
        backdrop,
    ));
    let backend = Arc::new(crate::backend(config)?);
    let session = MapSession::new(
        surface,
        Arc::new(geocode::client(config)?),
        backend.clone(),
        backend,
        CapturePipeline::new(config.capture_scale),
    )
    .with_repair_concurrency(config.geocode_max_concurrent);

    let SessionUpdate::DetectionReady(result) = session.handle(MapEvent::DetectRequested).await?
    else {
        anyhow::bail!("detection did not produce a result");
    };
    print_result(&result);

    let draft = session.draft();
    let fields = draft.fields();
    println!("address:     {}", fields.address);
    println!("city/state:  {} {} {}", fields.city, fields.state, fields.zip_code);

    if !options.save {
        return Ok(());
    }

    if let Some(name) = options.building_name {
        session
            .handle(MapEvent::FieldEdited {
                field: DraftField::BuildingName,
                value: name,
            })
            .await?;
    }
    match session.handle(MapEvent::SaveRequested).await? {
        SessionUpdate::Saved(record) => {
            let id = record.id.map_or_else(|| "-".to_string(), |id| id.to_string());
            println!("saved record {id} ({})", record.display_name());
        }
        other => tracing::warn!(update = ?other, "save returned an unexpected update"),
    }
    Ok(())
}

fn print_result(result: &DetectionResult) {
    println!("rooftop units: {}", result.rtu_count);
    println!("lead score:    {}", result.lead_score);
    println!("model score:   {}", model_score(result));
    if let Some(confidence) = result.mean_confidence() {
        println!("confidence:    {confidence:.2}");
    }
    if let Some(path) = &result.processed_image {
        println!("processed:     {path}");
    }
}

/// The provider's 0–1 score alongside its projection onto the lead scale.
pub(crate) fn model_score(result: &DetectionResult) -> String {
    format!(
        "{:.2} ({})",
        result.provider_score,
        LeadScore::from_provider_score(result.provider_score)
    )
}
