//! `geocode` and `reverse` subcommands.

use rtumap_core::{AppConfig, Coordinates};
use rtumap_geocode::{GeocodeClient, GeocodedPlace};

pub(crate) fn client(config: &AppConfig) -> anyhow::Result<GeocodeClient> {
    Ok(GeocodeClient::with_base_url(
        config.require_geocode_api_key()?,
        config.request_timeout_secs,
        &config.user_agent,
        &config.geocode_base_url,
    )?)
}

/// # Errors
///
/// Returns an error if the provider rejects the request.
pub(crate) async fn run_forward(config: &AppConfig, address: &str) -> anyhow::Result<()> {
    let place = client(config)?.forward_geocode(address).await?;
    print_place(place.as_ref());
    Ok(())
}

/// # Errors
///
/// Returns an error for out-of-range coordinates or if the provider rejects
/// the request.
pub(crate) async fn run_reverse(config: &AppConfig, lat: f64, lng: f64) -> anyhow::Result<()> {
    let coords = Coordinates::new(lat, lng)?;
    let place = client(config)?.reverse_geocode(coords).await?;
    print_place(place.as_ref());
    Ok(())
}

fn print_place(place: Option<&GeocodedPlace>) {
    let Some(place) = place else {
        println!("no match");
        return;
    };
    println!("address:  {}", place.formatted_address);
    println!("city:     {}", place.city);
    println!("state:    {}", place.state);
    println!("zip:      {}", place.zip);
    if let Some(location) = place.location {
        println!("location: {location}");
    }
    if !place.place_id.is_empty() {
        println!("place id: {}", place.place_id);
    }
}
