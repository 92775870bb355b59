use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the process.
///
/// `json_logs` switches the formatter to one JSON object per line for log shipping.
pub fn init_telemetry(
    service_name: &str,
    environment: &str,
    json_logs: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gallery=debug,tower_http=debug".into());

    let (json_layer, text_layer) = if json_logs {
        (Some(fmt::layer().json().with_current_span(true)), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        environment = environment,
        json_logs,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
