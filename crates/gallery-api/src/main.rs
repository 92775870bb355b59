use gallery_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Initialize the application (catalog, queue worker, hub, routes)
    let (state, router) = gallery_api::setup::initialize_app(config.clone()).await?;

    gallery_api::setup::server::start_server(&config, router, state.queue.clone()).await?;

    Ok(())
}
