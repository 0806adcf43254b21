use atrium_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Database, storage, admin bootstrap and routes
    let (_state, router) = atrium_api::setup::initialize_app(config.clone()).await?;

    atrium_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
