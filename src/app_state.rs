use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::gateway::{DataGateway, PostgresGateway};
use crate::services::{
    EngagementService, MapPinService, PostService, ProfileService, RelationshipService,
    SavedListService,
};

#[derive(Clone)]
pub struct AppState {
    pub profiles: ProfileService,
    pub relationships: RelationshipService,
    pub posts: PostService,
    pub engagement: EngagementService,
    pub map_pins: MapPinService,
    pub saved: SavedListService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Connect and make sure the collection tables exist
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        let gateway = PostgresGateway::new(pool);
        gateway.initialize().await?;

        Ok(Self::with_gateway(Arc::new(gateway), config))
    }

    /// Wires every service over the given gateway. Tests use this with the
    /// in-memory backend.
    pub fn with_gateway(gateway: Arc<dyn DataGateway>, config: Config) -> Self {
        Self {
            profiles: ProfileService::new(gateway.clone()),
            relationships: RelationshipService::new(gateway.clone()),
            posts: PostService::new(gateway.clone()),
            engagement: EngagementService::new(gateway.clone()),
            map_pins: MapPinService::new(gateway.clone(), config.feed.activity_limit),
            saved: SavedListService::new(gateway),
            config,
        }
    }
}
