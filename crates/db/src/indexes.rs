use mongodb::{Database, IndexModel};
use tracing::info;

use crate::models::{Notification, Restaurant};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Notifications: newest-first listing and retention sweep share the first
    // index, unread counting uses the second.
    create_indexes(
        db,
        Notification::COLLECTION,
        vec![
            index(bson::doc! { "recipient_id": 1, "created_at": -1, "_id": -1 }),
            index(bson::doc! { "recipient_id": 1, "is_read": 1 }),
        ],
    )
    .await?;

    // Restaurants are owned by the CRUD layer; we only look them up by owner.
    create_indexes(
        db,
        Restaurant::COLLECTION,
        vec![index(bson::doc! { "owner_id": 1, "is_active": 1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
