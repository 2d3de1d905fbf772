//! Notification Evaluator (C11).
//!
//! Compares a (prior, new) `ProductListing` snapshot pair and emits
//! notifications to every active subscriber of the listing's product,
//! deduping each rule within a 24h window per (user, product, type).

use crate::db::{repo, Db};
use crate::models::{NotificationType, Notification, ProductListing};
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

pub fn evaluate(db: &Db, prior: &ProductListing, new: &ProductListing) -> Result<()> {
    let subscriptions = repo::active_subscriptions_for_product(db, new.product_id)?;
    let now = Utc::now();

    for sub in subscriptions {
        if sub.notify_on_drop {
            if let (Some(old_price), Some(new_price)) = (prior.current_price, new.current_price) {
                if new_price < old_price
                    && !repo::notification_recently_sent(db, sub.user_id, new.product_id, NotificationType::PriceDrop, now)?
                {
                    emit(
                        db,
                        sub.user_id,
                        new.product_id,
                        NotificationType::PriceDrop,
                        Some(old_price),
                        Some(new_price),
                        format!("Price dropped from {old_price:.2} to {new_price:.2}"),
                        now,
                    )?;
                }
            }
        }

        if sub.notify_on_restock
            && !prior.available
            && new.available
            && !repo::notification_recently_sent(db, sub.user_id, new.product_id, NotificationType::Restock, now)?
        {
            emit(
                db,
                sub.user_id,
                new.product_id,
                NotificationType::Restock,
                None,
                new.current_price,
                "Item is back in stock".to_string(),
                now,
            )?;
        }

        if sub.notify_on_target {
            if let (Some(target), Some(new_price)) = (sub.target_price, new.current_price) {
                if new_price <= target
                    && !repo::notification_recently_sent(db, sub.user_id, new.product_id, NotificationType::TargetReached, now)?
                {
                    emit(
                        db,
                        sub.user_id,
                        new.product_id,
                        NotificationType::TargetReached,
                        Some(target),
                        Some(new_price),
                        format!("Price reached your target of {target:.2}"),
                        now,
                    )?;
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit(
    db: &Db,
    user_id: Uuid,
    product_id: Uuid,
    notification_type: NotificationType,
    old_price: Option<f64>,
    new_price: Option<f64>,
    message: String,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    repo::insert_notification(
        db,
        &Notification {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            notification_type,
            old_price,
            new_price,
            message,
            created_at: now,
            read: false,
        },
    )
}
