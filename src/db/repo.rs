//! CRUD for `Store`/`Product`/`ProductListing`/`PriceHistory`/
//! `UserSubscription`/`Notification`, plus the `track`/`untrack`/
//! `list_tracked` inbound interfaces.

use super::Db;
use crate::models::{
    ListingOutcome, Notification, NotificationType, Priority, PriceHistory, Product,
    ProductListing, UserSubscription,
};
use crate::normalize;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

fn parse_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn map_listing(row: &Row) -> rusqlite::Result<ProductListing> {
    Ok(ProductListing {
        id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
        product_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
        domain: row.get(2)?,
        url: row.get(3)?,
        url_base: row.get(4)?,
        current_price: row.get(5)?,
        currency: row.get(6)?,
        available: row.get::<_, i64>(7)? != 0,
        last_checked: parse_dt(row.get(8)?),
        last_available: parse_dt(row.get(9)?),
        extractor_version: row.get(10)?,
        active: row.get::<_, i64>(11)? != 0,
    })
}

const LISTING_COLUMNS: &str = "id, product_id, domain, url, url_base, current_price, currency,
    available, last_checked, last_available, extractor_version, active";

fn map_product(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
        canonical_name: row.get(1)?,
        brand: row.get(2)?,
        ean: row.get(3)?,
        upc: row.get(4)?,
        isbn: row.get(5)?,
        image_url: row.get(6)?,
        subscriber_count: row.get(7)?,
    })
}

const PRODUCT_COLUMNS: &str =
    "id, canonical_name, brand, ean, upc, isbn, image_url, subscriber_count";

fn map_subscription(row: &Row) -> rusqlite::Result<UserSubscription> {
    let priority: String = row.get(3)?;
    Ok(UserSubscription {
        id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
        user_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
        product_id: row.get::<_, String>(2)?.parse().unwrap_or_default(),
        priority: priority.parse().unwrap_or(Priority::Low),
        target_price: row.get(4)?,
        notify_on_drop: row.get::<_, i64>(5)? != 0,
        notify_on_restock: row.get::<_, i64>(6)? != 0,
        notify_on_target: row.get::<_, i64>(7)? != 0,
        active: row.get::<_, i64>(8)? != 0,
    })
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, product_id, priority, target_price,
    notify_on_drop, notify_on_restock, notify_on_target, active";

/// Finds the active listing for (domain, url_base), if any.
pub fn find_active_listing(db: &Db, domain: &str, url_base: &str) -> Result<Option<ProductListing>> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {LISTING_COLUMNS} FROM listings
                     WHERE domain = ?1 AND url_base = ?2 AND active = 1"
                ),
                params![domain, url_base],
                map_listing,
            )
            .optional()?)
    })
}

pub fn get_listing(db: &Db, listing_id: Uuid) -> Result<Option<ProductListing>> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
                params![listing_id.to_string()],
                map_listing,
            )
            .optional()?)
    })
}

pub fn listings_for_product(db: &Db, product_id: Uuid) -> Result<Vec<ProductListing>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE product_id = ?1 AND active = 1"
        ))?;
        Ok(stmt
            .query_map(params![product_id.to_string()], map_listing)?
            .collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

pub fn get_product(db: &Db, product_id: Uuid) -> Result<Option<Product>> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![product_id.to_string()],
                map_product,
            )
            .optional()?)
    })
}

/// `track(user, url, priority)`. Normalizes the URL,
/// finds-or-creates Store/Product/Listing, upserts the Subscription.
pub fn track(
    db: &Db,
    user_id: Uuid,
    url: &str,
    priority: Priority,
) -> Result<(Product, UserSubscription, ProductListing, bool)> {
    let url_base = normalize::normalize(url).context("normalizing tracked URL")?;
    let domain = normalize::domain(url).context("resolving domain")?;

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO stores (domain) VALUES (?1)",
            params![domain],
        )?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {LISTING_COLUMNS} FROM listings
                     WHERE domain = ?1 AND url_base = ?2 AND active = 1"
                ),
                params![domain, url_base],
                map_listing,
            )
            .optional()?;

        let (listing, created) = match existing {
            Some(listing) => (listing, false),
            None => {
                let product_id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO products (id, subscriber_count) VALUES (?1, 0)",
                    params![product_id.to_string()],
                )?;
                let listing_id = Uuid::new_v4();
                tx.execute(
                    &format!(
                        "INSERT INTO listings (id, product_id, domain, url, url_base, available, active)
                         VALUES (?1, ?2, ?3, ?4, ?5, 0, 1)"
                    ),
                    params![
                        listing_id.to_string(),
                        product_id.to_string(),
                        domain,
                        url,
                        url_base
                    ],
                )?;
                let listing = tx.query_row(
                    &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
                    params![listing_id.to_string()],
                    map_listing,
                )?;
                (listing, true)
            }
        };

        let existing_sub = tx
            .query_row(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                     WHERE user_id = ?1 AND product_id = ?2"
                ),
                params![user_id.to_string(), listing.product_id.to_string()],
                map_subscription,
            )
            .optional()?;

        let subscription = match existing_sub {
            Some(_) => {
                tx.execute(
                    "UPDATE subscriptions SET priority = ?3, active = 1 WHERE user_id = ?1 AND product_id = ?2",
                    params![user_id.to_string(), listing.product_id.to_string(), priority.as_str()],
                )?;
                tx.query_row(
                    &format!(
                        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                         WHERE user_id = ?1 AND product_id = ?2"
                    ),
                    params![user_id.to_string(), listing.product_id.to_string()],
                    map_subscription,
                )?
            }
            None => {
                let sub_id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO subscriptions
                        (id, user_id, product_id, priority, notify_on_drop,
                         notify_on_restock, notify_on_target, active)
                     VALUES (?1, ?2, ?3, ?4, 1, 1, 1, 1)",
                    params![
                        sub_id.to_string(),
                        user_id.to_string(),
                        listing.product_id.to_string(),
                        priority.as_str()
                    ],
                )?;
                tx.query_row(
                    &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
                    params![sub_id.to_string()],
                    map_subscription,
                )?
            }
        };

        let subscriber_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE product_id = ?1 AND active = 1",
            params![listing.product_id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE products SET subscriber_count = ?2 WHERE id = ?1",
            params![listing.product_id.to_string(), subscriber_count],
        )?;

        let product = tx.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
            params![listing.product_id.to_string()],
            map_product,
        )?;

        tx.commit()?;
        Ok((product, subscription, listing, created))
    })
}

/// `untrack(user, url)`. Soft-deletes the subscription
/// and recomputes `Product.subscriber_count`; deactivates the listing
/// only if no active subscribers remain.
pub fn untrack(db: &Db, user_id: Uuid, url: &str) -> Result<()> {
    let url_base = normalize::normalize(url)?;
    let domain = normalize::domain(url)?;

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let product_id: Option<String> = tx
            .query_row(
                "SELECT product_id FROM listings WHERE domain = ?1 AND url_base = ?2 AND active = 1",
                params![domain, url_base],
                |row| row.get(0),
            )
            .optional()?;
        let Some(product_id) = product_id else {
            return Ok(());
        };

        tx.execute(
            "UPDATE subscriptions SET active = 0 WHERE user_id = ?1 AND product_id = ?2",
            params![user_id.to_string(), product_id],
        )?;

        let subscriber_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE product_id = ?1 AND active = 1",
            params![product_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE products SET subscriber_count = ?2 WHERE id = ?1",
            params![product_id, subscriber_count],
        )?;

        if subscriber_count == 0 {
            tx.execute(
                "UPDATE listings SET active = 0 WHERE domain = ?1 AND url_base = ?2",
                params![domain, url_base],
            )?;
        }

        tx.commit()?;
        Ok(())
    })
}

/// `list_tracked(user)`, read-only.
pub fn list_tracked(db: &Db, user_id: Uuid) -> Result<Vec<(Product, UserSubscription, ProductListing)>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT s.id, s.user_id, s.product_id, s.priority, s.target_price,
                    s.notify_on_drop, s.notify_on_restock, s.notify_on_target, s.active
             FROM subscriptions s WHERE s.user_id = ?1 AND s.active = 1",
        )?;
        let subs = stmt
            .query_map(params![user_id.to_string()], map_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::new();
        for sub in subs {
            let product = conn.query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![sub.product_id.to_string()],
                map_product,
            )?;
            let listing = conn.query_row(
                &format!(
                    "SELECT {LISTING_COLUMNS} FROM listings WHERE product_id = ?1 AND active = 1 LIMIT 1"
                ),
                params![sub.product_id.to_string()],
                map_listing,
            )?;
            out.push((product, sub, listing));
        }
        Ok(out)
    })
}

/// Listings due for refresh: `last_checked IS NULL OR last_checked +
/// interval(priority) <= now`. `interval_for` maps a listing's
/// aggregated priority to a refresh interval.
pub fn due_listings(
    db: &Db,
    now: DateTime<Utc>,
    interval_for: impl Fn(Priority) -> ChronoDuration,
    max_batch: usize,
) -> Result<Vec<(ProductListing, Priority)>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE active = 1"
        ))?;
        let listings = stmt
            .query_map([], map_listing)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut due = Vec::new();
        for listing in listings {
            let priority = aggregated_priority(conn, listing.product_id)?;
            let interval = interval_for(priority);
            let is_due = match listing.last_checked {
                None => true,
                Some(last) => last + interval <= now,
            };
            if is_due {
                due.push((listing, priority));
            }
        }

        due.sort_by(|(a, ap), (b, bp)| {
            bp.cmp(ap).then_with(|| {
                a.last_checked
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
                    .cmp(&b.last_checked.unwrap_or(DateTime::<Utc>::MIN_UTC))
            })
        });
        due.truncate(max_batch);
        Ok(due)
    })
}

/// Aggregated priority of a listing: max priority across its active
/// subscriptions, or `Low` if none.
pub fn aggregated_priority(conn: &rusqlite::Connection, product_id: Uuid) -> rusqlite::Result<Priority> {
    let mut stmt = conn.prepare(
        "SELECT priority FROM subscriptions WHERE product_id = ?1 AND active = 1",
    )?;
    let priorities = stmt
        .query_map(params![product_id.to_string()], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .filter_map(|s| s.parse::<Priority>().ok())
        .max();
    Ok(priorities.unwrap_or(Priority::Low))
}

/// Claims a listing for this tick via compare-and-set on
/// `last_checked` (the `DUE -> RUNNING` transition). Stamps `last_checked =
/// now` as the claim marker so a racing claimant's `WHERE` clause
/// (matched against the pre-claim value) no longer applies; on
/// success `persist_fetch_result`/`advance_last_checked` overwrite it
/// again with the post-fetch timestamp. Returns `true` if the caller
/// won the claim.
pub fn claim_listing(
    db: &Db,
    listing_id: Uuid,
    previous_last_checked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<bool> {
    db.with_conn(|conn| {
        let rows = match previous_last_checked {
            Some(prev) => conn.execute(
                "UPDATE listings SET last_checked = ?3 WHERE id = ?1 AND last_checked = ?2",
                params![listing_id.to_string(), prev.to_rfc3339(), now.to_rfc3339()],
            )?,
            None => conn.execute(
                "UPDATE listings SET last_checked = ?2 WHERE id = ?1 AND last_checked IS NULL",
                params![listing_id.to_string(), now.to_rfc3339()],
            )?,
        };
        Ok(rows == 1)
    })
}

/// Advances `last_checked` unconditionally (used on abort paths so a
/// listing that keeps failing doesn't busy-loop every tick).
pub fn advance_last_checked(db: &Db, listing_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET last_checked = ?2 WHERE id = ?1",
            params![listing_id.to_string(), now.to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Persists the outcome of one successful extraction+validation
/// cycle: updates the listing, appends price history iff a price was
/// extracted, and leaves attempt accounting to the caller (which
/// drives `pattern_store::record_attempt` in the same logical step).
pub fn persist_fetch_result(
    db: &Db,
    listing_id: Uuid,
    now: DateTime<Utc>,
    price: Option<f64>,
    currency: Option<&str>,
    available: bool,
    extractor_version: Option<i64>,
    extraction_method: Option<&str>,
    confidence: f64,
) -> Result<()> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE listings SET current_price = ?2, currency = ?3, available = ?4,
                last_checked = ?5, last_available = CASE WHEN ?4 = 1 THEN ?5 ELSE last_available END,
                extractor_version = COALESCE(?6, extractor_version)
             WHERE id = ?1",
            params![
                listing_id.to_string(),
                price,
                currency,
                available as i64,
                now.to_rfc3339(),
                extractor_version
            ],
        )?;

        if let Some(price) = price {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO price_history
                    (id, listing_id, price, currency, available, recorded_at,
                     extraction_method, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    listing_id.to_string(),
                    price,
                    currency,
                    available as i64,
                    now.to_rfc3339(),
                    extraction_method,
                    confidence
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    })
}

pub fn last_price_history(db: &Db, listing_id: Uuid) -> Result<Option<PriceHistory>> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT id, listing_id, price, currency, available, recorded_at,
                        extraction_method, confidence
                 FROM price_history WHERE listing_id = ?1
                 ORDER BY recorded_at DESC LIMIT 1",
                params![listing_id.to_string()],
                |row| {
                    Ok(PriceHistory {
                        id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
                        listing_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
                        price: row.get(2)?,
                        currency: row.get(3)?,
                        available: row.get::<_, i64>(4)? != 0,
                        recorded_at: row
                            .get::<_, String>(5)?
                            .parse::<DateTime<Utc>>()
                            .unwrap_or_else(|_| Utc::now()),
                        extraction_method: row.get(6)?,
                        confidence: row.get(7)?,
                    })
                },
            )
            .optional()?)
    })
}

pub fn active_subscriptions_for_product(db: &Db, product_id: Uuid) -> Result<Vec<UserSubscription>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE product_id = ?1 AND active = 1"
        ))?;
        Ok(stmt
            .query_map(params![product_id.to_string()], map_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

/// Whether a notification of `kind` for (user, product) was already
/// created within the dedup window (24h).
pub fn notification_recently_sent(
    db: &Db,
    user_id: Uuid,
    product_id: Uuid,
    kind: NotificationType,
    now: DateTime<Utc>,
) -> Result<bool> {
    let window_start = now - ChronoDuration::hours(24);
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications
             WHERE user_id = ?1 AND product_id = ?2 AND notification_type = ?3
               AND created_at >= ?4",
            params![
                user_id.to_string(),
                product_id.to_string(),
                kind.as_str(),
                window_start.to_rfc3339()
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    })
}

pub fn insert_notification(db: &Db, notification: &Notification) -> Result<()> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO notifications
                (id, user_id, product_id, notification_type, old_price, new_price,
                 message, created_at, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.product_id.to_string(),
                notification.notification_type.as_str(),
                notification.old_price,
                notification.new_price,
                notification.message,
                notification.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    })
}

/// Retention sweep: deletes `price_history` rows older than
/// `retain_days` (configurable via `retention.pricehistory_days`).
/// Idempotent.
pub fn sweep_price_history(db: &Db, now: DateTime<Utc>, retain_days: i64, dry_run: bool) -> Result<usize> {
    let cutoff = now - ChronoDuration::days(retain_days);
    db.with_conn(|conn| {
        if dry_run {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM price_history WHERE recorded_at < ?1",
                params![cutoff.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        } else {
            let rows = conn.execute(
                "DELETE FROM price_history WHERE recorded_at < ?1",
                params![cutoff.to_rfc3339()],
            )?;
            Ok(rows)
        }
    })
}

pub fn outcome(listing_id: Uuid, success: bool, duration_ms: u64, error: Option<String>) -> ListingOutcome {
    ListingOutcome {
        listing_id,
        success,
        duration_ms,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_is_idempotent_for_the_same_user_and_url() {
        let db = Db::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let (p1, _s1, l1, created1) =
            track(&db, user, "https://Shop.example.com/item/1?utm_source=x", Priority::Normal).unwrap();
        let (p2, _s2, l2, created2) =
            track(&db, user, "https://shop.example.com/item/1", Priority::High).unwrap();

        assert!(created1);
        assert!(!created2);
        assert_eq!(p1.id, p2.id);
        assert_eq!(l1.id, l2.id);
        assert_eq!(p2.subscriber_count, 1);
    }

    #[test]
    fn untrack_deactivates_listing_only_when_last_subscriber_leaves() {
        let db = Db::open_in_memory().unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let url = "https://shop.example.com/item/2";
        track(&db, alice, url, Priority::Normal).unwrap();
        let (_p, _s, listing, _c) = track(&db, bob, url, Priority::Normal).unwrap();

        untrack(&db, alice, url).unwrap();
        let still_active = get_listing(&db, listing.id).unwrap().unwrap();
        assert!(still_active.active);

        untrack(&db, bob, url).unwrap();
        let now_inactive = get_listing(&db, listing.id).unwrap().unwrap();
        assert!(!now_inactive.active);
        assert!(find_active_listing(&db, "shop.example.com", &still_active.url_base).unwrap().is_none());
    }

    #[test]
    fn list_tracked_only_returns_active_subscriptions() {
        let db = Db::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        track(&db, user, "https://shop.example.com/item/3", Priority::Normal).unwrap();
        track(&db, user, "https://other.example.com/item/4", Priority::Low).unwrap();
        untrack(&db, user, "https://other.example.com/item/4").unwrap();

        let tracked = list_tracked(&db, user).unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].2.domain, "shop.example.com");
    }

    #[test]
    fn claim_listing_is_won_by_exactly_one_racing_caller() {
        let db = Db::open_in_memory().unwrap();
        let (_p, _s, listing, _c) =
            track(&db, Uuid::new_v4(), "https://shop.example.com/item/5", Priority::Normal).unwrap();

        let now = Utc::now();
        let first = claim_listing(&db, listing.id, listing.last_checked, now).unwrap();
        let second = claim_listing(&db, listing.id, listing.last_checked, now).unwrap();

        assert!(first);
        assert!(!second, "a second claim against the same pre-claim value must lose the race");
    }

    #[test]
    fn sweep_price_history_respects_dry_run() {
        let db = Db::open_in_memory().unwrap();
        let (_p, _s, listing, _c) =
            track(&db, Uuid::new_v4(), "https://shop.example.com/item/6", Priority::Normal).unwrap();
        let old = Utc::now() - ChronoDuration::days(100);
        persist_fetch_result(&db, listing.id, old, Some(9.99), Some("USD"), true, None, Some("css"), 0.9).unwrap();

        let dry = sweep_price_history(&db, Utc::now(), 30, true).unwrap();
        assert_eq!(dry, 1);
        assert!(last_price_history(&db, listing.id).unwrap().is_some());

        let deleted = sweep_price_history(&db, Utc::now(), 30, false).unwrap();
        assert_eq!(deleted, 1);
        assert!(last_price_history(&db, listing.id).unwrap().is_none());
    }

    #[test]
    fn aggregated_priority_is_the_max_across_active_subscriptions() {
        let db = Db::open_in_memory().unwrap();
        let url = "https://shop.example.com/item/7";
        let (product, _s, _l, _c) = track(&db, Uuid::new_v4(), url, Priority::Low).unwrap();
        track(&db, Uuid::new_v4(), url, Priority::High).unwrap();

        let priority = db.with_conn(|conn| Ok(aggregated_priority(conn, product.id)?)).unwrap();
        assert_eq!(priority, Priority::High);
    }
}
