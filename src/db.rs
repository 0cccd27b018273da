use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::eligibility::AdApplicationHistory;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn fetch_history(pool: &PgPool) -> anyhow::Result<AdApplicationHistory> {
    let rows = sqlx::query(
        "SELECT nick, ad_type, applied_on FROM counselor_analytics.ad_applications",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.get::<String, _>("nick"),
                row.get::<String, _>("ad_type"),
                row.get::<NaiveDate, _>("applied_on"),
            )
        })
        .collect())
}

pub async fn save_application(
    pool: &PgPool,
    nick: &str,
    level_cat: &str,
    ad_type: &str,
    applied_on: NaiveDate,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO counselor_analytics.ad_applications
        (id, nick, ad_type, level_cat, applied_on)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (nick, ad_type) DO UPDATE
        SET applied_on = EXCLUDED.applied_on,
            level_cat = EXCLUDED.level_cat,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(nick)
    .bind(ad_type)
    .bind(level_cat)
    .bind(applied_on)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_application(pool: &PgPool, nick: &str, ad_type: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM counselor_analytics.ad_applications WHERE nick = $1 AND ad_type = $2",
    )
    .bind(nick)
    .bind(ad_type)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn save_memo(pool: &PgPool, nick: &str, memo: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO counselor_analytics.counselor_memos (nick, memo)
        VALUES ($1, $2)
        ON CONFLICT (nick) DO UPDATE
        SET memo = EXCLUDED.memo, updated_at = now()
        "#,
    )
    .bind(nick)
    .bind(memo)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_memo(pool: &PgPool, nick: &str) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT memo FROM counselor_analytics.counselor_memos WHERE nick = $1")
        .bind(nick)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row.get("memo")))
}
