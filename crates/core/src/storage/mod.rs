use anyhow::Context;

pub mod history;
pub mod postgres;
pub mod repository;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("report_history migration failed")?;
    Ok(())
}
