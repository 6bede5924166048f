use anyhow::Result;
use sqlx::SqlitePool;

/// Create the `vendas` table and its indexes. Idempotent.
///
/// `id` is the autoincrement rowid and doubles as the ingestion-order
/// tie-break for same-date reads. The date is stored as ISO-8601 text so
/// lexicographic ordering matches calendar ordering.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL,
            id_transacao TEXT NOT NULL,
            produto TEXT NOT NULL,
            categoria TEXT NOT NULL,
            regiao TEXT NOT NULL,
            quantidade INTEGER NOT NULL,
            preco_unitario REAL NOT NULL,
            receita_total REAL NOT NULL,
            mes INTEGER NOT NULL,
            ano INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vendas_data ON vendas(data)")
        .execute(pool)
        .await?;

    Ok(())
}
