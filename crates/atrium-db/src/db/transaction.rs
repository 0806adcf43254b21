//! Database transaction utilities

use std::future::Future;
use std::pin::Pin;

use atrium_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};

/// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
///
/// ```ignore
/// with_transaction(&pool, |tx| Box::pin(async move {
///     sqlx::query("UPDATE ...").execute(&mut **tx).await?;
///     Ok(())
/// })).await
/// ```
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R, AppError>
where
    F: for<'a> FnOnce(
        &'a mut Transaction<'static, Postgres>,
    ) -> Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'a>>,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}
