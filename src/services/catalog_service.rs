//! Bills, politicians and the support links between them.
//!
//! Association lists are replaced wholesale inside the same database
//! transaction as the row they belong to, so a request with one bad id
//! changes nothing.

use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        bill::{Bill, BillPolitician, BillResponse, CreateBillRequest, UpdateBillRequest},
        politician::{
            CreatePoliticianRequest, Politician, PoliticianResponse, UpdatePoliticianRequest,
        },
    },
};

/// Collapse repeated ids, keeping the first position and the last value.
pub fn dedupe_links(links: impl IntoIterator<Item = (Uuid, Option<bool>)>) -> Vec<(Uuid, Option<bool>)> {
    let mut out: Vec<(Uuid, Option<bool>)> = Vec::new();
    for (id, does_support) in links {
        match out.iter_mut().find(|(seen, _)| *seen == id) {
            Some(existing) => existing.1 = does_support,
            None => out.push((id, does_support)),
        }
    }
    out
}

fn group_links<F>(links: Vec<BillPolitician>, key: F) -> HashMap<Uuid, Vec<BillPolitician>>
where
    F: Fn(&BillPolitician) -> Uuid,
{
    let mut grouped: HashMap<Uuid, Vec<BillPolitician>> = HashMap::new();
    for link in links {
        grouped.entry(key(&link)).or_default().push(link);
    }
    grouped
}

/// Fail with `message` unless every id exists in `table`.
async fn ensure_all_exist(
    conn: &mut PgConnection,
    table: &'static str,
    ids: &[Uuid],
    message: &str,
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_one(&mut *conn)
    .await?;

    if found as usize != ids.len() {
        return Err(AppError::bad_request(message));
    }
    Ok(())
}

fn map_delete_error(err: sqlx::Error, what: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            AppError::bad_request(format!("{what} is referenced by letter requests"))
        }
        other => AppError::Database(other),
    }
}

// ---- bills ----

async fn replace_bill_links(
    conn: &mut PgConnection,
    bill_id: Uuid,
    links: Vec<(Uuid, Option<bool>)>,
) -> Result<(), AppError> {
    let links = dedupe_links(links);
    let ids: Vec<Uuid> = links.iter().map(|(id, _)| *id).collect();
    ensure_all_exist(
        conn,
        "politicians",
        &ids,
        "One or more politician_ids are invalid",
    )
    .await?;

    sqlx::query("DELETE FROM bill_politicians WHERE bill_id = $1")
        .bind(bill_id)
        .execute(&mut *conn)
        .await?;

    for (politician_id, does_support) in links {
        sqlx::query(
            "INSERT INTO bill_politicians (bill_id, politician_id, does_support) VALUES ($1, $2, $3)",
        )
        .bind(bill_id)
        .bind(politician_id)
        .bind(does_support)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn bill_links(pool: &DbPool, bill_ids: &[Uuid]) -> Result<Vec<BillPolitician>, AppError> {
    let links = sqlx::query_as::<_, BillPolitician>(
        "SELECT * FROM bill_politicians WHERE bill_id = ANY($1) ORDER BY politician_id",
    )
    .bind(bill_ids)
    .fetch_all(pool)
    .await?;
    Ok(links)
}

pub async fn list_bills(pool: &DbPool) -> Result<Vec<BillResponse>, AppError> {
    let bills = sqlx::query_as::<_, Bill>("SELECT * FROM bills ORDER BY created_at")
        .fetch_all(pool)
        .await?;

    let ids: Vec<Uuid> = bills.iter().map(|b| b.id).collect();
    let mut links = group_links(bill_links(pool, &ids).await?, |l| l.bill_id);

    Ok(bills
        .into_iter()
        .map(|bill| {
            let bill_links = links.remove(&bill.id).unwrap_or_default();
            BillResponse::new(bill, bill_links)
        })
        .collect())
}

pub async fn get_bill(pool: &DbPool, id: Uuid) -> Result<BillResponse, AppError> {
    let bill = sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Bill"))?;

    let links = bill_links(pool, &[id]).await?;
    Ok(BillResponse::new(bill, links))
}

pub async fn create_bill(pool: &DbPool, request: CreateBillRequest) -> Result<BillResponse, AppError> {
    let mut tx = pool.begin().await?;

    let bill = sqlx::query_as::<_, Bill>(
        r#"
        INSERT INTO bills (title, description, bill_number, legislative_body, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.bill_number)
    .bind(&request.legislative_body)
    .bind(&request.status)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(politicians) = request.politicians {
        let links = politicians
            .into_iter()
            .map(|l| (l.politician_id, l.does_support))
            .collect();
        replace_bill_links(&mut tx, bill.id, links).await?;
    }

    tx.commit().await?;

    tracing::info!(bill_id = %bill.id, bill_number = %bill.bill_number, "bill created");
    get_bill(pool, bill.id).await
}

pub async fn update_bill(
    pool: &DbPool,
    id: Uuid,
    request: UpdateBillRequest,
) -> Result<BillResponse, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query_as::<_, Bill>(
        r#"
        UPDATE bills
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            bill_number = COALESCE($4, bill_number),
            legislative_body = COALESCE($5, legislative_body),
            status = COALESCE($6, status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.bill_number)
    .bind(&request.legislative_body)
    .bind(&request.status)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Bill"))?;

    if let Some(politicians) = request.politicians {
        let links = politicians
            .into_iter()
            .map(|l| (l.politician_id, l.does_support))
            .collect();
        replace_bill_links(&mut tx, id, links).await?;
    }

    tx.commit().await?;
    get_bill(pool, id).await
}

pub async fn delete_bill(pool: &DbPool, id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM bills WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_delete_error(e, "Bill"))?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::not_found("Bill"));
    }

    tracing::info!(bill_id = %id, "bill deleted");
    Ok(())
}

// ---- politicians ----

async fn replace_politician_links(
    conn: &mut PgConnection,
    politician_id: Uuid,
    links: Vec<(Uuid, Option<bool>)>,
) -> Result<(), AppError> {
    let links = dedupe_links(links);
    let ids: Vec<Uuid> = links.iter().map(|(id, _)| *id).collect();
    ensure_all_exist(conn, "bills", &ids, "One or more bill_ids are invalid").await?;

    sqlx::query("DELETE FROM bill_politicians WHERE politician_id = $1")
        .bind(politician_id)
        .execute(&mut *conn)
        .await?;

    for (bill_id, does_support) in links {
        sqlx::query(
            "INSERT INTO bill_politicians (bill_id, politician_id, does_support) VALUES ($1, $2, $3)",
        )
        .bind(bill_id)
        .bind(politician_id)
        .bind(does_support)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn politician_links(
    pool: &DbPool,
    politician_ids: &[Uuid],
) -> Result<Vec<BillPolitician>, AppError> {
    let links = sqlx::query_as::<_, BillPolitician>(
        "SELECT * FROM bill_politicians WHERE politician_id = ANY($1) ORDER BY bill_id",
    )
    .bind(politician_ids)
    .fetch_all(pool)
    .await?;
    Ok(links)
}

pub async fn list_politicians(pool: &DbPool) -> Result<Vec<PoliticianResponse>, AppError> {
    let politicians = sqlx::query_as::<_, Politician>("SELECT * FROM politicians ORDER BY name")
        .fetch_all(pool)
        .await?;

    let ids: Vec<Uuid> = politicians.iter().map(|p| p.id).collect();
    let mut links = group_links(politician_links(pool, &ids).await?, |l| l.politician_id);

    Ok(politicians
        .into_iter()
        .map(|politician| {
            let own = links.remove(&politician.id).unwrap_or_default();
            PoliticianResponse::new(politician, own)
        })
        .collect())
}

pub async fn get_politician(pool: &DbPool, id: Uuid) -> Result<PoliticianResponse, AppError> {
    let politician = sqlx::query_as::<_, Politician>("SELECT * FROM politicians WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Politician"))?;

    let links = politician_links(pool, &[id]).await?;
    Ok(PoliticianResponse::new(politician, links))
}

pub async fn create_politician(
    pool: &DbPool,
    request: CreatePoliticianRequest,
) -> Result<PoliticianResponse, AppError> {
    let mut tx = pool.begin().await?;

    let politician = sqlx::query_as::<_, Politician>(
        r#"
        INSERT INTO politicians (
            name,
            title,
            email,
            office_address_line1,
            office_address_line2,
            office_city,
            office_state,
            office_zip,
            legislative_body
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(&request.name)
    .bind(&request.title)
    .bind(&request.email)
    .bind(&request.office_address_line1)
    .bind(&request.office_address_line2)
    .bind(&request.office_city)
    .bind(&request.office_state)
    .bind(&request.office_zip)
    .bind(&request.legislative_body)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(bills) = request.bills {
        let links = bills.into_iter().map(|l| (l.bill_id, l.does_support)).collect();
        replace_politician_links(&mut tx, politician.id, links).await?;
    }

    tx.commit().await?;

    tracing::info!(politician_id = %politician.id, name = %politician.name, "politician created");
    get_politician(pool, politician.id).await
}

pub async fn update_politician(
    pool: &DbPool,
    id: Uuid,
    request: UpdatePoliticianRequest,
) -> Result<PoliticianResponse, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query_as::<_, Politician>(
        r#"
        UPDATE politicians
        SET name = COALESCE($2, name),
            title = COALESCE($3, title),
            email = COALESCE($4, email),
            office_address_line1 = COALESCE($5, office_address_line1),
            office_address_line2 = COALESCE($6, office_address_line2),
            office_city = COALESCE($7, office_city),
            office_state = COALESCE($8, office_state),
            office_zip = COALESCE($9, office_zip),
            legislative_body = COALESCE($10, legislative_body),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&request.name)
    .bind(&request.title)
    .bind(&request.email)
    .bind(&request.office_address_line1)
    .bind(&request.office_address_line2)
    .bind(&request.office_city)
    .bind(&request.office_state)
    .bind(&request.office_zip)
    .bind(&request.legislative_body)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Politician"))?;

    if let Some(bills) = request.bills {
        let links = bills.into_iter().map(|l| (l.bill_id, l.does_support)).collect();
        replace_politician_links(&mut tx, id, links).await?;
    }

    tx.commit().await?;
    get_politician(pool, id).await
}

pub async fn delete_politician(pool: &DbPool, id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM politicians WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_delete_error(e, "Politician"))?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::not_found("Politician"));
    }

    tracing::info!(politician_id = %id, "politician deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{foreign_key_violation, unique_violation};

    #[test]
    fn deleting_a_referenced_row_is_a_bad_request() {
        let err = map_delete_error(foreign_key_violation(), "Bill");
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(err.to_string(), "Bill is referenced by letter requests");

        assert!(matches!(
            map_delete_error(unique_violation(), "Bill"),
            AppError::Database(_)
        ));
    }

    #[test]
    fn duplicate_links_keep_first_position_and_last_value() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let links = dedupe_links(vec![(a, Some(true)), (b, None), (a, Some(false))]);
        assert_eq!(links, vec![(a, Some(false)), (b, None)]);
    }

    #[test]
    fn links_are_grouped_by_key() {
        let bill = Uuid::new_v4();
        let other_bill = Uuid::new_v4();
        let link = |bill_id| BillPolitician {
            bill_id,
            politician_id: Uuid::new_v4(),
            does_support: Some(true),
        };

        let grouped = group_links(vec![link(bill), link(other_bill), link(bill)], |l| l.bill_id);
        assert_eq!(grouped[&bill].len(), 2);
        assert_eq!(grouped[&other_bill].len(), 1);
    }
}
