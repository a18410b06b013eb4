use uuid::Uuid;

use crate::database::models::{CustomerLinkEntity, NewCustomerLink};
use crate::database::{CustomerStore, LinkStore};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub ewity_customer_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

fn already_linked() -> AppError {
    AppError::Validation("Customer already linked".into())
}

/// 为 Ewity 客户生成公开标识
///
/// 名称和电话优先取请求中的值，其次取本地缓存表中的记录。
pub async fn create_link(
    links: &dyn LinkStore,
    customers: &dyn CustomerStore,
    created_by: Uuid,
    req: LinkRequest,
) -> Result<CustomerLinkEntity, AppError> {
    let ewity_customer_id = req.ewity_customer_id.trim().to_string();
    if ewity_customer_id.is_empty() {
        return Err(AppError::Validation("Missing required fields".into()));
    }

    if links.find_by_customer_id(&ewity_customer_id).await?.is_some() {
        return Err(already_linked());
    }

    let given = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut customer_name = given(req.customer_name);
    let mut customer_phone = given(req.customer_phone);

    if customer_name.is_none() || customer_phone.is_none() {
        if let Some(row) = customers.find_by_id(&ewity_customer_id).await? {
            customer_name = customer_name.or(Some(row.name));
            customer_phone = customer_phone.or(Some(row.mobile));
        }
    }

    let link = links
        .create(NewCustomerLink {
            uuid: Uuid::new_v4(),
            ewity_customer_id,
            customer_name: customer_name.unwrap_or_default(),
            customer_phone: customer_phone.unwrap_or_default(),
            created_by,
        })
        .await?
        .ok_or_else(already_linked)?;

    tracing::info!(
        "Linked Ewity customer {} as {}",
        link.ewity_customer_id,
        link.uuid
    );
    Ok(link)
}

pub async fn delete_link(links: &dyn LinkStore, identifier: &str) -> Result<(), AppError> {
    let not_found = || AppError::NotFound("Link not found".into());
    let uuid = Uuid::parse_str(identifier.trim()).map_err(|_| not_found())?;

    if !links.delete(uuid).await? {
        return Err(not_found());
    }
    tracing::info!("Deleted customer link {}", uuid);
    Ok(())
}
