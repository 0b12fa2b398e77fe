use std::sync::Arc;

use crate::{domain::UserId, store::CatalogStore, Result};

/// Caller classification, ordered by privilege.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessClass {
    Unknown,
    Registered,
    Admin,
}

/// Admins come from static config and win over the allow-list; the allow-list
/// is a dynamic store lookup; everything else is Unknown.
pub async fn classify(
    user_id: UserId,
    admin_ids: &[i64],
    store: &Arc<dyn CatalogStore>,
) -> Result<AccessClass> {
    if admin_ids.contains(&user_id.0) {
        return Ok(AccessClass::Admin);
    }
    if store.user_ids().await?.contains(&user_id) {
        return Ok(AccessClass::Registered);
    }
    Ok(AccessClass::Unknown)
}

pub fn authorize(class: AccessClass, min: AccessClass) -> bool {
    class >= min
}
