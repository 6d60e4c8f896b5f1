use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::users;

/// Display metadata for a user. Users themselves are managed by the account
/// service; the chat core only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = users)]
pub struct MemberProfile {
    pub username: String,
    pub image_url: Option<String>,
}
