use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub street: String,
    pub city: String,
    pub country: String,
}

impl Address {
    pub fn one_line(&self) -> String {
        format!("{}, {}, {}", self.street, self.city, self.country)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressForm {
    pub street: String,
    pub city: String,
    pub country: String,
    pub csrf_token: String,
}
