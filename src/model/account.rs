//! User accounts

use serde::{Deserialize, Serialize};

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub nickname: String,
    pub email: String,
    /// Currency balance; the only financial field on the account
    #[serde(default)]
    pub balance: i64,
}

impl UserAccount {
    pub fn new(id: UserId, nickname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            email: email.into(),
            balance: 0,
        }
    }

    pub fn can_afford(&self, price: i64) -> bool {
        self.balance >= price
    }
}
