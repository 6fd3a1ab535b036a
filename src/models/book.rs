//! Book record as seen by circulation, with its inline copy inventory

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// How a title is delivered to patrons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookType {
    Physical,
    Electronic,
    Both,
}

text_enum!(BookType {
    Physical => "physical",
    Electronic => "electronic",
    Both => "both",
});

impl BookType {
    /// Only titles with a physical copy can be queued for
    pub fn is_holdable(&self) -> bool {
        matches!(self, BookType::Physical | BookType::Both)
    }

    /// Physical-only titles go through the front desk
    pub fn allows_self_checkout(&self) -> bool {
        !matches!(self, BookType::Physical)
    }
}

/// Book row (owned by the catalog; circulation only touches the counters)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub book_type: BookType,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl Book {
    pub fn inventory(&self) -> CopyInventory {
        CopyInventory {
            total_copies: self.total_copies,
            available_copies: self.available_copies,
        }
    }
}

/// Per-book copy counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CopyInventory {
    pub total_copies: i32,
    pub available_copies: i32,
}

impl CopyInventory {
    /// `0 <= available_copies <= total_copies`
    pub fn is_consistent(&self) -> bool {
        self.total_copies >= 0
            && self.available_copies >= 0
            && self.available_copies <= self.total_copies
    }
}
