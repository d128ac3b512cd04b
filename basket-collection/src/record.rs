use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A single `(basket_key, item_identifier)` record from the input stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Basket (transaction) key
    pub basket: String,

    /// Item identifier
    pub item: String
}

/// Reason a record can't take part in pair extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Basket key is empty
    MissingBasket,

    /// Item identifier is empty
    MissingItem
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Malformed::MissingBasket => write!(f, "missing basket key"),
            Malformed::MissingItem => write!(f, "missing item")
        }
    }
}

impl Record {
    /// Creates a new record
    pub fn new<B: Into<String>, I: Into<String>>(basket: B, item: I) -> Self {
        Record { basket: basket.into(), item: item.into() }
    }

    /// Returns why the record is unusable, if it is.
    /// ```rust
    ///   use basket_collection::record::{Record, Malformed};
    ///
    ///   assert_eq!(Record::new("b1", "apple").malformed(), None);
    ///   assert_eq!(Record::new("", "apple").malformed(), Some(Malformed::MissingBasket));
    ///   assert_eq!(Record::new("b1", "  ").malformed(), Some(Malformed::MissingItem));
    /// ```
    pub fn malformed(&self) -> Option<Malformed> {
        if self.basket.trim().is_empty() {
            Some(Malformed::MissingBasket)
        } else if self.item.trim().is_empty() {
            Some(Malformed::MissingItem)
        } else {
            None
        }
    }
}
