use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::mysql::Mysql;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Numeric;
use serde::{Serialize, Serializer};

use crate::schema::{cook, dish, dish_type};

pub const NAME_MAX_LENGTH: usize = 63;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const PERSON_NAME_MAX_LENGTH: usize = 150;

pub const PRICE_MAX_DIGITS: usize = 7;
pub const PRICE_DECIMAL_PLACES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct DishType {
    pub id: i32,
    pub name: String,
}

impl fmt::Display for DishType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A staff account as shown to other cooks. The password hash is only ever
/// loaded as [`CookCredentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct Cook {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub years_of_experience: Option<i32>,
}

impl fmt::Display for Cook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.username, self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct CookCredentials {
    pub id: i32,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct Dish {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub dish_type_id: i32,
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[table_name = "dish_type"]
pub struct NewDishType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[table_name = "cook"]
#[changeset_options(treat_none_as_null = "true")]
pub struct NewCook {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// PHC string produced by the password hasher, never the raw password.
    pub password: String,
    pub years_of_experience: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[table_name = "dish"]
pub struct NewDish {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub dish_type_id: i32,
}

/// A dish row together with the full set of cooks it should be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishChanges {
    pub dish: NewDish,
    pub cook_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DishWithType {
    #[serde(flatten)]
    pub dish: Dish,
    pub dish_type: DishType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DishDetail {
    #[serde(flatten)]
    pub dish: Dish,
    pub dish_type: DishType,
    pub cooks: Vec<Cook>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DishTypeDetail {
    #[serde(flatten)]
    pub dish_type: DishType,
    pub dishes: Vec<Dish>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookDetail {
    #[serde(flatten)]
    pub cook: Cook,
    pub dishes: Vec<Dish>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub num_dish_types: i64,
    pub num_dishes: i64,
    pub num_cooks: i64,
}

/// Non-negative fixed-point amount with two fractional digits, stored as
/// whole cents. Maps to `DECIMAL(7, 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsExpression, FromSqlRow)]
#[sql_type = "Numeric"]
pub struct Price(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("Enter a number.")]
    NotANumber,
    #[error("Ensure this value is greater than or equal to 0.")]
    Negative,
    #[error("Ensure that there are no more than 7 digits in total.")]
    TooManyDigits,
    #[error("Ensure that there are no more than 2 decimal places.")]
    TooManyDecimalPlaces,
    #[error("Ensure that there are no more than 5 digits before the decimal point.")]
    TooManyWholeDigits,
}

impl Price {
    pub const MAX: Price = Price(9_999_999);

    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        if cents < 0 {
            return Err(PriceError::Negative);
        }
        if cents > Self::MAX.0 {
            return Err(PriceError::TooManyDigits);
        }
        Ok(Price(cents))
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (negative, unsigned) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };
        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (unsigned, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
            return Err(PriceError::NotANumber);
        }

        let significant_whole = whole.trim_start_matches('0');
        let total_digits = significant_whole.len() + fraction.len();
        if total_digits > PRICE_MAX_DIGITS {
            return Err(PriceError::TooManyDigits);
        }
        if fraction.len() > PRICE_DECIMAL_PLACES {
            return Err(PriceError::TooManyDecimalPlaces);
        }
        if significant_whole.len() > PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES {
            return Err(PriceError::TooManyWholeDigits);
        }

        let whole_value: i64 = if significant_whole.is_empty() {
            0
        } else {
            significant_whole.parse().map_err(|_| PriceError::NotANumber)?
        };
        let mut fraction_value: i64 = 0;
        for (position, digit) in fraction.bytes().enumerate() {
            let weight = if position == 0 { 10 } else { 1 };
            fraction_value += i64::from(digit - b'0') * weight;
        }
        let cents = whole_value * 100 + fraction_value;
        if negative && cents != 0 {
            return Err(PriceError::Negative);
        }
        Price::from_cents(cents)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// MySQL exchanges DECIMAL values as their textual representation.
impl ToSql<Numeric, Mysql> for Price {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Mysql>) -> serialize::Result {
        write!(out, "{}", self)?;
        Ok(IsNull::No)
    }
}

impl FromSql<Numeric, Mysql> for Price {
    fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
        let bytes = not_none!(bytes);
        let text = std::str::from_utf8(bytes)?;
        Ok(text.parse::<Price>()?)
    }
}
