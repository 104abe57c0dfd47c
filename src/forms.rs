//! Create/update payload validation.
//!
//! Payloads arrive as JSON objects whose scalar fields may be strings or
//! numbers, the way an HTML form would submit them. Blank values count as
//! missing. Errors are collected per field so a client can redisplay the
//! whole form at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Error;
use crate::models::{
    Cook, DishChanges, DishDetail, DishType, NewCook, NewDish, NewDishType, Price,
    NAME_MAX_LENGTH, PERSON_NAME_MAX_LENGTH, USERNAME_MAX_LENGTH,
};
use crate::store::StoreError;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Field name to messages, in field-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    fn finish<T>(self, value: impl FnOnce() -> Option<T>) -> Result<T, FormErrors> {
        if !self.is_empty() {
            return Err(self);
        }
        match value() {
            Some(value) => Ok(value),
            None => Err(self),
        }
    }

    /// Turns a storage constraint violation into the field error a form would
    /// have shown; anything else is handed back untouched.
    pub fn from_store(err: StoreError) -> Result<FormErrors, StoreError> {
        let mut errors = FormErrors::default();
        match err {
            StoreError::Duplicate {
                entity: "dish type",
                field: "name",
            } => errors.add("name", "Dish type with this Name already exists."),
            StoreError::Duplicate {
                entity: "cook",
                field: "username",
            } => errors.add("username", "A user with that username already exists."),
            StoreError::MissingReference {
                field: "dish_type", ..
            } => errors.add("dish_type", INVALID_CHOICE),
            StoreError::MissingReference { field: "cooks", id } => errors.add(
                "cooks",
                format!("Select a valid choice. {id} is not one of the available choices."),
            ),
            other => return Err(other),
        }
        Ok(errors)
    }
}

impl From<FormErrors> for Error {
    fn from(errors: FormErrors) -> Self {
        Error::invalid_request("form validation failed").with_details(json!({ "fields": errors }))
    }
}

/// Maps a failed save into either field errors or the original failure.
pub fn save_error(err: StoreError) -> Error {
    match FormErrors::from_store(err) {
        Ok(errors) => errors.into(),
        Err(other) => other.into(),
    }
}

fn raw_text(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn text(value: &Option<Value>) -> String {
    raw_text(value).trim().to_string()
}

fn char_field(
    errors: &mut FormErrors,
    field: &'static str,
    value: &Option<Value>,
    max_length: Option<usize>,
) -> Option<String> {
    let cleaned = text(value);
    if cleaned.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    if let Some(max_length) = max_length {
        let length = cleaned.chars().count();
        if length > max_length {
            errors.add(
                field,
                format!("Ensure this value has at most {max_length} characters (it has {length})."),
            );
            return None;
        }
    }
    Some(cleaned)
}

fn integer_field(errors: &mut FormErrors, field: &'static str, value: &Option<Value>) -> Option<i32> {
    let cleaned = text(value);
    if cleaned.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match cleaned.parse::<i32>() {
        Ok(number) => Some(number),
        Err(_) => {
            errors.add(field, "Enter a whole number.");
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DishTypeForm {
    #[serde(default)]
    pub name: Option<Value>,
}

impl DishTypeForm {
    pub fn validate(&self) -> Result<NewDishType, FormErrors> {
        let mut errors = FormErrors::default();
        let name = char_field(&mut errors, "name", &self.name, Some(NAME_MAX_LENGTH));
        errors.finish(|| Some(NewDishType { name: name? }))
    }
}

impl From<&DishType> for DishTypeForm {
    fn from(dish_type: &DishType) -> Self {
        Self {
            name: Some(Value::from(dish_type.name.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DishForm {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub dish_type: Option<Value>,
    #[serde(default)]
    pub cooks: Vec<Value>,
}

impl DishForm {
    pub fn validate(&self) -> Result<DishChanges, FormErrors> {
        let mut errors = FormErrors::default();
        let name = char_field(&mut errors, "name", &self.name, Some(NAME_MAX_LENGTH));
        let description = char_field(&mut errors, "description", &self.description, None);

        let price_text = text(&self.price);
        let price = if price_text.is_empty() {
            errors.add("price", REQUIRED);
            None
        } else {
            match price_text.parse::<Price>() {
                Ok(price) => Some(price),
                Err(err) => {
                    errors.add("price", err.to_string());
                    None
                }
            }
        };

        let dish_type_text = text(&self.dish_type);
        let dish_type_id = if dish_type_text.is_empty() {
            errors.add("dish_type", REQUIRED);
            None
        } else {
            match dish_type_text.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("dish_type", INVALID_CHOICE);
                    None
                }
            }
        };

        let mut cook_ids = Vec::with_capacity(self.cooks.len());
        for raw in &self.cooks {
            let raw = text(&Some(raw.clone()));
            match raw.parse::<i32>() {
                Ok(id) if !cook_ids.contains(&id) => cook_ids.push(id),
                Ok(_) => {}
                Err(_) => errors.add("cooks", format!("“{raw}” is not a valid value.")),
            }
        }

        errors.finish(|| {
            Some(DishChanges {
                dish: NewDish {
                    name: name?,
                    description: description?,
                    price: price?,
                    dish_type_id: dish_type_id?,
                },
                cook_ids,
            })
        })
    }
}

impl From<&DishDetail> for DishForm {
    fn from(detail: &DishDetail) -> Self {
        Self {
            name: Some(Value::from(detail.dish.name.clone())),
            description: Some(Value::from(detail.dish.description.clone())),
            price: Some(Value::from(detail.dish.price.to_string())),
            dish_type: Some(Value::from(detail.dish_type.id)),
            cooks: detail.cooks.iter().map(|cook| Value::from(cook.id)).collect(),
        }
    }
}

/// Account fields plus the two password entries of the cook form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CookForm {
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub first_name: Option<Value>,
    #[serde(default)]
    pub last_name: Option<Value>,
    #[serde(default)]
    pub years_of_experience: Option<Value>,
    #[serde(default, skip_serializing)]
    pub password1: Option<Value>,
    #[serde(default, skip_serializing)]
    pub password2: Option<Value>,
}

/// A validated cook form. The password is still in clear text and must be
/// hashed before it becomes a [`NewCook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookSubmission {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub years_of_experience: i32,
    pub password: String,
}

impl CookSubmission {
    pub fn into_new_cook(self, password_hash: String) -> NewCook {
        NewCook {
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            password: password_hash,
            years_of_experience: Some(self.years_of_experience),
        }
    }
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
}

fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

impl CookForm {
    pub fn validate(&self) -> Result<CookSubmission, FormErrors> {
        let mut errors = FormErrors::default();

        let username = char_field(&mut errors, "username", &self.username, Some(USERNAME_MAX_LENGTH))
            .and_then(|username| {
                if valid_username(&username) {
                    Some(username)
                } else {
                    errors.add(
                        "username",
                        "Enter a valid username. This value may contain only letters, \
                         numbers, and @/./+/-/_ characters.",
                    );
                    None
                }
            });
        let first_name = char_field(
            &mut errors,
            "first_name",
            &self.first_name,
            Some(PERSON_NAME_MAX_LENGTH),
        );
        let last_name = char_field(
            &mut errors,
            "last_name",
            &self.last_name,
            Some(PERSON_NAME_MAX_LENGTH),
        );
        let years_of_experience =
            integer_field(&mut errors, "years_of_experience", &self.years_of_experience);

        // Passwords are compared exactly as typed.
        let password1 = raw_text(&self.password1);
        let password2 = raw_text(&self.password2);
        if password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        let password = if password1.is_empty() || password2.is_empty() {
            None
        } else if password1 != password2 {
            errors.add("password2", "The two password fields didn’t match.");
            None
        } else {
            let problems = password_problems(&password2);
            if problems.is_empty() {
                Some(password2)
            } else {
                for problem in problems {
                    errors.add("password2", problem);
                }
                None
            }
        };

        errors.finish(|| {
            Some(CookSubmission {
                username: username?,
                first_name: first_name?,
                last_name: last_name?,
                years_of_experience: years_of_experience?,
                password: password?,
            })
        })
    }
}

impl From<&Cook> for CookForm {
    fn from(cook: &Cook) -> Self {
        Self {
            username: Some(Value::from(cook.username.clone())),
            first_name: Some(Value::from(cook.first_name.clone())),
            last_name: Some(Value::from(cook.last_name.clone())),
            years_of_experience: cook.years_of_experience.map(Value::from),
            password1: None,
            password2: None,
        }
    }
}
