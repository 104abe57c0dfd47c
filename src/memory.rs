//! In-process [`KitchenStore`] used by the test suites.
//!
//! Mirrors the MySQL schema's behaviour: unique names and usernames,
//! cascading deletes, foreign-key checks and default orderings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::models::{
    Cook, CookCredentials, CookDetail, Counts, Dish, DishChanges, DishDetail, DishType,
    DishTypeDetail, DishWithType, NewCook, NewDishType,
};
use crate::search::Prefix;
use crate::store::{KitchenStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    dish_types: BTreeMap<i32, DishType>,
    cooks: BTreeMap<i32, (Cook, String)>,
    dishes: BTreeMap<i32, Dish>,
    // (dish_id, cook_id)
    dish_cooks: BTreeSet<(i32, i32)>,
    last_id: i32,
}

/// Case-folded form used for uniqueness, lookups and ordering, the way the
/// `utf8mb4_unicode_ci` columns compare in MySQL.
fn folded(text: &str) -> String {
    text.to_lowercase()
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn dish_type(&self, id: i32) -> Result<&DishType, StoreError> {
        self.dish_types.get(&id).ok_or(StoreError::NotFound {
            entity: "dish type",
            id,
        })
    }

    fn cook(&self, id: i32) -> Result<&Cook, StoreError> {
        self.cooks
            .get(&id)
            .map(|(cook, _)| cook)
            .ok_or(StoreError::NotFound { entity: "cook", id })
    }

    fn dish(&self, id: i32) -> Result<&Dish, StoreError> {
        self.dishes
            .get(&id)
            .ok_or(StoreError::NotFound { entity: "dish", id })
    }

    fn type_name(&self, type_id: i32) -> &str {
        self.dish_types
            .get(&type_id)
            .map(|dish_type| dish_type.name.as_str())
            .unwrap_or_default()
    }

    fn sort_dishes(&self, dishes: &mut [Dish]) {
        dishes.sort_by(|a, b| {
            (folded(self.type_name(a.dish_type_id)), folded(&a.name))
                .cmp(&(folded(self.type_name(b.dish_type_id)), folded(&b.name)))
        });
    }

    fn check_dish_type_name(&self, name: &str, except: Option<i32>) -> Result<(), StoreError> {
        let taken = self
            .dish_types
            .values()
            .any(|dish_type| folded(&dish_type.name) == folded(name) && Some(dish_type.id) != except);
        if taken {
            return Err(StoreError::Duplicate {
                entity: "dish type",
                field: "name",
            });
        }
        Ok(())
    }

    fn check_username(&self, username: &str, except: Option<i32>) -> Result<(), StoreError> {
        let taken = self
            .cooks
            .values()
            .any(|(cook, _)| folded(&cook.username) == folded(username) && Some(cook.id) != except);
        if taken {
            return Err(StoreError::Duplicate {
                entity: "cook",
                field: "username",
            });
        }
        Ok(())
    }

    fn check_dish_references(&self, changes: &DishChanges) -> Result<(), StoreError> {
        let type_id = changes.dish.dish_type_id;
        if !self.dish_types.contains_key(&type_id) {
            return Err(StoreError::MissingReference {
                field: "dish_type",
                id: type_id,
            });
        }
        let wanted: BTreeSet<i32> = changes.cook_ids.iter().copied().collect();
        if let Some(missing) = wanted.iter().find(|id| !self.cooks.contains_key(id)) {
            return Err(StoreError::MissingReference {
                field: "cooks",
                id: *missing,
            });
        }
        Ok(())
    }

    fn write_dish(&mut self, id: i32, changes: &DishChanges) -> Dish {
        let dish = Dish {
            id,
            name: changes.dish.name.clone(),
            description: changes.dish.description.clone(),
            price: changes.dish.price,
            dish_type_id: changes.dish.dish_type_id,
        };
        self.dishes.insert(id, dish.clone());
        self.dish_cooks.retain(|(dish_id, _)| *dish_id != id);
        for cook_id in &changes.cook_ids {
            self.dish_cooks.insert((id, *cook_id));
        }
        dish
    }

    fn remove_dish(&mut self, id: i32) {
        self.dishes.remove(&id);
        self.dish_cooks.retain(|(dish_id, _)| *dish_id != id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Query("memory store lock poisoned".to_string()))
    }
}

fn count(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

impl KitchenStore for MemoryStore {
    fn counts(&self) -> Result<Counts, StoreError> {
        let tables = self.lock()?;
        Ok(Counts {
            num_dish_types: count(tables.dish_types.len()),
            num_dishes: count(tables.dishes.len()),
            num_cooks: count(tables.cooks.len()),
        })
    }

    fn list_dish_types(&self, filter: Option<&Prefix>) -> Result<Vec<DishType>, StoreError> {
        let tables = self.lock()?;
        let mut dish_types: Vec<DishType> = tables
            .dish_types
            .values()
            .filter(|dish_type| filter.map_or(true, |prefix| prefix.matches(&dish_type.name)))
            .cloned()
            .collect();
        dish_types.sort_by_key(|dish_type| folded(&dish_type.name));
        Ok(dish_types)
    }

    fn get_dish_type(&self, id: i32) -> Result<DishTypeDetail, StoreError> {
        let tables = self.lock()?;
        let dish_type = tables.dish_type(id)?.clone();
        let mut dishes: Vec<Dish> = tables
            .dishes
            .values()
            .filter(|dish| dish.dish_type_id == id)
            .cloned()
            .collect();
        dishes.sort_by_key(|dish| folded(&dish.name));
        Ok(DishTypeDetail { dish_type, dishes })
    }

    fn create_dish_type(&self, new: &NewDishType) -> Result<DishType, StoreError> {
        let mut tables = self.lock()?;
        tables.check_dish_type_name(&new.name, None)?;
        let id = tables.next_id();
        let dish_type = DishType {
            id,
            name: new.name.clone(),
        };
        tables.dish_types.insert(id, dish_type.clone());
        Ok(dish_type)
    }

    fn update_dish_type(&self, id: i32, changes: &NewDishType) -> Result<DishType, StoreError> {
        let mut tables = self.lock()?;
        tables.dish_type(id)?;
        tables.check_dish_type_name(&changes.name, Some(id))?;
        let dish_type = DishType {
            id,
            name: changes.name.clone(),
        };
        tables.dish_types.insert(id, dish_type.clone());
        Ok(dish_type)
    }

    fn delete_dish_type(&self, id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.dish_type(id)?;
        let doomed: Vec<i32> = tables
            .dishes
            .values()
            .filter(|dish| dish.dish_type_id == id)
            .map(|dish| dish.id)
            .collect();
        for dish_id in doomed {
            tables.remove_dish(dish_id);
        }
        tables.dish_types.remove(&id);
        Ok(())
    }

    fn list_dishes(&self, filter: Option<&Prefix>) -> Result<Vec<DishWithType>, StoreError> {
        let tables = self.lock()?;
        let mut dishes: Vec<Dish> = tables
            .dishes
            .values()
            .filter(|dish| filter.map_or(true, |prefix| prefix.matches(&dish.name)))
            .cloned()
            .collect();
        tables.sort_dishes(&mut dishes);
        dishes
            .into_iter()
            .map(|dish| {
                let dish_type = tables.dish_type(dish.dish_type_id)?.clone();
                Ok(DishWithType { dish, dish_type })
            })
            .collect()
    }

    fn get_dish(&self, id: i32) -> Result<DishDetail, StoreError> {
        let tables = self.lock()?;
        let dish = tables.dish(id)?.clone();
        let dish_type = tables.dish_type(dish.dish_type_id)?.clone();
        let cooks = tables
            .dish_cooks
            .iter()
            .filter(|(dish_id, _)| *dish_id == id)
            .map(|(_, cook_id)| tables.cook(*cook_id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DishDetail {
            dish,
            dish_type,
            cooks,
        })
    }

    fn create_dish(&self, changes: &DishChanges) -> Result<Dish, StoreError> {
        let mut tables = self.lock()?;
        tables.check_dish_references(changes)?;
        let id = tables.next_id();
        Ok(tables.write_dish(id, changes))
    }

    fn update_dish(&self, id: i32, changes: &DishChanges) -> Result<Dish, StoreError> {
        let mut tables = self.lock()?;
        tables.dish(id)?;
        tables.check_dish_references(changes)?;
        Ok(tables.write_dish(id, changes))
    }

    fn delete_dish(&self, id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.dish(id)?;
        tables.remove_dish(id);
        Ok(())
    }

    fn list_cooks(&self, filter: Option<&Prefix>) -> Result<Vec<Cook>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .cooks
            .values()
            .map(|(cook, _)| cook)
            .filter(|cook| filter.map_or(true, |prefix| prefix.matches(&cook.username)))
            .cloned()
            .collect())
    }

    fn get_cook(&self, id: i32) -> Result<CookDetail, StoreError> {
        let tables = self.lock()?;
        let cook = tables.cook(id)?.clone();
        let mut dishes = tables
            .dish_cooks
            .iter()
            .filter(|(_, cook_id)| *cook_id == id)
            .map(|(dish_id, _)| tables.dish(*dish_id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        tables.sort_dishes(&mut dishes);
        Ok(CookDetail { cook, dishes })
    }

    fn find_cook(&self, id: i32) -> Result<Cook, StoreError> {
        Ok(self.lock()?.cook(id)?.clone())
    }

    fn create_cook(&self, new: &NewCook) -> Result<Cook, StoreError> {
        let mut tables = self.lock()?;
        tables.check_username(&new.username, None)?;
        let id = tables.next_id();
        let cook = cook_from(id, new);
        tables.cooks.insert(id, (cook.clone(), new.password.clone()));
        Ok(cook)
    }

    fn update_cook(&self, id: i32, changes: &NewCook) -> Result<Cook, StoreError> {
        let mut tables = self.lock()?;
        tables.cook(id)?;
        tables.check_username(&changes.username, Some(id))?;
        let cook = cook_from(id, changes);
        tables
            .cooks
            .insert(id, (cook.clone(), changes.password.clone()));
        Ok(cook)
    }

    fn delete_cook(&self, id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.cook(id)?;
        tables.cooks.remove(&id);
        tables.dish_cooks.retain(|(_, cook_id)| *cook_id != id);
        Ok(())
    }

    fn find_credentials(&self, username: &str) -> Result<Option<CookCredentials>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .cooks
            .values()
            .find(|(cook, _)| folded(&cook.username) == folded(username))
            .map(|(cook, password_hash)| CookCredentials {
                id: cook.id,
                password_hash: password_hash.clone(),
            }))
    }

    fn assign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.dish(dish_id)?;
        tables.cook(cook_id)?;
        tables.dish_cooks.insert((dish_id, cook_id));
        Ok(())
    }

    fn unassign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.dish(dish_id)?;
        tables.cook(cook_id)?;
        tables.dish_cooks.remove(&(dish_id, cook_id));
        Ok(())
    }

    fn is_assigned(&self, dish_id: i32, cook_id: i32) -> Result<bool, StoreError> {
        let tables = self.lock()?;
        tables.dish(dish_id)?;
        tables.cook(cook_id)?;
        Ok(tables.dish_cooks.contains(&(dish_id, cook_id)))
    }
}

fn cook_from(id: i32, new: &NewCook) -> Cook {
    Cook {
        id,
        username: new.username.clone(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        years_of_experience: new.years_of_experience,
    }
}
