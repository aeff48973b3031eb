//! Workout catalog: the built-in workouts and user edits to them.
//!
//! The catalog is stored under [`CATALOG_KEY`]. Editing it never touches a
//! running session; a resumed snapshot is re-checked against the catalog.

use crate::store::{KeyValueStore, CATALOG_KEY, SESSION_KEY};
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Cached default catalog - built once so exercise ids stay stable per process
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn exercise(name: &str, sets: u32, reps: &str, weight: Option<&str>) -> Exercise {
    Exercise {
        id: Uuid::new_v4().to_string(),
        name: name.into(),
        sets,
        reps: reps.into(),
        weight: weight.map(Into::into),
    }
}

/// Builds the default catalog of bodyweight splits
pub fn build_default_catalog() -> Catalog {
    let mut workouts = BTreeMap::new();

    workouts.insert(
        "chest-biceps".into(),
        Workout {
            title: "Chest + Biceps".into(),
            exercises: vec![
                exercise("Pseudo Planche Push-Ups", 4, "8-12 reps", None),
                exercise("Archer Push-Ups", 3, "6 reps each side", None),
                exercise("Explosive Decline Push-Ups", 3, "8-10 reps", None),
                exercise("Deep Push-Ups", 3, "10-15 reps", None),
                exercise("Weighted Chin-Ups", 4, "5-8 reps", Some("Bodyweight")),
                exercise("Incline Dumbbell Curls", 3, "8-12 reps", Some("15 lbs")),
                exercise("Dumbbell Hammer Curls", 3, "10-12 reps", Some("20 lbs")),
                exercise("Barbell Curls", 3, "6-10 reps", Some("40 lbs")),
                exercise("Concentration Curls", 2, "12-15 reps", Some("15 lbs")),
            ],
        },
    );

    workouts.insert(
        "back-shoulders".into(),
        Workout {
            title: "Back + Shoulders".into(),
            exercises: vec![
                exercise("Pull-Ups", 4, "Max reps", None),
                exercise("Australian Rows", 3, "12-15 reps", None),
                exercise("Chin-Ups", 3, "8-10 reps", None),
                exercise("Archer Pull-Ups", 3, "6 reps each side", None),
                exercise("Superman Holds", 3, "30 sec hold", None),
                exercise("Pike Push-Ups", 4, "10-12 reps", None),
                exercise("Wall Handstand Hold", 3, "30-60 sec hold", None),
                exercise("Wall Handstand Push-Ups", 4, "4-6 reps", None),
                exercise("Pseudo Planche Push-Ups", 3, "10-12 reps", None),
                exercise("Tuck Planche Hold", 3, "Max hold", None),
            ],
        },
    );

    workouts.insert(
        "triceps-abs".into(),
        Workout {
            title: "Triceps + Abs".into(),
            exercises: vec![
                exercise("Diamond Push-Ups", 4, "10-15 reps", None),
                exercise("Close-Grip Push-Ups", 3, "10-12 reps", None),
                exercise("Bench Dips", 3, "12-15 reps", None),
                exercise("Bodyweight Tricep Extensions", 3, "8-12 reps", None),
                exercise("Triceps Burnout Circuit", 3, "10 reps each exercise", None),
                exercise("Hanging Leg Raises", 3, "10-15 reps", None),
                exercise("Lying Leg Raises", 3, "15 reps", None),
                exercise("Hollow Body Hold", 3, "30 sec hold", None),
                exercise("Russian Twists", 3, "20 reps", None),
                exercise("Plank-to-Elbow Touch", 3, "12 reps each side", None),
            ],
        },
    );

    Catalog { workouts }
}

/// Field changes for a single exercise; `None` leaves a field untouched
#[derive(Clone, Debug, Default)]
pub struct ExerciseEdit {
    pub name: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<String>,
    /// `Some("")` clears the weight
    pub weight: Option<String>,
}

impl Catalog {
    /// Load the catalog from the store
    ///
    /// A missing catalog is seeded with the defaults. A corrupted one is
    /// logged and replaced by the defaults in memory.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(contents) = store.get(CATALOG_KEY)? else {
            tracing::info!("No catalog stored, seeding defaults");
            let catalog = get_default_catalog().clone();
            if let Err(e) = catalog.save(store) {
                tracing::warn!("Failed to seed default catalog: {}", e);
            }
            return Ok(catalog);
        };

        match serde_json::from_str::<Catalog>(&contents) {
            Ok(catalog) => Ok(catalog),
            Err(e) => {
                tracing::warn!("Failed to parse stored catalog: {}. Using defaults.", e);
                Ok(get_default_catalog().clone())
            }
        }
    }

    /// Save the catalog to the store
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let contents = serde_json::to_string(self)?;
        store.set(CATALOG_KEY, &contents)
    }

    pub fn get(&self, workout_type: &str) -> Option<&Workout> {
        self.workouts.get(workout_type)
    }

    /// Apply an edit to one exercise of one workout
    pub fn update_exercise(
        &mut self,
        workout_type: &str,
        exercise_id: &str,
        edit: ExerciseEdit,
    ) -> Result<&Exercise> {
        let workout = self
            .workouts
            .get_mut(workout_type)
            .ok_or_else(|| Error::UnknownWorkout(workout_type.to_string()))?;

        let exercise = workout
            .exercises
            .iter_mut()
            .find(|e| e.id == exercise_id)
            .ok_or_else(|| {
                Error::Catalog(format!(
                    "Workout '{}' has no exercise '{}'",
                    workout_type, exercise_id
                ))
            })?;

        if edit.sets == Some(0) {
            return Err(Error::Catalog("An exercise needs at least one set".into()));
        }
        if let Some(name) = &edit.name {
            if name.trim().is_empty() {
                return Err(Error::Catalog("Exercise name cannot be empty".into()));
            }
        }

        if let Some(name) = edit.name {
            exercise.name = name;
        }
        if let Some(sets) = edit.sets {
            exercise.sets = sets;
        }
        if let Some(reps) = edit.reps {
            exercise.reps = reps;
        }
        if let Some(weight) = edit.weight {
            exercise.weight = if weight.trim().is_empty() {
                None
            } else {
                Some(weight)
            };
        }

        tracing::info!("Updated exercise {} in {}", exercise.id, workout_type);
        Ok(exercise)
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, workout) in &self.workouts {
            if key.is_empty() {
                errors.push("Workout has empty type key".to_string());
            }
            if workout.title.is_empty() {
                errors.push(format!("Workout '{}' has empty title", key));
            }
            if workout.exercises.is_empty() {
                errors.push(format!("Workout '{}' has no exercises", key));
            }

            let mut seen = HashSet::new();
            for exercise in &workout.exercises {
                if exercise.id.is_empty() {
                    errors.push(format!("Workout '{}' has an exercise with empty id", key));
                } else if !seen.insert(exercise.id.as_str()) {
                    errors.push(format!(
                        "Workout '{}' has duplicate exercise id '{}'",
                        key, exercise.id
                    ));
                }
                if exercise.name.is_empty() {
                    errors.push(format!("Workout '{}' has an unnamed exercise", key));
                }
                if exercise.sets == 0 {
                    errors.push(format!(
                        "Workout '{}': exercise '{}' has zero sets",
                        key, exercise.name
                    ));
                }
            }
        }

        errors
    }
}

/// Restore the default catalog and drop any in-progress session
pub fn reset_to_defaults(store: &dyn KeyValueStore) -> Result<Catalog> {
    let catalog = build_default_catalog();
    catalog.save(store)?;
    store.remove(SESSION_KEY)?;
    tracing::info!("Catalog reset to defaults");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.workouts.len(), 3);
        assert_eq!(catalog.get("chest-biceps").unwrap().exercises.len(), 9);
        assert_eq!(catalog.get("back-shoulders").unwrap().exercises.len(), 10);
    }

    #[test]
    fn test_default_catalog_validates() {
        let errors = get_default_catalog().validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut catalog = build_default_catalog();
        let workout = catalog.workouts.get_mut("triceps-abs").unwrap();
        workout.exercises[0].sets = 0;
        let dup = workout.exercises[1].id.clone();
        workout.exercises[2].id = dup;
        catalog.workouts.insert(
            "empty".into(),
            Workout {
                title: "Empty".into(),
                exercises: vec![],
            },
        );

        let errors = catalog.validate();
        assert_eq!(errors.len(), 3, "{:?}", errors);
    }

    #[test]
    fn test_load_seeds_defaults() {
        let store = MemoryStore::new();
        let catalog = Catalog::load(&store).unwrap();

        assert_eq!(catalog.workouts.len(), 3);
        let stored = store.get(CATALOG_KEY).unwrap().unwrap();
        let reloaded: Catalog = serde_json::from_str(&stored).unwrap();
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn test_corrupted_catalog_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.set(CATALOG_KEY, "{ invalid json }").unwrap();

        let catalog = Catalog::load(&store).unwrap();
        assert_eq!(catalog.workouts.len(), 3);
    }

    #[test]
    fn test_update_exercise() {
        let store = MemoryStore::new();
        let mut catalog = Catalog::load(&store).unwrap();
        let id = catalog.get("chest-biceps").unwrap().exercises[5].id.clone();

        let updated = catalog
            .update_exercise(
                "chest-biceps",
                &id,
                ExerciseEdit {
                    sets: Some(5),
                    weight: Some("".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.sets, 5);
        assert_eq!(updated.weight, None);
        assert_eq!(updated.name, "Incline Dumbbell Curls");

        catalog.save(&store).unwrap();
        let reloaded = Catalog::load(&store).unwrap();
        assert_eq!(reloaded.get("chest-biceps").unwrap().exercises[5].sets, 5);
    }

    #[test]
    fn test_update_exercise_rejects_zero_sets() {
        let mut catalog = build_default_catalog();
        let id = catalog.get("triceps-abs").unwrap().exercises[0].id.clone();

        let result = catalog.update_exercise(
            "triceps-abs",
            &id,
            ExerciseEdit {
                sets: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Catalog(_))));
        assert_eq!(catalog.get("triceps-abs").unwrap().exercises[0].sets, 4);
    }

    #[test]
    fn test_update_unknown_workout() {
        let mut catalog = build_default_catalog();
        let result = catalog.update_exercise("legs", "x", ExerciseEdit::default());
        assert!(matches!(result, Err(Error::UnknownWorkout(_))));
    }

    #[test]
    fn test_reset_to_defaults_clears_session() {
        let store = MemoryStore::new();
        store.set(SESSION_KEY, "{}").unwrap();
        store.set(CATALOG_KEY, "{}").unwrap();

        let catalog = reset_to_defaults(&store).unwrap();
        assert_eq!(catalog.workouts.len(), 3);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }
}
