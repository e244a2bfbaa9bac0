use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{hash_password, UserRole};
use crate::models::{MuscleGroup, RoutineExercise};
use crate::services::{ExerciseService, RoutineService};

pub const DEMO_EMAIL: &str = "demo@routine-coach.app";
pub const DEMO_PASSWORD: &str = "DemoLift#2024";

const STARTER_EXERCISES: &[(&str, MuscleGroup, Option<&str>)] = &[
    ("Barbell Back Squat", MuscleGroup::Legs, Some("barbell")),
    ("Romanian Deadlift", MuscleGroup::Legs, Some("barbell")),
    ("Bench Press", MuscleGroup::Chest, Some("barbell")),
    ("Push-Up", MuscleGroup::Chest, None),
    ("Pull-Up", MuscleGroup::Back, Some("pull-up bar")),
    ("Bent-Over Row", MuscleGroup::Back, Some("barbell")),
    ("Overhead Press", MuscleGroup::Shoulders, Some("barbell")),
    ("Dumbbell Curl", MuscleGroup::Arms, Some("dumbbells")),
    ("Plank", MuscleGroup::Core, None),
    ("Rowing Machine", MuscleGroup::Cardio, Some("rower")),
];

/// (exercise name, sets, reps, weight, rest seconds)
const STARTER_ROUTINE: &[(&str, i32, i32, Option<f64>, i32)] = &[
    ("Barbell Back Squat", 3, 5, Some(60.0), 180),
    ("Bench Press", 3, 5, Some(50.0), 180),
    ("Bent-Over Row", 3, 8, Some(40.0), 120),
    ("Plank", 3, 1, None, 60),
];

/// Demo account with a starter library; safe to run on every start
pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        let user_id = self.seed_demo_user().await?;
        self.seed_exercises(user_id).await?;
        self.seed_routine(user_id).await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_demo_user(&self) -> Result<Uuid> {
        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(DEMO_EMAIL)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let password_hash = hash_password(DEMO_PASSWORD).context("hashing demo password")?;
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(id)
        .bind(DEMO_EMAIL)
        .bind("Demo Lifter")
        .bind(password_hash)
        .bind(UserRole::User.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::info!("Created demo user {}", DEMO_EMAIL);
        Ok(id)
    }

    async fn seed_exercises(&self, user_id: Uuid) -> Result<()> {
        let exercise_service = ExerciseService::new(self.pool.clone());

        for (name, muscle_group, equipment) in STARTER_EXERCISES {
            let exercise = exercise_service
                .find_or_create(user_id, name, *muscle_group)
                .await?;

            if exercise.equipment.is_none() {
                if let Some(equipment) = equipment {
                    sqlx::query("UPDATE exercises SET equipment = $2 WHERE id = $1")
                        .bind(exercise.id)
                        .bind(*equipment)
                        .execute(&self.pool)
                        .await?;
                }
            }
        }

        tracing::info!("Seeded {} starter exercises", STARTER_EXERCISES.len());
        Ok(())
    }

    async fn seed_routine(&self, user_id: Uuid) -> Result<()> {
        let routine_service = RoutineService::new(self.pool.clone());
        if !routine_service.list_routines(user_id).await?.is_empty() {
            return Ok(());
        }

        let exercise_service = ExerciseService::new(self.pool.clone());
        let mut exercises = Vec::with_capacity(STARTER_ROUTINE.len());
        for (name, sets, reps, weight, rest_seconds) in STARTER_ROUTINE {
            let exercise = exercise_service
                .find_by_name(user_id, name)
                .await?
                .with_context(|| format!("starter exercise {} is missing", name))?;

            exercises.push(RoutineExercise {
                exercise_id: exercise.id,
                exercise_name: exercise.name,
                muscle_group: exercise.muscle_group,
                sets: *sets,
                reps: *reps,
                weight: *weight,
                rest_seconds: *rest_seconds,
                notes: None,
            });
        }

        let routine = routine_service
            .insert_routine(
                user_id,
                "Full Body Strength",
                Some("Three compound lifts and a core finisher"),
                exercises,
            )
            .await?;

        tracing::info!("Created demo routine {}", routine.id);
        Ok(())
    }
}
