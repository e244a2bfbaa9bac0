// Service-level tests against a live PostgreSQL; each test skips when none is reachable
mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::{MockDataGenerator, TestDatabase, TEST_PASSWORD};
use routine_coach::auth::{AuthError, AuthService, LoginRequest};
use routine_coach::models::{
    CompleteSession, CreateExercise, CreateRoutine, MuscleGroup, RoutineExerciseInput,
    SessionStatus, StartRestTimer, StartSession, UpdateExercise, UpdateRoutine, UpdateSet,
};
use routine_coach::services::{
    EmailService, ExerciseService, RoutineService, ShareService, StatsService,
    TrainingSessionService,
};
use routine_coach::ApiError;

async fn new_user(db: &TestDatabase, name: &str) -> Uuid {
    let auth = AuthService::new(db.pool.clone(), "integration-secret", EmailService::disabled());
    auth.register(MockDataGenerator::register_request(name))
        .await
        .expect("registration succeeds")
        .user
        .id
}

async fn squat_routine(db: &TestDatabase, user_id: Uuid) -> (Uuid, Uuid) {
    let exercise = ExerciseService::new(db.pool.clone())
        .create_exercise(
            user_id,
            CreateExercise {
                name: "Front Squat".to_string(),
                muscle_group: MuscleGroup::Legs,
                equipment: Some("barbell".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();

    let routine = RoutineService::new(db.pool.clone())
        .create_routine(
            user_id,
            CreateRoutine {
                name: "Leg Day".to_string(),
                description: Some("Squat focus".to_string()),
                exercises: vec![RoutineExerciseInput {
                    exercise_id: exercise.id,
                    sets: 3,
                    reps: 5,
                    weight: Some(80.0),
                    rest_seconds: 120,
                    notes: None,
                }],
            },
        )
        .await
        .unwrap();

    (exercise.id, routine.id)
}

#[tokio::test]
async fn test_register_and_login() {
    let Some(db) = TestDatabase::connect().await else { return };
    let auth = AuthService::new(db.pool.clone(), "integration-secret", EmailService::disabled());

    let request = MockDataGenerator::register_request("Alex");
    let email = request.email.clone();
    let registered = auth.register(request.clone()).await.unwrap();
    assert_eq!(registered.user.email, email);

    assert_matches!(auth.register(request).await, Err(AuthError::EmailAlreadyExists));

    let login = auth
        .login(LoginRequest { email: email.to_uppercase(), password: TEST_PASSWORD.to_string() })
        .await
        .unwrap();
    assert_eq!(login.user.id, registered.user.id);

    let wrong = auth
        .login(LoginRequest { email, password: "Wr0ng!Pass".to_string() })
        .await;
    assert_matches!(wrong, Err(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_referenced_exercise_cannot_be_deleted() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Riley").await;
    let (exercise_id, routine_id) = squat_routine(&db, user_id).await;

    let exercises = ExerciseService::new(db.pool.clone());
    assert_matches!(
        exercises.delete_exercise(user_id, exercise_id).await,
        Err(ApiError::Conflict(_))
    );

    RoutineService::new(db.pool.clone())
        .delete_routine(user_id, routine_id)
        .await
        .unwrap();
    exercises.delete_exercise(user_id, exercise_id).await.unwrap();
}

#[tokio::test]
async fn test_routines_are_private_to_their_owner() {
    let Some(db) = TestDatabase::connect().await else { return };
    let owner = new_user(&db, "Owner").await;
    let stranger = new_user(&db, "Stranger").await;
    let (_, routine_id) = squat_routine(&db, owner).await;

    let routines = RoutineService::new(db.pool.clone());
    assert_matches!(
        routines.get_routine(stranger, routine_id).await,
        Err(ApiError::NotFound(_))
    );
}

#[tokio::test]
async fn test_duplicate_routine_starts_fresh() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Jordan").await;
    let (_, routine_id) = squat_routine(&db, user_id).await;

    let sessions = TrainingSessionService::new(db.pool.clone());
    sessions
        .start_session(user_id, StartSession { routine_id: Some(routine_id), ..Default::default() })
        .await
        .unwrap();

    let routines = RoutineService::new(db.pool.clone());
    let copy = routines.duplicate_routine(user_id, routine_id).await.unwrap();
    let original = routines.get_routine(user_id, routine_id).await.unwrap();

    assert_ne!(copy.id, original.id);
    assert_eq!(copy.usage_count, 0);
    assert_eq!(original.usage_count, 1);
    assert_eq!(copy.exercises.0, original.exercises.0);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Casey").await;
    let (_, routine_id) = squat_routine(&db, user_id).await;

    let sessions = TrainingSessionService::new(db.pool.clone());
    let session = sessions
        .start_session(user_id, StartSession { routine_id: Some(routine_id), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(session.name, "Leg Day");
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.exercises[0].sets.len(), 3);

    let usage = RoutineService::new(db.pool.clone())
        .list_usage(user_id, routine_id)
        .await
        .unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].session_id, Some(session.id));

    let updated = sessions
        .update_set(
            user_id,
            session.id,
            0,
            1,
            UpdateSet { reps: Some(5), weight: Some(82.5), completed: Some(true) },
        )
        .await
        .unwrap();
    assert_eq!(updated.exercises[0].sets[1].reps, Some(5));
    assert!(updated.exercises[0].sets[1].completed);

    assert_matches!(
        sessions
            .update_set(user_id, session.id, 0, 9, UpdateSet::default())
            .await,
        Err(ApiError::NotFound("Set"))
    );

    let completed = sessions
        .complete_session(user_id, session.id, CompleteSession { notes: Some("Felt strong".to_string()) })
        .await
        .unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed.duration_seconds.is_some());

    assert_matches!(
        sessions
            .complete_session(user_id, session.id, CompleteSession::default())
            .await,
        Err(ApiError::Conflict(_))
    );

    let stats = StatsService::new(sessions.clone()).user_stats(user_id).await.unwrap();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.current_streak, 1);
    assert!((stats.total_volume - 5.0 * 82.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_share_and_import() {
    let Some(db) = TestDatabase::connect().await else { return };
    let owner = new_user(&db, "Morgan").await;
    let importer = new_user(&db, "Taylor").await;
    let (_, routine_id) = squat_routine(&db, owner).await;

    let shares = ShareService::new(db.pool.clone());
    let shared = shares.share_routine(owner, routine_id).await.unwrap();
    assert_eq!(shared.code.len(), 6);

    let again = shares.share_routine(owner, routine_id).await.unwrap();
    assert_eq!(again.code, shared.code);

    let found = shares.get_shared(&shared.code.to_lowercase()).await.unwrap();
    assert_eq!(found.routine_id, routine_id);

    let imported = shares.import_shared(importer, &shared.code).await.unwrap();
    assert_eq!(imported.user_id, importer);
    assert_eq!(imported.name, "Leg Day");
    assert_ne!(imported.exercises[0].exercise_id, found.exercises[0].exercise_id);

    let after = shares.get_shared(&shared.code).await.unwrap();
    assert_eq!(after.import_count, 1);

    shares.unshare_routine(owner, routine_id).await.unwrap();
    assert_matches!(
        shares.get_shared(&shared.code).await,
        Err(ApiError::NotFound(_))
    );
}

fn press(name: &str) -> CreateExercise {
    CreateExercise {
        name: name.to_string(),
        muscle_group: MuscleGroup::Shoulders,
        equipment: Some("dumbbells".to_string()),
        description: Some("Seated".to_string()),
    }
}

#[tokio::test]
async fn test_duplicate_exercise_name_is_a_conflict() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Quinn").await;
    let exercises = ExerciseService::new(db.pool.clone());

    exercises.create_exercise(user_id, press("Arnold Press")).await.unwrap();
    assert_matches!(
        exercises.create_exercise(user_id, press("arnold PRESS")).await,
        Err(ApiError::Conflict(_))
    );

    let other = exercises.create_exercise(user_id, press("Z Press")).await.unwrap();
    let rename = UpdateExercise { name: Some("Arnold Press".to_string()), ..Default::default() };
    assert_matches!(
        exercises.update_exercise(user_id, other.id, rename).await,
        Err(ApiError::Conflict(_))
    );
}

#[tokio::test]
async fn test_concurrent_creates_with_same_name() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Harper").await;
    let exercises = ExerciseService::new(db.pool.clone());

    for round in 0..10 {
        let name = format!("Landmine Press {}", round);
        let (first, second) = tokio::join!(
            exercises.create_exercise(user_id, press(&name)),
            exercises.create_exercise(user_id, press(&name)),
        );

        let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1, "round {}", round);
        for result in [first, second] {
            assert!(
                matches!(result, Ok(_) | Err(ApiError::Conflict(_))),
                "round {}: {:?}",
                round,
                result.err()
            );
        }
    }

    let (a, b) = tokio::join!(
        exercises.find_or_create(user_id, "Sled Push", MuscleGroup::Legs),
        exercises.find_or_create(user_id, "sled push", MuscleGroup::Legs),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
}

#[tokio::test]
async fn test_rename_propagates_into_routines() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Emerson").await;
    let (exercise_id, routine_id) = squat_routine(&db, user_id).await;

    let exercises = ExerciseService::new(db.pool.clone());
    exercises
        .update_exercise(
            user_id,
            exercise_id,
            UpdateExercise {
                name: Some("Goblet Squat".to_string()),
                muscle_group: Some(MuscleGroup::FullBody),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let routine = RoutineService::new(db.pool.clone())
        .get_routine(user_id, routine_id)
        .await
        .unwrap();
    assert_eq!(routine.exercises[0].exercise_name, "Goblet Squat");
    assert_eq!(routine.exercises[0].muscle_group, MuscleGroup::FullBody);
    assert_eq!(routine.exercises[0].sets, 3);
}

#[tokio::test]
async fn test_empty_string_clears_optional_text() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Rowan").await;
    let (exercise_id, routine_id) = squat_routine(&db, user_id).await;

    let exercises = ExerciseService::new(db.pool.clone());
    let untouched = exercises
        .update_exercise(user_id, exercise_id, UpdateExercise::default())
        .await
        .unwrap();
    assert_eq!(untouched.equipment.as_deref(), Some("barbell"));

    let cleared = exercises
        .update_exercise(
            user_id,
            exercise_id,
            UpdateExercise { equipment: Some(String::new()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(cleared.equipment, None);

    let routine = RoutineService::new(db.pool.clone())
        .update_routine(
            user_id,
            routine_id,
            UpdateRoutine { description: Some("  ".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(routine.description, None);
    assert_eq!(routine.name, "Leg Day");
}

#[tokio::test]
async fn test_rest_timer_lifecycle() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Avery").await;
    let (_, routine_id) = squat_routine(&db, user_id).await;

    let sessions = TrainingSessionService::new(db.pool.clone());
    let session = sessions
        .start_session(user_id, StartSession { routine_id: Some(routine_id), ..Default::default() })
        .await
        .unwrap();

    assert_matches!(
        sessions.rest_timer_status(user_id, session.id).await,
        Err(ApiError::NotFound("Rest timer"))
    );

    // defaults to the routine exercise's rest
    let started = sessions
        .start_rest_timer(user_id, session.id, StartRestTimer::default())
        .await
        .unwrap();
    assert_eq!(started.duration_seconds, 120);

    let status = sessions.rest_timer_status(user_id, session.id).await.unwrap();
    assert!(status.remaining_seconds <= 120 && status.remaining_seconds > 0);
    assert!(!status.finished);

    sessions.clear_rest_timer(user_id, session.id).await.unwrap();
    assert_matches!(
        sessions.rest_timer_status(user_id, session.id).await,
        Err(ApiError::NotFound("Rest timer"))
    );

    sessions
        .start_rest_timer(user_id, session.id, StartRestTimer { duration_seconds: Some(45) })
        .await
        .unwrap();
    let completed = sessions
        .complete_session(user_id, session.id, CompleteSession::default())
        .await
        .unwrap();
    assert!(completed.rest_timer.is_none());

    assert_matches!(
        sessions
            .start_rest_timer(user_id, session.id, StartRestTimer::default())
            .await,
        Err(ApiError::Conflict(_))
    );
    assert_matches!(
        sessions
            .update_set(user_id, session.id, 0, 0, UpdateSet { reps: Some(5), ..Default::default() })
            .await,
        Err(ApiError::Conflict(_))
    );
}

#[tokio::test]
async fn test_deleting_routine_keeps_its_sessions() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user_id = new_user(&db, "Blake").await;
    let (_, routine_id) = squat_routine(&db, user_id).await;

    let sessions = TrainingSessionService::new(db.pool.clone());
    let session = sessions
        .start_session(user_id, StartSession { routine_id: Some(routine_id), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(session.routine_id, Some(routine_id));

    RoutineService::new(db.pool.clone())
        .delete_routine(user_id, routine_id)
        .await
        .unwrap();

    let orphaned = sessions.get_session(user_id, session.id).await.unwrap();
    assert_eq!(orphaned.routine_id, None);
    assert_eq!(orphaned.name, "Leg Day");
    assert_eq!(orphaned.exercises.len(), 1);
}
