#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::db::{
        NewPackage, add_availability_slot, create_package, create_subscription, create_user,
    };
    use crate::error::AppError;
    use crate::models::NewAvailability;
    use chrono::{NaiveTime, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        packages: Vec<TestPackage>,
        subscriptions: Vec<TestSubscription>,
        availability: Vec<TestAvailability>,
    }

    pub struct TestUser {
        pub username: String,
        pub display_name: Option<String>,
        pub email: Option<String>,
        pub role: Role,
        pub password: String,
    }

    pub struct TestPackage {
        pub name: String,
        pub session_count: i64,
        pub duration_days: i64,
        pub price: f64,
    }

    pub struct TestSubscription {
        pub student_username: String,
        pub coach_username: String,
        pub package_name: String,
    }

    pub struct TestAvailability {
        pub coach_username: String,
        pub day_of_week: u8,
        pub start_time: String,
        pub end_time: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, username: &str, display_name: Option<&str>, role: Role) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                display_name: display_name.map(String::from),
                email: None,
                role,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn student(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Student)
        }

        pub fn coach(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Coach)
        }

        pub fn admin(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Admin)
        }

        /// Sets the email of the most recently added user.
        pub fn with_email(mut self, email: &str) -> Self {
            if let Some(user) = self.users.last_mut() {
                user.email = Some(email.to_string());
            }
            self
        }

        pub fn package(
            mut self,
            name: &str,
            session_count: i64,
            duration_days: i64,
            price: f64,
        ) -> Self {
            self.packages.push(TestPackage {
                name: name.to_string(),
                session_count,
                duration_days,
                price,
            });
            self
        }

        pub fn subscription(mut self, student: &str, coach: &str, package: &str) -> Self {
            self.subscriptions.push(TestSubscription {
                student_username: student.to_string(),
                coach_username: coach.to_string(),
                package_name: package.to_string(),
            });
            self
        }

        pub fn availability(mut self, coach: &str, day_of_week: u8, start: &str, end: &str) -> Self {
            self.availability.push(TestAvailability {
                coach_username: coach.to_string(),
                day_of_week,
                start_time: start.to_string(),
                end_time: end.to_string(),
            });
            self
        }

        /// The same window on every day of the week.
        pub fn daily_availability(self, coach: &str, start: &str, end: &str) -> Self {
            (0..7).fold(self, |builder, day| {
                builder.availability(coach, day, start, end)
            })
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = crate::env::load_test_environment();
                let _ = env_logger::Builder::from_env(
                    env_logger::Env::default().default_filter_or("debug"),
                )
                .is_test(true)
                .try_init();
            });

            // A second connection to `sqlite::memory:` would open a separate, empty database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut package_id_map: HashMap<String, i64> = HashMap::new();
            let mut subscription_ids = Vec::new();

            for user in &self.users {
                let user_id = create_user(
                    &pool,
                    &user.username,
                    &user.password,
                    user.role.as_str(),
                    user.display_name.as_deref(),
                    user.email.as_deref(),
                )
                .await?;

                user_id_map.insert(user.username.clone(), user_id);
            }

            for package in &self.packages {
                let package_id = create_package(
                    &pool,
                    &NewPackage {
                        name: package.name.clone(),
                        description: None,
                        session_count: package.session_count,
                        duration_days: package.duration_days,
                        price: package.price,
                        is_popular: false,
                        features: Vec::new(),
                    },
                )
                .await?;

                package_id_map.insert(package.name.clone(), package_id);
            }

            for row in &self.availability {
                let coach_id = lookup(&user_id_map, &row.coach_username)?;
                let slot = NewAvailability {
                    day_of_week: row.day_of_week,
                    start_time: parse_time(&row.start_time)?,
                    end_time: parse_time(&row.end_time)?,
                    is_available: true,
                };
                add_availability_slot(&pool, coach_id, &slot).await?;
            }

            for sub in &self.subscriptions {
                let student_id = lookup(&user_id_map, &sub.student_username)?;
                let coach_id = lookup(&user_id_map, &sub.coach_username)?;
                let package_id = lookup(&package_id_map, &sub.package_name)?;

                let subscription = create_subscription(
                    &pool,
                    student_id,
                    coach_id,
                    package_id,
                    Utc::now().naive_utc(),
                )
                .await?;

                subscription_ids.push(subscription.id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                package_id_map,
                subscription_ids,
            })
        }
    }

    fn lookup(map: &HashMap<String, i64>, key: &str) -> Result<i64, AppError> {
        map.get(key)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("No test fixture named '{}'", key)))
    }

    fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .map_err(|e| AppError::Validation(format!("Bad fixture time '{}': {}", raw, e)))
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub package_id_map: HashMap<String, i64>,
        pub subscription_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn package_id(&self, name: &str) -> Option<i64> {
            self.package_id_map.get(name).copied()
        }

        /// Subscriptions in the order they were added to the builder.
        pub fn subscription_id(&self, index: usize) -> Option<i64> {
            self.subscription_ids.get(index).copied()
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    use super::test_db::{TestDb, TestDbBuilder};
    use crate::auth::SESSION_COOKIE;
    use crate::config::AppConfig;
    use crate::init_rocket;
    use crate::mailer::{MailError, Mailer, OutgoingEmail, SharedMailer};

    /// Keeps every email instead of sending it.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        failing: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }
    }

    #[rocket::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            if self.failing {
                return Err(MailError::Build("recording mailer set to fail".to_string()));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email.clone());
            }
            Ok(())
        }
    }

    /// Student `student_user`, coach `coach_user` (09:00-17:00 every day),
    /// admin `admin_user`, and one 4-session subscription between the first two.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .student("student_user", Some("Student User"))
            .with_email("student@example.com")
            .coach("coach_user", Some("Coach User"))
            .with_email("coach@example.com")
            .admin("admin_user", Some("Admin User"))
            .package("Starter", 4, 30, 1200.0)
            .daily_availability("coach_user", "09:00", "17:00")
            .subscription("student_user", "coach_user", "Starter")
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: &TestDb) -> (Client, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let client = setup_test_client_with_mailer(test_db, mailer.clone()).await;
        (client, mailer)
    }

    pub async fn setup_test_client_with_mailer(test_db: &TestDb, mailer: SharedMailer) -> Client {
        let rocket = init_rocket(test_db.pool.clone(), AppConfig::default(), mailer);
        Client::untracked(rocket)
            .await
            .expect("Failed to create test client")
    }

    /// Logs in and returns the private session cookie to attach to later requests.
    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> Cookie<'static> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .get_private(SESSION_COOKIE)
            .expect("Login did not set a session cookie")
    }

    /// A future datetime on the hour, inside the standard 09:00-17:00 availability.
    pub fn future_slot(days_ahead: i64, hour: u32) -> NaiveDateTime {
        let date = (Utc::now() + Duration::days(days_ahead)).date_naive();
        date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour"))
    }

    pub fn format_datetime(value: NaiveDateTime) -> String {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
