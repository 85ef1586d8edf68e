#[cfg(test)]
mod tests {
    use crate::api::SubscriptionResponse;
    use crate::run_maintenance;
    use crate::coaching::SubscriptionStatus;
    use crate::db::{
        cancel_subscription, create_subscription, expire_subscriptions, get_coach_subscriptions,
        get_student_subscriptions, get_subscription, set_package_active,
    };
    use crate::error::AppError;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::{create_standard_test_db, login_test_user, setup_test_client};
    use chrono::{Duration, Utc};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn test_purchase_copies_package_terms() {
        let test_db = create_standard_test_db().await;
        let subscription = get_subscription(&test_db.pool, test_db.subscription_id(0).unwrap())
            .await
            .expect("Failed to load subscription");

        assert_eq!(subscription.total_sessions, 4);
        assert_eq!(subscription.remaining_sessions, 4);
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.purchase_price, 1200.0);
        assert_eq!(
            (subscription.end_date - subscription.start_date).num_days(),
            30
        );
        assert_eq!(subscription.progress(), 0);
        assert!(subscription.is_active(Utc::now().naive_utc()));
    }

    #[rocket::async_test]
    async fn test_purchase_requires_active_package_and_coach() {
        let test_db = TestDbBuilder::new()
            .student("student_user", None)
            .student("not_a_coach", None)
            .coach("coach_user", None)
            .package("Starter", 4, 30, 1200.0)
            .build()
            .await
            .expect("Failed to build test database");
        let student_id = test_db.user_id("student_user").unwrap();
        let coach_id = test_db.user_id("coach_user").unwrap();
        let package_id = test_db.package_id("Starter").unwrap();
        let now = Utc::now().naive_utc();

        let result = create_subscription(
            &test_db.pool,
            student_id,
            test_db.user_id("not_a_coach").unwrap(),
            package_id,
            now,
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        set_package_active(&test_db.pool, package_id, false)
            .await
            .expect("Failed to retire package");
        let result = create_subscription(&test_db.pool, student_id, coach_id, package_id, now).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = create_subscription(&test_db.pool, student_id, coach_id, 9999, now).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_expire_subscriptions_only_touches_past_due() {
        let test_db = create_standard_test_db().await;
        let id = test_db.subscription_id(0).unwrap();

        let expired = expire_subscriptions(&test_db.pool, Utc::now().naive_utc())
            .await
            .unwrap();
        assert_eq!(expired, 0);

        let later = (Utc::now() + Duration::days(31)).naive_utc();
        let expired = expire_subscriptions(&test_db.pool, later).await.unwrap();
        assert_eq!(expired, 1);

        let subscription = get_subscription(&test_db.pool, id).await.unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Expired);
        assert!(!subscription.is_active(later));

        let coach_id = test_db.user_id("coach_user").unwrap();
        let listed = get_coach_subscriptions(&test_db.pool, coach_id).await.unwrap();
        assert_eq!(listed.len(), 1, "Expired subscriptions stay visible to the coach");
    }

    #[rocket::async_test]
    async fn test_background_maintenance_expires_past_due() {
        let test_db = create_standard_test_db().await;
        let pool = test_db.pool.clone();
        let later = (Utc::now() + Duration::days(31)).naive_utc();

        let counts = tokio::spawn(async move { run_maintenance(&pool, later).await })
            .await
            .expect("Maintenance task panicked");
        assert_eq!(counts, (0, 1));

        let subscription = get_subscription(&test_db.pool, test_db.subscription_id(0).unwrap())
            .await
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Expired);
    }

    #[rocket::async_test]
    async fn test_cancel_subscription_once() {
        let test_db = create_standard_test_db().await;
        let id = test_db.subscription_id(0).unwrap();

        let cancelled = cancel_subscription(&test_db.pool, id)
            .await
            .expect("Failed to cancel");
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);

        let result = cancel_subscription(&test_db.pool, id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let coach_id = test_db.user_id("coach_user").unwrap();
        assert!(
            get_coach_subscriptions(&test_db.pool, coach_id)
                .await
                .unwrap()
                .is_empty()
        );
        let student_id = test_db.user_id("student_user").unwrap();
        assert_eq!(
            get_student_subscriptions(&test_db.pool, student_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[rocket::async_test]
    async fn test_purchase_over_http() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let student = login_test_user(&client, "student_user", "password123").await;
        let coach = login_test_user(&client, "coach_user", "password123").await;

        let body = json!({
            "package_id": test_db.package_id("Starter").unwrap(),
            "coach_id": test_db.user_id("coach_user").unwrap(),
        })
        .to_string();

        let response = client
            .post("/api/subscriptions")
            .header(ContentType::JSON)
            .private_cookie(coach.clone())
            .body(body.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post("/api/subscriptions")
            .header(ContentType::JSON)
            .private_cookie(student.clone())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let purchased: SubscriptionResponse = response.into_json().await.expect("body");
        assert_eq!(purchased.remaining_sessions, 4);
        assert_eq!(purchased.status, "active");
        assert!(purchased.is_active);

        let response = client
            .get("/api/subscriptions")
            .private_cookie(student)
            .dispatch()
            .await;
        let mine: Vec<SubscriptionResponse> = response.into_json().await.expect("list");
        assert_eq!(mine.len(), 2);

        let response = client
            .get("/api/subscriptions")
            .private_cookie(coach)
            .dispatch()
            .await;
        let coached: Vec<SubscriptionResponse> = response.into_json().await.expect("list");
        assert_eq!(coached.len(), 2);
    }

    #[rocket::async_test]
    async fn test_subscription_visibility_and_cancel_over_http() {
        let test_db = TestDbBuilder::new()
            .student("student_user", None)
            .student("other_student", None)
            .coach("coach_user", None)
            .package("Starter", 4, 30, 1200.0)
            .subscription("student_user", "coach_user", "Starter")
            .build()
            .await
            .expect("Failed to build test database");
        let (client, _) = setup_test_client(&test_db).await;
        let id = test_db.subscription_id(0).unwrap();

        let other = login_test_user(&client, "other_student", "password123").await;
        let response = client
            .get(format!("/api/subscriptions/{}", id))
            .private_cookie(other.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post(format!("/api/subscriptions/{}/cancel", id))
            .private_cookie(other)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let owner = login_test_user(&client, "student_user", "password123").await;
        let response = client
            .post(format!("/api/subscriptions/{}/cancel", id))
            .private_cookie(owner.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let cancelled: SubscriptionResponse = response.into_json().await.expect("body");
        assert_eq!(cancelled.status, "cancelled");
        assert!(!cancelled.is_active);

        let response = client
            .post(format!("/api/subscriptions/{}/cancel", id))
            .private_cookie(owner)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }
}
