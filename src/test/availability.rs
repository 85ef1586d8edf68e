#[cfg(test)]
mod tests {
    use crate::api::{AvailabilityResponse, SlotsResponse};
    use crate::coaching::{SlotWindow, day_of_week};
    use crate::db::{
        NewAppointment, create_direct_appointment, get_coach_availability, get_coach_slots,
        remove_availability_slot, replace_coach_availability,
    };
    use crate::error::AppError;
    use crate::models::NewAvailability;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::{
        create_standard_test_db, future_slot, login_test_user, setup_test_client,
    };
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[rocket::async_test]
    async fn test_replace_availability_drops_old_rows() {
        let test_db = TestDbBuilder::new()
            .coach("coach_user", None)
            .daily_availability("coach_user", "09:00", "12:00")
            .build()
            .await
            .expect("Failed to build test database");
        let coach_id = test_db.user_id("coach_user").unwrap();

        assert_eq!(
            get_coach_availability(&test_db.pool, coach_id)
                .await
                .unwrap()
                .len(),
            7
        );

        let saved = replace_coach_availability(
            &test_db.pool,
            coach_id,
            &[
                NewAvailability {
                    day_of_week: 3,
                    start_time: time(14, 0),
                    end_time: time(18, 0),
                    is_available: true,
                },
                NewAvailability {
                    day_of_week: 1,
                    start_time: time(9, 0),
                    end_time: time(10, 30),
                    is_available: false,
                },
            ],
        )
        .await
        .expect("Failed to replace availability");

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].day_of_week, 1);
        assert!(!saved[0].is_available);
        assert_eq!(saved[1].day_of_week, 3);
        assert_eq!(saved[1].start_time, time(14, 0));
    }

    #[rocket::async_test]
    async fn test_invalid_rows_leave_availability_untouched() {
        let test_db = TestDbBuilder::new()
            .coach("coach_user", None)
            .availability("coach_user", 2, "09:00", "12:00")
            .build()
            .await
            .expect("Failed to build test database");
        let coach_id = test_db.user_id("coach_user").unwrap();

        let result = replace_coach_availability(
            &test_db.pool,
            coach_id,
            &[NewAvailability {
                day_of_week: 2,
                start_time: time(12, 0),
                end_time: time(9, 0),
                is_available: true,
            }],
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let rows = get_coach_availability(&test_db.pool, coach_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].end_time, time(12, 0));
    }

    #[rocket::async_test]
    async fn test_remove_slot_of_another_coach_is_not_found() {
        let test_db = TestDbBuilder::new()
            .coach("coach_user", None)
            .coach("other_coach", None)
            .availability("coach_user", 2, "09:00", "12:00")
            .build()
            .await
            .expect("Failed to build test database");
        let coach_id = test_db.user_id("coach_user").unwrap();
        let other_id = test_db.user_id("other_coach").unwrap();
        let row_id = get_coach_availability(&test_db.pool, coach_id).await.unwrap()[0].id;

        let result = remove_availability_slot(&test_db.pool, other_id, row_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        remove_availability_slot(&test_db.pool, coach_id, row_id)
            .await
            .expect("Owner should be able to remove the row");
        assert!(
            get_coach_availability(&test_db.pool, coach_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[rocket::async_test]
    async fn test_slots_mark_booked_ranges_unavailable() {
        let test_db = create_standard_test_db().await;
        let coach_id = test_db.user_id("coach_user").unwrap();
        let at = future_slot(2, 10);

        create_direct_appointment(
            &test_db.pool,
            coach_id,
            &NewAppointment {
                subscription_id: test_db.subscription_id(0).unwrap(),
                appointment_date: at,
                duration_minutes: 90,
                title: None,
                description: None,
                google_meet_link: None,
            },
            Utc::now().naive_utc(),
        )
        .await
        .expect("Failed to create appointment");

        let window = SlotWindow {
            start_date: at.date(),
            end_date: at.date() + Duration::days(1),
            slot_minutes: 60,
        };
        let slots = get_coach_slots(&test_db.pool, coach_id, &window)
            .await
            .unwrap();

        assert_eq!(slots.len(), 8);
        assert!(slots.iter().all(|s| s.day_of_week == day_of_week(at.date())));

        let taken: Vec<_> = slots
            .iter()
            .filter(|s| !s.available)
            .map(|s| s.time)
            .collect();
        assert_eq!(taken, vec![time(10, 0), time(11, 0)]);
    }

    #[rocket::async_test]
    async fn test_coach_without_availability_has_no_slots() {
        let test_db = TestDbBuilder::new()
            .coach("coach_user", None)
            .build()
            .await
            .expect("Failed to build test database");
        let today = Utc::now().date_naive();

        let slots = get_coach_slots(
            &test_db.pool,
            test_db.user_id("coach_user").unwrap(),
            &SlotWindow {
                start_date: today,
                end_date: today + Duration::days(7),
                slot_minutes: 60,
            },
        )
        .await
        .unwrap();
        assert!(slots.is_empty());
    }

    #[rocket::async_test]
    async fn test_replace_availability_over_http() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let coach = login_test_user(&client, "coach_user", "password123").await;
        let student = login_test_user(&client, "student_user", "password123").await;

        let body = json!({
            "slots": [
                { "day_of_week": 1, "start_time": "09:00", "end_time": "12:00" },
                { "day_of_week": 5, "start_time": "13:00", "end_time": "15:30", "is_available": false }
            ]
        })
        .to_string();

        let response = client
            .put("/api/coach/availability")
            .header(ContentType::JSON)
            .private_cookie(student)
            .body(body.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .put("/api/coach/availability")
            .header(ContentType::JSON)
            .private_cookie(coach.clone())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let coach_id = test_db.user_id("coach_user").unwrap();
        let response = client
            .get(format!("/api/coaches/{}/availability", coach_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let rows: Vec<AvailabilityResponse> = response.into_json().await.expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].day_name, "Pazartesi");
        assert_eq!(rows[1].day_name, "Cuma");
        assert!(!rows[1].is_available);

        let response = client
            .put("/api/coach/availability")
            .header(ContentType::JSON)
            .private_cookie(coach)
            .body(
                json!({ "slots": [{ "day_of_week": 1, "start_time": "9am", "end_time": "12:00" }] })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_slots_endpoint() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let coach_id = test_db.user_id("coach_user").unwrap();
        let start = future_slot(1, 0).date();

        let response = client
            .get(format!(
                "/api/coaches/{}/slots?start={}&end={}&duration=120",
                coach_id,
                start.format("%Y-%m-%d"),
                (start + Duration::days(2)).format("%Y-%m-%d"),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let slots: SlotsResponse = response.into_json().await.expect("slots body");
        assert_eq!(slots.duration_minutes, 120);
        assert_eq!(slots.slots.len(), 8);
        assert_eq!(slots.by_date.len(), 2);
        assert_eq!(slots.slots[0].time, "09:00");
        assert_eq!(slots.slots[3].time, "15:00");
        assert!(slots.slots.iter().all(|s| s.available));
    }

    #[rocket::async_test]
    async fn test_slots_endpoint_defaults_to_one_week() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let coach_id = test_db.user_id("coach_user").unwrap();
        let start = future_slot(1, 0).date();

        let response = client
            .get(format!(
                "/api/coaches/{}/slots?start={}",
                coach_id,
                start.format("%Y-%m-%d")
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let slots: SlotsResponse = response.into_json().await.expect("slots body");
        assert_eq!(slots.duration_minutes, 60);
        assert_eq!(slots.by_date.len(), 7);
        assert_eq!(slots.slots.len(), 7 * 8);
    }

    #[rocket::async_test]
    async fn test_slots_endpoint_rejects_bad_windows() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let coach_id = test_db.user_id("coach_user").unwrap();

        let response = client
            .get(format!(
                "/api/coaches/{}/slots?start=2030-01-01&end=2030-06-01",
                coach_id
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .get(format!(
                "/api/coaches/{}/slots?start=2030-01-01&duration=5",
                coach_id
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .get(format!("/api/coaches/{}/slots?start=tomorrow", coach_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .get("/api/coaches/9999/slots?start=2030-01-01")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_slots_endpoint_rejects_start_at_end_of_calendar() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(&test_db).await;
        let coach_id = test_db.user_id("coach_user").unwrap();

        let response = client
            .get(format!(
                "/api/coaches/{}/slots?start=%2B262142-12-30",
                coach_id
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: serde_json::Value = response.into_json().await.expect("error body");
        assert!(body["errors"]["start"].is_array());
    }

    #[rocket::async_test]
    async fn test_slots_at_start_of_calendar() {
        let test_db = create_standard_test_db().await;
        let coach_id = test_db.user_id("coach_user").unwrap();
        let window = SlotWindow {
            start_date: NaiveDate::MIN,
            end_date: NaiveDate::MIN.succ_opt().unwrap(),
            slot_minutes: 60,
        };

        let slots = get_coach_slots(&test_db.pool, coach_id, &window)
            .await
            .expect("Failed to generate slots");
        assert_eq!(slots.len(), 8);
        assert!(slots.iter().all(|s| s.available));
    }
}
