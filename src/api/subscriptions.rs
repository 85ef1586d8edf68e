use rocket::State;
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::{
    cancel_subscription, create_subscription, get_coach_subscriptions, get_student_subscriptions,
    get_subscription,
};
use crate::models::CoachingSubscription;
use crate::validation::{AppErrorExt, ApiError, PermissionCheckExt, ToValidationResponse};

use super::now;

/// A subscription as returned to clients, with derived progress.
#[derive(Serialize, Deserialize, Debug)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub student_id: i64,
    pub coach_id: i64,
    pub package_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub total_sessions: i64,
    pub remaining_sessions: i64,
    pub status: String,
    pub purchase_price: f64,
    pub progress: u8,
    pub is_active: bool,
}

impl From<CoachingSubscription> for SubscriptionResponse {
    fn from(subscription: CoachingSubscription) -> Self {
        Self {
            progress: subscription.progress(),
            is_active: subscription.is_active(now()),
            id: subscription.id,
            student_id: subscription.student_id,
            coach_id: subscription.coach_id,
            package_id: subscription.package_id,
            start_date: subscription.start_date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            end_date: subscription.end_date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            total_sessions: subscription.total_sessions,
            remaining_sessions: subscription.remaining_sessions,
            status: subscription.status.to_string(),
            purchase_price: subscription.purchase_price,
        }
    }
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    package_id: i64,
    coach_id: i64,
}

#[post("/subscriptions", data = "<purchase>")]
pub async fn api_purchase_subscription(
    purchase: Json<PurchaseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    user.require_permission(Permission::PurchasePackages)
        .validate_custom()?;

    let subscription =
        create_subscription(db, user.id, purchase.coach_id, purchase.package_id, now())
            .await
            .validate_custom()?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Students see their own subscriptions; coaches see the ones they deliver.
#[get("/subscriptions")]
pub async fn api_get_subscriptions(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let subscriptions = if user.has_permission(Permission::ViewCoachedStudents) {
        get_coach_subscriptions(db, user.id).await
    } else {
        get_student_subscriptions(db, user.id).await
    }
    .validate_custom()?;

    Ok(Json(
        subscriptions
            .into_iter()
            .map(SubscriptionResponse::from)
            .collect(),
    ))
}

fn can_view(user: &User, subscription: &CoachingSubscription) -> bool {
    user.id == subscription.student_id
        || user.id == subscription.coach_id
        || user.has_permission(Permission::ManageAllAppointments)
}

#[get("/subscriptions/<id>")]
pub async fn api_get_subscription(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = get_subscription(db, id).await.validate_custom()?;

    if !can_view(&user, &subscription) {
        return Err(Status::Forbidden.to_validation_response());
    }

    Ok(Json(SubscriptionResponse::from(subscription)))
}

#[post("/subscriptions/<id>/cancel")]
pub async fn api_cancel_subscription(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = get_subscription(db, id).await.validate_custom()?;

    if user.id != subscription.student_id
        && !user.has_permission(Permission::ManageAllAppointments)
    {
        return Err(Status::Forbidden.to_validation_response());
    }

    let cancelled = cancel_subscription(db, id).await.validate_custom()?;
    Ok(Json(SubscriptionResponse::from(cancelled)))
}
