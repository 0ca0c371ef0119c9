//! HTTP routes: signup/login, password reset, and the lottery endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::{self, AdminUser, AuthUser};
use crate::draw;
use crate::error::ApiError;
use crate::models::{PasswordResetToken, Role, User};
use crate::state::AppState;

/// Request body for POST /signup
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    #[serde(rename = "confirmEmail")]
    pub confirm_email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User fields safe to hand back to clients.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// Batch fields returned by POST /start_lottery
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub id: String,
    pub started_at: String,
}

#[derive(Debug, Serialize)]
pub struct CloseLotteryResponse {
    pub message: String,
    pub winner: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
pub struct BuyLotteryRequest {
    pub wallet_address: String,
    pub lottery_numbers: i64,
}

#[derive(Debug, Serialize)]
pub struct WinnersResponse {
    pub winning_users: Vec<UserResponse>,
}

/// Routes mounted at the root
pub fn root_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index_handler))
        .route("/signup", post(signup_handler))
        .route("/login", post(login_handler))
        .route("/forgot_password", post(forgot_password_handler))
        .route("/reset_password", post(reset_password_handler))
        .route("/start_lottery", post(start_lottery_handler))
        .route("/close_lottery", post(close_lottery_handler))
}

/// Routes mounted under /users
pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(users_index_handler))
        .route("/buy_lottery", post(buy_lottery_handler))
        .route("/generate-random-winners", get(generate_winners_handler))
}

async fn index_handler() -> Json<Value> {
    Json(json!({ "service": "tombola", "status": "ok" }))
}

async fn users_index_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /signup - Register a new user
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    if req.email != req.confirm_email {
        return Err(ApiError::Validation(
            "email and confirmEmail do not match".to_string(),
        ));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation(
            "password and confirmPassword do not match".to_string(),
        ));
    }

    let hash = auth::hash_password(&req.password)?;
    let user = User::new(req.username, req.email, hash, req.role.unwrap_or_default());
    let user = state.store.create_user(user).await?;

    info!(username = %user.username, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id.to_hex(),
            username: user.username,
            email: user.email,
        }),
    ))
}

/// POST /login - Exchange credentials for a session token
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_session_token(
        &user,
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
    )?;
    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

/// POST /forgot_password - Issue a one-hour reset token
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let token = {
        let mut rng = state.rng.lock().await;
        auth::generate_reset_token(&mut *rng)
    };
    let record = PasswordResetToken::new(token, user.id, DateTime::now());
    state.store.insert_reset_token(&record).await?;

    // Mail delivery is out of scope; the token is only retrievable from
    // the debug log.
    debug!(token = %record.token, "reset token issued");
    info!(email = %user.email, "password reset email sent");
    Ok(Json(json!({ "message": "Password reset email sent" })))
}

/// POST /reset_password - Redeem a reset token for a new password
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = auth::lookup_reset_token(state.store.as_ref(), &req.token, DateTime::now()).await?;
    let user = state
        .store
        .find_user_by_id(record.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if req.password != req.confirm_password {
        return Err(ApiError::Validation("passwords do not match".to_string()));
    }

    let hash = auth::hash_password(&req.password)?;
    state.store.update_password(user.id, &hash).await?;
    state.store.delete_reset_token(&req.token).await?;

    info!(username = %user.username, "password reset");
    Ok(Json(json!({ "message": "Password reset successfully" })))
}

/// POST /start_lottery - Open a new batch (admin only)
pub async fn start_lottery_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, ApiError> {
    let marker = draw::start_lottery(state.store.as_ref(), &admin, DateTime::now()).await?;

    info!(batch = %marker.id, "lottery started");
    Ok(Json(json!({
        "message": "Lottery started successfully",
        "lottery": BatchResponse {
            id: marker.id.to_hex(),
            started_at: marker.purchase_date.to_chrono().to_rfc3339(),
        },
    })))
}

/// POST /close_lottery - Close the latest batch and pick a winner (admin only)
pub async fn close_lottery_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<CloseLotteryResponse>, ApiError> {
    let mut rng = state.rng.lock().await;
    let winner = draw::close_lottery(state.store.as_ref(), &mut *rng, DateTime::now()).await?;

    match &winner {
        Some(user) => info!(winner = %user.username, "lottery closed"),
        None => info!("lottery closed with no participants"),
    }
    Ok(Json(CloseLotteryResponse {
        message: "Lottery closed successfully".to_string(),
        winner: winner.as_ref().map(UserResponse::from),
    }))
}

/// POST /users/buy_lottery - Purchase numbered tickets
pub async fn buy_lottery_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<BuyLotteryRequest>,
) -> Result<&'static str, ApiError> {
    let bought = state
        .allocator
        .purchase(
            state.store.as_ref(),
            &user,
            &req.wallet_address,
            req.lottery_numbers,
            DateTime::now(),
        )
        .await?;

    let owned = state.store.tickets_by_owner(user.id).await?;
    info!(
        username = %user.username,
        bought = bought.len(),
        total = owned.len(),
        "lottery tickets purchased"
    );
    Ok("Lottery tickets purchased successfully")
}

/// GET /users/generate-random-winners - Draw five winning numbers
pub async fn generate_winners_handler(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<WinnersResponse>, ApiError> {
    let mut rng = state.rng.lock().await;
    let winners = draw::generate_winners(state.store.as_ref(), &mut *rng).await?;

    Ok(Json(WinnersResponse {
        winning_users: winners.iter().map(UserResponse::from).collect(),
    }))
}
