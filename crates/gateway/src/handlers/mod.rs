//! API handlers module

use axum::extract::FromRequest;
use recruit_radar_common::errors::AppError;

pub mod analysis;
pub mod health;
pub mod recommend;
pub mod research;

/// JSON request body. Missing fields, bad syntax and oversized bodies are
/// rejected as [`AppError`] so callers always get `{ error, code }`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
