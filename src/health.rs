//! 存活检查处理器。

use axum::response::Json as JsonResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    msg: &'static str,
}

pub async fn get_health() -> JsonResponse<HealthStatus> {
    JsonResponse(HealthStatus {
        msg: "API is running...",
    })
}
