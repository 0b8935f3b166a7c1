use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use sm_core::error::AppError;
use std::fmt;

/// Wrapper around AppError to implement ResponseError (which is defined in actix-web)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

pub type ApiResult<T> = Result<T, HttpAppError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: &'static str,
    pub kind: &'static str,
}

impl fmt::Display for HttpAppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl ResponseError for HttpAppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.0.to_string(),
            error_code: self.0.code(),
            kind: self.0.kind(),
        };

        if status.is_server_error() {
            log::error!("{} {}: {:?}", status.as_u16(), body.error_code, self.0);
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            log::warn!("auth rejected ({}): {}", body.error_code, body.error);
        }

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use sm_core::error::CredentialError;
    use sm_core::otp::OtpError;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = HttpAppError(err).error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn body_carries_message_code_and_kind() {
        let (status, body) = render(AppError::InsufficientStock("Teapot".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "insufficient stock for Teapot");
        assert_eq!(body["error_code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["kind"], "conflict");
    }

    #[actix_web::test]
    async fn otp_and_credential_failures_keep_distinct_codes() {
        let (status, body) = render(AppError::Otp(OtpError::Expired)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "expired");

        let (status, body) = render(AppError::Credential(CredentialError::UnknownSubject)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "UNKNOWN_SUBJECT");
    }

    #[actix_web::test]
    async fn upstream_failures_are_bad_gateway() {
        let (status, _) = render(AppError::UpstreamFailure("smtp down".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
