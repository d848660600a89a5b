use std::str::FromStr;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{RequestContext, Role};
use shared_models::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SALON_ID_HEADER: &str = "x-salon-id";

// Builds the caller context from the identity headers set by the gateway
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let context = context_from_headers(request.headers())?;
    debug!("Request from {} ({}) for salon {}", context.user_id, context.role, context.salon_id);

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

pub fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, AppError> {
    let user_id = parse_header(headers, USER_ID_HEADER, Uuid::from_str)?;
    let role = parse_header(headers, USER_ROLE_HEADER, Role::from_str)?;
    let salon_id = parse_header(headers, SALON_ID_HEADER, Uuid::from_str)?;

    Ok(RequestContext::new(user_id, role, salon_id))
}

fn parse_header<T, E>(
    headers: &HeaderMap,
    name: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, AppError> {
    let value = headers
        .get(name)
        .ok_or_else(|| AppError::Auth(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Auth(format!("Invalid {} header format", name)))?;

    parse(value.trim()).map_err(|_| AppError::Auth(format!("Invalid {} header value", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    #[test]
    fn builds_context_from_headers() {
        let user_id = Uuid::new_v4();
        let salon_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&user_id.to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("salon_manager"));
        headers.insert(SALON_ID_HEADER, HeaderValue::from_str(&salon_id.to_string()).unwrap());

        let context = context_from_headers(&headers).unwrap();
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.role, Role::SalonManager);
        assert_eq!(context.salon_id, salon_id);
    }

    #[test]
    fn missing_role_is_an_auth_error() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());
        headers.insert(SALON_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

        let err = context_from_headers(&headers).unwrap_err();
        assert_matches!(err, AppError::Auth(_));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("stylist"));
        headers.insert(SALON_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

        assert!(context_from_headers(&headers).is_err());
    }
}
