use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};

use crate::connection_manager::ConnectionHandle;
use crate::error::AppError;
use crate::server::AppState;

use super::lifecycle;

/// WebSocket upgrade handler.
///
/// The session cookie is checked before the upgrade headers are.
#[tracing::instrument(name = "ws.upgrade", skip_all)]
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    tracing::info!(user_id = %user_id, "WebSocket upgrade accepted");

    let registry = state.registry.clone();
    let buffer = state.settings.websocket.channel_buffer;

    ws.on_upgrade(move |socket| async move {
        let (handle, outbound) = ConnectionHandle::channel(user_id, buffer);
        registry.admit(handle.clone());
        lifecycle::run(socket, handle, outbound, registry).await;
    })
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let cookie_name = &state.settings.session.cookie_name;
    let credential = session_cookie(headers, cookie_name).ok_or(AppError::MissingSession)?;

    state
        .session_resolver
        .resolve(credential.as_bytes())
        .await
        .map_err(|_| AppError::Unauthenticated)
}

/// Find a cookie value by name across every `Cookie` header
fn session_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_cookie_found_among_others() {
        let h = headers(&["theme=dark; session=abc%3D%3D; lang=en"]);
        assert_eq!(session_cookie(&h, "session"), Some("abc%3D%3D"));
    }

    #[test]
    fn test_cookie_in_second_header() {
        let h = headers(&["theme=dark", "session=xyz"]);
        assert_eq!(session_cookie(&h, "session"), Some("xyz"));
    }

    #[test]
    fn test_cookie_quoted_value() {
        let h = headers(&["session=\"xyz\""]);
        assert_eq!(session_cookie(&h, "session"), Some("xyz"));
    }

    #[test]
    fn test_cookie_missing() {
        assert_eq!(session_cookie(&headers(&[]), "session"), None);
        assert_eq!(session_cookie(&headers(&["sessionid=1"]), "session"), None);
    }

    #[test]
    fn test_cookie_value_keeps_equals_signs() {
        let h = headers(&["session=YWJj=="]);
        assert_eq!(session_cookie(&h, "session"), Some("YWJj=="));
    }
}
