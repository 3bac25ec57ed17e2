use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use std::convert::Infallible;
use std::net::SocketAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

// Authenticated user id, inserted into request extensions by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser(pub String);

// Picks the string a request's quota is charged to:
// session user, then X-Forwarded-For (first hop), then X-Real-IP,
// then the socket peer, then "unknown".
pub fn client_identifier(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(SessionUser(user)) = extensions.get::<SessionUser>() {
        if !user.is_empty() {
            return user.clone();
        }
    }

    if let Some(ip) = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, "x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// Extractor form of client_identifier for handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientId(client_identifier(&parts.headers, &parts.extensions)))
    }
}
