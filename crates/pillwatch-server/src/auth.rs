//! HTTP Basic-auth for the operator credential: a verifier, an extractor
//! and a middleware for nested routers.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{FromRef, FromRequestParts, Request, State},
  http::{HeaderMap, request::Parts},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::error::Error;

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Zero-size marker: present in the handler means the request was authenticated.
pub struct Authenticated;

/// Verify credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(())
}

impl<T> FromRequestParts<T> for Authenticated
where
  Arc<AuthConfig>: FromRef<T>,
  T: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(parts: &mut Parts, state: &T) -> Result<Self, Self::Rejection> {
    let auth = Arc::<AuthConfig>::from_ref(state);
    verify_auth(&parts.headers, &auth)?;
    Ok(Authenticated)
  }
}

/// Middleware guarding every route of a nested router.
pub async fn require_auth(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  verify_auth(req.headers(), &auth)?;
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use axum::http::{Request, header};

  use super::*;

  fn make_auth(password: &str) -> Arc<AuthConfig> {
    use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    Arc::new(AuthConfig {
      username:      "operator".to_string(),
      password_hash: hash,
    })
  }

  async fn extract(
    req: Request<axum::body::Body>,
    auth: &Arc<AuthConfig>,
  ) -> Result<Authenticated, Error> {
    let (mut parts, _) = req.into_parts();
    Authenticated::from_request_parts(&mut parts, auth).await
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[tokio::test]
  async fn correct_credentials() {
    let auth = make_auth("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("operator", "secret"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(extract(req, &auth).await.is_ok());
  }

  #[tokio::test]
  async fn wrong_password() {
    let auth = make_auth("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("operator", "wrong"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(extract(req, &auth).await, Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn wrong_username() {
    let auth = make_auth("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("someone", "secret"))
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(extract(req, &auth).await, Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn missing_header() {
    let auth = make_auth("secret");
    let req = Request::builder().body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(req, &auth).await, Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn invalid_base64() {
    let auth = make_auth("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Basic !!!not-base64!!!")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(extract(req, &auth).await, Err(Error::Unauthorized)));
  }
}
