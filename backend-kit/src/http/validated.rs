//! JSON body extractor that rejects invalid input with a 400.

use axum::Json;
use axum::async_trait;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::response::HttpError;

/// Checks run on a request body after it deserializes.
pub trait Validate {
    /// Returns the first failure message, if any.
    ///
    /// # Errors
    ///
    /// Returns the message sent back to the client as a bad request.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Extracts a JSON body of type `T` and runs [`Validate::validate`] on it.
///
/// A body that fails to parse or validate is rejected with
/// [`HttpError::bad_request`] carrying the first failure message.
///
/// ```no_run
/// use axum::{Router, routing::post};
/// use backend_kit::http::{Validate, ValidatedJson};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Signup {
///     email: String,
/// }
///
/// impl Validate for Signup {
///     fn validate(&self) -> Result<(), String> {
///         if backend_kit::validation::is_email(&self.email) {
///             Ok(())
///         } else {
///             Err("\"email\" must be a valid email".to_string())
///         }
///     }
/// }
///
/// async fn signup(ValidatedJson(body): ValidatedJson<Signup>) -> String {
///     body.email
/// }
///
/// let app: Router = Router::new().route("/signup", post(signup));
/// ```
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
        value.validate().map_err(HttpError::bad_request)?;
        Ok(Self(value))
    }
}
