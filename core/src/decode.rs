//! Response decoding and status classification.

use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::http::Response;

/// A successfully decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// `Content-Type` declared JSON; always an object or an array.
    Json(Value),
    /// Anything else, verbatim bytes.
    Raw(Option<Vec<u8>>),
}

impl Content {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            Content::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Content::Json(value) => Some(value),
            Content::Raw(_) => None,
        }
    }
}

/// Decode `response` and map failing statuses onto `ApiError`.
///
/// `ok_codes` lists the statuses treated as success; `None` accepts any code
/// below 300. A JSON body is parsed before the status is checked, so a
/// malformed body is reported as `InvalidResponse` whatever the status.
pub fn decode(response: &Response, ok_codes: Option<&[u16]>) -> Result<Content> {
    let content = if is_json(response) {
        let value: Value = serde_json::from_slice(response.body().unwrap_or_default()).map_err(|_| {
            ApiError::InvalidResponse {
                message: "JSON decoding failed.".to_string(),
                response: Box::new(response.clone()),
            }
        })?;
        if !value.is_object() && !value.is_array() {
            return Err(ApiError::InvalidResponse {
                message: "Decoded JSON is not an array or object.".to_string(),
                response: Box::new(response.clone()),
            });
        }
        Content::Json(value)
    } else {
        Content::Raw(response.body().map(<[u8]>::to_vec))
    };

    let code = response.code();
    let accepted = match ok_codes {
        Some(codes) => codes.contains(&code),
        None => code < 300,
    };
    if accepted {
        return Ok(content);
    }

    let response = Box::new(response.clone());
    Err(match code {
        Response::S400_BAD_REQUEST => ApiError::BadRequest {
            message: error_message(&content),
            response,
        },
        Response::S401_UNAUTHORIZED => ApiError::Unauthorized {
            message: error_message(&content),
            response,
        },
        Response::S403_FORBIDDEN if response.header("X-RateLimit-Remaining") == Some("0") => {
            ApiError::RateLimitExceeded {
                message: error_message(&content),
                response,
            }
        }
        Response::S403_FORBIDDEN => ApiError::Forbidden {
            message: error_message(&content),
            response,
        },
        Response::S404_NOT_FOUND => ApiError::NotFound {
            message: "Resource not found or not authorized to access.".to_string(),
            response,
        },
        Response::S422_UNPROCESSABLE_ENTITY => ApiError::UnprocessableEntity {
            message: error_message(&content),
            response,
        },
        _ => {
            let expected = match ok_codes {
                Some(codes) => codes.iter().map(u16::to_string).collect::<Vec<_>>().join(" or "),
                None => "< 300".to_string(),
            };
            ApiError::UnexpectedResponse {
                message: format!("Expected response with code {expected}."),
                response,
            }
        }
    })
}

fn is_json(response: &Response) -> bool {
    response
        .header("Content-Type")
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

/// `message` followed by each entry of `errors` as `[v1:v2:...]`.
fn error_message(content: &Content) -> String {
    let body = content.as_json();
    let mut message = body
        .and_then(|body| body.get("message"))
        .map(scalar_text)
        .unwrap_or_else(|| "Unknown error".to_string());

    if let Some(errors) = body.and_then(|body| body.get("errors")).and_then(Value::as_array) {
        let rendered: Vec<String> = errors
            .iter()
            .map(|error| {
                let fields: Vec<String> = match error {
                    Value::Object(map) => map.values().map(scalar_text).collect(),
                    Value::Array(items) => items.iter().map(scalar_text).collect(),
                    other => vec![scalar_text(other)],
                };
                format!("[{}]", fields.join(":"))
            })
            .collect();
        message.push_str(&rendered.join(", "));
    }

    message
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
