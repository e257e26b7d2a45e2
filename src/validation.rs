use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::ApiError;

/// Characters a style suffix may contain.
static STYLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._\-/!,]*$").unwrap());

/// Raw query string of `GET /`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ImageQuery {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 32, message = "'type' must be 1 to 32 characters"))]
    pub category: Option<String>,

    #[validate(length(max = 64, message = "'style' must be at most 64 characters"))]
    pub style: Option<String>,

    pub json: Option<String>,
}

/// A validated image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub category: String,
    pub style: Option<String>,
    pub wants_json: bool,
}

impl ImageQuery {
    pub fn into_request(self) -> Result<ImageRequest, ApiError> {
        self.validate()
            .map_err(|errors| ApiError::InvalidRequest(describe(&errors)))?;

        let category = self
            .category
            .as_deref()
            .map(|raw| raw.trim().to_lowercase())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ApiError::InvalidRequest("Missing 'type' parameter".to_string()))?;

        let style = match self.style.map(|raw| raw.trim().to_string()) {
            Some(style) if style.is_empty() => None,
            Some(style) => {
                if !STYLE_PATTERN.is_match(&style) {
                    return Err(ApiError::InvalidRequest(
                        "'style' contains invalid characters".to_string(),
                    ));
                }
                Some(style)
            }
            None => None,
        };

        let wants_json = self
            .json
            .as_deref()
            .map(|flag| flag.eq_ignore_ascii_case("true") || flag == "1")
            .unwrap_or(false);

        Ok(ImageRequest {
            category,
            style,
            wants_json,
        })
    }
}

fn describe(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| match &err.message {
                Some(message) => message.to_string(),
                None => format!("invalid '{}'", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
