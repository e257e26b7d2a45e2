use serde::Serialize;

use crate::config::ServiceSettings;

/// Body of `GET /?json=true`.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub code: u16,
    pub url: String,
    #[serde(rename = "type")]
    pub category: String,
}

impl ImageResponse {
    pub fn ok(url: String, category: &str) -> Self {
        Self {
            code: 200,
            url,
            category: category.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub message: String,
    pub config: ServiceSettings,
    pub categories: Vec<&'static str>,
}

impl ConfigResponse {
    pub fn current(config: ServiceSettings, categories: Vec<&'static str>) -> Self {
        Self {
            message: "Current configuration".to_string(),
            config,
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_response_shape() {
        let json = serde_json::to_value(ImageResponse::ok("https://x/a.jpg".into(), "ysh")).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["url"], "https://x/a.jpg");
        assert_eq!(json["type"], "ysh");
    }

    #[test]
    fn test_config_response_uses_human_durations() {
        let response = ConfigResponse::current(ServiceSettings::default(), vec!["ysh"]);
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["config"]["admission_timeout"], "5s");
        assert_eq!(json["categories"][0], "ysh");
    }
}
