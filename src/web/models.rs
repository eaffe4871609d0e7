// Response bodies for the web API

use serde::Serialize;

/// Envelope wrapped around every JSON response.
#[derive(Serialize, Debug, Clone)]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn data(data: T) -> Self {
        Self::success(String::new(), data)
    }
}

impl ApiResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct CurrentImage {
    pub current: String,
}
