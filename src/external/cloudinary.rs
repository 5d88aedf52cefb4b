use crate::config::CloudinaryConfig;
use crate::error::{AppError, AppResult};
use crate::models::UploadSignatureResponse;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Cloudinary 签名：参数按键名排序拼成 `k=v&k=v`，后接 api_secret 做 SHA-256
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct CloudinarySigner {
    config: CloudinaryConfig,
}

impl CloudinarySigner {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self { config }
    }

    pub fn sign_upload(
        &self,
        folder: Option<String>,
        timestamp: i64,
    ) -> AppResult<UploadSignatureResponse> {
        if !self.config.is_configured() {
            return Err(AppError::ConfigError(
                "Cloudinary is not configured".to_string(),
            ));
        }

        let folder = folder
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.config.upload_folder.clone());

        let mut params = BTreeMap::new();
        params.insert("timestamp", timestamp.to_string());
        if let Some(f) = &folder {
            params.insert("folder", f.clone());
        }

        Ok(UploadSignatureResponse {
            cloud_name: self.config.cloud_name.clone(),
            api_key: self.config.api_key.clone(),
            timestamp,
            signature: sign_params(&params, &self.config.api_secret),
            upload_url: format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                self.config.cloud_name
            ),
            folder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: "abcd".to_string(),
            upload_folder: Some("gemstore/products".to_string()),
        }
    }

    #[test]
    fn test_sign_params_sorted() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());
        assert_eq!(
            sign_params(&params, "abcd"),
            "e3c44b54e67a3ecc918f5d7236ca5faa36250ea8a8cd6cbabfd2d6bb2453acac"
        );
    }

    #[test]
    fn test_sign_upload_uses_default_folder() {
        let signer = CloudinarySigner::new(config());
        let resp = signer.sign_upload(None, 1315060510).unwrap();
        assert_eq!(resp.folder.as_deref(), Some("gemstore/products"));
        assert_eq!(
            resp.signature,
            "37e065f784e76756168d4c8f122da34d091f1c61a5b3e61910f3bcb7face2d95"
        );
        assert_eq!(
            resp.upload_url,
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_unconfigured_signer_fails() {
        let signer = CloudinarySigner::new(CloudinaryConfig::default());
        assert!(matches!(
            signer.sign_upload(None, 1),
            Err(AppError::ConfigError(_))
        ));
    }
}
