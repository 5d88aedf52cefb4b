use crate::utils::PaginationParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OpenChatRequest {
    #[schema(example = "Question about ring sizing")]
    pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub content: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MessageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl MessageQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}
