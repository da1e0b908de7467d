pub const AUTH_TOKEN: &str = "AUTH_TOKEN";

pub const BASE_URL: &str = "http://localhost:3000";
pub const CHAT_PATH: &str = "/api/ai/chat";
pub const REPORTS_PATH: &str = "/api/reports";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

pub const JSON_TEMPERATURE: f32 = 0.6;
pub const TEXT_TEMPERATURE: f32 = 0.8;

pub const MAX_RETRIES: u32 = 6;
pub const RETRY_BASE_DELAY_MS: u64 = 2000;
pub const RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const RETRY_MAX_JITTER_MS: u64 = 500;
