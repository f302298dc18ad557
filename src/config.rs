use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:3002",
];

#[derive(Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub public_base_url: String,
    pub static_dir: PathBuf,
    pub static_mount: String,
    pub temp_dir: PathBuf,
    pub default_pose_path: PathBuf,
    pub placeholder_name: String,
    pub hf_token: Option<String>,
    pub space_url: String,
    pub api_name: String,
    pub inference_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000));

        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let static_dir = PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()));
        let static_mount = normalize_mount(
            &env::var("STATIC_MOUNT").unwrap_or_else(|_| "/static".to_string()),
        );
        let temp_dir = PathBuf::from(env::var("TEMP_DIR").unwrap_or_else(|_| "tmp".into()));
        let default_pose_path = PathBuf::from(
            env::var("DEFAULT_POSE_PATH").unwrap_or_else(|_| "template.jpg".to_string()),
        );
        let placeholder_name =
            env::var("MOCK_PLACEHOLDER").unwrap_or_else(|_| "mock_placeholder.png".to_string());

        let hf_token = env::var("HF_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let space_url = env::var("INFERENCE_SPACE_URL")
            .unwrap_or_else(|_| "https://instantx-instantid.hf.space".to_string());
        let api_name =
            env::var("INFERENCE_API_NAME").unwrap_or_else(|_| "generate_image".to_string());
        let inference_timeout = env::var("INFERENCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(300));

        let cors_origins = env::var("CORS_ORIGINS")
            .ok()
            .map(|raw| parse_origins(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());

        Ok(Self {
            listen_addr,
            public_base_url,
            static_dir,
            static_mount,
            temp_dir,
            default_pose_path,
            placeholder_name,
            hf_token,
            space_url,
            api_name,
            inference_timeout,
            cors_origins,
        })
    }

    /// Largest request body accepted: two maximal uploads plus multipart framing.
    pub fn body_limit(&self) -> usize {
        2 * MAX_UPLOAD_BYTES + 1024 * 1024
    }

    pub fn masked_token(&self) -> Option<String> {
        self.hf_token.as_deref().map(mask_token)
    }
}

// Manual impl keeps the provider token out of `{:?}` output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_addr", &self.listen_addr)
            .field("public_base_url", &self.public_base_url)
            .field("static_dir", &self.static_dir)
            .field("static_mount", &self.static_mount)
            .field("temp_dir", &self.temp_dir)
            .field("default_pose_path", &self.default_pose_path)
            .field("placeholder_name", &self.placeholder_name)
            .field("hf_token", &self.masked_token())
            .field("space_url", &self.space_url)
            .field("api_name", &self.api_name)
            .field("inference_timeout", &self.inference_timeout)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

fn normalize_mount(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/static".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
