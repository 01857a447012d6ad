use url::Url;

const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_FILES_PER_UPLOAD: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub base_url: String,
    pub database_url: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub s3_bucket: String,
    pub max_file_size_bytes: usize,
    pub max_files_per_upload: usize,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let access_token_secret =
            std::env::var("ACCESS_TOKEN_SECRET").expect("ACCESS_TOKEN_SECRET must be set");
        let refresh_token_secret =
            std::env::var("REFRESH_TOKEN_SECRET").expect("REFRESH_TOKEN_SECRET must be set");
        if access_token_secret.is_empty() {
            panic!("ACCESS_TOKEN_SECRET cannot be empty");
        }
        if refresh_token_secret.is_empty() {
            panic!("REFRESH_TOKEN_SECRET cannot be empty");
        }

        let base_url = std::env::var("BACKEND_URL").expect("BACKEND_URL must be set");
        Url::parse(&base_url).expect("BACKEND_URL must be a valid URL");

        let s3_bucket = std::env::var("AWS_S3_BUCKET").expect("AWS_S3_BUCKET must be set");

        Config {
            port: env_or("PORT", 8080),
            base_url,
            database_url,
            access_token_secret,
            refresh_token_secret,
            access_token_expiry_minutes: env_or("ACCESS_TOKEN_EXPIRY_MINUTES", 15),
            refresh_token_expiry_days: env_or("REFRESH_TOKEN_EXPIRY_DAYS", 7),
            s3_bucket,
            max_file_size_bytes: env_or("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE_BYTES),
            max_files_per_upload: env_or("MAX_FILES_PER_UPLOAD", DEFAULT_MAX_FILES_PER_UPLOAD),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid number", name)),
        Err(_) => default,
    }
}
