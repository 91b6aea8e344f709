use anyhow::{Context, Result, bail};
use chrono::FixedOffset;
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};
use uuid::Uuid;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub bucket: String,
    pub database_url: String,
    pub table: String,
    pub url_ttl: Duration,
    pub public_base_url: String,
    pub signing_key: String,
    /// True when no key was configured and one was generated for this process.
    pub signing_key_generated: bool,
    pub admin_group: String,
    pub claims_header: String,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    pub timezone: FixedOffset,
    pub max_upload_bytes: usize,
    pub reconcile_grace: Duration,
}

/// What the process should do after loading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    Reconcile,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo gallery asset service")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory of the blob store (overrides PHOTO_GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Blob bucket identifier (overrides PHOTO_GALLERY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Database URL (overrides PHOTO_GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Metadata table identifier (overrides PHOTO_GALLERY_TABLE)
    #[arg(long)]
    pub table: Option<String>,

    /// Signed URL lifetime in seconds (overrides PHOTO_GALLERY_URL_TTL_SECS)
    #[arg(long)]
    pub url_ttl_secs: Option<u64>,

    /// Prefix for issued signed URLs (overrides PHOTO_GALLERY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// HMAC key for signed URLs (overrides PHOTO_GALLERY_SIGNING_KEY)
    #[arg(long)]
    pub signing_key: Option<String>,

    /// Role claim that grants admin rights (overrides PHOTO_GALLERY_ADMIN_GROUP)
    #[arg(long)]
    pub admin_group: Option<String>,

    /// Request header carrying validated role claims (overrides PHOTO_GALLERY_CLAIMS_HEADER)
    #[arg(long)]
    pub claims_header: Option<String>,

    /// Comma separated allowed origins, empty for any (overrides PHOTO_GALLERY_CORS_ORIGINS)
    #[arg(long)]
    pub cors_origins: Option<String>,

    /// UTC offset in minutes for photo creation times (overrides PHOTO_GALLERY_TZ_OFFSET_MINUTES)
    #[arg(long, allow_hyphen_values = true)]
    pub tz_offset_minutes: Option<i32>,

    /// Largest accepted request body (overrides PHOTO_GALLERY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Age after which an unfinished upload is considered failed (overrides PHOTO_GALLERY_RECONCILE_GRACE_SECS)
    #[arg(long)]
    pub reconcile_grace_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Run one reconciliation sweep and exit
    #[arg(long, conflicts_with = "migrate")]
    pub reconcile: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over variables looked up through `lookup`, then defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<(Self, RunMode)> {
        let host = args
            .host
            .or_else(|| lookup("PHOTO_GALLERY_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => env_parsed(&lookup, "PHOTO_GALLERY_PORT")?.unwrap_or(3000),
        };
        let url_ttl_secs = match args.url_ttl_secs {
            Some(secs) => secs,
            None => env_parsed(&lookup, "PHOTO_GALLERY_URL_TTL_SECS")?.unwrap_or(20 * 60),
        };
        if url_ttl_secs == 0 {
            bail!("signed URL lifetime must be at least one second");
        }
        let tz_offset_minutes: i32 = match args.tz_offset_minutes {
            Some(minutes) => minutes,
            None => env_parsed(&lookup, "PHOTO_GALLERY_TZ_OFFSET_MINUTES")?.unwrap_or(8 * 60),
        };
        let timezone = FixedOffset::east_opt(tz_offset_minutes.saturating_mul(60))
            .with_context(|| format!("timezone offset of {} minutes is out of range", tz_offset_minutes))?;
        let max_upload_bytes = match args.max_upload_bytes {
            Some(bytes) => bytes,
            None => env_parsed(&lookup, "PHOTO_GALLERY_MAX_UPLOAD_BYTES")?.unwrap_or(10 * 1024 * 1024),
        };
        let reconcile_grace_secs = match args.reconcile_grace_secs {
            Some(secs) => secs,
            None => env_parsed(&lookup, "PHOTO_GALLERY_RECONCILE_GRACE_SECS")?.unwrap_or(15 * 60),
        };

        let (signing_key, signing_key_generated) =
            match args.signing_key.or_else(|| lookup("PHOTO_GALLERY_SIGNING_KEY")) {
                Some(key) if !key.is_empty() => (key, false),
                _ => (
                    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
                    true,
                ),
            };

        let public_base_url = args
            .public_base_url
            .or_else(|| lookup("PHOTO_GALLERY_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        let cors_origins = args
            .cors_origins
            .or_else(|| lookup("PHOTO_GALLERY_CORS_ORIGINS"))
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let cfg = Self {
            port,
            storage_dir: args
                .storage_dir
                .or_else(|| lookup("PHOTO_GALLERY_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/blobs".into()),
            bucket: args
                .bucket
                .or_else(|| lookup("PHOTO_GALLERY_BUCKET"))
                .unwrap_or_else(|| "photo-viewer".into()),
            database_url: args
                .database_url
                .or_else(|| lookup("PHOTO_GALLERY_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/photos.db".into()),
            table: args
                .table
                .or_else(|| lookup("PHOTO_GALLERY_TABLE"))
                .unwrap_or_else(|| "photos".into()),
            url_ttl: Duration::from_secs(url_ttl_secs),
            public_base_url,
            signing_key,
            signing_key_generated,
            admin_group: args
                .admin_group
                .or_else(|| lookup("PHOTO_GALLERY_ADMIN_GROUP"))
                .unwrap_or_else(|| "ADMIN".into()),
            claims_header: args
                .claims_header
                .or_else(|| lookup("PHOTO_GALLERY_CLAIMS_HEADER"))
                .unwrap_or_else(|| "x-auth-groups".into()),
            cors_origins,
            timezone,
            max_upload_bytes,
            reconcile_grace: Duration::from_secs(reconcile_grace_secs),
            host,
        };

        let mode = if args.migrate {
            RunMode::Migrate
        } else if args.reconcile {
            RunMode::Reconcile
        } else {
            RunMode::Serve
        };
        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(None),
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("bucket", &self.bucket)
            .field("database_url", &self.database_url)
            .field("table", &self.table)
            .field("url_ttl", &self.url_ttl)
            .field("public_base_url", &self.public_base_url)
            .field("signing_key", &"<redacted>")
            .field("admin_group", &self.admin_group)
            .field("claims_header", &self.claims_header)
            .field("cors_origins", &self.cors_origins)
            .field("timezone", &self.timezone)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("reconcile_grace", &self.reconcile_grace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env_or_args() {
        let (cfg, mode) = AppConfig::resolve(Args::default(), env_of(&[])).unwrap();
        assert_eq!(mode, RunMode::Serve);
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.url_ttl, Duration::from_secs(1200));
        assert_eq!(cfg.table, "photos");
        assert_eq!(cfg.bucket, "photo-viewer");
        assert_eq!(cfg.admin_group, "ADMIN");
        assert_eq!(cfg.claims_header, "x-auth-groups");
        assert!(cfg.cors_origins.is_empty());
        assert_eq!(cfg.timezone.local_minus_utc(), 8 * 3600);
        assert_eq!(cfg.public_base_url, "http://0.0.0.0:3000");
        assert!(cfg.signing_key_generated);
        assert_eq!(cfg.signing_key.len(), 64);
    }

    #[test]
    fn args_override_env() {
        let args = Args {
            port: Some(9000),
            table: Some("gallery".into()),
            reconcile: true,
            ..Args::default()
        };
        let env = env_of(&[
            ("PHOTO_GALLERY_PORT", "8000"),
            ("PHOTO_GALLERY_TABLE", "ignored"),
            ("PHOTO_GALLERY_BUCKET", "my-bucket"),
            ("PHOTO_GALLERY_URL_TTL_SECS", "60"),
            ("PHOTO_GALLERY_SIGNING_KEY", "secret"),
            ("PHOTO_GALLERY_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]);
        let (cfg, mode) = AppConfig::resolve(args, env).unwrap();
        assert_eq!(mode, RunMode::Reconcile);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.table, "gallery");
        assert_eq!(cfg.bucket, "my-bucket");
        assert_eq!(cfg.url_ttl, Duration::from_secs(60));
        assert_eq!(cfg.signing_key, "secret");
        assert!(!cfg.signing_key_generated);
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = AppConfig::resolve(Args::default(), env_of(&[("PHOTO_GALLERY_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("PHOTO_GALLERY_PORT"));

        assert!(
            AppConfig::resolve(Args::default(), env_of(&[("PHOTO_GALLERY_URL_TTL_SECS", "0")]))
                .is_err()
        );
    }

    #[test]
    fn signing_key_is_redacted_in_debug_output() {
        let env = env_of(&[("PHOTO_GALLERY_SIGNING_KEY", "super-secret")]);
        let (cfg, _) = AppConfig::resolve(Args::default(), env).unwrap();
        assert!(!format!("{:?}", cfg).contains("super-secret"));
    }
}
