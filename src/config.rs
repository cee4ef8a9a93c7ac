//! Configuration management for the raster server.
//!
//! Settings come from:
//! - Command-line arguments via clap
//! - Environment variables with the `RASTER_` prefix
//! - Defaults for everything except the bucket
//!
//! # Environment Variables
//!
//! - `RASTER_HOST` - Server bind address (default: 0.0.0.0)
//! - `RASTER_PORT` - Server port (default: 3000)
//! - `RASTER_S3_BUCKET` - S3 bucket holding the tile store (required)
//! - `RASTER_S3_PREFIX` - Key prefix of the tile store inside the bucket
//! - `RASTER_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `RASTER_S3_REGION` - AWS region (default: us-east-1)
//! - `RASTER_CACHE_RASTERS` - Max raster descriptions to cache (default: 100)
//! - `RASTER_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `RASTER_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use clap::Parser;

use crate::source::DEFAULT_RASTER_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Raster Streamer - multi-resolution raster reads over S3.
///
/// Serves geographic window reads and mosaics from tiled raster pyramids
/// stored in S3 or S3-compatible storage, fetching only the tiles a request
/// touches.
#[derive(Parser, Debug, Clone)]
#[command(name = "raster-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "RASTER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RASTER_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket name containing the tile store.
    #[arg(long, env = "RASTER_S3_BUCKET")]
    pub s3_bucket: String,

    /// Key prefix of the tile store inside the bucket.
    #[arg(long, env = "RASTER_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "RASTER_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "RASTER_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of raster descriptions to keep in cache.
    #[arg(long, default_value_t = DEFAULT_RASTER_CACHE_CAPACITY, env = "RASTER_CACHE_RASTERS")]
    pub cache_rasters: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "RASTER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "RASTER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.trim().is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or RASTER_S3_BUCKET".to_string(),
            );
        }

        if self.cache_rasters == 0 {
            return Err("cache_rasters must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
