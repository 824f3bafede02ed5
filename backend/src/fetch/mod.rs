//! Source download.
//!
//! Fetches the raw CSV over HTTP. Parsing happens afterwards in
//! [`crate::parser`], so a downloaded file and a local one take the same path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use covidash::fetch::{fetch_csv, source_url};
//!
//! let bytes = fetch_csv(&source_url()).await?;
//! ```

use std::env;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// JHU CSSE global confirmed cases time series.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";

/// Environment variable overriding [`DEFAULT_SOURCE_URL`].
pub const SOURCE_URL_ENV: &str = "COVIDASH_SOURCE_URL";

/// Default number of attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Source URL from `COVIDASH_SOURCE_URL`, or the JHU default.
pub fn source_url() -> String {
    // Try loading .env file
    let _ = dotenvy::dotenv();

    env::var(SOURCE_URL_ENV).unwrap_or_else(|_| DEFAULT_SOURCE_URL.to_string())
}

/// Download a CSV file, retrying transient failures.
///
/// Malformed URLs and 4xx statuses are not retried.
pub async fn fetch_csv(url: &str) -> FetchResult<Vec<u8>> {
    let mut last_error = None;

    for attempt in 1..=DEFAULT_MAX_RETRIES {
        match try_fetch(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(Retry::Fatal(e)) => return Err(e),
            Err(Retry::Transient(e)) => {
                crate::api::logs::log_warning(format!(
                    "Attempt {}/{} failed: {}",
                    attempt, DEFAULT_MAX_RETRIES, e
                ));
                last_error = Some(e);

                if attempt < DEFAULT_MAX_RETRIES {
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| FetchError::RequestFailed("Unknown error".to_string())))
}

enum Retry {
    Fatal(FetchError),
    Transient(FetchError),
}

/// Single download attempt
async fn try_fetch(url: &str) -> Result<Vec<u8>, Retry> {
    let response = reqwest::get(url).await.map_err(|e| {
        let err = FetchError::RequestFailed(e.to_string());
        if e.is_builder() {
            Retry::Fatal(err)
        } else {
            Retry::Transient(err)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let err = FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        };
        return Err(if status.is_server_error() {
            Retry::Transient(err)
        } else {
            Retry::Fatal(err)
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Retry::Transient(FetchError::Body(e.to_string())))?;

    crate::api::logs::log_success(format!("Downloaded {} bytes from {}", bytes.len(), url));
    Ok(bytes.to_vec())
}
