// src/sheets/google.rs
//
// Google Sheets API v4 over plain REST. Auth is either a ready-made bearer
// token from the environment or an RS256 service-account JWT exchanged for
// one at the Google token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::sheets::{col_letter, SheetStore};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/* ---------- wire types ---------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SheetValues {
    #[serde(default)]
    range: String,
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProps,
}

#[derive(Debug, Deserialize)]
struct SheetProps {
    #[serde(default)]
    title: String,
}

/* ---------- auth ---------- */

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

enum Auth {
    Token(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

async fn fetch_access_token(http: &Client, key: &ServiceAccountKey) -> Result<CachedToken> {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    let signing_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| Error::source_connection(format!("invalid service-account key: {e}")))?;
    let assertion = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &signing_key,
    )
    .map_err(|e| Error::source_connection(format!("failed to sign token request: {e}")))?;

    let resp = http
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::source_connection(format!("token exchange failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::source_connection(format!(
            "token endpoint error ({status}): {body}"
        )));
    }

    let json: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| Error::source_connection(format!("bad token response: {e}")))?;
    let value = json["access_token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::source_connection("access_token missing from token response"))?;
    let ttl = json["expires_in"].as_i64().unwrap_or(TOKEN_LIFETIME_SECS);

    Ok(CachedToken { value, expires_at: now + ttl })
}

/* ---------- store ---------- */

pub struct GoogleSheetsStore {
    spreadsheet_id: String,
    base_url: String,
    http: Client,
    auth: Auth,
}

impl GoogleSheetsStore {
    /// Build a store from the app config: an explicit token wins, otherwise
    /// the service-account key file is loaded.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let Some(sheet_id) = cfg.sheet_id.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Err(Error::source_connection(
                "no spreadsheet configured: set CASEPILOT_SHEET_ID",
            ));
        };

        let auth = if let Some(token) = cfg.sheets_token.as_deref().filter(|t| !t.is_empty()) {
            Auth::Token(token.to_string())
        } else {
            let raw = std::fs::read_to_string(&cfg.service_account_file).map_err(|e| {
                Error::source_connection(format!(
                    "no spreadsheet credentials: set CASEPILOT_SHEETS_TOKEN or provide {} ({e})",
                    cfg.service_account_file.display()
                ))
            })?;
            let key = parse_service_account(&raw)?;
            Auth::ServiceAccount { key, cached: Mutex::new(None) }
        };

        Ok(Self {
            spreadsheet_id: sheet_id.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
            auth,
        })
    }

    #[cfg(test)]
    fn with_token(spreadsheet_id: &str, token: &str, base_url: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            auth: Auth::Token(token.to_string()),
        }
    }

    pub fn spreadsheet_url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.spreadsheet_id)
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            Auth::Token(token) => Ok(token.clone()),
            Auth::ServiceAccount { key, cached } => {
                let mut guard = cached.lock().await;
                let now = chrono::Utc::now().timestamp();
                if let Some(tok) = guard.as_ref() {
                    if now + 60 < tok.expires_at {
                        return Ok(tok.value.clone());
                    }
                }
                let tok = fetch_access_token(&self.http, key).await?;
                let value = tok.value.clone();
                *guard = Some(tok);
                Ok(value)
            }
        }
    }

    async fn get_values(&self, range: &str, major_dimension: &str) -> Result<SheetValues> {
        let url = format!(
            "{}/{}/values/{}?majorDimension={}",
            self.base_url,
            self.spreadsheet_id,
            urlencod(range),
            major_dimension
        );
        debug!(url = %url, "reading sheet values");

        let token = self.bearer().await?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::source_connection(format!("sheets read failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::source_connection(format!(
                "sheets API error ({status}): {body}"
            )));
        }

        let values: SheetValues = resp
            .json()
            .await
            .map_err(|e| Error::source_connection(format!("bad sheets response: {e}")))?;
        debug!(range = %values.range, rows = values.values.len(), "sheet values read");
        Ok(values)
    }

    async fn update_values(&self, range: &str, values: &[Vec<String>]) -> Result<()> {
        let url = format!(
            "{}/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url,
            self.spreadsheet_id,
            urlencod(range)
        );
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        debug!(url = %url, "updating sheet values");

        let token = self.bearer().await?;
        let resp = self
            .http
            .put(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::report(format!("sheets write failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::report(format!("sheets API error ({status}): {body}")));
        }

        Ok(())
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn list_worksheets(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}?fields=sheets.properties.title",
            self.base_url, self.spreadsheet_id
        );
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::source_connection(format!("sheets metadata failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::source_connection(format!(
                "sheets API error ({status}): {body}"
            )));
        }

        let meta: SpreadsheetMeta = resp
            .json()
            .await
            .map_err(|e| Error::source_connection(format!("bad sheets metadata: {e}")))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn worksheet_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.get_values(&a1(worksheet, ""), "ROWS").await?.values)
    }

    async fn row_values(&self, worksheet: &str, row: u32) -> Result<Vec<String>> {
        let range = a1(worksheet, &format!("{row}:{row}"));
        let values = self.get_values(&range, "ROWS").await?.values;
        Ok(values.into_iter().next().unwrap_or_default())
    }

    async fn col_values(&self, worksheet: &str, col: u32) -> Result<Vec<String>> {
        let letter = col_letter(col);
        let range = a1(worksheet, &format!("{letter}:{letter}"));
        let values = self.get_values(&range, "COLUMNS").await?.values;
        Ok(values.into_iter().next().unwrap_or_default())
    }

    async fn update_cell(&self, worksheet: &str, row: u32, col: u32, value: &str) -> Result<()> {
        let range = a1(worksheet, &format!("{}{}", col_letter(col), row));
        self.update_values(&range, &[vec![value.to_string()]]).await
    }
}

/* ---------- helpers ---------- */

fn parse_service_account(raw: &str) -> Result<ServiceAccountKey> {
    serde_json::from_str(raw)
        .map_err(|e| Error::source_connection(format!("invalid service-account file: {e}")))
}

/// A1 range with the worksheet title quoted; single quotes in the title are
/// doubled per the Sheets grammar.
fn a1(worksheet: &str, suffix: &str) -> String {
    let title = worksheet.replace('\'', "''");
    if suffix.is_empty() {
        format!("'{title}'")
    } else {
        format!("'{title}'!{suffix}")
    }
}

/// Minimal percent-encoding for path segments.
fn urlencod(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(b"0123456789ABCDEF"[(b >> 4) as usize]));
                out.push(char::from(b"0123456789ABCDEF"[(b & 0x0F) as usize]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_quotes_titles() {
        assert_eq!(a1("Sheet1", "A1"), "'Sheet1'!A1");
        assert_eq!(a1("Trang tính1", ""), "'Trang tính1'");
        assert_eq!(a1("it's", "F4"), "'it''s'!F4");
    }

    #[test]
    fn urlencod_escapes_a1_punctuation() {
        assert_eq!(urlencod("'Sheet 1'!A1:B2"), "%27Sheet%201%27%21A1%3AB2");
        assert_eq!(urlencod("plain"), "plain");
    }

    #[test]
    fn sheet_values_deserialization_tolerates_missing_values() {
        let vals: SheetValues = serde_json::from_str(r#"{ "range": "'S'!A1:A1" }"#).unwrap();
        assert!(vals.values.is_empty());
    }

    #[test]
    fn service_account_defaults_token_uri() {
        let key = parse_service_account(
            r#"{"client_email": "svc@proj.iam.gserviceaccount.com", "private_key": "----"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(key.client_email, "svc@proj.iam.gserviceaccount.com");
    }

    #[test]
    fn spreadsheet_url_embeds_id() {
        let store = GoogleSheetsStore::with_token("abc123", "tok", DEFAULT_BASE_URL);
        assert_eq!(
            store.spreadsheet_url(),
            "https://docs.google.com/spreadsheets/d/abc123"
        );
    }
}
