//! Bitfinex REST v2 client implementing [`FundingExchange`].
//!
//! Public endpoints (platform status, funding stats, candles) need no
//! credentials. Authenticated endpoints are signed with HMAC-SHA384 over
//! `"/api/" + path + nonce + body`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha384;
use tracing::{debug, warn};

use super::exchange::FundingExchange;
use crate::constants::{BITFINEX_AUTH_BASE, BITFINEX_PUBLIC_BASE, DAYS_PER_YEAR};
use crate::errors::RenewError;
use crate::types::{
    AutoFundingConfig, AutoFundingRequest, AutoFundingStatus, Candle, CandleQuery, FundingOffer,
    ReferenceRate,
};

type HmacSha384 = Hmac<Sha384>;

/// Index of the fields used from a funding offer row.
const OFFER_AMOUNT_IDX: usize = 4;
const OFFER_RATE_IDX: usize = 14;
const OFFER_PERIOD_IDX: usize = 15;

/// Index of STATUS / TEXT in a write notification.
const NOTIFY_STATUS_IDX: usize = 6;
const NOTIFY_TEXT_IDX: usize = 7;

struct Credentials {
    api_key: String,
    api_secret: String,
}

pub struct BitfinexClient {
    client: reqwest::Client,
    public_base: String,
    auth_base: String,
    credentials: Option<Credentials>,
    last_nonce: AtomicU64,
}

impl BitfinexClient {
    /// Create a client. Without credentials only the public endpoints work;
    /// authenticated calls fail with [`RenewError::Validation`].
    pub fn new(
        timeout: Duration,
        api_key: Option<String>,
        api_secret: Option<String>,
    ) -> Result<Self, RenewError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let credentials = match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Credentials {
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            client,
            public_base: BITFINEX_PUBLIC_BASE.to_string(),
            auth_base: BITFINEX_AUTH_BASE.to_string(),
            credentials,
            last_nonce: AtomicU64::new(0),
        })
    }

    // -----------------------------------------------------------------------
    // Private: HTTP helpers
    // -----------------------------------------------------------------------

    async fn public_get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, RenewError> {
        let url = format!("{}/{path}", self.public_base);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| RenewError::exchange(path, e.to_string()))?;
        Self::read_json(path, resp).await
    }

    /// POST a signed request to `v2/auth/...`.
    async fn auth_post(&self, path: &str, body: &Value) -> Result<Value, RenewError> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            RenewError::Validation(format!(
                "{path}: BITFINEX_API_KEY and BITFINEX_API_SECRET are required"
            ))
        })?;

        let nonce = self.next_nonce().to_string();
        let body = serde_json::to_string(body)?;
        let signature = sign_payload(
            &creds.api_secret,
            &format!("/api/{path}{nonce}{body}"),
        )?;

        let url = format!("{}/{path}", self.auth_base);
        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("bfx-nonce", &nonce)
            .header("bfx-apikey", &creds.api_key)
            .header("bfx-signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| RenewError::exchange(path, e.to_string()))?;
        Self::read_json(path, resp).await
    }

    async fn read_json(endpoint: &str, resp: reqwest::Response) -> Result<Value, RenewError> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(endpoint, "rate limited by Bitfinex");
        }
        if !status.is_success() {
            warn!(endpoint, %status, body = %body, "Bitfinex request failed");
            let reason = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| parse_api_error(&v))
                .unwrap_or_else(|| format!("HTTP {status}: {body}"));
            return Err(RenewError::exchange(endpoint, reason));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| RenewError::exchange(endpoint, format!("invalid JSON: {e}")))?;
        if let Some(reason) = parse_api_error(&value) {
            return Err(RenewError::exchange(endpoint, reason));
        }
        Ok(value)
    }

    /// Microsecond timestamp, strictly increasing per client.
    fn next_nonce(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let prev = self
            .last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }

    async fn write(&self, path: &str, body: Value) -> Result<(), RenewError> {
        let resp = self.auth_post(path, &body).await?;
        check_notification(path, &resp)
    }
}

#[async_trait]
impl FundingExchange for BitfinexClient {
    async fn platform_operative(&self) -> Result<bool, RenewError> {
        let v = self.public_get("v2/platform/status", &[]).await?;
        parse_platform_status(&v)
    }

    async fn get_reference_rate(&self, currency: &str) -> Result<ReferenceRate, RenewError> {
        let path = format!("v2/funding/stats/f{currency}/hist");
        let v = self.public_get(&path, &[("limit", "1")]).await?;
        parse_reference_rate(&v).ok_or_else(|| {
            RenewError::UpstreamUnavailable {
                reason: format!("{path}: no funding stats for {currency}"),
            }
        })
    }

    async fn get_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, RenewError> {
        let path = format!("v2/candles/{}/hist", query.candle_key());
        let limit = query.limit.to_string();
        let v = self
            .public_get(&path, &[("limit", &limit), ("sort", query.sort.as_query())])
            .await?;
        let candles = parse_candles(&v)
            .ok_or_else(|| RenewError::exchange(&path, "candle response not an array"))?;
        debug!(key = %query.candle_key(), candles = candles.len(), "candles fetched");
        Ok(candles)
    }

    async fn get_auto_funding_status(
        &self,
        currency: &str,
    ) -> Result<Option<AutoFundingConfig>, RenewError> {
        let path = "v2/auth/r/funding/auto/status";
        let v = self.auth_post(path, &json!({ "currency": currency })).await?;
        parse_auto_funding_status(&v)
            .map_err(|reason| RenewError::exchange(path, reason))
    }

    async fn get_open_offers(&self, currency: &str) -> Result<Vec<FundingOffer>, RenewError> {
        let path = format!("v2/auth/r/funding/offers/f{currency}");
        let v = self.auth_post(&path, &json!({})).await?;
        parse_offers(&v).ok_or_else(|| RenewError::exchange(&path, "offer response not an array"))
    }

    async fn set_auto_funding(&self, request: &AutoFundingRequest) -> Result<(), RenewError> {
        self.write("v2/auth/w/funding/auto", auto_funding_body(request))
            .await
    }

    async fn cancel_all_offers(&self, currency: &str) -> Result<(), RenewError> {
        self.write(
            "v2/auth/w/funding/offer/cancel/all",
            json!({ "currency": currency }),
        )
        .await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Free helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Hex-encoded HMAC-SHA384 of `payload`.
fn sign_payload(secret: &str, payload: &str) -> Result<String, RenewError> {
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .map_err(|e| RenewError::Validation(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Body of `w/funding/auto`. The exchange takes the rate as a percentage.
fn auto_funding_body(request: &AutoFundingRequest) -> Value {
    let mut body = json!({
        "status": request.status.as_flag(),
        "currency": request.currency,
    });
    if request.status == AutoFundingStatus::On {
        if let Some(amount) = request.amount {
            body["amount"] = json!(amount.normalize().to_string());
        }
        if let Some(rate) = request.rate {
            body["rate"] = json!((rate * Decimal::ONE_HUNDRED).normalize().to_string());
        }
        if let Some(period) = request.period {
            body["period"] = json!(period);
        }
    }
    body
}

/// Parse a JSON number or numeric string without going through `f64`.
fn parse_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        _ => None,
    }
}

/// `["error", CODE, "MESSAGE"]` → `"(CODE) MESSAGE"`.
fn parse_api_error(v: &Value) -> Option<String> {
    let arr = v.as_array()?;
    if arr.first()?.as_str()? != "error" {
        return None;
    }
    let code = arr.get(1).map(|c| c.to_string()).unwrap_or_default();
    let msg = arr.get(2).and_then(|m| m.as_str()).unwrap_or_default();
    Some(format!("({code}) {msg}"))
}

fn parse_platform_status(v: &Value) -> Result<bool, RenewError> {
    v.as_array()
        .and_then(|a| a.first())
        .and_then(|s| s.as_i64())
        .map(|s| s == 1)
        .ok_or_else(|| RenewError::UpstreamUnavailable {
            reason: format!("unexpected platform status payload: {v}"),
        })
}

/// First stats row: `[MTS, _, _, FRR, ...]`. FRR × 365 is the daily rate.
fn parse_reference_rate(v: &Value) -> Option<ReferenceRate> {
    let row = v.as_array()?.first()?.as_array()?;
    let timestamp = row.first()?.as_i64()?;
    let frr = parse_decimal(row.get(3)?)?;
    Some(ReferenceRate {
        timestamp,
        rate: frr * DAYS_PER_YEAR,
    })
}

/// Rows of `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`. Malformed rows are skipped.
fn parse_candles(v: &Value) -> Option<Vec<Candle>> {
    let rows = v.as_array()?;
    let candles = rows
        .iter()
        .filter_map(|row| {
            let items = row.as_array().filter(|a| a.len() >= 6)?;
            Some(Candle {
                timestamp: items[0].as_i64()?,
                open: parse_decimal(&items[1])?,
                close: parse_decimal(&items[2])?,
                high: parse_decimal(&items[3])?,
                low: parse_decimal(&items[4])?,
                volume: parse_decimal(&items[5])?,
            })
        })
        .collect();
    Some(candles)
}

/// `null` (slot off) or `[CURRENCY, PERIOD, RATE, AMOUNT]`.
fn parse_auto_funding_status(v: &Value) -> Result<Option<AutoFundingConfig>, String> {
    if v.is_null() {
        return Ok(None);
    }
    let row = v
        .as_array()
        .ok_or_else(|| format!("unexpected auto-renew status payload: {v}"))?;
    if row.is_empty() {
        return Ok(None);
    }
    let field = |i: usize| row.get(i).ok_or_else(|| format!("auto-renew status missing field {i}"));

    let currency = field(0)?.as_str().unwrap_or_default().to_string();
    let period = field(1)?
        .as_u64()
        .and_then(|p| u32::try_from(p).ok())
        .ok_or_else(|| "auto-renew period is not a valid number of days".to_string())?;
    let rate = parse_decimal(field(2)?).ok_or_else(|| "auto-renew rate is not numeric".to_string())?;
    let amount = match row.get(3) {
        Some(Value::Null) | None => Decimal::ZERO,
        Some(a) => parse_decimal(a).ok_or_else(|| "auto-renew amount is not numeric".to_string())?,
    };

    Ok(Some(AutoFundingConfig {
        currency,
        amount,
        rate,
        period,
    }))
}

fn parse_offers(v: &Value) -> Option<Vec<FundingOffer>> {
    let rows = v.as_array()?;
    let offers = rows
        .iter()
        .filter_map(|row| {
            let items = row.as_array()?;
            Some(FundingOffer {
                amount: parse_decimal(items.get(OFFER_AMOUNT_IDX)?)?,
                rate: parse_decimal(items.get(OFFER_RATE_IDX)?)?,
                period: u32::try_from(items.get(OFFER_PERIOD_IDX)?.as_u64()?).ok()?,
            })
        })
        .collect();
    Some(offers)
}

/// Write responses are `[MTS, TYPE, ID, _, DATA, CODE, STATUS, TEXT]`.
fn check_notification(endpoint: &str, v: &Value) -> Result<(), RenewError> {
    let arr = v
        .as_array()
        .ok_or_else(|| RenewError::exchange(endpoint, format!("unexpected response: {v}")))?;
    let status = arr
        .get(NOTIFY_STATUS_IDX)
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN");
    if status == "SUCCESS" {
        return Ok(());
    }
    let text = arr
        .get(NOTIFY_TEXT_IDX)
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    Err(RenewError::exchange(endpoint, format!("{status}: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sign_payload_known_vector() {
        // RFC 4231 test case 2.
        let sig = sign_payload("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e\
             8e2240ca5e69e2c78b3239ecfab21649"
        );
    }

    #[test]
    fn test_nonce_strictly_increases() {
        let client = BitfinexClient::new(Duration::from_secs(1), None, None).unwrap();
        let mut prev = client.next_nonce();
        for _ in 0..1000 {
            let n = client.next_nonce();
            assert!(n > prev);
            prev = n;
        }
    }

    #[tokio::test]
    async fn test_auth_call_without_credentials_fails_before_network() {
        let client = BitfinexClient::new(Duration::from_secs(1), Some("key".into()), None).unwrap();
        let err = client.get_auto_funding_status("USD").await.unwrap_err();
        assert!(matches!(err, RenewError::Validation(_)));
    }

    #[test]
    fn test_parse_decimal_number_and_string() {
        assert_eq!(parse_decimal(&json!(0.00035)), Some(dec!(0.00035)));
        assert_eq!(parse_decimal(&json!("12.5")), Some(dec!(12.5)));
        assert_eq!(parse_decimal(&json!(1e-7)), Some(dec!(0.0000001)));
        assert_eq!(parse_decimal(&Value::Null), None);
    }

    #[test]
    fn test_parse_api_error() {
        let v = json!(["error", 10100, "apikey: invalid"]);
        assert_eq!(parse_api_error(&v).as_deref(), Some("(10100) apikey: invalid"));
        assert!(parse_api_error(&json!([1])).is_none());
    }

    #[test]
    fn test_parse_platform_status() {
        assert!(parse_platform_status(&json!([1])).unwrap());
        assert!(!parse_platform_status(&json!([0])).unwrap());
        assert!(matches!(
            parse_platform_status(&json!({})),
            Err(RenewError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_parse_reference_rate_annualises_frr() {
        let v = json!([[1700000000000i64, null, null, 0.000001, 30.5, null, null, 1e9, 8e8, null, null, 0.3]]);
        let r = parse_reference_rate(&v).unwrap();
        assert_eq!(r.timestamp, 1700000000000);
        assert_eq!(r.rate, dec!(0.000365));
        assert!(parse_reference_rate(&json!([])).is_none());
    }

    #[test]
    fn test_parse_candles_skips_malformed_rows() {
        let v = json!([
            [1700000060000i64, 0.0002, 0.00025, 0.0003, 0.00015, 1234.5],
            [1700000000000i64, 0.0002],
            "garbage"
        ]);
        let candles = parse_candles(&v).unwrap();
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.timestamp, 1700000060000);
        assert_eq!(c.close, dec!(0.00025));
        assert_eq!(c.high, dec!(0.0003));
        assert_eq!(c.low, dec!(0.00015));
        assert_eq!(c.volume, dec!(1234.5));
    }

    #[test]
    fn test_parse_auto_funding_status() {
        assert_eq!(parse_auto_funding_status(&Value::Null).unwrap(), None);
        let cfg = parse_auto_funding_status(&json!(["USD", 30, 0.0003, 100]))
            .unwrap()
            .unwrap();
        assert_eq!(cfg.currency, "USD");
        assert_eq!(cfg.period, 30);
        assert_eq!(cfg.rate, dec!(0.0003));
        assert_eq!(cfg.amount, dec!(100));
        assert!(parse_auto_funding_status(&json!("on")).is_err());
    }

    #[test]
    fn test_out_of_range_period_is_rejected() {
        let too_long = u64::from(u32::MAX) + 2;
        assert!(parse_auto_funding_status(&json!(["USD", too_long, 0.0003, 100])).is_err());

        let mut row = vec![Value::Null; 20];
        row[OFFER_AMOUNT_IDX] = json!(10);
        row[OFFER_RATE_IDX] = json!(0.0003);
        row[OFFER_PERIOD_IDX] = json!(too_long);
        assert!(parse_offers(&json!([row])).unwrap().is_empty());
    }

    #[test]
    fn test_parse_offers_field_positions() {
        let mut row = vec![Value::Null; 20];
        row[OFFER_AMOUNT_IDX] = json!(150.25);
        row[OFFER_RATE_IDX] = json!(0.00031);
        row[OFFER_PERIOD_IDX] = json!(30);
        let offers = parse_offers(&json!([row])).unwrap();
        assert_eq!(
            offers,
            vec![FundingOffer {
                amount: dec!(150.25),
                rate: dec!(0.00031),
                period: 30
            }]
        );
    }

    #[test]
    fn test_check_notification_status() {
        let ok = json!([1, "fa-req", null, null, [], null, "SUCCESS", "ok"]);
        assert!(check_notification("w", &ok).is_ok());

        let bad = json!([1, "fa-req", null, null, [], null, "ERROR", "rate too high"]);
        let err = check_notification("w", &bad).unwrap_err().to_string();
        assert!(err.contains("ERROR: rate too high"), "{err}");
    }

    #[test]
    fn test_auto_funding_body_uses_percentage_rate() {
        let target = TargetConfig {
            rate: dec!(0.0003),
            period: 30,
            amount: dec!(100),
        };
        let body = auto_funding_body(&AutoFundingRequest::enable("USD", &target));
        assert_eq!(
            body,
            json!({ "status": 1, "currency": "USD", "amount": "100", "rate": "0.03", "period": 30 })
        );

        let off = auto_funding_body(&AutoFundingRequest::disable("USD"));
        assert_eq!(off, json!({ "status": 0, "currency": "USD" }));
    }
}
