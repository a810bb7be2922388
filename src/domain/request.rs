//! Per-endpoint parameter normalization.
//!
//! A caller's loosely-typed query parameters are validated and rewritten into
//! an [`UpstreamRequest`]: the provider-relative path, the query string that
//! will be sent, and the effective parameter set that identifies the request
//! for caching.

use std::collections::BTreeMap;

use time::{
    Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

use super::endpoint::{EndpointId, Provider};
use super::error::DomainError;

/// Caller-supplied parameters. Ordered so that iteration is deterministic.
pub type QueryParams = BTreeMap<String, String>;

/// Default history window for flight lookups.
pub const FLIGHT_WINDOW_SECS: i64 = 48 * 3600;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Normalized, validated request for one upstream resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    endpoint: EndpointId,
    path: String,
    query: BTreeMap<String, String>,
    path_params: BTreeMap<String, String>,
}

impl UpstreamRequest {
    /// Validate `params` for `endpoint`. `now` (unix seconds) anchors
    /// time-window defaults.
    pub fn build(
        endpoint: EndpointId,
        params: &QueryParams,
        now: i64,
    ) -> Result<Self, DomainError> {
        let mut draft = Draft::default();

        match endpoint {
            EndpointId::States => {
                let extended = int_param(params, "extended").unwrap_or(1);
                draft.query("extended", extended.to_string());
                if let Some(bbox) = BoundingBox::from_params(params) {
                    draft.query("lamin", bbox.lamin.to_string());
                    draft.query("lamax", bbox.lamax.to_string());
                    draft.query("lomin", bbox.lomin.to_string());
                    draft.query("lomax", bbox.lomax.to_string());
                }
                draft.path = "/states/all".to_string();
            }
            EndpointId::Tracks => {
                draft.query("icao24", aircraft_id(params)?);
                draft.query("time", int_param(params, "time").unwrap_or(0).to_string());
                draft.path = "/tracks".to_string();
            }
            EndpointId::FlightsByAircraft => {
                draft.query("icao24", aircraft_id(params)?);
                draft.time_window(params, now);
                draft.path = "/flights/aircraft".to_string();
            }
            EndpointId::Arrivals | EndpointId::Departures => {
                draft.query("airport", airport_code(params)?);
                draft.time_window(params, now);
                draft.path = if endpoint == EndpointId::Arrivals {
                    "/flights/arrival".to_string()
                } else {
                    "/flights/departure".to_string()
                };
            }
            EndpointId::LatestRates => {
                draft.rate_filters(params)?;
                draft.path = "/latest".to_string();
            }
            EndpointId::Convert => {
                let amount = match float_param(params, "amount") {
                    Some(amount) if amount <= 0.0 => {
                        return Err(DomainError::invalid("amount", "must be greater than zero"));
                    }
                    Some(amount) => amount,
                    None => 1.0,
                };
                draft.query("amount", amount.to_string());
                draft.query("from", currency_code(params, "from", "from currency")?);
                draft.query("to", currency_code(params, "to", "to currency")?);
                draft.path = "/latest".to_string();
            }
            EndpointId::Historical => {
                let date = date_param(params, "date")?.ok_or(DomainError::missing("date"))?;
                draft.rate_filters(params)?;
                draft.path = format!("/{}", draft.path_param("date", format_date(date)?));
            }
            EndpointId::TimeSeries => {
                let start = date_param(params, "start")?.ok_or(DomainError::missing("start"))?;
                let end = date_param(params, "end")?;
                if end.is_some_and(|end| end < start) {
                    return Err(DomainError::invalid("end", "must not precede start"));
                }
                draft.rate_filters(params)?;
                let start = draft.path_param("start", format_date(start)?);
                let end = match end {
                    Some(end) => draft.path_param("end", format_date(end)?),
                    None => String::new(),
                };
                draft.path = format!("/{start}..{end}");
            }
            EndpointId::Currencies => {
                draft.path = "/currencies".to_string();
            }
            EndpointId::CountryLookup => {
                let code = letters_code(params, "code", "country code", 2..=3)?;
                draft.path = format!("/v3.1/alpha/{}", draft.path_param("code", code));
            }
            EndpointId::WorldTime => {
                let zone = time_zone(params)?;
                draft.path = format!("/api/timezone/{}", draft.path_param("zone", zone));
            }
            EndpointId::PublicHolidays => {
                let country = letters_code(params, "country", "country code", 2..=2)?;
                let year = int_param(params, "year").unwrap_or_else(|| current_year(now));
                let year = draft.path_param("year", year.to_string());
                let country = draft.path_param("country", country);
                draft.path = format!("/api/v3/PublicHolidays/{year}/{country}");
            }
            EndpointId::Weather => {
                let latitude = coordinate(params, "latitude", 90.0)?;
                let longitude = coordinate(params, "longitude", 180.0)?;
                draft.query("latitude", latitude.to_string());
                draft.query("longitude", longitude.to_string());
                draft.query("current_weather", "true".to_string());
                draft.query("timezone", "auto".to_string());
                draft.path = "/v1/forecast".to_string();
            }
        }

        Ok(Self {
            endpoint,
            path: draft.path,
            query: draft.query,
            path_params: draft.path_params,
        })
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn provider(&self) -> Provider {
        self.endpoint.provider()
    }

    /// Provider-relative path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query pairs sorted by key.
    pub fn query(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Every effective parameter, whether sent in the path or the query.
    pub fn effective_params(&self) -> BTreeMap<&str, &str> {
        self.query
            .iter()
            .chain(self.path_params.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[derive(Default)]
struct Draft {
    path: String,
    query: BTreeMap<String, String>,
    path_params: BTreeMap<String, String>,
}

impl Draft {
    fn query(&mut self, key: &str, value: String) {
        self.query.insert(key.to_string(), value);
    }

    fn path_param(&mut self, key: &str, value: String) -> String {
        self.path_params.insert(key.to_string(), value.clone());
        value
    }

    fn time_window(&mut self, params: &QueryParams, now: i64) {
        let begin = int_param(params, "begin").unwrap_or(now - FLIGHT_WINDOW_SECS);
        let end = int_param(params, "end").unwrap_or(now);
        self.query("begin", begin.to_string());
        self.query("end", end.to_string());
    }

    fn rate_filters(&mut self, params: &QueryParams) -> Result<(), DomainError> {
        if text_param(params, "base").is_some() {
            self.query("base", currency_code(params, "base", "base currency")?);
        }
        if let Some(symbols) = text_param(params, "symbols") {
            let mut codes = Vec::new();
            for symbol in symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                codes.push(validate_currency(symbol, "symbols")?);
            }
            if !codes.is_empty() {
                self.query("symbols", codes.join(","));
            }
        }
        Ok(())
    }
}

/// Geographic bounds for a live-position query; all four or nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lamax: f64,
    pub lomin: f64,
    pub lomax: f64,
}

impl BoundingBox {
    /// `None` unless every bound is present and numeric.
    pub fn from_params(params: &QueryParams) -> Option<Self> {
        Some(Self {
            lamin: float_param(params, "lamin")?,
            lamax: float_param(params, "lamax")?,
            lomin: float_param(params, "lomin")?,
            lomax: float_param(params, "lomax")?,
        })
    }
}

fn text_param<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn int_param(params: &QueryParams, key: &str) -> Option<i64> {
    text_param(params, key).and_then(|value| value.parse().ok())
}

fn float_param(params: &QueryParams, key: &str) -> Option<f64> {
    text_param(params, key)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn aircraft_id(params: &QueryParams) -> Result<String, DomainError> {
    let id = text_param(params, "icao24")
        .map(str::to_ascii_lowercase)
        .ok_or(DomainError::missing("icao24"))?;
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::invalid("icao24", "must be alphanumeric"));
    }
    Ok(id)
}

fn airport_code(params: &QueryParams) -> Result<String, DomainError> {
    let code = text_param(params, "airport")
        .map(str::to_ascii_uppercase)
        .ok_or(DomainError::missing("airport (ICAO)"))?;
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::invalid("airport", "must be alphanumeric"));
    }
    Ok(code)
}

fn currency_code(
    params: &QueryParams,
    key: &'static str,
    label: &'static str,
) -> Result<String, DomainError> {
    let value = text_param(params, key).ok_or(DomainError::missing(label))?;
    validate_currency(value, key)
}

fn validate_currency(value: &str, field: &'static str) -> Result<String, DomainError> {
    let code = value.to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::invalid(
            field,
            format!("`{value}` is not a three-letter currency code"),
        ));
    }
    Ok(code)
}

fn letters_code(
    params: &QueryParams,
    key: &'static str,
    label: &'static str,
    lengths: std::ops::RangeInclusive<usize>,
) -> Result<String, DomainError> {
    let code = text_param(params, key)
        .map(str::to_ascii_uppercase)
        .ok_or(DomainError::missing(label))?;
    if !lengths.contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::invalid(key, format!("`{code}` is not a {label}")));
    }
    Ok(code)
}

fn date_param(params: &QueryParams, key: &'static str) -> Result<Option<Date>, DomainError> {
    text_param(params, key)
        .map(|value| {
            Date::parse(value, DATE_FORMAT)
                .map_err(|err| DomainError::invalid(key, format!("expected YYYY-MM-DD: {err}")))
        })
        .transpose()
}

fn format_date(date: Date) -> Result<String, DomainError> {
    date.format(DATE_FORMAT)
        .map_err(|err| DomainError::invalid("date", err.to_string()))
}

fn time_zone(params: &QueryParams) -> Result<String, DomainError> {
    let zone = text_param(params, "zone").ok_or(DomainError::missing("zone"))?;
    let well_formed = zone
        .split('/')
        .all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
        });
    if !well_formed {
        return Err(DomainError::invalid("zone", "expected Area/Location"));
    }
    Ok(zone.to_string())
}

fn coordinate(params: &QueryParams, key: &'static str, limit: f64) -> Result<f64, DomainError> {
    let value = float_param(params, key).ok_or(DomainError::missing(key))?;
    if value.abs() > limit {
        return Err(DomainError::invalid(key, format!("must be within ±{limit}")));
    }
    Ok(value)
}

fn current_year(now: i64) -> i64 {
    OffsetDateTime::from_unix_timestamp(now)
        .map(|at| i64::from(at.year()))
        .unwrap_or(1970)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn states_with_full_bbox_is_bounded() {
        let request = UpstreamRequest::build(
            EndpointId::States,
            &params(&[("lamin", "1"), ("lamax", "2"), ("lomin", "3"), ("lomax", "4.5")]),
            NOW,
        )
        .expect("valid");

        assert_eq!(request.path(), "/states/all");
        assert_eq!(request.query_value("lamin"), Some("1"));
        assert_eq!(request.query_value("lomax"), Some("4.5"));
        assert_eq!(request.query_value("extended"), Some("1"));
    }

    #[test]
    fn partial_bbox_becomes_global_query() {
        let request = UpstreamRequest::build(
            EndpointId::States,
            &params(&[("lamin", "1"), ("lamax", "2"), ("lomin", "3")]),
            NOW,
        )
        .expect("partial bbox is not an error");

        let keys: Vec<&str> = request.query().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["extended"]);
    }

    #[test]
    fn non_numeric_bound_drops_the_whole_bbox() {
        let request = UpstreamRequest::build(
            EndpointId::States,
            &params(&[("lamin", "1"), ("lamax", "north"), ("lomin", "3"), ("lomax", "4")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.query_value("lamin"), None);
    }

    #[test]
    fn aircraft_ids_are_lowercased() {
        let request = UpstreamRequest::build(
            EndpointId::Tracks,
            &params(&[("icao24", "  AB1234 ")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.query_value("icao24"), Some("ab1234"));
        assert_eq!(request.query_value("time"), Some("0"));
    }

    #[test]
    fn airport_codes_are_uppercased_with_default_window() {
        let request = UpstreamRequest::build(
            EndpointId::Departures,
            &params(&[("airport", "klax")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.path(), "/flights/departure");
        assert_eq!(request.query_value("airport"), Some("KLAX"));
        assert_eq!(
            request.query_value("begin"),
            Some((NOW - FLIGHT_WINDOW_SECS).to_string().as_str())
        );
        assert_eq!(request.query_value("end"), Some(NOW.to_string().as_str()));
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        let err = UpstreamRequest::build(EndpointId::Arrivals, &params(&[("airport", "  ")]), NOW)
            .expect_err("blank airport");
        assert_eq!(err.to_string(), "Missing airport (ICAO)");

        let err = UpstreamRequest::build(EndpointId::FlightsByAircraft, &params(&[]), NOW)
            .expect_err("missing aircraft");
        assert_eq!(err.to_string(), "Missing icao24");
    }

    #[test]
    fn convert_normalizes_currencies() {
        let request = UpstreamRequest::build(
            EndpointId::Convert,
            &params(&[("amount", "12.5"), ("from", "gbp"), ("to", "usd")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.path(), "/latest");
        assert_eq!(request.query_value("amount"), Some("12.5"));
        assert_eq!(request.query_value("from"), Some("GBP"));
        assert_eq!(request.query_value("to"), Some("USD"));
    }

    #[test]
    fn convert_rejects_non_positive_amounts() {
        let err = UpstreamRequest::build(
            EndpointId::Convert,
            &params(&[("amount", "-3"), ("from", "gbp"), ("to", "usd")]),
            NOW,
        )
        .expect_err("negative amount");
        assert!(matches!(err, DomainError::InvalidParameter { field: "amount", .. }));
    }

    #[test]
    fn historical_embeds_date_in_path() {
        let request = UpstreamRequest::build(
            EndpointId::Historical,
            &params(&[("date", "2024-02-29"), ("symbols", "usd, jpy")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.path(), "/2024-02-29");
        assert_eq!(request.query_value("symbols"), Some("USD,JPY"));
        assert_eq!(request.effective_params().get("date"), Some(&"2024-02-29"));
    }

    #[test]
    fn time_series_supports_open_end() {
        let open = UpstreamRequest::build(
            EndpointId::TimeSeries,
            &params(&[("start", "2024-01-01")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(open.path(), "/2024-01-01..");

        let err = UpstreamRequest::build(
            EndpointId::TimeSeries,
            &params(&[("start", "2024-02-01"), ("end", "2024-01-01")]),
            NOW,
        )
        .expect_err("reversed range");
        assert!(matches!(err, DomainError::InvalidParameter { field: "end", .. }));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let err = UpstreamRequest::build(
            EndpointId::Historical,
            &params(&[("date", "../../admin")]),
            NOW,
        )
        .expect_err("bad date");
        assert!(matches!(err, DomainError::InvalidParameter { field: "date", .. }));
    }

    #[test]
    fn world_time_zone_cannot_escape_path() {
        let ok = UpstreamRequest::build(
            EndpointId::WorldTime,
            &params(&[("zone", "America/Argentina/Buenos_Aires")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(ok.path(), "/api/timezone/America/Argentina/Buenos_Aires");

        let err = UpstreamRequest::build(
            EndpointId::WorldTime,
            &params(&[("zone", "Europe/../../etc")]),
            NOW,
        )
        .expect_err("traversal");
        assert!(matches!(err, DomainError::InvalidParameter { field: "zone", .. }));
    }

    #[test]
    fn public_holidays_default_to_current_year() {
        let request = UpstreamRequest::build(
            EndpointId::PublicHolidays,
            &params(&[("country", "de")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.path(), "/api/v3/PublicHolidays/2023/DE");
    }

    #[test]
    fn country_lookup_requires_letters() {
        let request = UpstreamRequest::build(
            EndpointId::CountryLookup,
            &params(&[("code", "fr")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.path(), "/v3.1/alpha/FR");

        let err = UpstreamRequest::build(EndpointId::CountryLookup, &params(&[("code", "f/1")]), NOW)
            .expect_err("bad code");
        assert!(matches!(err, DomainError::InvalidParameter { field: "code", .. }));
    }

    #[test]
    fn weather_requires_coordinates_in_range() {
        let request = UpstreamRequest::build(
            EndpointId::Weather,
            &params(&[("latitude", "51.5"), ("longitude", "-0.12")]),
            NOW,
        )
        .expect("valid");
        assert_eq!(request.query_value("current_weather"), Some("true"));

        let err = UpstreamRequest::build(
            EndpointId::Weather,
            &params(&[("latitude", "91"), ("longitude", "0")]),
            NOW,
        )
        .expect_err("out of range");
        assert!(matches!(err, DomainError::InvalidParameter { field: "latitude", .. }));
    }
}
