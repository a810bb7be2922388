//! Catalog of proxied upstream resources.

use std::{fmt, str::FromStr};

use super::error::DomainError;

/// Third-party service that owns an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenSky,
    Frankfurter,
    RestCountries,
    WorldTime,
    NagerDate,
    OpenMeteo,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenSky,
        Provider::Frankfurter,
        Provider::RestCountries,
        Provider::WorldTime,
        Provider::NagerDate,
        Provider::OpenMeteo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenSky => "opensky",
            Provider::Frankfurter => "frankfurter",
            Provider::RestCountries => "restcountries",
            Provider::WorldTime => "worldtime",
            Provider::NagerDate => "nager_date",
            Provider::OpenMeteo => "open_meteo",
        }
    }

    /// Only the flight-data provider accepts (and rewards) credentials.
    pub fn uses_credentials(self) -> bool {
        matches!(self, Provider::OpenSky)
    }
}

/// How volatile an endpoint's data is; mapped to a TTL by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// Live positions and clocks, refreshed every few seconds upstream.
    Live,
    /// Batch-updated flight history.
    Batch,
    /// Daily reference data such as exchange rates and country metadata.
    Reference,
}

/// Logical endpoint a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId {
    States,
    Tracks,
    FlightsByAircraft,
    Arrivals,
    Departures,
    LatestRates,
    Convert,
    Historical,
    TimeSeries,
    Currencies,
    CountryLookup,
    WorldTime,
    PublicHolidays,
    Weather,
}

impl EndpointId {
    pub const ALL: [EndpointId; 14] = [
        EndpointId::States,
        EndpointId::Tracks,
        EndpointId::FlightsByAircraft,
        EndpointId::Arrivals,
        EndpointId::Departures,
        EndpointId::LatestRates,
        EndpointId::Convert,
        EndpointId::Historical,
        EndpointId::TimeSeries,
        EndpointId::Currencies,
        EndpointId::CountryLookup,
        EndpointId::WorldTime,
        EndpointId::PublicHolidays,
        EndpointId::Weather,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointId::States => "states",
            EndpointId::Tracks => "tracks",
            EndpointId::FlightsByAircraft => "flights_by_aircraft",
            EndpointId::Arrivals => "arrivals",
            EndpointId::Departures => "departures",
            EndpointId::LatestRates => "latest_rates",
            EndpointId::Convert => "convert",
            EndpointId::Historical => "historical",
            EndpointId::TimeSeries => "time_series",
            EndpointId::Currencies => "currencies",
            EndpointId::CountryLookup => "country_lookup",
            EndpointId::WorldTime => "world_time",
            EndpointId::PublicHolidays => "public_holidays",
            EndpointId::Weather => "weather",
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            EndpointId::States
            | EndpointId::Tracks
            | EndpointId::FlightsByAircraft
            | EndpointId::Arrivals
            | EndpointId::Departures => Provider::OpenSky,
            EndpointId::LatestRates
            | EndpointId::Convert
            | EndpointId::Historical
            | EndpointId::TimeSeries
            | EndpointId::Currencies => Provider::Frankfurter,
            EndpointId::CountryLookup => Provider::RestCountries,
            EndpointId::WorldTime => Provider::WorldTime,
            EndpointId::PublicHolidays => Provider::NagerDate,
            EndpointId::Weather => Provider::OpenMeteo,
        }
    }

    pub fn ttl_class(self) -> TtlClass {
        match self {
            EndpointId::States | EndpointId::WorldTime | EndpointId::Weather => TtlClass::Live,
            EndpointId::Tracks
            | EndpointId::FlightsByAircraft
            | EndpointId::Arrivals
            | EndpointId::Departures => TtlClass::Batch,
            EndpointId::LatestRates
            | EndpointId::Convert
            | EndpointId::Historical
            | EndpointId::TimeSeries
            | EndpointId::Currencies
            | EndpointId::CountryLookup
            | EndpointId::PublicHolidays => TtlClass::Reference,
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        // Older pages still send the original action name.
        if name == "flights_aircraft" {
            return Ok(EndpointId::FlightsByAircraft);
        }
        EndpointId::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str() == name)
            .ok_or_else(|| DomainError::unknown_endpoint(name))
    }
}
