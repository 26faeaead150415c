//! Current weather for a city
//!
//! Resolves a city name through a geocoding endpoint and fetches current
//! conditions in metric units. This is a reporting utility; the
//! predictor never depends on it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";
pub const DEFAULT_GEOCODING_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("City not found: {0}")]
    NotFound(String),

    #[error("Failed to fetch weather data: {0}")]
    Fetch(String),

    #[error("Invalid weather configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
    /// Base URL of the current-weather API
    pub base_url: String,
    /// Full URL of the direct geocoding endpoint
    pub geocoding_url: String,
}

impl WeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
        }
    }
}

/// A resolved city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Rain over the last hour in mm (0 when not reported)
    pub rainfall_1h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityWeather {
    pub location: Location,
    pub weather: CurrentWeather,
}

#[derive(Deserialize)]
struct WeatherResponse {
    main: MainSection,
    #[serde(default)]
    rain: Option<RainSection>,
}

#[derive(Deserialize)]
struct MainSection {
    temp: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct RainSection {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    /// First geocoding match for a city name
    async fn locate(&self, city: &str) -> Result<Location, WeatherError>;

    async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError>;

    async fn weather_for_city(&self, city: &str) -> Result<CityWeather, WeatherError> {
        let location = self.locate(city).await?;
        let weather = self.current(location.lat, location.lon).await?;
        Ok(CityWeather { location, weather })
    }
}

/// OpenWeatherMap-compatible HTTP client
pub struct WeatherClient {
    client: Client,
    api_key: String,
    geocoding_url: Url,
    weather_url: Url,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        if config.api_key.trim().is_empty() {
            return Err(WeatherError::Config("API key is empty".to_string()));
        }

        let geocoding_url = Url::parse(&config.geocoding_url)
            .map_err(|e| WeatherError::Config(format!("geocoding URL: {}", e)))?;
        let weather_url = Url::parse(&format!(
            "{}/data/2.5/weather",
            config.base_url.trim_end_matches('/')
        ))
        .map_err(|e| WeatherError::Config(format!("base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WeatherError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key,
            geocoding_url,
            weather_url,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Fetch(format!("API error ({}): {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::Fetch(format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl WeatherService for WeatherClient {
    async fn locate(&self, city: &str) -> Result<Location, WeatherError> {
        let matches: Vec<Location> = self
            .get(
                &self.geocoding_url,
                &[("q", city.to_string()), ("limit", "1".to_string())],
            )
            .await?;

        let location = matches
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::NotFound(city.to_string()))?;
        debug!(city = %city, lat = location.lat, lon = location.lon, "City resolved");
        Ok(location)
    }

    async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        let response: WeatherResponse = self
            .get(
                &self.weather_url,
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;

        Ok(CurrentWeather {
            temperature: response.main.temp,
            humidity: response.main.humidity,
            rainfall_1h: response.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> WeatherClient {
        WeatherClient::new(WeatherConfig {
            api_key: "test-key".to_string(),
            base_url: server.url(),
            geocoding_url: format!("{}/geo/1.0/direct", server.url()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_weather_for_city() {
        let mut server = Server::new_async().await;
        let geo = server
            .mock("GET", "/geo/1.0/direct")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Pune".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
                Matcher::UrlEncoded("appid".into(), "test-key".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"name":"Pune","country":"IN","lat":18.52,"lon":73.85}]"#)
            .create_async()
            .await;
        let current = server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lat".into(), "18.52".into()),
                Matcher::UrlEncoded("lon".into(), "73.85".into()),
                Matcher::UrlEncoded("units".into(), "metric".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"main":{"temp":27.4,"humidity":71},"rain":{"1h":0.6}}"#)
            .create_async()
            .await;

        let result = client(&server).weather_for_city("Pune").await.unwrap();
        geo.assert_async().await;
        current.assert_async().await;

        assert_eq!(result.location.country, "IN");
        assert_eq!(result.weather.temperature, 27.4);
        assert_eq!(result.weather.humidity, 71.0);
        assert_eq!(result.weather.rainfall_1h, 0.6);
    }

    #[tokio::test]
    async fn test_missing_rain_is_zero() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_body(r#"{"main":{"temp":30.1,"humidity":40}}"#)
            .create_async()
            .await;

        let weather = client(&server).current(1.0, 2.0).await.unwrap();
        assert_eq!(weather.rainfall_1h, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_city() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/geo/1.0/direct")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let err = client(&server).locate("Atlantis").await.unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(city) if city == "Atlantis"));
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"cod":401,"message":"Invalid API key"}"#)
            .create_async()
            .await;

        let err = client(&server).current(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Fetch(msg) if msg.contains("401")));
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            WeatherClient::new(WeatherConfig::new("")),
            Err(WeatherError::Config(_))
        ));
        let mut config = WeatherConfig::new("key");
        config.geocoding_url = "not a url".to_string();
        assert!(matches!(
            WeatherClient::new(config),
            Err(WeatherError::Config(_))
        ));
        assert!(WeatherClient::new(WeatherConfig::new("key")).is_ok());
    }
}
