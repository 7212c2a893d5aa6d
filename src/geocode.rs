use crate::CrawlerError;
use async_trait::async_trait;
use serde::Deserialize;

const BAN_BASE: &str = "https://api-adresse.data.gouv.fr";

/// Location fields resolved from a free-text address. Every field defaults to
/// the empty string when the service has nothing for it; resolution failed
/// exactly when `department_code` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub department_code: String,
    pub postal_code: String,
    pub latitude: String,
    pub longitude: String,
}

#[async_trait]
pub trait AddressResolver {
    async fn resolve(&self, street: &str, city: &str) -> Result<ResolvedAddress, CrawlerError>;
}

/// Resolver backed by the French national address API (BAN).
pub struct BanGeocoder {
    client: reqwest::Client,
    base: String,
}

impl BanGeocoder {
    pub fn new() -> Self {
        Self::with_base(BAN_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        BanGeocoder {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

impl Default for BanGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressResolver for BanGeocoder {
    async fn resolve(&self, street: &str, city: &str) -> Result<ResolvedAddress, CrawlerError> {
        let query = format!("{street}, {city}, France");
        let response: SearchResponse = self
            .client
            .get(format!("{}/search/", self.base))
            .query(&[("q", query.as_str()), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.into_resolved())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Properties {
    postcode: Option<String>,
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    // GeoJSON point, [longitude, latitude]
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl SearchResponse {
    fn into_resolved(self) -> ResolvedAddress {
        let Some(feature) = self.features.into_iter().next() else {
            return ResolvedAddress::default();
        };

        let postal_code = feature.properties.postcode.unwrap_or_default();
        // BAN context reads "69, Rhône, Auvergne-Rhône-Alpes"; the leading
        // segment is the department code.
        let department_code = feature
            .properties
            .context
            .as_deref()
            .and_then(|c| c.split(',').next())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| postal_code.chars().take(2).collect());

        let (longitude, latitude) = match feature.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (lon.to_string(), lat.to_string()),
            _ => (String::new(), String::new()),
        };

        ResolvedAddress {
            department_code,
            postal_code,
            latitude,
            longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> ResolvedAddress {
        serde_json::from_str::<SearchResponse>(json)
            .unwrap()
            .into_resolved()
    }

    #[test]
    fn maps_a_full_feature() {
        let resolved = parse(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [4.835659, 45.764043]},
                    "properties": {
                        "label": "12 Rue de la République 69002 Lyon",
                        "postcode": "69002",
                        "context": "69, Rhône, Auvergne-Rhône-Alpes"
                    }
                }]
            }"#,
        );
        assert_eq!(
            resolved,
            ResolvedAddress {
                department_code: "69".to_string(),
                postal_code: "69002".to_string(),
                latitude: "45.764043".to_string(),
                longitude: "4.835659".to_string(),
            }
        );
    }

    #[test]
    fn no_match_yields_empty_fields() {
        let resolved = parse(r#"{"type": "FeatureCollection", "features": []}"#);
        assert_eq!(resolved, ResolvedAddress::default());
        assert!(resolved.department_code.is_empty());
    }

    #[test]
    fn department_falls_back_to_postcode_prefix() {
        let resolved = parse(
            r#"{
                "features": [{
                    "geometry": {"coordinates": [2.3, 48.8]},
                    "properties": {"postcode": "75011"}
                }]
            }"#,
        );
        assert_eq!(resolved.department_code, "75");
        assert_eq!(resolved.postal_code, "75011");
    }
}
