use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};

use crate::application::generator::{GeneratedDocument, Generator, GeneratorError};
use crate::domain::descriptor::{RequestDescriptor, Scope, format_iso_date};
use crate::domain::entities::PDF_CONTENT_TYPE;
use crate::domain::types::PageVariant;
use crate::infra::error::InfraError;

const ERROR_BODY_LIMIT: usize = 512;

/// Calls an upstream renderer over HTTP and returns the raw response body.
#[derive(Clone, Debug)]
pub struct HttpGenerator {
    client: Client,
    endpoint: Url,
}

impl HttpGenerator {
    /// `timeout` bounds each request independently of the caller's deadline.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, InfraError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| InfraError::generator(format!("invalid endpoint `{endpoint}`: {err}")))?;
        let client = Client::builder()
            .user_agent(concat!("dailyoffice/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::generator(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// Upstream query shape: `type`, then `date` or `monthly`/`year`/`month`,
    /// then the optional `remarkable` and `psalm_cycle` flags.
    pub fn request_url(&self, descriptor: &RequestDescriptor) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", descriptor.kind.as_str());
            match descriptor.scope {
                Scope::SingleDay { date } => {
                    query.append_pair("date", &format_iso_date(date));
                }
                Scope::MonthRange { year, month } => {
                    query.append_pair("monthly", "true");
                    query.append_pair("year", &year.to_string());
                    query.append_pair("month", &month.to_string());
                }
            }
            if descriptor.variant == PageVariant::Remarkable {
                query.append_pair("remarkable", "true");
            }
            if let Some(cycle) = descriptor.cycle {
                query.append_pair("psalm_cycle", &cycle.days().to_string());
            }
        }
        url
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<GeneratedDocument, GeneratorError> {
        let response = self
            .client
            .get(self.request_url(descriptor))
            .send()
            .await
            .map_err(|err| GeneratorError::unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(ERROR_BODY_LIMIT);
            return Err(GeneratorError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| PDF_CONTENT_TYPE.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GeneratorError::failed(format!("failed to read body: {err}")))?;

        if bytes.is_empty() {
            return Err(GeneratorError::EmptyOutput);
        }

        Ok(GeneratedDocument {
            bytes,
            content_type,
        })
    }
}
